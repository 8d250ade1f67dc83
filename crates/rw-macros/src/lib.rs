//! Build-time macro expansion for documentation playbooks.
//!
//! Strings in a playbook may contain `${name}` placeholders. During a build
//! the [`MacrosExtension`] rewrites them in place with values taken from the
//! environment, the playbook's own `asciidoc.attributes`, a static macro
//! table, or git (`${branch}` and `${commit-id}`).
//!
//! Resolution never fails the build: an unknown macro is logged as a warning
//! and replaced with an empty string.
//!
//! # Example
//!
//! ```ignore
//! use rw_macros::MacrosExtension;
//!
//! let mut playbook: serde_yaml::Value =
//!     serde_yaml::from_str("site:\n  title: ${product} Docs")?;
//! let mut extension = MacrosExtension::new([("product", "RW")]);
//! extension.on_playbook_read(&mut playbook);
//! assert_eq!(playbook["site"]["title"], "RW Docs");
//! ```

mod env;
mod playbook;
mod resolver;
mod substitute;
mod vcs;

pub use env::{Environment, ProcessEnv};
pub use playbook::{MacrosExtension, SECTION_ORDER};
pub use resolver::{BRANCH_MACRO, COMMIT_ID_MACRO, MacroResolver, MacroValue};
pub use substitute::{contains_macro, expand_str, substitute};
pub use vcs::{
    COMMIT_ID_LENGTH, CommandRunner, GitQuery, SystemCommandRunner, VcsError,
    find_repository_root,
};

/// Check that `name` can appear inside a `${...}` placeholder.
///
/// Names must be non-empty and cannot contain `}`.
#[must_use]
pub fn is_valid_macro_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('}')
}
