//! Macro value resolution.
//!
//! [`MacroResolver`] decides what a `${name}` placeholder expands to. Sources
//! are consulted in a fixed order and the first one holding the name wins:
//!
//! 1. environment variable with the exact name
//! 2. environment variable with the upper-cased name
//! 3. resolved `asciidoc.attributes` of the playbook
//! 4. the macro table
//! 5. `branch`: current git branch (memoized)
//! 6. `commit-id`: abbreviated `HEAD` commit (memoized)
//!
//! Anything else is logged as a warning and resolves to `None`.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::env::{Environment, ProcessEnv};
use crate::vcs::{CommandRunner, GitQuery, SystemCommandRunner, VcsError};

/// Macro resolved from the current git branch.
pub const BRANCH_MACRO: &str = "branch";

/// Macro resolved from the current git commit.
pub const COMMIT_ID_MACRO: &str = "commit-id";

/// Value of a statically configured macro.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MacroValue {
    /// Boolean value, rendered as `true`/`false`.
    Bool(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    String(String),
}

impl fmt::Display for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MacroValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for MacroValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for MacroValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for MacroValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Resolves macro names to replacement text.
///
/// Owns the macro table: a copy of the static macros given at construction
/// plus the dynamic macros cached after their first successful lookup.
pub struct MacroResolver {
    macros: HashMap<String, String>,
    env: Box<dyn Environment>,
    git: GitQuery,
}

impl MacroResolver {
    /// Create a resolver over the process environment and the git
    /// repository around the current working directory.
    pub fn new<I, K, V>(macros: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MacroValue>,
    {
        let macros = macros
            .into_iter()
            .map(|(name, value)| {
                let value: MacroValue = value.into();
                (name.into(), value.to_string())
            })
            .collect();
        let cwd = std::env::current_dir().unwrap_or_default();

        Self {
            macros,
            env: Box::new(ProcessEnv),
            git: GitQuery::new(cwd, Box::new(SystemCommandRunner)),
        }
    }

    /// Read environment variables from `env` instead of the process.
    #[must_use]
    pub fn with_environment(mut self, env: impl Environment + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    /// Run version-control queries through `runner`.
    #[must_use]
    pub fn with_command_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.git = self.git.with_runner(Box::new(runner));
        self
    }

    /// Search for the git repository starting from `dir`.
    #[must_use]
    pub fn with_start_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.git = self.git.with_start_dir(dir);
        self
    }

    /// Current macro table, including cached dynamic macros.
    #[must_use]
    pub fn macros(&self) -> &HashMap<String, String> {
        &self.macros
    }

    /// Resolve `name` to its replacement text.
    ///
    /// `attributes` is the resolved `asciidoc.attributes` mapping, if any.
    /// Returns `None` when no source knows the name; a warning is logged in
    /// that case and the caller substitutes an empty string.
    pub fn resolve(&mut self, name: &str, attributes: Option<&Mapping>) -> Option<String> {
        if let Some(value) = self.env.var(name) {
            debug!(name, "Resolved macro from environment");
            return Some(value);
        }

        let upper = name.to_uppercase();
        if let Some(value) = self.env.var(&upper) {
            debug!(name, var = %upper, "Resolved macro from environment");
            return Some(value);
        }

        if let Some(value) = attributes.and_then(|attrs| attribute_value(attrs, name)) {
            debug!(name, "Resolved macro from asciidoc attributes");
            return Some(value);
        }

        if let Some(value) = self.macros.get(name) {
            return Some(value.clone());
        }

        // A missing repository is not reported here; the name then falls
        // through to the generic warning below.
        match name {
            BRANCH_MACRO => {
                if let Some(root) = self.git.repository_root() {
                    let result = self.git.branch(&root);
                    return self.memoize(name, result);
                }
            }
            COMMIT_ID_MACRO => {
                if let Some(root) = self.git.repository_root() {
                    let result = self.git.commit_id(&root);
                    return self.memoize(name, result);
                }
            }
            _ => {}
        }

        warn!(name, "Macro not found");
        None
    }

    fn memoize(&mut self, name: &str, result: Result<String, VcsError>) -> Option<String> {
        match result {
            Ok(value) => {
                debug!(name, value = %value, "Resolved macro from git");
                self.macros.insert(name.to_owned(), value.clone());
                Some(value)
            }
            Err(err) => {
                warn!(name, error = %err, "Failed to resolve macro from git");
                None
            }
        }
    }
}

impl fmt::Debug for MacroResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroResolver")
            .field("macros", &self.macros)
            .field("git", &self.git)
            .finish_non_exhaustive()
    }
}

/// Render an attribute as macro text.
///
/// Collections have no textual form and count as absent.
fn attribute_value(attributes: &Mapping, name: &str) -> Option<String> {
    scalar_text(attributes.get(name)?)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::path::Path;
    use std::rc::Rc;

    use crate::vcs::find_repository_root;

    /// Fake git that answers from fixed strings and counts invocations.
    #[derive(Clone)]
    pub(crate) struct FakeGit {
        pub branch: Option<&'static str>,
        pub commit: Option<&'static str>,
        pub calls: Rc<Cell<usize>>,
    }

    impl FakeGit {
        pub(crate) fn new(branch: &'static str, commit: &'static str) -> Self {
            Self {
                branch: Some(branch),
                commit: Some(commit),
                calls: Rc::new(Cell::new(0)),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                branch: None,
                commit: None,
                calls: Rc::new(Cell::new(0)),
            }
        }
    }

    impl CommandRunner for FakeGit {
        fn run(&self, _program: &str, args: &[&str], _cwd: &Path) -> Result<String, VcsError> {
            self.calls.set(self.calls.get() + 1);
            let reply = if args.contains(&"--abbrev-ref") {
                self.branch
            } else {
                self.commit
            };
            reply.map(str::to_owned).ok_or_else(|| VcsError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: "fatal: not a git repository".to_owned(),
            })
        }
    }

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn attributes(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    /// Temporary directory laid out as a git checkout.
    pub(crate) fn repo_dir() -> tempfile::TempDir {
        let temp = tempfile::tempdir().unwrap();
        std::fs::create_dir(temp.path().join(".git")).unwrap();
        temp
    }

    fn resolver(macros: &[(&str, &str)], vars: &[(&str, &str)]) -> MacroResolver {
        MacroResolver::new(macros.iter().copied())
            .with_environment(env(vars))
            .with_command_runner(FakeGit::failing())
    }

    #[test]
    fn test_resolve_from_macro_table() {
        let mut resolver = resolver(&[("greeting", "hi")], &[]);
        assert_eq!(resolver.resolve("greeting", None), Some("hi".to_owned()));
    }

    #[test]
    fn test_resolve_exact_env_beats_upper_env() {
        let mut resolver = resolver(&[], &[("product", "exact"), ("PRODUCT", "upper")]);
        assert_eq!(resolver.resolve("product", None), Some("exact".to_owned()));
    }

    #[test]
    fn test_resolve_upper_env_beats_attributes() {
        let mut resolver = resolver(&[], &[("PRODUCT", "upper")]);
        let attrs = attributes("product: attr");
        assert_eq!(
            resolver.resolve("product", Some(&attrs)),
            Some("upper".to_owned())
        );
    }

    #[test]
    fn test_resolve_attributes_beat_macro_table() {
        let mut resolver = resolver(&[("product", "table")], &[]);
        let attrs = attributes("product: attr");
        assert_eq!(
            resolver.resolve("product", Some(&attrs)),
            Some("attr".to_owned())
        );
    }

    #[test]
    fn test_resolve_env_empty_value_wins() {
        let mut resolver = resolver(&[("product", "table")], &[("product", "")]);
        assert_eq!(resolver.resolve("product", None), Some(String::new()));
    }

    #[test]
    fn test_resolve_attribute_scalars() {
        let mut resolver = resolver(&[], &[]);
        let attrs = attributes("count: 3\nenabled: true\nempty: ~\nlist: [a, b]");

        assert_eq!(resolver.resolve("count", Some(&attrs)), Some("3".to_owned()));
        assert_eq!(
            resolver.resolve("enabled", Some(&attrs)),
            Some("true".to_owned())
        );
        assert_eq!(resolver.resolve("empty", Some(&attrs)), Some(String::new()));
        assert_eq!(resolver.resolve("list", Some(&attrs)), None);
    }

    #[test]
    fn test_static_values_rendered_as_text() {
        let mut resolver = MacroResolver::new([
            ("release", MacroValue::Integer(3)),
            ("beta", MacroValue::Bool(false)),
            ("ratio", MacroValue::Float(1.5)),
        ])
        .with_environment(env(&[]));

        assert_eq!(resolver.resolve("release", None), Some("3".to_owned()));
        assert_eq!(resolver.resolve("beta", None), Some("false".to_owned()));
        assert_eq!(resolver.resolve("ratio", None), Some("1.5".to_owned()));
    }

    #[test]
    fn test_static_table_is_copied() {
        let mut source = HashMap::new();
        source.insert("name".to_owned(), MacroValue::from("before"));
        let mut resolver = MacroResolver::new(source.clone()).with_environment(env(&[]));

        source.insert("name".to_owned(), MacroValue::from("after"));

        assert_eq!(resolver.resolve("name", None), Some("before".to_owned()));
    }

    #[test]
    fn test_resolve_unknown_macro() {
        let mut resolver = resolver(&[], &[]);
        assert_eq!(resolver.resolve("nope", None), None);
    }

    #[test]
    fn test_branch_from_git_memoized() {
        let repo = repo_dir();
        let git = FakeGit::new("feature/docs", "0123456789abcdef");
        let calls = Rc::clone(&git.calls);
        let mut resolver = MacroResolver::new(Vec::<(String, String)>::new())
            .with_environment(env(&[]))
            .with_command_runner(git)
            .with_start_dir(repo.path());

        assert_eq!(
            resolver.resolve(BRANCH_MACRO, None),
            Some("feature/docs".to_owned())
        );
        assert_eq!(
            resolver.resolve(BRANCH_MACRO, None),
            Some("feature/docs".to_owned())
        );
        assert_eq!(calls.get(), 1);
        assert_eq!(
            resolver.macros().get(BRANCH_MACRO),
            Some(&"feature/docs".to_owned())
        );
    }

    #[test]
    fn test_commit_id_from_git_truncated() {
        let repo = repo_dir();
        let git = FakeGit::new("main", "0123456789abcdef0123456789abcdef01234567");
        let calls = Rc::clone(&git.calls);
        let mut resolver = MacroResolver::new(Vec::<(String, String)>::new())
            .with_environment(env(&[]))
            .with_command_runner(git)
            .with_start_dir(repo.path());

        let commit = resolver.resolve(COMMIT_ID_MACRO, None).unwrap();
        assert_eq!(commit, "0123456");
        assert_eq!(commit.len(), 7);

        resolver.resolve(COMMIT_ID_MACRO, None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_branch_from_upper_env_skips_git() {
        let repo = repo_dir();
        let git = FakeGit::new("feature", "0123456789");
        let calls = Rc::clone(&git.calls);
        let mut resolver = MacroResolver::new(Vec::<(String, String)>::new())
            .with_environment(env(&[("BRANCH", "main")]))
            .with_command_runner(git)
            .with_start_dir(repo.path());

        assert_eq!(resolver.resolve("branch", None), Some("main".to_owned()));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_branch_from_macro_table_skips_git() {
        let repo = repo_dir();
        let git = FakeGit::new("feature", "0123456789");
        let calls = Rc::clone(&git.calls);
        let mut resolver = MacroResolver::new([("branch", "release")])
            .with_environment(env(&[]))
            .with_command_runner(git)
            .with_start_dir(repo.path());

        assert_eq!(resolver.resolve("branch", None), Some("release".to_owned()));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_git_failure_not_memoized() {
        let repo = repo_dir();
        let git = FakeGit::failing();
        let calls = Rc::clone(&git.calls);
        let mut resolver = MacroResolver::new(Vec::<(String, String)>::new())
            .with_environment(env(&[]))
            .with_command_runner(git)
            .with_start_dir(repo.path());

        assert_eq!(resolver.resolve(BRANCH_MACRO, None), None);
        assert_eq!(resolver.resolve(BRANCH_MACRO, None), None);
        assert_eq!(calls.get(), 2);
        assert!(resolver.macros().is_empty());
    }

    #[test]
    fn test_no_repository_skips_git() {
        let temp = tempfile::tempdir().unwrap();
        if find_repository_root(temp.path()).is_some() {
            // Temp dir lives inside a checkout on this machine
            return;
        }
        let git = FakeGit::new("main", "0123456789");
        let calls = Rc::clone(&git.calls);
        let mut resolver = MacroResolver::new(Vec::<(String, String)>::new())
            .with_environment(env(&[]))
            .with_command_runner(git)
            .with_start_dir(temp.path());

        assert_eq!(resolver.resolve(BRANCH_MACRO, None), None);
        assert_eq!(resolver.resolve(COMMIT_ID_MACRO, None), None);
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_instances_do_not_share_cache() {
        let repo = repo_dir();
        let first_git = FakeGit::new("first", "1111111111");
        let second_git = FakeGit::new("second", "2222222222");
        let mut first = MacroResolver::new(Vec::<(String, String)>::new())
            .with_environment(env(&[]))
            .with_command_runner(first_git)
            .with_start_dir(repo.path());
        let mut second = MacroResolver::new(Vec::<(String, String)>::new())
            .with_environment(env(&[]))
            .with_command_runner(second_git)
            .with_start_dir(repo.path());

        assert_eq!(first.resolve(BRANCH_MACRO, None), Some("first".to_owned()));
        assert_eq!(second.resolve(BRANCH_MACRO, None), Some("second".to_owned()));
    }

    #[test]
    fn test_macro_value_deserialize_untagged() {
        let values: HashMap<String, MacroValue> =
            serde_yaml::from_str("name: RW\nrelease: 3\nbeta: true\nratio: 0.5").unwrap();

        assert_eq!(values["name"], MacroValue::String("RW".to_owned()));
        assert_eq!(values["release"], MacroValue::Integer(3));
        assert_eq!(values["beta"], MacroValue::Bool(true));
        assert_eq!(values["ratio"], MacroValue::Float(0.5));
    }
}
