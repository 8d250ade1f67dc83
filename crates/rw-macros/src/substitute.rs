//! In-place macro substitution over a configuration tree.
//!
//! Every string leaf reachable from the visited node is rescanned for
//! `${name}` placeholders. Keys, sequence positions and non-string scalars
//! are left alone.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};

use crate::resolver::MacroResolver;

/// Placeholder syntax: `${` followed by one or more non-`}` characters and `}`.
static MACRO_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// Check whether `text` contains at least one placeholder.
#[must_use]
pub fn contains_macro(text: &str) -> bool {
    MACRO_PATTERN.is_match(text)
}

/// Replace every placeholder in `text` with its resolved value.
///
/// Unresolved macros become empty strings. Text without placeholders is
/// returned unchanged, and an unterminated `${` passes through verbatim.
pub fn expand_str(
    resolver: &mut MacroResolver,
    text: &str,
    attributes: Option<&Mapping>,
) -> String {
    MACRO_PATTERN
        .replace_all(text, |caps: &Captures| {
            resolver.resolve(&caps[1], attributes).unwrap_or_default()
        })
        .into_owned()
}

/// Substitute macros in every string leaf under `node`.
pub fn substitute(
    resolver: &mut MacroResolver,
    node: &mut Value,
    attributes: Option<&Mapping>,
) {
    match node {
        Value::String(text) => {
            if contains_macro(text) {
                *text = expand_str(resolver, text, attributes);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                substitute(resolver, item, attributes);
            }
        }
        Value::Mapping(entries) => {
            for value in entries.values_mut() {
                substitute(resolver, value, attributes);
            }
        }
        Value::Tagged(tagged) => substitute(resolver, &mut tagged.value, attributes),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
