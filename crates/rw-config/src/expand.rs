//! Environment and home directory expansion for configured paths.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - leading `~` - expands to the home directory

use std::env::VarError;

use crate::ConfigError;

/// Expand environment variables and a leading `~` in a path string.
///
/// Returns the original string unchanged if it has neither `${` nor a
/// leading `~`. Bare `$VAR` on its own is left alone.
pub(crate) fn expand_path(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") && !value.starts_with('~') {
        return Ok(value.to_owned());
    }

    shellexpand::full_with_context(
        value,
        || std::env::var("HOME").ok(),
        |var| -> Result<Option<String>, VarError> { std::env::var(var).map(Some) },
    )
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.var_name),
    })
}
