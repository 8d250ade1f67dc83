//! Environment variable providers.
//!
//! The resolver never touches `std::env` directly. It reads variables through
//! the [`Environment`] trait so tests can supply a fixed snapshot.

use std::collections::HashMap;

/// Read-only source of environment variables.
pub trait Environment {
    /// Look up a variable by its exact name.
    fn var(&self, key: &str) -> Option<String>;
}

/// Environment backed by the current process.
///
/// Variables whose value is not valid UTF-8 are treated as unset.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl Environment for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}
