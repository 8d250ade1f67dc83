//! Configuration management for RW macros.
//!
//! Parses `rw.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Example
//!
//! ```toml
//! [playbook]
//! path = "antora-playbook.yml"
//! output = "${BUILD_DIR:-build}/playbook.yml"
//!
//! [macros]
//! product = "RW"
//! release = 3
//! ```
//!
//! ## Path Expansion
//!
//! `playbook.path` and `playbook.output` support `${VAR}`, `${VAR:-default}`
//! and a leading `~`. Relative paths are resolved against the directory
//! holding `rw.toml`.

mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rw_macros::{MacroValue, is_valid_macro_name};
use serde::Deserialize;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override playbook path.
    pub playbook: Option<PathBuf>,
    /// Override output path.
    pub output: Option<PathBuf>,
    /// Extra macros; replace file entries with the same name.
    pub macros: Vec<(String, MacroValue)>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "rw.toml";

/// Playbook filename used when none is configured.
const DEFAULT_PLAYBOOK: &str = "antora-playbook.yml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Playbook configuration (paths are relative strings from TOML).
    playbook: PlaybookConfigRaw,
    /// Static macro table.
    pub macros: BTreeMap<String, MacroValue>,

    /// Resolved playbook configuration (set after loading).
    #[serde(skip)]
    pub playbook_resolved: PlaybookConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw playbook configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PlaybookConfigRaw {
    path: Option<String>,
    output: Option<String>,
}

/// Resolved playbook configuration with absolute paths.
#[derive(Debug, Default)]
pub struct PlaybookConfig {
    /// Playbook to expand.
    pub path: PathBuf,
    /// Where to write the expanded playbook (stdout when `None`).
    pub output: Option<PathBuf>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`playbook.path`").
        field: String,
        /// Error message (e.g., "${`DOCS_ROOT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Require a macro name usable inside `${...}`.
fn require_macro_name(name: &str) -> Result<(), ConfigError> {
    if !is_valid_macro_name(name) {
        return Err(ConfigError::Validation(format!(
            "invalid macro name {name:?}: must be non-empty and cannot contain '}}'"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `rw.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails,
    /// or the resulting configuration is invalid.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(playbook) = &settings.playbook {
            self.playbook_resolved.path.clone_from(playbook);
        }
        if let Some(output) = &settings.output {
            self.playbook_resolved.output = Some(output.clone());
        }
        for (name, value) in &settings.macros {
            self.macros.insert(name.clone(), value.clone());
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            playbook: PlaybookConfigRaw::default(),
            macros: BTreeMap::new(),
            playbook_resolved: PlaybookConfig {
                path: base.join(DEFAULT_PLAYBOOK),
                output: None,
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        // Validate configuration after loading and resolution
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_playbook()?;
        self.validate_macros()?;
        Ok(())
    }

    /// Validate playbook configuration.
    fn validate_playbook(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.playbook.path {
            require_non_empty(path, "playbook.path")?;
        }
        if let Some(output) = &self.playbook.output {
            require_non_empty(output, "playbook.output")?;
        }
        require_non_empty(
            &self.playbook_resolved.path.to_string_lossy(),
            "playbook.path",
        )?;
        Ok(())
    }

    /// Validate macro table names.
    fn validate_macros(&self) -> Result<(), ConfigError> {
        for name in self.macros.keys() {
            require_macro_name(name)?;
        }
        Ok(())
    }

    /// Expand environment variable references in configured paths.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref path) = self.playbook.path {
            self.playbook.path = Some(expand::expand_path(path, "playbook.path")?);
        }
        if let Some(ref output) = self.playbook.output {
            self.playbook.output = Some(expand::expand_path(output, "playbook.output")?);
        }
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.playbook_resolved = PlaybookConfig {
            path: config_dir.join(self.playbook.path.as_deref().unwrap_or(DEFAULT_PLAYBOOK)),
            output: self.playbook.output.as_deref().map(|o| config_dir.join(o)),
        };
    }
}
