//! `rw expand` command implementation.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use rw_config::{CliSettings, Config};
use rw_macros::{MacroValue, MacrosExtension, is_valid_macro_name};
use serde_yaml::Value;

use crate::error::CliError;
use crate::output::Output;

/// Serialization format of the expanded playbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Yaml,
    Json,
}

impl OutputFormat {
    /// Pick a format from the output file extension, defaulting to YAML.
    fn for_path(path: Option<&Path>) -> Self {
        match path.and_then(Path::extension).and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Arguments for the expand command.
#[derive(Args)]
pub(crate) struct ExpandArgs {
    /// Playbook to expand (overrides config).
    playbook: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover rw.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the expanded playbook here instead of stdout (overrides config).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Define a macro as NAME=VALUE (repeatable, overrides config).
    #[arg(short = 'm', long = "macro", value_name = "NAME=VALUE")]
    macros: Vec<String>,

    /// Output format (default: from output extension, else yaml).
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Enable verbose output (show where each macro was resolved from).
    #[arg(short, long)]
    pub verbose: bool,
}

impl ExpandArgs {
    /// Execute the expand command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the playbook cannot be
    /// read, parsed or written. Unresolved macros are not errors.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let macros = self
            .macros
            .iter()
            .map(|arg| parse_macro_arg(arg))
            .collect::<Result<Vec<_>, _>>()?;
        let cli_settings = CliSettings {
            playbook: self.playbook,
            output: self.output,
            macros,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let source = config.playbook_resolved.path;
        let destination = config.playbook_resolved.output;
        let format = self
            .format
            .unwrap_or_else(|| OutputFormat::for_path(destination.as_deref()));

        output.info(&format!("Playbook: {}", source.display()));
        let mut playbook = read_playbook(&source)?;

        let mut extension = MacrosExtension::new(config.macros);
        extension.on_playbook_read(&mut playbook);
        tracing::info!(
            macros = extension.resolver().macros().len(),
            "Expanded playbook macros"
        );

        let rendered = render(&playbook, format)?;
        match destination {
            Some(path) => {
                write_file(&path, &rendered)?;
                output.success(&format!("Expanded playbook written to {}", path.display()));
            }
            None => output.print(&rendered)?,
        }

        Ok(())
    }
}

/// Parse a `NAME=VALUE` macro definition.
///
/// Only the first `=` separates name from value, so values may contain `=`.
fn parse_macro_arg(arg: &str) -> Result<(String, MacroValue), CliError> {
    let (name, value) = arg.split_once('=').ok_or_else(|| {
        CliError::Validation(format!("Invalid macro {arg:?}: expected NAME=VALUE"))
    })?;
    if !is_valid_macro_name(name) {
        return Err(CliError::Validation(format!(
            "Invalid macro name {name:?}: must be non-empty and cannot contain '}}'"
        )));
    }
    Ok((name.to_owned(), MacroValue::from(value)))
}

fn read_playbook(path: &Path) -> Result<Value, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_yaml::from_str(&content)?)
}

fn render(playbook: &Value, format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Yaml => Ok(serde_yaml::to_string(playbook)?),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(playbook)?;
            json.push('\n');
            Ok(json)
        }
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), CliError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}
