//! Git metadata lookup for the `branch` and `commit-id` macros.
//!
//! Queries run as blocking `git` subprocesses inside the nearest repository
//! found by walking up from a start directory. Command execution goes through
//! [`CommandRunner`] so the subprocess can be replaced in tests.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// Name of the repository metadata marker.
const GIT_MARKER: &str = ".git";

/// Number of characters kept from the full commit hash.
pub const COMMIT_ID_LENGTH: usize = 7;

/// Error returned by a version-control query.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The command could not be spawned.
    #[error("failed to run {command}: {source}")]
    Io {
        /// Command line that failed to start.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The command exited with a non-zero status.
    #[error("{command} failed: {stderr}")]
    CommandFailed {
        /// Command line that failed.
        command: String,
        /// Trimmed standard error output.
        stderr: String,
    },
    /// The command succeeded but printed nothing.
    #[error("{command} returned no output")]
    EmptyOutput {
        /// Command line that produced no output.
        command: String,
    },
}

/// Executes external commands on behalf of [`GitQuery`].
pub trait CommandRunner {
    /// Run `program` with `args` in `cwd` and return its trimmed stdout.
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<String, VcsError>;
}

/// Runs commands with [`std::process::Command`].
///
/// There is no timeout: a hanging subprocess blocks the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<String, VcsError> {
        let command = command_line(program, args);
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .map_err(|source| VcsError::Io {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_owned();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Find the nearest ancestor of `start` (inclusive) that contains `.git`.
///
/// The marker may be a directory or a file, so worktrees and submodules
/// are recognized too.
#[must_use]
pub fn find_repository_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(GIT_MARKER).exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Branch and commit queries scoped to the repository around a directory.
pub struct GitQuery {
    start_dir: PathBuf,
    runner: Box<dyn CommandRunner>,
}

impl GitQuery {
    /// Create a query that searches for a repository from `start_dir` upward.
    pub fn new(start_dir: impl Into<PathBuf>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            start_dir: start_dir.into(),
            runner,
        }
    }

    /// Search for the repository from a different directory.
    #[must_use]
    pub fn with_start_dir(mut self, start_dir: impl Into<PathBuf>) -> Self {
        self.start_dir = start_dir.into();
        self
    }

    /// Replace the command runner.
    #[must_use]
    pub fn with_runner(mut self, runner: Box<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Locate the repository root, or `None` outside a checkout.
    #[must_use]
    pub fn repository_root(&self) -> Option<PathBuf> {
        let root = find_repository_root(&self.start_dir);
        match &root {
            Some(root) => debug!(root = %root.display(), "Found git repository"),
            None => debug!(start = %self.start_dir.display(), "No git repository found"),
        }
        root
    }

    /// Name of the currently checked-out branch.
    pub fn branch(&self, root: &Path) -> Result<String, VcsError> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"], root)
    }

    /// Abbreviated identifier of the `HEAD` commit.
    pub fn commit_id(&self, root: &Path) -> Result<String, VcsError> {
        let full = self.git(&["rev-parse", "HEAD"], root)?;
        Ok(full.chars().take(COMMIT_ID_LENGTH).collect())
    }

    fn git(&self, args: &[&str], root: &Path) -> Result<String, VcsError> {
        let stdout = self.runner.run("git", args, root)?;
        if stdout.is_empty() {
            return Err(VcsError::EmptyOutput {
                command: command_line("git", args),
            });
        }
        Ok(stdout)
    }
}

impl std::fmt::Debug for GitQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitQuery")
            .field("start_dir", &self.start_dir)
            .finish_non_exhaustive()
    }
}
