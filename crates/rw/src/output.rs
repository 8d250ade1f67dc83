//! Colored terminal output utilities.

use std::io::{self, Write};

use console::{Style, Term};

/// Terminal output formatter.
///
/// Status messages go to stderr so stdout carries only command output.
pub(crate) struct Output {
    term: Term,
    stdout: Term,
    green: Style,
    red: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            stdout: Term::stdout(),
            green: Style::new().green(),
            red: Style::new().red(),
        }
    }

    /// Print an info message.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Write command output verbatim to stdout.
    ///
    /// Unlike status messages, failures here are reported: stdout carries
    /// the expanded playbook.
    pub(crate) fn print(&self, content: &str) -> io::Result<()> {
        write_content(&mut &self.stdout, content)
    }
}

fn write_content(writer: &mut impl Write, content: &str) -> io::Result<()> {
    writer.write_all(content.as_bytes())?;
    writer.flush()
}
