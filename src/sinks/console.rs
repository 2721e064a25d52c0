//! Console sink implementation

use crate::core::{LogEvent, LogLevel, Result, Sink};
use std::io::Write;

/// Line format written by [`ConsoleSink`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsoleFormat {
    /// `[timestamp] [LEVEL  ] [module] file:line function - message`
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

pub struct ConsoleSink {
    format: ConsoleFormat,
    stderr_only: bool,
}

impl ConsoleSink {
    /// Errors and warnings to stderr, everything else to stdout.
    pub fn new() -> Self {
        Self {
            format: ConsoleFormat::default(),
            stderr_only: false,
        }
    }

    /// Every event to stderr.
    pub fn stderr() -> Self {
        Self {
            format: ConsoleFormat::default(),
            stderr_only: true,
        }
    }

    /// Set the line format for this sink
    ///
    /// # Example
    ///
    /// ```
    /// use blabber::sinks::{ConsoleFormat, ConsoleSink};
    ///
    /// let sink = ConsoleSink::new().with_format(ConsoleFormat::Json);
    /// ```
    #[must_use]
    pub fn with_format(mut self, format: ConsoleFormat) -> Self {
        self.format = format;
        self
    }

    fn format_line(&self, event: &LogEvent) -> Result<String> {
        match self.format {
            ConsoleFormat::Text => Ok(format_text(event)),
            ConsoleFormat::Json => event.to_json(),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn write(&self, event: &LogEvent) -> Result<()> {
        let line = self.format_line(event)?;

        let to_stderr =
            self.stderr_only || matches!(event.level, LogLevel::Error | LogLevel::Warning);
        if to_stderr {
            writeln!(std::io::stderr().lock(), "{}", line)?;
        } else {
            writeln!(std::io::stdout().lock(), "{}", line)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}

/// Single-line text rendering. Line breaks in the message are escaped so one
/// event can never look like several.
pub fn format_text(event: &LogEvent) -> String {
    let message = event
        .message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t");

    let file = event
        .file
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(&event.file);

    let mut line = format!(
        "[{}] [{:7}] ",
        event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        event.level
    );
    if let Some(ref module) = event.module {
        line.push('[');
        line.push_str(module);
        line.push_str("] ");
    }
    line.push_str(&format!(
        "{}:{} {} - {}",
        file, event.line, event.function, message
    ));
    line
}
