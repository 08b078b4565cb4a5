//! Recoverable diagnostics: notes, warnings and errors.
//!
//! The core only classifies severity and formats messages. Where they end up
//! (colored console, in-memory buffer, nowhere) is up to the [`DiagnosticSink`].

use crate::location::SourceLocation;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Note => "NOTE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }

    fn color(self) -> Color {
        match self {
            Severity::Note => Color::Cyan,
            Severity::Warning => Color::Yellow,
            Severity::Error => Color::Red,
        }
    }
}

/// One reported message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity.label(), self.message)?;
        if let Some(location) = &self.location {
            write!(f, " {}", location)?;
        }
        Ok(())
    }
}

// ============================================================================
// SINKS
// ============================================================================

pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: &Diagnostic);
}

/// Writes diagnostics to stderr, coloring the severity label.
pub struct ConsoleSink {
    stream: StandardStream,
}

impl ConsoleSink {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stream: StandardStream::stderr(choice),
        }
    }

    /// Colors only when stderr is a terminal.
    pub fn auto() -> Self {
        let choice = if atty::is(atty::Stream::Stderr) {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(choice)
    }
}

impl DiagnosticSink for ConsoleSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        let _ = self.stream.set_color(
            ColorSpec::new()
                .set_fg(Some(diagnostic.severity.color()))
                .set_bold(true),
        );
        let _ = write!(self.stream, "[{}]", diagnostic.severity.label());
        let _ = self.stream.reset();
        let _ = write!(self.stream, " {}", diagnostic.message);
        if let Some(location) = &diagnostic.location {
            let _ = self.stream.set_color(ColorSpec::new().set_fg(Some(Color::Blue)));
            let _ = write!(self.stream, " {}", location);
            let _ = self.stream.reset();
        }
        let _ = writeln!(self.stream);
    }
}

/// Collects diagnostics into a shared buffer; clones share the same buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<Diagnostic>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.borrow().clone()
    }

    pub fn messages(&self, severity: Severity) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.message.clone())
            .collect()
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        self.records.borrow_mut().push(diagnostic.clone());
    }
}

pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _diagnostic: &Diagnostic) {}
}

// ============================================================================
// COUNTING FRONT END
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub notes: usize,
    pub warnings: usize,
    pub errors: usize,
}

/// Counts every diagnostic and forwards it to the sink.
pub struct Diagnostics {
    sink: Box<dyn DiagnosticSink>,
    counts: Counts,
    once: HashSet<String>,
}

impl Diagnostics {
    pub fn new(sink: Box<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            counts: Counts::default(),
            once: HashSet::new(),
        }
    }

    pub fn report(
        &mut self,
        severity: Severity,
        message: impl Into<String>,
        location: Option<&SourceLocation>,
    ) {
        match severity {
            Severity::Note => self.counts.notes += 1,
            Severity::Warning => self.counts.warnings += 1,
            Severity::Error => self.counts.errors += 1,
        }
        let diagnostic = Diagnostic {
            severity,
            message: message.into(),
            location: location.cloned(),
        };
        log::debug!("{}", diagnostic);
        self.sink.emit(&diagnostic);
    }

    pub fn note(&mut self, message: impl Into<String>, location: Option<&SourceLocation>) {
        self.report(Severity::Note, message, location);
    }

    pub fn warn(&mut self, message: impl Into<String>, location: Option<&SourceLocation>) {
        self.report(Severity::Warning, message, location);
    }

    pub fn error(&mut self, message: impl Into<String>, location: Option<&SourceLocation>) {
        self.report(Severity::Error, message, location);
    }

    /// Reports a message only the first time its text is seen.
    pub fn warn_once(&mut self, message: impl Into<String>, location: Option<&SourceLocation>) {
        let message = message.into();
        if self.once.insert(message.clone()) {
            self.warn(message, location);
        }
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn has_errors(&self) -> bool {
        self.counts.errors > 0
    }

    /// End-of-stream summary, e.g. `2 warnings, 1 error`.
    pub fn summary(&self) -> String {
        format!(
            "{} warning{}, {} error{}",
            self.counts.warnings,
            plural(self.counts.warnings),
            self.counts.errors,
            plural(self.counts.errors)
        )
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity_and_forwards() {
        let sink = MemorySink::new();
        let mut diagnostics = Diagnostics::new(Box::new(sink.clone()));
        diagnostics.warn("w1", None);
        diagnostics.error("e1", Some(&SourceLocation::new("f", 2)));
        diagnostics.note("n1", None);

        assert_eq!(
            diagnostics.counts(),
            Counts {
                notes: 1,
                warnings: 1,
                errors: 1
            }
        );
        assert_eq!(sink.messages(Severity::Error), vec!["e1".to_string()]);
        assert_eq!(diagnostics.summary(), "1 warning, 1 error");
    }

    #[test]
    fn warn_once_deduplicates() {
        let sink = MemorySink::new();
        let mut diagnostics = Diagnostics::new(Box::new(sink.clone()));
        diagnostics.warn_once("same", None);
        diagnostics.warn_once("same", None);
        assert_eq!(sink.records().len(), 1);
        assert_eq!(diagnostics.counts().warnings, 1);
    }

    #[test]
    fn display_shows_label_and_location() {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            message: "folder not found: 'x'".into(),
            location: Some(SourceLocation::new("a.c", 9)),
        };
        assert_eq!(
            diagnostic.to_string(),
            "[WARNING] folder not found: 'x' @a.c:9"
        );
    }
}
