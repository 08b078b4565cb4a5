//! Fatal preprocessing errors.
//!
//! Anything reported through [`PreprocError`] aborts the whole run. Recoverable
//! problems (warnings and errors that let processing continue) go through
//! [`crate::diagnostics::Diagnostics`] instead and never unwind.

use crate::location::SourceLocation;
use miette::{Diagnostic, LabeledSpan, NamedSource, SourceSpan};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// SOURCE CONTEXT
// ============================================================================

/// The text a fatal error points into, usually the logical line being expanded.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    pub fn from_line(location: &SourceLocation, content: impl Into<String>) -> Self {
        Self {
            name: location.to_string(),
            content: content.into(),
        }
    }

    /// Use only when no line text is available.
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "rexpp".to_string(),
            content: context.to_string(),
        }
    }

    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

// ============================================================================
// ERROR TYPE
// ============================================================================

/// The single fatal error type.
#[derive(Debug)]
pub struct PreprocError {
    pub kind: ErrorKind,
    pub source_info: SourceInfo,
    pub diagnostic_info: DiagnosticInfo,
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Input errors
    ReservedCharacter { ch: char, offset: usize },
    Io { path: String, reason: String },

    // Tagging invariants
    TagLengthChanged { before: usize, after: usize },

    // Definition errors
    MalformedDefinition { reason: String },
    InvalidPattern { pattern: String, reason: String },

    // Expansion errors
    CompileFailed { macro_name: String, reason: String },
    IterationLimit { limit: usize },
    ReplacementLimit { macro_name: String, limit: usize },

    // Include errors
    IncludeDepth { limit: usize },
    Internal { message: String },
}

#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

impl ErrorKind {
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::ReservedCharacter { .. } => "reserved_character",
            Self::Io { .. } => "io",
            Self::TagLengthChanged { .. } => "tag_length_changed",
            Self::MalformedDefinition { .. } => "malformed_definition",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::CompileFailed { .. } => "compile_failed",
            Self::IterationLimit { .. } => "iteration_limit",
            Self::ReplacementLimit { .. } => "replacement_limit",
            Self::IncludeDepth { .. } => "include_depth",
            Self::Internal { .. } => "internal",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::ReservedCharacter { .. } => "reserved character",
            Self::Io { .. } => "while reading this",
            Self::TagLengthChanged { .. } => "tagged here",
            Self::MalformedDefinition { .. } => "cannot parse this definition",
            Self::InvalidPattern { .. } => "invalid pattern",
            Self::CompileFailed { .. } => "invoked here",
            Self::IterationLimit { .. } => "still changing",
            Self::ReplacementLimit { .. } => "too many replacements",
            Self::IncludeDepth { .. } => "included here",
            Self::Internal { .. } => "here",
        }
    }
}

impl std::error::Error for PreprocError {}

impl fmt::Display for PreprocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::ReservedCharacter { ch, offset } => write!(
                f,
                "Input error: reserved character U+{:04X} at offset {}",
                *ch as u32, offset
            ),
            ErrorKind::Io { path, reason } => {
                write!(f, "I/O error: '{}': {}", path, reason)
            }
            ErrorKind::TagLengthChanged { before, after } => write!(
                f,
                "Internal error: tagging changed line length from {} to {}",
                before, after
            ),
            ErrorKind::MalformedDefinition { reason } => {
                write!(f, "Definition error: {}", reason)
            }
            ErrorKind::InvalidPattern { pattern, reason } => {
                write!(f, "Definition error: invalid pattern '{}': {}", pattern, reason)
            }
            ErrorKind::CompileFailed { macro_name, reason } => write!(
                f,
                "Compile error: function macro '{}' does not compile: {}",
                macro_name, reason
            ),
            ErrorKind::IterationLimit { limit } => write!(
                f,
                "Expansion error: line still changing after {} iterations (infinite loop?)",
                limit
            ),
            ErrorKind::ReplacementLimit { macro_name, limit } => write!(
                f,
                "Expansion error: macro '{}' replaced more than {} matches in one pass (infinite loop?)",
                macro_name, limit
            ),
            ErrorKind::IncludeDepth { limit } => write!(
                f,
                "Include error: includes nested more than {} levels deep (recursive include?)",
                limit
            ),
            ErrorKind::Internal { message } => write!(f, "Internal error: {}", message),
        }?;
        if let Some(location) = &self.location {
            write!(f, " {}", location)?;
        }
        Ok(())
    }
}

impl Diagnostic for PreprocError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.kind.label().to_string()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

impl PreprocError {
    /// Appends the engine call trace to the help text.
    pub fn with_trace(mut self, frames: &[String]) -> Self {
        if frames.is_empty() {
            return self;
        }
        let trace = frames
            .iter()
            .rev()
            .enumerate()
            .map(|(depth, frame)| format!("  #{} {}", depth, frame))
            .collect::<Vec<_>>()
            .join("\n");
        let help = match self.diagnostic_info.help.take() {
            Some(help) => format!("{}\nengine trace:\n{}", help, trace),
            None => format!("engine trace:\n{}", trace),
        };
        self.diagnostic_info.help = Some(help);
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.diagnostic_info.help = Some(help.into());
        self
    }
}

// ============================================================================
// ERROR CONSTRUCTION
// ============================================================================

/// Builds [`PreprocError`]s for one phase of processing.
pub struct ErrorContext {
    pub source: SourceContext,
    pub phase: &'static str,
    pub location: Option<SourceLocation>,
}

impl ErrorContext {
    pub fn new(phase: &'static str, location: &SourceLocation, line: &str) -> Self {
        Self {
            source: SourceContext::from_line(location, line),
            phase,
            location: Some(location.clone()),
        }
    }

    pub fn detached(phase: &'static str, context: &str) -> Self {
        Self {
            source: SourceContext::fallback(context),
            phase,
            location: None,
        }
    }

    pub fn report(&self, kind: ErrorKind, span: SourceSpan) -> PreprocError {
        let error_code = format!("rexpp::{}::{}", self.phase, kind.code_suffix());
        PreprocError {
            kind,
            source_info: SourceInfo {
                source: self.source.to_named_source(),
                primary_span: span,
                phase: self.phase.to_string(),
            },
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
            location: self.location.clone(),
        }
    }

    /// Reports against the whole source text.
    pub fn report_whole(&self, kind: ErrorKind) -> PreprocError {
        let span = whole_span(&self.source.content);
        self.report(kind, span)
    }
}

pub fn whole_span(text: &str) -> SourceSpan {
    SourceSpan::from(0..text.len())
}

/// A placeholder span for errors not tied to a specific offset.
pub fn unspanned() -> SourceSpan {
    SourceSpan::from(0..0)
}

/// Prints a fatal error with full miette diagnostics.
pub fn print_error(error: PreprocError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_names_phase_and_kind() {
        let context = ErrorContext::new("expand", &SourceLocation::new("a.c", 4), "X X");
        let error = context.report_whole(ErrorKind::IterationLimit { limit: 20 });
        assert_eq!(error.diagnostic_info.error_code, "rexpp::expand::iteration_limit");
        assert!(error.to_string().contains("after 20 iterations"));
        assert!(error.to_string().ends_with("@a.c:4"));
    }

    #[test]
    fn trace_is_listed_innermost_first() {
        let context = ErrorContext::detached("compile", "{ x }");
        let error = context
            .report_whole(ErrorKind::CompileFailed {
                macro_name: "F".into(),
                reason: "bad".into(),
            })
            .with_trace(&["invoke F".to_string(), "compile F".to_string()]);
        let help = error.diagnostic_info.help.unwrap_or_default();
        assert!(help.contains("#0 compile F"));
        assert!(help.contains("#1 invoke F"));
    }
}
