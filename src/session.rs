//! Per-stream preprocessing state.

use crate::config::Options;
use crate::diagnostics::{DiagnosticSink, Diagnostics};
use crate::directives::{self, conditional::ConditionalStack, include::FileSystem, include::IncludePaths};
use crate::engine::{self, Expanded, ExpansionStats};
use crate::errors::PreprocError;
use crate::location::SourceLocation;
use crate::macros::{DefineOutcome, Macro, MacroKind, MacroTable};

/// An include whose content is still being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInclude {
    pub file: String,
    pub included_from: SourceLocation,
    /// Where the closing `#line` marker returns to.
    pub resume: SourceLocation,
}

/// Everything one stream needs: the macro table, the conditional stack,
/// the current location and the collaborators that reach the outside.
///
/// # Error Handling
///
/// Recoverable problems go to `diagnostics` and processing continues.
/// Methods returning `Result` fail only with fatal [`PreprocError`]s.
///
/// # Thread Safety
///
/// Not `Sync`. One session serves one stream; independent streams need
/// independent sessions.
pub struct Session {
    pub table: MacroTable,
    pub conditions: ConditionalStack,
    pub location: SourceLocation,
    pub includes: IncludePaths,
    pub diagnostics: Diagnostics,
    pub fs: Box<dyn FileSystem>,
    pub options: Options,
    pub stats: ExpansionStats,
    /// Location for the next line, set by `#line`.
    pub(crate) next_location: Option<SourceLocation>,
    /// Physical lines in the logical line being processed.
    pub(crate) line_span: usize,
    /// Text to process before the rest of the input, set by `#include`.
    pub(crate) injected: String,
    /// Macros currently being invoked or compiled, outermost first.
    pub(crate) trace: Vec<String>,
    /// Nesting of `expand` calls.
    pub(crate) depth: usize,
    /// Includes entered and not yet left, outermost first.
    pub(crate) open_includes: Vec<OpenInclude>,
}

impl Session {
    /// Creates a session and installs the built-in directives.
    pub fn new(
        options: Options,
        sink: Box<dyn DiagnosticSink>,
        fs: Box<dyn FileSystem>,
    ) -> Result<Self, PreprocError> {
        let mut session = Self {
            table: MacroTable::new(),
            conditions: ConditionalStack::new(),
            location: SourceLocation::new(options.input_name.clone(), 1),
            includes: IncludePaths::new(options.default_include_folders()),
            diagnostics: Diagnostics::new(sink),
            fs,
            options,
            stats: ExpansionStats::default(),
            next_location: None,
            line_span: 1,
            injected: String::new(),
            trace: Vec::new(),
            depth: 0,
            open_includes: Vec::new(),
        };
        directives::install(&mut session)?;
        Ok(session)
    }

    /// Expands one line at the current location.
    pub fn expand(&mut self, line: &str, allow_functions: bool) -> Result<Expanded, PreprocError> {
        engine::expand(self, line, allow_functions)
    }

    /// Adds a macro to the table and reports duplicate or conflicting definitions.
    pub fn define(&mut self, mac: Macro) -> DefineOutcome {
        let previous = self.table.get(&mac.key).map(|old| old.defined_at.clone());
        let kind = match mac.kind {
            MacroKind::Named => "named",
            MacroKind::Pattern => "regex",
        };
        let key = mac.key.clone();
        let at = mac.defined_at.clone();
        let outcome = self.table.define(mac);
        if let Some(previous) = previous {
            let message = format!(
                "{} macro '{}' redefined {} (previous was {})",
                kind, key, at, previous
            );
            match outcome {
                DefineOutcome::Duplicate => self.diagnostics.warn(message, Some(&at)),
                DefineOutcome::Redefined => self.diagnostics.error(message, Some(&at)),
                DefineOutcome::New => {}
            }
        }
        outcome
    }

    /// Sets the location of the next line.
    pub fn relocate(&mut self, location: SourceLocation) {
        self.next_location = Some(location);
    }

    /// Line number just past the logical line being processed.
    pub fn resume_line(&self) -> usize {
        self.location.line + self.line_span
    }

    pub fn open_includes(&self) -> &[OpenInclude] {
        &self.open_includes
    }

    pub(crate) fn enter_include(&mut self, include: OpenInclude) {
        self.open_includes.push(include);
    }

    /// A relocation to where the innermost include resumes closes it.
    pub(crate) fn leave_include(&mut self, location: &SourceLocation) {
        if self.open_includes.last().map_or(false, |open| &open.resume == location) {
            self.open_includes.pop();
        }
    }

    /// Queues text to be read before the rest of the input.
    pub fn inject(&mut self, text: &str) {
        self.injected.push_str(text);
    }

    pub(crate) fn take_injected(&mut self) -> Option<String> {
        if self.injected.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.injected))
        }
    }

    pub(crate) fn begin_line(&mut self, physical_lines: usize) {
        self.line_span = physical_lines.max(1);
    }

    /// Moves past the current logical line, honoring any `#line` relocation.
    pub(crate) fn end_line(&mut self) {
        match self.next_location.take() {
            Some(location) => self.location = location,
            None => self.location.line += self.line_span,
        }
        self.line_span = 1;
    }

    /// Whether the engine is expanding a whole input line rather than a
    /// nested expression or function body.
    pub fn at_top_level(&self) -> bool {
        self.depth <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{MemorySink, Severity};
    use crate::directives::include::MemoryFileSystem;
    use crate::macros::parse_define;

    fn session(sink: &MemorySink) -> Session {
        Session::new(
            Options::default(),
            Box::new(sink.clone()),
            Box::new(MemoryFileSystem::new()),
        )
        .unwrap()
    }

    fn mac(line: &str, at: usize) -> Macro {
        let parts = parse_define(line).unwrap().unwrap();
        Macro::from_parts(parts, SourceLocation::new("t.c", at)).unwrap()
    }

    #[test]
    fn duplicate_definitions_warn_and_conflicts_error() {
        let sink = MemorySink::new();
        let mut session = session(&sink);
        session.define(mac("#define A 1", 1));
        session.define(mac("#define A 1", 2));
        session.define(mac("#define A 2", 3));
        assert_eq!(sink.messages(Severity::Warning).len(), 1);
        let errors = sink.messages(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("previous was @t.c:2"));
        assert_eq!(session.table.get("A").map(|m| m.body.as_str()), Some("2"));
    }

    #[test]
    fn lines_advance_unless_relocated() {
        let sink = MemorySink::new();
        let mut session = session(&sink);
        session.begin_line(3);
        assert_eq!(session.resume_line(), 4);
        session.end_line();
        assert_eq!(session.location.line, 4);
        session.relocate(SourceLocation::new("x.h", 1));
        session.end_line();
        assert_eq!(session.location, SourceLocation::new("x.h", 1));
    }
}
