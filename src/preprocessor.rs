//! Streaming driver.
//!
//! [`Preprocessor`] owns a [`Session`] and a [`LineAssembler`]. Input arrives
//! in arbitrary chunks through [`Preprocessor::feed`]; every complete logical
//! line is expanded and rendered to the output sink before `feed` returns.
//! [`Preprocessor::finish`] processes the last partial line and reports
//! anything left open.

use crate::config::Options;
use crate::diagnostics::{Counts, Diagnostic, DiagnosticSink, MemorySink};
use crate::directives::include::{FileSystem, OsFileSystem};
use crate::engine::{Expanded, ExpansionStats};
use crate::errors::{ErrorContext, ErrorKind, PreprocError};
use crate::output::{OutputBuffer, OutputSink};
use crate::session::Session;
use crate::syntax::assembler::{LineAssembler, LogicalLine};
use crate::syntax::{find_unquoted, split_eol, SyntaxError, EOL_MARK};

/// Feeds chunks through a [`Session`] and renders each logical line to `O`.
///
/// # Error Handling
///
/// `feed` and `finish` stop at the first fatal error. The output already
/// emitted stays in the sink, and the session can be inspected for the
/// diagnostics collected so far.
///
/// # Example
/// ```rust
/// use rexpp::diagnostics::NullSink;
/// use rexpp::directives::include::MemoryFileSystem;
/// use rexpp::output::OutputBuffer;
/// use rexpp::{Options, Preprocessor};
///
/// let mut pp = Preprocessor::new(
///     Options::default(),
///     Box::new(NullSink),
///     Box::new(MemoryFileSystem::new()),
///     OutputBuffer::new(),
/// )
/// .unwrap();
/// pp.feed("#define N 4\nN +").unwrap();
/// pp.feed(" 2\n").unwrap();
/// pp.finish().unwrap();
/// assert!(pp.output().as_str().ends_with("\n4 + 2\n"));
/// ```
pub struct Preprocessor<O: OutputSink> {
    session: Session,
    assembler: LineAssembler,
    output: O,
    echo: Option<Box<dyn OutputSink>>,
}

impl<O: OutputSink> Preprocessor<O> {
    pub fn new(
        options: Options,
        sink: Box<dyn DiagnosticSink>,
        fs: Box<dyn FileSystem>,
        output: O,
    ) -> Result<Self, PreprocError> {
        Ok(Self {
            session: Session::new(options, sink, fs)?,
            assembler: LineAssembler::new(),
            output,
            echo: None,
        })
    }

    /// Copies every input line to `echo` when the `echo` option is set.
    pub fn with_echo(mut self, echo: Box<dyn OutputSink>) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn into_output(self) -> O {
        self.output
    }

    /// Consumes a chunk of input and processes every line it completes.
    pub fn feed(&mut self, chunk: &str) -> Result<(), PreprocError> {
        let pushed = self.assembler.push(chunk);
        self.check_input(pushed, chunk)?;
        while let Some(line) = self.assembler.next_line() {
            self.process_line(line)?;
        }
        Ok(())
    }

    /// Processes a complete text as one chunk.
    pub fn process_str(&mut self, text: &str) -> Result<(), PreprocError> {
        self.feed(text)
    }

    /// Processes the remaining input and closes the stream.
    pub fn finish(&mut self) -> Result<(), PreprocError> {
        loop {
            while let Some(line) = self.assembler.next_line() {
                self.process_line(line)?;
            }
            match self.assembler.flush() {
                Some(line) => self.process_line(line)?,
                None => break,
            }
        }
        let depth = self.session.conditions.depth();
        if depth > 0 {
            let location = self.session.location.clone();
            self.session.diagnostics.warn(
                format!("unterminated #if ({} level{} open)", depth, if depth == 1 { "" } else { "s" }),
                Some(&location),
            );
        }
        let stats = &self.session.stats;
        log::info!(
            "{} expansions, {} substitutions, max {} iterations, {} compiles ({} failed), {} recompiles ({} failed)",
            stats.expansions,
            stats.substitutions,
            stats.max_iterations,
            stats.compiles_ok,
            stats.compiles_failed,
            stats.recompiles_ok,
            stats.recompiles_failed
        );
        Ok(())
    }

    fn check_input(&self, result: Result<(), SyntaxError>, text: &str) -> Result<(), PreprocError> {
        match result {
            Ok(()) => Ok(()),
            Err(SyntaxError::Reserved { ch, offset }) => {
                let errors = ErrorContext::new("input", &self.session.location, text);
                Err(errors.report_whole(ErrorKind::ReservedCharacter { ch, offset }))
            }
            Err(SyntaxError::LengthChanged { before, after }) => {
                let errors = ErrorContext::new("input", &self.session.location, text);
                Err(errors.report_whole(ErrorKind::TagLengthChanged { before, after }))
            }
        }
    }

    fn process_line(&mut self, line: LogicalLine) -> Result<(), PreprocError> {
        if self.session.options.echo {
            if let Some(echo) = self.echo.as_mut() {
                echo.emit(&line.text);
            }
        }
        let text = self.mark_comment(&line.text);
        self.session.begin_line(line.physical_lines);
        log::trace!("line {}: {:?}", self.session.location, text);

        let rendered = match self.session.expand(&text, true)? {
            Expanded::Text(expanded) => self.render_text(&expanded),
            Expanded::Suppressed if self.session.options.dead => self.render_comment(&text),
            Expanded::Suppressed => "\n".repeat(line.physical_lines.saturating_sub(1)),
        };
        let rendered = if self.session.options.linenums {
            self.number_lines(&rendered)
        } else {
            rendered
        };
        self.output.emit(&rendered);
        self.session.end_line();

        if let Some(injected) = self.session.take_injected() {
            let prepended = self.assembler.prepend(&injected);
            self.check_input(prepended, &injected)?;
        }
        Ok(())
    }

    /// Turns the first unquoted `eol` marker into the internal comment marker.
    fn mark_comment(&self, text: &str) -> String {
        let Some(marker) = self.session.options.eol.as_deref() else {
            return text.to_string();
        };
        match find_unquoted(text, marker) {
            Some(at) => format!("{}{}{}", &text[..at], EOL_MARK, &text[at + marker.len()..]),
            None => text.to_string(),
        }
    }

    /// Code as is; every physical line of the comment tail gets the marker.
    fn render_text(&self, expanded: &str) -> String {
        let (code, tail) = split_eol(expanded);
        if tail.is_empty() {
            return code.to_string();
        }
        format!("{}{}", code, self.render_tail(tail))
    }

    fn render_comment(&self, text: &str) -> String {
        let text = match text.find(EOL_MARK) {
            Some(_) => text.to_string(),
            None => format!("{}{}", EOL_MARK, text),
        };
        let (code, tail) = split_eol(&text);
        let marker = self.session.options.eol_marker();
        let code = code.replace('\n', &format!("\n{}", marker));
        let code = if code.is_empty() {
            code
        } else {
            format!("{}{}", marker, code)
        };
        format!("{}{}", code, self.render_tail(tail))
    }

    fn render_tail(&self, tail: &str) -> String {
        let marker = self.session.options.eol_marker();
        tail.replace('\n', &format!("\n{}", EOL_MARK))
            .replace(EOL_MARK, marker)
    }

    fn number_lines(&self, rendered: &str) -> String {
        let location = &self.session.location;
        rendered
            .split('\n')
            .enumerate()
            .map(|(index, line)| format!("{}:{}: {}", location.file, location.line + index, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// ONE-SHOT API
// ============================================================================

/// The result of preprocessing a complete text.
#[derive(Debug, Clone)]
pub struct Processed {
    pub output: String,
    pub diagnostics: Vec<Diagnostic>,
    pub counts: Counts,
    pub stats: ExpansionStats,
}

/// Preprocesses `input` against the real file system.
pub fn preprocess(input: &str, options: Options) -> Result<Processed, PreprocError> {
    preprocess_with(input, options, Box::new(OsFileSystem))
}

/// Preprocesses `input`, resolving includes through `fs`.
pub fn preprocess_with(
    input: &str,
    options: Options,
    fs: Box<dyn FileSystem>,
) -> Result<Processed, PreprocError> {
    let sink = MemorySink::new();
    let mut preprocessor = Preprocessor::new(options, Box::new(sink.clone()), fs, OutputBuffer::new())?;
    preprocessor.feed(input)?;
    preprocessor.finish()?;
    let counts = preprocessor.session().diagnostics.counts();
    let stats = preprocessor.session().stats.clone();
    Ok(Processed {
        output: preprocessor.into_output().buffer,
        diagnostics: sink.records(),
        counts,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::include::MemoryFileSystem;

    fn run(input: &str) -> String {
        preprocess_with(input, Options::default(), Box::new(MemoryFileSystem::new()))
            .unwrap()
            .output
    }

    #[test]
    fn directives_become_comments() {
        assert_eq!(run("#define A 1\nA\n"), "//#define A 1 => new named macro[0]\n1\n");
    }

    #[test]
    fn dead_lines_are_commented_or_blank() {
        assert_eq!(
            run("#if 0\nX\n#endif\n"),
            "//#if 0 => conditional push (false)\n//X\n//#endif => conditional pop (empty/on)\n"
        );
        let options = Options {
            dead: false,
            ..Options::default()
        };
        let out = preprocess_with("#if 0\nX \\\n Y\n#endif\n", options, Box::new(MemoryFileSystem::new()))
            .unwrap()
            .output;
        assert_eq!(out.lines().count(), 4);
        assert_eq!(out.lines().nth(1), Some(""));
    }

    #[test]
    fn continued_directives_keep_their_line_count() {
        let out = run("#define X \\\n  1\nX\n");
        assert_eq!(out, "//#define X\n//1 => new named macro[0]\n1\n");
    }

    #[test]
    fn eol_marker_protects_comments() {
        let options = Options {
            eol: Some(";;".to_string()),
            ..Options::default()
        };
        let out = preprocess_with(
            "#define A 1\nA ;; A\n",
            options,
            Box::new(MemoryFileSystem::new()),
        )
        .unwrap()
        .output;
        assert!(out.ends_with("1 ;; A\n"));
    }

    #[test]
    fn linenums_prefix_each_line() {
        let options = Options {
            linenums: true,
            ..Options::default()
        };
        let out = preprocess_with("a\nb\n", options, Box::new(MemoryFileSystem::new()))
            .unwrap()
            .output;
        assert_eq!(out, "stdin:1: a\nstdin:2: b\n");
    }

    #[test]
    fn unterminated_if_warns_at_finish() {
        let processed =
            preprocess_with("#if 1\n", Options::default(), Box::new(MemoryFileSystem::new())).unwrap();
        assert_eq!(processed.counts.warnings, 1);
    }

    #[test]
    fn reserved_characters_are_fatal() {
        let err = preprocess_with("a\u{1e}b\n", Options::default(), Box::new(MemoryFileSystem::new()))
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReservedCharacter { .. }));
    }
}
