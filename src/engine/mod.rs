//! The fixed-point expansion loop.
//!
//! One call to [`expand`] repeatedly applies every live macro, in table
//! order, to the code part of a line until a pass changes nothing. The
//! comment tail after [`EOL_MARK`] is carried along untouched. A function
//! macro can end the loop early by returning [`MacroResult::Final`], or drop
//! the whole line with [`MacroResult::Suppress`].
//!
//! # Error Handling
//!
//! Runaway expansion is fatal: more than `max_iterations` passes over one
//! line, or more than `max_replacements` replacements by one macro in one
//! pass, returns a [`PreprocError`] whose help lists the macros being
//! invoked or compiled at the time. Unbalanced brackets only warn, once per
//! distinct message per line.

use crate::directives;
use crate::errors::{ErrorContext, ErrorKind, PreprocError};
use crate::macros::{template, Callable, MatchSite};
use crate::script::parse_function_body;
use crate::session::Session;
use crate::syntax::tagger::{tag, TaggedText};
use crate::syntax::{protected_spans, split_eol, SyntaxError, EOL_MARK};
use difference::{Changeset, Difference};
use serde::Serialize;
use std::collections::HashSet;
use std::rc::Rc;

// ============================================================================
// RESULTS
// ============================================================================

/// What a function macro did with one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroResult {
    /// Leave the matched text as it is.
    Unchanged,
    /// Replace the match and keep expanding.
    Continue(String),
    /// Replace the match and stop expanding this line.
    Final(String),
    /// Drop the whole line.
    Suppress,
}

/// The outcome of expanding one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expanded {
    Text(String),
    Suppressed,
}

impl Expanded {
    /// The expanded text, or `fallback` for a suppressed line.
    pub fn text_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        match self {
            Expanded::Text(text) => text,
            Expanded::Suppressed => fallback,
        }
    }
}

/// Counters reported at the end of a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpansionStats {
    pub expansions: usize,
    pub substitutions: usize,
    pub max_iterations: usize,
    pub compiles_ok: usize,
    pub recompiles_ok: usize,
    pub compiles_failed: usize,
    pub recompiles_failed: usize,
}

enum Pass {
    Done { text: String, cancelled: bool },
    Suppressed,
}

// ============================================================================
// EXPANSION LOOP
// ============================================================================

/// Expands `line` to a fixed point. Function macros are skipped when
/// `allow_functions` is false (used when expanding function bodies).
pub fn expand(
    session: &mut Session,
    line: &str,
    allow_functions: bool,
) -> Result<Expanded, PreprocError> {
    session.depth += 1;
    let result = expand_to_fixed_point(session, line, allow_functions);
    session.depth -= 1;
    result
}

fn expand_to_fixed_point(
    session: &mut Session,
    line: &str,
    allow_functions: bool,
) -> Result<Expanded, PreprocError> {
    session.stats.expansions += 1;
    let errors = ErrorContext::new("expand", &session.location, line);
    let limit = session.options.max_iterations;
    let mut warned = HashSet::new();
    let mut buffer = line.to_string();
    let mut iteration = 0;

    loop {
        if iteration >= limit {
            return Err(errors
                .report_whole(ErrorKind::IterationLimit { limit })
                .with_trace(&session.trace));
        }
        iteration += 1;

        let (text, cancelled) = match apply_pass(session, &buffer, allow_functions, &mut warned, &errors)? {
            Pass::Suppressed => {
                log::debug!("line suppressed {}", session.location);
                return Ok(Expanded::Suppressed);
            }
            Pass::Done { text, cancelled } => (text, cancelled),
        };
        if text == buffer {
            break;
        }
        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "iteration {} {}: {}",
                iteration,
                session.location,
                render_change(&buffer, &text)
            );
        }
        buffer = text;
        if cancelled {
            break;
        }
    }

    if iteration > session.stats.max_iterations {
        session.stats.max_iterations = iteration;
    }
    Ok(Expanded::Text(buffer))
}

/// Applies every live macro once, in table order.
fn apply_pass(
    session: &mut Session,
    buffer: &str,
    allow_functions: bool,
    warned: &mut HashSet<String>,
    errors: &ErrorContext,
) -> Result<Pass, PreprocError> {
    let (code, tail) = split_eol(buffer);
    let mut code = code.to_string();
    let mut tail = tail.to_string();
    let mut tagged = tag_line(&code, errors)?;
    report_imbalance(session, &tagged, warned);

    for key in session.table.live_keys() {
        let Some(mac) = session.table.get(&key) else {
            continue;
        };
        if mac.is_function() && !allow_functions {
            continue;
        }
        let protected = protected_spans(&code);
        let sites = mac.matcher.find_all(&tagged, &protected);
        if sites.is_empty() {
            continue;
        }
        log::trace!("macro '{}' matched {} time(s)", key, sites.len());

        let (replaced, count, cancelled) = if mac.is_function() {
            match apply_function(session, &key, &code, &sites, errors)? {
                Some(applied) => applied,
                None => return Ok(Pass::Suppressed),
            }
        } else {
            let replaced = splice(&code, &sites, |site| {
                Some(template::substitute(&mac.body, &mac.params, &site.args))
            });
            (replaced, sites.len(), false)
        };

        // Matches a function macro left unchanged are not replacements.
        let limit = session.options.max_replacements;
        if count > limit {
            return Err(errors
                .report_whole(ErrorKind::ReplacementLimit {
                    macro_name: key.clone(),
                    limit,
                })
                .with_trace(&session.trace));
        }

        if count > 0 {
            session.stats.substitutions += count;
            let joined = format!("{}{}", replaced, tail);
            let (new_code, new_tail) = split_eol(&joined);
            code = new_code.to_string();
            tail = new_tail.to_string();
            tagged = tag_line(&code, errors)?;
            report_imbalance(session, &tagged, warned);
        }
        if cancelled {
            return Ok(Pass::Done {
                text: format!("{}{}", code, tail),
                cancelled: true,
            });
        }
    }

    Ok(Pass::Done {
        text: format!("{}{}", code, tail),
        cancelled: false,
    })
}

/// Invokes a function macro at each site. Returns the new code, the number of
/// replacements and whether expansion was cancelled, or `None` to suppress.
fn apply_function(
    session: &mut Session,
    key: &str,
    code: &str,
    sites: &[MatchSite],
    errors: &ErrorContext,
) -> Result<Option<(String, usize, bool)>, PreprocError> {
    let mut replacements: Vec<Option<String>> = Vec::with_capacity(sites.len());
    let mut cancelled = false;
    for site in sites {
        let matched = &code[site.range.clone()];
        match invoke(session, key, matched, &site.args, errors)? {
            MacroResult::Unchanged => replacements.push(None),
            MacroResult::Continue(text) => replacements.push(Some(text)),
            MacroResult::Final(text) => {
                replacements.push(Some(text));
                cancelled = true;
                break;
            }
            MacroResult::Suppress => return Ok(None),
        }
    }
    let count = replacements.iter().filter(|r| r.is_some()).count();
    let mut next = replacements.into_iter();
    let replaced = splice(code, sites, |_| next.next().flatten());
    Ok(Some((replaced, count, cancelled)))
}

/// Rebuilds `code` with each site replaced by `replace(site)`; `None` keeps the match.
fn splice(
    code: &str,
    sites: &[MatchSite],
    mut replace: impl FnMut(&MatchSite) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;
    for site in sites {
        out.push_str(&code[last..site.range.start]);
        match replace(site) {
            Some(text) => out.push_str(&text),
            None => out.push_str(&code[site.range.clone()]),
        }
        last = site.range.end;
    }
    out.push_str(&code[last..]);
    out
}

fn tag_line(code: &str, errors: &ErrorContext) -> Result<TaggedText, PreprocError> {
    tag(code).map_err(|err| match err {
        SyntaxError::Reserved { ch, offset } => errors.report(
            ErrorKind::ReservedCharacter { ch, offset },
            (offset, ch.len_utf8()).into(),
        ),
        SyntaxError::LengthChanged { before, after } => {
            errors.report_whole(ErrorKind::TagLengthChanged { before, after })
        }
    })
}

fn report_imbalance(session: &mut Session, tagged: &TaggedText, warned: &mut HashSet<String>) {
    if let Some(message) = tagged.imbalance() {
        if warned.insert(message.clone()) {
            let location = session.location.clone();
            session.diagnostics.warn(message, Some(&location));
        }
    }
}

/// Word-level diff of one iteration, `[-old-]{+new+}`.
fn render_change(before: &str, after: &str) -> String {
    let before = before.replace(EOL_MARK, " // ");
    let after = after.replace(EOL_MARK, " // ");
    let changeset = Changeset::new(&before, &after, " ");
    changeset
        .diffs
        .iter()
        .map(|diff| match diff {
            Difference::Same(text) => text.clone(),
            Difference::Add(text) => format!("{{+{}+}}", text),
            Difference::Rem(text) => format!("[-{}-]", text),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// FUNCTION MACROS
// ============================================================================

/// Calls the function macro `key` for one match.
pub fn invoke(
    session: &mut Session,
    key: &str,
    matched: &str,
    args: &[Option<String>],
    errors: &ErrorContext,
) -> Result<MacroResult, PreprocError> {
    ensure_compiled(session, key, errors)?;
    let Some(mac) = session.table.get(key) else {
        return Ok(MacroResult::Unchanged);
    };
    let callable = mac.compiled.clone();
    let params = mac.params.clone();
    session
        .trace
        .push(format!("invoke '{}' defined {}", key, mac.defined_at));
    let result = match callable {
        Some(Callable::Native(directive)) => directives::run(directive, session, matched, args),
        Some(Callable::Script(program)) => {
            directives::host::call_script(session, key, &program, &params, matched, args)
        }
        None => Err(errors.report_whole(ErrorKind::Internal {
            message: format!("function macro '{}' has no compiled body", key),
        })),
    };
    session.trace.pop();
    result
}

/// Compiles the body of function macro `key` if it was never compiled or
/// the table changed since. The macro is taken out of the table while its
/// body is expanded, so it cannot match inside its own body.
pub fn ensure_compiled(
    session: &mut Session,
    key: &str,
    errors: &ErrorContext,
) -> Result<(), PreprocError> {
    let version = session.table.version();
    let recompile = match session.table.get(key) {
        Some(mac) if mac.is_function() && mac.is_stale(version) => mac.compiled.is_some(),
        _ => return Ok(()),
    };
    let Some(mut mac) = session.table.detach(key) else {
        return Ok(());
    };
    log::debug!(
        "{} '{}' (v{})",
        if recompile { "recompile" } else { "compile" },
        key,
        version
    );

    session.trace.push(format!("compile '{}' defined {}", key, mac.defined_at));
    let expanded = expand(session, &mac.body, false);
    session.trace.pop();

    let expanded = match expanded {
        Ok(expanded) => expanded,
        Err(err) => {
            session.table.reattach(mac);
            return Err(err);
        }
    };
    let source = split_eol(expanded.text_or(&mac.body)).0.to_string();
    match parse_function_body(&source) {
        Ok(program) => {
            mac.compiled = Some(Callable::Script(Rc::new(program)));
            mac.compiled_at = Some(session.table.version());
            if recompile {
                session.stats.recompiles_ok += 1;
            } else {
                session.stats.compiles_ok += 1;
            }
            session.table.reattach(mac);
            Ok(())
        }
        Err(reason) => {
            if recompile {
                session.stats.recompiles_failed += 1;
            } else {
                session.stats.compiles_failed += 1;
            }
            let trace = session.trace.clone();
            session.table.reattach(mac);
            Err(errors
                .report_whole(ErrorKind::CompileFailed {
                    macro_name: key.to_string(),
                    reason: reason.to_string(),
                })
                .with_help(format!("compiled body: {}", source.trim()))
                .with_trace(&trace))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::diagnostics::{MemorySink, Severity};
    use crate::directives::include::MemoryFileSystem;

    fn session() -> (Session, MemorySink) {
        let sink = MemorySink::new();
        let session = Session::new(
            Options::default(),
            Box::new(sink.clone()),
            Box::new(MemoryFileSystem::new()),
        )
        .unwrap();
        (session, sink)
    }

    fn run(session: &mut Session, line: &str) -> String {
        match expand(session, line, true).unwrap() {
            Expanded::Text(text) => text,
            Expanded::Suppressed => "<suppressed>".to_string(),
        }
    }

    fn define(session: &mut Session, line: &str) {
        let out = run(session, line);
        assert!(out.starts_with(EOL_MARK), "not a definition: {}", out);
    }

    #[test]
    fn text_macro_with_arguments() {
        let (mut session, _) = session();
        define(&mut session, "#define FOO(x) x+1");
        assert_eq!(run(&mut session, "FOO(5)"), "5+1");
        assert_eq!(run(&mut session, "5+1"), "5+1");
    }

    #[test]
    fn nested_arguments_stay_whole() {
        let (mut session, _) = session();
        define(&mut session, "#define SQUARE(x) ((x)*(x))");
        assert_eq!(run(&mut session, "SQUARE(3+4)"), "((3+4)*(3+4))");
        assert_eq!(run(&mut session, "SQUARE(f(1, 2))"), "((f(1, 2))*(f(1, 2)))");
    }

    #[test]
    fn comment_tail_is_never_expanded() {
        let (mut session, _) = session();
        define(&mut session, "#define A b");
        let line = format!("A {}A", EOL_MARK);
        assert_eq!(run(&mut session, &line), format!("b {}A", EOL_MARK));
    }

    #[test]
    fn expansion_repeats_until_fixed_point() {
        let (mut session, _) = session();
        define(&mut session, "#define A B");
        define(&mut session, "#define B C");
        assert_eq!(run(&mut session, "A"), "C");
    }

    #[test]
    fn self_reintroducing_macro_hits_the_iteration_cap() {
        let (mut session, _) = session();
        define(&mut session, "#define X (X)");
        let err = expand(&mut session, "X", true).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IterationLimit { limit: 20 });
    }

    #[test]
    fn too_many_replacements_in_one_pass_are_fatal() {
        let (mut session, _) = session();
        session.options.max_replacements = 2;
        define(&mut session, "#define Y z");
        let err = expand(&mut session, "Y Y Y", true).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReplacementLimit { .. }));
    }

    #[test]
    fn unchanged_function_matches_do_not_count_as_replacements() {
        let (mut session, _) = session();
        session.options.max_replacements = 2;
        define(&mut session, "#define NOP(x) { return; }");
        assert_eq!(run(&mut session, "NOP(1) NOP(2) NOP(3)"), "NOP(1) NOP(2) NOP(3)");

        define(&mut session, "#define TWO(x) { return rescan(x + x); }");
        let err = expand(&mut session, "TWO(1) TWO(2) TWO(3)", true).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReplacementLimit { .. }));
    }

    #[test]
    fn function_macros_compile_lazily_and_recompile_when_stale() {
        let (mut session, _) = session();
        define(&mut session, "#define F() { return \"v\" + LATER; }");
        define(&mut session, "#define LATER 1");
        assert_eq!(run(&mut session, "F()"), "v1");
        assert_eq!(session.stats.compiles_ok, 1);

        define(&mut session, "#undef LATER");
        define(&mut session, "#define LATER 2");
        assert_eq!(run(&mut session, "F()"), "v2");
        assert_eq!(session.stats.recompiles_ok, 1);
    }

    #[test]
    fn function_results_cancel_the_pass() {
        let (mut session, _) = session();
        define(&mut session, "#define G(x) { return x + x; }");
        define(&mut session, "#define H(x) { return 'h'; }");
        assert_eq!(run(&mut session, "G(1) H(2)"), "11 H(2)");
    }

    #[test]
    fn rescan_keeps_expanding() {
        let (mut session, _) = session();
        define(&mut session, "#define G(x) { return rescan(x + x); }");
        define(&mut session, "#define H(x) { return 'h'; }");
        assert_eq!(run(&mut session, "G(1) H(2)"), "11 h");
    }

    #[test]
    fn unchanged_function_results_do_not_cancel() {
        let (mut session, _) = session();
        define(&mut session, "#define NOP(x) { return; }");
        define(&mut session, "#define Z 0");
        assert_eq!(run(&mut session, "NOP(1) Z"), "NOP(1) 0");
    }

    #[test]
    fn compile_failure_is_fatal() {
        let (mut session, _) = session();
        define(&mut session, "#define BAD() { return ; ; ) }");
        let err = expand(&mut session, "BAD()", true).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::CompileFailed { .. }));
        assert_eq!(session.stats.compiles_failed, 1);
        assert!(session.table.is_defined("BAD"));
    }

    #[test]
    fn unbalanced_brackets_warn_once() {
        let (mut session, sink) = session();
        run(&mut session, "(a(b");
        let warnings = sink.messages(Severity::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("unmatched '('"));
    }

    #[test]
    fn leftmost_match_wins_and_table_order_decides() {
        let (mut session, _) = session();
        define(&mut session, "#definex /ab/g() X");
        define(&mut session, "#definex /bc/g() Y");
        assert_eq!(run(&mut session, "abc"), "Xc");
        assert_eq!(run(&mut session, "abab"), "XX");
    }
}
