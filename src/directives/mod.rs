//! Built-in directives.
//!
//! Every directive is an ordinary pattern function macro. Its definition is a
//! `#definex` line parsed by the same code as user definitions; only the
//! callable differs. With [`Bootstrap::Native`] the callable is a
//! [`Directive`] handler. With [`Bootstrap::SelfHosted`] only `#define` is
//! native and the rest are script bodies from the prelude that call the
//! session builtins in [`host`]. Both routes end up in the operations below,
//! so they behave the same.

pub mod conditional;
pub mod host;
pub mod include;
mod prelude;

use crate::config::Bootstrap;
use crate::engine::{Expanded, MacroResult};
use crate::errors::{ErrorContext, ErrorKind, PreprocError};
use crate::location::SourceLocation;
use crate::macros::{parse_define, DefineError, Macro, MacroKind, MacroTable};
use crate::script::Value;
use crate::session::{OpenInclude, Session};
use crate::syntax::{defined_name, defined_operand, is_ident_char, split_eol, unquote, EOL_MARK};
use conditional::CondState;
use include::{injection, IncludeError, STDIN_NAME};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    If,
    IfDef,
    Else,
    EndIf,
    Inactive,
    Define,
    Undef,
    Line,
    Include,
    InclFolder,
    Message,
    Dump,
}

impl Directive {
    /// Installation order, which is also application order.
    pub const ALL: [Directive; 12] = [
        Directive::If,
        Directive::IfDef,
        Directive::Else,
        Directive::EndIf,
        Directive::Inactive,
        Directive::Define,
        Directive::Undef,
        Directive::Line,
        Directive::Include,
        Directive::InclFolder,
        Directive::Message,
        Directive::Dump,
    ];

    /// The `#definex` head: pattern, flags and parameter list.
    fn head(self) -> &'static str {
        match self {
            Directive::If => r"#definex /^\s*#\s*(el)?if\b(.*)$/s(elif, expr)",
            Directive::IfDef => r"#definex /^\s*#\s*if(n)?def\b(.*)$/s(negate, rest)",
            Directive::Else => r"#definex /^\s*#\s*else\b(.*)$/s(junk)",
            Directive::EndIf => r"#definex /^\s*#\s*endif\b(.*)$/s(junk)",
            Directive::Inactive => r"#definex /^(.*)$/s(line)",
            Directive::Define => r"#definex /^\s*#\s*definex?\b.*$/s()",
            Directive::Undef => r"#definex /^\s*#\s*undef(?:ine)?\b(.*)$/s(name)",
            Directive::Line => {
                r"#definex /^\s*#\s*(?:line\s+)?(\d+)(?:\s+(.*?))?\s*$/s(number, file)"
            }
            Directive::Include => r"#definex /^\s*#\s*include\b(.*)$/s(expr)",
            Directive::InclFolder => r"#definex /^\s*#\s*incl_folder\b(.*)$/s(expr)",
            Directive::Message => {
                r"#definex /^\s*#\s*(?:pragma\s+)?(message|warning|error)\b(.*)$/s(kind, text)"
            }
            Directive::Dump => r"#definex /^\s*#\s*dump\b(.*)$/s(junk)",
        }
    }
}

/// The replacement for a handled directive line: the line moved into the
/// comment tail, followed by what happened.
pub fn commented(matched: &str, description: &str) -> String {
    format!("{}{} => {}", EOL_MARK, matched, description)
}

// ============================================================================
// BOOTSTRAP
// ============================================================================

/// Installs the built-in directives into a fresh session.
pub fn install(session: &mut Session) -> Result<(), PreprocError> {
    let bootstrap = session.options.bootstrap;
    for directive in Directive::ALL {
        let native = bootstrap == Bootstrap::Native || directive == Directive::Define;
        let text = if native {
            format!("{} {{ native }}", directive.head())
        } else {
            format!("{} {}", directive.head(), prelude::script_body(directive))
        };
        let errors = ErrorContext::detached("bootstrap", &text);
        let malformed = |err: DefineError| {
            errors.report_whole(ErrorKind::MalformedDefinition {
                reason: err.to_string(),
            })
        };
        let parts = parse_define(&text)
            .map_err(malformed)?
            .ok_or_else(|| {
                errors.report_whole(ErrorKind::Internal {
                    message: format!("built-in {:?} is not a definition", directive),
                })
            })?;
        let location = SourceLocation::builtin();
        let mac = if native {
            Macro::native(parts, directive, location)
        } else {
            Macro::from_parts(parts, location)
        }
        .map_err(malformed)?;
        session.table.define(mac);
    }
    log::debug!(
        "installed {} built-in directives ({:?})",
        Directive::ALL.len(),
        bootstrap
    );
    Ok(())
}

/// Runs a native directive handler for one match.
pub fn run(
    directive: Directive,
    session: &mut Session,
    matched: &str,
    args: &[Option<String>],
) -> Result<MacroResult, PreprocError> {
    let arg = |index: usize| args.get(index).cloned().flatten();
    let text = |index: usize| arg(index).unwrap_or_default();
    let flag = |index: usize| arg(index).map_or(false, |value| !value.is_empty());

    let result = match directive {
        Directive::If => MacroResult::Final(cond_if(session, matched, flag(0), &text(1))?),
        Directive::IfDef => MacroResult::Continue(rewrite_ifdef(flag(0), &text(1))),
        Directive::Else => MacroResult::Final(cond_else(session, matched, &text(0))),
        Directive::EndIf => MacroResult::Final(cond_endif(session, matched, &text(0))),
        Directive::Inactive => {
            if line_is_live(session, matched) {
                MacroResult::Unchanged
            } else {
                MacroResult::Suppress
            }
        }
        Directive::Define => return define(session, matched),
        Directive::Undef => MacroResult::Final(undef(session, matched, &text(0))),
        Directive::Line => MacroResult::Final(set_line(session, matched, &text(0), &text(1))),
        Directive::Include => MacroResult::Final(include(session, matched, &text(0))?),
        Directive::InclFolder => MacroResult::Final(incl_folder(session, matched, &text(0))?),
        Directive::Message => MacroResult::Final(message(session, matched, &text(0), &text(1))?),
        Directive::Dump => MacroResult::Final(dump(session, matched, &text(0))),
    };
    Ok(result)
}

// ============================================================================
// CONDITIONALS
// ============================================================================

/// `#if expr` (or `#elif expr` when `elif` is set).
pub fn cond_if(
    session: &mut Session,
    matched: &str,
    elif: bool,
    expr: &str,
) -> Result<String, PreprocError> {
    if elif {
        warn_after_else(session, "elif");
        let value = if session.conditions.elif_needs_value() {
            condition_value(session, matched, expr)?
        } else {
            false
        };
        let description = match session.conditions.elif(value) {
            Ok(state) => format!("conditional flip ({})", state),
            Err(err) => {
                let location = session.location.clone();
                session.diagnostics.error(err.to_string(), Some(&location));
                "conditional flip (empty/on)".to_string()
            }
        };
        return Ok(commented(matched, &description));
    }
    let state = if session.conditions.is_active() {
        let value = condition_value(session, matched, expr)?;
        session.conditions.push(value)
    } else {
        session.conditions.push_inherited()
    };
    Ok(commented(matched, &format!("conditional push ({})", state)))
}

/// Evaluates an `#if` expression. Evaluation failures are reported and count as false.
fn condition_value(session: &mut Session, matched: &str, expr: &str) -> Result<bool, PreprocError> {
    let rewritten = rewrite_defined(expr, &session.table);
    let expanded = match session.expand(&rewritten, true)? {
        Expanded::Text(text) => split_eol(&text).0.trim().to_string(),
        Expanded::Suppressed => rewritten.trim().to_string(),
    };
    match host::evaluate(session, matched, &expanded)? {
        Ok(value) => Ok(value.truthy()),
        Err(err) => {
            let location = session.location.clone();
            session
                .diagnostics
                .error(format!("can't eval '{}': {}", expanded, err), Some(&location));
            Ok(false)
        }
    }
}

/// Replaces each `defined NAME` / `defined(NAME)` with `true` or `false`.
pub fn rewrite_defined(code: &str, table: &MacroTable) -> String {
    let mut out = String::with_capacity(code.len());
    let mut last = 0;
    let mut search = 0;
    while let Some(found) = code[search..].find("defined") {
        let start = search + found;
        let end = start + "defined".len();
        search = end;
        let before = code[..start].chars().next_back();
        let after = code[end..].chars().next();
        if before.map_or(false, is_ident_char) || after.map_or(false, is_ident_char) {
            continue;
        }
        if let Some(operand) = defined_operand(code, end) {
            let name = defined_name(code, operand.clone());
            out.push_str(&code[last..start]);
            out.push_str(if table.is_defined(name) { "true" } else { "false" });
            last = operand.end;
            search = operand.end;
        }
    }
    out.push_str(&code[last..]);
    out
}

/// `#ifdef N rest` becomes `#if defined(N) rest`, `#ifndef` adds `!`.
pub fn rewrite_ifdef(negate: bool, rest: &str) -> String {
    let rest = rest.trim_start();
    let len: usize = rest
        .chars()
        .take_while(|c| is_ident_char(*c))
        .map(char::len_utf8)
        .sum();
    format!(
        "#if {}defined({}){}",
        if negate { "!" } else { "" },
        &rest[..len],
        &rest[len..]
    )
}

pub fn cond_else(session: &mut Session, matched: &str, junk: &str) -> String {
    warn_junk(session, junk);
    warn_after_else(session, "else");
    let description = match session.conditions.flip() {
        Ok(state) => format!("conditional flip ({})", state),
        Err(err) => {
            let location = session.location.clone();
            session.diagnostics.error(err.to_string(), Some(&location));
            "conditional flip (empty/on)".to_string()
        }
    };
    commented(matched, &description)
}

pub fn cond_endif(session: &mut Session, matched: &str, junk: &str) -> String {
    warn_junk(session, junk);
    let top = match session.conditions.pop() {
        Ok(top) => top,
        Err(err) => {
            let location = session.location.clone();
            session.diagnostics.error(err.to_string(), Some(&location));
            None
        }
    };
    let shown = top.map_or_else(|| "empty/on".to_string(), |state: CondState| state.to_string());
    commented(matched, &format!("conditional pop ({})", shown))
}

/// Whether the inactive-line suppressor should let `line` through. Nested
/// expansions, active regions and conditional directives always pass.
pub fn line_is_live(session: &Session, line: &str) -> bool {
    !session.at_top_level() || session.conditions.is_active() || is_conditional_line(line)
}

fn is_conditional_line(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix('#') else {
        return false;
    };
    let word: String = rest
        .trim_start()
        .chars()
        .take_while(|c| is_ident_char(*c))
        .collect();
    matches!(
        word.as_str(),
        "if" | "ifdef" | "ifndef" | "elif" | "else" | "endif"
    )
}

/// A second `#else`, or an `#elif` after `#else`, never turns a branch on.
fn warn_after_else(session: &mut Session, directive: &str) {
    if session.conditions.after_else() {
        let location = session.location.clone();
        session
            .diagnostics
            .warn(format!("#{} after #else", directive), Some(&location));
    }
}

fn warn_junk(session: &mut Session, junk: &str) {
    let junk = junk.trim();
    if !junk.is_empty() {
        let location = session.location.clone();
        session
            .diagnostics
            .warn(format!("ignoring junk: '{}'", junk), Some(&location));
    }
}

// ============================================================================
// DEFINITIONS
// ============================================================================

/// `#define` / `#definex`: the one primitive every other directive is built on.
pub fn define(session: &mut Session, matched: &str) -> Result<MacroResult, PreprocError> {
    if !session.conditions.is_active() {
        return Ok(MacroResult::Unchanged);
    }
    let errors = ErrorContext::new("define", &session.location, matched);
    let parts = match parse_define(matched) {
        Ok(Some(parts)) => parts,
        Ok(None) => return Ok(MacroResult::Unchanged),
        Err(err) => {
            return Err(errors
                .report_whole(ErrorKind::MalformedDefinition {
                    reason: err.to_string(),
                })
                .with_trace(&session.trace))
        }
    };
    let kind = match parts.kind {
        MacroKind::Named => "named",
        MacroKind::Pattern => "regex",
    };
    let mac = Macro::from_parts(parts, session.location.clone()).map_err(|err| {
        let kind = match err {
            DefineError::InvalidPattern { pattern, reason } => {
                ErrorKind::InvalidPattern { pattern, reason }
            }
            other => ErrorKind::MalformedDefinition {
                reason: other.to_string(),
            },
        };
        errors.report_whole(kind).with_trace(&session.trace)
    })?;
    let key = mac.key.clone();
    session.define(mac);
    let index = session.table.position(&key).unwrap_or_default();
    Ok(MacroResult::Final(commented(
        matched,
        &format!("new {} macro[{}]", kind, index),
    )))
}

pub fn undef(session: &mut Session, matched: &str, name: &str) -> String {
    let name = name.trim();
    let description = match session.table.undefine(name) {
        Some(mac) => format!("undefine {} macro", mac.class_name()),
        None => {
            let location = session.location.clone();
            session
                .diagnostics
                .error(format!("undefined macro '{}'", name), Some(&location));
            "undefine unknown macro".to_string()
        }
    };
    commented(matched, &description)
}

// ============================================================================
// SOURCE FILES
// ============================================================================

/// `#line N ["file"]` and `# N ["file"]`: relocates the next line.
pub fn set_line(session: &mut Session, matched: &str, number: &str, file: &str) -> String {
    let Ok(line) = number.trim().parse::<usize>() else {
        let location = session.location.clone();
        session
            .diagnostics
            .error(format!("bad line number '{}'", number.trim()), Some(&location));
        return commented(matched, "srcline unchanged");
    };
    let file = match unquote(file) {
        "" => session.location.file.clone(),
        name => name.to_string(),
    };
    let location = SourceLocation::new(file, line);
    let description = format!("srcline {}", location);
    session.leave_include(&location);
    session.relocate(location);
    commented(matched, &description)
}

/// The file name an `#include` operand refers to.
fn include_name(session: &mut Session, matched: &str, expr: &str) -> Result<String, PreprocError> {
    let raw = expr.trim();
    if raw.starts_with('<') && raw.ends_with('>') {
        return Ok(raw.to_string());
    }
    Ok(match host::evaluate(session, matched, raw)? {
        Ok(Value::Str(name)) => name,
        _ => unquote(raw).to_string(),
    })
}

/// `#include`: queues the file's content, framed by `#line` markers.
pub fn include(session: &mut Session, matched: &str, expr: &str) -> Result<String, PreprocError> {
    let name = include_name(session, matched, expr)?;
    let location = session.location.clone();
    let current = location.folder();
    let path = match session
        .includes
        .resolve(&name, current.as_deref(), session.fs.as_ref())
    {
        Ok(path) => path,
        Err(err) => {
            session.diagnostics.error(err.to_string(), Some(&location));
            return Ok(commented(matched, &format!("file '{}' not found", name)));
        }
    };
    let content = match session.fs.read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            let err = IncludeError::Unreadable {
                path: path.display().to_string(),
                reason: err.to_string(),
            };
            session.diagnostics.error(err.to_string(), Some(&location));
            return Ok(commented(matched, &format!("file '{}' unreadable", name)));
        }
    };
    let file = if path.as_os_str() == STDIN_NAME {
        session.options.input_name.clone()
    } else {
        path.display().to_string()
    };
    let limit = session.options.max_include_depth;
    if session.open_includes().len() >= limit {
        let chain = session
            .open_includes()
            .iter()
            .map(|open| format!("  {} included {}", open.file, open.included_from))
            .collect::<Vec<_>>()
            .join("\n");
        let errors = ErrorContext::new("include", &location, matched);
        return Err(errors
            .report_whole(ErrorKind::IncludeDepth { limit })
            .with_help(format!("open includes, outermost first:\n{}", chain))
            .with_trace(&session.trace));
    }
    log::debug!("include {} ({} bytes) {}", file, content.len(), location);
    let resume = SourceLocation::new(location.file.clone(), session.resume_line());
    let framed = injection(&content, &file, &resume.file, resume.line);
    if framed.cut_continuation {
        session.diagnostics.warn(
            format!("'{}' ends inside a line continuation; continuation dropped", file),
            Some(&location),
        );
    }
    session.enter_include(OpenInclude {
        file: file.clone(),
        included_from: location,
        resume,
    });
    session.inject(&framed.text);
    Ok(commented(matched, &format!("file '{}'", file)))
}

/// `#incl_folder`: registers a caller include folder.
pub fn incl_folder(session: &mut Session, matched: &str, expr: &str) -> Result<String, PreprocError> {
    let raw = expr.trim();
    let folder = match host::evaluate(session, matched, raw)? {
        Ok(Value::Str(folder)) => folder,
        _ => unquote(raw).to_string(),
    };
    match session.includes.add_folder(&folder, session.fs.as_ref()) {
        Ok(added) => {
            let index = session.includes.caller_folders().len().saturating_sub(1);
            let last = added
                .last()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            Ok(commented(matched, &format!("folder[{}] '{}'", index, last)))
        }
        Err(err) => {
            let location = session.location.clone();
            session.diagnostics.warn_once(err.to_string(), Some(&location));
            Ok(commented(matched, &format!("folder not found '{}'", folder)))
        }
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

/// `#pragma message|warning|error text` and the bare forms.
pub fn message(
    session: &mut Session,
    matched: &str,
    kind: &str,
    text: &str,
) -> Result<String, PreprocError> {
    let raw = text.trim();
    let shown = match host::evaluate(session, matched, raw)? {
        Ok(value) if !value.is_undefined() && value.to_string() != raw => {
            format!("{} (\"{}\")", raw, value)
        }
        _ => raw.to_string(),
    };
    let location = session.location.clone();
    match kind {
        "warning" => session.diagnostics.warn(shown, Some(&location)),
        "error" => session.diagnostics.error(shown, Some(&location)),
        _ => session.diagnostics.note(shown, Some(&location)),
    }
    Ok(commented(matched, kind))
}

/// `#dump`: lists every table slot on the diagnostic channel.
pub fn dump(session: &mut Session, matched: &str, junk: &str) -> String {
    warn_junk(session, junk);
    let total = session.table.slots().count();
    let lines: Vec<String> = session
        .table
        .slots()
        .enumerate()
        .map(|(index, (key, mac))| match mac {
            Some(mac) => format!(
                "{} macro[{}/{}]: {} => {} from {}",
                if mac.is_function() { "func" } else { "text" },
                index,
                total,
                key,
                mac.body,
                mac.defined_at
            ),
            None => format!("deleted macro[{}/{}]: {}", index, total, key),
        })
        .collect();
    let location = session.location.clone();
    session
        .diagnostics
        .note(format!("{} macros:", session.table.len()), Some(&location));
    for line in lines {
        session.diagnostics.note(line, None);
    }
    commented(matched, &format!("dumped {} macros", total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::diagnostics::{MemorySink, Severity};
    use crate::directives::include::MemoryFileSystem;

    fn session_with(fs: MemoryFileSystem, bootstrap: Bootstrap) -> (Session, MemorySink) {
        let sink = MemorySink::new();
        let options = Options {
            bootstrap,
            ..Options::default()
        };
        let session = Session::new(options, Box::new(sink.clone()), Box::new(fs)).unwrap();
        (session, sink)
    }

    fn session() -> (Session, MemorySink) {
        session_with(MemoryFileSystem::new(), Bootstrap::Native)
    }

    fn run(session: &mut Session, line: &str) -> Expanded {
        session.expand(line, true).unwrap()
    }

    fn text(session: &mut Session, line: &str) -> String {
        match run(session, line) {
            Expanded::Text(text) => text,
            Expanded::Suppressed => "<suppressed>".to_string(),
        }
    }

    #[test]
    fn builtins_are_function_macros_in_order() {
        let (session, _) = session();
        assert_eq!(session.table.len(), Directive::ALL.len());
        assert_eq!(session.table.function_count(), Directive::ALL.len());
        assert!(session.table.iter().all(|mac| mac.is_native()));
    }

    #[test]
    fn self_hosted_prelude_only_keeps_define_native() {
        let (session, _) = session_with(MemoryFileSystem::new(), Bootstrap::SelfHosted);
        let natives = session.table.iter().filter(|mac| mac.is_native()).count();
        assert_eq!(natives, 1);
    }

    #[test]
    fn define_is_commented_with_its_slot() {
        let (mut session, _) = session();
        let out = text(&mut session, "#define FOO 1");
        assert_eq!(
            out,
            format!("{}#define FOO 1 => new named macro[0]", EOL_MARK)
        );
    }

    #[test]
    fn if_else_endif_drive_the_stack() {
        let (mut session, _) = session();
        let out = text(&mut session, "#if 0");
        assert!(out.ends_with("conditional push (false)"));
        assert_eq!(run(&mut session, "X"), Expanded::Suppressed);
        assert!(text(&mut session, "#else").ends_with("conditional flip (true)"));
        assert_eq!(text(&mut session, "Y"), "Y");
        assert!(text(&mut session, "#endif").ends_with("conditional pop (empty/on)"));
        assert!(session.conditions.is_empty());
    }

    #[test]
    fn extra_endif_is_an_error_not_a_crash() {
        let (mut session, sink) = session();
        text(&mut session, "#endif");
        assert_eq!(sink.messages(Severity::Error).len(), 1);
    }

    #[test]
    fn ifdef_rewrites_to_if_defined() {
        let (mut session, _) = session();
        text(&mut session, "#define HAVE 1");
        assert!(text(&mut session, "#ifdef HAVE").ends_with("conditional push (true)"));
        assert!(text(&mut session, "#ifndef HAVE").ends_with("conditional push (false)"));
        assert_eq!(
            rewrite_ifdef(true, " NAME // x"),
            "#if !defined(NAME) // x"
        );
    }

    #[test]
    fn nested_ifs_in_inactive_regions_inherit() {
        let (mut session, _) = session();
        text(&mut session, "#if 0");
        text(&mut session, "#ifdef ANY");
        assert!(text(&mut session, "#else").ends_with("conditional flip (inherited)"));
        assert_eq!(run(&mut session, "#define HIDDEN 1"), Expanded::Suppressed);
        text(&mut session, "#endif");
        text(&mut session, "#endif");
        assert!(!session.table.is_defined("HIDDEN"));
    }

    #[test]
    fn elif_chain_takes_the_first_true_branch() {
        let (mut session, _) = session();
        text(&mut session, "#define V 2");
        text(&mut session, "#if V == 1");
        assert!(text(&mut session, "#elif V == 2").ends_with("conditional flip (true)"));
        assert!(text(&mut session, "#elif 1").ends_with("conditional flip (inherited)"));
        text(&mut session, "#endif");
    }

    #[test]
    fn branches_after_else_warn_and_stay_off() {
        let (mut session, sink) = session();
        text(&mut session, "#if 0");
        assert!(text(&mut session, "#else").ends_with("conditional flip (true)"));
        assert!(sink.messages(Severity::Warning).is_empty());
        assert!(text(&mut session, "#elif 1").ends_with("conditional flip (inherited)"));
        text(&mut session, "#else");
        text(&mut session, "#endif");
        assert_eq!(
            sink.messages(Severity::Warning),
            vec!["#elif after #else", "#else after #else"]
        );
    }

    #[test]
    fn defined_operands_are_rewritten_before_expansion() {
        let (mut session, _) = session();
        text(&mut session, "#define A 0");
        assert_eq!(
            rewrite_defined("defined(A) && defined B || defined(C)", &session.table),
            "true && false || false"
        );
        assert!(text(&mut session, "#if defined(A)").ends_with("(true)"));
    }

    #[test]
    fn bad_expressions_report_and_count_as_false() {
        let (mut session, sink) = session();
        assert!(text(&mut session, "#if 1 +").ends_with("conditional push (false)"));
        assert_eq!(sink.messages(Severity::Error).len(), 1);
    }

    #[test]
    fn undef_of_unknown_macro_is_an_error() {
        let (mut session, sink) = session();
        assert!(text(&mut session, "#undef NOPE").ends_with("undefine unknown macro"));
        assert_eq!(sink.messages(Severity::Error), vec!["undefined macro 'NOPE'"]);
    }

    #[test]
    fn line_markers_relocate_the_next_line() {
        let (mut session, _) = session();
        let out = text(&mut session, "# 40 \"gen.c\"");
        assert!(out.ends_with("srcline @gen.c:40"));
        session.end_line();
        assert_eq!(session.location, SourceLocation::new("gen.c", 40));
    }

    #[test]
    fn include_injects_framed_content() {
        let fs = MemoryFileSystem::new().with_file("inc/a.h", "A1\nA2");
        let (mut session, _) = session_with(fs, Bootstrap::Native);
        assert!(text(&mut session, "#incl_folder inc").ends_with("folder[0] 'inc'"));
        assert!(text(&mut session, "#include <a.h>").ends_with("file 'inc/a.h'"));
        assert_eq!(
            session.take_injected().unwrap(),
            "#line 1 \"inc/a.h\"\nA1\nA2\n#line 2 \"stdin\"\n"
        );
    }

    #[test]
    fn include_evaluates_string_expressions() {
        let fs = MemoryFileSystem::new().with_file("b.h", "B");
        let (mut session, _) = session_with(fs, Bootstrap::Native);
        text(&mut session, "#include \"b\" + \".h\"");
        assert!(session.take_injected().is_some());
    }

    #[test]
    fn missing_include_is_an_error() {
        let (mut session, sink) = session();
        text(&mut session, "#include \"nope.h\"");
        assert_eq!(sink.messages(Severity::Error).len(), 1);
        assert!(session.take_injected().is_none());
    }

    #[test]
    fn messages_report_with_their_severity() {
        let (mut session, sink) = session();
        text(&mut session, "#pragma message \"a\" + \"b\"");
        text(&mut session, "#warning plain words");
        text(&mut session, "#error oops");
        assert_eq!(sink.messages(Severity::Note), vec!["\"a\" + \"b\" (\"ab\")"]);
        assert_eq!(sink.messages(Severity::Warning), vec!["plain words"]);
        assert_eq!(sink.messages(Severity::Error), vec!["oops"]);
    }

    #[test]
    fn dump_lists_macros_as_notes() {
        let (mut session, sink) = session();
        text(&mut session, "#define A 1");
        text(&mut session, "#dump");
        let notes = sink.messages(Severity::Note);
        assert!(notes.iter().any(|note| note.starts_with("text macro[0/")));
    }
}
