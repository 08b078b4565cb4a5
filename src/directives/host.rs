//! Session builtins for the script language.
//!
//! Function-macro bodies and directive expressions run against a
//! [`SessionHost`], which exposes the parts of the session a script may touch.
//! The self-hosted directive prelude is written entirely in terms of these
//! builtins.

use super::{
    commented, cond_else, cond_endif, cond_if, dump, incl_folder, include, line_is_live, message,
    rewrite_ifdef, set_line, undef,
};
use crate::engine::MacroResult;
use crate::errors::PreprocError;
use crate::script::builtins::check_arity;
use crate::script::{self, Host, Program, ScriptError, Value};
use crate::session::Session;

/// Side effects a function body asked for besides its return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Rescan,
    Suppress,
}

pub struct SessionHost<'s> {
    session: &'s mut Session,
    matched: String,
    signal: Option<Signal>,
    fatal: Option<PreprocError>,
}

impl<'s> SessionHost<'s> {
    pub fn new(session: &'s mut Session, matched: &str) -> Self {
        Self {
            session,
            matched: matched.to_string(),
            signal: None,
            fatal: None,
        }
    }

    /// Turns a fatal error from a directive operation into a script error
    /// that unwinds the body; the caller re-raises the fatal error.
    fn escalate(&mut self, result: Result<String, PreprocError>) -> Result<Value, ScriptError> {
        match result {
            Ok(text) => Ok(Value::Str(text)),
            Err(err) => {
                let message = err.to_string();
                self.fatal = Some(err);
                Err(ScriptError::Host(message))
            }
        }
    }

    fn dispatch(&mut self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        let matched = self.matched.clone();
        let session = &mut *self.session;
        match name {
            "defined" => {
                check_arity(name, args, 1, 1)?;
                Ok(Value::Bool(session.table.is_defined(text(args, 0).trim())))
            }
            "srcline" => {
                check_arity(name, args, 0, 0)?;
                Ok(Value::Str(session.location.to_string()))
            }
            "message" | "warn" | "error" => {
                check_arity(name, args, 1, 1)?;
                let location = session.location.clone();
                let message = text(args, 0);
                match name {
                    "message" => session.diagnostics.note(message, Some(&location)),
                    "warn" => session.diagnostics.warn(message, Some(&location)),
                    _ => session.diagnostics.error(message, Some(&location)),
                }
                Ok(Value::Undefined)
            }
            "rescan" => {
                check_arity(name, args, 1, 1)?;
                self.signal = Some(Signal::Rescan);
                Ok(Value::Str(text(args, 0)))
            }
            "suppress" => {
                check_arity(name, args, 0, 0)?;
                self.signal = Some(Signal::Suppress);
                Ok(Value::Undefined)
            }
            "commented" => {
                check_arity(name, args, 1, 1)?;
                Ok(Value::Str(commented(&matched, &text(args, 0))))
            }
            "cond_if" | "cond_elif" => {
                check_arity(name, args, 1, 1)?;
                let result = cond_if(session, &matched, name == "cond_elif", &text(args, 0));
                self.escalate(result)
            }
            "cond_else" => {
                check_arity(name, args, 0, 1)?;
                Ok(Value::Str(cond_else(session, &matched, &text(args, 0))))
            }
            "cond_endif" => {
                check_arity(name, args, 0, 1)?;
                Ok(Value::Str(cond_endif(session, &matched, &text(args, 0))))
            }
            "cond_active" => {
                check_arity(name, args, 0, 0)?;
                Ok(Value::Bool(line_is_live(session, &matched)))
            }
            "cond_rewrite_ifdef" => {
                check_arity(name, args, 2, 2)?;
                Ok(Value::Str(rewrite_ifdef(args[0].truthy(), &text(args, 1))))
            }
            "undef" => {
                check_arity(name, args, 1, 1)?;
                Ok(Value::Str(undef(session, &matched, &text(args, 0))))
            }
            "set_line" => {
                check_arity(name, args, 1, 2)?;
                Ok(Value::Str(set_line(
                    session,
                    &matched,
                    &text(args, 0),
                    &text(args, 1),
                )))
            }
            "include" => {
                check_arity(name, args, 1, 1)?;
                let result = include(session, &matched, &text(args, 0));
                self.escalate(result)
            }
            "incl_folder" => {
                check_arity(name, args, 1, 1)?;
                let result = incl_folder(session, &matched, &text(args, 0));
                self.escalate(result)
            }
            "report" => {
                check_arity(name, args, 2, 2)?;
                let result = message(session, &matched, &text(args, 0), &text(args, 1));
                self.escalate(result)
            }
            "dump" => {
                check_arity(name, args, 0, 1)?;
                Ok(Value::Str(dump(session, &matched, &text(args, 0))))
            }
            _ => Err(ScriptError::UnknownFunction(name.to_string())),
        }
    }
}

const BUILTINS: [&str; 20] = [
    "defined",
    "srcline",
    "message",
    "warn",
    "error",
    "rescan",
    "suppress",
    "commented",
    "cond_if",
    "cond_elif",
    "cond_else",
    "cond_endif",
    "cond_active",
    "cond_rewrite_ifdef",
    "undef",
    "set_line",
    "include",
    "incl_folder",
    "report",
    "dump",
];

impl Host for SessionHost<'_> {
    fn call(&mut self, name: &str, args: &[Value]) -> Option<Result<Value, ScriptError>> {
        if !BUILTINS.contains(&name) {
            return None;
        }
        if self.fatal.is_some() {
            return Some(Err(ScriptError::Host("aborted".to_string())));
        }
        Some(self.dispatch(name, args))
    }
}

/// Argument text, with `undefined` as the empty string.
fn text(args: &[Value], index: usize) -> String {
    match args.get(index) {
        None | Some(Value::Undefined) => String::new(),
        Some(value) => value.to_string(),
    }
}

/// Evaluates an expression against the session. The outer error is fatal;
/// the inner one is an ordinary evaluation failure for the caller to report.
pub fn evaluate(
    session: &mut Session,
    matched: &str,
    source: &str,
) -> Result<Result<Value, ScriptError>, PreprocError> {
    let mut host = SessionHost::new(session, matched);
    let value = script::evaluate(source, &mut host);
    match host.fatal.take() {
        Some(fatal) => Err(fatal),
        None => Ok(value),
    }
}

/// Runs a compiled function body for one match. `match` is bound to the
/// matched text and each parameter to its argument.
pub fn call_script(
    session: &mut Session,
    key: &str,
    program: &Program,
    params: &[String],
    matched: &str,
    args: &[Option<String>],
) -> Result<MacroResult, PreprocError> {
    let mut bindings = vec![("match".to_string(), Value::str(matched))];
    bindings.extend(params.iter().enumerate().map(|(index, param)| {
        let value = match args.get(index) {
            Some(Some(arg)) => Value::str(arg.as_str()),
            _ => Value::Undefined,
        };
        (param.clone(), value)
    }));

    let mut host = SessionHost::new(session, matched);
    let value = script::run_program(program, bindings, &mut host);
    if let Some(fatal) = host.fatal.take() {
        return Err(fatal);
    }
    let signal = host.signal;
    let value = match value {
        Ok(value) => value,
        Err(err) => {
            let location = session.location.clone();
            session
                .diagnostics
                .error(format!("macro '{}' failed: {}", key, err), Some(&location));
            return Ok(MacroResult::Unchanged);
        }
    };
    Ok(match (signal, value) {
        (Some(Signal::Suppress), _) => MacroResult::Suppress,
        (_, Value::Undefined) => MacroResult::Unchanged,
        (Some(Signal::Rescan), value) => MacroResult::Continue(value.to_string()),
        (None, value) => MacroResult::Final(value.to_string()),
    })
}
