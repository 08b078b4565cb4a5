//! Builtins that need nothing but their arguments.

use super::value::{format_number, Value};
use super::ScriptError;
use crate::syntax;

pub(crate) fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), ScriptError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}..{}", min, max)
        };
        return Err(ScriptError::Arity {
            name: name.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

fn text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_string).unwrap_or_default()
}

/// Calls a pure builtin. `None` means there is no builtin called `name`.
pub fn call_pure(name: &str, args: &[Value]) -> Option<Result<Value, ScriptError>> {
    let result = match name {
        "len" => check_arity(name, args, 1, 1)
            .map(|_| Value::Number(text(args, 0).chars().count() as f64)),
        "upper" => check_arity(name, args, 1, 1).map(|_| Value::Str(text(args, 0).to_uppercase())),
        "lower" => check_arity(name, args, 1, 1).map(|_| Value::Str(text(args, 0).to_lowercase())),
        "trim" => check_arity(name, args, 1, 1).map(|_| Value::str(text(args, 0).trim())),
        "str" => check_arity(name, args, 1, 1).map(|_| Value::Str(text(args, 0))),
        "num" => check_arity(name, args, 1, 1).map(|_| Value::Number(args[0].to_number())),
        "int" => check_arity(name, args, 1, 1).map(|_| Value::Number(args[0].to_number().trunc())),
        "replace" => check_arity(name, args, 3, 3)
            .map(|_| Value::Str(text(args, 0).replace(&text(args, 1), &text(args, 2)))),
        "substr" => check_arity(name, args, 2, 3).map(|_| substr(args)),
        "quote" => check_arity(name, args, 1, 1).map(|_| Value::Str(syntax::quote(&text(args, 0)))),
        "unquote" => {
            check_arity(name, args, 1, 1).map(|_| Value::str(syntax::unquote(&text(args, 0))))
        }
        "concat" => Ok(Value::Str(args.iter().map(Value::to_string).collect())),
        "is_ident" => check_arity(name, args, 1, 1).map(|_| Value::Bool(syntax::is_ident(&text(args, 0)))),
        "env" => check_arity(name, args, 1, 1).map(|_| {
            std::env::var(text(args, 0))
                .map(Value::Str)
                .unwrap_or(Value::Undefined)
        }),
        "hex" => check_arity(name, args, 1, 1).map(|_| {
            let n = args[0].to_number();
            if n.is_finite() && n.fract() == 0.0 && n >= 0.0 {
                Value::Str(format!("0x{:x}", n as u64))
            } else {
                Value::Str(format_number(n))
            }
        }),
        _ => return None,
    };
    Some(result)
}

fn substr(args: &[Value]) -> Value {
    let source: Vec<char> = text(args, 0).chars().collect();
    let len = source.len() as f64;
    let mut start = args[1].to_number();
    if start.is_nan() {
        start = 0.0;
    }
    if start < 0.0 {
        start = (len + start).max(0.0);
    }
    let start = start.min(len) as usize;
    let count = match args.get(2) {
        Some(count) => {
            let count = count.to_number();
            if count.is_nan() || count < 0.0 {
                0
            } else {
                count as usize
            }
        }
        None => source.len() - start,
    };
    Value::Str(source.iter().skip(start).take(count).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        call_pure(name, args).unwrap().unwrap()
    }

    #[test]
    fn string_helpers() {
        assert_eq!(call("upper", &[Value::str("abc")]), Value::str("ABC"));
        assert_eq!(call("len", &[Value::str("héllo")]), Value::Number(5.0));
        assert_eq!(
            call("replace", &[Value::str("a-b-c"), Value::str("-"), Value::str("+")]),
            Value::str("a+b+c")
        );
        assert_eq!(
            call("substr", &[Value::str("abcdef"), Value::Number(-3.0), Value::Number(2.0)]),
            Value::str("de")
        );
        assert_eq!(call("quote", &[Value::str("a.h")]), Value::str("\"a.h\""));
        assert_eq!(call("unquote", &[Value::str("<a.h>")]), Value::str("<a.h>"));
        assert_eq!(call("hex", &[Value::Number(255.0)]), Value::str("0xff"));
    }

    #[test]
    fn arity_is_checked() {
        assert!(matches!(
            call_pure("upper", &[]),
            Some(Err(ScriptError::Arity { .. }))
        ));
    }

    #[test]
    fn unknown_names_are_not_builtins() {
        assert!(call_pure("nope", &[]).is_none());
    }
}
