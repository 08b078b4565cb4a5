//! Parsing of the one primitive directive, `#define` / `#definex`.
//!
//! ```text
//! #define  NAME[(p1, p2, ...)] body
//! #definex <d>pattern<d>[flags][(p1, p2, ...)] body
//! ```
//!
//! The parameter list must follow the name (or the closing delimiter and
//! flags) immediately. A trailing `...` parameter collects any remaining
//! arguments as `__VA_ARGS__`.

use super::MacroKind;
use crate::syntax::{is_ident, is_ident_char};
use thiserror::Error;

pub const VARIADIC_PARAM: &str = "__VA_ARGS__";

/// The pieces of one definition line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineParts {
    pub kind: MacroKind,
    /// Macro name (named kind) or pattern source (pattern kind).
    pub name: String,
    pub delimiter: Option<char>,
    pub flags: String,
    /// `None` when no parameter list was written at all.
    pub params: Option<Vec<String>>,
    pub variadic: bool,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefineError {
    #[error("missing macro name after #define")]
    MissingName,
    #[error("missing closing delimiter '{0}' in #definex pattern")]
    UnterminatedPattern(char),
    #[error("invalid pattern delimiter '{0}'")]
    BadDelimiter(char),
    #[error("unknown pattern flag '{0}' (expected g, i, m, s or x)")]
    BadFlag(char),
    #[error("unterminated parameter list")]
    UnterminatedParams,
    #[error("invalid parameter name '{0}'")]
    BadParam(String),
    #[error("'...' must be the last parameter")]
    MisplacedVariadic,
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Splits off the directive keyword. Returns the keyword and the text after it.
fn directive(line: &str) -> Option<(&str, &str)> {
    let rest = line.trim_start().strip_prefix('#')?.trim_start();
    let len: usize = rest
        .chars()
        .take_while(|c| is_ident_char(*c))
        .map(char::len_utf8)
        .sum();
    Some((&rest[..len], &rest[len..]))
}

/// Whether a line is a definition directive at all.
pub fn is_define_line(line: &str) -> bool {
    matches!(directive(line), Some(("define" | "definex", _)))
}

/// Parses a `#define`/`#definex` line. `Ok(None)` means the line is not a
/// definition; `Err` means it is one but cannot be parsed.
pub fn parse_define(line: &str) -> Result<Option<DefineParts>, DefineError> {
    let (keyword, rest) = match directive(line) {
        Some(found) => found,
        None => return Ok(None),
    };
    let (kind, rest) = match keyword {
        "define" => (MacroKind::Named, rest),
        "definex" => (MacroKind::Pattern, rest),
        _ => return Ok(None),
    };
    if !rest.starts_with(char::is_whitespace) {
        return Err(DefineError::MissingName);
    }
    let rest = rest.trim_start();

    let (name, delimiter, flags, rest) = match kind {
        MacroKind::Named => {
            let len: usize = rest
                .chars()
                .take_while(|c| is_ident_char(*c))
                .map(char::len_utf8)
                .sum();
            let name = &rest[..len];
            if !is_ident(name) {
                return Err(DefineError::MissingName);
            }
            (name.to_string(), None, String::new(), &rest[len..])
        }
        MacroKind::Pattern => {
            let (pattern, delimiter, after) = split_pattern(rest)?;
            let flags_len = after
                .chars()
                .take_while(|c| c.is_ascii_alphabetic())
                .count();
            let flags = &after[..flags_len];
            if let Some(bad) = flags.chars().find(|c| !"gimsx".contains(*c)) {
                return Err(DefineError::BadFlag(bad));
            }
            (pattern, Some(delimiter), flags.to_string(), &after[flags_len..])
        }
    };

    let (params, variadic, rest) = if rest.starts_with('(') {
        let (params, variadic, after) = split_params(rest)?;
        (Some(params), variadic, after)
    } else {
        (None, false, rest)
    };

    Ok(Some(DefineParts {
        kind,
        name,
        delimiter,
        flags,
        params,
        variadic,
        body: rest.trim().to_string(),
    }))
}

/// Reads `<d>pattern<d>`. An escaped delimiter loses its backslash unless the
/// delimiter is itself a regex metacharacter; other escapes are kept as written.
fn split_pattern(text: &str) -> Result<(String, char, &str), DefineError> {
    let mut chars = text.char_indices();
    let delimiter = match chars.next() {
        Some((_, d)) if d.is_alphanumeric() || d == '\\' || d.is_whitespace() => {
            return Err(DefineError::BadDelimiter(d))
        }
        Some((_, d)) => d,
        None => return Err(DefineError::MissingName),
    };
    let keep_escape = regex_syntax_meta(delimiter);
    let mut pattern = String::new();
    while let Some((at, c)) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some((_, escaped)) if escaped == delimiter && !keep_escape => pattern.push(escaped),
                Some((_, escaped)) => {
                    pattern.push(c);
                    pattern.push(escaped);
                }
                None => pattern.push(c),
            }
        } else if c == delimiter {
            if pattern.trim().is_empty() {
                return Err(DefineError::MissingName);
            }
            return Ok((pattern, delimiter, &text[at + c.len_utf8()..]));
        } else {
            pattern.push(c);
        }
    }
    Err(DefineError::UnterminatedPattern(delimiter))
}

fn regex_syntax_meta(c: char) -> bool {
    "\\.+*?()|[]{}^$#&-~".contains(c)
}

/// Reads `(p1, p2, ...)` at the start of `text`.
fn split_params(text: &str) -> Result<(Vec<String>, bool, &str), DefineError> {
    let close = text.find(')').ok_or(DefineError::UnterminatedParams)?;
    let inner = text[1..close].trim();
    let mut params = Vec::new();
    let mut variadic = false;
    if !inner.is_empty() {
        let names: Vec<&str> = inner.split(',').map(str::trim).collect();
        for (index, name) in names.iter().enumerate() {
            if *name == "..." {
                if index + 1 != names.len() {
                    return Err(DefineError::MisplacedVariadic);
                }
                variadic = true;
                params.push(VARIADIC_PARAM.to_string());
            } else if is_ident(name) {
                params.push(name.to_string());
            } else {
                return Err(DefineError::BadParam(name.to_string()));
            }
        }
    }
    Ok((params, variadic, &text[close + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> DefineParts {
        parse_define(line).unwrap().unwrap()
    }

    #[test]
    fn named_object_macro() {
        let parts = parse("#define FOO  1 + 2 ");
        assert_eq!(parts.kind, MacroKind::Named);
        assert_eq!(parts.name, "FOO");
        assert_eq!(parts.params, None);
        assert_eq!(parts.body, "1 + 2");
    }

    #[test]
    fn named_function_like_macro() {
        let parts = parse("  # define SQUARE(x) ((x)*(x))");
        assert_eq!(parts.params, Some(vec!["x".to_string()]));
        assert_eq!(parts.body, "((x)*(x))");
    }

    #[test]
    fn space_before_paren_starts_the_body() {
        let parts = parse("#define X (a)");
        assert_eq!(parts.params, None);
        assert_eq!(parts.body, "(a)");
    }

    #[test]
    fn empty_and_variadic_parameter_lists() {
        assert_eq!(parse("#define F() 1").params, Some(vec![]));
        let parts = parse("#define LOG(fmt, ...) printf(fmt, __VA_ARGS__)");
        assert!(parts.variadic);
        assert_eq!(
            parts.params,
            Some(vec!["fmt".to_string(), VARIADIC_PARAM.to_string()])
        );
    }

    #[test]
    fn pattern_macro_with_flags_and_params() {
        let parts = parse(r"#definex /\bswap\((\w+), (\w+)\)/gi(a, b) { return b + a; }");
        assert_eq!(parts.kind, MacroKind::Pattern);
        assert_eq!(parts.name, r"\bswap\((\w+), (\w+)\)");
        assert_eq!(parts.delimiter, Some('/'));
        assert_eq!(parts.flags, "gi");
        assert_eq!(parts.params, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(parts.body, "{ return b + a; }");
    }

    #[test]
    fn escaped_delimiter_stays_in_pattern() {
        let parts = parse(r"#definex /a\/b/ c");
        assert_eq!(parts.name, "a/b");
        let parts = parse(r"#definex |a\|b| c");
        assert_eq!(parts.name, r"a\|b");
        assert_eq!(parts.body, "c");
    }

    #[test]
    fn other_directives_are_not_definitions() {
        assert_eq!(parse_define("#defined X").unwrap(), None);
        assert_eq!(parse_define("#if X").unwrap(), None);
        assert_eq!(parse_define("define X 1").unwrap(), None);
        assert!(is_define_line("#definex /a/ b"));
    }

    #[test]
    fn malformed_definitions_are_errors() {
        assert_eq!(parse_define("#define"), Err(DefineError::MissingName));
        assert_eq!(parse_define("#define 9x 1"), Err(DefineError::MissingName));
        assert_eq!(
            parse_define("#definex /abc"),
            Err(DefineError::UnterminatedPattern('/'))
        );
        assert_eq!(parse_define("#definex /a/q b"), Err(DefineError::BadFlag('q')));
        assert_eq!(
            parse_define("#define F(a, ..., b) x"),
            Err(DefineError::MisplacedVariadic)
        );
    }
}
