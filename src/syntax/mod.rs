//! Lexical helpers shared by the tagger, the matchers and the template engine.
//!
//! Every component agrees on one string-literal grammar: `"..."`, `'...'` and
//! `` `...` `` quotes with backslash escapes inside, plus backslash-escaped
//! characters outside quotes. Brackets, macro names and parameters are only
//! recognized in the plain code between those spans.

pub mod assembler;
pub mod tagger;

use std::ops::Range;
use thiserror::Error;

// ============================================================================
// RESERVED CHARACTERS
// ============================================================================

/// Marks the start of the comment tail of a line. Text after it is never expanded.
pub const EOL_MARK: char = '\u{1e}';

/// Same-length stand-ins for nested brackets in the masked matching view.
pub const MASK_OPEN_PAREN: char = '\u{01}';
pub const MASK_CLOSE_PAREN: char = '\u{02}';
pub const MASK_OPEN_BRACE: char = '\u{03}';
pub const MASK_CLOSE_BRACE: char = '\u{04}';

pub const RESERVED: [char; 5] = [
    MASK_OPEN_PAREN,
    MASK_CLOSE_PAREN,
    MASK_OPEN_BRACE,
    MASK_CLOSE_BRACE,
    EOL_MARK,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("reserved character U+{:04X} at offset {offset}", *ch as u32)]
    Reserved { ch: char, offset: usize },
    #[error("tagging changed the line length from {before} to {after}")]
    LengthChanged { before: usize, after: usize },
}

pub fn find_reserved(text: &str) -> Option<(usize, char)> {
    text.char_indices().find(|(_, c)| RESERVED.contains(c))
}

pub fn check_reserved(text: &str) -> Result<(), SyntaxError> {
    match find_reserved(text) {
        Some((offset, ch)) => Err(SyntaxError::Reserved { ch, offset }),
        None => Ok(()),
    }
}

/// Splits a line into its code and its comment tail (starting at [`EOL_MARK`]).
pub fn split_eol(line: &str) -> (&str, &str) {
    match line.find(EOL_MARK) {
        Some(at) => line.split_at(at),
        None => (line, ""),
    }
}

// ============================================================================
// CHARACTER CLASSES
// ============================================================================

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Identifier characters; `$` and `@` are allowed in macro names.
pub fn is_ident_char(c: char) -> bool {
    is_word_char(c) || c == '$' || c == '@'
}

pub fn is_ident_start(c: char) -> bool {
    is_ident_char(c) && !c.is_ascii_digit()
}

pub fn is_ident(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if is_ident_start(first) => chars.all(is_ident_char),
        _ => false,
    }
}

pub fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'' | '`')
}

// ============================================================================
// SEGMENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Plain code: brackets, names and operators.
    Code,
    /// A quoted string including its quotes (possibly unterminated).
    Quoted,
    /// A backslash and the character it escapes.
    Escaped,
}

/// Iterator over the code, quoted and escaped spans of a text.
pub struct Segments<'a> {
    text: &'a str,
    pos: usize,
}

pub fn segments(text: &str) -> Segments<'_> {
    Segments { text, pos: 0 }
}

impl<'a> Iterator for Segments<'a> {
    type Item = (SegmentKind, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.text[self.pos..];
        let first = rest.chars().next()?;
        let start = self.pos;
        let len = if is_quote(first) {
            quoted_len(rest)
        } else if first == '\\' {
            escaped_len(rest)
        } else {
            rest.char_indices()
                .find(|(_, c)| is_quote(*c) || *c == '\\')
                .map(|(at, _)| at)
                .unwrap_or(rest.len())
        };
        self.pos += len;
        let kind = if is_quote(first) {
            SegmentKind::Quoted
        } else if first == '\\' {
            SegmentKind::Escaped
        } else {
            SegmentKind::Code
        };
        Some((kind, start..self.pos))
    }
}

/// Length of the quoted string at the start of `text`, closing quote included.
fn quoted_len(text: &str) -> usize {
    let mut chars = text.char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return 0,
    };
    while let Some((at, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == quote {
            return at + c.len_utf8();
        }
    }
    text.len()
}

fn escaped_len(text: &str) -> usize {
    let mut chars = text.char_indices().skip(1);
    match chars.next() {
        Some((at, c)) => at + c.len_utf8(),
        None => text.len(),
    }
}

/// Calls `visit` for every code character (outside quotes and escapes).
pub fn for_each_code_char(text: &str, mut visit: impl FnMut(usize, char)) {
    for (kind, range) in segments(text) {
        if kind == SegmentKind::Code {
            for (at, c) in text[range.clone()].char_indices() {
                visit(range.start + at, c);
            }
        }
    }
}

/// Finds the first occurrence of `needle` in code (not inside quotes or escapes).
pub fn find_unquoted(text: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    segments(text)
        .filter(|(kind, _)| *kind == SegmentKind::Code)
        .find_map(|(_, range)| text[range.clone()].find(needle).map(|at| range.start + at))
}

/// Strips one level of matching quotes.
pub fn unquote(text: &str) -> &str {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if trimmed.len() >= 2 && first == last && is_quote(first) => {
            &trimmed[1..trimmed.len() - 1]
        }
        _ => trimmed,
    }
}

/// Wraps text in double quotes, escaping embedded quotes and backslashes.
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

// ============================================================================
// PROTECTED SPANS
// ============================================================================

/// Spans where named macros must not expand: definition lines, the operands of
/// `#undef`/`#ifdef`/`#ifndef`, and the operand of `defined`.
pub fn protected_spans(code: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let trimmed = code.trim_start();
    let lead = code.len() - trimmed.len();
    if let Some(rest) = trimmed.strip_prefix('#') {
        let after_hash = rest.trim_start();
        let word_start = lead + 1 + (rest.len() - after_hash.len());
        let word: String = after_hash.chars().take_while(|c| is_ident_char(*c)).collect();
        match word.as_str() {
            "define" | "definex" => spans.push(lead..code.len()),
            "undef" | "ifdef" | "ifndef" => spans.push(word_start + word.len()..code.len()),
            _ => {}
        }
    }
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
            spans.push(start..operand.end);
            search = operand.end;
        }
    }
    spans
}

/// Locates the name after `defined`, as `defined NAME` or `defined(NAME)`.
/// Returns the span covering the operand (including parentheses).
pub fn defined_operand(code: &str, from: usize) -> Option<Range<usize>> {
    let rest = &code[from..];
    let after_ws = rest.trim_start();
    let mut at = from + (rest.len() - after_ws.len());
    let parenthesized = after_ws.starts_with('(');
    if parenthesized {
        at += 1;
        let inner = &code[at..];
        at += inner.len() - inner.trim_start().len();
    } else if at == from {
        return None;
    }
    let name_len: usize = code[at..]
        .chars()
        .take_while(|c| is_ident_char(*c))
        .map(char::len_utf8)
        .sum();
    if name_len == 0 {
        return None;
    }
    let mut end = at + name_len;
    if parenthesized {
        let tail = &code[end..];
        let skipped = tail.len() - tail.trim_start().len();
        if !code[end + skipped..].starts_with(')') {
            return None;
        }
        end += skipped + 1;
    }
    Some(from..end)
}

/// Name inside a `defined` operand span.
pub fn defined_name(code: &str, operand: Range<usize>) -> &str {
    code[operand]
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim()
}

pub fn in_spans(spans: &[Range<usize>], offset: usize) -> bool {
    spans.iter().any(|span| span.contains(&offset))
}
