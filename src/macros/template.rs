//! Text-template substitution for text macros.

use crate::syntax::{is_ident_char, is_ident_start, segments, SegmentKind};
use std::collections::HashMap;

/// Replaces every whole-word parameter name in `body` (outside quotes) with
/// its argument. All parameters are substituted in one pass, so an argument
/// that happens to contain another parameter's name is left alone.
pub fn substitute(body: &str, params: &[String], args: &[Option<String>]) -> String {
    if params.is_empty() {
        return body.to_string();
    }
    let bindings: HashMap<&str, &str> = params
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let value = args.get(index).and_then(|a| a.as_deref()).unwrap_or("");
            (name.as_str(), value)
        })
        .collect();

    let mut out = String::with_capacity(body.len());
    for (kind, range) in segments(body) {
        let segment = &body[range];
        if kind != SegmentKind::Code {
            out.push_str(segment);
            continue;
        }
        let mut chars = segment.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if !is_ident_char(c) {
                out.push(c);
                continue;
            }
            let mut end = start + c.len_utf8();
            while let Some(&(at, next)) = chars.peek() {
                if !is_ident_char(next) {
                    break;
                }
                end = at + next.len_utf8();
                chars.next();
            }
            let word = &segment[start..end];
            match bindings.get(word) {
                Some(value) if is_ident_start(c) => out.push_str(value),
                _ => out.push_str(word),
            }
        }
    }
    out
}
