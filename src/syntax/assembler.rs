//! Reassembles arbitrarily chunked input into logical lines.
//!
//! A physical line whose content ends in a backslash (trailing whitespace
//! allowed after it) continues on the next physical line. The joined logical
//! line keeps one `\n` per join so that the number of physical lines it
//! covers survives into the output.

use super::{check_reserved, SyntaxError};

/// A complete logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    pub text: String,
    /// How many physical input lines were folded into this one.
    pub physical_lines: usize,
}

#[derive(Debug, Default)]
pub struct LineAssembler {
    pending: String,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk of raw input.
    pub fn push(&mut self, chunk: &str) -> Result<(), SyntaxError> {
        check_reserved(chunk).map_err(|err| offset_by(err, self.pending.len()))?;
        self.pending.push_str(chunk);
        Ok(())
    }

    /// Injects text ahead of all pending input (used by `#include`).
    pub fn prepend(&mut self, text: &str) -> Result<(), SyntaxError> {
        check_reserved(text)?;
        self.pending.insert_str(0, text);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// The next complete logical line, or `None` if more input is needed.
    pub fn next_line(&mut self) -> Option<LogicalLine> {
        self.take(false)
    }

    /// The final logical line at end of input, terminated or not.
    pub fn flush(&mut self) -> Option<LogicalLine> {
        self.take(true)
    }

    fn take(&mut self, at_end: bool) -> Option<LogicalLine> {
        let mut parts: Vec<&str> = Vec::new();
        let mut consumed = 0;
        loop {
            let rest = &self.pending[consumed..];
            match rest.find('\n') {
                Some(newline) => {
                    let raw = &rest[..newline];
                    let raw = raw.strip_suffix('\r').unwrap_or(raw);
                    consumed += newline + 1;
                    match continued(raw) {
                        Some(head) => parts.push(head),
                        None => {
                            parts.push(raw);
                            break;
                        }
                    }
                }
                None => {
                    if !at_end {
                        return None;
                    }
                    if !rest.is_empty() {
                        parts.push(rest.strip_suffix('\r').unwrap_or(rest));
                        consumed += rest.len();
                    }
                    if parts.is_empty() {
                        return None;
                    }
                    break;
                }
            }
        }

        let physical_lines = parts.len();
        let text = parts
            .iter()
            .enumerate()
            .map(|(index, part)| if index == 0 { *part } else { part.trim_start() })
            .collect::<Vec<_>>()
            .join("\n");
        self.pending.drain(..consumed);
        Some(LogicalLine {
            text,
            physical_lines,
        })
    }
}

/// If `line` ends with an unescaped continuation backslash, returns the content
/// before it with trailing whitespace trimmed.
pub(crate) fn continued(line: &str) -> Option<&str> {
    let content = line.trim_end();
    let backslashes = content.chars().rev().take_while(|c| *c == '\\').count();
    if backslashes % 2 == 1 {
        Some(content[..content.len() - 1].trim_end())
    } else {
        None
    }
}

fn offset_by(err: SyntaxError, base: usize) -> SyntaxError {
    match err {
        SyntaxError::Reserved { ch, offset } => SyntaxError::Reserved {
            ch,
            offset: base + offset,
        },
        other => other,
    }
}
