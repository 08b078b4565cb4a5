//! Matchers for named and pattern macros.
//!
//! Both kinds run against a [`TaggedText`]. Named matchers walk the code
//! segments themselves and use the bracket table to find the end of an
//! argument list, so nested parentheses and braces inside an argument are
//! atomic. Pattern matchers run the caller's regex over the masked view and
//! slice captures from the real text.

use super::definition::DefineError;
use crate::syntax::tagger::TaggedText;
use crate::syntax::{in_spans, is_ident_char, segments, SegmentKind};
use regex::Regex;
use std::ops::Range;

/// One match of a macro in a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSite {
    pub range: Range<usize>,
    /// Arguments in parameter order; `None` for a capture group that did not take part.
    pub args: Vec<Option<String>>,
}

#[derive(Debug, Clone)]
pub enum Matcher {
    Named(NamedMatcher),
    Pattern(PatternMatcher),
}

impl Matcher {
    /// All non-overlapping matches, leftmost first.
    pub fn find_all(&self, tagged: &TaggedText, protected: &[Range<usize>]) -> Vec<MatchSite> {
        match self {
            Matcher::Named(named) => named.find_all(tagged, protected),
            Matcher::Pattern(pattern) => pattern.find_all(tagged),
        }
    }
}

// ============================================================================
// NAMED MATCHER
// ============================================================================

#[derive(Debug, Clone)]
pub struct NamedMatcher {
    pub name: String,
    /// Number of declared parameters, `None` for an object-like macro.
    pub arity: Option<usize>,
    pub variadic: bool,
}

impl NamedMatcher {
    pub fn new(name: &str, arity: Option<usize>, variadic: bool) -> Self {
        Self {
            name: name.to_string(),
            arity,
            variadic,
        }
    }

    fn find_all(&self, tagged: &TaggedText, protected: &[Range<usize>]) -> Vec<MatchSite> {
        let text = tagged.text();
        let mut sites = Vec::new();
        let mut resume = 0;
        for (kind, segment) in segments(text) {
            if kind != SegmentKind::Code {
                continue;
            }
            let mut from = segment.start.max(resume);
            while from < segment.end {
                let Some(found) = text[from..segment.end].find(&self.name) else {
                    break;
                };
                let start = from + found;
                let end = start + self.name.len();
                from = end;
                if !self.at_word_boundaries(text, start, end) || in_spans(protected, start) {
                    continue;
                }
                match self.arity {
                    None => sites.push(MatchSite {
                        range: start..end,
                        args: Vec::new(),
                    }),
                    Some(arity) => {
                        if let Some(site) = self.call_site(tagged, start, end, arity) {
                            resume = site.range.end;
                            from = site.range.end;
                            sites.push(site);
                        }
                    }
                }
            }
        }
        sites
    }

    fn at_word_boundaries(&self, text: &str, start: usize, end: usize) -> bool {
        let first = self.name.chars().next();
        let last = self.name.chars().next_back();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        let left_ok = !(first.map_or(false, is_ident_char) && before.map_or(false, is_ident_char));
        let right_ok = !(last.map_or(false, is_ident_char) && after.map_or(false, is_ident_char));
        left_ok && right_ok
    }

    /// A call `NAME(args)` with the open paren immediately after the name.
    fn call_site(
        &self,
        tagged: &TaggedText,
        start: usize,
        end: usize,
        arity: usize,
    ) -> Option<MatchSite> {
        let text = tagged.text();
        if !text[end..].starts_with('(') {
            return None;
        }
        let close = tagged.closing_offset(end)?;
        let mut args = split_args(&text[end + 1..close]);
        if args.len() == 1 && args[0].is_empty() && arity == 0 {
            args.clear();
        }
        if self.variadic {
            let fixed = arity.saturating_sub(1);
            if args.len() < fixed {
                log::trace!("'{}' expects at least {} args, got {}", self.name, fixed, args.len());
                return None;
            }
            let rest = args.split_off(fixed).join(", ");
            args.push(rest);
        } else if args.len() != arity {
            log::trace!("'{}' expects {} args, got {}", self.name, arity, args.len());
            return None;
        }
        Some(MatchSite {
            range: start..close + 1,
            args: args.into_iter().map(Some).collect(),
        })
    }
}

/// Splits an argument list at top-level commas; brackets and quotes are atomic.
pub fn split_args(list: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut last = 0;
    for (kind, range) in segments(list) {
        if kind != SegmentKind::Code {
            continue;
        }
        for (at, c) in list[range.clone()].char_indices() {
            match c {
                '(' | '{' | '[' => depth += 1,
                ')' | '}' | ']' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    let comma = range.start + at;
                    args.push(list[last..comma].trim().to_string());
                    last = comma + 1;
                }
                _ => {}
            }
        }
    }
    args.push(list[last..].trim().to_string());
    args
}

// ============================================================================
// PATTERN MATCHER
// ============================================================================

#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pub regex: Regex,
    pub global: bool,
}

impl PatternMatcher {
    /// Compiles `pattern` with `/.../flags` style flags. No flags means `gx`.
    pub fn new(pattern: &str, flags: &str) -> Result<Self, DefineError> {
        let flags = if flags.is_empty() { "gx" } else { flags };
        let inline: String = flags.chars().filter(|c| "imsx".contains(*c)).collect();
        let source = if inline.is_empty() {
            pattern.to_string()
        } else {
            format!("(?{}){}", inline, pattern)
        };
        let regex = Regex::new(&source).map_err(|err| DefineError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self {
            regex,
            global: flags.contains('g'),
        })
    }

    fn find_all(&self, tagged: &TaggedText) -> Vec<MatchSite> {
        let text = tagged.text();
        let masked = tagged.masked();
        let mut sites = Vec::new();
        for captures in self.regex.captures_iter(masked) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            let args = (1..captures.len())
                .map(|group| captures.get(group).map(|m| text[m.range()].to_string()))
                .collect();
            sites.push(MatchSite {
                range: whole.range(),
                args,
            });
            if !self.global {
                break;
            }
        }
        sites
    }
}
