//! Nested-structure tagging.
//!
//! Regex matchers cannot recurse, so nested brackets are made visible to them
//! through a depth table. [`tag`] records, for every unquoted and unescaped
//! `(`, `)`, `{` and `}`, its nesting depth and partner. Open brackets get the
//! depth before the push, close brackets the depth after the pop, so a
//! top-level pair is depth 0 on both sides.
//!
//! The table never alters the text. For regex matching, [`TaggedText::masked`]
//! is a same-length view where every nested bracket (depth 1 or more) is
//! replaced by a reserved stand-in. A user pattern such as `\(([^)]*)\)`
//! then binds the top-level pair and spans any nesting inside it.

use super::{
    check_reserved, for_each_code_char, SyntaxError, MASK_CLOSE_BRACE, MASK_CLOSE_PAREN,
    MASK_OPEN_BRACE, MASK_OPEN_PAREN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BracketKind {
    Paren,
    Brace,
}

impl BracketKind {
    fn of(c: char) -> Option<(BracketKind, bool)> {
        match c {
            '(' => Some((BracketKind::Paren, true)),
            ')' => Some((BracketKind::Paren, false)),
            '{' => Some((BracketKind::Brace, true)),
            '}' => Some((BracketKind::Brace, false)),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            BracketKind::Paren => 0,
            BracketKind::Brace => 1,
        }
    }

    fn mask(self, open: bool) -> char {
        match (self, open) {
            (BracketKind::Paren, true) => MASK_OPEN_PAREN,
            (BracketKind::Paren, false) => MASK_CLOSE_PAREN,
            (BracketKind::Brace, true) => MASK_OPEN_BRACE,
            (BracketKind::Brace, false) => MASK_CLOSE_BRACE,
        }
    }

    fn symbol(self, open: bool) -> char {
        match (self, open) {
            (BracketKind::Paren, true) => '(',
            (BracketKind::Paren, false) => ')',
            (BracketKind::Brace, true) => '{',
            (BracketKind::Brace, false) => '}',
        }
    }
}

/// One tagged bracket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketTag {
    pub offset: usize,
    pub kind: BracketKind,
    pub open: bool,
    pub depth: usize,
    /// Index of the matching bracket in the tag table, if any.
    pub partner: Option<usize>,
    /// Sequence number of this tag within the tagging call.
    pub serial: usize,
}

/// A line together with its bracket depth table.
#[derive(Debug, Clone)]
pub struct TaggedText {
    text: String,
    masked: String,
    tags: Vec<BracketTag>,
    unmatched: Vec<usize>,
}

/// Tags every unquoted, unescaped bracket in `text`.
///
/// Fails only when `text` already contains a reserved character, or when the
/// masked view would not have the same length as the text.
pub fn tag(text: &str) -> Result<TaggedText, SyntaxError> {
    check_reserved(text)?;

    let mut tags: Vec<BracketTag> = Vec::new();
    let mut stacks: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    let mut unmatched = Vec::new();
    let mut counter = 0;

    for_each_code_char(text, |offset, c| {
        let Some((kind, open)) = BracketKind::of(c) else {
            return;
        };
        let stack = &mut stacks[kind.index()];
        let index = tags.len();
        let (depth, partner) = if open {
            let depth = stack.len();
            stack.push(index);
            (depth, None)
        } else {
            match stack.pop() {
                Some(opener) => {
                    tags[opener].partner = Some(index);
                    (stack.len(), Some(opener))
                }
                None => {
                    unmatched.push(index);
                    (0, None)
                }
            }
        };
        counter += 1;
        tags.push(BracketTag {
            offset,
            kind,
            open,
            depth,
            partner,
            serial: counter,
        });
    });

    for stack in &stacks {
        unmatched.extend(stack.iter().copied());
    }
    unmatched.sort_unstable();

    let masked = mask(text, &tags);
    if masked.len() != text.len() {
        return Err(SyntaxError::LengthChanged {
            before: text.len(),
            after: masked.len(),
        });
    }
    log::trace!("tagged {} brackets, {} unmatched", tags.len(), unmatched.len());

    Ok(TaggedText {
        text: text.to_string(),
        masked,
        tags,
        unmatched,
    })
}

fn mask(text: &str, tags: &[BracketTag]) -> String {
    let mut bytes = text.as_bytes().to_vec();
    for tag in tags.iter().filter(|tag| tag.depth > 0) {
        // Brackets and their masks are single ASCII bytes.
        bytes[tag.offset] = tag.kind.mask(tag.open) as u8;
    }
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}

/// Restores plain text from a tagged line.
pub fn untag(tagged: TaggedText) -> String {
    tagged.text
}

impl TaggedText {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Same-length view with nested brackets replaced by reserved stand-ins.
    pub fn masked(&self) -> &str {
        &self.masked
    }

    pub fn tags(&self) -> &[BracketTag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn is_balanced(&self) -> bool {
        self.unmatched.is_empty()
    }

    /// The tag for the bracket at `offset`, if that byte is a tagged bracket.
    pub fn tag_at(&self, offset: usize) -> Option<&BracketTag> {
        self.tags
            .binary_search_by_key(&offset, |tag| tag.offset)
            .ok()
            .map(|index| &self.tags[index])
    }

    /// Offset of the bracket closing the one opened at `offset`.
    pub fn closing_offset(&self, offset: usize) -> Option<usize> {
        let tag = self.tag_at(offset)?;
        if !tag.open {
            return None;
        }
        tag.partner.map(|index| self.tags[index].offset)
    }

    /// Warning text naming the unmatched brackets, if there are any.
    pub fn imbalance(&self) -> Option<String> {
        if self.unmatched.is_empty() {
            return None;
        }
        let mut parts = Vec::new();
        for kind in [BracketKind::Paren, BracketKind::Brace] {
            for open in [true, false] {
                let offsets: Vec<String> = self
                    .unmatched
                    .iter()
                    .map(|&index| &self.tags[index])
                    .filter(|tag| tag.kind == kind && tag.open == open)
                    .map(|tag| tag.offset.to_string())
                    .collect();
                if !offsets.is_empty() {
                    parts.push(format!(
                        "{} unmatched '{}' at offset{} {}",
                        offsets.len(),
                        kind.symbol(open),
                        if offsets.len() == 1 { "" } else { "s" },
                        offsets.join(", ")
                    ));
                }
            }
        }
        Some(format!("unbalanced nesting: {}", parts.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::EOL_MARK;

    fn depths(text: &str) -> Vec<(char, usize)> {
        let tagged = tag(text).unwrap();
        tagged
            .tags()
            .iter()
            .map(|t| (t.kind.symbol(t.open), t.depth))
            .collect()
    }

    #[test]
    fn open_uses_depth_before_push_close_after_pop() {
        assert_eq!(
            depths("f(a(b), {c})"),
            vec![('(', 0), ('(', 1), (')', 1), ('{', 0), ('}', 0), (')', 0)]
        );
    }

    #[test]
    fn brackets_in_quotes_and_escapes_are_ignored() {
        assert_eq!(depths(r#"f(")", \(, '{')"#), vec![('(', 0), (')', 0)]);
    }

    #[test]
    fn masked_view_hides_nested_brackets_only() {
        let tagged = tag("F((a)+(b))").unwrap();
        let masked = tagged.masked();
        assert_eq!(masked.len(), tagged.len());
        assert_eq!(
            masked,
            format!(
                "F({o}a{c}+{o}b{c})",
                o = MASK_OPEN_PAREN,
                c = MASK_CLOSE_PAREN
            )
        );
    }

    #[test]
    fn partners_are_linked() {
        let tagged = tag("x(y{z}(w))").unwrap();
        assert_eq!(tagged.closing_offset(1), Some(9));
        assert_eq!(tagged.closing_offset(3), Some(5));
        assert_eq!(tagged.closing_offset(0), None);
    }

    #[test]
    fn round_trip_preserves_text_and_length() {
        for text in ["", "plain", "a(b{c}d)e", "((((", "))}{", "'(' \\) \"{\""] {
            let tagged = tag(text).unwrap();
            assert_eq!(tagged.len(), text.len());
            assert_eq!(tagged.masked().len(), text.len());
            assert_eq!(untag(tagged), text);
        }
    }

    #[test]
    fn unbalanced_input_reports_but_round_trips() {
        let tagged = tag("(a(b").unwrap();
        assert!(!tagged.is_balanced());
        let warning = tagged.imbalance().unwrap();
        assert!(warning.contains("2 unmatched '(' at offsets 0, 2"));
        assert_eq!(untag(tagged), "(a(b");
    }

    #[test]
    fn unmatched_close_gets_depth_zero() {
        assert_eq!(depths("a)"), vec![(')', 0)]);
        assert!(tag("a)").unwrap().imbalance().is_some());
    }

    #[test]
    fn reserved_characters_are_rejected() {
        let text = format!("x{}y", EOL_MARK);
        assert_eq!(
            tag(&text).unwrap_err(),
            SyntaxError::Reserved {
                ch: EOL_MARK,
                offset: 1
            }
        );
    }
}
