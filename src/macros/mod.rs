//! Macro records, the macro table and the definition compiler.
//!
//! A macro is either *named* (an identifier, optionally with a parameter list)
//! or a *pattern* (a regex written with `#definex`). Its body is either a text
//! template or, when it is a single `{ ... }` block, a function body that is
//! compiled lazily into a script [`Program`] the first time it is invoked.

pub mod definition;
pub mod matcher;
pub mod table;
pub mod template;

pub use definition::{parse_define, DefineError, DefineParts, VARIADIC_PARAM};
pub use matcher::{MatchSite, Matcher, NamedMatcher, PatternMatcher};
pub use table::{DefineOutcome, MacroTable};

use crate::directives::Directive;
use crate::location::SourceLocation;
use crate::script::Program;
use serde::Serialize;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MacroKind {
    Named,
    Pattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyKind {
    Text,
    Function,
}

/// What a function macro runs when invoked.
#[derive(Debug, Clone)]
pub enum Callable {
    Script(Rc<Program>),
    Native(Directive),
}

#[derive(Debug, Clone)]
pub struct Macro {
    pub id: usize,
    pub key: String,
    pub kind: MacroKind,
    pub matcher: Matcher,
    pub body: String,
    pub params: Vec<String>,
    pub has_args: bool,
    pub variadic: bool,
    pub body_kind: BodyKind,
    pub compiled: Option<Callable>,
    /// Table version the compiled body was built against.
    pub compiled_at: Option<u64>,
    pub defined_at: SourceLocation,
}

/// A body that is one outer `{ ... }` block after trimming.
pub fn is_function_body(body: &str) -> bool {
    let body = body.trim();
    if !(body.starts_with('{') && body.ends_with('}')) {
        return false;
    }
    match crate::syntax::tagger::tag(body) {
        Ok(tagged) => tagged.closing_offset(0) == Some(body.len() - 1),
        Err(_) => false,
    }
}

impl Macro {
    /// Builds a macro from a parsed definition. The id is assigned by the table.
    pub fn from_parts(parts: DefineParts, location: SourceLocation) -> Result<Self, DefineError> {
        let params = parts.params.clone().unwrap_or_default();
        let has_args = parts.params.is_some();
        let (key, matcher) = match parts.kind {
            MacroKind::Named => {
                let arity = parts.params.as_ref().map(Vec::len);
                (
                    parts.name.clone(),
                    Matcher::Named(NamedMatcher::new(&parts.name, arity, parts.variadic)),
                )
            }
            MacroKind::Pattern => {
                let delimiter = parts.delimiter.unwrap_or('/');
                (
                    format!("{d}{}{d}{}", parts.name, parts.flags, d = delimiter),
                    Matcher::Pattern(PatternMatcher::new(&parts.name, &parts.flags)?),
                )
            }
        };
        let body_kind = if is_function_body(&parts.body) {
            BodyKind::Function
        } else {
            BodyKind::Text
        };
        Ok(Self {
            id: 0,
            key,
            kind: parts.kind,
            matcher,
            body: parts.body,
            params,
            has_args,
            variadic: parts.variadic,
            body_kind,
            compiled: None,
            compiled_at: None,
            defined_at: location,
        })
    }

    /// A function macro whose callable is a native directive handler.
    pub fn native(
        parts: DefineParts,
        directive: Directive,
        location: SourceLocation,
    ) -> Result<Self, DefineError> {
        let mut mac = Self::from_parts(parts, location)?;
        mac.body_kind = BodyKind::Function;
        mac.compiled = Some(Callable::Native(directive));
        Ok(mac)
    }

    pub fn is_function(&self) -> bool {
        self.body_kind == BodyKind::Function
    }

    pub fn is_native(&self) -> bool {
        matches!(self.compiled, Some(Callable::Native(_)))
    }

    /// Whether the compiled body must be rebuilt before use.
    pub fn is_stale(&self, version: u64) -> bool {
        match self.compiled {
            Some(Callable::Native(_)) => false,
            Some(Callable::Script(_)) => self.compiled_at != Some(version),
            None => true,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self.body_kind {
            BodyKind::Text => "text",
            BodyKind::Function => "function",
        }
    }

    pub fn summary(&self) -> MacroSummary {
        MacroSummary {
            id: self.id,
            key: self.key.clone(),
            kind: self.kind,
            body_kind: self.body_kind,
            params: self.params.clone(),
            body: self.body.clone(),
            native: self.is_native(),
            compiled: self.compiled.is_some(),
            defined_at: self.defined_at.clone(),
        }
    }
}

/// Serializable view of a macro for `#dump` and `--dump-json`.
#[derive(Debug, Clone, Serialize)]
pub struct MacroSummary {
    pub id: usize,
    pub key: String,
    pub kind: MacroKind,
    pub body_kind: BodyKind,
    pub params: Vec<String>,
    pub body: String,
    pub native: bool,
    pub compiled: bool,
    pub defined_at: SourceLocation,
}
