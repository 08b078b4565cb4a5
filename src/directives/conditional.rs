//! The `#if` / `#elif` / `#else` / `#endif` stack.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondState {
    On,
    Off,
    /// Inactive because an enclosing scope is off, or because an earlier
    /// branch of this chain was already taken. Never flips back on.
    InheritedOff,
}

impl fmt::Display for CondState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CondState::On => write!(f, "true"),
            CondState::Off => write!(f, "false"),
            CondState::InheritedOff => write!(f, "inherited"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CondError {
    #[error("#{0} without matching #if")]
    Unmatched(&'static str),
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    state: CondState,
    /// `#else` was seen; later `#elif`/`#else` lines are out of place.
    after_else: bool,
}

impl Scope {
    fn new(state: CondState) -> Self {
        Self {
            state,
            after_else: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConditionalStack {
    stack: Vec<Scope>,
}

impl ConditionalStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines are active unless the innermost scope is off.
    pub fn is_active(&self) -> bool {
        matches!(self.top(), None | Some(CondState::On))
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn top(&self) -> Option<CondState> {
        self.stack.last().map(|scope| scope.state)
    }

    /// Whether the innermost scope already had its `#else`.
    pub fn after_else(&self) -> bool {
        self.stack.last().map_or(false, |scope| scope.after_else)
    }

    /// Pushes the result of an `#if` evaluated in an active scope.
    pub fn push(&mut self, value: bool) -> CondState {
        let state = if value { CondState::On } else { CondState::Off };
        self.stack.push(Scope::new(state));
        state
    }

    /// Pushes an `#if` whose enclosing scope is inactive.
    pub fn push_inherited(&mut self) -> CondState {
        self.stack.push(Scope::new(CondState::InheritedOff));
        CondState::InheritedOff
    }

    /// Whether an `#elif` at this point needs its expression evaluated.
    pub fn elif_needs_value(&self) -> bool {
        self.top() == Some(CondState::Off)
    }

    pub fn elif(&mut self, value: bool) -> Result<CondState, CondError> {
        let top = self.stack.last_mut().ok_or(CondError::Unmatched("elif"))?;
        top.state = match top.state {
            CondState::Off if value => CondState::On,
            CondState::Off => CondState::Off,
            CondState::On | CondState::InheritedOff => CondState::InheritedOff,
        };
        Ok(top.state)
    }

    pub fn flip(&mut self) -> Result<CondState, CondError> {
        let top = self.stack.last_mut().ok_or(CondError::Unmatched("else"))?;
        top.state = match top.state {
            CondState::On => CondState::Off,
            CondState::Off => CondState::On,
            CondState::InheritedOff => CondState::InheritedOff,
        };
        top.after_else = true;
        Ok(top.state)
    }

    /// Pops the innermost scope and returns the new top.
    pub fn pop(&mut self) -> Result<Option<CondState>, CondError> {
        self.stack.pop().ok_or(CondError::Unmatched("endif"))?;
        Ok(self.top())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_else_endif() {
        let mut stack = ConditionalStack::new();
        assert!(stack.is_active());
        stack.push(false);
        assert!(!stack.is_active());
        assert_eq!(stack.flip(), Ok(CondState::On));
        assert!(stack.is_active());
        assert_eq!(stack.pop(), Ok(None));
        assert!(stack.is_empty());
    }

    #[test]
    fn nested_scopes_inherit_inactivity() {
        let mut stack = ConditionalStack::new();
        stack.push(false);
        stack.push_inherited();
        assert_eq!(stack.flip(), Ok(CondState::InheritedOff));
        assert!(!stack.is_active());
        stack.pop().unwrap();
        assert_eq!(stack.flip(), Ok(CondState::On));
    }

    #[test]
    fn elif_takes_only_the_first_true_branch() {
        let mut stack = ConditionalStack::new();
        stack.push(false);
        assert!(stack.elif_needs_value());
        assert_eq!(stack.elif(true), Ok(CondState::On));
        assert!(!stack.elif_needs_value());
        assert_eq!(stack.elif(true), Ok(CondState::InheritedOff));
        assert_eq!(stack.flip(), Ok(CondState::InheritedOff));
    }

    #[test]
    fn scopes_remember_their_else() {
        let mut stack = ConditionalStack::new();
        stack.push(true);
        assert!(!stack.after_else());
        stack.flip().unwrap();
        assert!(stack.after_else());
        assert_eq!(stack.elif(true), Ok(CondState::InheritedOff));
        stack.push(false);
        assert!(!stack.after_else());
        stack.pop().unwrap();
        assert!(stack.after_else());
    }

    #[test]
    fn unmatched_directives_fail() {
        let mut stack = ConditionalStack::new();
        assert_eq!(stack.pop(), Err(CondError::Unmatched("endif")));
        assert_eq!(stack.flip(), Err(CondError::Unmatched("else")));
        assert_eq!(stack.elif(true), Err(CondError::Unmatched("elif")));
    }
}
