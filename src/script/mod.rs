//! The closed script language used by `#if`, `#include`, `#pragma` and
//! function-macro bodies.
//!
//! Expressions cover literals, arithmetic, comparison, logical operators,
//! the ternary operator and calls to builtins. Function bodies add `let`,
//! assignment, `if`/`else`, blocks and `return`. There is no access to the
//! host beyond the builtins a [`Host`] chooses to provide.

pub mod ast;
pub mod builtins;
pub mod interp;
pub mod parser;
pub mod value;

pub use ast::Program;
pub use interp::{evaluate, run_program, Host, PureHost};
pub use parser::{parse_expression, parse_function_body};
pub use value::Value;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    #[error("syntax error: {0}")]
    Parse(String),
    #[error("'{0}' is not defined")]
    UnknownIdentifier(String),
    #[error("'{0}' is not a function")]
    UnknownFunction(String),
    #[error("{name}() expects {expected} argument(s), got {actual}")]
    Arity {
        name: String,
        expected: String,
        actual: usize,
    },
    #[error("assignment to undeclared variable '{0}'")]
    Undeclared(String),
    #[error("{0}")]
    Host(String),
}
