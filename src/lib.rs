pub use crate::config::{Bootstrap, Options};
pub use crate::errors::{ErrorKind, PreprocError};
pub use crate::preprocessor::{preprocess, preprocess_with, Preprocessor, Processed};

pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod directives;
pub mod engine;
pub mod errors;
pub mod location;
pub mod macros;
pub mod output;
pub mod preprocessor;
pub mod script;
pub mod session;
pub mod syntax;
