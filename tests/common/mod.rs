// Shared helpers for the integration tests.
#![allow(dead_code)]

use rexpp::diagnostics::Severity;
use rexpp::directives::include::MemoryFileSystem;
use rexpp::{preprocess_with, Bootstrap, Options, PreprocError, Processed};

pub fn try_run_with(
    input: &str,
    options: Options,
    fs: MemoryFileSystem,
) -> Result<Processed, PreprocError> {
    preprocess_with(input, options, Box::new(fs))
}

pub fn run_with(input: &str, options: Options, fs: MemoryFileSystem) -> Processed {
    match try_run_with(input, options, fs) {
        Ok(processed) => processed,
        Err(err) => panic!("unexpected fatal error: {}", err),
    }
}

pub fn run(input: &str) -> Processed {
    run_with(input, Options::default(), MemoryFileSystem::new())
}

pub fn self_hosted() -> Options {
    Options {
        bootstrap: Bootstrap::SelfHosted,
        ..Options::default()
    }
}

/// Output lines that are not commented directives or dead lines.
pub fn code_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.starts_with("//"))
        .map(str::to_string)
        .collect()
}

pub fn messages(processed: &Processed, severity: Severity) -> Vec<String> {
    processed
        .diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .map(|d| d.message.clone())
        .collect()
}
