//! The rexpp command-line interface.
//!
//! Classifies the trailing arguments, turns them into startup directives,
//! streams the result to stdout and exits non-zero on fatal errors or when
//! errors were reported.

use crate::cli::args::{classify, ColorWhen, RexppArgs, StartupArg};
use crate::config::{Bootstrap, Options};
use crate::diagnostics::ConsoleSink;
use crate::directives::include::{OsFileSystem, STDIN_NAME};
use crate::errors::{print_error, PreprocError};
use crate::output::{StderrSink, StdoutSink};
use crate::preprocessor::Preprocessor;
use crate::syntax::quote;
use clap::Parser;
use std::process;
use termcolor::ColorChoice;

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = RexppArgs::parse();
    let code = match execute(&args) {
        Ok(code) => code,
        Err(err) => {
            print_error(err);
            1
        }
    };
    process::exit(code);
}

/// Options and startup directives gathered from the trailing arguments.
struct Startup {
    options: Options,
    directives: Vec<String>,
    problems: Vec<String>,
}

fn gather(args: &RexppArgs) -> Startup {
    let mut options = Options::default();
    if args.self_hosted {
        options.bootstrap = Bootstrap::SelfHosted;
    }
    let mut directives = Vec::new();
    let mut problems = Vec::new();
    let mut files = 0;

    for arg in &args.args {
        let classified = classify(arg);
        log::trace!("argument {:?} => {:?}", arg, classified);
        match classified {
            StartupArg::Switch { name, on } => {
                if let Err(problem) = options.set_switch(&name, on) {
                    problems.push(problem);
                }
            }
            StartupArg::Setting { name, value } => {
                if let Err(problem) = options.set_value(&name, &value) {
                    problems.push(problem);
                }
            }
            StartupArg::Invalid(arg) => problems.push(format!("invalid option: '{}'", arg)),
            other => {
                if matches!(other, StartupArg::File(_)) {
                    files += 1;
                }
                directives.extend(other.directive());
            }
        }
    }
    if files == 0 {
        directives.push(format!("#include {}", quote(STDIN_NAME)));
    }
    Startup {
        options,
        directives,
        problems,
    }
}

fn execute(args: &RexppArgs) -> Result<i32, PreprocError> {
    let Startup {
        options,
        directives,
        problems,
    } = gather(args);
    init_logging(&options);

    let choice = color_choice(args.color);
    let mut preprocessor = Preprocessor::new(
        options,
        Box::new(ConsoleSink::new(choice)),
        Box::new(OsFileSystem),
        StdoutSink,
    )?
    .with_echo(Box::new(StderrSink));

    for problem in problems {
        preprocessor.session_mut().diagnostics.error(problem, None);
    }
    let mut startup = directives.join("\n");
    startup.push('\n');
    preprocessor.feed(&startup)?;
    preprocessor.finish()?;

    let session = preprocessor.session();
    if args.dump_json {
        output::print_table_json(session);
    }
    output::print_summary(&session.diagnostics, choice);
    Ok(if session.diagnostics.has_errors() { 1 } else { 0 })
}

fn init_logging(options: &Options) {
    let mut builder = if options.debug {
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(options.debug_filter.as_deref().unwrap_or("debug"));
        builder
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
    };
    let _ = builder.format_timestamp(None).try_init();
}

fn color_choice(when: ColorWhen) -> ColorChoice {
    match when {
        ColorWhen::Always => ColorChoice::Always,
        ColorWhen::Never => ColorChoice::Never,
        ColorWhen::Auto if atty::is(atty::Stream::Stderr) => ColorChoice::Auto,
        ColorWhen::Auto => ColorChoice::Never,
    }
}
