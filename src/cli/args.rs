//! Command-line arguments.
//!
//! Flags are parsed with `clap`. The trailing arguments use the classic
//! preprocessor syntax and are classified by [`classify`], in order, into
//! startup directives, option changes and input files.

use crate::directives::include::STDIN_NAME;
use crate::syntax::{is_ident, quote};
use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "rexpp",
    version,
    about = "A streaming regex macro preprocessor where every directive is a macro."
)]
pub struct RexppArgs {
    /// When to color diagnostics on stderr.
    #[arg(long, value_enum, default_value_t = ColorWhen::Auto)]
    pub color: ColorWhen,

    /// Print the final macro table as JSON on stderr.
    #[arg(long)]
    pub dump_json: bool,

    /// Use the script prelude for the built-in directives.
    #[arg(long)]
    pub self_hosted: bool,

    /// -Dname=value, -Uname, -Ifolder, +opt, -opt, opt=value, or input files.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorWhen {
    Auto,
    Always,
    Never,
}

/// One classified trailing argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupArg {
    Define { name: String, value: String },
    Undefine(String),
    IncludeFolder(String),
    Switch { name: String, on: bool },
    Setting { name: String, value: String },
    File(String),
    Invalid(String),
}

const SWITCHES: [&str; 4] = ["echo", "dead", "linenums", "debug"];
const SETTINGS: [&str; 2] = ["eol", "debug"];

pub fn classify(arg: &str) -> StartupArg {
    if arg == STDIN_NAME {
        return StartupArg::File(arg.to_string());
    }
    let sign = arg.chars().next().filter(|c| *c == '+' || *c == '-');
    let Some(sign) = sign else {
        if let Some((name, value)) = arg.split_once('=') {
            if SETTINGS.contains(&name.trim()) {
                return StartupArg::Setting {
                    name: name.trim().to_string(),
                    value: value.trim().to_string(),
                };
            }
        }
        return StartupArg::File(arg.to_string());
    };
    let rest = &arg[1..];

    if SWITCHES.contains(&rest) {
        return StartupArg::Switch {
            name: rest.to_string(),
            on: sign == '+',
        };
    }
    if let Some((name, value)) = rest.split_once('=') {
        if SETTINGS.contains(&name.trim()) {
            return StartupArg::Setting {
                name: name.trim().to_string(),
                value: value.trim().to_string(),
            };
        }
    }
    if let Some(name) = rest.strip_prefix('U') {
        if is_ident(name) {
            return StartupArg::Undefine(name.to_string());
        }
    }
    if let Some(definition) = rest.strip_prefix('D') {
        let (name, value) = definition.split_once('=').unwrap_or((definition, ""));
        if is_ident(name) {
            return StartupArg::Define {
                name: name.to_string(),
                value: value.to_string(),
            };
        }
    }
    if let Some(folder) = rest.strip_prefix('I') {
        let folder = folder.trim();
        if !folder.is_empty() {
            return StartupArg::IncludeFolder(folder.to_string());
        }
    }
    StartupArg::Invalid(arg.to_string())
}

impl StartupArg {
    /// The directive line this argument injects at the start of the stream, if any.
    pub fn directive(&self) -> Option<String> {
        match self {
            StartupArg::Define { name, value } if value.is_empty() => {
                Some(format!("#define {}", name))
            }
            StartupArg::Define { name, value } => Some(format!("#define {} {}", name, value)),
            StartupArg::Undefine(name) => Some(format!("#undef {}", name)),
            StartupArg::IncludeFolder(folder) => Some(format!("#incl_folder {}", quote(folder))),
            StartupArg::File(file) => Some(format!("#include {}", quote(file))),
            _ => None,
        }
    }
}
