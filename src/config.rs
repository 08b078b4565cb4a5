//! Preprocessor options.
//!
//! Everything is configured through [`Options`]; the CLI builds one from its
//! arguments. `+name` / `-name` switches and `name=value` settings map onto
//! [`Options::set_switch`] and [`Options::set_value`].

use crate::directives::include::DEFAULT_INCLUDE_FOLDERS;
use std::path::PathBuf;

/// How the built-in directives are installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bootstrap {
    /// Directive handlers are native functions.
    #[default]
    Native,
    /// Only `#define` is native; every other directive is defined by a
    /// script prelude that calls session builtins.
    SelfHosted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Copy every input line to the echo sink.
    pub echo: bool,
    /// Render suppressed lines as comments instead of blank lines.
    pub dead: bool,
    /// Prefix output lines with `file:line: `.
    pub linenums: bool,
    pub debug: bool,
    /// env_logger filter string, e.g. `rexpp::engine=trace`.
    pub debug_filter: Option<String>,
    /// Comment marker. When set, the first unquoted occurrence in each input
    /// line starts its comment tail; output always renders tails with it.
    pub eol: Option<String>,
    pub max_iterations: usize,
    pub max_replacements: usize,
    /// Open includes allowed at once; deeper nesting is fatal.
    pub max_include_depth: usize,
    /// Name used for locations in the top-level stream.
    pub input_name: String,
    pub bootstrap: Bootstrap,
    /// Searched before the system include folders.
    pub extra_include_folders: Vec<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            echo: false,
            dead: true,
            linenums: false,
            debug: false,
            debug_filter: None,
            eol: None,
            max_iterations: 20,
            max_replacements: 20,
            max_include_depth: 64,
            input_name: "stdin".to_string(),
            bootstrap: Bootstrap::Native,
            extra_include_folders: Vec::new(),
        }
    }
}

impl Options {
    /// The marker rendered in front of comment tails.
    pub fn eol_marker(&self) -> &str {
        self.eol.as_deref().unwrap_or("//")
    }

    /// Include folders searched after the caller-registered ones.
    pub fn default_include_folders(&self) -> Vec<PathBuf> {
        self.extra_include_folders
            .iter()
            .cloned()
            .chain(DEFAULT_INCLUDE_FOLDERS.iter().map(PathBuf::from))
            .collect()
    }

    /// Applies a `+name` / `-name` switch.
    pub fn set_switch(&mut self, name: &str, on: bool) -> Result<(), String> {
        match name {
            "echo" => self.echo = on,
            "dead" => self.dead = on,
            "linenums" => self.linenums = on,
            "debug" => self.debug = on,
            _ => return Err(format!("unknown switch '{}'", name)),
        }
        Ok(())
    }

    /// Applies a `name=value` setting.
    pub fn set_value(&mut self, name: &str, value: &str) -> Result<(), String> {
        match name {
            "eol" => {
                if value.is_empty() {
                    return Err("eol marker can't be empty".to_string());
                }
                self.eol = Some(value.to_string());
            }
            "debug" => {
                self.debug = true;
                self.debug_filter = Some(value.to_string());
            }
            _ => return Err(format!("unknown setting '{}'", name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switches_and_values() {
        let mut options = Options::default();
        options.set_switch("dead", false).unwrap();
        options.set_value("eol", "#").unwrap();
        assert!(!options.dead);
        assert_eq!(options.eol_marker(), "#");
        assert!(options.set_switch("bogus", true).is_err());
        assert!(options.set_value("eol", "").is_err());
    }

    #[test]
    fn extra_folders_come_before_system_folders() {
        let options = Options {
            extra_include_folders: vec![PathBuf::from("vendor")],
            ..Options::default()
        };
        let folders = options.default_include_folders();
        assert_eq!(folders[0], PathBuf::from("vendor"));
        assert_eq!(folders[1], PathBuf::from("."));
    }
}
