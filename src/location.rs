//! Source locations tracked while a stream is preprocessed.

use serde::Serialize;
use std::fmt;

/// Where a logical line came from: file name, line number and an optional column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
            column: None,
        }
    }

    /// Location of built-in definitions installed at session start.
    pub fn builtin() -> Self {
        Self::new("<builtin>", 1)
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = Some(column);
        self
    }

    /// Folder holding this location's file, if it names a real file.
    pub fn folder(&self) -> Option<std::path::PathBuf> {
        if self.file.starts_with('<') || self.file == "-" || self.file == "stdin" {
            return None;
        }
        std::path::Path::new(&self.file)
            .parent()
            .map(|parent| parent.to_path_buf())
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        Self::new("stdin", 1)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}:{}", self.file, self.line)?;
        if let Some(column) = self.column {
            write!(f, ".{}", column)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_optional_column() {
        assert_eq!(SourceLocation::new("a.c", 3).to_string(), "@a.c:3");
        assert_eq!(
            SourceLocation::new("a.c", 3).with_column(7).to_string(),
            "@a.c:3.7"
        );
    }

    #[test]
    fn folder_skips_pseudo_files() {
        assert!(SourceLocation::new("stdin", 1).folder().is_none());
        assert!(SourceLocation::builtin().folder().is_none());
        assert_eq!(
            SourceLocation::new("inc/a.h", 1).folder(),
            Some(std::path::PathBuf::from("inc"))
        );
    }
}
