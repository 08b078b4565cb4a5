//! Include-file resolution and the file system it reads through.

use crate::syntax::assembler::continued;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// System folders searched after the caller's folders.
pub const DEFAULT_INCLUDE_FOLDERS: [&str; 3] = [".", "/usr/local/include", "/usr/include"];

/// The name that reads standard input.
pub const STDIN_NAME: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncludeError {
    #[error("file '{name}' not found in {searched}")]
    NotFound { name: String, searched: String },
    #[error("can't read '{path}': {reason}")]
    Unreadable { path: String, reason: String },
    #[error("folder not found: '{0}'")]
    FolderNotFound(String),
}

// ============================================================================
// FILE SYSTEM
// ============================================================================

/// Everything `#include` and `#incl_folder` need from the outside world.
pub trait FileSystem {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn read_to_string(&mut self, path: &Path) -> std::io::Result<String>;
    /// `root` followed by every folder below it.
    fn subfolders(&self, root: &Path) -> Vec<PathBuf>;
}

/// The real file system. `-` reads standard input.
#[derive(Debug, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path == Path::new(STDIN_NAME) || path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_to_string(&mut self, path: &Path) -> std::io::Result<String> {
        if path == Path::new(STDIN_NAME) {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            return Ok(text);
        }
        std::fs::read_to_string(path)
    }

    fn subfolders(&self, root: &Path) -> Vec<PathBuf> {
        WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect()
    }
}

/// An in-memory file tree for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileSystem {
    files: HashMap<PathBuf, String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl FileSystem for MemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let path = normalize(path);
        path.as_os_str().is_empty()
            || self
                .files
                .keys()
                .any(|file| file.starts_with(&path) && file != &path)
    }

    fn read_to_string(&mut self, path: &Path) -> std::io::Result<String> {
        self.files.get(&normalize(path)).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file")
        })
    }

    fn subfolders(&self, root: &Path) -> Vec<PathBuf> {
        let root = normalize(root);
        let mut folders: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|file| file.starts_with(&root))
            .flat_map(|file| file.ancestors().skip(1).map(Path::to_path_buf).collect::<Vec<_>>())
            .filter(|folder| folder.starts_with(&root))
            .collect();
        folders.sort();
        folders.dedup();
        folders
    }
}

/// Drops `.` components so `./a.h` and `a.h` name the same file.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, std::path::Component::CurDir))
        .collect()
}

// ============================================================================
// SEARCH PATH
// ============================================================================

/// Caller-registered folders followed by the defaults.
#[derive(Debug, Clone)]
pub struct IncludePaths {
    caller: Vec<PathBuf>,
    defaults: Vec<PathBuf>,
}

impl Default for IncludePaths {
    fn default() -> Self {
        Self::new(DEFAULT_INCLUDE_FOLDERS.iter().map(PathBuf::from).collect())
    }
}

impl IncludePaths {
    pub fn new(defaults: Vec<PathBuf>) -> Self {
        Self {
            caller: Vec::new(),
            defaults,
        }
    }

    pub fn caller_folders(&self) -> &[PathBuf] {
        &self.caller
    }

    /// Registers `folder` (`~` expanded). A trailing `/**` also registers
    /// every folder below it. Returns the folders added.
    pub fn add_folder(
        &mut self,
        folder: &str,
        fs: &dyn FileSystem,
    ) -> Result<Vec<PathBuf>, IncludeError> {
        let expanded = expand_home(folder.trim());
        let (root, recursive) = match expanded.strip_suffix("/**") {
            Some(root) => (root.to_string(), true),
            None => (expanded, false),
        };
        let root = PathBuf::from(if root.is_empty() { "/" } else { &root });
        if !fs.is_dir(&root) {
            return Err(IncludeError::FolderNotFound(folder.trim().to_string()));
        }
        let added = if recursive {
            fs.subfolders(&root)
        } else {
            vec![root]
        };
        self.caller.extend(added.iter().cloned());
        Ok(added)
    }

    /// Finds an include target. Names in `<...>` search the caller folders
    /// then the defaults; other names try `current_folder` first.
    pub fn resolve(
        &self,
        name: &str,
        current_folder: Option<&Path>,
        fs: &dyn FileSystem,
    ) -> Result<PathBuf, IncludeError> {
        if name == STDIN_NAME {
            return Ok(PathBuf::from(STDIN_NAME));
        }
        let (name, angled) = match name.strip_prefix('<').and_then(|n| n.strip_suffix('>')) {
            Some(inner) => (inner, true),
            None => (name, false),
        };
        let name = expand_home(name);
        let path = Path::new(&name);
        if path.is_absolute() {
            if fs.exists(path) {
                return Ok(path.to_path_buf());
            }
            return Err(IncludeError::NotFound {
                name,
                searched: "absolute path".to_string(),
            });
        }

        let mut candidates: Vec<PathBuf> = Vec::new();
        if !angled {
            candidates.push(current_folder.map_or_else(|| PathBuf::from("."), Path::to_path_buf));
        }
        candidates.extend(self.caller.iter().cloned());
        candidates.extend(self.defaults.iter().cloned());

        for folder in &candidates {
            let candidate = folder.join(path);
            if fs.exists(&candidate) {
                log::debug!("include '{}' resolved to {}", name, candidate.display());
                return Ok(candidate);
            }
        }
        let searched = candidates
            .iter()
            .map(|folder| folder.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(IncludeError::NotFound {
            name,
            searched: format!("folders: {}", searched),
        })
    }
}

/// Expands a leading `~` to `$HOME`.
pub fn expand_home(path: &str) -> String {
    let home = std::env::var("HOME").unwrap_or_default();
    if home.is_empty() {
        return path.to_string();
    }
    if path == "~" {
        return home;
    }
    match path.strip_prefix("~/") {
        Some(rest) => format!("{}/{}", home.trim_end_matches('/'), rest),
        None => path.to_string(),
    }
}

/// Text injected ahead of the pending input for an include.
pub struct Injection {
    /// The content framed by line markers that relocate into the file and back.
    pub text: String,
    /// The last line ended in a continuation, which was dropped so the
    /// closing marker stays a line of its own.
    pub cut_continuation: bool,
}

pub fn injection(content: &str, file: &str, resume_file: &str, resume_line: usize) -> Injection {
    let body = content.strip_suffix('\n').unwrap_or(content);
    let body = body.strip_suffix('\r').unwrap_or(body);
    let last = body.rfind('\n').map_or(0, |newline| newline + 1);
    let (body, cut_continuation) = match continued(&body[last..]) {
        Some(head) => (format!("{}{}", &body[..last], head), true),
        None => (body.to_string(), false),
    };
    let mut text = format!("#line 1 \"{}\"\n", file);
    if !content.is_empty() {
        text.push_str(&body);
        text.push('\n');
    }
    text.push_str(&format!("#line {} \"{}\"\n", resume_line, resume_file));
    Injection {
        text,
        cut_continuation,
    }
}
