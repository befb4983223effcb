//! Architectural Enforcement Integration Tests
//!
//! Source scans that keep omnichat's production code honest:
//! - No sleep calls outside reconnect backoff
//! - No `unwrap()` / `expect()` / `panic!` in library code
//! - No blocking I/O inside async code
//!
//! Test code is exempt. A file's test code starts at its first
//! `#[cfg(test)]` line; everything after it is skipped.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Production source trees, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["omnichat/core/src", "omnichat/watch/src"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Production lines of one file, with comments stripped.
pub struct SourceFile {
    pub path: PathBuf,
    lines: Vec<String>,
}

impl SourceFile {
    pub fn read(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        Some(Self::parse(path, &content))
    }

    pub fn parse(path: &Path, content: &str) -> Self {
        let lines = content
            .lines()
            .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
            .map(str::to_string)
            .collect();
        Self {
            path: path.to_path_buf(),
            lines,
        }
    }

    /// Raw production lines
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Code portion of line `idx` (comments removed)
    pub fn code(&self, idx: usize) -> &str {
        let line = self.lines[idx].as_str();
        if line.trim_start().starts_with("//") {
            return "";
        }
        match line.find(" //") {
            Some(pos) => &line[..pos],
            None => line,
        }
    }

    /// Lines `before` above to `after` below `idx`, lowercased
    pub fn context(&self, idx: usize, before: usize, after: usize) -> String {
        let start = idx.saturating_sub(before);
        let end = (idx + after + 1).min(self.lines.len());
        self.lines[start..end].join("\n").to_lowercase()
    }

    /// Name of the closest enclosing `fn` above `idx`, with its `async`-ness
    pub fn enclosing_fn(&self, idx: usize) -> Option<(bool, &str)> {
        self.lines[..=idx].iter().rev().find_map(|line| {
            let trimmed = line.trim_start();
            let pos = trimmed.find("fn ")?;
            let head = &trimmed[..pos];
            let is_decl = head.is_empty()
                || head.split_whitespace().all(|w| {
                    matches!(w, "pub" | "async" | "const" | "unsafe") || w.starts_with("pub(")
                });
            is_decl.then(|| (head.contains("async"), trimmed))
        })
    }

    /// Lines for which `rule` reports a violation
    pub fn violations<F>(&self, rule: F) -> Vec<Violation>
    where
        F: Fn(&Self, usize, &str) -> bool,
    {
        (0..self.lines.len())
            .filter(|&idx| {
                let code = self.code(idx);
                !code.trim().is_empty() && rule(self, idx, code)
            })
            .map(|idx| Violation {
                path: self.path.clone(),
                line: idx + 1,
                text: self.lines[idx].trim().to_string(),
            })
            .collect()
    }
}

/// Workspace root (two levels above this crate)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under `dir`
pub fn rust_files(dir: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Production source files of the whole workspace
pub fn production_files() -> Vec<SourceFile> {
    let root = workspace_root();
    PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| rust_files(&root.join(dir)))
        .filter_map(|path| SourceFile::read(&path))
        .collect()
}

/// Run `rule` over every production file
pub fn scan<F>(rule: F) -> Vec<Violation>
where
    F: Fn(&SourceFile, usize, &str) -> bool,
{
    production_files()
        .iter()
        .flat_map(|file| file.violations(&rule))
        .collect()
}

/// Panic with a readable report if `violations` is non-empty
pub fn report(title: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n{title}:");
    for violation in violations {
        eprintln!("  {violation}");
    }
    panic!("\nFound {} violation(s): {title}", violations.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
use std::time::Duration;

pub async fn wait(delay: Duration) {
    // tokio::time::sleep(delay).await;
    tokio::time::sleep(delay).await; // reconnect backoff
}

#[cfg(test)]
mod tests {
    fn helper() { let _ = Some(1).unwrap(); }
}
";

    #[test]
    fn test_test_module_is_excluded() {
        let file = SourceFile::parse(Path::new("sample.rs"), SAMPLE);
        assert_eq!(file.lines().len(), 7);
        assert!(file.violations(|_, _, code| code.contains(".unwrap()")).is_empty());
    }

    #[test]
    fn test_comments_are_stripped() {
        let file = SourceFile::parse(Path::new("sample.rs"), SAMPLE);
        let hits = file.violations(|_, _, code| code.contains("sleep("));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].line, 5);
        assert_eq!(file.code(4).trim(), "tokio::time::sleep(delay).await;");
    }

    #[test]
    fn test_enclosing_fn_reports_async() {
        let file = SourceFile::parse(Path::new("sample.rs"), SAMPLE);
        let (is_async, decl) = file.enclosing_fn(4).unwrap();
        assert!(is_async);
        assert!(decl.starts_with("pub async fn wait"));
    }

    #[test]
    fn test_production_dirs_exist() {
        let root = workspace_root();
        for dir in PRODUCTION_DIRS {
            assert!(root.join(dir).is_dir(), "missing {dir}");
        }
        assert!(!production_files().is_empty());
    }
}
