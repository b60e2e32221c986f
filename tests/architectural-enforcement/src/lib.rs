//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! across the router crates:
//! - No blocking I/O inside async code
//! - No `unwrap()`/`expect()` in production code
//!
//! The helpers here locate production sources and strip their test modules so
//! each rule only sees code that ships.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const PRODUCTION_ROOTS: &[&str] = &["router/core/src", "router/daemon/src"];

/// A production source file with its test module removed
pub struct SourceFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    /// Lines before the first `#[cfg(test)]`
    pub lines: Vec<String>,
}

/// Get the workspace root
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Load every production `.rs` file under [`PRODUCTION_ROOTS`]
#[must_use]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_ROOTS {
        for entry in walkdir::WalkDir::new(root.join(dir))
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let Ok(content) = fs::read_to_string(path) else {
                continue;
            };

            let lines = content
                .lines()
                .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
                .map(str::to_string)
                .collect();

            files.push(SourceFile {
                path: path.strip_prefix(&root).unwrap_or(path).to_path_buf(),
                lines,
            });
        }
    }

    files
}

/// The code part of a line, without any trailing `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") {
        return "";
    }
    line.split("//").next().unwrap_or(line)
}

/// Whether the nearest enclosing `fn` above `idx` is async
#[must_use]
pub fn is_in_async_function(lines: &[String], idx: usize) -> bool {
    for line in lines[..=idx].iter().rev() {
        let code = code_part(line);
        if code.contains("fn ") {
            return code.contains("async fn ") || code.contains("async move");
        }
        if code.contains("async move {") || code.contains("async {") {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(src: &str) -> Vec<String> {
        src.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("// std::fs::read"), "");
        assert_eq!(code_part("let x = 1; // std::fs"), "let x = 1; ");
    }

    #[test]
    fn test_async_detection() {
        let src = lines("async fn a() {\n    body();\n}\nfn b() {\n    body();\n}");
        assert!(is_in_async_function(&src, 1));
        assert!(!is_in_async_function(&src, 4));
    }

    #[test]
    fn test_production_sources_found() {
        let files = production_sources();
        assert!(files.iter().any(|f| f.path.ends_with("handler.rs")));
    }
}
