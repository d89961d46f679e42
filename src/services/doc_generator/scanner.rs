//! 源文件扫描器
//!
//! 递归收集项目目录下支持的源文件

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::services::language::SourceKind;

/// 默认忽略模式
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "node_modules",
    "__pycache__",
    "venv",
    "target",
    "dist",
    "build",
    "bin",
    "obj",
    "out",
    "*.min.js",
];

/// 源文件扫描器
pub struct SourceScanner {
    /// 编译后的忽略模式（glob patterns）
    ignore_patterns: Vec<glob::Pattern>,
    /// 文档输出目录，扫描时跳过
    output_dir: Option<PathBuf>,
}

impl SourceScanner {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let ignore_patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p.as_ref()) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Invalid ignore pattern '{}': {}", p.as_ref(), e);
                    None
                }
            })
            .collect();

        Self {
            ignore_patterns,
            output_dir: None,
        }
    }

    pub fn with_default_patterns() -> Self {
        Self::new(DEFAULT_IGNORE_PATTERNS)
    }

    /// 跳过文档输出目录
    pub fn skip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// 扫描目录，返回排序后的源文件路径
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        info!("Starting source scan: {}", root.display());
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.should_ignore(e.path()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Failed to read entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() && SourceKind::is_supported(entry.path()) {
                files.push(entry.into_path());
            }
        }

        files.sort();
        info!("Scan completed: {} source files", files.len());
        Ok(files)
    }

    /// 检查是否应该忽略该路径
    fn should_ignore(&self, path: &Path) -> bool {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // 隐藏文件/目录
        if name.starts_with('.') {
            return true;
        }

        if self.output_dir.as_deref() == Some(path) {
            debug!("Skipping output directory: {}", path.display());
            return true;
        }

        self.ignore_patterns.iter().any(|pattern| {
            pattern.matches(&name) || path.to_str().is_some_and(|p| pattern.matches(p))
        })
    }
}

/// 扫描错误类型
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();

        let src = dir.path().join("src");
        fs::create_dir_all(src.join("utils")).unwrap();
        fs::write(src.join("main.py"), "print('hello')").unwrap();
        fs::write(src.join("utils/Helper.java"), "class Helper {}").unwrap();
        fs::write(src.join("notes.txt"), "not code").unwrap();

        // 应该被忽略的目录
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git/hook.sh"), "x").unwrap();
        fs::create_dir_all(dir.path().join("docs_out")).unwrap();
        fs::write(dir.path().join("docs_out/old.py"), "x").unwrap();

        dir
    }

    #[test]
    fn test_scan_collects_supported_files() {
        let dir = create_test_dir();
        let scanner = SourceScanner::with_default_patterns().skip_dir(dir.path().join("docs_out"));

        let files = scanner.scan(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|f| f.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();

        assert_eq!(names, vec!["src/main.py", "src/utils/Helper.java"]);
    }

    #[test]
    fn test_scan_errors() {
        let dir = create_test_dir();
        let scanner = SourceScanner::with_default_patterns();

        assert!(matches!(
            scanner.scan(&dir.path().join("missing")),
            Err(ScanError::PathNotFound(_))
        ));
        assert!(matches!(
            scanner.scan(&dir.path().join("src/main.py")),
            Err(ScanError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_should_ignore() {
        let scanner = SourceScanner::with_default_patterns();

        assert!(scanner.should_ignore(Path::new("/p/.gitignore")));
        assert!(scanner.should_ignore(Path::new("/p/node_modules")));
        assert!(scanner.should_ignore(Path::new("/p/app.min.js")));
        assert!(!scanner.should_ignore(Path::new("/p/main.py")));
    }
}
