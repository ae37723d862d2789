//! # 请求文件收集器
//!
//! 在批量模式下收集目录中的计算请求文件。
//!
//! ## 功能
//! - 逗号分隔的多个 glob 模式（默认 `*.json`）
//! - 可选递归目录搜索
//! - 排除输出目录，避免把上一次的结果当作请求
//! - 结果按路径排序，批量输出顺序稳定
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs` 调用
//! - 使用 `walkdir` 遍历目录，`glob` 匹配文件名

use crate::error::{Result, XasError};

use glob::Pattern;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 请求文件收集器
pub struct FileCollector {
    /// 输入目录
    input: PathBuf,
    /// 文件名匹配模式
    patterns: Vec<Pattern>,
    /// 是否递归
    recursive: bool,
    /// 跳过该目录下的文件
    exclude: Option<PathBuf>,
}

impl FileCollector {
    pub fn new(input: PathBuf) -> Self {
        Self {
            input,
            patterns: Vec::new(),
            recursive: false,
            exclude: None,
        }
    }

    /// 设置匹配模式（逗号分隔的多模式）
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.patterns = pattern
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Pattern::new(s).map_err(|e| {
                    XasError::InvalidArgument(format!("invalid pattern '{}': {}", s, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 排除目录（通常是批量输出目录）
    pub fn exclude(mut self, dir: &Path) -> Self {
        self.exclude = Some(dir.to_path_buf());
        self
    }

    /// 收集所有匹配的文件
    pub fn collect(&self) -> Vec<PathBuf> {
        if !self.input.is_dir() {
            return vec![];
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let excluded = self
            .exclude
            .as_ref()
            .and_then(|dir| dir.canonicalize().ok());

        let mut files: Vec<PathBuf> = WalkDir::new(&self.input)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| self.matches_patterns(e.path()))
            .filter(|e| match (&excluded, e.path().canonicalize()) {
                (Some(dir), Ok(path)) => !path.starts_with(dir),
                _ => true,
            })
            .map(|e| e.path().to_path_buf())
            .collect();

        files.sort();
        files
    }

    /// 检查文件名是否匹配任一模式，未设置模式时全部匹配
    fn matches_patterns(&self, path: &Path) -> bool {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };

        self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_pattern_matching() {
        let collector = FileCollector::new(PathBuf::from("."))
            .with_pattern("*.json, sample_?.txt")
            .unwrap();
        assert!(collector.matches_patterns(Path::new("fe2o3.json")));
        assert!(collector.matches_patterns(Path::new("dir/sample_1.txt")));
        assert!(!collector.matches_patterns(Path::new("sample_12.txt")));
        assert!(!collector.matches_patterns(Path::new("notes.md")));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = FileCollector::new(PathBuf::from(".")).with_pattern("[*.json");
        assert!(matches!(result, Err(XasError::InvalidArgument(_))));
    }

    #[test]
    fn test_collect_sorted_and_excludes_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("results");
        let nested = dir.path().join("nested");
        fs::create_dir_all(&out).unwrap();
        fs::create_dir_all(&nested).unwrap();
        touch(&dir.path().join("b.json"));
        touch(&dir.path().join("a.json"));
        touch(&dir.path().join("readme.txt"));
        touch(&out.join("a.json"));
        touch(&nested.join("c.json"));

        let flat = FileCollector::new(dir.path().to_path_buf())
            .with_pattern("*.json")
            .unwrap()
            .collect();
        let names: Vec<_> = flat.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
        assert_eq!(names, vec!["a.json", "b.json"]);

        let deep = FileCollector::new(dir.path().to_path_buf())
            .with_pattern("*.json")
            .unwrap()
            .recursive(true)
            .exclude(&out)
            .collect();
        assert_eq!(deep.len(), 3);
        assert!(deep.iter().all(|p| !p.starts_with(&out)));
    }
}
