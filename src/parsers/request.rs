//! # 计算请求文件解析器
//!
//! 读取 JSON 格式的计算请求文件，格式见 `models/request.rs`。
//!
//! ## 依赖关系
//! - 被 `parsers/mod.rs` 使用
//! - 被 `commands/calc.rs` 的单文件和批量模式、`commands/scan.rs` 使用
//! - 使用 `serde_json` 反序列化

use crate::error::{Result, XasError};
use crate::models::CalcRequest;
use std::fs;
use std::path::Path;

/// 解析请求文件
pub fn parse_request_file(path: &Path) -> Result<CalcRequest> {
    if !path.exists() {
        return Err(XasError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let content = fs::read_to_string(path).map_err(|e| XasError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_request_content(&content).map_err(|e| XasError::RequestParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// 从字符串内容解析请求
pub fn parse_request_content(content: &str) -> Result<CalcRequest> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_request_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{ "layers": [{{ "formula": "CuO", "area_density_g_per_cm2": 0.01 }}],
                 "edges": [{{ "element": "Cu", "edge_type": "K" }}] }}"#
        )
        .unwrap();

        let request = parse_request_file(file.path()).unwrap();
        assert_eq!(request.layers[0].formula, "CuO");
        assert_eq!(request.edges[0].element, "Cu");
    }

    #[test]
    fn test_parse_request_missing_file() {
        let result = parse_request_file(Path::new("/nonexistent/request.json"));
        assert!(matches!(result, Err(XasError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_request_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "layers": "#).unwrap();

        let result = parse_request_file(file.path());
        assert!(matches!(result, Err(XasError::RequestParse { .. })));
    }

    #[test]
    fn test_parse_request_missing_edges() {
        let result = parse_request_content(r#"{ "layers": [] }"#);
        assert!(matches!(result, Err(XasError::JsonError(_))));
    }
}
