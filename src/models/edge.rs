//! # 吸收边数据模型
//!
//! 定义吸收边类型（K, L1, L2, L3）以及单个吸收边测量请求。
//!
//! ## 依赖关系
//! - 被 `xas/` 各模块和 `models/request.rs` 使用
//! - 使用 `xas/elements.rs` 规范化元素符号

use crate::error::{Result, XasError};
use crate::xas::elements;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 吸收边类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    K,
    L1,
    L2,
    L3,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [EdgeType::K, EdgeType::L1, EdgeType::L2, EdgeType::L3];

    /// 在元素表吸收边数组中的下标
    pub fn index(self) -> usize {
        match self {
            EdgeType::K => 0,
            EdgeType::L1 => 1,
            EdgeType::L2 => 2,
            EdgeType::L3 => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EdgeType::K => "K",
            EdgeType::L1 => "L1",
            EdgeType::L2 => "L2",
            EdgeType::L3 => "L3",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for EdgeType {
    type Err = XasError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "K" => Ok(EdgeType::K),
            "L1" => Ok(EdgeType::L1),
            "L2" => Ok(EdgeType::L2),
            "L3" => Ok(EdgeType::L3),
            other => Err(XasError::InvalidArgument(format!(
                "unsupported edge type '{}' (expected K, L1, L2 or L3)",
                other
            ))),
        }
    }
}

/// 单个吸收边测量请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
    /// 规范化的元素符号
    pub element: &'static str,
    pub edge_type: EdgeType,
}

impl EdgeRequest {
    /// 由原始字符串构造，元素符号大小写不敏感
    pub fn parse(element: &str, edge_type: &str) -> Result<Self> {
        let symbol = elements::canonical_symbol(element)
            .ok_or_else(|| XasError::UnknownElement(element.trim().to_string()))?;
        Ok(EdgeRequest {
            element: symbol,
            edge_type: edge_type.parse()?,
        })
    }
}

impl std::fmt::Display for EdgeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.element, self.edge_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_type_from_str() {
        assert_eq!("K".parse::<EdgeType>().unwrap(), EdgeType::K);
        assert_eq!("l3".parse::<EdgeType>().unwrap(), EdgeType::L3);
        assert_eq!(" L1 ".parse::<EdgeType>().unwrap(), EdgeType::L1);
        assert!("M5".parse::<EdgeType>().is_err());
    }

    #[test]
    fn test_edge_request_normalizes_symbol() {
        let req = EdgeRequest::parse("fe", "k").unwrap();
        assert_eq!(req.element, "Fe");
        assert_eq!(req.edge_type, EdgeType::K);
        assert_eq!(req.to_string(), "Fe K");
    }

    #[test]
    fn test_edge_request_unknown_element() {
        match EdgeRequest::parse("Xx", "K") {
            Err(XasError::UnknownElement(sym)) => assert_eq!(sym, "Xx"),
            other => panic!("expected UnknownElement, got {:?}", other),
        }
    }
}
