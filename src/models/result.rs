//! # 计算结果数据模型
//!
//! 每个吸收边请求对应一个 [`EdgeResult`]：成功时携带能量序列、光学厚度序列
//! 和诊断标量，失败时只携带错误信息。结果列表与请求顺序一一对应。
//!
//! ## JSON 形式
//! ```text
//! { "element": "Fe", "edge_type": "K", "edge_value": 7112.0, "edge_jump": 1.2, ... }
//! { "element": "Li", "edge_type": "L3", "error": "Li has no L3 absorption edge" }
//! ```
//!
//! ## 依赖关系
//! - 由 `xas/builder.rs` 和 `xas/calculator.rs` 构造
//! - 被 `xas/export.rs`, `xas/plot.rs`, `commands/calc.rs` 使用

use serde::Serialize;

/// 样品质量提示（指导性阈值，不作为错误）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    /// 吸收边跳跃过小，信号难以测量
    WeakEdgeJump,
    /// 吸收边跳跃过大，厚度效应明显
    StrongEdgeJump,
    /// 总吸收过高，透射信号过弱
    OpaqueStack,
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Advisory::WeakEdgeJump => write!(f, "edge jump too small"),
            Advisory::StrongEdgeJump => write!(f, "edge jump too large"),
            Advisory::OpaqueStack => write!(f, "total absorbance too high"),
        }
    }
}

/// 成功计算的吸收边谱
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSpectrum {
    /// 吸收边能量 (eV)
    pub edge_value: f64,
    /// 吸收边跳跃（光学厚度单位）
    pub edge_jump: f64,
    /// 网格上的最大光学厚度
    pub abs_max: f64,
    /// 网格上的最小光学厚度
    pub abs_min: f64,
    /// 能量 (eV)
    pub energies: Vec<f64>,
    /// 叠层总光学厚度
    pub optical_depth: Vec<f64>,
    /// 透过率 exp(-τ)
    pub transmission: Vec<f64>,
    /// LaTeX 风格的叠层标签
    pub compound_label: String,
    /// 纯文本叠层描述
    pub stack_label: String,
    /// 各层在吸收边上方 (E0 + ε) 的光学厚度，与层顺序一致
    pub layer_absorption: Vec<f64>,
    pub advisories: Vec<Advisory>,
}

/// 单个吸收边的计算结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EdgeOutcome {
    Computed(EdgeSpectrum),
    Failed { error: String },
}

/// 单个吸收边请求的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeResult {
    pub element: String,
    pub edge_type: String,
    #[serde(flatten)]
    pub outcome: EdgeOutcome,
}

impl EdgeResult {
    pub fn failed(element: &str, edge_type: &str, error: impl std::fmt::Display) -> Self {
        EdgeResult {
            element: element.to_string(),
            edge_type: edge_type.to_string(),
            outcome: EdgeOutcome::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn spectrum(&self) -> Option<&EdgeSpectrum> {
        match &self.outcome {
            EdgeOutcome::Computed(spectrum) => Some(spectrum),
            EdgeOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            EdgeOutcome::Computed(_) => None,
            EdgeOutcome::Failed { error } => Some(error),
        }
    }
}

/// 整个请求的响应
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CalcResponse {
    Results { results: Vec<EdgeResult> },
    Error { error: String },
}
