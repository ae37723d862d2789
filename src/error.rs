//! # 统一错误处理模块
//!
//! 定义 xascalc 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误传播策略
//! - 请求级错误（`ValidationError`）：在任何计算开始前直接拒绝整个请求
//! - 其余错误（解析、物理数据、数值计算）：在单个吸收边的边界处捕获，
//!   转换为该吸收边结果的 `error` 字段，不影响其他吸收边
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use thiserror::Error;

/// xascalc 统一错误类型
#[derive(Error, Debug)]
pub enum XasError {
    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid chemical formula '{formula}': {reason}")]
    ParseError { formula: String, reason: String },

    #[error("Failed to parse request file: {path}\nReason: {reason}")]
    RequestParse { path: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // 请求校验错误（请求级）
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid request: {0}")]
    ValidationError(String),

    // ─────────────────────────────────────────────────────────────
    // 物理数据 / 计算错误（吸收边级）
    // ─────────────────────────────────────────────────────────────
    #[error("Unknown element: {0}")]
    UnknownElement(String),

    #[error("{element} has no {edge} absorption edge")]
    UnknownEdge { element: String, edge: String },

    #[error("Energy {energy:.1} eV is outside the supported range ({min:.0}-{max:.0} eV)")]
    EnergyOutOfRange { energy: f64, min: f64, max: f64 },

    #[error("Computation failed: {0}")]
    ComputationError(String),

    #[error("Layer {index} ({formula}): {source}")]
    LayerError {
        index: usize,
        formula: String,
        #[source]
        source: Box<XasError>,
    },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 序列化错误
    // ─────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, XasError>;
