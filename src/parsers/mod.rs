//! # 解析器模块
//!
//! 提供化学式和计算请求文件的解析器。
//!
//! ## 依赖关系
//! - 被 `models/` 和 `commands/` 模块使用
//! - 子模块: formula, request

pub mod formula;
pub mod request;

pub use request::parse_request_file;
