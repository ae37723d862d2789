//! # 数据模型模块
//!
//! 定义样品层、吸收边请求和计算结果的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `xas/` 和 `commands/` 使用
//! - 子模块: compound, edge, request, result

pub mod compound;
pub mod edge;
pub mod request;
pub mod result;

pub use compound::{Compound, Layer};
pub use edge::{EdgeRequest, EdgeType};
pub use request::{CalcRequest, EdgeSpec, LayerSpec, MatrixSpec, SampleSpec};
pub use result::{Advisory, CalcResponse, EdgeOutcome, EdgeResult, EdgeSpectrum};
