//! # XAS 衰减计算模块
//!
//! 为透射 XAS 样品片计算吸收边附近的光学厚度曲线、吸收边跳跃和总吸收。
//!
//! ## 子模块
//! - `elements`: 元素符号表
//! - `provider`: 截面数据源接口及 XrayDB 实现
//! - `grid`: 吸收边附近的能量网格
//! - `attenuation`: 质量分数与叠层光学厚度
//! - `edge`: 吸收边定位与跳跃
//! - `builder`: 结果组装与标签
//! - `calculator`: 请求编排
//! - `scan`: 稀释比例 × 面密度扫描
//! - `plot`: 图表生成
//! - `export`: 数据导出
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs`, `commands/scan.rs` 和 `commands/elements.rs` 使用
//! - 使用 `models/` 的层与结果模型

pub mod attenuation;
pub mod builder;
pub mod calculator;
pub mod edge;
pub mod elements;
pub mod export;
pub mod grid;
pub mod plot;
pub mod provider;
pub mod scan;

pub use calculator::XasCalculator;
pub use grid::GridConfig;
pub use provider::{default_provider, CrossSectionProvider, XrayDbProvider};
