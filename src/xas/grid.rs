//! # 能量网格
//!
//! 每个吸收边请求各自生成一个以吸收边能量 E0 为中心的等间距能量网格：
//! `[E0 - pre_edge, E0 + post_edge]`，步长 `step`。
//! 理论曲线在吸收边之外平滑，1 eV 级步长已足够。
//!
//! ## 依赖关系
//! - 被 `xas/calculator.rs` 调用
//! - `GridConfig` 可从请求文件 (`serde`) 和命令行参数构造

use crate::error::{Result, XasError};
use crate::xas::provider::{MAX_ENERGY, MIN_ENERGY};

use serde::{Deserialize, Serialize};

/// 单个吸收边网格的最大点数
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// 网格与吸收边跳跃参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// 吸收边前窗口宽度 (eV)
    #[serde(default = "default_pre_edge")]
    pub pre_edge: f64,
    /// 吸收边后窗口宽度 (eV)
    #[serde(default = "default_post_edge")]
    pub post_edge: f64,
    /// 能量步长 (eV)
    #[serde(default = "default_step")]
    pub step: f64,
    /// 计算吸收边跳跃时在 E0 两侧的偏移 ε (eV)
    #[serde(default = "default_jump_offset")]
    pub jump_offset: f64,
}

fn default_pre_edge() -> f64 {
    200.0
}
fn default_post_edge() -> f64 {
    800.0
}
fn default_step() -> f64 {
    1.0
}
fn default_jump_offset() -> f64 {
    1.0
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            pre_edge: default_pre_edge(),
            post_edge: default_post_edge(),
            step: default_step(),
            jump_offset: default_jump_offset(),
        }
    }
}

impl GridConfig {
    /// 校验参数（请求级错误）
    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !self.pre_edge.is_finite() || self.pre_edge < 0.0 {
            return Err(XasError::ValidationError(format!(
                "pre-edge window must be >= 0 eV, got {}",
                self.pre_edge
            )));
        }
        if !positive(self.post_edge) {
            return Err(XasError::ValidationError(format!(
                "post-edge window must be > 0 eV, got {}",
                self.post_edge
            )));
        }
        if !positive(self.step) {
            return Err(XasError::ValidationError(format!(
                "energy step must be > 0 eV, got {}",
                self.step
            )));
        }
        if !positive(self.jump_offset) {
            return Err(XasError::ValidationError(format!(
                "edge-jump offset must be > 0 eV, got {}",
                self.jump_offset
            )));
        }
        let points = (self.pre_edge + self.post_edge) / self.step + 1.0;
        if !(points <= MAX_GRID_POINTS as f64) {
            return Err(XasError::ValidationError(format!(
                "energy grid of {:.0} points exceeds the limit of {} (window {} eV, step {} eV)",
                points,
                MAX_GRID_POINTS,
                self.pre_edge + self.post_edge,
                self.step
            )));
        }
        Ok(())
    }
}

/// 有序能量网格 (eV)
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGrid {
    energies: Vec<f64>,
}

impl EnergyGrid {
    /// 以吸收边能量为中心生成网格，下限截断到数据源支持范围
    pub fn around(edge_value: f64, config: &GridConfig) -> Result<Self> {
        let start = (edge_value - config.pre_edge).max(MIN_ENERGY);
        let end = (edge_value + config.post_edge).min(MAX_ENERGY);

        if !(end >= start) {
            return Err(XasError::ComputationError(format!(
                "empty energy window around {:.1} eV (supported range {:.0}-{:.0} eV)",
                edge_value, MIN_ENERGY, MAX_ENERGY
            )));
        }

        let n_points = ((end - start) / config.step).floor() as usize + 1;
        let energies = (0..n_points)
            .map(|i| start + i as f64 * config.step)
            .collect();

        Ok(EnergyGrid { energies })
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.energies
    }
}
