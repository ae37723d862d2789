//! # 稀释扫描
//!
//! 在「活性物质比例 × 样品片总面密度」网格上计算吸收边跳跃和最大吸收，
//! 标出两者同时落在可接受窗口内的配方，用于选择压片的稀释比例和用量。
//!
//! ## 算法概述
//! 光学厚度对面密度是线性的：
//!
//! τ(E) = ρ·[r·μ_s(E) + (1 - r)·μ_m(E)] + τ_fixed(E)
//!
//! - ρ：样品片总面密度（纵轴，mg/cm²）
//! - r：活性物质比例（横轴，%）
//! - μ_s：样品化合物的质量衰减系数
//! - μ_m：各基体按权重混合的质量衰减系数；基体的 `ratio` 在这里是相对权重，缺省为 1
//! - τ_fixed：`components` 和 `layers` 按各自绝对面密度贡献的光学厚度
//!
//! 每个化合物只在能量网格（外加 E0 ± ε 两点）上计算一次 μ(E)，
//! 各网格单元只做线性组合。
//!
//! 单元可接受：跳跃和最大吸收都满足 下限 ≤ 值 ≤ 上限。
//!
//! ## 依赖关系
//! - 被 `commands/scan.rs` 调用
//! - 使用 `xas/attenuation.rs` 计算化合物 μ(E)
//! - 使用 `xas/grid.rs` 生成能量网格
//! - 使用 `rayon` 并行计算各面密度行

use crate::error::{Result, XasError};
use crate::models::{CalcRequest, Compound, EdgeRequest, MatrixSpec};
use crate::xas::attenuation::AttenuationEngine;
use crate::xas::builder::{ABSORBANCE_MAX, EDGE_JUMP_MAX, EDGE_JUMP_MIN};
use crate::xas::grid::EnergyGrid;
use crate::xas::provider::CrossSectionProvider;

use rayon::prelude::*;
use serde::Serialize;

/// 单个坐标轴的最大点数
pub const MAX_AXIS_POINTS: usize = 2000;

/// 理想的吸收边跳跃
const IDEAL_EDGE_JUMP: f64 = 1.0;

/// 等间距坐标轴（含两端）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl AxisRange {
    pub fn new(start: f64, stop: f64, step: f64) -> Self {
        AxisRange { start, stop, step }
    }

    /// 坐标点；`name` 用于错误信息
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        let finite = self.start.is_finite() && self.stop.is_finite() && self.step.is_finite();
        if !finite || self.step <= 0.0 || self.stop < self.start {
            return Err(XasError::ValidationError(format!(
                "{} axis {}..{} with step {} is not a valid range",
                name, self.start, self.stop, self.step
            )));
        }

        // 容许 stop 处的舍入误差
        let count = ((self.stop - self.start) / self.step + 1e-9).floor() + 1.0;
        if count > MAX_AXIS_POINTS as f64 {
            return Err(XasError::ValidationError(format!(
                "{} axis has {:.0} points, the limit is {}",
                name, count, MAX_AXIS_POINTS
            )));
        }

        Ok((0..count as usize)
            .map(|i| self.start + i as f64 * self.step)
            .collect())
    }
}

/// 闭区间 [min, max]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Window {
    pub min: f64,
    pub max: f64,
}

impl Window {
    pub fn new(min: f64, max: f64) -> Self {
        Window { min, max }
    }

    /// NaN 不在任何窗口内
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min.is_nan() || self.max.is_nan() || self.min > self.max {
            return Err(XasError::ValidationError(format!(
                "{} window [{}, {}] is empty",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// 扫描设置
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// 活性物质比例 (%)
    pub active_pct: AxisRange,
    /// 样品片总面密度 (mg/cm²)
    pub density_mg: AxisRange,
    pub edge_jump: Window,
    pub abs_max: Window,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            active_pct: AxisRange::new(1.0, 100.0, 1.0),
            density_mg: AxisRange::new(1.0, 200.0, 1.0),
            edge_jump: Window::new(EDGE_JUMP_MIN, EDGE_JUMP_MAX),
            abs_max: Window::new(0.0, ABSORBANCE_MAX),
        }
    }
}

impl ScanConfig {
    /// 校验并返回 (比例轴, 面密度轴)
    fn axes(&self) -> Result<(Vec<f64>, Vec<f64>)> {
        let active = self.active_pct.values("active material")?;
        let density = self.density_mg.values("area density")?;

        if active.iter().any(|&p| p <= 0.0 || p > 100.0) {
            return Err(XasError::ValidationError(format!(
                "active material must stay within (0, 100] %, got {}..{}",
                self.active_pct.start, self.active_pct.stop
            )));
        }
        if density.iter().any(|&d| d <= 0.0) {
            return Err(XasError::ValidationError(format!(
                "area density must be > 0 mg/cm², got {}..{}",
                self.density_mg.start, self.density_mg.stop
            )));
        }

        self.edge_jump.validate("edge jump")?;
        self.abs_max.validate("absorption")?;
        Ok((active, density))
    }
}

/// 扫描图中要着色的量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanQuantity {
    EdgeJump,
    AbsMax,
}

impl ScanQuantity {
    pub fn label(self) -> &'static str {
        match self {
            ScanQuantity::EdgeJump => "Edge jump",
            ScanQuantity::AbsMax => "Abs max",
        }
    }
}

/// 单个网格单元
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScanCell {
    pub active_pct: f64,
    pub density_mg_per_cm2: f64,
    pub edge_jump: f64,
    pub abs_max: f64,
    pub acceptable: bool,
}

/// 扫描结果，二维数组按 [面密度][比例] 排列
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanMap {
    pub element: String,
    pub edge_type: String,
    pub edge_value: f64,
    /// 样品与基体描述，如 "Fe2O3 in BN"
    pub sample: String,
    pub active_pct: Vec<f64>,
    pub density_mg_per_cm2: Vec<f64>,
    pub edge_jump: Vec<Vec<f64>>,
    pub abs_max: Vec<Vec<f64>>,
    pub acceptable: Vec<Vec<bool>>,
    pub edge_jump_window: Window,
    pub abs_max_window: Window,
}

impl ScanMap {
    pub fn values(&self, quantity: ScanQuantity) -> &[Vec<f64>] {
        match quantity {
            ScanQuantity::EdgeJump => &self.edge_jump,
            ScanQuantity::AbsMax => &self.abs_max,
        }
    }

    /// 按行（面密度）遍历全部单元
    pub fn cells(&self) -> impl Iterator<Item = ScanCell> + '_ {
        self.density_mg_per_cm2
            .iter()
            .enumerate()
            .flat_map(move |(row, &density)| {
                self.active_pct
                    .iter()
                    .enumerate()
                    .map(move |(col, &pct)| ScanCell {
                        active_pct: pct,
                        density_mg_per_cm2: density,
                        edge_jump: self.edge_jump[row][col],
                        abs_max: self.abs_max[row][col],
                        acceptable: self.acceptable[row][col],
                    })
            })
    }

    pub fn cell_count(&self) -> usize {
        self.active_pct.len() * self.density_mg_per_cm2.len()
    }

    pub fn accepted_count(&self) -> usize {
        self.acceptable.iter().flatten().filter(|&&ok| ok).count()
    }

    /// 可接受单元中跳跃最接近理想值的前 `limit` 个
    pub fn candidates(&self, limit: usize) -> Vec<ScanCell> {
        let mut accepted: Vec<ScanCell> = self.cells().filter(|c| c.acceptable).collect();
        accepted.sort_by(|a, b| {
            let da = (a.edge_jump - IDEAL_EDGE_JUMP).abs();
            let db = (b.edge_jump - IDEAL_EDGE_JUMP).abs();
            da.total_cmp(&db)
                .then(a.density_mg_per_cm2.total_cmp(&b.density_mg_per_cm2))
        });
        accepted.truncate(limit);
        accepted
    }
}

/// 稀释扫描器
pub struct DilutionScan<'a, P: ?Sized> {
    provider: &'a P,
}

impl<'a, P: CrossSectionProvider + ?Sized> DilutionScan<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// 对请求中的样品/基体/附加组分扫描；`sample` 的总面密度和比例由坐标轴取代
    pub fn run(&self, request: &CalcRequest, config: &ScanConfig) -> Result<ScanMap> {
        let sample = request.sample.as_ref().ok_or_else(|| {
            XasError::ValidationError("a scan needs a sample to dilute".to_string())
        })?;
        if request.matrices.is_empty() {
            return Err(XasError::ValidationError(
                "a scan needs at least one matrix to dilute the sample in".to_string(),
            ));
        }
        let edge = match request.edges.as_slice() {
            [edge] => edge,
            edges => {
                return Err(XasError::ValidationError(format!(
                    "a scan takes exactly one edge, got {}",
                    edges.len()
                )))
            }
        };
        let fixed: Vec<_> = request.components.iter().chain(&request.layers).collect();
        if let Some(bad) = fixed
            .iter()
            .find(|l| !l.area_density_g_per_cm2.is_finite() || l.area_density_g_per_cm2 <= 0.0)
        {
            return Err(XasError::ValidationError(format!(
                "{} has non-positive area density {}",
                bad.formula, bad.area_density_g_per_cm2
            )));
        }
        request.grid.validate()?;
        let (active_pct, densities) = config.axes()?;
        let weights = matrix_weights(&request.matrices)?;

        let edge_request = EdgeRequest::parse(&edge.element, &edge.edge_type)?;
        let edge_value = self
            .provider
            .edge_energy(edge_request.element, edge_request.edge_type)?;

        // 网格点之后追加 E0 - ε, E0 + ε
        let mut energies = EnergyGrid::around(edge_value, &request.grid)?.into_inner();
        let n_grid = energies.len();
        energies.push(edge_value - request.grid.jump_offset);
        energies.push(edge_value + request.grid.jump_offset);

        let engine = AttenuationEngine::new(self.provider);
        let mu = |formula: &str| -> Result<Vec<f64>> {
            let compound = Compound::parse(formula)?;
            engine.compound_mu(&compound, &energies)
        };

        let mu_sample = mu(&sample.formula)?;

        let mut mu_matrix = vec![0.0; energies.len()];
        for (matrix, weight) in request.matrices.iter().zip(&weights) {
            for (total, value) in mu_matrix.iter_mut().zip(mu(&matrix.formula)?) {
                *total += weight * value;
            }
        }

        let mut tau_fixed = vec![0.0; energies.len()];
        for layer in &fixed {
            for (total, value) in tau_fixed.iter_mut().zip(mu(&layer.formula)?) {
                *total += layer.area_density_g_per_cm2 * value;
            }
        }

        let rows: Vec<Vec<(f64, f64)>> = densities
            .par_iter()
            .map(|&density_mg| {
                let rho = density_mg / 1000.0;
                active_pct
                    .iter()
                    .map(|&pct| {
                        let r = pct / 100.0;
                        let tau = |i: usize| {
                            rho * (r * mu_sample[i] + (1.0 - r) * mu_matrix[i]) + tau_fixed[i]
                        };
                        let abs_max = (0..n_grid).map(tau).fold(f64::NEG_INFINITY, f64::max);
                        let edge_jump = tau(n_grid + 1) - tau(n_grid);
                        (edge_jump, abs_max)
                    })
                    .collect()
            })
            .collect();

        if rows.iter().flatten().any(|(j, a)| !j.is_finite() || !a.is_finite()) {
            return Err(XasError::ComputationError(format!(
                "non-finite optical depth in the {} scan",
                edge_request
            )));
        }

        let edge_jump: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| row.iter().map(|&(j, _)| j).collect())
            .collect();
        let abs_max: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| row.iter().map(|&(_, a)| a).collect())
            .collect();
        let acceptable = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&(j, a)| config.edge_jump.contains(j) && config.abs_max.contains(a))
                    .collect()
            })
            .collect();

        Ok(ScanMap {
            element: edge_request.element.to_string(),
            edge_type: edge_request.edge_type.to_string(),
            edge_value,
            sample: format!(
                "{} in {}",
                sample.formula,
                request
                    .matrices
                    .iter()
                    .map(|m| m.formula.as_str())
                    .collect::<Vec<_>>()
                    .join(" + ")
            ),
            active_pct,
            density_mg_per_cm2: densities,
            edge_jump,
            abs_max,
            acceptable,
            edge_jump_window: config.edge_jump,
            abs_max_window: config.abs_max,
        })
    }
}

/// 基体的归一化权重；`ratio` 作为相对权重，缺省为 1
pub fn matrix_weights(matrices: &[MatrixSpec]) -> Result<Vec<f64>> {
    let raw: Vec<f64> = matrices.iter().map(|m| m.ratio.unwrap_or(1.0)).collect();
    if let Some((m, w)) = matrices
        .iter()
        .zip(&raw)
        .find(|(_, &w)| !w.is_finite() || w <= 0.0)
    {
        return Err(XasError::ValidationError(format!(
            "matrix {} has invalid weight {}",
            m.formula, w
        )));
    }
    let total: f64 = raw.iter().sum();
    Ok(raw.into_iter().map(|w| w / total).collect())
}
