//! # 计算请求数据模型
//!
//! 计算边界上的请求格式（JSON）：
//! ```json
//! {
//!   "layers": [
//!     { "formula": "Fe2O3", "area_density_g_per_cm2": 0.005 },
//!     { "formula": "BN", "area_density_g_per_cm2": 0.1 }
//!   ],
//!   "edges": [{ "element": "Fe", "edge_type": "K" }],
//!   "grid": { "pre_edge": 200, "post_edge": 800, "step": 1 }
//! }
//! ```
//! `grid` 可省略；兼容旧版规划工具的 `compounds` / `compound` / `area_density` 字段名。
//! 面密度单位为 g/cm²，其他单位的换算由调用方负责。
//!
//! ## 压片形式
//! 稀释在基体中的样品片也可以按配比描述：
//! ```json
//! {
//!   "sample": { "formula": "Fe2O3", "total_density_g_per_cm2": 0.1, "ratio": 0.05 },
//!   "matrices": [{ "formula": "BN" }],
//!   "components": [{ "formula": "C8H8", "area_density_g_per_cm2": 0.01 }],
//!   "edges": [{ "element": "Fe", "edge_type": "K" }]
//! }
//! ```
//! - 样品层面密度 = 总面密度 × `ratio`
//! - 显式给出 `ratio` 的基体按该比例分配；其余基体均分剩余比例 `1 - ratio - Σ显式`
//! - `components`（胶带、窗口等）保持各自的绝对面密度
//!
//! 展开后的叠层顺序：样品、基体、附加组分，最后是 `layers` 中的层。
//!
//! ## 依赖关系
//! - 被 `parsers/request.rs` 反序列化
//! - 被 `xas/calculator.rs`, `xas/scan.rs` 消费

use crate::error::{Result, XasError};
use crate::xas::grid::GridConfig;

use serde::{Deserialize, Serialize};

/// 比例之和允许的舍入误差
const RATIO_TOLERANCE: f64 = 1e-9;

/// 单层描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    #[serde(alias = "compound")]
    pub formula: String,
    #[serde(alias = "area_density")]
    pub area_density_g_per_cm2: f64,
}

impl LayerSpec {
    pub fn new(formula: impl Into<String>, area_density_g_per_cm2: f64) -> Self {
        LayerSpec {
            formula: formula.into(),
            area_density_g_per_cm2,
        }
    }
}

/// 吸收边描述（原始字符串，逐个吸收边校验）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub element: String,
    #[serde(alias = "edge")]
    pub edge_type: String,
}

impl EdgeSpec {
    pub fn new(element: impl Into<String>, edge_type: impl Into<String>) -> Self {
        EdgeSpec {
            element: element.into(),
            edge_type: edge_type.into(),
        }
    }
}

/// 压片中的活性物质
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleSpec {
    #[serde(alias = "compound")]
    pub formula: String,
    /// 样品片（活性物质 + 基体）总面密度 (g/cm²)
    #[serde(alias = "total_density", alias = "area_density")]
    pub total_density_g_per_cm2: f64,
    /// 活性物质所占比例 (0, 1]
    #[serde(default = "default_ratio")]
    pub ratio: f64,
}

fn default_ratio() -> f64 {
    1.0
}

impl SampleSpec {
    pub fn new(formula: impl Into<String>, total_density_g_per_cm2: f64, ratio: f64) -> Self {
        SampleSpec {
            formula: formula.into(),
            total_density_g_per_cm2,
            ratio,
        }
    }
}

/// 稀释基体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSpec {
    #[serde(alias = "compound")]
    pub formula: String,
    /// 显式比例，省略时均分剩余比例
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
}

impl MatrixSpec {
    pub fn new(formula: impl Into<String>, ratio: Option<f64>) -> Self {
        MatrixSpec {
            formula: formula.into(),
            ratio,
        }
    }
}

/// 完整计算请求
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalcRequest {
    #[serde(alias = "compounds", default)]
    pub layers: Vec<LayerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matrices: Vec<MatrixSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<LayerSpec>,
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub grid: GridConfig,
}

impl CalcRequest {
    /// 由显式层构造
    pub fn new(layers: Vec<LayerSpec>, edges: Vec<EdgeSpec>) -> Self {
        CalcRequest {
            layers,
            edges,
            ..CalcRequest::default()
        }
    }

    /// 展开为叠层（请求级校验）
    pub fn stack(&self) -> Result<Vec<LayerSpec>> {
        let mut stack = Vec::new();

        match &self.sample {
            Some(sample) => {
                let total = sample.total_density_g_per_cm2;
                if !total.is_finite() || total <= 0.0 {
                    return Err(XasError::ValidationError(format!(
                        "sample {} has non-positive total area density {}",
                        sample.formula, total
                    )));
                }
                let shares = matrix_shares(sample.ratio, &self.matrices)?;
                stack.push(LayerSpec::new(sample.formula.clone(), total * sample.ratio));
                stack.extend(
                    self.matrices
                        .iter()
                        .zip(shares)
                        .map(|(m, share)| LayerSpec::new(m.formula.clone(), total * share)),
                );
            }
            None if !self.matrices.is_empty() => {
                return Err(XasError::ValidationError(
                    "matrices need a sample to dilute".to_string(),
                ));
            }
            None => {}
        }

        stack.extend(self.components.iter().cloned());
        stack.extend(self.layers.iter().cloned());
        Ok(stack)
    }
}

/// 各基体所占比例
///
/// 显式比例原样使用；未给出比例的基体均分 `1 - ratio - Σ显式`。
pub fn matrix_shares(ratio: f64, matrices: &[MatrixSpec]) -> Result<Vec<f64>> {
    if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
        return Err(XasError::ValidationError(format!(
            "sample ratio must be in (0, 1], got {}",
            ratio
        )));
    }

    let mut explicit = 0.0;
    for matrix in matrices {
        if let Some(r) = matrix.ratio {
            if !r.is_finite() || r < 0.0 {
                return Err(XasError::ValidationError(format!(
                    "matrix {} has invalid ratio {}",
                    matrix.formula, r
                )));
            }
            explicit += r;
        }
    }
    if ratio + explicit > 1.0 + RATIO_TOLERANCE {
        return Err(XasError::ValidationError(format!(
            "sample and matrix ratios add up to {} (> 1)",
            ratio + explicit
        )));
    }

    let implicit = matrices.iter().filter(|m| m.ratio.is_none()).count();
    let remainder = (1.0 - ratio - explicit).max(0.0);
    let even = if implicit > 0 {
        remainder / implicit as f64
    } else {
        0.0
    };

    matrices
        .iter()
        .map(|m| {
            let share = m.ratio.unwrap_or(even);
            if share > RATIO_TOLERANCE {
                Ok(share)
            } else {
                Err(XasError::ValidationError(format!(
                    "matrix {} gets no share of the pellet (sample ratio {})",
                    m.formula, ratio
                )))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_default_grid() {
        let json = r#"{
            "layers": [{ "formula": "Al", "area_density_g_per_cm2": 0.01 }],
            "edges": [{ "element": "Al", "edge_type": "K" }]
        }"#;
        let req: CalcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.layers, vec![LayerSpec::new("Al", 0.01)]);
        assert_eq!(req.edges, vec![EdgeSpec::new("Al", "K")]);
        assert_eq!(req.grid, GridConfig::default());
        assert!(req.sample.is_none());
    }

    #[test]
    fn test_deserialize_partial_grid() {
        let json = r#"{
            "layers": [{ "formula": "Al", "area_density_g_per_cm2": 0.01 }],
            "edges": [],
            "grid": { "step": 2.5 }
        }"#;
        let req: CalcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.grid.step, 2.5);
        assert_eq!(req.grid.pre_edge, 200.0);
        assert_eq!(req.grid.post_edge, 800.0);
    }

    #[test]
    fn test_deserialize_legacy_field_names() {
        let json = r#"{
            "compounds": [{ "compound": "Fe2O3", "area_density": 0.005 }],
            "edges": [{ "element": "Fe", "edge": "K" }]
        }"#;
        let req: CalcRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.layers[0].formula, "Fe2O3");
        assert_eq!(req.layers[0].area_density_g_per_cm2, 0.005);
        assert_eq!(req.edges[0].edge_type, "K");
    }

    #[test]
    fn test_pellet_stack_expansion() {
        let json = r#"{
            "sample": { "formula": "Fe2O3", "total_density_g_per_cm2": 0.1, "ratio": 0.2 },
            "matrices": [{ "formula": "BN" }, { "formula": "C6H10O5" }],
            "components": [{ "formula": "C8H8", "area_density_g_per_cm2": 0.01 }],
            "edges": [{ "element": "Fe", "edge_type": "K" }]
        }"#;
        let req: CalcRequest = serde_json::from_str(json).unwrap();
        let stack = req.stack().unwrap();

        let formulas: Vec<&str> = stack.iter().map(|l| l.formula.as_str()).collect();
        assert_eq!(formulas, vec!["Fe2O3", "BN", "C6H10O5", "C8H8"]);
        let densities: Vec<f64> = stack.iter().map(|l| l.area_density_g_per_cm2).collect();
        assert!((densities[0] - 0.02).abs() < 1e-12);
        assert!((densities[1] - 0.04).abs() < 1e-12);
        assert!((densities[2] - 0.04).abs() < 1e-12);
        assert_eq!(densities[3], 0.01);
    }

    #[test]
    fn test_matrix_shares() {
        // 未指定比例的基体均分剩余部分
        let even = matrix_shares(0.25, &[MatrixSpec::new("BN", None), MatrixSpec::new("C", None)])
            .unwrap();
        assert_eq!(even, vec![0.375, 0.375]);

        let mixed = matrix_shares(
            0.2,
            &[MatrixSpec::new("BN", Some(0.5)), MatrixSpec::new("C", None)],
        )
        .unwrap();
        assert!((mixed[0] - 0.5).abs() < 1e-12);
        assert!((mixed[1] - 0.3).abs() < 1e-12);

        assert!(matrix_shares(1.0, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_pellets_rejected() {
        let matrix = || vec![MatrixSpec::new("BN", None)];
        assert!(matches!(
            matrix_shares(0.0, &matrix()),
            Err(XasError::ValidationError(_))
        ));
        assert!(matrix_shares(1.5, &matrix()).is_err());
        // 样品占满整片时基体无份额
        assert!(matrix_shares(1.0, &matrix()).is_err());
        assert!(matrix_shares(0.6, &[MatrixSpec::new("BN", Some(0.6))]).is_err());

        let orphan = CalcRequest {
            matrices: matrix(),
            edges: vec![EdgeSpec::new("Fe", "K")],
            ..CalcRequest::default()
        };
        assert!(matches!(orphan.stack(), Err(XasError::ValidationError(_))));

        let empty_pellet = CalcRequest {
            sample: Some(SampleSpec::new("Fe2O3", 0.0, 0.5)),
            matrices: matrix(),
            ..CalcRequest::default()
        };
        assert!(empty_pellet.stack().is_err());
    }
}
