//! # XAS 样品衰减计算器
//!
//! 一次调用完成：校验请求、构建叠层、逐个吸收边计算光学厚度曲线与跳跃。
//!
//! ## 算法概述
//! 1. 请求级校验（无层、面密度非法、无吸收边、网格参数非法）直接失败
//! 2. 每个化学式只解析一次，构建叠层
//! 3. 各吸收边并行计算：定位 E0 → 生成网格 → 叠层光学厚度 → 跳跃 → 组装
//! 4. 单个吸收边的失败只影响该吸收边的结果
//!
//! 任一层化学式解析失败时，所有吸收边都无法在完整叠层上计算，
//! 每个吸收边结果都携带同一条带层号的错误信息，调用本身仍然成功。
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs` 调用
//! - 使用 `xas/edge.rs`, `xas/grid.rs`, `xas/attenuation.rs`, `xas/builder.rs`
//! - 使用 `rayon` 并行计算各吸收边

use crate::error::{Result, XasError};
use crate::models::{
    CalcRequest, CalcResponse, Compound, EdgeRequest, EdgeResult, EdgeSpec, EdgeType, Layer,
    LayerSpec,
};
use crate::xas::attenuation::AttenuationEngine;
use crate::xas::builder::ResultBuilder;
use crate::xas::edge::EdgeLocator;
use crate::xas::elements;
use crate::xas::grid::{EnergyGrid, GridConfig};
use crate::xas::provider::CrossSectionProvider;

use rayon::prelude::*;

/// XAS 计算器
pub struct XasCalculator<P> {
    provider: P,
}

impl<P: CrossSectionProvider> XasCalculator<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// 计算所有吸收边，结果与 `edges` 顺序一一对应
    pub fn calculate(
        &self,
        grid: &GridConfig,
        layers: &[LayerSpec],
        edges: &[EdgeSpec],
    ) -> Result<Vec<EdgeResult>> {
        validate(grid, layers, edges)?;

        let stack = match build_stack(layers) {
            Ok(stack) => stack,
            Err(e) => {
                let message = e.to_string();
                return Ok(edges.iter().map(|spec| failed(spec, &message)).collect());
            }
        };

        let results = edges
            .par_iter()
            .map(|spec| {
                self.evaluate(grid, &stack, spec)
                    .unwrap_or_else(|e| failed(spec, e))
            })
            .collect();

        Ok(results)
    }

    /// 处理完整请求，请求级错误转为 `{ "error": ... }`
    pub fn respond(&self, request: &CalcRequest) -> CalcResponse {
        let outcome = request
            .stack()
            .and_then(|layers| self.calculate(&request.grid, &layers, &request.edges));
        match outcome {
            Ok(results) => CalcResponse::Results { results },
            Err(e) => CalcResponse::Error {
                error: e.to_string(),
            },
        }
    }

    fn evaluate(&self, grid: &GridConfig, stack: &[Layer], spec: &EdgeSpec) -> Result<EdgeResult> {
        let request = EdgeRequest::parse(&spec.element, &spec.edge_type)?;
        let locator = EdgeLocator::new(&self.provider, grid.jump_offset);

        let edge_value = locator.locate(&request)?;
        let energies = EnergyGrid::around(edge_value, grid)?;
        let engine = AttenuationEngine::new(&self.provider);
        let optical_depth = engine.stack_optical_depth(stack, energies.energies())?;
        let edge_jump = locator.edge_jump(stack, edge_value)?;

        let above_edge = [edge_value + grid.jump_offset];
        let layer_absorption = stack
            .iter()
            .map(|layer| {
                engine
                    .layer_optical_depth(layer, &above_edge)
                    .map(|tau| tau[0])
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(ResultBuilder::new(stack).build(
            &request,
            edge_value,
            edge_jump,
            energies,
            optical_depth,
            layer_absorption,
        ))
    }
}

/// 失败结果，能识别的元素符号和吸收边标签按标准写法回显
fn failed(spec: &EdgeSpec, error: impl std::fmt::Display) -> EdgeResult {
    let element = elements::canonical_symbol(&spec.element).unwrap_or(spec.element.as_str());
    let edge_type = spec
        .edge_type
        .parse::<EdgeType>()
        .map(EdgeType::label)
        .unwrap_or(spec.edge_type.as_str());
    EdgeResult::failed(element, edge_type, error)
}

/// 请求级校验
fn validate(grid: &GridConfig, layers: &[LayerSpec], edges: &[EdgeSpec]) -> Result<()> {
    if layers.is_empty() {
        return Err(XasError::ValidationError(
            "at least one layer is required".to_string(),
        ));
    }
    for (index, layer) in layers.iter().enumerate() {
        let density = layer.area_density_g_per_cm2;
        if !density.is_finite() || density <= 0.0 {
            return Err(XasError::ValidationError(format!(
                "layer {} ({}) has non-positive area density {}",
                index + 1,
                layer.formula,
                density
            )));
        }
    }
    if edges.is_empty() {
        return Err(XasError::ValidationError(
            "at least one absorption edge is required".to_string(),
        ));
    }
    grid.validate()
}

/// 解析所有层，错误带上层号与化学式
fn build_stack(layers: &[LayerSpec]) -> Result<Vec<Layer>> {
    layers
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            Compound::parse(&spec.formula)
                .and_then(|compound| Layer::new(compound, spec.area_density_g_per_cm2))
                .map_err(|e| XasError::LayerError {
                    index: index + 1,
                    formula: spec.formula.clone(),
                    source: Box::new(e),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xas::provider::{SerializedProvider, XrayDbProvider};

    fn calculator() -> XasCalculator<XrayDbProvider> {
        XasCalculator::new(XrayDbProvider::new().unwrap())
    }

    fn calculate(layers: &[LayerSpec], edges: &[EdgeSpec]) -> Vec<EdgeResult> {
        calculator()
            .calculate(&GridConfig::default(), layers, edges)
            .unwrap()
    }

    #[test]
    fn test_al_k_scenario() {
        let results = calculate(&[LayerSpec::new("Al", 0.01)], &[EdgeSpec::new("Al", "K")]);
        assert_eq!(results.len(), 1);
        let spectrum = results[0].spectrum().expect("Al K should succeed");
        assert_eq!(spectrum.edge_value, 1559.0);
        assert!((spectrum.edge_jump - 35.86).abs() < 0.2, "jump = {}", spectrum.edge_jump);
        assert!(spectrum.abs_max.is_finite() && spectrum.abs_max > 0.0);
        assert!(spectrum.abs_min <= spectrum.abs_max);
        assert_eq!(spectrum.energies.len(), spectrum.optical_depth.len());
        assert_eq!(spectrum.stack_label, "10.0 mg/cm² Al");
        assert_eq!(spectrum.layer_absorption.len(), 1);
    }

    #[test]
    fn test_fe2o3_in_bn_jump() {
        let results = calculate(
            &[LayerSpec::new("Fe2O3", 0.005), LayerSpec::new("BN", 0.1)],
            &[EdgeSpec::new("Fe", "K")],
        );
        let spectrum = results[0].spectrum().unwrap();
        assert_eq!(spectrum.edge_value, 7112.0);
        // BN 在 ±1 eV 内平滑，跳跃几乎全部来自 Fe2O3
        assert!((spectrum.edge_jump - 1.239).abs() < 0.02, "jump = {}", spectrum.edge_jump);
    }

    #[test]
    fn test_per_edge_isolation() {
        let results = calculate(
            &[LayerSpec::new("Al", 0.01)],
            &[EdgeSpec::new("Al", "K"), EdgeSpec::new("Li", "L3")],
        );
        assert_eq!(results.len(), 2);
        assert!(results[0].spectrum().is_some());
        assert_eq!(results[1].element, "Li");
        assert_eq!(results[1].edge_type, "L3");
        assert!(results[1].error().is_some());
    }

    #[test]
    fn test_failed_results_use_canonical_names() {
        let results = calculate(
            &[LayerSpec::new("Fe2O3", 0.005)],
            &[
                EdgeSpec::new("fe", "k"),
                EdgeSpec::new("li", "l3"),
                EdgeSpec::new("pb", "m5"),
                EdgeSpec::new("xx", "K"),
            ],
        );
        let names: Vec<(&str, &str)> = results
            .iter()
            .map(|r| (r.element.as_str(), r.edge_type.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![("Fe", "K"), ("Li", "L3"), ("Pb", "m5"), ("xx", "K")]
        );
        assert!(results[0].spectrum().is_some());
        assert!(results[1..].iter().all(|r| r.error().is_some()));
    }

    #[test]
    fn test_request_level_validation() {
        let calc = calculator();
        let grid = GridConfig::default();
        let edges = [EdgeSpec::new("Al", "K")];
        let layers = [LayerSpec::new("Al", 0.01)];

        assert!(matches!(
            calc.calculate(&grid, &[], &edges),
            Err(XasError::ValidationError(_))
        ));
        assert!(matches!(
            calc.calculate(&grid, &layers, &[]),
            Err(XasError::ValidationError(_))
        ));
        assert!(matches!(
            calc.calculate(&grid, &[LayerSpec::new("Al", 0.0)], &edges),
            Err(XasError::ValidationError(_))
        ));
        assert!(matches!(
            calc.calculate(&grid, &[LayerSpec::new("Al", f64::NAN)], &edges),
            Err(XasError::ValidationError(_))
        ));

        let bad_grid = GridConfig {
            step: 0.0,
            ..GridConfig::default()
        };
        assert!(matches!(
            calc.calculate(&bad_grid, &layers, &edges),
            Err(XasError::ValidationError(_))
        ));
    }

    #[test]
    fn test_oversized_grid_rejected_before_allocation() {
        let tiny_step = GridConfig {
            step: 1e-7,
            ..GridConfig::default()
        };
        let result = calculator().calculate(
            &tiny_step,
            &[LayerSpec::new("Al", 0.01)],
            &[EdgeSpec::new("Al", "K")],
        );
        assert!(matches!(result, Err(XasError::ValidationError(_))));
    }

    #[test]
    fn test_results_follow_request_order() {
        let edges = [
            EdgeSpec::new("Fe", "K"),
            EdgeSpec::new("O", "K"),
            EdgeSpec::new("Ba", "L3"),
            EdgeSpec::new("Cu", "K"),
        ];
        let results = calculate(
            &[LayerSpec::new("Fe2O3", 0.005), LayerSpec::new("BN", 0.1)],
            &edges,
        );
        let order: Vec<(&str, &str)> = results
            .iter()
            .map(|r| (r.element.as_str(), r.edge_type.as_str()))
            .collect();
        assert_eq!(order, vec![("Fe", "K"), ("O", "K"), ("Ba", "L3"), ("Cu", "K")]);
    }

    #[test]
    fn test_deterministic_output() {
        let layers = [LayerSpec::new("Fe2O3", 0.005), LayerSpec::new("BN", 0.1)];
        let edges = [EdgeSpec::new("Fe", "K"), EdgeSpec::new("Fe", "L3")];
        assert_eq!(calculate(&layers, &edges), calculate(&layers, &edges));
    }

    #[test]
    fn test_layer_parse_failure_fails_every_edge() {
        let results = calculate(
            &[LayerSpec::new("Fe2O3", 0.005), LayerSpec::new("Xx2", 0.1)],
            &[EdgeSpec::new("Fe", "K"), EdgeSpec::new("O", "K")],
        );
        assert_eq!(results.len(), 2);
        for result in &results {
            let error = result.error().expect("every edge should fail");
            assert!(error.starts_with("Layer 2 (Xx2)"), "error = {}", error);
            assert!(error.contains("unknown element 'Xx'"), "error = {}", error);
        }
    }

    #[test]
    fn test_unsupported_edge_label_is_per_edge() {
        let results = calculate(
            &[LayerSpec::new("PbO", 0.01)],
            &[EdgeSpec::new("Pb", "M5"), EdgeSpec::new("Pb", "L3")],
        );
        assert!(results[0].error().unwrap().contains("M5"));
        assert!(results[1].spectrum().is_some());
    }

    #[test]
    fn test_layer_absorption_sums_to_stack() {
        let results = calculate(
            &[LayerSpec::new("Fe2O3", 0.005), LayerSpec::new("BN", 0.1)],
            &[EdgeSpec::new("Fe", "K")],
        );
        let spectrum = results[0].spectrum().unwrap();
        assert_eq!(spectrum.layer_absorption.len(), 2);
        // 吸收边上方 Fe2O3 层贡献大于 BN 基体
        assert!(spectrum.layer_absorption[0] > spectrum.layer_absorption[1]);

        let index = spectrum
            .energies
            .iter()
            .position(|&e| e == spectrum.edge_value + 1.0)
            .unwrap();
        let total: f64 = spectrum.layer_absorption.iter().sum();
        assert!((total - spectrum.optical_depth[index]).abs() < 1e-9);
    }

    #[test]
    fn test_absent_element_has_small_jump() {
        let results = calculate(&[LayerSpec::new("Al2O3", 0.01)], &[EdgeSpec::new("Cu", "K")]);
        let spectrum = results[0].spectrum().unwrap();
        assert!(spectrum.edge_jump.abs() < 0.01);
    }

    #[test]
    fn test_serialized_provider_matches_direct() {
        let layers = [LayerSpec::new("CuO", 0.01), LayerSpec::new("C6H10O5", 0.05)];
        let edges = [EdgeSpec::new("Cu", "K"), EdgeSpec::new("Cu", "L3")];
        let direct = calculate(&layers, &edges);
        let gated = XasCalculator::new(SerializedProvider::new(XrayDbProvider::new().unwrap()))
            .calculate(&GridConfig::default(), &layers, &edges)
            .unwrap();
        assert_eq!(direct, gated);
    }

    #[test]
    fn test_respond_envelopes() {
        let calc = calculator();
        let request: CalcRequest = serde_json::from_str(
            r#"{ "layers": [{ "formula": "Al", "area_density_g_per_cm2": 0.01 }],
                 "edges": [{ "element": "Al", "edge_type": "K" }],
                 "grid": { "step": 5 } }"#,
        )
        .unwrap();
        match calc.respond(&request) {
            CalcResponse::Results { results } => {
                assert_eq!(results[0].spectrum().unwrap().energies.len(), 201);
            }
            CalcResponse::Error { error } => panic!("unexpected error: {}", error),
        }

        let empty = CalcRequest::new(vec![], vec![EdgeSpec::new("Al", "K")]);
        assert!(matches!(calc.respond(&empty), CalcResponse::Error { .. }));
    }

    #[test]
    fn test_respond_expands_pellet() {
        let calc = calculator();
        let pellet: CalcRequest = serde_json::from_str(
            r#"{ "sample": { "formula": "Fe2O3", "total_density_g_per_cm2": 0.1, "ratio": 0.05 },
                 "matrices": [{ "formula": "BN" }],
                 "edges": [{ "element": "Fe", "edge_type": "K" }] }"#,
        )
        .unwrap();
        let explicit = CalcRequest::new(
            vec![LayerSpec::new("Fe2O3", 0.005), LayerSpec::new("BN", 0.095)],
            vec![EdgeSpec::new("Fe", "K")],
        );
        assert_eq!(calc.respond(&pellet), calc.respond(&explicit));

        let overfull: CalcRequest = serde_json::from_str(
            r#"{ "sample": { "formula": "Fe2O3", "total_density_g_per_cm2": 0.1, "ratio": 0.8 },
                 "matrices": [{ "formula": "BN", "ratio": 0.5 }],
                 "edges": [{ "element": "Fe", "edge_type": "K" }] }"#,
        )
        .unwrap();
        match calc.respond(&overfull) {
            CalcResponse::Error { error } => assert!(error.contains("ratios"), "{}", error),
            other => panic!("expected error, got {:?}", other),
        }
    }
}
