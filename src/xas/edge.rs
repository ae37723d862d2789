//! # 吸收边定位与跳跃计算
//!
//! - `locate`: 查询吸收边能量 E0，作为能量网格中心
//! - `edge_jump`: Δτ = τ(E0 + ε) - τ(E0 - ε)，在整个叠层上计算
//!
//! 截面数据在吸收边处呈阶跃，ε 取一个小的固定偏移跨过该阶跃。
//! 不含目标吸收边的元素在 ±ε 内平滑变化，相减后基本抵消。
//! 目标元素不在样品中时 Δτ 接近 0，这是正常结果而不是错误。
//!
//! ## 依赖关系
//! - 被 `xas/calculator.rs` 调用
//! - 使用 `xas/attenuation.rs` 计算光学厚度

use crate::error::Result;
use crate::models::{EdgeRequest, Layer};
use crate::xas::attenuation::AttenuationEngine;
use crate::xas::provider::CrossSectionProvider;

/// 吸收边定位器
pub struct EdgeLocator<'a, P: ?Sized> {
    provider: &'a P,
    /// 跨越阶跃的能量偏移 ε (eV)
    offset: f64,
}

impl<'a, P: CrossSectionProvider + ?Sized> EdgeLocator<'a, P> {
    pub fn new(provider: &'a P, offset: f64) -> Self {
        Self { provider, offset }
    }

    /// 吸收边能量 (eV)
    pub fn locate(&self, request: &EdgeRequest) -> Result<f64> {
        self.provider
            .edge_energy(request.element, request.edge_type)
    }

    /// 吸收边跳跃（光学厚度单位）
    pub fn edge_jump(&self, layers: &[Layer], edge_value: f64) -> Result<f64> {
        let engine = AttenuationEngine::new(self.provider);
        let tau = engine.stack_optical_depth(
            layers,
            &[edge_value - self.offset, edge_value + self.offset],
        )?;
        Ok(tau[1] - tau[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::XasError;
    use crate::models::{Compound, EdgeType};
    use crate::xas::provider::XrayDbProvider;

    fn layer(formula: &str, density: f64) -> Layer {
        Layer::new(Compound::parse(formula).unwrap(), density).unwrap()
    }

    fn provider() -> XrayDbProvider {
        XrayDbProvider::new().unwrap()
    }

    fn request(element: &str, edge: &str) -> EdgeRequest {
        EdgeRequest::parse(element, edge).unwrap()
    }

    #[test]
    fn test_locate_al_k() {
        let provider = provider();
        let locator = EdgeLocator::new(&provider, 1.0);
        let e0 = locator.locate(&request("Al", "K")).unwrap();
        assert_eq!(e0, 1559.0);
    }

    #[test]
    fn test_locate_missing_edge() {
        let provider = provider();
        let locator = EdgeLocator::new(&provider, 1.0);
        let req = EdgeRequest {
            element: "Li",
            edge_type: EdgeType::L3,
        };
        assert!(matches!(
            locator.locate(&req),
            Err(XasError::UnknownEdge { .. })
        ));
    }

    #[test]
    fn test_jump_positive_for_present_element() {
        let provider = provider();
        let locator = EdgeLocator::new(&provider, 1.0);
        let layers = vec![layer("Fe2O3", 0.005), layer("BN", 0.1)];
        let e0 = locator.locate(&request("Fe", "K")).unwrap();
        let jump = locator.edge_jump(&layers, e0).unwrap();
        assert!(jump > 0.01, "jump = {}", jump);
    }

    #[test]
    fn test_tabulated_jumps() {
        let provider = provider();
        let locator = EdgeLocator::new(&provider, 1.0);

        let e0 = locator.locate(&request("Fe", "K")).unwrap();
        let jump = locator.edge_jump(&[layer("Fe2O3", 0.005)], e0).unwrap();
        assert!((jump - 1.239).abs() < 0.01, "Fe2O3 Fe K jump = {}", jump);

        let e0 = locator.locate(&request("Al", "K")).unwrap();
        let jump = locator.edge_jump(&[layer("Al", 0.01)], e0).unwrap();
        assert!((jump - 35.86).abs() < 0.2, "Al K jump = {}", jump);
    }

    #[test]
    fn test_jump_near_zero_for_absent_element() {
        let provider = provider();
        let locator = EdgeLocator::new(&provider, 1.0);
        let layers = vec![layer("Al2O3", 0.01), layer("BN", 0.05)];
        let e0 = locator.locate(&request("Cu", "K")).unwrap();
        let jump = locator.edge_jump(&layers, e0).unwrap();
        assert!(jump.abs() < 0.01, "jump = {}", jump);
    }

    #[test]
    fn test_jump_below_supported_range_fails() {
        // Al L3 (72.5 eV) 低于数据源下限
        let provider = provider();
        let locator = EdgeLocator::new(&provider, 1.0);
        let e0 = locator.locate(&request("Al", "L3")).unwrap();
        let result = locator.edge_jump(&[layer("Al", 0.001)], e0);
        assert!(matches!(result, Err(XasError::EnergyOutOfRange { .. })));
    }
}
