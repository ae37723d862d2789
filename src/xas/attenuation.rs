//! # 衰减计算引擎
//!
//! 计算多层样品片在给定能量点上的总光学厚度。
//!
//! ## 算法概述
//! 1. 每个化合物的元素质量分数：wᵢ = nᵢ·Aᵢ / Σ nⱼ·Aⱼ
//! 2. 化合物质量衰减系数：μ(E) = Σ wᵢ · μᵢ(E)
//! 3. 单层光学厚度：τ_layer(E) = μ(E) · ρt（面密度 g/cm²）
//! 4. 叠层总光学厚度：τ(E) = Σ τ_layer(E)（X 射线依次穿过各层）
//! 5. 透过率：T(E) = exp(-τ(E))
//!
//! 每个元素在整个网格上的 μᵢ(E) 只查询一次，在包含该元素的各层之间复用。
//!
//! ## 依赖关系
//! - 被 `xas/edge.rs`, `xas/calculator.rs` 调用
//! - 使用 `xas/provider.rs` 查询截面

use crate::error::{Result, XasError};
use crate::models::{Compound, Layer};
use crate::xas::provider::CrossSectionProvider;

use std::collections::BTreeMap;

/// 衰减计算引擎
pub struct AttenuationEngine<'a, P: ?Sized> {
    provider: &'a P,
}

impl<'a, P: CrossSectionProvider + ?Sized> AttenuationEngine<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// 元素质量分数（和为 1）
    pub fn mass_fractions(&self, compound: &Compound) -> Result<BTreeMap<&'static str, f64>> {
        let mut masses = BTreeMap::new();
        for (&symbol, &count) in compound.elements() {
            let weight = self.provider.atomic_weight(symbol)?;
            masses.insert(symbol, count * weight);
        }

        let total: f64 = masses.values().sum();
        if !(total > 0.0) || !total.is_finite() {
            return Err(XasError::ComputationError(format!(
                "formula weight of '{}' is not positive",
                compound.formula()
            )));
        }

        Ok(masses
            .into_iter()
            .map(|(symbol, mass)| (symbol, mass / total))
            .collect())
    }

    /// 化合物质量衰减系数 (cm²/g)
    pub fn compound_mu(&self, compound: &Compound, energies: &[f64]) -> Result<Vec<f64>> {
        let fractions = self.mass_fractions(compound)?;
        let mut mu = vec![0.0; energies.len()];
        for (symbol, fraction) in fractions {
            let series = self.provider.mass_attenuation_curve(symbol, energies)?;
            for (total, value) in mu.iter_mut().zip(series) {
                *total += fraction * value;
            }
        }
        Ok(mu)
    }

    /// 单层光学厚度
    pub fn layer_optical_depth(&self, layer: &Layer, energies: &[f64]) -> Result<Vec<f64>> {
        let mu = self.compound_mu(&layer.compound, energies)?;
        Ok(mu.into_iter().map(|m| m * layer.area_density).collect())
    }

    /// 叠层总光学厚度
    pub fn stack_optical_depth(&self, layers: &[Layer], energies: &[f64]) -> Result<Vec<f64>> {
        // 每层的 (面密度, 质量分数)
        let mut weighted = Vec::with_capacity(layers.len());
        for (index, layer) in layers.iter().enumerate() {
            let fractions = self
                .mass_fractions(&layer.compound)
                .map_err(|e| attribute(index, layer, e))?;
            weighted.push((layer.area_density, fractions));
        }

        // 每个元素只查询一次
        let mut element_mu: BTreeMap<&'static str, Vec<f64>> = BTreeMap::new();
        for (_, fractions) in &weighted {
            for &symbol in fractions.keys() {
                if element_mu.contains_key(symbol) {
                    continue;
                }
                let series = self.provider.mass_attenuation_curve(symbol, energies)?;
                element_mu.insert(symbol, series);
            }
        }

        let mut tau = vec![0.0; energies.len()];
        for (area_density, fractions) in &weighted {
            for (symbol, fraction) in fractions {
                let series = &element_mu[symbol];
                for (t, mu) in tau.iter_mut().zip(series) {
                    *t += area_density * fraction * mu;
                }
            }
        }

        if let Some(bad) = tau.iter().position(|t| !t.is_finite()) {
            return Err(XasError::ComputationError(format!(
                "non-finite optical depth at {:.1} eV",
                energies[bad]
            )));
        }

        Ok(tau)
    }
}

/// 透过率 T = exp(-τ)
pub fn transmission(optical_depth: &[f64]) -> Vec<f64> {
    optical_depth.iter().map(|t| (-t).exp()).collect()
}

fn attribute(index: usize, layer: &Layer, source: XasError) -> XasError {
    XasError::LayerError {
        index: index + 1,
        formula: layer.compound.formula().to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xas::provider::XrayDbProvider;

    fn provider() -> XrayDbProvider {
        XrayDbProvider::new().unwrap()
    }

    fn layer(formula: &str, density: f64) -> Layer {
        Layer::new(Compound::parse(formula).unwrap(), density).unwrap()
    }

    #[test]
    fn test_mass_fractions_sum_to_one() {
        let provider = provider();
        let engine = AttenuationEngine::new(&provider);
        for formula in ["Fe2O3", "LiNi0.5Mn0.25Co0.25O2", "CuSO4·5H2O", "Al", "BN"] {
            let compound = Compound::parse(formula).unwrap();
            let fractions = engine.mass_fractions(&compound).unwrap();
            let sum: f64 = fractions.values().sum();
            assert!((sum - 1.0).abs() < 1e-6, "{}: sum = {}", formula, sum);
            assert!(fractions.values().all(|f| *f >= 0.0));
        }
    }

    #[test]
    fn test_fe2o3_iron_fraction() {
        let provider = provider();
        let engine = AttenuationEngine::new(&provider);
        let fractions = engine
            .mass_fractions(&Compound::parse("Fe2O3").unwrap())
            .unwrap();
        // 2·55.845 / (2·55.845 + 3·15.999) ≈ 0.6994
        assert!((fractions["Fe"] - 0.6994).abs() < 1e-3);
    }

    #[test]
    fn test_optical_depth_non_negative_and_transmission_bounded() {
        let provider = provider();
        let engine = AttenuationEngine::new(&provider);
        let layers = vec![layer("Fe2O3", 0.005), layer("BN", 0.1)];
        let energies: Vec<f64> = (0..500).map(|i| 6900.0 + 2.0 * i as f64).collect();
        let tau = engine.stack_optical_depth(&layers, &energies).unwrap();
        assert!(tau.iter().all(|t| *t >= 0.0));
        for t in transmission(&tau) {
            assert!(t > 0.0 && t <= 1.0, "T = {}", t);
        }
    }

    #[test]
    fn test_layers_are_additive() {
        let provider = provider();
        let engine = AttenuationEngine::new(&provider);
        let sample = layer("Fe2O3", 0.005);
        let matrix = layer("BN", 0.1);
        let energies = [7000.0, 7200.0, 7500.0];

        let a = engine.layer_optical_depth(&sample, &energies).unwrap();
        let b = engine.layer_optical_depth(&matrix, &energies).unwrap();
        let stack = engine
            .stack_optical_depth(&[sample, matrix], &energies)
            .unwrap();

        for i in 0..energies.len() {
            assert!(
                (stack[i] - (a[i] + b[i])).abs() < 1e-9 * stack[i].max(1.0),
                "{} vs {}",
                stack[i],
                a[i] + b[i]
            );
        }
    }

    #[test]
    fn test_out_of_range_energy_propagates() {
        let provider = provider();
        let engine = AttenuationEngine::new(&provider);
        let result = engine.stack_optical_depth(&[layer("Al", 0.01)], &[50.0]);
        assert!(matches!(result, Err(XasError::EnergyOutOfRange { .. })));
    }

    #[test]
    fn test_transmission_of_zero_depth_is_one() {
        assert_eq!(transmission(&[0.0]), vec![1.0]);
    }
}
