//! # 化合物与样品层数据模型
//!
//! 样品片由若干层组成：稀释在基体中的样品，以及可选的额外组分层。
//! X 射线依次穿过每一层，因此各层光学厚度直接相加。
//!
//! ## 依赖关系
//! - 被 `xas/` 各模块使用
//! - 使用 `parsers/formula.rs` 解析化学式

use crate::error::{Result, XasError};
use crate::parsers::formula;

use std::collections::BTreeMap;

/// 已解析的化合物
#[derive(Debug, Clone, PartialEq)]
pub struct Compound {
    formula: String,
    /// 元素 -> 化学计量数（按符号排序，保证求和顺序固定）
    elements: BTreeMap<&'static str, f64>,
}

impl Compound {
    /// 解析化学式
    pub fn parse(formula_str: &str) -> Result<Self> {
        let elements = formula::parse(formula_str)?;
        Ok(Compound {
            formula: formula_str.trim().to_string(),
            elements,
        })
    }

    pub fn formula(&self) -> &str {
        &self.formula
    }

    pub fn elements(&self) -> &BTreeMap<&'static str, f64> {
        &self.elements
    }
}

/// 样品片中的一层
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub compound: Compound,
    /// 面密度 (g/cm²)
    pub area_density: f64,
}

impl Layer {
    pub fn new(compound: Compound, area_density: f64) -> Result<Self> {
        if !area_density.is_finite() || area_density <= 0.0 {
            return Err(XasError::ValidationError(format!(
                "area density of '{}' must be positive, got {}",
                compound.formula(),
                area_density
            )));
        }
        Ok(Layer {
            compound,
            area_density,
        })
    }

    /// 面密度 (mg/cm²)
    pub fn area_density_mg(&self) -> f64 {
        self.area_density * 1000.0
    }
}
