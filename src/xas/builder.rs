//! # 结果组装
//!
//! 把能量网格、光学厚度序列、吸收边能量和跳跃组装为 [`EdgeResult`]，
//! 并生成叠层标签与样品质量提示。
//!
//! ## 样品质量指导阈值
//! - 吸收边跳跃理想值约 1.0，常用可接受范围 0.3 - 3.0
//! - 总吸收（最大光学厚度）一般应低于约 4.0
//!
//! 这些阈值只作为提示输出，不作为错误。
//!
//! ## 依赖关系
//! - 被 `xas/calculator.rs` 调用
//! - 使用 `regex` 渲染化学式下标

use crate::models::{Advisory, EdgeOutcome, EdgeRequest, EdgeResult, EdgeSpectrum, Layer};
use crate::xas::attenuation::transmission;
use crate::xas::grid::EnergyGrid;

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// 吸收边跳跃下限
pub const EDGE_JUMP_MIN: f64 = 0.3;
/// 吸收边跳跃上限
pub const EDGE_JUMP_MAX: f64 = 3.0;
/// 总吸收上限
pub const ABSORBANCE_MAX: f64 = 4.0;

/// 元素符号或右括号，后接可选的计量数
static FORMULA_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Z][a-z]*|[)\]])(\d*\.?\d*)").expect("valid formula token pattern")
});

/// 结果组装器
pub struct ResultBuilder<'a> {
    layers: &'a [Layer],
}

impl<'a> ResultBuilder<'a> {
    pub fn new(layers: &'a [Layer]) -> Self {
        Self { layers }
    }

    /// 组装成功结果
    pub fn build(
        &self,
        request: &EdgeRequest,
        edge_value: f64,
        edge_jump: f64,
        grid: EnergyGrid,
        optical_depth: Vec<f64>,
        layer_absorption: Vec<f64>,
    ) -> EdgeResult {
        let abs_max = optical_depth
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let abs_min = optical_depth.iter().copied().fold(f64::INFINITY, f64::min);

        EdgeResult {
            element: request.element.to_string(),
            edge_type: request.edge_type.to_string(),
            outcome: EdgeOutcome::Computed(EdgeSpectrum {
                edge_value,
                edge_jump,
                abs_max,
                abs_min,
                transmission: transmission(&optical_depth),
                energies: grid.into_inner(),
                optical_depth,
                compound_label: stack_latex_label(self.layers),
                stack_label: stack_label(self.layers),
                layer_absorption,
                advisories: assess(edge_jump, abs_max),
            }),
        }
    }
}

/// 根据指导阈值生成提示
pub fn assess(edge_jump: f64, abs_max: f64) -> Vec<Advisory> {
    let mut advisories = Vec::new();
    if edge_jump < EDGE_JUMP_MIN {
        advisories.push(Advisory::WeakEdgeJump);
    } else if edge_jump > EDGE_JUMP_MAX {
        advisories.push(Advisory::StrongEdgeJump);
    }
    if abs_max > ABSORBANCE_MAX {
        advisories.push(Advisory::OpaqueStack);
    }
    advisories
}

/// 化学式转 LaTeX：Fe2O3 -> \text{Fe}_{2}\text{O}_{3}
pub fn formula_to_latex(formula: &str) -> String {
    FORMULA_TOKEN
        .replace_all(formula, |caps: &Captures| {
            let head = &caps[1];
            let head = if head.starts_with(|c: char| c.is_ascii_uppercase()) {
                format!("\\text{{{}}}", head)
            } else {
                head.to_string()
            };
            match &caps[2] {
                "" => head,
                count => format!("{}_{{{}}}", head, count),
            }
        })
        .into_owned()
}

/// 化学式转 Unicode 下标：Fe2O3 -> Fe₂O₃
pub fn formula_to_unicode(formula: &str) -> String {
    FORMULA_TOKEN
        .replace_all(formula, |caps: &Captures| {
            let subscript: String = caps[2]
                .chars()
                .map(|c| match c.to_digit(10) {
                    Some(d) => char::from_u32(0x2080 + d).unwrap_or(c),
                    None => c,
                })
                .collect();
            format!("{}{}", &caps[1], subscript)
        })
        .into_owned()
}

/// LaTeX 叠层标签：$$10.0\,\frac{mg}{cm^2}\, \text{Fe}_{2}\text{O}_{3} + ...$$
pub fn stack_latex_label(layers: &[Layer]) -> String {
    let body = layers
        .iter()
        .map(|layer| {
            format!(
                "{:.1}\\,\\frac{{mg}}{{cm^2}}\\, {}",
                layer.area_density_mg(),
                formula_to_latex(layer.compound.formula())
            )
        })
        .collect::<Vec<_>>()
        .join(" + ");
    format!("$${}$$", body)
}

/// 纯文本叠层标签：10.0 mg/cm² Fe2O3 + 100.0 mg/cm² BN
pub fn stack_label(layers: &[Layer]) -> String {
    layers
        .iter()
        .map(|layer| {
            format!(
                "{:.1} mg/cm² {}",
                layer.area_density_mg(),
                layer.compound.formula()
            )
        })
        .collect::<Vec<_>>()
        .join(" + ")
}
