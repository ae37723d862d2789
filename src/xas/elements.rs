//! # 元素符号表
//!
//! 元素符号与原子序数（Z = 1..98，即 Elam 截面表覆盖的范围）。
//! 原子量、吸收边能量和截面都由 `xas/provider.rs` 的数据源提供，这里只负责识别符号。
//!
//! ## 依赖关系
//! - 被 `parsers/formula.rs` 用于识别元素符号
//! - 被 `models/edge.rs` 用于规范化大小写
//! - 被 `commands/elements.rs` 用于元素目录输出

use std::collections::HashMap;
use std::sync::LazyLock;

/// 元素符号（下标 + 1 为原子序数）
pub static SYMBOLS: [&str; 98] = [
    "H", "He", //
    "Li", "Be", "B", "C", "N", "O", "F", "Ne", //
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", //
    "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As", "Se",
    "Br", "Kr", //
    "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn", "Sb", "Te",
    "I", "Xe", //
    "Cs", "Ba", "La", "Ce", "Pr", "Nd", "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg", "Tl", "Pb", "Bi", "Po", "At", "Rn",
    //
    "Fr", "Ra", "Ac", "Th", "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf",
];

/// 符号 -> 原子序数
static BY_SYMBOL: LazyLock<HashMap<&'static str, u32>> = LazyLock::new(|| {
    SYMBOLS
        .iter()
        .enumerate()
        .map(|(i, &symbol)| (symbol, i as u32 + 1))
        .collect()
});

/// 按符号查找原子序数（区分大小写）
pub fn atomic_number(symbol: &str) -> Option<u32> {
    BY_SYMBOL.get(symbol).copied()
}

/// 按符号查找表内的静态符号（区分大小写）
pub fn lookup(symbol: &str) -> Option<&'static str> {
    atomic_number(symbol).map(|z| SYMBOLS[z as usize - 1])
}

/// 将任意大小写的符号规范化为标准写法（"fe" -> "Fe"）
pub fn canonical_symbol(symbol: &str) -> Option<&'static str> {
    let trimmed = symbol.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    let normalized: String = first
        .to_uppercase()
        .chain(chars.flat_map(|c| c.to_lowercase()))
        .collect();
    lookup(&normalized)
}
