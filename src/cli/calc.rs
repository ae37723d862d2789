//! # calc 子命令 CLI 定义
//!
//! 计算 XAS 样品片在吸收边附近的光学厚度曲线、吸收边跳跃和总吸收。
//!
//! ## 输入模式
//! - 请求 JSON 文件：单文件模式
//! - 目录：批量模式（按 `--pattern` 收集请求文件）
//! - 省略：内联模式，由 `--layer` 和 `--edge` 描述样品；
//!   也可用 `--sample`/`--ratio`/`--matrix`/`--component` 描述稀释样品片
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/calc.rs`

use crate::xas::GridConfig;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 内联面密度单位
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum DensityUnit {
    /// g/cm²
    G,
    /// mg/cm²
    #[default]
    Mg,
}

impl DensityUnit {
    /// 换算到 g/cm²
    pub fn to_g_per_cm2(self, value: f64) -> f64 {
        match self {
            DensityUnit::G => value,
            DensityUnit::Mg => value / 1000.0,
        }
    }
}

impl std::fmt::Display for DensityUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DensityUnit::G => write!(f, "g/cm²"),
            DensityUnit::Mg => write!(f, "mg/cm²"),
        }
    }
}

/// 输出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CalcOutputFormat {
    /// PNG image
    Png,
    /// SVG vector image
    Svg,
    /// CSV data file (energy, optical depth, transmission)
    Csv,
    /// XY data file (energy, optical depth)
    Xy,
    /// Full JSON response (all edges, including failures)
    Json,
}

impl CalcOutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CalcOutputFormat::Png => "png",
            CalcOutputFormat::Svg => "svg",
            CalcOutputFormat::Csv => "csv",
            CalcOutputFormat::Xy => "xy",
            CalcOutputFormat::Json => "json",
        }
    }
}

/// 内联层参数 FORMULA:DENSITY
#[derive(Debug, Clone, PartialEq)]
pub struct LayerArg {
    pub formula: String,
    pub density: f64,
}

/// 解析 `Fe2O3:5` 形式的层参数
pub fn parse_layer(input: &str) -> Result<LayerArg, String> {
    let (formula, density) = input
        .rsplit_once(':')
        .ok_or_else(|| format!("Invalid layer '{}'. Expected FORMULA:DENSITY (e.g., Fe2O3:5)", input))?;
    let formula = formula.trim();
    if formula.is_empty() {
        return Err(format!("Invalid layer '{}': missing formula", input));
    }
    let density: f64 = density
        .trim()
        .parse()
        .map_err(|_| format!("Invalid layer '{}': '{}' is not a number", input, density))?;
    Ok(LayerArg {
        formula: formula.to_string(),
        density,
    })
}

/// 内联基体参数 FORMULA[:RATIO]
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixArg {
    pub formula: String,
    pub ratio: Option<f64>,
}

/// 解析 `BN` 或 `BN:0.3` 形式的基体参数
pub fn parse_matrix(input: &str) -> Result<MatrixArg, String> {
    let (formula, ratio) = match input.rsplit_once(':') {
        Some((formula, ratio)) => {
            let ratio: f64 = ratio
                .trim()
                .parse()
                .map_err(|_| format!("Invalid matrix '{}': '{}' is not a number", input, ratio))?;
            (formula, Some(ratio))
        }
        None => (input, None),
    };
    let formula = formula.trim();
    if formula.is_empty() {
        return Err(format!(
            "Invalid matrix '{}'. Expected FORMULA or FORMULA:RATIO (e.g., BN:0.3)",
            input
        ));
    }
    Ok(MatrixArg {
        formula: formula.to_string(),
        ratio,
    })
}

/// 内联吸收边参数 EL:EDGE
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeArg {
    pub element: String,
    pub edge: String,
}

/// 解析 `Fe:K` 形式的吸收边参数，标签合法性留到计算时逐个检查
pub fn parse_edge(input: &str) -> Result<EdgeArg, String> {
    match input.split_once(':') {
        Some((element, edge)) if !element.trim().is_empty() && !edge.trim().is_empty() => {
            Ok(EdgeArg {
                element: element.trim().to_string(),
                edge: edge.trim().to_string(),
            })
        }
        _ => Err(format!(
            "Invalid edge '{}'. Expected ELEMENT:EDGE (e.g., Fe:K)",
            input
        )),
    }
}

/// 能量网格参数（覆盖请求文件中的 `grid`）
#[derive(Args, Debug, Clone, Default)]
pub struct GridArgs {
    /// Energy window below the edge (eV)
    #[arg(long, env = "XASCALC_PRE_EDGE")]
    pub pre_edge: Option<f64>,

    /// Energy window above the edge (eV)
    #[arg(long, env = "XASCALC_POST_EDGE")]
    pub post_edge: Option<f64>,

    /// Energy grid step (eV)
    #[arg(long, env = "XASCALC_STEP")]
    pub step: Option<f64>,

    /// Offset either side of the edge used for the edge jump (eV)
    #[arg(long, env = "XASCALC_JUMP_OFFSET")]
    pub jump_offset: Option<f64>,
}

impl GridArgs {
    /// 命令行参数优先于 `base`
    pub fn apply(&self, base: &GridConfig) -> GridConfig {
        GridConfig {
            pre_edge: self.pre_edge.unwrap_or(base.pre_edge),
            post_edge: self.post_edge.unwrap_or(base.post_edge),
            step: self.step.unwrap_or(base.step),
            jump_offset: self.jump_offset.unwrap_or(base.jump_offset),
        }
    }
}

/// calc 子命令参数
#[derive(Args, Debug)]
pub struct CalcArgs {
    /// Input: request JSON file or directory of request files (omit for inline mode)
    pub input: Option<PathBuf>,

    /// Inline layer as FORMULA:DENSITY, repeatable (e.g., --layer Fe2O3:5 --layer BN:100)
    #[arg(long = "layer", value_parser = parse_layer)]
    pub layers: Vec<LayerArg>,

    /// Inline edge as ELEMENT:EDGE, repeatable (e.g., --edge Fe:K)
    #[arg(long = "edge", value_parser = parse_edge)]
    pub edges: Vec<EdgeArg>,

    /// Diluted sample as FORMULA:TOTAL_DENSITY; the pellet is split by --ratio
    #[arg(long, value_parser = parse_layer)]
    pub sample: Option<LayerArg>,

    /// Share of the pellet taken by the sample (0 < ratio <= 1)
    #[arg(long, default_value_t = 1.0, requires = "sample")]
    pub ratio: f64,

    /// Dilution matrix as FORMULA or FORMULA:RATIO, repeatable (requires --sample)
    #[arg(long = "matrix", value_parser = parse_matrix, requires = "sample")]
    pub matrices: Vec<MatrixArg>,

    /// Extra component with its own density as FORMULA:DENSITY, repeatable
    #[arg(long = "component", value_parser = parse_layer)]
    pub components: Vec<LayerArg>,

    /// Unit of inline densities (layers, sample total and components)
    #[arg(long, value_enum, default_value = "mg")]
    pub unit: DensityUnit,

    /// Run every cross-section lookup under one process-wide lock
    #[arg(long, env = "XASCALC_SERIAL_LOOKUPS")]
    pub serial_lookups: bool,

    /// Output: file path (single/inline mode) or directory (batch mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (auto-detected from extension if not specified)
    #[arg(short, long, value_enum)]
    pub format: Option<CalcOutputFormat>,

    /// Figure width in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Title for the plot (default: edge and sample description)
    #[arg(long)]
    pub title: Option<String>,

    #[command(flatten)]
    pub grid: GridArgs,

    // ─────────────────────────────────────────────────────────────
    // 批量处理参数
    // ─────────────────────────────────────────────────────────────
    /// Glob pattern for request files (batch mode, e.g., "*.json,sample_*")
    #[arg(long, default_value = "*.json")]
    pub pattern: String,

    /// Number of parallel jobs (0 = auto, batch mode only)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Recurse into subdirectories (batch mode)
    #[arg(long, default_value_t = false)]
    pub recursive: bool,

    /// Overwrite existing output files
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
