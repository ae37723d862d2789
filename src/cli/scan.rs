//! # scan 子命令 CLI 定义
//!
//! 在活性物质比例 × 样品片面密度网格上扫描吸收边跳跃和最大吸收。
//!
//! ## 输入模式
//! - 请求 JSON 文件（压片形式：`sample` + `matrices`，可带 `components`）
//! - 省略：由 `--sample`、`--matrix`、`--component` 和 `--edge` 描述样品片
//!
//! 两种模式都只接受一个吸收边；`sample` 的总面密度和比例由扫描坐标轴取代。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/scan.rs`

use crate::cli::calc::{
    parse_edge, parse_layer, parse_matrix, DensityUnit, EdgeArg, GridArgs, LayerArg, MatrixArg,
};
use crate::xas::builder::{ABSORBANCE_MAX, EDGE_JUMP_MAX, EDGE_JUMP_MIN};
use crate::xas::scan::{AxisRange, ScanQuantity};

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// 输出格式
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ScanOutputFormat {
    /// PNG heatmap
    Png,
    /// SVG heatmap
    Svg,
    /// CSV table, one row per cell
    Csv,
    /// Full JSON scan result
    Json,
}

impl ScanOutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ScanOutputFormat::Png => "png",
            ScanOutputFormat::Svg => "svg",
            ScanOutputFormat::Csv => "csv",
            ScanOutputFormat::Json => "json",
        }
    }
}

/// 热图着色的量
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ScanMapArg {
    /// Edge jump
    #[default]
    Jump,
    /// Maximum absorption over the energy grid
    Abs,
}

impl From<ScanMapArg> for ScanQuantity {
    fn from(arg: ScanMapArg) -> Self {
        match arg {
            ScanMapArg::Jump => ScanQuantity::EdgeJump,
            ScanMapArg::Abs => ScanQuantity::AbsMax,
        }
    }
}

/// 解析 `START:STOP[:STEP]` 形式的坐标轴，步长缺省为 1
pub fn parse_range(input: &str) -> Result<AxisRange, String> {
    let parts: Vec<&str> = input.split(':').map(str::trim).collect();
    let numbers = parts
        .iter()
        .map(|p| p.parse::<f64>())
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|_| format!("Invalid range '{}': expected numbers", input))?;
    match numbers.as_slice() {
        [start, stop] => Ok(AxisRange::new(*start, *stop, 1.0)),
        [start, stop, step] => Ok(AxisRange::new(*start, *stop, *step)),
        _ => Err(format!(
            "Invalid range '{}'. Expected START:STOP or START:STOP:STEP (e.g., 1:100:1)",
            input
        )),
    }
}

/// scan 子命令参数
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Input: request JSON file describing the pellet (omit for inline mode)
    pub input: Option<PathBuf>,

    /// Sample formula to dilute (e.g., --sample Fe2O3)
    #[arg(long, conflicts_with = "input")]
    pub sample: Option<String>,

    /// Dilution matrix as FORMULA or FORMULA:WEIGHT, repeatable (weights are relative)
    #[arg(long = "matrix", value_parser = parse_matrix, conflicts_with = "input")]
    pub matrices: Vec<MatrixArg>,

    /// Extra component with its own density as FORMULA:DENSITY, repeatable
    #[arg(long = "component", value_parser = parse_layer, conflicts_with = "input")]
    pub components: Vec<LayerArg>,

    /// Edge to scan as ELEMENT:EDGE (e.g., --edge Fe:K)
    #[arg(long, value_parser = parse_edge, conflicts_with = "input")]
    pub edge: Option<EdgeArg>,

    /// Unit of component densities
    #[arg(long, value_enum, default_value = "mg")]
    pub unit: DensityUnit,

    /// Active material axis in % as START:STOP[:STEP]
    #[arg(long, value_parser = parse_range, default_value = "1:100:1")]
    pub active: AxisRange,

    /// Pellet area density axis in mg/cm² as START:STOP[:STEP]
    #[arg(long, value_parser = parse_range, default_value = "1:200:1")]
    pub density: AxisRange,

    /// Lowest acceptable edge jump
    #[arg(long, default_value_t = EDGE_JUMP_MIN)]
    pub jump_min: f64,

    /// Highest acceptable edge jump
    #[arg(long, default_value_t = EDGE_JUMP_MAX)]
    pub jump_max: f64,

    /// Highest acceptable absorption
    #[arg(long, default_value_t = ABSORBANCE_MAX)]
    pub abs_max: f64,

    /// Quantity colored in the heatmap
    #[arg(long, value_enum, default_value = "jump")]
    pub map: ScanMapArg,

    /// Number of best cells listed in the summary
    #[arg(long, default_value_t = 5)]
    pub top: usize,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format (auto-detected from extension if not specified)
    #[arg(short, long, value_enum)]
    pub format: Option<ScanOutputFormat>,

    /// Figure width in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels (for PNG) or points (for SVG)
    #[arg(long, default_value_t = 900)]
    pub height: u32,

    /// Title for the heatmap
    #[arg(long)]
    pub title: Option<String>,

    #[command(flatten)]
    pub grid: GridArgs,

    /// Run every cross-section lookup under one process-wide lock
    #[arg(long, env = "XASCALC_SERIAL_LOOKUPS")]
    pub serial_lookups: bool,

    /// Overwrite an existing output file
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,
}
