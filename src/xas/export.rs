//! # XAS 数据导出
//!
//! 导出计算结果到 JSON、CSV 和 XY 格式。
//!
//! ## 支持格式
//! - JSON: 完整响应（所有吸收边，含失败项）
//! - CSV: 单个吸收边的 energy_ev, optical_depth, transmission
//! - XY: 带 `#` 注释头的两列数据（能量, 光学厚度）
//! - 扫描 CSV: 每个网格单元一行 active_pct, density_mg_per_cm2, edge_jump, abs_max, acceptable
//! - 扫描 JSON: 完整扫描结果
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs`, `commands/scan.rs` 调用
//! - 使用 `models/result.rs` 的结果结构
//! - 使用 `csv` 和 `serde_json` 写入文件

use crate::error::{Result, XasError};
use crate::models::{CalcResponse, EdgeResult, EdgeSpectrum};
use crate::xas::scan::ScanMap;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// 导出完整响应为 JSON
pub fn response_to_json(response: &CalcResponse, output_path: &Path) -> Result<()> {
    let file = create(output_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, response)?;
    writeln!(writer).map_err(|e| write_error(output_path, e))?;
    writer.flush().map_err(|e| write_error(output_path, e))
}

/// 导出单个吸收边谱为 CSV
pub fn spectrum_to_csv(result: &EdgeResult, output_path: &Path) -> Result<()> {
    let spectrum = spectrum_of(result)?;
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record(["energy_ev", "optical_depth", "transmission"])?;

    let rows = spectrum
        .energies
        .iter()
        .zip(&spectrum.optical_depth)
        .zip(&spectrum.transmission);
    for ((energy, tau), t) in rows {
        wtr.write_record(&[
            format!("{:.2}", energy),
            format!("{:.6}", tau),
            format!("{:.6}", t),
        ])?;
    }

    wtr.flush().map_err(|e| write_error(output_path, e))
}

/// 导出单个吸收边谱为 XY
pub fn spectrum_to_xy(result: &EdgeResult, output_path: &Path) -> Result<()> {
    let spectrum = spectrum_of(result)?;

    let file = create(output_path)?;
    let mut out = BufWriter::new(file);

    let header = format!(
        "# XAS sample: {}\n\
         # Edge: {} {} at {:.1} eV\n\
         # Edge jump: {:.4}   Max absorbance: {:.4}\n\
         # Columns: Energy (eV), Optical depth\n\
         #",
        spectrum.stack_label,
        result.element,
        result.edge_type,
        spectrum.edge_value,
        spectrum.edge_jump,
        spectrum.abs_max
    );
    writeln!(out, "{}", header).map_err(|e| write_error(output_path, e))?;

    for (energy, tau) in spectrum.energies.iter().zip(&spectrum.optical_depth) {
        writeln!(out, "{:.2}\t{:.6}", energy, tau).map_err(|e| write_error(output_path, e))?;
    }

    out.flush().map_err(|e| write_error(output_path, e))
}

/// 导出扫描结果为 CSV
pub fn scan_to_csv(map: &ScanMap, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record([
        "active_pct",
        "density_mg_per_cm2",
        "edge_jump",
        "abs_max",
        "acceptable",
    ])?;

    for cell in map.cells() {
        wtr.write_record(&[
            format!("{}", cell.active_pct),
            format!("{}", cell.density_mg_per_cm2),
            format!("{:.6}", cell.edge_jump),
            format!("{:.6}", cell.abs_max),
            cell.acceptable.to_string(),
        ])?;
    }

    wtr.flush().map_err(|e| write_error(output_path, e))
}

/// 导出扫描结果为 JSON
pub fn scan_to_json(map: &ScanMap, output_path: &Path) -> Result<()> {
    let file = create(output_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, map)?;
    writeln!(writer).map_err(|e| write_error(output_path, e))?;
    writer.flush().map_err(|e| write_error(output_path, e))
}

fn spectrum_of(result: &EdgeResult) -> Result<&EdgeSpectrum> {
    result.spectrum().ok_or_else(|| {
        XasError::ComputationError(format!(
            "{} {} has no spectrum to export",
            result.element, result.edge_type
        ))
    })
}

fn create(path: &Path) -> Result<File> {
    File::create(path).map_err(|e| write_error(path, e))
}

fn write_error(path: &Path, source: std::io::Error) -> XasError {
    XasError::FileWriteError {
        path: path.display().to_string(),
        source,
    }
}
