//! # XAS 图表生成
//!
//! 使用 `plotters` 库绘制吸收边附近的光学厚度与透过率曲线。
//!
//! ## 功能
//! - 左轴：叠层总光学厚度（吸收）
//! - 右轴：透过率 (%)
//! - 吸收边位置竖线，跳跃与最大吸收标注
//! - 稀释扫描热图：横轴活性物质比例，纵轴面密度，不可接受的单元淡化显示
//! - 支持 PNG 和 SVG 输出
//!
//! 横轴显示 E0 - 50 到 E0 + 100 eV（网格不覆盖该窗口时显示整个网格），
//! 纵轴按该窗口内的吸收范围上下各留 0.1。
//!
//! ## 依赖关系
//! - 被 `commands/calc.rs`, `commands/scan.rs` 调用
//! - 使用 `models/result.rs` 的 EdgeResult 结构
//! - 使用 `plotters` 渲染图表

use crate::error::{Result, XasError};
use crate::models::{EdgeResult, EdgeSpectrum};
use crate::xas::builder::formula_to_unicode;
use crate::xas::scan::{ScanMap, ScanQuantity};

use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

/// 吸收边前显示范围 (eV)
const VIEW_BEFORE_EDGE: f64 = 50.0;
/// 吸收边后显示范围 (eV)
const VIEW_AFTER_EDGE: f64 = 100.0;
/// 纵轴上下留白
const ABSORPTION_PADDING: f64 = 0.1;

/// 生成单个吸收边的图表
pub fn generate_edge_plot(
    result: &EdgeResult,
    output_path: &Path,
    title: Option<&str>,
    width: u32,
    height: u32,
    use_svg: bool,
) -> Result<()> {
    let spectrum = result.spectrum().ok_or_else(|| {
        XasError::ComputationError(format!(
            "{} {} has no spectrum to plot",
            result.element, result.edge_type
        ))
    })?;

    let title = match title {
        Some(t) => t.to_string(),
        None => default_title(result, spectrum),
    };

    if use_svg {
        let root = SVGBackend::new(output_path, (width, height)).into_drawing_area();
        draw_edge_chart(&root, spectrum, &title)?;
        root.present()
            .map_err(|e| XasError::Other(e.to_string()))?;
    } else {
        let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
        draw_edge_chart(&root, spectrum, &title)?;
        root.present()
            .map_err(|e| XasError::Other(e.to_string()))?;
    }
    Ok(())
}

/// 默认标题：Fe K edge · 5.0 mg/cm² Fe₂O₃ + 100.0 mg/cm² BN
fn default_title(result: &EdgeResult, spectrum: &EdgeSpectrum) -> String {
    format!(
        "{} {} edge · {}",
        result.element,
        result.edge_type,
        formula_to_unicode(&spectrum.stack_label)
    )
}

/// 显示窗口：(能量范围, 吸收范围)
fn view_window(spectrum: &EdgeSpectrum) -> (Range<f64>, Range<f64>) {
    let first = spectrum.energies.first().copied().unwrap_or(spectrum.edge_value);
    let last = spectrum.energies.last().copied().unwrap_or(spectrum.edge_value);
    let x_min = (spectrum.edge_value - VIEW_BEFORE_EDGE).max(first);
    let x_max = (spectrum.edge_value + VIEW_AFTER_EDGE).min(last);
    // 网格过窄时与显示窗口不相交，退回到整个网格
    let (x_min, x_max) = if x_max > x_min {
        (x_min, x_max)
    } else if last > first {
        (first, last)
    } else {
        (first - 1.0, first + 1.0)
    };

    let (lo, hi) = windowed(spectrum, x_min..x_max)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, tau)| {
            (lo.min(tau), hi.max(tau))
        });
    let (lo, hi) = if lo.is_finite() && hi.is_finite() {
        (lo, hi)
    } else {
        (spectrum.abs_min, spectrum.abs_max)
    };

    (
        x_min..x_max,
        (lo - ABSORPTION_PADDING)..(hi + ABSORPTION_PADDING),
    )
}

/// 窗口内的 (能量, 光学厚度) 点
fn windowed(
    spectrum: &EdgeSpectrum,
    x_range: Range<f64>,
) -> impl Iterator<Item = (f64, f64)> + '_ {
    spectrum
        .energies
        .iter()
        .zip(&spectrum.optical_depth)
        .filter(move |(e, _)| **e >= x_range.start && **e <= x_range.end)
        .map(|(e, t)| (*e, *t))
}

/// 绘制图表的核心逻辑
fn draw_edge_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    spectrum: &EdgeSpectrum,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    let (x_range, y_range) = view_window(spectrum);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .right_y_label_area_size(60)
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(|e| XasError::Other(format!("{:?}", e)))?
        .set_secondary_coord(x_range.clone(), 0.0..105.0);

    chart
        .configure_mesh()
        .x_desc("Energy (eV)")
        .y_desc("Absorption")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    chart
        .configure_secondary_axes()
        .y_desc("Transmission (%)")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    // 吸收曲线
    let absorption_color = RGBColor(0, 102, 204);
    chart
        .draw_series(LineSeries::new(
            windowed(spectrum, x_range.clone()),
            absorption_color.stroke_width(2),
        ))
        .map_err(|e| XasError::Other(format!("{:?}", e)))?
        .label("Absorption")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], absorption_color));

    // 透过率曲线
    let transmission_color = RGBColor(128, 0, 128);
    let transmission_points = spectrum
        .energies
        .iter()
        .zip(&spectrum.transmission)
        .filter(|(e, _)| **e >= x_range.start && **e <= x_range.end)
        .map(|(e, t)| (*e, t * 100.0));
    chart
        .draw_secondary_series(LineSeries::new(
            transmission_points,
            transmission_color.mix(0.7).stroke_width(2),
        ))
        .map_err(|e| XasError::Other(format!("{:?}", e)))?
        .label("Transmission")
        .legend(move |(x, y)| {
            PathElement::new(vec![(x, y), (x + 20, y)], transmission_color.mix(0.7))
        });

    // 吸收边位置
    chart
        .draw_series(std::iter::once(PathElement::new(
            vec![
                (spectrum.edge_value, y_range.start),
                (spectrum.edge_value, y_range.end),
            ],
            RGBColor(150, 150, 150).stroke_width(1),
        )))
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    // 跳跃与最大吸收
    let span = y_range.end - y_range.start;
    let text_style = ("sans-serif", 14).into_font().color(&BLACK);
    let annotations = [
        format!("E0 = {:.1} eV", spectrum.edge_value),
        format!("Edge jump = {:.3}", spectrum.edge_jump),
        format!("Abs max = {:.3}", spectrum.abs_max),
    ];
    for (i, text) in annotations.into_iter().enumerate() {
        chart
            .draw_series(std::iter::once(Text::new(
                text,
                (
                    x_range.start + 5.0,
                    y_range.end - span * (0.06 + 0.06 * i as f64),
                ),
                text_style.clone(),
            )))
            .map_err(|e| XasError::Other(format!("{:?}", e)))?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    Ok(())
}

/// 生成稀释扫描热图
pub fn generate_scan_plot(
    map: &ScanMap,
    quantity: ScanQuantity,
    output_path: &Path,
    title: Option<&str>,
    width: u32,
    height: u32,
    use_svg: bool,
) -> Result<()> {
    let title = match title {
        Some(t) => t.to_string(),
        None => format!(
            "{} {} edge · {} · {}",
            map.element,
            map.edge_type,
            formula_to_unicode(&map.sample),
            quantity.label()
        ),
    };

    if use_svg {
        let root = SVGBackend::new(output_path, (width, height)).into_drawing_area();
        draw_scan_chart(&root, map, quantity, &title)?;
        root.present()
            .map_err(|e| XasError::Other(e.to_string()))?;
    } else {
        let root = BitMapBackend::new(output_path, (width, height)).into_drawing_area();
        draw_scan_chart(&root, map, quantity, &title)?;
        root.present()
            .map_err(|e| XasError::Other(e.to_string()))?;
    }
    Ok(())
}

/// 热图单元的半宽
fn half_step(values: &[f64]) -> f64 {
    match values {
        [a, b, ..] => (b - a) / 2.0,
        _ => 0.5,
    }
}

/// 颜色范围：有限值的最小、最大
fn value_range(values: &[Vec<f64>]) -> (f64, f64) {
    let (lo, hi) = values
        .iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !(lo.is_finite() && hi.is_finite()) {
        (0.0, 1.0)
    } else if hi > lo {
        (lo, hi)
    } else {
        (lo, lo + 1.0)
    }
}

/// 蓝 (低) -> 红 (高)
fn heat_color(t: f64) -> HSLColor {
    HSLColor((1.0 - t.clamp(0.0, 1.0)) * 240.0 / 360.0, 0.75, 0.5)
}

/// 绘制热图的核心逻辑
fn draw_scan_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    map: &ScanMap,
    quantity: ScanQuantity,
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    let (Some(&x_first), Some(&x_last), Some(&y_first), Some(&y_last)) = (
        map.active_pct.first(),
        map.active_pct.last(),
        map.density_mg_per_cm2.first(),
        map.density_mg_per_cm2.last(),
    ) else {
        return Err(XasError::ComputationError(
            "scan has no cells to plot".to_string(),
        ));
    };

    let hx = half_step(&map.active_pct);
    let hy = half_step(&map.density_mg_per_cm2);
    let values = map.values(quantity);
    let (lo, hi) = value_range(values);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 24).into_font())
        .margin(30)
        .margin_bottom(70)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d((x_first - hx)..(x_last + hx), (y_first - hy)..(y_last + hy))
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_desc("Active material [%]")
        .y_desc("Area density [mg/cm²]")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    // 可接受单元全色，其余淡化
    chart
        .draw_series(map.cells().map(|cell| {
            let value = match quantity {
                ScanQuantity::EdgeJump => cell.edge_jump,
                ScanQuantity::AbsMax => cell.abs_max,
            };
            let color = heat_color((value - lo) / (hi - lo));
            let style = if cell.acceptable {
                color.filled()
            } else {
                color.mix(0.25).filled()
            };
            let (x, y) = (cell.active_pct, cell.density_mg_per_cm2);
            Rectangle::new([(x - hx, y - hy), (x + hx, y + hy)], style)
        }))
        .map_err(|e| XasError::Other(format!("{:?}", e)))?;

    let text_style = ("sans-serif", 14).into_font().color(&BLACK);
    let annotations = [
        format!("{}: {:.3} (blue) - {:.3} (red)", quantity.label(), lo, hi),
        format!(
            "Acceptable: {} / {} cells (jump {}-{}, abs max {}-{})",
            map.accepted_count(),
            map.cell_count(),
            map.edge_jump_window.min,
            map.edge_jump_window.max,
            map.abs_max_window.min,
            map.abs_max_window.max
        ),
    ];
    // 注释写在图底部的两行
    let (_, height) = root.dim_in_pixel();
    for (i, text) in annotations.into_iter().enumerate() {
        let y = height as i32 - 36 + 18 * i as i32;
        root.draw(&Text::new(text, (40, y), text_style.clone()))
            .map_err(|e| XasError::Other(format!("{:?}", e)))?;
    }

    Ok(())
}
