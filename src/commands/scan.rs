//! # scan 子命令实现
//!
//! 在活性物质比例 × 面密度网格上扫描吸收边跳跃和最大吸收，
//! 输出热图 (PNG/SVG)、逐单元 CSV 或完整 JSON，并在终端列出最接近理想跳跃的配方。
//!
//! ## 依赖关系
//! - 使用 `cli/scan.rs` 定义的 ScanArgs
//! - 使用 `xas/scan.rs` 计算扫描
//! - 使用 `xas/plot.rs`, `xas/export.rs` 写出结果
//! - 使用 `parsers/` 读取请求文件

use crate::cli::scan::{ScanArgs, ScanOutputFormat};
use crate::error::{Result, XasError};
use crate::models::{CalcRequest, EdgeSpec, LayerSpec, MatrixSpec, SampleSpec};
use crate::parsers;
use crate::utils::output;
use crate::xas::builder::formula_to_unicode;
use crate::xas::scan::{DilutionScan, ScanCell, ScanConfig, ScanMap, Window};
use crate::xas::{self, default_provider, GridConfig};

use std::path::{Path, PathBuf};

/// 执行 scan 命令
pub fn execute(args: ScanArgs) -> Result<()> {
    output::print_header("XAS Dilution Scan");

    let mut request = match &args.input {
        Some(input) if input.is_file() => {
            output::print_info(&format!("Request file: '{}'", input.display()));
            parsers::parse_request_file(input)?
        }
        Some(input) => {
            return Err(XasError::FileNotFound {
                path: input.display().to_string(),
            })
        }
        None => inline_request(&args)?,
    };
    request.grid = args.grid.apply(&request.grid);

    let config = scan_config(&args);
    let provider = default_provider(args.serial_lookups)?;
    let map = DilutionScan::new(&provider).run(&request, &config)?;

    output::print_info(&format!(
        "{} {} edge at {:.1} eV, sample {}",
        map.element,
        map.edge_type,
        map.edge_value,
        formula_to_unicode(&map.sample)
    ));
    output::print_info(&format!(
        "Scanned {} cells ({} ratios x {} densities), {} acceptable",
        map.cell_count(),
        map.active_pct.len(),
        map.density_mg_per_cm2.len(),
        map.accepted_count()
    ));
    print_candidates(&map.candidates(args.top));

    let format = resolve_format(&args);
    let path = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&map, format));

    if path.exists() && !args.overwrite {
        output::print_skip(&format!("Output exists: '{}'", path.display()));
        return Ok(());
    }
    write_map(&map, &path, format, &args)?;
    output::print_success(&format!("Saved '{}'", path.display()));
    Ok(())
}

/// 由内联参数构造压片请求；总面密度和比例只是占位，由扫描坐标轴取代
fn inline_request(args: &ScanArgs) -> Result<CalcRequest> {
    let (Some(sample), Some(edge)) = (&args.sample, &args.edge) else {
        return Err(XasError::InvalidArgument(
            "no input given: pass a request file, or --sample, --matrix and --edge".to_string(),
        ));
    };

    let mut request = CalcRequest::new(
        vec![],
        vec![EdgeSpec::new(edge.element.clone(), edge.edge.clone())],
    );
    request.sample = Some(SampleSpec::new(sample.clone(), 1.0, 1.0));
    request.matrices = args
        .matrices
        .iter()
        .map(|m| MatrixSpec::new(m.formula.clone(), m.ratio))
        .collect();
    request.components = args
        .components
        .iter()
        .map(|c| LayerSpec::new(c.formula.clone(), args.unit.to_g_per_cm2(c.density)))
        .collect();
    request.grid = GridConfig::default();
    Ok(request)
}

fn scan_config(args: &ScanArgs) -> ScanConfig {
    ScanConfig {
        active_pct: args.active,
        density_mg: args.density,
        edge_jump: Window::new(args.jump_min, args.jump_max),
        abs_max: Window::new(0.0, args.abs_max),
    }
}

/// 输出格式：显式参数优先，其次按输出文件扩展名推断
fn resolve_format(args: &ScanArgs) -> ScanOutputFormat {
    args.format.unwrap_or_else(|| {
        match args
            .output
            .as_deref()
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("svg") => ScanOutputFormat::Svg,
            Some("csv") => ScanOutputFormat::Csv,
            Some("json") => ScanOutputFormat::Json,
            _ => ScanOutputFormat::Png,
        }
    })
}

/// `Fe2O3_Fe_K_scan.png`
fn default_output(map: &ScanMap, format: ScanOutputFormat) -> PathBuf {
    let sample: String = map
        .sample
        .split(" in ")
        .next()
        .unwrap_or("sample")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    PathBuf::from(format!(
        "{}_{}_{}_scan.{}",
        sample,
        map.element,
        map.edge_type,
        format.extension()
    ))
}

fn write_map(map: &ScanMap, path: &Path, format: ScanOutputFormat, args: &ScanArgs) -> Result<()> {
    match format {
        ScanOutputFormat::Png | ScanOutputFormat::Svg => xas::plot::generate_scan_plot(
            map,
            args.map.into(),
            path,
            args.title.as_deref(),
            args.width,
            args.height,
            format == ScanOutputFormat::Svg,
        ),
        ScanOutputFormat::Csv => xas::export::scan_to_csv(map, path),
        ScanOutputFormat::Json => xas::export::scan_to_json(map, path),
    }
}

/// 打印最佳配方表格
fn print_candidates(cells: &[ScanCell]) {
    use tabled::{Table, Tabled};

    if cells.is_empty() {
        output::print_warning("No cell meets both the edge-jump and absorption windows");
        return;
    }

    #[derive(Tabled)]
    struct CandidateRow {
        #[tabled(rename = "Active (%)")]
        active: String,
        #[tabled(rename = "Density (mg/cm²)")]
        density: String,
        #[tabled(rename = "Sample (mg/cm²)")]
        sample: String,
        #[tabled(rename = "Edge jump")]
        edge_jump: String,
        #[tabled(rename = "Abs max")]
        abs_max: String,
    }

    let rows: Vec<CandidateRow> = cells
        .iter()
        .map(|c| CandidateRow {
            active: format!("{}", c.active_pct),
            density: format!("{}", c.density_mg_per_cm2),
            sample: format!("{:.2}", c.density_mg_per_cm2 * c.active_pct / 100.0),
            edge_jump: format!("{:.3}", c.edge_jump),
            abs_max: format!("{:.3}", c.abs_max),
        })
        .collect();

    output::print_header(&format!("Best {} pellet(s)", rows.len()));
    println!("{}", Table::new(&rows));
}
