//! # calc 子命令实现
//!
//! 计算 XAS 样品片的吸收曲线、吸收边跳跃和透过率。
//!
//! ## 功能
//! - 单文件、批量目录和内联三种输入模式（内联可描述分层样品或稀释样品片）
//! - 批量并行计算（rayon）
//! - 输出图像 (PNG/SVG)、数据文件 (CSV/XY) 或完整 JSON 响应
//! - 终端汇总表和样品质量提示
//!
//! 曲线类格式每个成功的吸收边写一个文件；请求多个吸收边时文件名追加 `_<元素>_<吸收边>`。
//!
//! ## 依赖关系
//! - 使用 `cli/calc.rs` 定义的 CalcArgs
//! - 使用 `batch/` 模块进行批量处理
//! - 使用 `xas/` 模块进行计算、绘图和导出
//! - 使用 `parsers/` 读取请求文件

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::calc::{CalcArgs, CalcOutputFormat, GridArgs};
use crate::error::{Result, XasError};
use crate::models::{
    CalcRequest, CalcResponse, EdgeResult, EdgeSpec, LayerSpec, MatrixSpec, SampleSpec,
};
use crate::parsers;
use crate::utils::output;
use crate::xas::builder::formula_to_unicode;
use crate::xas::{self, default_provider, CrossSectionProvider, GridConfig, XasCalculator};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 批量模式默认输出目录名
const DEFAULT_BATCH_DIR: &str = "xascalc_out";

/// 所有模式共用的计算器
type Calculator = XasCalculator<Box<dyn CrossSectionProvider>>;

/// 执行 calc 命令
pub fn execute(args: CalcArgs) -> Result<()> {
    output::print_header("XAS Sample Attenuation Calculation");

    if let Some(input) = &args.input {
        if !input.exists() {
            return Err(XasError::FileNotFound {
                path: input.display().to_string(),
            });
        }
    }

    if args.serial_lookups {
        output::print_info("Cross-section lookups are serialized");
    }
    let calculator = XasCalculator::new(default_provider(args.serial_lookups)?);

    match &args.input {
        Some(input) if input.is_dir() => execute_batch(&args, input, &calculator),
        Some(input) => execute_single_file(&args, input, &calculator),
        None => execute_inline(&args, &calculator),
    }
}

/// 输出设置
struct OutputConfig {
    format: CalcOutputFormat,
    width: u32,
    height: u32,
    title: Option<String>,
    overwrite: bool,
}

impl OutputConfig {
    fn from_args(args: &CalcArgs, format: CalcOutputFormat) -> Self {
        Self {
            format,
            width: args.width,
            height: args.height,
            title: args.title.clone(),
            overwrite: args.overwrite,
        }
    }
}

/// 一个请求的计算与写出结果
struct Outcome {
    results: Vec<EdgeResult>,
    written: Vec<PathBuf>,
    skipped: Vec<PathBuf>,
}

/// 单文件模式
fn execute_single_file(args: &CalcArgs, input: &Path, calculator: &Calculator) -> Result<()> {
    output::print_info(&format!("Single file mode: '{}'", input.display()));

    let mut request = parsers::parse_request_file(input)?;
    request.grid = args.grid.apply(&request.grid);

    let format = resolve_format(args);
    let base = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("{}_xas.{}", file_stem(input), format.extension()))
    });

    let outcome = compute_and_write(
        calculator,
        &request,
        &base,
        &OutputConfig::from_args(args, format),
    )?;
    report(&outcome);
    Ok(())
}

/// 内联模式
fn execute_inline(args: &CalcArgs, calculator: &Calculator) -> Result<()> {
    if args.layers.is_empty()
        && args.sample.is_none()
        && args.components.is_empty()
        && args.edges.is_empty()
    {
        return Err(XasError::InvalidArgument(
            "no input given: pass a request file, a directory, --layer/--sample and --edge"
                .to_string(),
        ));
    }
    match &args.sample {
        Some(sample) => output::print_info(&format!(
            "Inline mode: {} at {} {} (ratio {}), {} matrix/matrices, {} edge(s)",
            sample.formula,
            sample.density,
            args.unit,
            args.ratio,
            args.matrices.len(),
            args.edges.len()
        )),
        None => output::print_info(&format!(
            "Inline mode: {} layer(s), {} edge(s), densities in {}",
            args.layers.len() + args.components.len(),
            args.edges.len(),
            args.unit
        )),
    }

    let request = inline_request(args);

    let format = resolve_format(args);
    let base = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("xascalc.{}", format.extension())));

    let outcome = compute_and_write(
        calculator,
        &request,
        &base,
        &OutputConfig::from_args(args, format),
    )?;
    report(&outcome);
    Ok(())
}

/// 由内联参数构造请求，面密度换算到 g/cm²
fn inline_request(args: &CalcArgs) -> CalcRequest {
    let layer = |formula: &str, density: f64| {
        LayerSpec::new(formula.to_string(), args.unit.to_g_per_cm2(density))
    };

    let mut request = CalcRequest::new(
        args.layers
            .iter()
            .map(|l| layer(&l.formula, l.density))
            .collect(),
        args.edges
            .iter()
            .map(|e| EdgeSpec::new(e.element.clone(), e.edge.clone()))
            .collect(),
    );
    request.sample = args.sample.as_ref().map(|s| {
        SampleSpec::new(s.formula.clone(), args.unit.to_g_per_cm2(s.density), args.ratio)
    });
    request.matrices = args
        .matrices
        .iter()
        .map(|m| MatrixSpec::new(m.formula.clone(), m.ratio))
        .collect();
    request.components = args
        .components
        .iter()
        .map(|c| layer(&c.formula, c.density))
        .collect();
    request.grid = args.grid.apply(&GridConfig::default());
    request
}

/// 批量处理模式
fn execute_batch(args: &CalcArgs, input: &Path, calculator: &Calculator) -> Result<()> {
    output::print_info(&format!("Batch mode: directory '{}'", input.display()));

    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| input.join(DEFAULT_BATCH_DIR));

    let files = FileCollector::new(input.to_path_buf())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .exclude(&output_dir)
        .collect();

    if files.is_empty() {
        output::print_warning(&format!(
            "No matching files found with pattern '{}'",
            args.pattern
        ));
        return Ok(());
    }

    output::print_info(&format!("Found {} request files", files.len()));

    fs::create_dir_all(&output_dir).map_err(|e| XasError::FileWriteError {
        path: output_dir.display().to_string(),
        source: e,
    })?;

    let format = args.format.unwrap_or(CalcOutputFormat::Png);
    output::print_info(&format!("Output format: {:?}", format));

    let config = Arc::new(BatchCalcConfig {
        output_dir: output_dir.clone(),
        grid: args.grid.clone(),
        output: OutputConfig::from_args(args, format),
    });

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!("Using {} parallel jobs", runner.jobs()));
    let result = runner.run(files, |file| process_batch_file(file, &config, calculator))?;

    output::print_separator();
    output::print_success(&format!(
        "Batch complete: {} files ({} done, {} skipped, {} failed)",
        result.total(),
        result.done,
        result.skipped,
        result.failed
    ));
    output::print_info(&format!(
        "Edges: {} computed, {} failed",
        result.edges_computed, result.edges_failed
    ));
    output::print_info(&format!("Results written to '{}'", output_dir.display()));

    for reason in result.skips.iter().take(10) {
        output::print_skip(reason);
    }

    if !result.failures.is_empty() {
        output::print_warning("Failed files:");
        for (path, err) in result.failures.iter().take(10) {
            output::print_error(&format!("  {}: {}", path, err));
        }
        if result.failures.len() > 10 {
            output::print_warning(&format!("  ... and {} more", result.failures.len() - 10));
        }
    }

    Ok(())
}

/// 批量处理配置
struct BatchCalcConfig {
    output_dir: PathBuf,
    grid: GridArgs,
    output: OutputConfig,
}

/// 处理批量模式中的单个请求文件
fn process_batch_file(
    input: &PathBuf,
    config: &Arc<BatchCalcConfig>,
    calculator: &Calculator,
) -> ProcessResult {
    let base = config.output_dir.join(format!(
        "{}.{}",
        file_stem(input),
        config.output.format.extension()
    ));

    let outcome = parsers::parse_request_file(input).and_then(|mut request| {
        request.grid = config.grid.apply(&request.grid);
        compute_and_write(calculator, &request, &base, &config.output)
    });

    match outcome {
        Ok(outcome) if outcome.written.is_empty() && !outcome.skipped.is_empty() => {
            ProcessResult::Skipped(format!(
                "Output exists, skipping: {}",
                outcome.skipped[0].display()
            ))
        }
        Ok(outcome) => {
            let failed_edges = outcome.results.iter().filter(|r| r.error().is_some()).count();
            ProcessResult::Done {
                computed: outcome.results.len() - failed_edges,
                failed_edges,
            }
        }
        Err(e) => ProcessResult::Failed(input.display().to_string(), e.to_string()),
    }
}

/// 计算一个请求并写出结果
fn compute_and_write(
    calculator: &Calculator,
    request: &CalcRequest,
    base: &Path,
    config: &OutputConfig,
) -> Result<Outcome> {
    let response = calculator.respond(request);

    let mut written = Vec::new();
    let mut skipped = Vec::new();

    if config.format == CalcOutputFormat::Json {
        if base.exists() && !config.overwrite {
            skipped.push(base.to_path_buf());
        } else {
            xas::export::response_to_json(&response, base)?;
            written.push(base.to_path_buf());
        }
    }

    let results = match response {
        CalcResponse::Results { results } => results,
        CalcResponse::Error { error } => return Err(XasError::Other(error)),
    };

    if config.format != CalcOutputFormat::Json {
        let multi = request.edges.len() > 1;
        for result in results.iter().filter(|r| r.spectrum().is_some()) {
            let path = if multi {
                edge_output_path(base, result)
            } else {
                base.to_path_buf()
            };
            if path.exists() && !config.overwrite {
                skipped.push(path);
                continue;
            }
            write_curve(result, &path, config)?;
            written.push(path);
        }
    }

    Ok(Outcome {
        results,
        written,
        skipped,
    })
}

/// 写出单个吸收边的曲线
fn write_curve(result: &EdgeResult, path: &Path, config: &OutputConfig) -> Result<()> {
    match config.format {
        CalcOutputFormat::Png | CalcOutputFormat::Svg => xas::plot::generate_edge_plot(
            result,
            path,
            config.title.as_deref(),
            config.width,
            config.height,
            config.format == CalcOutputFormat::Svg,
        ),
        CalcOutputFormat::Csv => xas::export::spectrum_to_csv(result, path),
        CalcOutputFormat::Xy => xas::export::spectrum_to_xy(result, path),
        CalcOutputFormat::Json => Err(XasError::InvalidArgument(
            "JSON output holds the whole response, not a single curve".to_string(),
        )),
    }
}

/// `out/sample.png` -> `out/sample_Fe_K.png`
fn edge_output_path(base: &Path, result: &EdgeResult) -> PathBuf {
    let stem = file_stem(base);
    let name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}_{}.{}", stem, result.element, result.edge_type, ext),
        None => format!("{}_{}_{}", stem, result.element, result.edge_type),
    };
    base.with_file_name(name)
}

fn file_stem(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output")
}

/// 输出格式：显式参数优先，其次按输出文件扩展名推断
fn resolve_format(args: &CalcArgs) -> CalcOutputFormat {
    args.format.unwrap_or_else(|| {
        args.output
            .as_deref()
            .map(guess_format_from_extension)
            .unwrap_or(CalcOutputFormat::Png)
    })
}

/// 从文件扩展名推断输出格式
fn guess_format_from_extension(path: &Path) -> CalcOutputFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("svg") => CalcOutputFormat::Svg,
        Some("csv") => CalcOutputFormat::Csv,
        Some("xy") | Some("dat") | Some("txt") => CalcOutputFormat::Xy,
        Some("json") => CalcOutputFormat::Json,
        _ => CalcOutputFormat::Png,
    }
}

/// 打印单个请求的汇总
fn report(outcome: &Outcome) {
    if let Some(spectrum) = outcome.results.iter().find_map(|r| r.spectrum()) {
        output::print_info(&format!(
            "Sample: {}",
            formula_to_unicode(&spectrum.stack_label)
        ));
    }

    print_result_table(&outcome.results);

    for result in &outcome.results {
        if let Some(error) = result.error() {
            output::print_warning(&format!(
                "{} {}: {}",
                result.element, result.edge_type, error
            ));
        }
        if let Some(spectrum) = result.spectrum() {
            if spectrum.layer_absorption.len() > 1 {
                let by_layer = spectrum
                    .layer_absorption
                    .iter()
                    .enumerate()
                    .map(|(i, tau)| format!("layer {} = {:.3}", i + 1, tau))
                    .collect::<Vec<_>>()
                    .join(", ");
                output::print_info(&format!(
                    "{} {} absorption above edge: {}",
                    result.element, result.edge_type, by_layer
                ));
            }
            for advisory in &spectrum.advisories {
                output::print_hint(&format!(
                    "{} {}: {}",
                    result.element, result.edge_type, advisory
                ));
            }
        }
    }

    for path in &outcome.skipped {
        output::print_skip(&format!("Output exists: '{}'", path.display()));
    }
    for path in &outcome.written {
        output::print_success(&format!("Saved '{}'", path.display()));
    }
}

/// 打印结果表格
fn print_result_table(results: &[EdgeResult]) {
    use tabled::{Table, Tabled};

    #[derive(Tabled)]
    struct EdgeRow {
        #[tabled(rename = "Edge")]
        edge: String,
        #[tabled(rename = "E0 (eV)")]
        edge_value: String,
        #[tabled(rename = "Edge jump")]
        edge_jump: String,
        #[tabled(rename = "Abs max")]
        abs_max: String,
        #[tabled(rename = "Abs min")]
        abs_min: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<EdgeRow> = results
        .iter()
        .map(|r| {
            let edge = format!("{} {}", r.element, r.edge_type);
            match r.spectrum() {
                Some(s) => EdgeRow {
                    edge,
                    edge_value: format!("{:.1}", s.edge_value),
                    edge_jump: format!("{:.3}", s.edge_jump),
                    abs_max: format!("{:.3}", s.abs_max),
                    abs_min: format!("{:.3}", s.abs_min),
                    status: if s.advisories.is_empty() {
                        "good".to_string()
                    } else {
                        s.advisories
                            .iter()
                            .map(|a| a.to_string())
                            .collect::<Vec<_>>()
                            .join("; ")
                    },
                },
                None => EdgeRow {
                    edge,
                    edge_value: "-".to_string(),
                    edge_jump: "-".to_string(),
                    abs_max: "-".to_string(),
                    abs_min: "-".to_string(),
                    status: "failed".to_string(),
                },
            }
        })
        .collect();

    if !rows.is_empty() {
        output::print_header(&format!("Results for {} edge(s)", rows.len()));
        println!("{}", Table::new(&rows));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::calc::{DensityUnit, LayerArg, MatrixArg};

    fn calculator(serial: bool) -> Calculator {
        XasCalculator::new(default_provider(serial).unwrap())
    }

    fn config(format: CalcOutputFormat) -> OutputConfig {
        OutputConfig {
            format,
            width: 800,
            height: 600,
            title: None,
            overwrite: false,
        }
    }

    fn request(edges: &[(&str, &str)]) -> CalcRequest {
        CalcRequest::new(
            vec![LayerSpec::new("Fe2O3", 0.005), LayerSpec::new("BN", 0.1)],
            edges.iter().map(|(e, k)| EdgeSpec::new(*e, *k)).collect(),
        )
    }

    fn inline_args() -> CalcArgs {
        CalcArgs {
            input: None,
            layers: vec![],
            edges: vec![],
            sample: None,
            ratio: 1.0,
            matrices: vec![],
            components: vec![],
            unit: DensityUnit::Mg,
            serial_lookups: false,
            output: None,
            format: None,
            width: 800,
            height: 600,
            title: None,
            grid: GridArgs::default(),
            pattern: "*.json".to_string(),
            jobs: 0,
            recursive: false,
            overwrite: false,
        }
    }

    #[test]
    fn test_guess_format_from_extension() {
        assert_eq!(guess_format_from_extension(Path::new("a.SVG")), CalcOutputFormat::Svg);
        assert_eq!(guess_format_from_extension(Path::new("a.json")), CalcOutputFormat::Json);
        assert_eq!(guess_format_from_extension(Path::new("a.dat")), CalcOutputFormat::Xy);
        assert_eq!(guess_format_from_extension(Path::new("a")), CalcOutputFormat::Png);
    }

    #[test]
    fn test_edge_output_path() {
        let result = EdgeResult::failed("Fe", "K", "unused");
        assert_eq!(
            edge_output_path(Path::new("out/sample.csv"), &result),
            PathBuf::from("out/sample_Fe_K.csv")
        );
    }

    #[test]
    fn test_inline_layers_converted_to_grams() {
        let mut args = inline_args();
        args.layers = vec![LayerArg {
            formula: "Fe2O3".to_string(),
            density: 5.0,
        }];
        args.grid.step = Some(2.0);

        let request = inline_request(&args);
        assert_eq!(request.layers, vec![LayerSpec::new("Fe2O3", 0.005)]);
        assert!(request.sample.is_none());
        assert_eq!(request.grid.step, 2.0);
    }

    #[test]
    fn test_inline_pellet_request() {
        let mut args = inline_args();
        args.sample = Some(LayerArg {
            formula: "Fe2O3".to_string(),
            density: 100.0,
        });
        args.ratio = 0.05;
        args.matrices = vec![MatrixArg {
            formula: "BN".to_string(),
            ratio: None,
        }];
        args.components = vec![LayerArg {
            formula: "C".to_string(),
            density: 2.0,
        }];
        args.edges = vec![crate::cli::calc::EdgeArg {
            element: "Fe".to_string(),
            edge: "K".to_string(),
        }];

        let request = inline_request(&args);
        let sample = request.sample.as_ref().unwrap();
        assert_eq!(sample.total_density_g_per_cm2, 0.1);
        assert_eq!(sample.ratio, 0.05);

        let stack = request.stack().unwrap();
        let formulas: Vec<&str> = stack.iter().map(|l| l.formula.as_str()).collect();
        assert_eq!(formulas, vec!["Fe2O3", "BN", "C"]);
        assert!((stack[0].area_density_g_per_cm2 - 0.005).abs() < 1e-12);
        assert!((stack[1].area_density_g_per_cm2 - 0.095).abs() < 1e-12);
        assert!((stack[2].area_density_g_per_cm2 - 0.002).abs() < 1e-12);

        let dir = tempfile::tempdir().unwrap();
        let outcome = compute_and_write(
            &calculator(false),
            &request,
            &dir.path().join("pellet.csv"),
            &config(CalcOutputFormat::Csv),
        )
        .unwrap();
        assert!(outcome.results[0].spectrum().is_some());
    }

    #[test]
    fn test_serial_lookups_give_same_results() {
        let edges = [("Fe", "K"), ("O", "K")];
        let direct = calculator(false).respond(&request(&edges));
        let serial = calculator(true).respond(&request(&edges));
        assert_eq!(direct, serial);
    }

    #[test]
    fn test_multi_edge_csv_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("fe.csv");
        let outcome = compute_and_write(
            &calculator(false),
            &request(&[("Fe", "K"), ("Fe", "M5"), ("O", "K")]),
            &base,
            &config(CalcOutputFormat::Csv),
        )
        .unwrap();

        assert_eq!(outcome.results.len(), 3);
        assert_eq!(
            outcome.written,
            vec![dir.path().join("fe_Fe_K.csv"), dir.path().join("fe_O_K.csv")]
        );
        assert!(!base.exists());
    }

    #[test]
    fn test_single_edge_uses_base_path_and_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("fe.xy");
        let calc = calculator(false);

        let first = compute_and_write(
            &calc,
            &request(&[("Fe", "K")]),
            &base,
            &config(CalcOutputFormat::Xy),
        )
        .unwrap();
        assert_eq!(first.written, vec![base.clone()]);

        let second = compute_and_write(
            &calc,
            &request(&[("Fe", "K")]),
            &base,
            &config(CalcOutputFormat::Xy),
        )
        .unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.skipped, vec![base]);
    }

    #[test]
    fn test_json_written_for_rejected_request() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("bad.json");
        let mut bad = request(&[("Fe", "K")]);
        bad.layers.clear();

        let result = compute_and_write(
            &calculator(false),
            &bad,
            &base,
            &config(CalcOutputFormat::Json),
        );
        assert!(result.is_err());

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&base).unwrap()).unwrap();
        assert!(value["error"].as_str().unwrap().contains("layer"));
    }

    #[test]
    fn test_batch_file_processing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sample.json");
        fs::write(
            &input,
            r#"{ "compounds": [{ "compound": "CuO", "area_density": 0.01 }],
                 "edges": [{ "element": "Cu", "edge": "K" }, { "element": "Li", "edge": "L3" }] }"#,
        )
        .unwrap();
        let config = Arc::new(BatchCalcConfig {
            output_dir: dir.path().join("out"),
            grid: GridArgs {
                step: Some(2.0),
                ..GridArgs::default()
            },
            output: config(CalcOutputFormat::Json),
        });
        fs::create_dir_all(&config.output_dir).unwrap();
        let calc = calculator(false);

        match process_batch_file(&input, &config, &calc) {
            ProcessResult::Done {
                computed,
                failed_edges,
                ..
            } => {
                assert_eq!(computed, 1);
                assert_eq!(failed_edges, 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(config.output_dir.join("sample.json").exists());

        match process_batch_file(&input, &config, &calc) {
            ProcessResult::Skipped(reason) => assert!(reason.contains("sample.json"), "{}", reason),
            other => panic!("expected skip, got {:?}", other),
        }
    }
}
