//! # xascalc - XAS 透射样品规划工具
//!
//! 根据样品片各层的化学式和面密度，计算目标吸收边附近的吸收曲线、
//! 吸收边跳跃和透过率，用于选择合适的样品用量。
//!
//! ## 子命令
//! - `calc`     - 计算吸收曲线与吸收边跳跃（单文件 / 批量目录 / 内联参数）
//! - `scan`     - 扫描稀释比例 × 面密度，输出可接受配方热图
//! - `elements` - 列出元素目录
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   │     ├── parsers/   (化学式与请求文件解析)
//!   │     ├── xas/       (衰减计算、绘图、导出)
//!   │     ├── batch/     (批量并行处理)
//!   │     └── models/    (数据模型)
//!   ├── utils/      (工具函数)
//!   └── error.rs    (错误处理)
//! ```

mod batch;
mod cli;
mod commands;
mod error;
mod models;
mod parsers;
mod utils;
mod xas;

use clap::Parser;
use cli::Cli;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
