//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `calc`: 计算样品片的吸收曲线与吸收边跳跃
//! - `scan`: 扫描稀释比例与面密度，找出合适的压片配方
//! - `elements`: 列出元素目录
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: calc, scan, elements

pub mod calc;
pub mod elements;
pub mod scan;

use clap::{Parser, Subcommand};

/// xascalc - XAS 透射样品规划工具
#[derive(Parser)]
#[command(name = "xascalc")]
#[command(author = "xascalc contributors")]
#[command(version)]
#[command(about = "Plan transmission XAS samples: absorption, edge jump and transmission", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Calculate absorption curves and edge jumps for a layered sample
    Calc(calc::CalcArgs),

    /// Scan active-material ratio and pellet density for acceptable edge jumps
    Scan(scan::ScanArgs),

    /// List selectable elements (atomic number and symbol)
    Elements(elements::ElementsArgs),
}
