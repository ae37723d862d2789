//! # elements 子命令 CLI 定义
//!
//! 列出可选元素（原子序数与符号），供前端或脚本构建下拉列表。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/elements.rs`

use clap::Args;

/// elements 子命令参数
#[derive(Args, Debug)]
pub struct ElementsArgs {
    /// Print the catalog as JSON instead of a table
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
