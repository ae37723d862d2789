//! # elements 子命令实现
//!
//! 输出元素目录：表格（含原子量和吸收边能量）或 JSON 列表 `[{symbol, atomic_number}]`。
//!
//! ## 依赖关系
//! - 使用 `cli/elements.rs` 定义的 ElementsArgs
//! - 使用 `xas/elements.rs` 的符号表
//! - 使用 `xas/provider.rs` 查询原子量和吸收边能量

use crate::cli::elements::ElementsArgs;
use crate::error::Result;
use crate::models::EdgeType;
use crate::utils::output;
use crate::xas::elements::SYMBOLS;
use crate::xas::{CrossSectionProvider, XrayDbProvider};

use serde::Serialize;
use tabled::{Table, Tabled};

/// 元素目录条目
#[derive(Debug, Serialize, PartialEq)]
struct CatalogEntry {
    symbol: &'static str,
    atomic_number: u32,
}

/// 执行 elements 命令
pub fn execute(args: ElementsArgs) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog())?);
        return Ok(());
    }

    let provider = XrayDbProvider::new()?;
    let rows = catalog()
        .iter()
        .map(|entry| element_row(&provider, entry))
        .collect::<Result<Vec<_>>>()?;

    output::print_header(&format!("Element Catalog ({} elements)", rows.len()));
    println!("{}", Table::new(rows));
    Ok(())
}

/// 按原子序数排序的目录
fn catalog() -> Vec<CatalogEntry> {
    SYMBOLS
        .iter()
        .zip(1..)
        .map(|(&symbol, atomic_number)| CatalogEntry {
            symbol,
            atomic_number,
        })
        .collect()
}

#[derive(Tabled)]
struct ElementRow {
    #[tabled(rename = "Z")]
    z: u32,
    #[tabled(rename = "Symbol")]
    symbol: &'static str,
    #[tabled(rename = "A (g/mol)")]
    weight: String,
    #[tabled(rename = "K (eV)")]
    k: String,
    #[tabled(rename = "L1 (eV)")]
    l1: String,
    #[tabled(rename = "L2 (eV)")]
    l2: String,
    #[tabled(rename = "L3 (eV)")]
    l3: String,
}

/// 没有的吸收边显示为 "-"
fn element_row<P: CrossSectionProvider>(provider: &P, entry: &CatalogEntry) -> Result<ElementRow> {
    let edge = |t: EdgeType| {
        provider
            .edge_energy(entry.symbol, t)
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|_| "-".to_string())
    };
    Ok(ElementRow {
        z: entry.atomic_number,
        symbol: entry.symbol,
        weight: format!("{:.3}", provider.atomic_weight(entry.symbol)?),
        k: edge(EdgeType::K),
        l1: edge(EdgeType::L1),
        l2: edge(EdgeType::L2),
        l3: edge(EdgeType::L3),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_order_and_shape() {
        let entries = catalog();
        assert_eq!(entries.len(), 98);
        assert_eq!(
            entries[0],
            CatalogEntry {
                symbol: "H",
                atomic_number: 1
            }
        );
        assert!(entries.windows(2).all(|w| w[0].atomic_number + 1 == w[1].atomic_number));

        let json = serde_json::to_value(&entries[25]).unwrap();
        assert_eq!(json, serde_json::json!({ "symbol": "Fe", "atomic_number": 26 }));
    }

    #[test]
    fn test_row_marks_missing_edges() {
        let provider = XrayDbProvider::new().unwrap();
        let li = CatalogEntry {
            symbol: "Li",
            atomic_number: 3,
        };
        let row = element_row(&provider, &li).unwrap();
        assert_eq!(row.k, "54.7");
        assert_eq!(row.weight, "6.940");
        assert_eq!(row.l3, "-");
    }

    #[test]
    fn test_every_catalog_element_has_a_row() {
        let provider = XrayDbProvider::new().unwrap();
        let rows: Vec<ElementRow> = catalog()
            .iter()
            .map(|entry| element_row(&provider, entry).unwrap())
            .collect();
        assert_eq!(rows[25].k, "7112.0");
        assert_eq!(rows[81].l3, "13035.0");
        assert_eq!(rows[97].symbol, "Cf");
    }
}
