//! # 截面数据提供者
//!
//! 核心计算只依赖三个元素物理量查询：
//! - 质量衰减系数 μ/ρ (cm²/g)
//! - 吸收边能量 (eV)
//! - 原子量 (g/mol)
//!
//! 任何实现 [`CrossSectionProvider`] 的数据源都可以替换默认实现。
//!
//! ## 默认数据源
//! [`XrayDbProvider`] 使用 `xraydb` 内嵌的 XrayDB 数据：
//! - μ/ρ：Elam 总截面（光电吸收 + 相干 + 非相干散射）
//! - 吸收边能量与原子量：XrayDB 元素表
//!
//! Elam 表覆盖 100 eV - 800 keV。`xraydb` 对表外能量做端点截断，
//! 这里在查询前拒绝表外能量，返回 `EnergyOutOfRange`。
//!
//! ## 线程安全
//! 不可重入的数据源须用 [`SerializedProvider`] 包装，
//! 所有查询经由同一个进程级互斥锁串行执行。
//!
//! ## 依赖关系
//! - 被 `xas/attenuation.rs`, `xas/edge.rs`, `commands/` 调用
//! - 使用 `xas/elements.rs` 识别元素符号
//! - 使用 `xraydb` 查询截面数据

use crate::error::{Result, XasError};
use crate::models::EdgeType;
use crate::xas::elements;

use std::sync::{LazyLock, Mutex};
use xraydb::{CrossSectionKind, XrayDb, XrayDbError, ELAM_ENERGY_MAX, ELAM_ENERGY_MIN};

/// 支持的最低能量 (eV)
pub const MIN_ENERGY: f64 = ELAM_ENERGY_MIN;
/// 支持的最高能量 (eV)
pub const MAX_ENERGY: f64 = ELAM_ENERGY_MAX;

/// 元素物理数据源
pub trait CrossSectionProvider: Send + Sync {
    /// 质量衰减系数 (cm²/g)
    fn mass_attenuation(&self, element: &str, energy: f64) -> Result<f64>;

    /// 一组能量上的质量衰减系数，默认逐点查询
    fn mass_attenuation_curve(&self, element: &str, energies: &[f64]) -> Result<Vec<f64>> {
        energies
            .iter()
            .map(|&energy| self.mass_attenuation(element, energy))
            .collect()
    }

    /// 吸收边能量 (eV)
    fn edge_energy(&self, element: &str, edge: EdgeType) -> Result<f64>;

    /// 原子量 (g/mol)
    fn atomic_weight(&self, element: &str) -> Result<f64>;
}

impl<P: CrossSectionProvider + ?Sized> CrossSectionProvider for Box<P> {
    fn mass_attenuation(&self, element: &str, energy: f64) -> Result<f64> {
        (**self).mass_attenuation(element, energy)
    }

    fn mass_attenuation_curve(&self, element: &str, energies: &[f64]) -> Result<Vec<f64>> {
        (**self).mass_attenuation_curve(element, energies)
    }

    fn edge_energy(&self, element: &str, edge: EdgeType) -> Result<f64> {
        (**self).edge_energy(element, edge)
    }

    fn atomic_weight(&self, element: &str) -> Result<f64> {
        (**self).atomic_weight(element)
    }
}

/// XrayDB 数据源
#[derive(Debug, Clone, Copy)]
pub struct XrayDbProvider {
    db: XrayDb,
}

impl XrayDbProvider {
    /// 打开内嵌数据库（首次调用时解压）
    pub fn new() -> Result<Self> {
        XrayDb::try_new()
            .map(|db| XrayDbProvider { db })
            .map_err(|e| XasError::ComputationError(format!("failed to load X-ray database: {}", e)))
    }

    /// 只接受标准写法的元素符号
    fn symbol(element: &str) -> Result<&'static str> {
        elements::lookup(element).ok_or_else(|| XasError::UnknownElement(element.to_string()))
    }
}

fn check_energy(energy: f64) -> Result<()> {
    if energy.is_finite() && (MIN_ENERGY..=MAX_ENERGY).contains(&energy) {
        Ok(())
    } else {
        Err(XasError::EnergyOutOfRange {
            energy,
            min: MIN_ENERGY,
            max: MAX_ENERGY,
        })
    }
}

fn map_db_error(err: XrayDbError) -> XasError {
    match err {
        XrayDbError::UnknownElement(element) => XasError::UnknownElement(element),
        XrayDbError::UnknownEdge { element, edge, .. } => XasError::UnknownEdge { element, edge },
        other => XasError::ComputationError(other.to_string()),
    }
}

impl CrossSectionProvider for XrayDbProvider {
    fn mass_attenuation(&self, element: &str, energy: f64) -> Result<f64> {
        let symbol = Self::symbol(element)?;
        check_energy(energy)?;
        self.db
            .mu_elam_at(symbol, energy, CrossSectionKind::Total)
            .map_err(map_db_error)
    }

    fn mass_attenuation_curve(&self, element: &str, energies: &[f64]) -> Result<Vec<f64>> {
        let symbol = Self::symbol(element)?;
        for &energy in energies {
            check_energy(energy)?;
        }
        self.db
            .mu_elam(symbol, energies, CrossSectionKind::Total)
            .map_err(map_db_error)
    }

    fn edge_energy(&self, element: &str, edge: EdgeType) -> Result<f64> {
        let symbol = Self::symbol(element)?;
        let energy = self
            .db
            .xray_edge(symbol, edge.label())
            .map_err(map_db_error)?
            .energy;
        if energy > 0.0 {
            Ok(energy)
        } else {
            Err(XasError::UnknownEdge {
                element: symbol.to_string(),
                edge: edge.to_string(),
            })
        }
    }

    fn atomic_weight(&self, element: &str) -> Result<f64> {
        let symbol = Self::symbol(element)?;
        self.db.molar_mass(symbol).map_err(map_db_error)
    }
}

/// 进程级串行访问门
static PROVIDER_GATE: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// 串行化包装：所有实例共享同一把锁
#[derive(Debug, Clone)]
pub struct SerializedProvider<P> {
    inner: P,
}

impl<P: CrossSectionProvider> SerializedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    fn gated<T>(&self, f: impl FnOnce(&P) -> T) -> T {
        // 锁被毒化时数据源本身无状态可损坏，直接继续使用
        let _guard = PROVIDER_GATE
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&self.inner)
    }
}

impl<P: CrossSectionProvider> CrossSectionProvider for SerializedProvider<P> {
    fn mass_attenuation(&self, element: &str, energy: f64) -> Result<f64> {
        self.gated(|p| p.mass_attenuation(element, energy))
    }

    fn mass_attenuation_curve(&self, element: &str, energies: &[f64]) -> Result<Vec<f64>> {
        self.gated(|p| p.mass_attenuation_curve(element, energies))
    }

    fn edge_energy(&self, element: &str, edge: EdgeType) -> Result<f64> {
        self.gated(|p| p.edge_energy(element, edge))
    }

    fn atomic_weight(&self, element: &str) -> Result<f64> {
        self.gated(|p| p.atomic_weight(element))
    }
}

/// 命令层使用的数据源，`serial` 为真时经由进程级锁串行查询
pub fn default_provider(serial: bool) -> Result<Box<dyn CrossSectionProvider>> {
    let provider = XrayDbProvider::new()?;
    if serial {
        Ok(Box::new(SerializedProvider::new(provider)))
    } else {
        Ok(Box::new(provider))
    }
}
