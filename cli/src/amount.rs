//! MicroAlgo amounts and conversion to and from whole ALGO.

use std::fmt;

use anyhow::{bail, Result};

/// 1 ALGO = 1 000 000 microAlgos.
pub const MICROALGOS_PER_ALGO: u64 = 1_000_000;

/// An amount in the ledger's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MicroAlgos(pub u64);

impl MicroAlgos {
    pub const ZERO: MicroAlgos = MicroAlgos(0);

    /// Convert a decimal ALGO amount, rounding to the nearest microAlgo.
    ///
    /// # Errors
    /// Negative, NaN, infinite, or too large to fit in a `u64`.
    pub fn from_algos(algos: f64) -> Result<Self> {
        if !algos.is_finite() {
            bail!("Amount must be a finite number, got {}", algos);
        }
        if algos < 0.0 {
            bail!("Amount must be non-negative, got {}", algos);
        }
        let micro = (algos * MICROALGOS_PER_ALGO as f64).round();
        if micro >= u64::MAX as f64 {
            bail!("Amount {} ALGO overflows a microAlgo count", algos);
        }
        Ok(MicroAlgos(micro as u64))
    }

    pub fn to_algos(self) -> f64 {
        self.0 as f64 / MICROALGOS_PER_ALGO as f64
    }

    pub fn checked_add(self, other: MicroAlgos) -> Option<MicroAlgos> {
        self.0.checked_add(other.0).map(MicroAlgos)
    }
}

impl fmt::Display for MicroAlgos {
    /// Renders as whole ALGO with six decimals, e.g. `"5.000000 ALGO"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:06} ALGO",
            self.0 / MICROALGOS_PER_ALGO,
            self.0 % MICROALGOS_PER_ALGO
        )
    }
}

/// Scale a base-unit asset amount by the asset's `decimals`.
pub fn scale_asset_amount(base_units: u64, decimals: u32) -> f64 {
    base_units as f64 / 10f64.powi(decimals as i32)
}
