use crate::error::ConfigError;
use crate::group::ModuloOperations;
use log::debug;
use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Memory/speed trade-off of the fixed-base exponentiation table.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PowRadixStyle {
    NoAcceleration,
    LowMemoryUse,
    HighMemoryUse,
    ExtremeMemoryUse,
}

impl PowRadixStyle {
    /// Number of exponent bits handled per table row.
    pub fn bits_per_slice(&self) -> usize {
        match self {
            PowRadixStyle::NoAcceleration => 0,
            PowRadixStyle::LowMemoryUse => 8,
            PowRadixStyle::HighMemoryUse => 12,
            PowRadixStyle::ExtremeMemoryUse => 16,
        }
    }
}

impl Default for PowRadixStyle {
    fn default() -> Self {
        PowRadixStyle::LowMemoryUse
    }
}

impl FromStr for PowRadixStyle {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "no_acceleration" | "noacceleration" => Ok(PowRadixStyle::NoAcceleration),
            "low_memory_use" | "lowmemoryuse" => Ok(PowRadixStyle::LowMemoryUse),
            "high_memory_use" | "highmemoryuse" => Ok(PowRadixStyle::HighMemoryUse),
            "extreme_memory_use" | "extrememoryuse" => Ok(PowRadixStyle::ExtremeMemoryUse),
            _ => Err(ConfigError::UnknownPowRadixStyle(s.to_string())),
        }
    }
}

/// Precomputed powers of a fixed base.
///
/// Row `i`, column `j` holds `basis^(j * 2^(k*i)) mod modulus` where `k` is
/// the slice width, so an exponent is applied one k-bit digit at a time with
/// a single multiplication per non-zero digit.
#[derive(Clone, Debug)]
pub struct PowRadix {
    basis: BigUint,
    modulus: BigUint,
    bits_per_slice: usize,
    table: Vec<Vec<BigUint>>,
}

impl PowRadix {
    /// Builds the table for exponents of up to `exponent_bits` bits.
    ///
    /// ## Arguments
    ///
    /// * `basis` - the fixed base
    /// * `modulus` - the modulus of the group
    /// * `exponent_bits` - bit length of the largest supported exponent
    /// * `style` - the table size
    pub fn new(basis: &BigUint, modulus: &BigUint, exponent_bits: u64, style: PowRadixStyle) -> Self {
        let k = style.bits_per_slice();
        let mut table = Vec::new();

        if k > 0 {
            let rows = ((exponent_bits as usize) + k - 1) / k;
            let columns = 1usize << k;
            table.reserve_exact(rows);

            // row_basis = basis^(2^(k*i))
            let mut row_basis = basis % modulus;
            for _ in 0..rows {
                let mut row = Vec::with_capacity(columns);
                let mut running = BigUint::one();
                for _ in 0..columns {
                    row.push(running.clone());
                    running = running.modmul(&row_basis, modulus);
                }
                table.push(row);
                row_basis = running;
            }
            debug!("built pow radix table: {} rows x {} columns", rows, columns);
        }

        PowRadix {
            basis: basis.clone(),
            modulus: modulus.clone(),
            bits_per_slice: k,
            table,
        }
    }

    pub fn basis(&self) -> &BigUint {
        &self.basis
    }

    /// Returns basis^exponent mod modulus.
    ///
    /// Exponents wider than the table fall back to plain modular exponentiation.
    pub fn pow(&self, exponent: &BigUint) -> BigUint {
        let k = self.bits_per_slice;
        if k == 0 || exponent.bits() > (self.table.len() * k) as u64 {
            return self.basis.modpow(exponent, &self.modulus);
        }

        let mut y = BigUint::one();
        for (i, row) in self.table.iter().enumerate() {
            let digit = Self::digit(exponent, i * k, k);
            if digit != 0 {
                y = y.modmul(&row[digit], &self.modulus);
            }
        }
        y % &self.modulus
    }

    fn digit(exponent: &BigUint, offset: usize, width: usize) -> usize {
        (0..width).fold(0usize, |acc, j| {
            if exponent.bit((offset + j) as u64) {
                acc | (1 << j)
            } else {
                acc
            }
        })
    }
}
