//! # Power Table
//!
//! Successive powers of the scale factor. The evaluator walks this table in
//! both directions: dividing the position by `F^k` to sample coarser octaves
//! and multiplying by `F^k` to sample finer ones.
//!
//! The table is built once per sequencer and never mutated. For very large
//! scale factors the upper entries overflow to `+inf`; that is left as-is so
//! the numeric output matches the reference series exactly.

/// Number of entries in every power table.
pub const POWER_COUNT: usize = 64;

/// Ordered powers `F^0 ..= F^63` of a scale factor `F`.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerTable {
    powers: [f64; POWER_COUNT],
}

impl PowerTable {
    /// Build the table for `scale_factor`.
    ///
    /// Callers must reject non-positive factors before getting here; a factor
    /// of 0 or 1 yields a degenerate table rather than an error.
    pub fn build(scale_factor: u32) -> Self {
        let factor = f64::from(scale_factor);
        let mut powers = [0.0; POWER_COUNT];
        powers[0] = 1.0;
        for index in 1..POWER_COUNT {
            powers[index] = factor * powers[index - 1];
        }
        Self { powers }
    }

    /// `F^index`, or `None` past the end of the table.
    #[inline]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.powers.get(index).copied()
    }

    pub fn len(&self) -> usize {
        POWER_COUNT
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.powers
    }
}

impl std::ops::Index<usize> for PowerTable {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.powers[index]
    }
}
