//! # Point Evaluation
//!
//! Turns one position into one scalar per dataset. The position is sampled
//! at every octave of the scale factor: first at coarser resolutions
//! (`position / F^k`) while the power does not exceed the position, then at
//! finer resolutions (`position * F^k`) until the running sum stops growing.
//!
//! ## Sampling
//! Each sample wraps a scaled position into the 384-entry dataset using the
//! IEEE remainder (round-half-to-even quotient), so the wrapped index lies in
//! `[-192, 192]` before taking its absolute value. Fractional positions are
//! linearly interpolated between neighboring entries.
//!
//! ## Numeric Behavior
//! No special float values are filtered. A NaN position yields a NaN result,
//! and a descending phase that never converges is cut off silently at
//! [`CONVERGENCE_CEILING`] iterations or the end of the power table.

use thiserror::Error;

use crate::datasets::{DatasetTable, WaveType, SET_COUNT, SET_SIZE};
use crate::powers::PowerTable;

/// Hard upper bound on descending-phase iterations per evaluated point.
pub const CONVERGENCE_CEILING: usize = 1_000_002;

/// Power index the final sum is normalized by (`F^3`).
const NORMALIZATION_POWER: usize = 3;

/// Failures while evaluating a single point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// The ascending phase ran past the last entry of the power table
    #[error("position {position} exceeds the largest power in the table")]
    PositionOutOfRange { position: f64 },
}

/// Result of a single evaluation with its loop counters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    /// Terms added while sampling coarser octaves
    pub ascending_terms: usize,
    /// Terms added while sampling finer octaves
    pub descending_terms: usize,
    /// True when the descending phase hit its bound before converging
    pub truncated: bool,
}

/// Exact IEEE 754 remainder of `x / y`, with the quotient rounded half to even.
fn ieee_remainder(x: f64, y: f64) -> f64 {
    let regular = x % y;
    if regular.is_nan() {
        return f64::NAN;
    }
    if regular == 0.0 && x.is_sign_negative() {
        return -0.0;
    }

    let alternative = regular - y.abs() * x.signum();
    if alternative.abs() == regular.abs() {
        let quotient = x / y;
        if quotient.round_ties_even().abs() > quotient.abs() {
            return alternative;
        }
        return regular;
    }

    if alternative.abs() < regular.abs() {
        alternative
    } else {
        regular
    }
}

/// Interpolated lookup of `y` in one dataset.
pub fn sample(y: f64, set: &[i32; SET_SIZE]) -> f64 {
    let size = SET_SIZE as i32;
    // Saturating cast; a NaN remainder lands on index 0.
    let i = ieee_remainder(y, f64::from(size)) as i32;
    let j = (i + 1) % size;
    let frac = y - y.floor();

    let lower = f64::from(set[i.unsigned_abs() as usize]);
    if frac == 0.0 {
        return lower;
    }
    let upper = f64::from(set[j.unsigned_abs() as usize]);
    (upper - lower) * frac + lower
}

/// Evaluates positions against a dataset table with one scale factor.
#[derive(Clone, Copy, Debug)]
pub struct PointEvaluator<'a> {
    powers: &'a PowerTable,
    table: &'a DatasetTable,
}

impl<'a> PointEvaluator<'a> {
    pub fn new(powers: &'a PowerTable, table: &'a DatasetTable) -> Self {
        Self { powers, table }
    }

    /// Scalar value of `position` for one dataset.
    pub fn evaluate(&self, position: f64, wave: WaveType) -> Result<f64, EvaluationError> {
        self.evaluate_detailed(position, wave).map(|e| e.value)
    }

    /// Like [`evaluate`](Self::evaluate), but also reports how many terms each
    /// phase contributed and whether the descending phase was cut off.
    pub fn evaluate_detailed(
        &self,
        position: f64,
        wave: WaveType,
    ) -> Result<Evaluation, EvaluationError> {
        let set = self.table.get(wave);
        let powers = self.powers;

        if position == 0.0 {
            return Ok(Evaluation {
                value: 0.0,
                ascending_terms: 0,
                descending_terms: 0,
                truncated: false,
            });
        }

        let mut current_sum = 0.0;

        // Ascending phase: coarser octaves while F^k <= position.
        let mut index = 0;
        loop {
            let power = powers
                .get(index)
                .ok_or(EvaluationError::PositionOutOfRange { position })?;
            if !(position >= power) {
                break;
            }
            current_sum += sample(position / power, set) * power;
            index += 1;
        }
        let ascending_terms = index;

        // Descending phase: finer octaves until the sum stops growing.
        let limit = CONVERGENCE_CEILING.min(powers.len() - 1);
        let mut index = 0;
        let mut truncated = false;
        loop {
            index += 1;
            if index > limit {
                truncated = true;
                index -= 1;
                break;
            }
            let power = powers[index];
            let last_sum = current_sum;
            current_sum += sample(position * power, set) / power;
            if !(current_sum == 0.0 || current_sum > last_sum) {
                break;
            }
        }

        Ok(Evaluation {
            value: current_sum / powers[NORMALIZATION_POWER],
            ascending_terms,
            descending_terms: index,
            truncated,
        })
    }

    /// One value per dataset, in [`WaveType::ALL`] order.
    pub fn evaluate_all(&self, position: f64) -> Result<[f64; SET_COUNT], EvaluationError> {
        let mut values = [0.0; SET_COUNT];
        for wave in WaveType::ALL {
            values[wave.index()] = self.evaluate(position, wave)?;
        }
        Ok(values)
    }
}
