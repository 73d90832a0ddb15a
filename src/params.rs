//! # Wave Parameters
//!
//! Validated, normalized inputs for one wave. Construction is the only place
//! parameters are checked; a [`WaveParams`] that exists is always usable.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use thiserror::Error;

/// Smallest accepted scale factor.
pub const MIN_SCALE_FACTOR: i64 = 2;

/// Largest accepted scale factor.
pub const MAX_SCALE_FACTOR: i64 = 10_000;

pub const DEFAULT_DAYS_BEFORE: f64 = 31.0;
pub const DEFAULT_DAYS_AFTER: f64 = 0.01;
pub const DEFAULT_STEP_MINUTES: f64 = 60.0;
pub const DEFAULT_SCALE_FACTOR: i64 = 64;

const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Rejected construction inputs. Nothing is mutated when one is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("days before target must be a positive number, got {0}")]
    DaysBefore(f64),

    #[error("days after target cannot be negative, got {0}")]
    DaysAfter(f64),

    #[error("time interval must be a positive number of minutes, got {0}")]
    StepMinutes(f64),

    /// The step is below the resolution of the starting position
    #[error("time interval of {0} minutes is too small to advance from the starting position")]
    StepTooSmall(f64),

    #[error("the wave factor must be an integer within {min} - {max}, got {0}", min = MIN_SCALE_FACTOR, max = MAX_SCALE_FACTOR)]
    ScaleFactor(i64),
}

/// Normalized inputs for a [`WaveSequencer`](crate::sequencer::WaveSequencer).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WaveParams {
    singularity: f64,
    bailout: f64,
    step: f64,
    scale_factor: u32,
}

impl WaveParams {
    /// Validate and normalize the four construction inputs.
    ///
    /// `step_minutes` is converted to a fraction of a day. `days_after` is
    /// stored negated as the bailout offset, which generation does not use yet.
    pub fn new(
        days_before: f64,
        days_after: f64,
        step_minutes: f64,
        scale_factor: i64,
    ) -> Result<Self, ParameterError> {
        if !(days_before.is_finite() && days_before > 0.0) {
            return Err(ParameterError::DaysBefore(days_before));
        }
        if !(days_after.is_finite() && days_after >= 0.0) {
            return Err(ParameterError::DaysAfter(days_after));
        }
        if !(step_minutes.is_finite() && step_minutes > 0.0) {
            return Err(ParameterError::StepMinutes(step_minutes));
        }
        if !(MIN_SCALE_FACTOR..=MAX_SCALE_FACTOR).contains(&scale_factor) {
            return Err(ParameterError::ScaleFactor(scale_factor));
        }

        let step = step_minutes / MINUTES_PER_HOUR / HOURS_PER_DAY;
        if days_before - step >= days_before {
            return Err(ParameterError::StepTooSmall(step_minutes));
        }

        Ok(Self {
            singularity: days_before,
            bailout: -days_after,
            step,
            // Range-checked above.
            scale_factor: scale_factor as u32,
        })
    }

    /// Starting position in days before the target.
    pub fn singularity(&self) -> f64 {
        self.singularity
    }

    /// Negated days-after-target offset. Stored only; see DESIGN.md.
    pub fn bailout(&self) -> f64 {
        self.bailout
    }

    /// Step size as a fraction of a day.
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn scale_factor(&self) -> u32 {
        self.scale_factor
    }

    /// Number of points a full run emits.
    pub fn point_count(&self) -> u64 {
        let mut count = (self.singularity / self.step).floor() as u64;
        while self.singularity - count as f64 * self.step > 0.0 {
            count += 1;
        }
        while count > 0 && self.singularity - (count - 1) as f64 * self.step <= 0.0 {
            count -= 1;
        }
        count
    }
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            singularity: DEFAULT_DAYS_BEFORE,
            bailout: -DEFAULT_DAYS_AFTER,
            step: DEFAULT_STEP_MINUTES / MINUTES_PER_HOUR / HOURS_PER_DAY,
            scale_factor: DEFAULT_SCALE_FACTOR as u32,
        }
    }
}

/// Fractional days from `now` until local midnight at the start of `target`.
///
/// Negative when the target has already passed.
pub fn days_until(target: NaiveDate, now: NaiveDateTime) -> f64 {
    let delta = target.and_time(NaiveTime::MIN) - now;
    delta.num_milliseconds() as f64 / 86_400_000.0
}
