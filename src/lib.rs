//! # Omniwave Core Library
//!
//! Computes a deterministic "timewave": a series of composite points walking
//! backward from a starting offset (days before a target) toward zero. Each
//! point carries one scalar per dataset, produced by sampling four fixed
//! 384-value tables across every octave of an integer scale factor.
//!
//! ## Data Flow
//! 1. **Load**: four raw digit blobs → validated [`datasets::DatasetTable`],
//!    cached process-wide
//! 2. **Configure**: caller inputs → validated [`params::WaveParams`]
//! 3. **Generate**: [`sequencer::WaveSequencer`] steps the position down,
//!    asking [`evaluator::PointEvaluator`] for each dataset's value
//! 4. **Emit**: every [`WavePoint`] is handed to a [`sequencer::WaveSink`],
//!    followed by a single completion signal
//!
//! ## Core Types
//! - [`WavePoint`]: one emitted record (position plus four dataset values)
//! - [`WaveError`]: every failure a run can surface

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Module declarations
pub mod config;
pub mod datasets;
pub mod evaluator;
pub mod params;
pub mod powers;
pub mod renderer;
pub mod sequencer;

use datasets::{DatasetError, WaveType, SET_COUNT};
use evaluator::EvaluationError;
use params::ParameterError;

/// One point of the wave.
///
/// `values` is indexed by [`WaveType::index`]: Kelley, Watkins, Sheliak,
/// HuangTi.
///
/// # Example
/// ```
/// use omniwave_lib::{datasets::WaveType, WavePoint};
///
/// let point = WavePoint { position: 1.5, values: [0.25, 0.5, 0.75, 1.0] };
/// assert_eq!(point.value(WaveType::Sheliak), 0.75);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WavePoint {
    /// Days before the target at which the values were computed
    pub position: f64,
    /// One value per dataset
    pub values: [f64; SET_COUNT],
}

impl WavePoint {
    pub fn value(&self, wave: WaveType) -> f64 {
        self.values[wave.index()]
    }
}

/// Errors that can end a generation run or prevent one from starting.
#[derive(Error, Debug)]
pub enum WaveError {
    /// Dataset table malformed or unreadable
    #[error("initialization failed: {0}")]
    Initialization(#[from] DatasetError),

    /// Construction inputs out of range
    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] ParameterError),

    /// A step failed while evaluating a point
    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    /// The caller's cancel token was tripped
    #[error("generation cancelled after {emitted} points")]
    Cancelled { emitted: u64 },
}
