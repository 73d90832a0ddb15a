//! # Wave Point Rendering
//!
//! Turns emitted points into output lines. Two formats are supported:
//!
//! - **Text**: `position, kelley, watkins, sheliak, huangti`, each value with a
//!   fixed number of fractional digits (16 by default)
//! - **Json**: one serialized [`WavePoint`] per line
//!
//! [`ConsoleSink`] writes lines as points arrive and logs a successful
//! completion through `tracing`, keeping data on stdout and logs on stderr.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use tracing::{info, warn};

use crate::sequencer::{Completion, WaveSink};
use crate::WavePoint;

/// Fractional digits in text output unless configured otherwise
pub const DEFAULT_PRECISION: usize = 16;

/// Output line format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointFormat {
    Text,
    Json,
}

impl fmt::Display for PointFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointFormat::Text => f.write_str("text"),
            PointFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for PointFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(PointFormat::Text),
            "json" => Ok(PointFormat::Json),
            other => Err(format!("unknown output format: {}", other)),
        }
    }
}

/// Format a point as comma-separated fixed-precision values
pub fn format_point(point: &WavePoint, precision: usize) -> String {
    let mut line = format!("{:.*}", precision, point.position);
    for value in &point.values {
        line.push_str(&format!(", {:.*}", precision, value));
    }
    line
}

/// Format a point as a single JSON object
pub fn format_json(point: &WavePoint) -> serde_json::Result<String> {
    serde_json::to_string(point)
}

/// Writes every point to `out` and logs the completion signal.
///
/// The first write error is kept and all later points are dropped; check it
/// with [`ConsoleSink::finish`].
pub struct ConsoleSink<W: Write> {
    out: W,
    format: PointFormat,
    precision: usize,
    written: u64,
    failure: Option<io::Error>,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W, format: PointFormat, precision: usize) -> Self {
        ConsoleSink {
            out,
            format,
            precision,
            written: 0,
            failure: None,
        }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the writer, or the first write error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_point(&mut self, point: &WavePoint) -> io::Result<()> {
        match self.format {
            PointFormat::Text => writeln!(self.out, "{}", format_point(point, self.precision)),
            PointFormat::Json => {
                let line = format_json(point).map_err(io::Error::other)?;
                writeln!(self.out, "{}", line)
            }
        }
    }
}

impl<W: Write> WaveSink for ConsoleSink<W> {
    fn on_point(&mut self, point: WavePoint) {
        if self.failure.is_some() {
            return;
        }
        match self.write_point(&point) {
            Ok(()) => self.written += 1,
            Err(e) => {
                warn!("writing wave point failed: {}", e);
                self.failure = Some(e);
            }
        }
    }

    fn on_complete(&mut self, completion: Completion<'_>) {
        if let Err(e) = self.out.flush() {
            self.failure.get_or_insert(e);
        }
        // Failures are returned to the caller, who reports them.
        if completion.success {
            info!(points = self.written, "wave generated successfully");
        }
    }
}
