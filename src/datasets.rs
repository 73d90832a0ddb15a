//! # Fixed Dataset Tables
//!
//! The four 384-point sampling tables every wave is computed from. The raw
//! data arrives as text blobs of digits separated by arbitrary non-digit
//! characters (commas, whitespace, newlines), one blob per dataset.
//!
//! ## Lifetime
//! A table is validated once and then treated as immutable. The binary loads
//! it at startup and installs it into a process-wide [`OnceLock`]; every
//! sequencer holds an `Arc` to the same table, so concurrent readers need no
//! locking.
//!
//! ## Error Handling
//! Any malformed blob is fatal: a table with a set of the wrong length or an
//! unparsable token is never handed out partially.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Number of datasets in a table.
pub const SET_COUNT: usize = 4;

/// Number of entries in each dataset.
pub const SET_SIZE: usize = 384;

/// Failures while building a [`DatasetTable`].
#[derive(Error, Debug)]
pub enum DatasetError {
    /// A dataset did not contain exactly [`SET_SIZE`] values
    #[error("dataset {wave} has {found} entries, expected {expected}", expected = SET_SIZE)]
    WrongLength { wave: WaveType, found: usize },

    /// A digit run could not be represented as an integer
    #[error("dataset {wave} contains unparsable token {token:?}")]
    BadToken { wave: WaveType, token: String },

    /// Reading a dataset file failed
    #[error("reading dataset {wave} from {}: {source}", path.display())]
    Io {
        wave: WaveType,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The four named datasets, in table order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveType {
    Kelley,
    Watkins,
    Sheliak,
    HuangTi,
}

impl WaveType {
    pub const ALL: [WaveType; SET_COUNT] = [
        WaveType::Kelley,
        WaveType::Watkins,
        WaveType::Sheliak,
        WaveType::HuangTi,
    ];

    /// Zero-based row of this dataset in a [`DatasetTable`].
    pub fn index(self) -> usize {
        match self {
            WaveType::Kelley => 0,
            WaveType::Watkins => 1,
            WaveType::Sheliak => 2,
            WaveType::HuangTi => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            WaveType::Kelley => "kelley",
            WaveType::Watkins => "watkins",
            WaveType::Sheliak => "sheliak",
            WaveType::HuangTi => "huangti",
        }
    }
}

impl fmt::Display for WaveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WaveType {
    type Err = String;

    /// Accepts the dataset name (any case) or its 1-based number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "kelley" | "1" => Ok(WaveType::Kelley),
            "watkins" | "2" => Ok(WaveType::Watkins),
            "sheliak" | "3" => Ok(WaveType::Sheliak),
            "huangti" | "4" => Ok(WaveType::HuangTi),
            _ => Err(format!("unknown wave type: {}", s)),
        }
    }
}

/// Four validated sets of [`SET_SIZE`] integers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatasetTable {
    sets: [[i32; SET_SIZE]; SET_COUNT],
}

impl DatasetTable {
    /// Parse four raw blobs, one per dataset in [`WaveType::ALL`] order.
    pub fn parse(sources: [&str; SET_COUNT]) -> Result<Self, DatasetError> {
        let mut sets = [[0i32; SET_SIZE]; SET_COUNT];
        for (wave, source) in WaveType::ALL.into_iter().zip(sources) {
            let values = parse_set(wave, source)?;
            sets[wave.index()].copy_from_slice(&values);
        }
        Ok(Self { sets })
    }

    /// Read and parse four dataset files.
    pub fn from_files<P: AsRef<Path>>(paths: [P; SET_COUNT]) -> Result<Self, DatasetError> {
        let mut blobs = Vec::with_capacity(SET_COUNT);
        for (wave, path) in WaveType::ALL.into_iter().zip(paths.iter()) {
            let path = path.as_ref();
            let blob = fs::read_to_string(path).map_err(|source| DatasetError::Io {
                wave,
                path: path.to_path_buf(),
                source,
            })?;
            debug!(%wave, path = %path.display(), bytes = blob.len(), "read dataset");
            blobs.push(blob);
        }
        Self::parse([
            blobs[0].as_str(),
            blobs[1].as_str(),
            blobs[2].as_str(),
            blobs[3].as_str(),
        ])
    }

    /// Build a table directly from already-validated arrays.
    pub fn from_sets(sets: [[i32; SET_SIZE]; SET_COUNT]) -> Self {
        Self { sets }
    }

    pub fn get(&self, wave: WaveType) -> &[i32; SET_SIZE] {
        &self.sets[wave.index()]
    }
}

/// Split on runs of non-digits, drop empty tokens, parse the rest in order.
fn parse_set(wave: WaveType, source: &str) -> Result<Vec<i32>, DatasetError> {
    let values = source
        .split(|c: char| !c.is_ascii_digit())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<i32>().map_err(|_| DatasetError::BadToken {
                wave,
                token: token.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if values.len() != SET_SIZE {
        return Err(DatasetError::WrongLength {
            wave,
            found: values.len(),
        });
    }
    Ok(values)
}

static SHARED: OnceLock<Arc<DatasetTable>> = OnceLock::new();

/// Cache `table` for the rest of the process.
///
/// The first call wins; later calls return the table that is already
/// installed and drop their argument.
pub fn install(table: DatasetTable) -> Arc<DatasetTable> {
    Arc::clone(SHARED.get_or_init(|| Arc::new(table)))
}

/// The process-wide table, if one has been installed.
pub fn shared() -> Option<Arc<DatasetTable>> {
    SHARED.get().cloned()
}
