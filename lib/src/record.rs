//! Persisted randomization records
//!
//! A record holds the random artifact of one scramble (the phase-shift
//! vector, or the warp field set) together with the parameters needed to
//! regenerate exactly the same stimulus later.

use crate::phase_scramble::PhaseScrambleOutcome;
use crate::warp::{WarpFieldSet, WarpParameters};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Everything needed to reproduce one phase scramble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseScrambleRecord {
    /// Library version that wrote the record
    pub version: String,
    /// Maximum shift the vector was drawn with, if it was drawn
    pub max_shift: Option<f64>,
    /// RNG seed, if one was set
    pub seed: Option<u64>,
    pub sample_rate: Option<u32>,
    pub channels: usize,
    /// Sample count before even-length padding
    pub sample_count: usize,
    pub shifts: Vec<f64>,
}

impl PhaseScrambleRecord {
    pub fn new(
        outcome: &PhaseScrambleOutcome,
        sample_count: usize,
        max_shift: Option<f64>,
        seed: Option<u64>,
        sample_rate: Option<u32>,
    ) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            max_shift,
            seed,
            sample_rate,
            channels: outcome.channels.len(),
            sample_count,
            shifts: outcome.shifts.clone(),
        }
    }
}

/// Everything needed to reproduce one batch warp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpRecord {
    pub version: String,
    pub params: WarpParameters,
    pub seed: Option<u64>,
    pub frame_width: usize,
    pub frame_height: usize,
    pub fields: WarpFieldSet,
}

impl WarpRecord {
    pub fn new(
        params: WarpParameters,
        seed: Option<u64>,
        frame_width: usize,
        frame_height: usize,
        fields: WarpFieldSet,
    ) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            params,
            seed,
            frame_width,
            frame_height,
            fields,
        }
    }
}

/// Write `value` as pretty-printed JSON
pub fn save_json<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, value)?;
    log::info!("Wrote record to {}", path.as_ref().display());
    Ok(())
}

/// Read a JSON record
pub fn load_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let value = serde_json::from_reader(reader)?;
    log::info!("Read record from {}", path.as_ref().display());
    Ok(value)
}
