//! Warp parameter types

use crate::{Result, ScrambleError};
use serde::{Deserialize, Serialize};

/// Strength of a warp episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarpParameters {
    /// RMS displacement of the composite field, in canvas pixels
    pub max_distortion: u32,
    /// Number of resampling passes per quadrant field
    pub steps: u32,
}

impl Default for WarpParameters {
    fn default() -> Self {
        Self {
            max_distortion: 80,
            steps: 20,
        }
    }
}

impl WarpParameters {
    /// Create warp parameters with validation
    pub fn new(max_distortion: u32, steps: u32) -> Result<Self> {
        if steps == 0 {
            return Err(ScrambleError::domain("warp steps must be at least 1"));
        }
        Ok(Self {
            max_distortion,
            steps,
        })
    }

    /// Validate a plain `[max_distortion, steps]` pair as handed over by a
    /// parameter-collection layer.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        if values.len() != 2 {
            return Err(ScrambleError::shape(format!(
                "warp parameters need exactly 2 values [max_distortion, steps], got {}",
                values.len()
            )));
        }
        let max_distortion = non_negative_integer("max_distortion", values[0])?;
        let steps = non_negative_integer("steps", values[1])?;
        Self::new(max_distortion, steps)
    }

    /// Displacement scale applied to each RMS-normalized field
    pub fn step_scale(&self) -> f64 {
        self.max_distortion as f64 / self.steps as f64
    }
}

fn non_negative_integer(name: &str, value: f64) -> Result<u32> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(ScrambleError::domain(format!(
            "{} must be a non-negative integer, got {}",
            name, value
        )));
    }
    Ok(value as u32)
}
