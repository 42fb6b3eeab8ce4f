//! Coherent warping of a whole frame sequence
//!
//! One field set is generated per batch and shared by every frame, so the
//! sequence is deformed by the same smooth warp and does not flicker.

use super::core::WarpParameters;
use super::field::{DisplacementFieldGenerator, WarpFieldSet};
use super::warper::DiffeomorphicWarper;
use crate::frame::{validate_sequence, Frame};
use crate::{Result, ScrambleError};
use rand::Rng;
use rayon::prelude::*;

/// Batch warp configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchConfig {
    pub params: WarpParameters,
    /// Warp frames concurrently on the rayon pool
    pub parallel: bool,
}

impl BatchConfig {
    pub fn new(params: WarpParameters, parallel: bool) -> Self {
        Self { params, parallel }
    }
}

/// Warped frames plus the fields that produced them
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub frames: Vec<Frame>,
    pub fields: WarpFieldSet,
}

/// Warps frame sequences with one shared field set
pub struct FrameBatchProcessor {
    config: BatchConfig,
}

impl FrameBatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Generate fields for the sequence's canvas size and warp every frame
    pub fn warp_sequence<R: Rng>(&self, frames: &[Frame], rng: &mut R) -> Result<BatchOutcome> {
        validate_sequence(frames)?;
        let first = frames
            .first()
            .ok_or_else(|| ScrambleError::domain("no frames to warp"))?;

        let (canvas_width, canvas_height) =
            DiffeomorphicWarper::canvas_size(first.width(), first.height());
        let fields = DisplacementFieldGenerator::new(self.config.params).generate_set(
            rng,
            canvas_width,
            canvas_height,
        );

        let frames = self.warp_sequence_with_fields(frames, &fields)?;
        Ok(BatchOutcome { frames, fields })
    }

    /// Warp every frame with a previously generated or stored field set
    pub fn warp_sequence_with_fields(
        &self,
        frames: &[Frame],
        fields: &WarpFieldSet,
    ) -> Result<Vec<Frame>> {
        validate_sequence(frames)?;
        let Some(first) = frames.first() else {
            return Ok(Vec::new());
        };

        let warper =
            DiffeomorphicWarper::new(first.width(), first.height(), fields, self.config.params.steps)?;
        log::info!(
            "Warping {} frame(s) of {}x{} ({} plane(s)), {} steps per quadrant, {}",
            frames.len(),
            first.width(),
            first.height(),
            first.plane_count(),
            warper.steps(),
            if self.config.parallel {
                "parallel"
            } else {
                "sequential"
            }
        );

        // Each frame gets its own canvas filled with its own plane means
        let warp_one = |(idx, frame): (usize, &Frame)| -> Result<Frame> {
            log::debug!("Warping frame {}/{}", idx + 1, frames.len());
            warper.warp(frame)
        };

        // Both paths collect in input order and stop at the first failure
        if self.config.parallel {
            frames.par_iter().enumerate().map(&warp_one).collect()
        } else {
            frames.iter().enumerate().map(&warp_one).collect()
        }
    }
}
