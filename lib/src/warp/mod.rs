//! Diffeomorphic frame warping
//!
//! Smooth random displacement fields are generated once and applied to every
//! frame of a sequence through repeated small bilinear resampling steps, so
//! image content is deformed without tearing and consistently over time.

pub mod batch;
pub mod core;
pub mod field;
pub mod warper;

// Re-export main types for convenience
pub use batch::{BatchConfig, BatchOutcome, FrameBatchProcessor};
pub use core::WarpParameters;
pub use field::{DisplacementField, DisplacementFieldGenerator, WarpFieldSet, BASIS_COMPONENTS};
pub use warper::{warp_frame, DiffeomorphicWarper, ResampleMap, FALLBACK_POSITION};
