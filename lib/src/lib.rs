//! Stimscramble Library
//!
//! Generates perceptually scrambled stimuli for psychophysics experiments.
//! Audio is phase-scrambled in the frequency domain (magnitude spectrum kept),
//! frames are deformed by a smooth random diffeomorphic warp shared across the
//! whole sequence. Every randomized transform hands back what is needed to
//! reproduce it.

pub mod audio_io;
pub mod error;
pub mod frame;
#[cfg(feature = "image")]
pub mod image_io;
pub mod phase_scramble;
pub mod record;
pub mod utils;
pub mod warp; // Module directory

pub use error::ScrambleError;
pub use frame::Frame;
pub use phase_scramble::{PhaseScrambleOutcome, ShiftSource, SpectralPhaseScrambler};
pub use warp::{
    BatchConfig, DiffeomorphicWarper, DisplacementFieldGenerator, FrameBatchProcessor,
    WarpFieldSet, WarpParameters,
};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
///
/// Sets up logging when the `env_logger` feature is enabled.
pub fn init() {
    #[cfg(feature = "env_logger")]
    {
        // A host application may already have installed a logger
        let _ = env_logger::try_init();
    }
}

/// Result type for scrambling operations
pub type Result<T> = std::result::Result<T, ScrambleError>;
