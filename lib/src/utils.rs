//! Helpers used by client applications
//!
//! File-level wrappers around the scrambling core, RNG construction,
//! formatting helpers and named warp presets.

use crate::audio_io::{read_audio_file, write_audio_file, AudioInfo};
use crate::phase_scramble::{PhaseScrambleOutcome, ShiftSource, SpectralPhaseScrambler};
use crate::record::{save_json, PhaseScrambleRecord};
use crate::warp::WarpParameters;
use crate::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;

/// Seeded generator when `seed` is set, OS-entropy seeded otherwise
pub fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Load an audio file and phase-scramble it
pub fn load_and_scramble<P: AsRef<Path>>(
    path: P,
    source: &ShiftSource,
    seed: Option<u64>,
) -> Result<(AudioInfo, PhaseScrambleOutcome)> {
    let (info, channels) = read_audio_file(path.as_ref())?;
    log::info!(
        "Loaded audio: {} channels, {} Hz, {:.2}s",
        info.channels,
        info.sample_rate,
        info.duration_seconds
    );

    let mut rng = make_rng(seed);
    let outcome = SpectralPhaseScrambler::new().scramble(&channels, source, &mut rng)?;
    Ok((info, outcome))
}

/// Write scrambled audio and, optionally, its reproduction record
pub fn save_scrambled_audio<P: AsRef<Path>, Q: AsRef<Path>>(
    info: &AudioInfo,
    outcome: &PhaseScrambleOutcome,
    source: &ShiftSource,
    seed: Option<u64>,
    audio_path: P,
    record_path: Option<Q>,
) -> Result<()> {
    write_audio_file(audio_path, info.sample_rate, &outcome.channels)?;

    if let Some(record_path) = record_path {
        let max_shift = match source {
            ShiftSource::Random { max_shift } => Some(*max_shift),
            ShiftSource::Explicit(_) => None,
        };
        let record = PhaseScrambleRecord::new(
            outcome,
            info.duration_samples,
            max_shift,
            seed,
            Some(info.sample_rate),
        );
        save_json(&record, record_path)?;
    }
    Ok(())
}

/// Format a time value for display
pub fn format_time(time_sec: f64) -> String {
    if time_sec >= 60.0 {
        let minutes = (time_sec / 60.0).floor();
        let seconds = time_sec % 60.0;
        format!("{:.0}m {:.1}s", minutes, seconds)
    } else {
        format!("{:.2}s", time_sec)
    }
}

/// Format a phase value in radians together with its multiple of pi
pub fn format_phase(radians: f64) -> String {
    format!("{:.4} rad ({:.3}π)", radians, radians / std::f64::consts::PI)
}

/// One-paragraph description of a phase scramble
pub fn phase_summary(info: &AudioInfo, outcome: &PhaseScrambleOutcome) -> String {
    let mean_shift = if outcome.shifts.is_empty() {
        0.0
    } else {
        outcome.shifts.iter().sum::<f64>() / outcome.shifts.len() as f64
    };
    format!(
        "Phase scramble:\n  Channels: {}\n  Duration: {}\n  Transform length: {}{}\n  Shifted bins: {}\n  Mean shift: {}\n  Imaginary residue: {:.3e}",
        outcome.channels.len(),
        format_time(info.duration_seconds),
        outcome.padded_len(),
        if outcome.padded { " (zero-padded)" } else { "" },
        outcome.shifts.len(),
        format_phase(mean_shift),
        outcome.max_imaginary_residue
    )
}

/// Named warp strengths
pub mod presets {
    use super::*;

    /// Preset information structure
    pub struct PresetInfo {
        pub id: usize,
        pub name: &'static str,
        pub description: &'static str,
        pub params: WarpParameters,
    }

    /// Small deformation, content mostly recognizable
    pub fn mild() -> WarpParameters {
        WarpParameters {
            max_distortion: 40,
            steps: 10,
        }
    }

    /// Default strength
    pub fn standard() -> WarpParameters {
        WarpParameters::default()
    }

    /// Heavy deformation for fully unrecognizable stimuli
    pub fn strong() -> WarpParameters {
        WarpParameters {
            max_distortion: 120,
            steps: 30,
        }
    }

    /// Smoke-test strength for quick checks on large inputs
    pub fn preview() -> WarpParameters {
        WarpParameters {
            max_distortion: 20,
            steps: 2,
        }
    }

    /// List all presets with detailed info
    pub fn list_presets() -> Vec<PresetInfo> {
        vec![
            PresetInfo {
                id: 0,
                name: "standard",
                description: "Max distortion=80, Steps=20",
                params: standard(),
            },
            PresetInfo {
                id: 1,
                name: "mild",
                description: "Max distortion=40, Steps=10",
                params: mild(),
            },
            PresetInfo {
                id: 2,
                name: "strong",
                description: "Max distortion=120, Steps=30",
                params: strong(),
            },
            PresetInfo {
                id: 3,
                name: "preview",
                description: "Max distortion=20, Steps=2",
                params: preview(),
            },
        ]
    }

    /// Look up a preset by id or name
    pub fn find(key: &str) -> Option<PresetInfo> {
        let by_id = key.parse::<usize>().ok();
        list_presets()
            .into_iter()
            .find(|p| Some(p.id) == by_id || p.name.eq_ignore_ascii_case(key))
    }
}
