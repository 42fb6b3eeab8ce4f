//! Spectral phase scrambling
//!
//! Randomizes the phase of every positive-frequency bin of a multichannel
//! signal while keeping its magnitude spectrum intact. The same phase-shift
//! vector is applied to every channel, and the multiplier is built
//! conjugate-symmetric so the inverse transform of a real signal stays real.

use crate::{Result, ScrambleError};
use num_complex::Complex64;
use rand::Rng;
use rustfft::FftPlanner;

/// Where the phase shifts come from
#[derive(Debug, Clone, PartialEq)]
pub enum ShiftSource {
    /// Draw each shift uniformly from `[0, max_shift)`
    Random { max_shift: f64 },
    /// Reuse a previously returned shift vector
    Explicit(Vec<f64>),
}

impl ShiftSource {
    /// Build a source from loosely supplied caller values.
    ///
    /// An explicit shift vector takes precedence and makes `max_shift`
    /// irrelevant. Supplying neither is an argument-count error.
    pub fn from_arguments(max_shift: Option<f64>, shifts: Option<Vec<f64>>) -> Result<Self> {
        match (max_shift, shifts) {
            (_, Some(shifts)) => Ok(ShiftSource::Explicit(shifts)),
            (Some(max_shift), None) => {
                validate_max_shift(max_shift)?;
                Ok(ShiftSource::Random { max_shift })
            }
            (None, None) => Err(ScrambleError::ArgumentCount {
                expected: "a maximum phase shift or a shift vector".to_string(),
                got: 0,
            }),
        }
    }
}

/// Result of one phase scramble
#[derive(Debug, Clone)]
pub struct PhaseScrambleOutcome {
    /// Scrambled channels, each of the padded length
    pub channels: Vec<Vec<f64>>,
    /// Shift vector that reproduces this scramble
    pub shifts: Vec<f64>,
    /// Whether a zero sample was appended to reach an even length
    pub padded: bool,
    /// Largest imaginary component discarded after the inverse transform
    pub max_imaginary_residue: f64,
}

impl PhaseScrambleOutcome {
    pub fn padded_len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }
}

/// Sample count after padding to an even length
pub fn padded_length(samples: usize) -> usize {
    samples + samples % 2
}

/// Number of positive-frequency bins between DC and Nyquist for an
/// even transform length `padded_len`
pub fn harmonic_count(padded_len: usize) -> usize {
    (padded_len / 2).saturating_sub(1)
}

/// Per-bin multiplier of length `2 * (shifts.len() + 1)`.
///
/// DC and Nyquist are left at 1; bin `k` gets `exp(i*s)` and bin `L-k` its
/// conjugate.
pub fn phase_multiplier(shifts: &[f64]) -> Vec<Complex64> {
    let harmonics = shifts.len();
    let len = 2 * (harmonics + 1);
    let mut multiplier = vec![Complex64::new(1.0, 0.0); len];
    for (k, &shift) in shifts.iter().enumerate() {
        let bin = k + 1;
        let rotation = Complex64::from_polar(1.0, shift);
        multiplier[bin] = rotation;
        multiplier[len - bin] = rotation.conj();
    }
    multiplier
}

/// Draw `count` shifts uniformly from `[0, max_shift)`
pub fn draw_shifts<R: Rng>(rng: &mut R, count: usize, max_shift: f64) -> Result<Vec<f64>> {
    validate_max_shift(max_shift)?;
    if max_shift == 0.0 {
        return Ok(vec![0.0; count]);
    }
    Ok((0..count).map(|_| rng.random_range(0.0..max_shift)).collect())
}

fn validate_max_shift(max_shift: f64) -> Result<()> {
    if !max_shift.is_finite() || max_shift < 0.0 {
        return Err(ScrambleError::domain(format!(
            "maximum phase shift must be a finite non-negative number, got {}",
            max_shift
        )));
    }
    Ok(())
}

/// FFT-based phase scrambler for multichannel signals
pub struct SpectralPhaseScrambler {
    planner: FftPlanner<f64>,
}

impl Default for SpectralPhaseScrambler {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralPhaseScrambler {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Scramble `channels` (one `Vec` per channel, equal lengths).
    ///
    /// All validation happens before any transform runs.
    pub fn scramble<R: Rng>(
        &mut self,
        channels: &[Vec<f64>],
        source: &ShiftSource,
        rng: &mut R,
    ) -> Result<PhaseScrambleOutcome> {
        let samples = validate_signal(channels)?;
        let padded_len = padded_length(samples);
        let harmonics = harmonic_count(padded_len);

        let shifts = match source {
            ShiftSource::Random { max_shift } => draw_shifts(rng, harmonics, *max_shift)?,
            ShiftSource::Explicit(shifts) => {
                if shifts.len() != harmonics {
                    return Err(ScrambleError::shape(format!(
                        "shift vector has {} values, a {}-sample signal needs {}",
                        shifts.len(),
                        padded_len,
                        harmonics
                    )));
                }
                if let Some(bad) = shifts.iter().find(|s| !s.is_finite()) {
                    return Err(ScrambleError::domain(format!(
                        "shift vector contains non-finite value {}",
                        bad
                    )));
                }
                shifts.clone()
            }
        };

        if channels.len() > 2 {
            log::warn!(
                "Signal has {} channels; one shared shift vector is applied to all of them",
                channels.len()
            );
        }

        log::info!(
            "Phase scrambling {} channel(s) of {} samples ({} harmonics{})",
            channels.len(),
            samples,
            harmonics,
            if padded_len != samples { ", padded" } else { "" }
        );

        let multiplier = phase_multiplier(&shifts);
        let forward = self.planner.plan_fft_forward(padded_len);
        let inverse = self.planner.plan_fft_inverse(padded_len);
        let scale = 1.0 / padded_len as f64;

        let mut max_imaginary_residue = 0.0_f64;
        let mut output = Vec::with_capacity(channels.len());

        for (ch_idx, channel) in channels.iter().enumerate() {
            let mut buffer: Vec<Complex64> = channel
                .iter()
                .map(|&s| Complex64::new(s, 0.0))
                .collect();
            buffer.resize(padded_len, Complex64::new(0.0, 0.0));

            forward.process(&mut buffer);
            for (bin, m) in buffer.iter_mut().zip(&multiplier) {
                *bin *= *m;
            }
            inverse.process(&mut buffer);

            let residue = buffer
                .iter()
                .map(|c| (c.im * scale).abs())
                .fold(0.0, f64::max);
            max_imaginary_residue = max_imaginary_residue.max(residue);

            log::debug!("Channel {}: imaginary residue {:.3e}", ch_idx, residue);

            output.push(buffer.iter().map(|c| c.re * scale).collect());
        }

        Ok(PhaseScrambleOutcome {
            channels: output,
            shifts,
            padded: padded_len != samples,
            max_imaginary_residue,
        })
    }
}

/// Returns the common channel length
fn validate_signal(channels: &[Vec<f64>]) -> Result<usize> {
    let first = channels
        .first()
        .ok_or_else(|| ScrambleError::shape("signal must have at least one channel"))?;
    let samples = first.len();
    if samples == 0 {
        return Err(ScrambleError::domain("signal has no samples"));
    }
    for (idx, channel) in channels.iter().enumerate() {
        if channel.len() != samples {
            return Err(ScrambleError::shape(format!(
                "channel {} has {} samples, channel 0 has {}",
                idx,
                channel.len(),
                samples
            )));
        }
    }
    Ok(samples)
}
