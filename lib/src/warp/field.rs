//! Random smooth displacement fields

use super::core::WarpParameters;
use crate::{Result, ScrambleError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Number of cosine frequencies per axis in the random basis
pub const BASIS_COMPONENTS: usize = 6;

/// Per-pixel x and y offsets over a `width x height` grid (row-major)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredField")]
pub struct DisplacementField {
    width: usize,
    height: usize,
    dx: Vec<f64>,
    dy: Vec<f64>,
}

/// Field as read from a record, before its offsets are checked against its size
#[derive(Deserialize)]
struct StoredField {
    width: usize,
    height: usize,
    dx: Vec<f64>,
    dy: Vec<f64>,
}

impl TryFrom<StoredField> for DisplacementField {
    type Error = ScrambleError;

    fn try_from(stored: StoredField) -> Result<Self> {
        Self::new(stored.width, stored.height, stored.dx, stored.dy)
    }
}

impl DisplacementField {
    pub fn new(width: usize, height: usize, dx: Vec<f64>, dy: Vec<f64>) -> Result<Self> {
        if dx.len() != width * height || dy.len() != width * height {
            return Err(ScrambleError::shape(format!(
                "displacement field of {}x{} needs {} offsets per axis, got {} and {}",
                width,
                height,
                width * height,
                dx.len(),
                dy.len()
            )));
        }
        Ok(Self {
            width,
            height,
            dx,
            dy,
        })
    }

    /// A field that leaves every pixel in place
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            dx: vec![0.0; width * height],
            dy: vec![0.0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dx(&self) -> &[f64] {
        &self.dx
    }

    pub fn dy(&self) -> &[f64] {
        &self.dy
    }

    /// Offset at pixel (`x`, `y`)
    pub fn at(&self, x: usize, y: usize) -> (f64, f64) {
        let idx = y * self.width + x;
        (self.dx[idx], self.dy[idx])
    }

    /// `self - other`, elementwise
    pub fn difference(&self, other: &DisplacementField) -> Result<Self> {
        if self.width != other.width || self.height != other.height {
            return Err(ScrambleError::shape(format!(
                "cannot subtract a {}x{} field from a {}x{} field",
                other.width, other.height, self.width, self.height
            )));
        }
        let sub = |a: &[f64], b: &[f64]| -> Vec<f64> { a.iter().zip(b).map(|(x, y)| x - y).collect() };
        Ok(Self {
            width: self.width,
            height: self.height,
            dx: sub(&self.dx, &other.dx),
            dy: sub(&self.dy, &other.dy),
        })
    }

    /// Root-mean-square of the x and y offsets
    pub fn rms(&self) -> (f64, f64) {
        (rms(&self.dx), rms(&self.dy))
    }
}

/// The three independently drawn fields of one warp episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpFieldSet {
    pub a: DisplacementField,
    pub b: DisplacementField,
    pub f: DisplacementField,
}

impl WarpFieldSet {
    pub fn width(&self) -> usize {
        self.a.width
    }

    pub fn height(&self) -> usize {
        self.a.height
    }

    /// Quadrant fields in application order: A, F-A, B, F-B
    pub fn quadrants(&self) -> Result<[DisplacementField; 4]> {
        Ok([
            self.a.clone(),
            self.f.difference(&self.a)?,
            self.b.clone(),
            self.f.difference(&self.b)?,
        ])
    }
}

/// Builds displacement fields from a random low-frequency cosine basis
#[derive(Debug, Clone, Copy)]
pub struct DisplacementFieldGenerator {
    params: WarpParameters,
}

impl DisplacementFieldGenerator {
    pub fn new(params: WarpParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &WarpParameters {
        &self.params
    }

    /// Generate one field pair, RMS-normalized and scaled by
    /// `max_distortion / steps`.
    pub fn generate<R: Rng>(&self, rng: &mut R, width: usize, height: usize) -> DisplacementField {
        let col_angle: Vec<f64> = (0..width).map(|x| x as f64 / width as f64 * 2.0 * PI).collect();
        let row_angle: Vec<f64> = (0..height).map(|y| y as f64 / height as f64 * 2.0 * PI).collect();

        let mut dx = vec![0.0; width * height];
        let mut dy = vec![0.0; width * height];

        for fx in 1..=BASIS_COMPONENTS {
            for fy in 1..=BASIS_COMPONENTS {
                // Weights share the phase range [0, 2pi)
                let weight_x = rng.random_range(0.0..2.0 * PI);
                let weight_y = rng.random_range(0.0..2.0 * PI);
                let phases: [f64; 4] = std::array::from_fn(|_| rng.random_range(0.0..2.0 * PI));

                add_basis_term(&mut dx, &col_angle, &row_angle, fx, fy, weight_x, phases[0], phases[1]);
                add_basis_term(&mut dy, &col_angle, &row_angle, fx, fy, weight_y, phases[2], phases[3]);
            }
        }

        let scale = self.params.step_scale();
        normalize_and_scale(&mut dx, scale);
        normalize_and_scale(&mut dy, scale);

        log::debug!(
            "Generated {}x{} displacement field (scale {:.3})",
            width,
            height,
            scale
        );

        DisplacementField {
            width,
            height,
            dx,
            dy,
        }
    }

    /// Generate the A, B and F fields of one warp episode
    pub fn generate_set<R: Rng>(&self, rng: &mut R, width: usize, height: usize) -> WarpFieldSet {
        log::info!(
            "Generating warp fields for a {}x{} canvas (max distortion {}, {} steps)",
            width,
            height,
            self.params.max_distortion,
            self.params.steps
        );
        let a = self.generate(rng, width, height);
        let b = self.generate(rng, width, height);
        let f = self.generate(rng, width, height);
        WarpFieldSet { a, b, f }
    }
}

#[allow(clippy::too_many_arguments)]
fn add_basis_term(
    field: &mut [f64],
    col_angle: &[f64],
    row_angle: &[f64],
    fx: usize,
    fy: usize,
    weight: f64,
    phase_x: f64,
    phase_y: f64,
) {
    let width = col_angle.len();
    let col_terms: Vec<f64> = col_angle
        .iter()
        .map(|&a| (fx as f64 * a + phase_x).cos())
        .collect();

    for (y, &angle) in row_angle.iter().enumerate() {
        let row_term = weight * (fy as f64 * angle + phase_y).cos();
        let row = &mut field[y * width..(y + 1) * width];
        for (value, &col_term) in row.iter_mut().zip(&col_terms) {
            *value += row_term * col_term;
        }
    }
}

fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Divide by the RMS, then multiply by `scale`. Degenerate fields become zero.
fn normalize_and_scale(values: &mut [f64], scale: f64) {
    let norm = rms(values);
    if norm > 0.0 && norm.is_finite() {
        let factor = scale / norm;
        values.iter_mut().for_each(|v| *v *= factor);
    } else {
        values.iter_mut().for_each(|v| *v = 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_field_is_rms_normalized() {
        let params = WarpParameters::new(30, 10).unwrap();
        let generator = DisplacementFieldGenerator::new(params);
        let mut rng = StdRng::seed_from_u64(11);
        let field = generator.generate(&mut rng, 64, 48);

        assert_eq!(field.width(), 64);
        assert_eq!(field.height(), 48);
        let (rx, ry) = field.rms();
        assert!((rx - 3.0).abs() < 1e-9);
        assert!((ry - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_field_is_smooth() {
        let generator = DisplacementFieldGenerator::new(WarpParameters::new(10, 1).unwrap());
        let mut rng = StdRng::seed_from_u64(12);
        let field = generator.generate(&mut rng, 128, 128);

        // Band-limited to 6 cycles per width: steps stay under 2*pi*6/128 of the peak
        let peak = field.dx().iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let mut max_step = 0.0_f64;
        for y in 0..128 {
            for x in 1..128 {
                let (a, _) = field.at(x - 1, y);
                let (b, _) = field.at(x, y);
                max_step = max_step.max((a - b).abs());
            }
        }
        assert!(peak > 0.0);
        assert!(max_step < 0.3 * peak, "max neighbour step {} for peak {}", max_step, peak);
    }

    #[test]
    fn test_zero_distortion_gives_zero_field() {
        let generator = DisplacementFieldGenerator::new(WarpParameters::new(0, 10).unwrap());
        let mut rng = StdRng::seed_from_u64(13);
        let field = generator.generate(&mut rng, 16, 16);
        assert!(field.dx().iter().chain(field.dy()).all(|&v| v == 0.0));
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let generator = DisplacementFieldGenerator::new(WarpParameters::default());
        let first = generator.generate_set(&mut StdRng::seed_from_u64(14), 20, 10);
        let second = generator.generate_set(&mut StdRng::seed_from_u64(14), 20, 10);
        assert_eq!(first, second);
        assert_ne!(first.a, first.b);
    }

    #[test]
    fn test_quadrants_order() {
        let a = DisplacementField::new(1, 1, vec![1.0], vec![2.0]).unwrap();
        let b = DisplacementField::new(1, 1, vec![3.0], vec![4.0]).unwrap();
        let f = DisplacementField::new(1, 1, vec![10.0], vec![20.0]).unwrap();
        let quadrants = WarpFieldSet { a, b, f }.quadrants().unwrap();

        assert_eq!(quadrants[0].at(0, 0), (1.0, 2.0));
        assert_eq!(quadrants[1].at(0, 0), (9.0, 18.0));
        assert_eq!(quadrants[2].at(0, 0), (3.0, 4.0));
        assert_eq!(quadrants[3].at(0, 0), (7.0, 16.0));
    }

    #[test]
    fn test_stored_field_is_validated() {
        let field = DisplacementField::new(2, 2, vec![0.5; 4], vec![-0.5; 4]).unwrap();
        let json = serde_json::to_string(&field).unwrap();
        let loaded: DisplacementField = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, field);

        let corrupt = r#"{"width":4,"height":4,"dx":[0.0],"dy":[0.0]}"#;
        let err = serde_json::from_str::<DisplacementField>(corrupt).unwrap_err();
        assert!(err.to_string().contains("needs 16 offsets"));
    }

    #[test]
    fn test_field_shape_validation() {
        assert!(DisplacementField::new(2, 2, vec![0.0; 4], vec![0.0; 3]).is_err());
        let a = DisplacementField::zeros(2, 2);
        let b = DisplacementField::zeros(3, 2);
        assert!(matches!(a.difference(&b), Err(ScrambleError::ShapeMismatch(_))));
    }
}
