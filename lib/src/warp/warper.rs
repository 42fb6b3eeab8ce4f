//! Single-frame diffeomorphic warping
//!
//! A frame is upsampled 2x by pixel replication, centered on a canvas of
//! twice its size filled with the per-plane mean, then resampled through
//! the four quadrant fields (A, F-A, B, F-B), `steps` bilinear passes each.
//! The result is downsampled back to the source resolution.
//!
//! With the canvas exactly twice the frame size the upsampled frame covers
//! it completely: the background fill is never sampled, and
//! `FALLBACK_POSITION` reads the frame's own top-left pixel.

use super::core::WarpParameters;
use super::field::{DisplacementField, DisplacementFieldGenerator, WarpFieldSet};
use crate::frame::Frame;
use crate::{Result, ScrambleError};
use rand::Rng;

/// Canvas scale factor per axis
pub const UPSAMPLE_FACTOR: usize = 2;

/// Canvas position sampled whenever a displaced coordinate leaves the canvas
pub const FALLBACK_POSITION: (f64, f64) = (0.0, 0.0);

/// Bilinear interpolation taps for one output pixel
#[derive(Debug, Clone, Copy)]
struct Tap {
    top_left: usize,
    top_right: usize,
    bottom_left: usize,
    bottom_right: usize,
    fx: f64,
    fy: f64,
}

impl Tap {
    fn new(x: f64, y: f64, width: usize, height: usize) -> Self {
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        Self {
            top_left: y0 * width + x0,
            top_right: y0 * width + x1,
            bottom_left: y1 * width + x0,
            bottom_right: y1 * width + x1,
            fx: x - x0 as f64,
            fy: y - y0 as f64,
        }
    }

    #[inline]
    fn sample(&self, src: &[f64]) -> f64 {
        let top = src[self.top_left] * (1.0 - self.fx) + src[self.top_right] * self.fx;
        let bottom = src[self.bottom_left] * (1.0 - self.fx) + src[self.bottom_right] * self.fx;
        top * (1.0 - self.fy) + bottom * self.fy
    }
}

/// Precomputed sampling coordinates of one displacement field.
///
/// Coordinates are fixed for the whole quadrant; every resampling pass
/// reuses the same taps.
#[derive(Debug, Clone)]
pub struct ResampleMap {
    width: usize,
    height: usize,
    taps: Vec<Tap>,
    clamped: usize,
}

impl ResampleMap {
    /// Sample positions = identity grid + `field`; positions outside the
    /// canvas collapse onto `fallback`.
    pub fn from_field(field: &DisplacementField, fallback: (f64, f64)) -> Self {
        let width = field.width();
        let height = field.height();
        let max_x = (width - 1) as f64;
        let max_y = (height - 1) as f64;

        let mut taps = Vec::with_capacity(width * height);
        let mut clamped = 0;

        for y in 0..height {
            for x in 0..width {
                let (dx, dy) = field.at(x, y);
                let mut sx = x as f64 + dx;
                let mut sy = y as f64 + dy;
                if !(0.0..=max_x).contains(&sx) || !(0.0..=max_y).contains(&sy) {
                    (sx, sy) = fallback;
                    clamped += 1;
                }
                taps.push(Tap::new(sx, sy, width, height));
            }
        }

        Self {
            width,
            height,
            taps,
            clamped,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels whose sample position fell back
    pub fn clamped_count(&self) -> usize {
        self.clamped
    }

    /// One bilinear resampling pass from `src` into `dst`
    pub fn apply(&self, src: &[f64], dst: &mut [f64]) {
        for (out, tap) in dst.iter_mut().zip(&self.taps) {
            *out = tap.sample(src);
        }
    }
}

/// Immutable warp context: canvas geometry, quadrant maps and step count.
///
/// Built once per batch (or per single-frame call) and shared read-only by
/// every frame it warps.
#[derive(Debug, Clone)]
pub struct DiffeomorphicWarper {
    frame_width: usize,
    frame_height: usize,
    steps: usize,
    maps: Vec<ResampleMap>,
}

impl DiffeomorphicWarper {
    /// Canvas size for a frame of the given size
    pub fn canvas_size(frame_width: usize, frame_height: usize) -> (usize, usize) {
        (frame_width * UPSAMPLE_FACTOR, frame_height * UPSAMPLE_FACTOR)
    }

    pub fn new(
        frame_width: usize,
        frame_height: usize,
        fields: &WarpFieldSet,
        steps: u32,
    ) -> Result<Self> {
        if steps == 0 {
            return Err(ScrambleError::domain("warp steps must be at least 1"));
        }
        let (canvas_width, canvas_height) = Self::canvas_size(frame_width, frame_height);
        if fields.width() != canvas_width || fields.height() != canvas_height {
            return Err(ScrambleError::shape(format!(
                "warp fields are {}x{}, a {}x{} frame needs a {}x{} canvas",
                fields.width(),
                fields.height(),
                frame_width,
                frame_height,
                canvas_width,
                canvas_height
            )));
        }

        let maps: Vec<ResampleMap> = fields
            .quadrants()?
            .iter()
            .map(|field| ResampleMap::from_field(field, FALLBACK_POSITION))
            .collect();

        for (idx, map) in maps.iter().enumerate() {
            log::debug!(
                "Quadrant {}: {} of {} sample positions fell back",
                idx,
                map.clamped_count(),
                canvas_width * canvas_height
            );
        }

        Ok(Self {
            frame_width,
            frame_height,
            steps: steps as usize,
            maps,
        })
    }

    pub fn frame_size(&self) -> (usize, usize) {
        (self.frame_width, self.frame_height)
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Warp a frame using its own per-plane means as the canvas background
    pub fn warp(&self, frame: &Frame) -> Result<Frame> {
        let background = frame.plane_means();
        self.warp_with_background(frame, &background)
    }

    /// Warp a frame on a canvas filled with `background` (one value per plane)
    pub fn warp_with_background(&self, frame: &Frame, background: &[f64]) -> Result<Frame> {
        if frame.width() != self.frame_width || frame.height() != self.frame_height {
            return Err(ScrambleError::shape(format!(
                "warper was built for {}x{} frames, got {}x{}",
                self.frame_width,
                self.frame_height,
                frame.width(),
                frame.height()
            )));
        }
        if background.len() != frame.plane_count() {
            return Err(ScrambleError::shape(format!(
                "{} background values for {} planes",
                background.len(),
                frame.plane_count()
            )));
        }

        let planes = frame
            .planes()
            .iter()
            .zip(background)
            .map(|(plane, &fill)| self.warp_plane(plane, fill))
            .collect();

        Frame::new(self.frame_width, self.frame_height, planes)
    }

    fn warp_plane(&self, plane: &[f64], fill: f64) -> Vec<f64> {
        let (canvas_width, canvas_height) = Self::canvas_size(self.frame_width, self.frame_height);
        let upsampled = upsample(plane, self.frame_width, self.frame_height);
        let up_width = self.frame_width * UPSAMPLE_FACTOR;
        let up_height = self.frame_height * UPSAMPLE_FACTOR;

        let mut work = vec![fill; canvas_width * canvas_height];
        let (offset_x, offset_y) = embed_centered(
            &mut work,
            canvas_width,
            canvas_height,
            &upsampled,
            up_width,
            up_height,
        );

        let mut scratch = vec![0.0; work.len()];
        for map in &self.maps {
            for _ in 0..self.steps {
                map.apply(&work, &mut scratch);
                std::mem::swap(&mut work, &mut scratch);
            }
        }

        downsample(
            &work,
            canvas_width,
            offset_x,
            offset_y,
            self.frame_width,
            self.frame_height,
        )
    }
}

/// Warp a single frame with freshly generated fields.
///
/// Returns the warped frame and the fields used.
pub fn warp_frame<R: Rng>(
    rng: &mut R,
    frame: &Frame,
    params: &WarpParameters,
) -> Result<(Frame, WarpFieldSet)> {
    let (canvas_width, canvas_height) = DiffeomorphicWarper::canvas_size(frame.width(), frame.height());
    let fields = DisplacementFieldGenerator::new(*params).generate_set(rng, canvas_width, canvas_height);
    let warper = DiffeomorphicWarper::new(frame.width(), frame.height(), &fields, params.steps)?;
    let warped = warper.warp(frame)?;
    Ok((warped, fields))
}

/// Pixel-replicating upsample: each source pixel becomes a 2x2 block
fn upsample(plane: &[f64], width: usize, height: usize) -> Vec<f64> {
    let up_width = width * UPSAMPLE_FACTOR;
    let mut out = Vec::with_capacity(up_width * height * UPSAMPLE_FACTOR);
    for row in plane.chunks(width).take(height) {
        let wide: Vec<f64> = row
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(UPSAMPLE_FACTOR))
            .collect();
        for _ in 0..UPSAMPLE_FACTOR {
            out.extend_from_slice(&wide);
        }
    }
    out
}

/// Copy `image` into the middle of `canvas`; returns the top-left offset
fn embed_centered(
    canvas: &mut [f64],
    canvas_width: usize,
    canvas_height: usize,
    image: &[f64],
    image_width: usize,
    image_height: usize,
) -> (usize, usize) {
    let offset_x = (canvas_width - image_width) / 2;
    let offset_y = (canvas_height - image_height) / 2;
    for (y, row) in image.chunks(image_width).enumerate() {
        let start = (offset_y + y) * canvas_width + offset_x;
        canvas[start..start + image_width].copy_from_slice(row);
    }
    (offset_x, offset_y)
}

/// Every second row and column of the region starting at the offset
fn downsample(
    canvas: &[f64],
    canvas_width: usize,
    offset_x: usize,
    offset_y: usize,
    width: usize,
    height: usize,
) -> Vec<f64> {
    let mut out = Vec::with_capacity(width * height);
    for y in 0..height {
        let row_start = (offset_y + y * UPSAMPLE_FACTOR) * canvas_width + offset_x;
        out.extend((0..width).map(|x| canvas[row_start + x * UPSAMPLE_FACTOR]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient_frame(width: usize, height: usize, planes: usize) -> Frame {
        let planes = (0..planes)
            .map(|p| {
                (0..width * height)
                    .map(|i| {
                        let x = (i % width) as f64;
                        let y = (i / width) as f64;
                        (x * 7.0 + y * 3.0 + p as f64 * 50.0) % 255.0
                    })
                    .collect()
            })
            .collect();
        Frame::new(width, height, planes).unwrap()
    }

    fn constant_fields(width: usize, height: usize, a: (f64, f64), f: (f64, f64)) -> WarpFieldSet {
        let field = |(dx, dy): (f64, f64)| {
            DisplacementField::new(
                width,
                height,
                vec![dx; width * height],
                vec![dy; width * height],
            )
            .unwrap()
        };
        WarpFieldSet {
            a: field(a),
            b: field((0.0, 0.0)),
            f: field(f),
        }
    }

    #[test]
    fn test_upsample_downsample_inverse() {
        let plane = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let up = upsample(&plane, 3, 2);
        assert_eq!(up.len(), 24);
        assert_eq!(&up[..6], &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        assert_eq!(&up[6..12], &[1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        assert_eq!(downsample(&up, 6, 0, 0, 3, 2), plane);
    }

    #[test]
    fn test_embed_centered_pads_symmetrically() {
        let mut canvas = vec![9.0; 16];
        let offset = embed_centered(&mut canvas, 4, 4, &[1.0, 2.0, 3.0, 4.0], 2, 2);
        assert_eq!(offset, (1, 1));
        assert_eq!(canvas[5], 1.0);
        assert_eq!(canvas[10], 4.0);
        assert_eq!(canvas[0], 9.0);
    }

    #[test]
    fn test_bilinear_tap() {
        let src = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(Tap::new(0.5, 0.0, 2, 2).sample(&src), 5.0);
        assert_eq!(Tap::new(0.5, 0.5, 2, 2).sample(&src), 15.0);
        assert_eq!(Tap::new(1.0, 1.0, 2, 2).sample(&src), 30.0);
    }

    #[test]
    fn test_null_distortion_is_identity() {
        let frame = gradient_frame(9, 7, 1);
        let params = WarpParameters::new(0, 10).unwrap();
        let mut rng = StdRng::seed_from_u64(21);
        let (warped, _) = warp_frame(&mut rng, &frame, &params).unwrap();
        assert_eq!(warped, frame);
    }

    #[test]
    fn test_shape_preserved() {
        let frame = gradient_frame(12, 5, 3);
        let params = WarpParameters::new(6, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(22);
        let (warped, fields) = warp_frame(&mut rng, &frame, &params).unwrap();
        assert_eq!(warped.shape(), frame.shape());
        assert_eq!((fields.width(), fields.height()), (24, 10));
        assert_ne!(warped, frame);
    }

    #[test]
    fn test_out_of_canvas_samples_fallback_pixel() {
        let frame = gradient_frame(4, 4, 1);
        // A pushes everything far outside; F - A pushes back outside too
        let fields = constant_fields(8, 8, (1000.0, 0.0), (0.0, 0.0));
        let warper = DiffeomorphicWarper::new(4, 4, &fields, 1).unwrap();
        let warped = warper.warp(&frame).unwrap();
        let corner = frame.get(0, 0, 0);
        assert!(warped.plane(0).iter().all(|&v| v == corner));
    }

    #[test]
    fn test_background_fill_never_reaches_output() {
        let frame = gradient_frame(6, 5, 2);
        let params = WarpParameters::new(40, 4).unwrap();
        let fields = DisplacementFieldGenerator::new(params).generate_set(
            &mut StdRng::seed_from_u64(23),
            12,
            10,
        );
        let warper = DiffeomorphicWarper::new(6, 5, &fields, params.steps).unwrap();
        let with_means = warper.warp(&frame).unwrap();
        let with_extreme = warper.warp_with_background(&frame, &[1.0e6, -1.0e6]).unwrap();
        assert_eq!(with_means, with_extreme);
    }

    #[test]
    fn test_resample_map_clamps_only_outside() {
        let mut dx = vec![0.0; 16];
        // Rightmost column pushed one pixel past the edge
        for y in 0..4 {
            dx[y * 4 + 3] = 1.0;
        }
        let field = DisplacementField::new(4, 4, dx, vec![0.0; 16]).unwrap();
        let map = ResampleMap::from_field(&field, FALLBACK_POSITION);
        assert_eq!(map.clamped_count(), 4);

        let src: Vec<f64> = (0..16).map(|v| v as f64).collect();
        let mut dst = vec![0.0; 16];
        map.apply(&src, &mut dst);
        assert_eq!(dst[5], 5.0);
        for y in 0..4 {
            assert_eq!(dst[y * 4 + 3], src[0]);
        }
    }

    #[test]
    fn test_steps_compound_displacement() {
        // Half-pixel shift applied twice moves a step edge by one pixel
        let mut dx = vec![0.5; 16];
        for y in 0..4 {
            dx[y * 4 + 3] = 0.0;
        }
        let field = DisplacementField::new(4, 4, dx, vec![0.0; 16]).unwrap();
        let map = ResampleMap::from_field(&field, FALLBACK_POSITION);
        let src = vec![0.0, 0.0, 4.0, 4.0].repeat(4);
        let mut once = vec![0.0; 16];
        let mut twice = vec![0.0; 16];
        map.apply(&src, &mut once);
        map.apply(&once, &mut twice);
        assert_eq!(&once[..4], &[0.0, 2.0, 4.0, 4.0]);
        assert_eq!(&twice[..4], &[1.0, 3.0, 4.0, 4.0]);
    }

    #[test]
    fn test_field_size_must_match_canvas() {
        let fields = constant_fields(6, 6, (0.0, 0.0), (0.0, 0.0));
        assert!(matches!(
            DiffeomorphicWarper::new(4, 4, &fields, 1),
            Err(ScrambleError::ShapeMismatch(_))
        ));
        let fields = constant_fields(8, 8, (0.0, 0.0), (0.0, 0.0));
        let warper = DiffeomorphicWarper::new(4, 4, &fields, 1).unwrap();
        assert!(warper.warp(&gradient_frame(3, 4, 1)).is_err());
        assert!(warper
            .warp_with_background(&gradient_frame(4, 4, 2), &[0.0])
            .is_err());
    }
}
