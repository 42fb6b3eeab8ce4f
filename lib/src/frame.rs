//! Raster frame types
//!
//! A frame is stored plane-major: one row-major buffer per colour plane.
//! Frame sequences are plain `Vec<Frame>` values whose members share the
//! same dimensions and plane count.

use crate::{Result, ScrambleError};

/// A single raster frame (rows x cols x planes)
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    planes: Vec<Vec<f64>>,
}

impl Frame {
    /// Create a frame from per-plane row-major buffers
    pub fn new(width: usize, height: usize, planes: Vec<Vec<f64>>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ScrambleError::domain(format!(
                "frame must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        if planes.is_empty() {
            return Err(ScrambleError::domain("frame must have at least one plane"));
        }
        for (idx, plane) in planes.iter().enumerate() {
            if plane.len() != width * height {
                return Err(ScrambleError::shape(format!(
                    "plane {} has {} pixels, expected {}",
                    idx,
                    plane.len(),
                    width * height
                )));
            }
        }
        Ok(Self {
            width,
            height,
            planes,
        })
    }

    /// Create a frame with every plane filled with `value`
    pub fn filled(width: usize, height: usize, plane_count: usize, value: f64) -> Result<Self> {
        Self::new(width, height, vec![vec![value; width * height]; plane_count])
    }

    /// Build a frame from an explicit shape and row-major data.
    ///
    /// `shape` is `[rows, cols]` or `[rows, cols, planes]`; the last axis
    /// varies fastest in `data`.
    pub fn from_shape(shape: &[usize], data: &[f64]) -> Result<Self> {
        let (rows, cols, plane_count) = match *shape {
            [rows, cols] => (rows, cols, 1),
            [rows, cols, planes] => (rows, cols, planes),
            _ => {
                return Err(ScrambleError::domain(format!(
                    "a frame has 2 or 3 axes, got {}",
                    shape.len()
                )))
            }
        };
        if data.len() != rows * cols * plane_count {
            return Err(ScrambleError::shape(format!(
                "shape {:?} needs {} values, got {}",
                shape,
                rows * cols * plane_count,
                data.len()
            )));
        }

        let mut planes = vec![Vec::with_capacity(rows * cols); plane_count];
        for pixel in data.chunks(plane_count.max(1)) {
            for (plane, &value) in planes.iter_mut().zip(pixel) {
                plane.push(value);
            }
        }
        Self::new(cols, rows, planes)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn plane_count(&self) -> usize {
        self.planes.len()
    }

    pub fn planes(&self) -> &[Vec<f64>] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> &[f64] {
        &self.planes[index]
    }

    pub fn into_planes(self) -> Vec<Vec<f64>> {
        self.planes
    }

    /// Pixel value at (`x`, `y`) in `plane`
    pub fn get(&self, plane: usize, x: usize, y: usize) -> f64 {
        self.planes[plane][y * self.width + x]
    }

    /// `[rows, cols, planes]`
    pub fn shape(&self) -> [usize; 3] {
        [self.height, self.width, self.planes.len()]
    }

    /// Mean intensity of each plane
    pub fn plane_means(&self) -> Vec<f64> {
        let count = (self.width * self.height) as f64;
        self.planes
            .iter()
            .map(|plane| plane.iter().sum::<f64>() / count)
            .collect()
    }

    /// Row-major data with the plane axis varying fastest
    pub fn to_interleaved(&self) -> Vec<f64> {
        let plane_count = self.planes.len();
        let mut data = Vec::with_capacity(self.width * self.height * plane_count);
        for idx in 0..self.width * self.height {
            for plane in &self.planes {
                data.push(plane[idx]);
            }
        }
        data
    }
}

/// Split a `[rows, cols, planes, frames]` row-major array into frames.
///
/// Shapes with two or three axes describe a single frame. More than four
/// axes is rejected.
pub fn sequence_from_shape(shape: &[usize], data: &[f64]) -> Result<Vec<Frame>> {
    match shape.len() {
        2 | 3 => Ok(vec![Frame::from_shape(shape, data)?]),
        4 => {
            let frame_count = shape[3];
            let frame_len = shape[0] * shape[1] * shape[2];
            if data.len() != frame_len * frame_count {
                return Err(ScrambleError::shape(format!(
                    "shape {:?} needs {} values, got {}",
                    shape,
                    frame_len * frame_count,
                    data.len()
                )));
            }
            (0..frame_count)
                .map(|frame_idx| {
                    let frame_data: Vec<f64> = data
                        .iter()
                        .skip(frame_idx)
                        .step_by(frame_count)
                        .copied()
                        .collect();
                    Frame::from_shape(&shape[..3], &frame_data)
                })
                .collect()
        }
        n => Err(ScrambleError::domain(format!(
            "frame data has {} axes, at most 4 are supported",
            n
        ))),
    }
}

/// Check that every frame matches the first one's dimensions and plane count
pub fn validate_sequence(frames: &[Frame]) -> Result<()> {
    let Some(first) = frames.first() else {
        return Ok(());
    };
    for (idx, frame) in frames.iter().enumerate().skip(1) {
        if frame.shape() != first.shape() {
            return Err(ScrambleError::shape(format!(
                "frame {} has shape {:?}, frame 0 has {:?}",
                idx,
                frame.shape(),
                first.shape()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_shape_interleaved() {
        // 1 row, 2 cols, 3 planes
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let frame = Frame::from_shape(&[1, 2, 3], &data).unwrap();
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 1);
        assert_eq!(frame.plane(0), &[1.0, 4.0]);
        assert_eq!(frame.plane(2), &[3.0, 6.0]);
        assert_eq!(frame.to_interleaved(), data.to_vec());
    }

    #[test]
    fn test_from_shape_rejects_bad_input() {
        assert!(matches!(
            Frame::from_shape(&[2, 2], &[0.0; 3]),
            Err(ScrambleError::ShapeMismatch(_))
        ));
        assert!(matches!(
            Frame::from_shape(&[2], &[0.0; 2]),
            Err(ScrambleError::DomainValidation(_))
        ));
        assert!(matches!(
            sequence_from_shape(&[1, 1, 1, 1, 1], &[0.0]),
            Err(ScrambleError::DomainValidation(_))
        ));
    }

    #[test]
    fn test_sequence_from_shape() {
        // 1x2 grayscale, 2 frames; frame axis fastest
        let data = [10.0, 20.0, 11.0, 21.0];
        let frames = sequence_from_shape(&[1, 2, 1, 2], &data).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].plane(0), &[10.0, 11.0]);
        assert_eq!(frames[1].plane(0), &[20.0, 21.0]);
    }

    #[test]
    fn test_plane_means() {
        let frame = Frame::new(2, 1, vec![vec![1.0, 3.0], vec![0.0, 10.0]]).unwrap();
        assert_eq!(frame.plane_means(), vec![2.0, 5.0]);
    }

    #[test]
    fn test_validate_sequence() {
        let a = Frame::filled(4, 4, 1, 0.0).unwrap();
        let b = Frame::filled(4, 3, 1, 0.0).unwrap();
        assert!(validate_sequence(&[a.clone(), a.clone()]).is_ok());
        assert!(validate_sequence(&[]).is_ok());
        assert!(matches!(
            validate_sequence(&[a, b]),
            Err(ScrambleError::ShapeMismatch(_))
        ));
    }
}
