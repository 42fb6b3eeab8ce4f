//! Frame loading and saving through the `image` crate
//!
//! Grayscale images become one-plane frames, everything else three planes
//! (RGB, alpha dropped). Pixel values stay on the 0-255 scale.

use crate::frame::{validate_sequence, Frame};
use crate::{Result, ScrambleError};
use image::{DynamicImage, GrayImage, RgbImage};
use std::path::{Path, PathBuf};

/// Convert a decoded image into a frame
pub fn frame_from_image(image: &DynamicImage) -> Result<Frame> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    let planes = if image.color().has_color() {
        let rgb = image.to_rgb8();
        (0..3)
            .map(|c| rgb.pixels().map(|p| p.0[c] as f64).collect())
            .collect()
    } else {
        let gray = image.to_luma8();
        vec![gray.pixels().map(|p| p.0[0] as f64).collect()]
    };

    Frame::new(width, height, planes)
}

/// Convert a frame back into an 8-bit image, rounding and clamping values
pub fn frame_to_image(frame: &Frame) -> Result<DynamicImage> {
    let width = frame.width() as u32;
    let height = frame.height() as u32;
    let to_u8 = |v: f64| v.round().clamp(0.0, 255.0) as u8;

    match frame.plane_count() {
        1 => {
            let buf = frame.plane(0).iter().map(|&v| to_u8(v)).collect();
            GrayImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| ScrambleError::Image("pixel buffer size mismatch".to_string()))
        }
        3 => {
            let buf = frame.to_interleaved().into_iter().map(to_u8).collect();
            RgbImage::from_raw(width, height, buf)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| ScrambleError::Image("pixel buffer size mismatch".to_string()))
        }
        n => Err(ScrambleError::domain(format!(
            "only 1- or 3-plane frames can be saved as images, got {} planes",
            n
        ))),
    }
}

/// Load one image file as a frame
pub fn load_frame<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let image = image::open(path.as_ref())?;
    frame_from_image(&image)
}

/// Load a list of image files as a frame sequence, in the given order
pub fn load_frame_sequence<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Frame>> {
    let frames = paths
        .iter()
        .map(|p| load_frame(p))
        .collect::<Result<Vec<_>>>()?;
    validate_sequence(&frames)?;
    log::info!("Loaded {} frame(s)", frames.len());
    Ok(frames)
}

/// Save a frame; the format follows the file extension
pub fn save_frame<P: AsRef<Path>>(frame: &Frame, path: P) -> Result<()> {
    frame_to_image(frame)?.save(path.as_ref())?;
    Ok(())
}

/// Save frames as `<prefix>_00001.png`, `<prefix>_00002.png`, ... in `dir`.
///
/// Returns the written paths in frame order.
pub fn save_frame_sequence<P: AsRef<Path>>(
    frames: &[Frame],
    dir: P,
    prefix: &str,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir.as_ref())?;
    let mut written = Vec::with_capacity(frames.len());
    for (idx, frame) in frames.iter().enumerate() {
        let path = dir.as_ref().join(format!("{}_{:05}.png", prefix, idx + 1));
        save_frame(frame, &path)?;
        written.push(path);
    }
    log::info!(
        "Saved {} frame(s) to {}",
        written.len(),
        dir.as_ref().display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_image_roundtrip() {
        let gray = GrayImage::from_fn(5, 3, |x, y| image::Luma([(x * 40 + y) as u8]));
        let frame = frame_from_image(&DynamicImage::ImageLuma8(gray.clone())).unwrap();
        assert_eq!(frame.shape(), [3, 5, 1]);
        assert_eq!(frame.get(0, 4, 2), 162.0);

        let back = frame_to_image(&frame).unwrap();
        assert_eq!(back.to_luma8(), gray);
    }

    #[test]
    fn test_rgb_planes() {
        let rgb = RgbImage::from_fn(2, 2, |x, _| image::Rgb([x as u8, 100, 200]));
        let frame = frame_from_image(&DynamicImage::ImageRgb8(rgb)).unwrap();
        assert_eq!(frame.plane_count(), 3);
        assert_eq!(frame.plane(0), &[0.0, 1.0, 0.0, 1.0]);
        assert_eq!(frame.plane(2), &[200.0; 4]);
    }

    #[test]
    fn test_values_are_clamped() {
        let frame = Frame::new(2, 1, vec![vec![-20.0, 300.4]]).unwrap();
        let image = frame_to_image(&frame).unwrap().to_luma8();
        assert_eq!(image.as_raw(), &vec![0u8, 255u8]);
    }

    #[test]
    fn test_unsupported_plane_count() {
        let frame = Frame::filled(2, 2, 2, 0.0).unwrap();
        assert!(frame_to_image(&frame).is_err());
    }

    #[test]
    fn test_save_and_load_sequence() {
        let dir = std::env::temp_dir().join(format!("stimscramble_frames_{}", std::process::id()));
        let frames: Vec<Frame> = (0..3)
            .map(|n| Frame::filled(4, 4, 1, (n * 50) as f64).unwrap())
            .collect();
        let paths = save_frame_sequence(&frames, &dir, "warped").unwrap();
        assert_eq!(paths.len(), 3);
        assert!(paths[0].ends_with("warped_00001.png"));

        let loaded = load_frame_sequence(&paths).unwrap();
        std::fs::remove_dir_all(&dir).ok();
        assert_eq!(loaded, frames);
    }
}
