//! Heatmap overlay rendering.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3};
use tracing::debug;

use crate::colormap::apply_colormap;
use crate::error::{Result, VisionError};
use crate::io::write_bgr_image;

/// File name of the `index`-th result.
pub fn cam_file_name(index: usize) -> String {
    format!("cam{index}.jpg")
}

/// Blend a colorized mask onto an image.
///
/// The heatmap is added to the image and the sum divided by its own
/// maximum, so the result stays in [0, 1].
///
/// # Arguments
///
/// * `image` - BGR image (height, width, 3) in [0, 1]
/// * `mask` - Saliency map (height, width) in [0, 1]
pub fn overlay(image: &Array3<f32>, mask: &Array2<f32>) -> Result<Array3<f32>> {
    let (height, width, channels) = image.dim();
    if channels != 3 || mask.dim() != (height, width) {
        return Err(VisionError::InvalidImageShape {
            expected: format!("({}, {}, 3)", mask.nrows(), mask.ncols()),
            got: image.shape().to_vec(),
        });
    }

    let mut cam = apply_colormap(mask) + image;
    let max = cam.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 {
        cam.mapv_inplace(|v| v / max);
    }
    Ok(cam)
}

/// Overlay `mask` on `image` and write `cam<index>.jpg` into `output_dir`,
/// creating the directory if needed.
///
/// # Returns
///
/// Path of the written file.
pub fn show_cam_on_image(
    image: &Array3<f32>,
    mask: &Array2<f32>,
    output_dir: impl AsRef<Path>,
    index: usize,
) -> Result<PathBuf> {
    let cam = overlay(image, mask)?;
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(cam_file_name(index));
    write_bgr_image(&path, &cam)?;
    debug!(path = %path.display(), "wrote heatmap");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::jet;
    use crate::io::bgr_array_to_rgb;

    #[test]
    fn test_overlay_normalizes_by_max() {
        let image = Array3::<f32>::zeros((2, 2, 3));
        let mask = Array2::<f32>::zeros((2, 2));

        let cam = overlay(&image, &mask).unwrap();
        // Only the jet(0) blue component is present, scaled to 1.
        assert_eq!(cam[[0, 0, 0]], 1.0);
        assert_eq!(cam[[0, 0, 1]], 0.0);
        assert_eq!(cam[[1, 1, 2]], 0.0);
        assert!(jet(0)[0] < 1.0);
    }

    #[test]
    fn test_overlay_in_unit_range() {
        let image = Array3::from_shape_fn((8, 8, 3), |(y, x, c)| ((y + x + c) % 4) as f32 / 3.0);
        let mask = Array2::from_shape_fn((8, 8), |(y, x)| (y * 8 + x) as f32 / 63.0);

        let cam = overlay(&image, &mask).unwrap();
        assert!(cam.iter().all(|&v| (0.0..=1.0).contains(&v)));
        let max = cam.iter().copied().fold(0.0f32, f32::max);
        assert!((max - 1.0).abs() < 1e-6);

        // Pixel values after quantization are within [0, 255] by construction.
        let rgb = bgr_array_to_rgb(&cam).unwrap();
        assert!(rgb.pixels().any(|p| p.0.contains(&255)));
    }

    #[test]
    fn test_overlay_shape_mismatch() {
        let image = Array3::<f32>::zeros((4, 4, 3));
        let mask = Array2::<f32>::zeros((2, 2));
        assert!(matches!(
            overlay(&image, &mask),
            Err(VisionError::InvalidImageShape { .. })
        ));
    }

    #[test]
    fn test_show_cam_on_image_writes_numbered_file() {
        let dir = tempfile::tempdir().unwrap();
        let image = Array3::<f32>::from_elem((16, 16, 3), 0.5);
        let mask = Array2::<f32>::from_elem((16, 16), 0.25);

        let out = dir.path().join("results");
        let path = show_cam_on_image(&image, &mask, &out, 3).unwrap();
        assert_eq!(path, out.join("cam3.jpg"));

        let written = image::open(&path).unwrap();
        assert_eq!((written.width(), written.height()), (16, 16));
    }
}
