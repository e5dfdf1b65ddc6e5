//! Image files in and out.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageError, ImageReader, RgbImage};
use ndarray::Array3;
use tracing::debug;

use crate::error::{Result, VisionError};
use crate::resize::resize_rgb_to_bgr;

/// Regular files at the top level of `dir`, sorted by file name.
///
/// Subdirectories are not descended into. Every file is treated as an
/// image; a file that fails to decode is reported when it is loaded.
pub fn list_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let read_dir_err = |source| VisionError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_dir_err)? {
        let entry = entry.map_err(read_dir_err)?;
        if entry.file_type().map_err(read_dir_err)?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();

    debug!(dir = %dir.display(), count = paths.len(), "listed input images");
    Ok(paths)
}

/// Decode an image, resize it to `size`×`size` and return it as BGR in [0, 1].
///
/// The format is detected from the file contents, so the extension does
/// not matter. Resizing follows [`resize_rgb_to_bgr`].
///
/// # Returns
///
/// Array of shape (size, size, 3).
pub fn load_image_bgr(path: impl AsRef<Path>, size: u32) -> Result<Array3<f32>> {
    let path = path.as_ref();
    let decoded = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(ImageError::IoError)
        .and_then(|reader| reader.decode())
        .map_err(|source| VisionError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    let rgb = decoded.to_rgb8();

    let (width, height) = rgb.dimensions();
    if width == size && height == size {
        return Ok(rgb_to_bgr_array(&rgb));
    }
    Ok(resize_rgb_to_bgr(&rgb, size as usize, size as usize))
}

/// Convert an 8-bit RGB image to a BGR float array in [0, 1].
pub fn rgb_to_bgr_array(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        f32::from(image.get_pixel(x as u32, y as u32)[2 - c]) / 255.0
    })
}

/// Quantize a BGR float array in [0, 1] to an 8-bit RGB image.
pub fn bgr_array_to_rgb(image: &Array3<f32>) -> Result<RgbImage> {
    let (height, width, channels) = image.dim();
    if channels != 3 {
        return Err(VisionError::InvalidImageShape {
            expected: "(height, width, 3)".to_string(),
            got: image.shape().to_vec(),
        });
    }

    Ok(RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let (x, y) = (x as usize, y as usize);
        image::Rgb([
            crate::colormap::quantize(image[[y, x, 2]]),
            crate::colormap::quantize(image[[y, x, 1]]),
            crate::colormap::quantize(image[[y, x, 0]]),
        ])
    }))
}

/// Write a BGR float array in [0, 1]; the format follows the extension.
pub fn write_bgr_image(path: impl AsRef<Path>, image: &Array3<f32>) -> Result<()> {
    let path = path.as_ref();
    bgr_array_to_rgb(image)?
        .save(path)
        .map_err(|source| VisionError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_solid_png(path: &Path, width: u32, height: u32, color: [u8; 3]) {
        RgbImage::from_pixel(width, height, image::Rgb(color))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_list_images_sorted_top_level_only() {
        let dir = tempfile::tempdir().unwrap();
        write_solid_png(&dir.path().join("b.png"), 2, 2, [0, 0, 0]);
        write_solid_png(&dir.path().join("a.png"), 2, 2, [0, 0, 0]);
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_solid_png(&dir.path().join("nested").join("c.png"), 2, 2, [0, 0, 0]);

        let paths = list_images(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.png", "b.png"]);
    }

    #[test]
    fn test_list_images_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = list_images(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, VisionError::ReadDir { .. }));
    }

    #[test]
    fn test_load_image_resizes_and_reorders() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("red.png");
        write_solid_png(&path, 10, 6, [255, 0, 0]);

        let image = load_image_bgr(&path, 224).unwrap();
        assert_eq!(image.dim(), (224, 224, 3));
        assert_eq!(image[[100, 100, 2]], 1.0);
        assert_eq!(image[[100, 100, 0]], 0.0);
        assert_eq!(image[[100, 100, 1]], 0.0);
    }

    #[test]
    fn test_load_image_detects_format_from_contents() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("green.png");
        write_solid_png(&png, 3, 3, [0, 255, 0]);
        let renamed = dir.path().join("photo");
        fs::rename(&png, &renamed).unwrap();

        let image = load_image_bgr(&renamed, 3).unwrap();
        assert_eq!(image.dim(), (3, 3, 3));
        assert_eq!(image[[1, 1, 1]], 1.0);
        assert_eq!(image[[1, 1, 0]], 0.0);
    }

    #[test]
    fn test_load_image_downscale_without_smoothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stripes.png");
        // One-pixel columns alternating black and white.
        RgbImage::from_fn(8, 8, |x, _| {
            let level = if x % 2 == 0 { 0 } else { 255 };
            image::Rgb([level, level, level])
        })
        .save(&path)
        .unwrap();

        let image = load_image_bgr(&path, 4).unwrap();
        assert_eq!(image.dim(), (4, 4, 3));
        assert!(image.iter().all(|&v| v == 128.0 / 255.0));
    }

    #[test]
    fn test_load_image_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "not an image").unwrap();
        assert!(matches!(
            load_image_bgr(&path, 224),
            Err(VisionError::Decode { .. })
        ));
    }

    #[test]
    fn test_bgr_array_to_rgb_swaps_channels() {
        let mut array = Array3::<f32>::zeros((1, 2, 3));
        array[[0, 1, 0]] = 1.0; // blue
        let rgb = bgr_array_to_rgb(&array).unwrap();
        assert_eq!(rgb.get_pixel(1, 0).0, [0, 0, 255]);
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
    }
}
