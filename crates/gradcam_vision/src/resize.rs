//! Bilinear resizing with OpenCV `INTER_LINEAR` sampling.
//!
//! Source coordinates use half-pixel centres and are clamped at the
//! borders. No antialiasing filter is applied when shrinking, so a
//! downscale samples at most a 2×2 neighbourhood per output pixel.

use image::RgbImage;
use ndarray::{Array2, Array3};

/// Source index pair and interpolation weight for one destination coordinate.
fn source_coords(len_out: usize, len_in: usize) -> Vec<(usize, usize, f32)> {
    let scale = len_in as f32 / len_out as f32;
    let last = len_in - 1;
    (0..len_out)
        .map(|dst| {
            let src = ((dst as f32 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (src.floor() as usize).min(last);
            if i0 >= last {
                (last, last, 0.0)
            } else {
                (i0, i0 + 1, src - i0 as f32)
            }
        })
        .collect()
}

fn lerp2(corners: [f32; 4], fx: f32, fy: f32) -> f32 {
    let [top_left, top_right, bottom_left, bottom_right] = corners;
    let top = top_left * (1.0 - fx) + top_right * fx;
    let bottom = bottom_left * (1.0 - fx) + bottom_right * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Bilinear resize of a float map.
///
/// Matches OpenCV's `INTER_LINEAR` on float images. An empty map resizes
/// to zeros.
pub fn resize_bilinear(map: &Array2<f32>, height: usize, width: usize) -> Array2<f32> {
    let (in_h, in_w) = map.dim();
    if in_h == 0 || in_w == 0 {
        return Array2::zeros((height, width));
    }

    let rows = source_coords(height, in_h);
    let cols = source_coords(width, in_w);

    Array2::from_shape_fn((height, width), |(y, x)| {
        let (y0, y1, fy) = rows[y];
        let (x0, x1, fx) = cols[x];
        lerp2(
            [map[[y0, x0]], map[[y0, x1]], map[[y1, x0]], map[[y1, x1]]],
            fx,
            fy,
        )
    })
}

/// Resize an 8-bit RGB image and return it as BGR in [0, 1].
///
/// Interpolation runs on the 0..=255 values, which are rounded back to
/// whole levels before scaling, as OpenCV does for 8-bit images.
///
/// # Returns
///
/// Array of shape (height, width, 3).
pub fn resize_rgb_to_bgr(image: &RgbImage, height: usize, width: usize) -> Array3<f32> {
    let (in_w, in_h) = image.dimensions();
    if in_w == 0 || in_h == 0 {
        return Array3::zeros((height, width, 3));
    }

    let rows = source_coords(height, in_h as usize);
    let cols = source_coords(width, in_w as usize);
    let level = |x: usize, y: usize, channel: usize| {
        f32::from(image.get_pixel(x as u32, y as u32)[channel])
    };

    Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
        let (y0, y1, fy) = rows[y];
        let (x0, x1, fx) = cols[x];
        let channel = 2 - c;
        let value = lerp2(
            [
                level(x0, y0, channel),
                level(x1, y0, channel),
                level(x0, y1, channel),
                level(x1, y1, channel),
            ],
            fx,
            fy,
        );
        value.round().clamp(0.0, 255.0) / 255.0
    })
}
