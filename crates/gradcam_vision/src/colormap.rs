//! The "jet" colormap.
//!
//! Blue through cyan and yellow to red. Colors are produced in BGR order to
//! match the image arrays.

use ndarray::{Array2, Array3};

/// Quantize a value in [0, 1] to 8 bits, truncating.
pub fn quantize(value: f32) -> u8 {
    (255.0 * value) as u8
}

/// BGR color of an 8-bit level, components in [0, 1].
pub fn jet(level: u8) -> [f32; 3] {
    let x = f32::from(level) / 255.0;
    let channel = |center: f32| (1.5 - (4.0 * x - center).abs()).clamp(0.0, 1.0);
    [channel(1.0), channel(2.0), channel(3.0)]
}

/// Colorize a mask in [0, 1] into a (height, width, 3) BGR heatmap.
pub fn apply_colormap(mask: &Array2<f32>) -> Array3<f32> {
    let (height, width) = mask.dim();
    Array3::from_shape_fn((height, width, 3), |(y, x, c)| jet(quantize(mask[[y, x]]))[c])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        let low = jet(0);
        assert!(low[0] > 0.0 && low[1] == 0.0 && low[2] == 0.0);
        let high = jet(255);
        assert!(high[2] > 0.0 && high[0] == 0.0 && high[1] == 0.0);
    }

    #[test]
    fn test_jet_midpoint_is_green() {
        let mid = jet(128);
        assert_eq!(mid[1], 1.0);
        assert!(mid[0] < 1.0 && mid[2] < 1.0);
    }

    #[test]
    fn test_jet_in_range() {
        for level in 0..=255u8 {
            assert!(jet(level).iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_quantize_truncates() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(0.999), 254);
        assert_eq!(quantize(1.0), 255);
    }

    #[test]
    fn test_apply_colormap_shape() {
        let heatmap = apply_colormap(&Array2::zeros((3, 5)));
        assert_eq!(heatmap.dim(), (3, 5, 3));
        assert_eq!(heatmap[[2, 4, 0]], jet(0)[0]);
    }
}
