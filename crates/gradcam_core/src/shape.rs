//! Image tensor shape metadata.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Spatial resolution every network in this workspace consumes, and the
/// resolution saliency maps are resized to.
pub const INPUT_SIZE: usize = 224;

/// Number of color channels of a network input.
pub const INPUT_CHANNELS: usize = 3;

/// Shape metadata for image tensors.
///
/// Follows the channel-first convention `(N, C, H, W)`:
/// - `N`: Batch size (always 1 in a Grad-CAM run)
/// - `C`: Channels
/// - `H`: Height
/// - `W`: Width
///
/// # Example
///
/// ```rust
/// use gradcam_core::ImageShape;
///
/// let shape = ImageShape::new(1, 3, 224, 224);
/// assert_eq!(shape.channels(), 3);
/// assert_eq!(shape.spatial(), (224, 224));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageShape {
    batch: usize,
    channels: usize,
    height: usize,
    width: usize,
}

impl ImageShape {
    /// Create a new shape with the specified dimensions.
    #[must_use]
    pub const fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// Shape of a single preprocessed network input: `(1, 3, 224, 224)`.
    #[must_use]
    pub const fn network_input() -> Self {
        Self::new(1, INPUT_CHANNELS, INPUT_SIZE, INPUT_SIZE)
    }

    /// Create an ImageShape from a slice of dimensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the slice doesn't contain exactly 4 elements.
    ///
    /// # Example
    ///
    /// ```rust
    /// use gradcam_core::ImageShape;
    ///
    /// let shape = ImageShape::from_dims(&[1, 512, 7, 7]).unwrap();
    /// assert_eq!(shape.channels(), 512);
    /// ```
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        match dims {
            [batch, channels, height, width] => Ok(Self::new(*batch, *channels, *height, *width)),
            _ => Err(CoreError::DimensionError {
                expected: 4,
                got: dims.len(),
            }),
        }
    }

    /// Get the batch size.
    #[must_use]
    pub const fn batch(&self) -> usize {
        self.batch
    }

    /// Get the number of channels.
    #[must_use]
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Get the height.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Get the width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Height and width as a tuple.
    #[must_use]
    pub const fn spatial(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    /// Check if any dimension is zero.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.batch == 0 || self.channels == 0 || self.height == 0 || self.width == 0
    }

    /// Get the total number of elements.
    #[must_use]
    pub const fn numel(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Number of features per batch element once flattened.
    #[must_use]
    pub const fn flat_features(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Convert to an array.
    #[must_use]
    pub const fn as_array(&self) -> [usize; 4] {
        [self.batch, self.channels, self.height, self.width]
    }

    /// Ensure `other` has exactly this shape.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeMismatch`] naming both shapes otherwise.
    pub fn ensure_same(&self, other: &Self) -> Result<()> {
        if self != other {
            return Err(CoreError::ShapeMismatch(format!("{self} vs {other}")));
        }
        Ok(())
    }
}

impl std::fmt::Display for ImageShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(N={}, C={}, H={}, W={})",
            self.batch, self.channels, self.height, self.width
        )
    }
}

impl From<[usize; 4]> for ImageShape {
    fn from([batch, channels, height, width]: [usize; 4]) -> Self {
        Self::new(batch, channels, height, width)
    }
}
