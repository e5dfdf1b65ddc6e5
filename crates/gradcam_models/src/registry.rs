//! Architecture registry.
//!
//! Maps the user-facing architecture names onto the supported networks.
//! Parsing happens once, before any image is processed, so an unsupported
//! name is a configuration error rather than a failure halfway through a run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cnn::{DENSENET121_TARGET_LAYER, RESNET50_TARGET_LAYER, VGG19_TARGET_LAYER};

/// Error type for registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The architecture name is not supported.
    #[error("Unknown architecture '{name}' (expected one of: {expected})")]
    UnknownArchitecture {
        /// Name as given by the user.
        name: String,
        /// Comma-separated list of supported names.
        expected: String,
    },
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Supported network families.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// VGG-19.
    Vgg19,
    /// ResNet-50.
    ResNet50,
    /// DenseNet-121.
    #[default]
    DenseNet121,
}

impl Architecture {
    /// Every supported architecture.
    pub const ALL: [Architecture; 3] = [
        Architecture::Vgg19,
        Architecture::ResNet50,
        Architecture::DenseNet121,
    ];

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Vgg19 => "vgg19",
            Architecture::ResNet50 => "resnet50",
            Architecture::DenseNet121 => "densenet121",
        }
    }

    /// Layer whose activation and gradient drive the map by default.
    pub fn default_target_layer(&self) -> &'static str {
        match self {
            Architecture::Vgg19 => VGG19_TARGET_LAYER,
            Architecture::ResNet50 => RESNET50_TARGET_LAYER,
            Architecture::DenseNet121 => DENSENET121_TARGET_LAYER,
        }
    }

    fn expected_names() -> String {
        Self::ALL
            .iter()
            .map(Architecture::name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Architecture {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|arch| arch.name() == lowered)
            .ok_or_else(|| RegistryError::UnknownArchitecture {
                name: s.to_string(),
                expected: Self::expected_names(),
            })
    }
}
