//! Interpolation modes and shared math.
//!
//! Curves pick a per-key `CurveType`; the segment starting at a key is
//! interpolated with that key's type.

pub mod functions;

use serde::{Deserialize, Serialize};

/// Per-key interpolation mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    /// Cubic Hermite with tangents derived from the neighbouring keys.
    #[default]
    Smooth,
    /// Straight line to the next key.
    Linear,
    /// Hold this key's value until the next key.
    Constant,
}

impl CurveType {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Smooth => "smooth",
            Self::Linear => "linear",
            Self::Constant => "constant",
        }
    }
}

impl From<&str> for CurveType {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "linear" => Self::Linear,
            "constant" | "step" => Self::Constant,
            _ => Self::Smooth,
        }
    }
}
