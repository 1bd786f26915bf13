//! Error type for clip and engine operations.

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ClipError {
    /// No clip with this name (in the given layer, if any).
    #[error("Clip not found: {name}")]
    ClipNotFound { name: String },

    #[error("Clip {name} already exists in layer {layer}")]
    DuplicateClip { name: String, layer: String },

    /// Playback speed must be strictly positive.
    #[error("Invalid speed: {speed} (must be > 0)")]
    InvalidSpeed { speed: f32 },

    #[error("Invalid clip length: {length} (must be > 0)")]
    InvalidLength { length: f32 },

    #[error("Invalid blend duration: {duration} (must be >= 0)")]
    InvalidBlendDuration { duration: f32 },

    #[error("Target {target} already exists in clip {clip}")]
    DuplicateTarget { clip: String, target: String },

    #[error("Target not found: {target}")]
    TargetNotFound { target: String },

    /// Keyframe data does not match the target kind (e.g. rotation on a param).
    #[error("Target {target} cannot hold {reason}")]
    TargetMismatch { target: String, reason: String },

    /// A parent reference is set but could not be resolved right now.
    #[error("Parent {atom}/{part} of target {target} is not available")]
    ParentUnavailable {
        target: String,
        atom: String,
        part: String,
    },

    /// The animated controller is not present on the sink.
    #[error("Controller not available: {controller}")]
    ControllerUnavailable { controller: String },
}

impl ClipError {
    /// Resolution errors may succeed once the scene catches up.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ParentUnavailable { .. } | Self::ControllerUnavailable { .. }
        )
    }

    /// Get error category for logging/metrics
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ClipNotFound { .. }
            | Self::InvalidSpeed { .. }
            | Self::InvalidLength { .. }
            | Self::InvalidBlendDuration { .. } => "configuration",
            Self::ParentUnavailable { .. } | Self::ControllerUnavailable { .. } => "resolution",
            Self::DuplicateClip { .. }
            | Self::DuplicateTarget { .. }
            | Self::TargetNotFound { .. }
            | Self::TargetMismatch { .. } => "data",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClipError>;
