//! Keyclip core (engine-agnostic)
//!
//! Keyframe clip playback: Hermite curves per channel, targets binding controller
//! transforms or float params to curves (optionally relative to a parent frame),
//! clips grouped into layers, crossfades between clips of a layer and automatic
//! sequencing from one clip to the next.
//!
//! Hosts drive two callbacks: [`AnimationEngine::update`] at the variable rate
//! (commands, blends, sequencing, float params) and [`AnimationEngine::fixed_update`]
//! at the fixed rate (clock, transforms). Scene lookups and value writes go through
//! the [`SceneResolver`] and [`AnimatableSink`] traits.

pub mod clip;
pub mod config;
pub mod curve;
pub mod engine;
pub mod error;
pub mod ids;
pub mod inputs;
pub mod interp;
pub mod outputs;
pub mod parent;
pub mod playback;
pub mod sampling;
pub mod scene;
pub mod sequencing;
pub mod target;

// Re-exports for consumers (adapters)
pub use clip::{Clip, ClipboardEntry, PasteMode, TargetSnapshot};
pub use config::EngineConfig;
pub use curve::{
    ensure_quaternion_continuity, smooth_quaternion_loop, Curve, Keyframe, KEY_EPSILON,
};
pub use engine::{AnimationEngine, RebuildReport};
pub use error::{ClipError, Result};
pub use ids::{ClipKey, InstanceId};
pub use inputs::{Command, Inputs};
pub use interp::CurveType;
pub use outputs::{EngineEvent, Outputs};
pub use parent::{ParentBinding, ParentRef, ParentState};
pub use playback::{EngineState, Phase, PlaybackState};
pub use scene::{
    AnimatableSink, AtomHandle, BufferedSink, ControllerPose, Frame, Host, PartHandle,
    PatternDriver, SceneResolver, Space, StaticScene,
};
pub use sequencing::{RANDOMIZE_ANIMATION_NAME, RANDOMIZE_GROUP_SUFFIX};
pub use target::{KeyValue, ParamTarget, Target, TransformTarget};
