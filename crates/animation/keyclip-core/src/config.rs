//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Granularity keyframe times are snapped to. Fixed so stored clips don't depend on
/// the engine they were keyed in.
pub const DEFAULT_SNAP: f32 = 0.001;

/// Tunables for clip defaults, time snapping and diagnostics.
///
/// Every field has a default so partial JSON documents are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rebuild passes slower than this (milliseconds) raise a performance warning.
    pub rebuild_warning_ms: f32,
    /// Snapping granularity in seconds for engine time: sequencing triggers and the
    /// time `stop_all` restores. Keyframe times always use [`DEFAULT_SNAP`].
    pub snap: f32,
    pub default_clip_length: f32,
    pub default_blend_duration: f32,
    pub default_layer: String,
    /// Seed for the sequencing generator when no generator is injected.
    pub rng_seed: u64,
    /// Log and emit a diagnostic the first time a parent reference fails to resolve.
    pub report_missing_parents: bool,
    /// Maximum events to retain per tick; older events are dropped beyond it.
    pub max_events_per_tick: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rebuild_warning_ms: 1000.0,
            snap: DEFAULT_SNAP,
            default_clip_length: 2.0,
            default_blend_duration: 1.0,
            default_layer: "Main Layer".to_string(),
            rng_seed: 0,
            report_missing_parents: true,
            max_events_per_tick: 1024,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Round `time` to the configured granularity.
    #[inline]
    pub fn snap_time(&self, time: f32) -> f32 {
        snap(time, self.snap)
    }
}

/// Round `time` to a multiple of `step`; a non-positive step leaves it unchanged.
pub fn snap(time: f32, step: f32) -> f32 {
    if step.is_nan() || step <= 0.0 {
        return time;
    }
    let step = f64::from(step);
    let per_second = (1.0 / step).round();
    // Divide by a whole count per second so 0.7 snaps to 0.7, not 0.70000005.
    if per_second >= 1.0 && (1.0 / step - per_second).abs() < 1e-3 {
        ((f64::from(time) * per_second).round() / per_second) as f32
    } else {
        ((f64::from(time) / step).round() * step) as f32
    }
}
