//! Clips: named, timed collections of targets within one layer.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{ClipError, Result};
use crate::ids::ClipKey;
use crate::interp::CurveType;
use crate::target::{curve_type_at, ParamTarget, Target, TransformTarget};

/// Values of one target at a point in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TargetSnapshot {
    Transform {
        controller: String,
        position: Option<[f32; 3]>,
        rotation: Option<[f32; 4]>,
        curve_type: CurveType,
    },
    Param {
        storable: String,
        param: String,
        value: f32,
        curve_type: CurveType,
    },
}

/// Cross-section of a clip produced by [`Clip::copy`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    pub time: f32,
    pub snapshots: Vec<TargetSnapshot>,
}

impl ClipboardEntry {
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// How [`Clip::paste`] treats targets the clip does not have.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum PasteMode {
    /// Key only targets that already exist in the clip.
    #[default]
    Merge,
    /// Also create missing targets.
    Overwrite,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    name: String,
    layer: String,
    /// Pool used by the randomize directive; the layer when unset.
    animation_set: Option<String>,
    length: f32,
    looping: bool,
    blend_duration: f32,
    transition: bool,
    next_animation_name: Option<String>,
    next_animation_time: f32,
    ensure_quaternion_continuity: bool,
    /// External timeline driven alongside this clip.
    pattern: Option<String>,
    targets: Vec<Target>,
    #[serde(skip, default = "default_true")]
    topology_changed: bool,
}

fn default_true() -> bool {
    true
}

impl Clip {
    /// New looping clip with default length and blend duration.
    pub fn new(name: impl Into<String>, layer: impl Into<String>) -> Self {
        Self::with_config(name, layer, &EngineConfig::default())
    }

    pub fn with_config(name: impl Into<String>, layer: impl Into<String>, cfg: &EngineConfig) -> Self {
        Self {
            name: name.into(),
            layer: layer.into(),
            animation_set: None,
            length: cfg.default_clip_length.max(cfg.snap),
            looping: true,
            blend_duration: cfg.default_blend_duration.max(0.0),
            transition: false,
            next_animation_name: None,
            next_animation_time: 0.0,
            ensure_quaternion_continuity: true,
            pattern: None,
            targets: Vec::new(),
            topology_changed: true,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn key(&self) -> ClipKey {
        ClipKey::new(self.layer.clone(), self.name.clone())
    }

    pub fn animation_set(&self) -> Option<&str> {
        self.animation_set.as_deref()
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[inline]
    pub fn looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn blend_duration(&self) -> f32 {
        self.blend_duration
    }

    #[inline]
    pub fn transition(&self) -> bool {
        self.transition
    }

    pub fn next_animation_name(&self) -> Option<&str> {
        self.next_animation_name.as_deref()
    }

    #[inline]
    pub fn next_animation_time(&self) -> f32 {
        self.next_animation_time
    }

    pub fn quaternion_continuity(&self) -> bool {
        self.ensure_quaternion_continuity
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn set_animation_set(&mut self, set: Option<String>) {
        self.animation_set = set;
    }

    /// Change the length. Keys past the new end are dropped and edge frames re-ensured.
    pub fn set_length(&mut self, length: f32) -> Result<()> {
        if !(length.is_finite() && length > 0.0) {
            return Err(ClipError::InvalidLength { length });
        }
        self.length = length;
        self.validate();
        self.mark_all_dirty();
        Ok(())
    }

    /// Looping and transition clips are mutually exclusive.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        if looping {
            self.transition = false;
        }
        self.mark_all_dirty();
    }

    pub fn set_blend_duration(&mut self, duration: f32) -> Result<()> {
        if !(duration.is_finite() && duration >= 0.0) {
            return Err(ClipError::InvalidBlendDuration { duration });
        }
        self.blend_duration = duration;
        Ok(())
    }

    pub fn set_transition(&mut self, transition: bool) {
        self.transition = transition;
        if transition {
            self.looping = false;
        }
        self.mark_all_dirty();
    }

    /// Sequencing directive: a clip name, `"(Randomize)"`, or `"prefix/*"`.
    pub fn set_next_animation(&mut self, name: Option<String>, time: f32) {
        self.next_animation_name = name.filter(|n| !n.is_empty());
        self.next_animation_time = if time.is_finite() { time } else { 0.0 };
        self.topology_changed = true;
    }

    pub fn set_quaternion_continuity(&mut self, enabled: bool) {
        self.ensure_quaternion_continuity = enabled;
        self.mark_all_dirty();
    }

    pub fn set_pattern(&mut self, pattern: Option<String>) {
        self.pattern = pattern;
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn targets_mut(&mut self) -> &mut [Target] {
        &mut self.targets
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name() == name)
    }

    pub fn target_mut(&mut self, name: &str) -> Option<&mut Target> {
        self.targets.iter_mut().find(|t| t.name() == name)
    }

    /// Add a target; one animating the same property is rejected.
    pub fn add_target(&mut self, target: impl Into<Target>) -> Result<&mut Target> {
        let mut target = target.into();
        if self.targets.iter().any(|t| t.targets_same_as(&target)) {
            return Err(ClipError::DuplicateTarget {
                clip: self.name.clone(),
                target: target.name(),
            });
        }
        target.set_dirty(true);
        self.targets.push(target);
        self.topology_changed = true;
        let idx = self.targets.len() - 1;
        Ok(&mut self.targets[idx])
    }

    pub fn remove_target(&mut self, name: &str) -> Option<Target> {
        let idx = self.targets.iter().position(|t| t.name() == name)?;
        self.topology_changed = true;
        Some(self.targets.remove(idx))
    }

    /// Whether any target needs its curves rebuilt.
    pub fn is_dirty(&self) -> bool {
        self.targets.iter().any(Target::is_dirty)
    }

    /// Targets were added/removed or settings changed since the last rebuild.
    pub fn topology_changed(&self) -> bool {
        self.topology_changed
    }

    pub fn needs_rebuild(&self) -> bool {
        self.topology_changed || self.is_dirty()
    }

    pub(crate) fn mark_all_dirty(&mut self) {
        for t in &mut self.targets {
            t.set_dirty(true);
        }
        self.topology_changed = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        for t in &mut self.targets {
            t.set_dirty(false);
        }
        self.topology_changed = false;
    }

    /// Drop duplicate targets (first wins) and make every target span `[0, length]`.
    pub fn validate(&mut self) {
        let mut i = 0;
        while i < self.targets.len() {
            let dup = self.targets[..i]
                .iter()
                .any(|t| t.targets_same_as(&self.targets[i]));
            if dup {
                log::warn!(
                    "clip {}: dropping duplicate target {}",
                    self.name,
                    self.targets[i].name()
                );
                self.targets.remove(i);
                self.topology_changed = true;
            } else {
                i += 1;
            }
        }
        let length = self.length;
        for t in &mut self.targets {
            t.validate(length);
        }
    }

    /// Loop anchor, tangents, seam smoothing and quaternion continuity for dirty
    /// targets. Returns how many targets were prepared.
    pub(crate) fn prepare_dirty_targets(&mut self) -> usize {
        let length = self.length;
        let looping = self.looping;
        let continuity = self.ensure_quaternion_continuity;
        let mut count = 0;
        for t in self.targets.iter_mut().filter(|t| t.is_dirty()) {
            if looping {
                t.anchor_loop(length);
            }
            t.recompute_curves(looping);
            if continuity {
                if let Target::Transform(tt) = t {
                    // May leave the loop anchor as -q of the first key: same
                    // rotation, and the last segment keeps the short path.
                    tt.ensure_quaternion_continuity();
                    if looping {
                        tt.smooth_loop_seams();
                    }
                }
            }
            count += 1;
        }
        count
    }

    /// Snapshot target values at `time`; all targets, or only selected ones.
    pub fn copy(&self, time: f32, all_targets: bool) -> ClipboardEntry {
        let time = time.clamp(0.0, self.length);
        let snapshots = self
            .targets
            .iter()
            .filter(|t| all_targets || t.selected())
            .filter_map(|t| snapshot(t, time))
            .collect();
        ClipboardEntry { time, snapshots }
    }

    /// Key the entry's values at `time`. Returns how many targets were keyed.
    pub fn paste(&mut self, time: f32, entry: &ClipboardEntry, mode: PasteMode) -> usize {
        let length = self.length;
        let mut pasted = 0;
        for snap in &entry.snapshots {
            let incoming: Target = match snap {
                TargetSnapshot::Transform {
                    controller,
                    position,
                    rotation,
                    ..
                } => TransformTarget::with_channels(
                    controller.clone(),
                    position.is_some(),
                    rotation.is_some(),
                )
                .into(),
                TargetSnapshot::Param { storable, param, .. } => {
                    ParamTarget::new(storable.clone(), param.clone()).into()
                }
            };
            let found = self.targets.iter().position(|t| t.targets_same_as(&incoming));
            let idx = match found {
                Some(i) => i,
                None if mode == PasteMode::Overwrite => {
                    self.targets.push(incoming);
                    self.topology_changed = true;
                    self.targets.len() - 1
                }
                None => continue,
            };
            apply_snapshot(&mut self.targets[idx], snap, time, length);
            self.targets[idx].add_edge_frames_if_missing(length);
            pasted += 1;
        }
        pasted
    }
}

fn snapshot(target: &Target, time: f32) -> Option<TargetSnapshot> {
    let curve_type = target
        .curves()
        .next()
        .map(|c| curve_type_at(c, time))
        .unwrap_or_default();
    match target {
        Target::Transform(t) => {
            let position = t.evaluate_position(time);
            let rotation = t.evaluate_rotation(time);
            if position.is_none() && rotation.is_none() {
                return None;
            }
            Some(TargetSnapshot::Transform {
                controller: t.controller().to_string(),
                position,
                rotation,
                curve_type,
            })
        }
        Target::Param(p) => p.evaluate(time).map(|value| TargetSnapshot::Param {
            storable: p.storable().to_string(),
            param: p.param().to_string(),
            value,
            curve_type,
        }),
    }
}

fn apply_snapshot(target: &mut Target, snap: &TargetSnapshot, time: f32, length: f32) {
    match (target, snap) {
        (
            Target::Transform(t),
            TargetSnapshot::Transform {
                position,
                rotation,
                curve_type,
                ..
            },
        ) => {
            if let Some(p) = position {
                let _ = t.set_position_keyframe(time, *p, Some(*curve_type), length, true);
            }
            if let Some(r) = rotation {
                let _ = t.set_rotation_keyframe(time, *r, Some(*curve_type), length, true);
            }
        }
        (
            Target::Param(p),
            TargetSnapshot::Param {
                value, curve_type, ..
            },
        ) => p.set_keyframe(time, *value, Some(*curve_type), length, true),
        _ => {}
    }
}
