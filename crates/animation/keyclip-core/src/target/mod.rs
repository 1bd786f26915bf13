//! Targets bind one animatable property to its curves.
//!
//! A [`Target`] is either a [`TransformTarget`] (controller position and/or
//! rotation, optionally keyed relative to a parent frame) or a [`ParamTarget`]
//! (one scalar float). Targets track a `dirty` flag consumed by the engine's
//! rebuild pass.

pub mod param;
pub mod transform;

pub use param::ParamTarget;
pub use transform::TransformTarget;

use serde::{Deserialize, Serialize};

use crate::curve::{Curve, KEY_EPSILON};
use crate::error::{ClipError, Result};
use crate::interp::CurveType;
use crate::scene::Host;

/// Value written by [`Target::set_keyframe`].
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum KeyValue {
    Transform {
        position: [f32; 3],
        rotation: [f32; 4],
    },
    Position([f32; 3]),
    Rotation([f32; 4]),
    Float(f32),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Target {
    Transform(TransformTarget),
    Param(ParamTarget),
}

impl From<TransformTarget> for Target {
    fn from(t: TransformTarget) -> Self {
        Target::Transform(t)
    }
}

impl From<ParamTarget> for Target {
    fn from(t: ParamTarget) -> Self {
        Target::Param(t)
    }
}

impl Target {
    /// Controller name, or `storable/param` for float params.
    pub fn name(&self) -> String {
        match self {
            Target::Transform(t) => t.controller().to_string(),
            Target::Param(p) => p.name(),
        }
    }

    pub fn as_transform(&self) -> Option<&TransformTarget> {
        match self {
            Target::Transform(t) => Some(t),
            Target::Param(_) => None,
        }
    }

    pub fn as_transform_mut(&mut self) -> Option<&mut TransformTarget> {
        match self {
            Target::Transform(t) => Some(t),
            Target::Param(_) => None,
        }
    }

    pub fn as_param(&self) -> Option<&ParamTarget> {
        match self {
            Target::Param(p) => Some(p),
            Target::Transform(_) => None,
        }
    }

    pub fn as_param_mut(&mut self) -> Option<&mut ParamTarget> {
        match self {
            Target::Param(p) => Some(p),
            Target::Transform(_) => None,
        }
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        match self {
            Target::Transform(t) => t.dirty,
            Target::Param(p) => p.dirty,
        }
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        match self {
            Target::Transform(t) => t.dirty = dirty,
            Target::Param(p) => p.dirty = dirty,
        }
    }

    #[inline]
    pub fn selected(&self) -> bool {
        match self {
            Target::Transform(t) => t.selected,
            Target::Param(p) => p.selected,
        }
    }

    pub fn set_selected(&mut self, selected: bool) {
        match self {
            Target::Transform(t) => t.selected = selected,
            Target::Param(p) => p.selected = selected,
        }
    }

    pub fn curves(&self) -> Box<dyn Iterator<Item = &Curve> + '_> {
        match self {
            Target::Transform(t) => Box::new(t.curves()),
            Target::Param(p) => Box::new(std::iter::once(p.curve())),
        }
    }

    pub(crate) fn curves_mut(&mut self) -> Box<dyn Iterator<Item = &mut Curve> + '_> {
        match self {
            Target::Transform(t) => Box::new(t.curves_mut()),
            Target::Param(p) => Box::new(std::iter::once(p.curve_mut())),
        }
    }

    pub fn set_keyframe(
        &mut self,
        time: f32,
        value: KeyValue,
        curve_type: Option<CurveType>,
        length: f32,
        mark_dirty: bool,
    ) -> Result<()> {
        match (self, value) {
            (Target::Transform(t), KeyValue::Transform { position, rotation }) => {
                t.set_keyframe(time, position, rotation, curve_type, length, mark_dirty);
                Ok(())
            }
            (Target::Transform(t), KeyValue::Position(p)) => {
                t.set_position_keyframe(time, p, curve_type, length, mark_dirty)
            }
            (Target::Transform(t), KeyValue::Rotation(r)) => {
                t.set_rotation_keyframe(time, r, curve_type, length, mark_dirty)
            }
            (Target::Param(p), KeyValue::Float(v)) => {
                p.set_keyframe(time, v, curve_type, length, mark_dirty);
                Ok(())
            }
            (target, _) => Err(ClipError::TargetMismatch {
                target: target.name(),
                reason: "this kind of keyframe".into(),
            }),
        }
    }

    pub fn set_keyframe_to_current(&mut self, time: f32, length: f32, host: &Host<'_>) -> Result<()> {
        match self {
            Target::Transform(t) => t.set_keyframe_to_current(time, length, host),
            Target::Param(p) => p.set_keyframe_to_current(time, length, host),
        }
    }

    pub fn add_keyframe_at_time(&mut self, time: f32, length: f32) {
        match self {
            Target::Transform(t) => t.add_keyframe_at_time(time, length),
            Target::Param(p) => p.add_keyframe_at_time(time, length),
        }
    }

    /// Remove the keys at `time` from every channel.
    pub fn delete_frame(&mut self, time: f32) -> bool {
        let mut removed = false;
        for curve in self.curves_mut() {
            removed |= curve.delete_keyframe(time);
        }
        if removed {
            self.set_dirty(true);
        }
        removed
    }

    pub fn has_keyframe(&self, time: f32) -> bool {
        self.curves().any(|c| c.key_index_near(time).is_some())
    }

    /// Sorted union of key times across channels.
    pub fn key_times(&self) -> Vec<f32> {
        let mut times: Vec<f32> = self
            .curves()
            .flat_map(|c| c.keys().iter().map(|k| k.time))
            .collect();
        times.sort_by(f32::total_cmp);
        times.dedup_by(|a, b| (*a - *b).abs() <= KEY_EPSILON);
        times
    }

    pub fn time_closest_to(&self, time: f32) -> Option<f32> {
        self.curves()
            .filter_map(|c| c.time_closest_to(time))
            .min_by(|a, b| (a - time).abs().total_cmp(&(b - time).abs()))
    }

    /// Ensure keys exist at 0 and `length`, synthesized from the nearest values.
    pub fn add_edge_frames_if_missing(&mut self, length: f32) -> bool {
        match self {
            Target::Transform(t) => t.add_edge_frames_if_missing(length),
            Target::Param(p) => p.add_edge_frames_if_missing(length),
        }
    }

    /// Drop keys past `length`, then ensure edge frames.
    pub fn validate(&mut self, length: f32) {
        let mut trimmed = false;
        for curve in self.curves_mut() {
            let before = curve.len();
            curve.retain_before(length);
            trimmed |= curve.len() != before;
        }
        if trimmed {
            self.set_dirty(true);
        }
        self.add_edge_frames_if_missing(length);
    }

    /// Duplicate this target. Without `copy_keyframes` only the boundary values at 0
    /// and `length` are kept.
    pub fn clone_target(&self, copy_keyframes: bool, length: f32) -> Target {
        if copy_keyframes {
            let mut copy = self.clone();
            copy.set_dirty(true);
            return copy;
        }
        match self {
            Target::Transform(t) => Target::Transform(t.clone_boundaries(length)),
            Target::Param(p) => Target::Param(p.clone_boundaries(length)),
        }
    }

    /// Replace the curves with `backup`'s, truncated to `length`, then ensure edge frames.
    pub fn restore_from(&mut self, backup: &Target, length: f32) -> Result<()> {
        let same_kind = match (&mut *self, backup) {
            (Target::Transform(t), Target::Transform(b)) => {
                t.restore_curves_from(b);
                true
            }
            (Target::Param(p), Target::Param(b)) => {
                p.restore_curves_from(b);
                true
            }
            _ => false,
        };
        if !same_kind {
            return Err(ClipError::TargetMismatch {
                target: self.name(),
                reason: format!("a backup of {}", backup.name()),
            });
        }
        for curve in self.curves_mut() {
            curve.retain_before(length);
        }
        self.add_edge_frames_if_missing(length);
        self.set_dirty(true);
        Ok(())
    }

    /// Same property (and, for transforms, an overlapping channel set).
    pub fn targets_same_as(&self, other: &Target) -> bool {
        match (self, other) {
            (Target::Transform(a), Target::Transform(b)) => a.targets_same_as(b),
            (Target::Param(a), Target::Param(b)) => a.targets_same_as(b),
            _ => false,
        }
    }

    pub fn increase_capacity(&mut self, additional: usize) {
        for curve in self.curves_mut() {
            curve.reserve(additional);
        }
    }

    pub fn trim_capacity(&mut self) {
        for curve in self.curves_mut() {
            curve.trim_excess();
        }
    }

    /// Recompute tangents; for loops also smooth the seam.
    pub(crate) fn recompute_curves(&mut self, looping: bool) {
        for curve in self.curves_mut() {
            curve.recompute_tangents();
            if looping {
                curve.smooth_loop();
            }
        }
    }

    /// Write each channel's value at 0 again at `length`.
    pub(crate) fn anchor_loop(&mut self, length: f32) {
        for curve in self.curves_mut() {
            if curve.is_empty() {
                continue;
            }
            let v = curve.evaluate(0.0);
            let ct = curve_type_at(curve, length);
            curve.set_keyframe(length, v, ct);
        }
    }
}

/// Interpolation to use when keying at `time` without an explicit override: the key
/// already there, else the preceding key's, else smooth.
pub(crate) fn curve_type_at(curve: &Curve, time: f32) -> CurveType {
    if let Some(i) = curve.key_index_near(time) {
        return curve.keys()[i].curve_type;
    }
    let idx = curve.keys().partition_point(|k| k.time < time);
    idx.checked_sub(1)
        .map(|i| curve.keys()[i].curve_type)
        .unwrap_or_default()
}

pub(crate) fn add_edge_frames(curve: &mut Curve, length: f32) -> bool {
    let (Some(first), Some(last)) = (curve.first_frame().copied(), curve.last_frame().copied())
    else {
        return false;
    };
    let mut changed = false;
    if curve.key_index_near(0.0).is_none() {
        curve.set_keyframe(0.0, first.value, first.curve_type);
        changed = true;
    }
    if curve.key_index_near(length).is_none() {
        let v = curve.evaluate(length);
        curve.set_keyframe(length, v, last.curve_type);
        changed = true;
    }
    changed
}
