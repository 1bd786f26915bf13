//! Position/rotation target for one controller.

use serde::{Deserialize, Serialize};

use crate::config::{snap, DEFAULT_SNAP};
use crate::curve::{ensure_quaternion_continuity, smooth_quaternion_loop, Curve};
use crate::error::{ClipError, Result};
use crate::interp::functions::normalize_quat;
use crate::interp::CurveType;
use crate::parent::{ParentBinding, ParentState};
use crate::scene::{Frame, Host, Space};

use super::{add_edge_frames, curve_type_at};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformTarget {
    controller: String,
    position: Option<[Curve; 3]>,
    /// Quaternion channels `[x, y, z, w]`.
    rotation: Option<[Curve; 4]>,
    pub control_position: bool,
    pub control_rotation: bool,
    parent: ParentBinding,
    #[serde(skip)]
    pub(crate) dirty: bool,
    #[serde(default)]
    pub selected: bool,
}

impl TransformTarget {
    /// Target animating both position and rotation.
    pub fn new(controller: impl Into<String>) -> Self {
        Self::with_channels(controller, true, true)
    }

    pub fn with_channels(controller: impl Into<String>, position: bool, rotation: bool) -> Self {
        Self {
            controller: controller.into(),
            position: position.then(Default::default),
            rotation: rotation.then(Default::default),
            control_position: position,
            control_rotation: rotation,
            parent: ParentBinding::new(),
            dirty: true,
            selected: false,
        }
    }

    #[inline]
    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    pub fn has_rotation(&self) -> bool {
        self.rotation.is_some()
    }

    pub fn position_curves(&self) -> Option<&[Curve; 3]> {
        self.position.as_ref()
    }

    pub fn rotation_curves(&self) -> Option<&[Curve; 4]> {
        self.rotation.as_ref()
    }

    pub fn parent(&self) -> &ParentBinding {
        &self.parent
    }

    pub fn parent_mut(&mut self) -> &mut ParentBinding {
        &mut self.parent
    }

    /// Bind keyframes to a parent frame; an empty part clears it.
    pub fn set_parent(&mut self, atom: &str, part: &str) {
        self.parent.set_parent(atom, part);
        self.dirty = true;
    }

    pub fn ensure_parent_available(
        &mut self,
        scene: &dyn crate::scene::SceneResolver,
        silent: bool,
    ) -> bool {
        self.parent.ensure_available(scene, silent)
    }

    pub(crate) fn curves(&self) -> impl Iterator<Item = &Curve> {
        self.position
            .iter()
            .flatten()
            .chain(self.rotation.iter().flatten())
    }

    pub(crate) fn curves_mut(&mut self) -> impl Iterator<Item = &mut Curve> {
        self.position
            .iter_mut()
            .flatten()
            .chain(self.rotation.iter_mut().flatten())
    }

    /// Raw (parent-local when a parent is bound) position at `time`.
    pub fn evaluate_position(&self, time: f32) -> Option<[f32; 3]> {
        let [x, y, z] = self.position.as_ref()?;
        if x.is_empty() {
            return None;
        }
        Some([x.evaluate(time), y.evaluate(time), z.evaluate(time)])
    }

    /// Raw rotation at `time`, normalized.
    pub fn evaluate_rotation(&self, time: f32) -> Option<[f32; 4]> {
        let [x, y, z, w] = self.rotation.as_ref()?;
        if w.is_empty() {
            return None;
        }
        Some(normalize_quat([
            x.evaluate(time),
            y.evaluate(time),
            z.evaluate(time),
            w.evaluate(time),
        ]))
    }

    pub fn set_position_keyframe(
        &mut self,
        time: f32,
        value: [f32; 3],
        curve_type: Option<CurveType>,
        length: f32,
        mark_dirty: bool,
    ) -> Result<()> {
        let Some(curves) = self.position.as_mut() else {
            return Err(ClipError::TargetMismatch {
                target: self.controller.clone(),
                reason: "position keyframes".into(),
            });
        };
        let time = snap(time.clamp(0.0, length.max(0.0)), DEFAULT_SNAP);
        let ct = curve_type.unwrap_or_else(|| curve_type_at(&curves[0], time));
        for (curve, v) in curves.iter_mut().zip(value) {
            curve.set_keyframe(time, v, ct);
        }
        self.dirty |= mark_dirty;
        Ok(())
    }

    pub fn set_rotation_keyframe(
        &mut self,
        time: f32,
        value: [f32; 4],
        curve_type: Option<CurveType>,
        length: f32,
        mark_dirty: bool,
    ) -> Result<()> {
        let Some(curves) = self.rotation.as_mut() else {
            return Err(ClipError::TargetMismatch {
                target: self.controller.clone(),
                reason: "rotation keyframes".into(),
            });
        };
        let time = snap(time.clamp(0.0, length.max(0.0)), DEFAULT_SNAP);
        let ct = curve_type.unwrap_or_else(|| curve_type_at(&curves[0], time));
        for (curve, v) in curves.iter_mut().zip(value) {
            curve.set_keyframe(time, v, ct);
        }
        self.dirty |= mark_dirty;
        Ok(())
    }

    /// Key both channel sets at `time`. Channels this target does not own are skipped.
    pub fn set_keyframe(
        &mut self,
        time: f32,
        position: [f32; 3],
        rotation: [f32; 4],
        curve_type: Option<CurveType>,
        length: f32,
        mark_dirty: bool,
    ) {
        if self.position.is_some() {
            let _ = self.set_position_keyframe(time, position, curve_type, length, mark_dirty);
        }
        if self.rotation.is_some() {
            let _ = self.set_rotation_keyframe(time, rotation, curve_type, length, mark_dirty);
        }
    }

    /// Capture the controller's live pose as a keyframe.
    ///
    /// With a parent bound, the world pose is stored relative to the parent frame.
    /// A parent that is set but cannot be resolved is an error; nothing is written.
    /// The lookup is silent: the one-time missing-parent report belongs to sampling.
    pub fn set_keyframe_to_current(&mut self, time: f32, length: f32, host: &Host<'_>) -> Result<()> {
        let (space, parent_frame) = match self.parent.resolve(host.scene, true) {
            ParentState::Free => (Space::Local, None),
            ParentState::Ready(frame) => (Space::World, Some(frame)),
            ParentState::Missing { .. } => {
                let reference = self.parent.reference();
                return Err(ClipError::ParentUnavailable {
                    target: self.controller.clone(),
                    atom: reference.map(|r| r.atom.clone()).unwrap_or_default(),
                    part: reference.map(|r| r.part.clone()).unwrap_or_default(),
                });
            }
        };

        let unavailable = || ClipError::ControllerUnavailable {
            controller: self.controller.clone(),
        };
        let position = host
            .sink
            .position(&self.controller, space)
            .ok_or_else(unavailable)?;
        let rotation = host
            .sink
            .rotation(&self.controller, space)
            .ok_or_else(unavailable)?;

        let pose = Frame::new(position, rotation);
        let pose = match parent_frame {
            Some(parent) => parent.relative(&pose),
            None => pose,
        };
        self.set_keyframe(time, pose.position, pose.rotation, None, length, true);
        Ok(())
    }

    /// Re-key the currently evaluated values at `time`.
    pub fn add_keyframe_at_time(&mut self, time: f32, length: f32) {
        if let Some(p) = self.evaluate_position(time) {
            let _ = self.set_position_keyframe(time, p, None, length, true);
        }
        if let Some(r) = self.evaluate_rotation(time) {
            let _ = self.set_rotation_keyframe(time, r, None, length, true);
        }
    }

    pub(crate) fn add_edge_frames_if_missing(&mut self, length: f32) -> bool {
        let mut changed = false;
        for curve in self.curves_mut() {
            changed |= add_edge_frames(curve, length);
        }
        self.dirty |= changed;
        changed
    }

    /// Sign-align the rotation keys.
    pub fn ensure_quaternion_continuity(&mut self) {
        if let Some(rot) = self.rotation.as_mut() {
            ensure_quaternion_continuity(rot);
        }
    }

    /// Loop-seam tangents after the continuity pass; rotation seams may cross a
    /// sign flip of the anchor key.
    pub(crate) fn smooth_loop_seams(&mut self) {
        if let Some(position) = self.position.as_mut() {
            position.iter_mut().for_each(Curve::smooth_loop);
        }
        if let Some(rotation) = self.rotation.as_mut() {
            smooth_quaternion_loop(rotation);
        }
    }

    /// Same controller and at least one overlapping channel set.
    pub fn targets_same_as(&self, other: &TransformTarget) -> bool {
        self.controller == other.controller
            && ((self.has_position() && other.has_position())
                || (self.has_rotation() && other.has_rotation()))
    }

    /// Duplicate with boundary keys only, captured at the evaluated values.
    pub(crate) fn clone_boundaries(&self, length: f32) -> Self {
        let mut copy = Self {
            controller: self.controller.clone(),
            position: self.position.as_ref().map(|_| Default::default()),
            rotation: self.rotation.as_ref().map(|_| Default::default()),
            control_position: self.control_position,
            control_rotation: self.control_rotation,
            parent: self.parent.clone(),
            dirty: true,
            selected: self.selected,
        };
        for time in [0.0, length] {
            if let Some(p) = self.evaluate_position(time) {
                let _ = copy.set_position_keyframe(time, p, None, length, true);
            }
            if let Some(r) = self.evaluate_rotation(time) {
                let _ = copy.set_rotation_keyframe(time, r, None, length, true);
            }
        }
        copy
    }

    pub(crate) fn restore_curves_from(&mut self, backup: &TransformTarget) {
        self.position = backup.position.clone();
        self.rotation = backup.rotation.clone();
    }
}
