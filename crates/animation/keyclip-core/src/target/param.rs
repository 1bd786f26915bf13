//! Scalar float parameter target.

use serde::{Deserialize, Serialize};

use crate::config::{snap, DEFAULT_SNAP};
use crate::curve::Curve;
use crate::error::{ClipError, Result};
use crate::interp::CurveType;
use crate::scene::Host;

use super::{add_edge_frames, curve_type_at};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamTarget {
    storable: String,
    param: String,
    curve: Curve,
    #[serde(skip)]
    pub(crate) dirty: bool,
    #[serde(default)]
    pub selected: bool,
}

impl ParamTarget {
    pub fn new(storable: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            storable: storable.into(),
            param: param.into(),
            curve: Curve::new(),
            dirty: true,
            selected: false,
        }
    }

    pub fn storable(&self) -> &str {
        &self.storable
    }

    pub fn param(&self) -> &str {
        &self.param
    }

    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    pub(crate) fn curve_mut(&mut self) -> &mut Curve {
        &mut self.curve
    }

    /// `storable/param`
    pub fn name(&self) -> String {
        format!("{}/{}", self.storable, self.param)
    }

    pub fn evaluate(&self, time: f32) -> Option<f32> {
        (!self.curve.is_empty()).then(|| self.curve.evaluate(time))
    }

    pub fn set_keyframe(
        &mut self,
        time: f32,
        value: f32,
        curve_type: Option<CurveType>,
        length: f32,
        mark_dirty: bool,
    ) {
        let time = snap(time.clamp(0.0, length.max(0.0)), DEFAULT_SNAP);
        let ct = curve_type.unwrap_or_else(|| curve_type_at(&self.curve, time));
        self.curve.set_keyframe(time, value, ct);
        self.dirty |= mark_dirty;
    }

    pub fn set_keyframe_to_current(&mut self, time: f32, length: f32, host: &Host<'_>) -> Result<()> {
        let value = host
            .sink
            .float_param(&self.storable, &self.param)
            .ok_or_else(|| ClipError::ControllerUnavailable {
                controller: self.name(),
            })?;
        self.set_keyframe(time, value, None, length, true);
        Ok(())
    }

    pub fn add_keyframe_at_time(&mut self, time: f32, length: f32) {
        if let Some(v) = self.evaluate(time) {
            self.set_keyframe(time, v, None, length, true);
        }
    }

    pub(crate) fn add_edge_frames_if_missing(&mut self, length: f32) -> bool {
        let changed = add_edge_frames(&mut self.curve, length);
        self.dirty |= changed;
        changed
    }

    pub fn targets_same_as(&self, other: &ParamTarget) -> bool {
        self.storable == other.storable && self.param == other.param
    }

    pub(crate) fn clone_boundaries(&self, length: f32) -> Self {
        let mut copy = Self::new(self.storable.clone(), self.param.clone());
        copy.selected = self.selected;
        for time in [0.0, length] {
            if let Some(v) = self.evaluate(time) {
                copy.set_keyframe(time, v, None, length, true);
            }
        }
        copy
    }

    pub(crate) fn restore_curves_from(&mut self, backup: &ParamTarget) {
        self.curve = backup.curve.clone();
    }
}
