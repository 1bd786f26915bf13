//! Keyed scalar curve with per-key interpolation mode.
//!
//! Keys are kept sorted by strictly increasing time and are unique within
//! [`KEY_EPSILON`]. Tangents are recomputed locally around every edited key,
//! so evaluation never needs a global solve.

use serde::{Deserialize, Serialize};

use crate::interp::functions::{dot4, hermite, lerp_f32};
use crate::interp::CurveType;

/// Two key times closer than this are the same key.
pub const KEY_EPSILON: f32 = 0.0001;

/// One key on a [`Curve`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    /// Slope (value per second) arriving at this key.
    pub in_tangent: f32,
    /// Slope (value per second) leaving this key.
    pub out_tangent: f32,
    /// Interpolation of the segment that starts at this key.
    pub curve_type: CurveType,
}

impl Keyframe {
    pub fn new(time: f32, value: f32, curve_type: CurveType) -> Self {
        Self {
            time,
            value,
            in_tangent: 0.0,
            out_tangent: 0.0,
            curve_type,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<Keyframe>,
}

impl Curve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
        }
    }

    /// Build a curve from arbitrary keys: sorts them, merges duplicates (last wins)
    /// and computes tangents.
    pub fn from_keys(keys: impl IntoIterator<Item = Keyframe>) -> Self {
        let mut curve = Self::new();
        for key in keys {
            curve.upsert(key);
        }
        curve.recompute_tangents();
        curve
    }

    #[inline]
    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.keys.capacity()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.keys.reserve(additional);
    }

    pub fn trim_excess(&mut self) {
        self.keys.shrink_to_fit();
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    #[inline]
    pub fn first_frame(&self) -> Option<&Keyframe> {
        self.keys.first()
    }

    #[inline]
    pub fn last_frame(&self) -> Option<&Keyframe> {
        self.keys.last()
    }

    /// Index of the key closest to `time`, if one lies within [`KEY_EPSILON`].
    pub fn key_index_near(&self, time: f32) -> Option<usize> {
        let idx = self.keys.partition_point(|k| k.time < time);
        let mut best: Option<(usize, f32)> = None;
        for i in [idx.wrapping_sub(1), idx] {
            if let Some(k) = self.keys.get(i) {
                let d = (k.time - time).abs();
                if d <= KEY_EPSILON && best.map_or(true, |(_, bd)| d < bd) {
                    best = Some((i, d));
                }
            }
        }
        best.map(|(i, _)| i)
    }

    /// Time of the key nearest to `time`, regardless of distance.
    pub fn time_closest_to(&self, time: f32) -> Option<f32> {
        self.keys
            .iter()
            .map(|k| k.time)
            .min_by(|a, b| (a - time).abs().total_cmp(&(b - time).abs()))
    }

    /// Insert or replace the key at `time`; returns its index.
    pub fn set_keyframe(&mut self, time: f32, value: f32, curve_type: CurveType) -> usize {
        let idx = self.upsert(Keyframe::new(time, value, curve_type));
        self.recompute_tangents_around(idx);
        idx
    }

    /// Overwrite only the value of an existing key (keeps its mode).
    pub fn set_value_at(&mut self, index: usize, value: f32) {
        if let Some(k) = self.keys.get_mut(index) {
            k.value = value;
            self.recompute_tangents_around(index);
        }
    }

    /// Remove the key nearest `time` (within epsilon). Returns whether one was removed.
    pub fn delete_keyframe(&mut self, time: f32) -> bool {
        match self.key_index_near(time) {
            Some(idx) => {
                self.keys.remove(idx);
                if !self.keys.is_empty() {
                    let neighbour = idx.min(self.keys.len() - 1);
                    self.recompute_tangents_around(neighbour);
                    if idx > 0 {
                        self.recompute_tangents_around(idx - 1);
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Drop every key at or past `max_time + KEY_EPSILON`.
    pub fn retain_before(&mut self, max_time: f32) {
        self.keys.retain(|k| k.time < max_time + KEY_EPSILON);
        if let Some(last) = self.keys.len().checked_sub(1) {
            self.recompute_tangents_around(last);
        }
    }

    /// Evaluate at `time`. Outside the keyed range the boundary value is held.
    pub fn evaluate(&self, time: f32) -> f32 {
        let n = self.keys.len();
        match n {
            0 => 0.0,
            1 => self.keys[0].value,
            _ => {
                let first = &self.keys[0];
                let last = &self.keys[n - 1];
                if time <= first.time {
                    return first.value;
                }
                if time >= last.time {
                    return last.value;
                }
                // First key strictly after `time`; guaranteed in 1..n by the clamps above.
                let i1 = self.keys.partition_point(|k| k.time <= time);
                let left = &self.keys[i1 - 1];
                let right = &self.keys[i1];
                let span = (right.time - left.time).max(f32::EPSILON);
                let s = ((time - left.time) / span).clamp(0.0, 1.0);
                match left.curve_type {
                    CurveType::Constant => left.value,
                    CurveType::Linear => lerp_f32(left.value, right.value, s),
                    CurveType::Smooth => hermite(
                        left.value,
                        left.out_tangent * span,
                        right.value,
                        right.in_tangent * span,
                        s,
                    ),
                }
            }
        }
    }

    /// Recompute tangents for every key.
    pub fn recompute_tangents(&mut self) {
        for i in 0..self.keys.len() {
            self.compute_tangent(i);
        }
    }

    /// Recompute tangents for the key at `index` and its direct neighbours.
    pub fn recompute_tangents_around(&mut self, index: usize) {
        let lo = index.saturating_sub(1);
        let hi = (index + 1).min(self.keys.len().saturating_sub(1));
        for i in lo..=hi {
            self.compute_tangent(i);
        }
    }

    /// Make velocity continuous across the loop seam: the first and last keys get the
    /// tangent the seam would have if the curve wrapped around.
    pub fn smooth_loop(&mut self) {
        self.smooth_loop_with_sign(1.0);
    }

    /// Seam smoothing where the last key holds the first key's value times `sign`
    /// (-1 for a quaternion channel whose anchor sits on the opposite hemisphere).
    pub(crate) fn smooth_loop_with_sign(&mut self, sign: f32) {
        let n = self.keys.len();
        if n < 2 {
            return;
        }
        let length = self.keys[n - 1].time - self.keys[0].time;
        if length <= KEY_EPSILON {
            return;
        }
        // Slope across the seam, expressed on the first key's side.
        let slope = if n == 2 {
            0.0
        } else {
            let prev = &self.keys[n - 2];
            let next = &self.keys[1];
            let dt = (next.time - self.keys[0].time) + (self.keys[n - 1].time - prev.time);
            if dt > KEY_EPSILON {
                (next.value - sign * prev.value) / dt
            } else {
                0.0
            }
        };
        if self.keys[0].curve_type == CurveType::Smooth {
            self.keys[0].in_tangent = slope;
            self.keys[0].out_tangent = slope;
        }
        if self.keys[n - 2].curve_type == CurveType::Smooth {
            let last = &mut self.keys[n - 1];
            last.in_tangent = sign * slope;
            last.out_tangent = sign * slope;
        }
    }

    fn upsert(&mut self, key: Keyframe) -> usize {
        match self.key_index_near(key.time) {
            Some(idx) => {
                let existing = &mut self.keys[idx];
                existing.value = key.value;
                existing.curve_type = key.curve_type;
                idx
            }
            None => {
                let idx = self.keys.partition_point(|k| k.time < key.time);
                self.keys.insert(idx, key);
                idx
            }
        }
    }

    fn compute_tangent(&mut self, i: usize) {
        let n = self.keys.len();
        if i >= n {
            return;
        }
        let slope = |a: &Keyframe, b: &Keyframe| {
            let dt = b.time - a.time;
            if dt.abs() > f32::EPSILON {
                (b.value - a.value) / dt
            } else {
                0.0
            }
        };
        let prev = i.checked_sub(1).map(|p| self.keys[p]);
        let next = self.keys.get(i + 1).copied();
        let key = self.keys[i];
        let (in_t, out_t) = match key.curve_type {
            CurveType::Constant => (0.0, 0.0),
            CurveType::Linear => (
                prev.map_or(0.0, |p| slope(&p, &key)),
                next.map_or(0.0, |nx| slope(&key, &nx)),
            ),
            CurveType::Smooth => match (prev, next) {
                (Some(p), Some(nx)) => {
                    let t = slope(&p, &nx);
                    (t, t)
                }
                _ => (0.0, 0.0),
            },
        };
        // A linear segment arriving at this key dictates the incoming slope.
        let in_t = match prev {
            Some(p) if p.curve_type == CurveType::Linear => slope(&p, &key),
            _ => in_t,
        };
        let k = &mut self.keys[i];
        k.in_tangent = in_t;
        k.out_tangent = out_t;
    }
}

/// Sign-align the keys of a quaternion stored as four curves (x, y, z, w) so each
/// key's tuple has a non-negative dot product with the previous key, then recompute
/// tangents. Keys are matched by index; curves of a rotation share key times.
pub fn ensure_quaternion_continuity(curves: &mut [Curve; 4]) {
    let n = curves.iter().map(Curve::len).min().unwrap_or(0);
    for i in 1..n {
        let prev = [
            curves[0].keys[i - 1].value,
            curves[1].keys[i - 1].value,
            curves[2].keys[i - 1].value,
            curves[3].keys[i - 1].value,
        ];
        let cur = [
            curves[0].keys[i].value,
            curves[1].keys[i].value,
            curves[2].keys[i].value,
            curves[3].keys[i].value,
        ];
        if dot4(prev, cur) < 0.0 {
            for curve in curves.iter_mut() {
                curve.keys[i].value = -curve.keys[i].value;
            }
        }
    }
    for curve in curves.iter_mut() {
        curve.recompute_tangents();
    }
}

/// Loop-seam smoothing for four quaternion channels. When continuity left the
/// anchor key on the opposite hemisphere from the first key, the seam is still the
/// same rotation and the tangents are matched across the sign change.
pub fn smooth_quaternion_loop(curves: &mut [Curve; 4]) {
    let n = curves.iter().map(Curve::len).min().unwrap_or(0);
    if n < 2 {
        return;
    }
    let first: [f32; 4] = std::array::from_fn(|c| curves[c].keys[0].value);
    let last: [f32; 4] = std::array::from_fn(|c| curves[c].keys[n - 1].value);
    let sign = if dot4(first, last) < 0.0 { -1.0 } else { 1.0 };
    for curve in curves.iter_mut() {
        curve.smooth_loop_with_sign(sign);
    }
}
