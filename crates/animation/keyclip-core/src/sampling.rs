//! Sampling: evaluate a clip's targets at its local time and blend them into the sink.
//!
//! Each clip blends toward its evaluated value at its own weight, starting from
//! whatever is already resident on the property. Clips blending in and out of a
//! layer therefore compose without knowing about each other.

use crate::clip::Clip;
use crate::interp::functions::{lerp_f32, lerp_vec3, slerp_quat};
use crate::parent::ParentState;
use crate::scene::{AnimatableSink, Host, Space};
use crate::target::Target;

/// A parent reference that failed to resolve for the first time during sampling.
#[derive(Clone, Debug, PartialEq)]
pub struct ParentFailure {
    pub target: String,
    pub atom: String,
    pub part: String,
}

#[inline]
fn blend_scalar(resident: Option<f32>, value: f32, weight: f32) -> f32 {
    match resident {
        Some(r) if weight < 1.0 => lerp_f32(r, value, weight),
        _ => value,
    }
}

#[inline]
fn blend_position(resident: Option<[f32; 3]>, value: [f32; 3], weight: f32) -> [f32; 3] {
    match resident {
        Some(r) if weight < 1.0 => lerp_vec3(r, value, weight),
        _ => value,
    }
}

#[inline]
fn blend_rotation(resident: Option<[f32; 4]>, value: [f32; 4], weight: f32) -> [f32; 4] {
    match resident {
        Some(r) if weight < 1.0 => slerp_quat(r, value, weight),
        _ => value,
    }
}

/// Blend every float param target of `clip` at `time`.
pub fn sample_params(clip: &Clip, time: f32, weight: f32, sink: &mut dyn AnimatableSink) {
    if weight <= 0.0 {
        return;
    }
    for target in clip.targets() {
        let Target::Param(p) = target else {
            continue;
        };
        let Some(value) = p.evaluate(time) else {
            continue;
        };
        let resident = sink.float_param(p.storable(), p.param());
        sink.set_float_param(p.storable(), p.param(), blend_scalar(resident, value, weight));
    }
}

/// Blend every transform target of `clip` at `time`.
///
/// Targets with a resolved parent are composed into world space. A parent that is
/// set but unresolved falls back to writing the raw values in local space; when
/// `report` is set the first failure per reference is appended to `failures`.
pub fn sample_transforms(
    clip: &mut Clip,
    time: f32,
    weight: f32,
    host: &mut Host<'_>,
    report: bool,
    failures: &mut Vec<ParentFailure>,
) {
    if weight <= 0.0 {
        return;
    }
    let scene = host.scene;
    for target in clip.targets_mut() {
        let Target::Transform(t) = target else {
            continue;
        };
        let position = if t.control_position {
            t.evaluate_position(time)
        } else {
            None
        };
        let rotation = if t.control_rotation {
            t.evaluate_rotation(time)
        } else {
            None
        };
        if position.is_none() && rotation.is_none() {
            continue;
        }

        let (space, frame) = match t.parent_mut().resolve(scene, !report) {
            ParentState::Free => (Space::Local, None),
            ParentState::Ready(frame) => (Space::World, Some(frame)),
            ParentState::Missing { first_failure } => {
                if first_failure {
                    if let Some(r) = t.parent().reference() {
                        failures.push(ParentFailure {
                            target: t.controller().to_string(),
                            atom: r.atom.clone(),
                            part: r.part.clone(),
                        });
                    }
                }
                (Space::Local, None)
            }
        };

        let controller = t.controller();
        if let Some(p) = position {
            let p = frame.map_or(p, |f| f.transform_point(p));
            let resident = host.sink.position(controller, space);
            host.sink
                .set_position(controller, space, blend_position(resident, p, weight));
        }
        if let Some(r) = rotation {
            let r = frame.map_or(r, |f| f.transform_rotation(r));
            let resident = host.sink.rotation(controller, space);
            host.sink
                .set_rotation(controller, space, blend_rotation(resident, r, weight));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::functions::IDENTITY_QUAT;
    use crate::scene::{BufferedSink, ControllerPose, Frame, StaticScene};
    use crate::target::{KeyValue, ParamTarget, TransformTarget};

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    fn clip_with_hand(x: f32) -> Clip {
        let mut clip = Clip::new("A", "Main Layer");
        let length = clip.length();
        clip.add_target(TransformTarget::with_channels("hand", true, false))
            .unwrap()
            .set_keyframe(0.0, KeyValue::Position([x, 0.0, 0.0]), None, length, true)
            .unwrap();
        clip
    }

    #[test]
    fn partial_weight_blends_from_resident_value() {
        let mut clip = Clip::new("A", "Main Layer");
        let length = clip.length();
        clip.add_target(ParamTarget::new("Person", "smile"))
            .unwrap()
            .set_keyframe(0.0, KeyValue::Float(1.0), None, length, true)
            .unwrap();
        let mut sink = BufferedSink::new();
        sink.add_param("Person", "smile", 0.0);
        sample_params(&clip, 0.0, 0.25, &mut sink);
        approx(sink.float_param("Person", "smile").unwrap(), 0.25, 1e-6);
    }

    #[test]
    fn zero_weight_writes_nothing() {
        let mut clip = clip_with_hand(3.0);
        let scene = StaticScene::new();
        let mut sink = BufferedSink::new();
        sink.add_controller("hand", ControllerPose::default());
        let mut failures = Vec::new();
        let mut host = Host::new(&scene, &mut sink);
        sample_transforms(&mut clip, 0.0, 0.0, &mut host, true, &mut failures);
        assert_eq!(sink.touched_controllers().count(), 0);
    }

    #[test]
    fn resolved_parent_composes_into_world() {
        let mut clip = clip_with_hand(1.0);
        if let Some(Target::Transform(t)) = clip.target_mut("hand") {
            t.set_parent("Table", "top");
        }
        let mut scene = StaticScene::new();
        scene.add_part("Table", "top", Frame::new([0.0, 2.0, 0.0], IDENTITY_QUAT));
        let mut sink = BufferedSink::new();
        sink.add_controller("hand", ControllerPose::default());
        let mut failures = Vec::new();
        let mut host = Host::new(&scene, &mut sink);
        sample_transforms(&mut clip, 0.0, 1.0, &mut host, true, &mut failures);
        let p = sink.position("hand", Space::World).unwrap();
        approx(p[0], 1.0, 1e-6);
        approx(p[1], 2.0, 1e-6);
        assert!(failures.is_empty());
    }

    #[test]
    fn missing_parent_falls_back_and_reports_once() {
        let mut clip = clip_with_hand(1.0);
        if let Some(Target::Transform(t)) = clip.target_mut("hand") {
            t.set_parent("Ghost", "top");
        }
        let mut scene = StaticScene::new();
        let mut sink = BufferedSink::new();
        sink.add_controller("hand", ControllerPose::default());
        let mut failures = Vec::new();
        for _ in 0..5 {
            let mut host = Host::new(&scene, &mut sink);
            sample_transforms(&mut clip, 0.0, 1.0, &mut host, true, &mut failures);
            scene.advance_frame();
        }
        assert_eq!(failures.len(), 1);
        approx(sink.position("hand", Space::Local).unwrap()[0], 1.0, 1e-6);
    }

    #[test]
    fn failed_capture_leaves_the_report_to_sampling() {
        let mut clip = clip_with_hand(1.0);
        let length = clip.length();
        let mut scene = StaticScene::new();
        let mut sink = BufferedSink::new();
        sink.add_controller("hand", ControllerPose::default());
        {
            let target = clip.target_mut("hand").unwrap();
            if let Target::Transform(t) = &mut *target {
                t.set_parent("Ghost", "top");
            }
            let host = Host::new(&scene, &mut sink);
            assert!(target.set_keyframe_to_current(0.5, length, &host).is_err());
        }
        scene.advance_frame();

        let mut failures = Vec::new();
        let mut host = Host::new(&scene, &mut sink);
        sample_transforms(&mut clip, 0.0, 1.0, &mut host, true, &mut failures);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].atom, "Ghost");
    }
}
