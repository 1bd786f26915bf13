use std::sync::{Arc, Mutex};

use keyclip_core::{
    BufferedSink, Clip, ControllerPose, CurveType, Frame, Host, KeyValue, ParamTarget,
    PatternDriver, StaticScene, TransformTarget,
};

pub const LAYER: &str = "Main Layer";

pub mod clips {
    use super::*;

    /// Clip with one float param target keyed at the given `(time, value)` pairs.
    pub fn param_clip(name: &str, layer: &str, length: f32, keys: &[(f32, f32)]) -> Clip {
        let mut clip = Clip::new(name, layer);
        clip.set_length(length).expect("positive length");
        let target = clip
            .add_target(ParamTarget::new("Person", "smile"))
            .expect("fresh clip");
        for (t, v) in keys {
            target
                .set_keyframe(*t, KeyValue::Float(*v), Some(CurveType::Smooth), length, true)
                .expect("param keyframe");
        }
        clip
    }

    /// Clip moving `controller` along x through the given `(time, x)` keys.
    pub fn slide_clip(
        name: &str,
        layer: &str,
        controller: &str,
        length: f32,
        keys: &[(f32, f32)],
    ) -> Clip {
        let mut clip = Clip::new(name, layer);
        clip.set_length(length).expect("positive length");
        let target = clip
            .add_target(TransformTarget::with_channels(controller, true, false))
            .expect("fresh clip");
        for (t, x) in keys {
            target
                .set_keyframe(*t, KeyValue::Position([*x, 0.0, 0.0]), None, length, true)
                .expect("position keyframe");
        }
        clip
    }

    /// Clip rotating `controller` through the given `(time, quaternion)` keys.
    pub fn turn_clip(
        name: &str,
        layer: &str,
        controller: &str,
        length: f32,
        keys: &[(f32, [f32; 4])],
    ) -> Clip {
        let mut clip = Clip::new(name, layer);
        clip.set_length(length).expect("positive length");
        let target = clip
            .add_target(TransformTarget::with_channels(controller, false, true))
            .expect("fresh clip");
        for (t, q) in keys {
            target
                .set_keyframe(*t, KeyValue::Rotation(*q), None, length, true)
                .expect("rotation keyframe");
        }
        clip
    }
}

/// In-memory scene and sink bundled for tests.
#[derive(Debug, Default)]
pub struct TestHost {
    pub scene: StaticScene,
    pub sink: BufferedSink,
}

impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controller(mut self, name: &str) -> Self {
        self.sink.add_controller(name, ControllerPose::default());
        self
    }

    pub fn with_param(mut self, storable: &str, param: &str, value: f32) -> Self {
        self.sink.add_param(storable, param, value);
        self
    }

    pub fn with_part(mut self, atom: &str, part: &str, frame: Frame) -> Self {
        self.scene.add_part(atom, part, frame);
        self
    }

    pub fn host(&mut self) -> Host<'_> {
        Host::new(&self.scene, &mut self.sink)
    }

    pub fn x(&self, controller: &str) -> f32 {
        self.sink
            .controller(controller)
            .map(|c| c.local.position[0])
            .unwrap_or(f32::NAN)
    }
}

/// One call received by [`RecordingPatterns`].
#[derive(Clone, Debug, PartialEq)]
pub enum PatternCall {
    Float(String, String, f32),
    Bool(String, String, bool),
    ResetAndPlay(String),
}

/// Pattern driver that records every call into a shared log.
#[derive(Clone, Debug, Default)]
pub struct RecordingPatterns {
    pub calls: Arc<Mutex<Vec<PatternCall>>>,
}

impl RecordingPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<PatternCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: PatternCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl PatternDriver for RecordingPatterns {
    fn set_float_param(&mut self, pattern: &str, name: &str, value: f32) {
        self.record(PatternCall::Float(pattern.into(), name.into(), value));
    }

    fn set_bool_param(&mut self, pattern: &str, name: &str, value: bool) {
        self.record(PatternCall::Bool(pattern.into(), name.into(), value));
    }

    fn reset_and_play(&mut self, pattern: &str) {
        self.record(PatternCall::ResetAndPlay(pattern.into()));
    }
}

/// Float comparison used across behavioural tests.
pub fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}
