//! Per-clip playback state and engine-wide clock.

use serde::{Deserialize, Serialize};

use crate::clip::Clip;

/// Linear weight ramp.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub from: f32,
    pub to: f32,
    pub duration: f32,
    pub elapsed: f32,
}

impl Ramp {
    pub fn new(from: f32, to: f32, duration: f32) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: 0.0,
        }
    }

    #[inline]
    pub fn value(&self) -> f32 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let s = (self.elapsed / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * s
    }

    #[inline]
    pub fn finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    BlendingIn,
    Main,
    BlendingOut,
}

/// Successor resolved once when a clip becomes main with sequencing on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NextClip {
    pub name: String,
    /// Absolute engine time at which the transition fires.
    pub trigger_time: f32,
}

/// What finished during [`PlaybackState::advance_blend`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BlendOutcome {
    ReachedMain,
    FadedOut,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub clip_time: f32,
    pub weight: f32,
    pub enabled: bool,
    pub main_in_layer: bool,
    /// Whether this clip fires its successor; set per play so layers don't share it.
    #[serde(default)]
    pub sequencing: bool,
    pub blend: Option<Ramp>,
    pub next: Option<NextClip>,
}

impl PlaybackState {
    pub fn phase(&self) -> Phase {
        if !self.enabled {
            return Phase::Idle;
        }
        match &self.blend {
            Some(r) if r.to > r.from => Phase::BlendingIn,
            Some(_) => Phase::BlendingOut,
            None => Phase::Main,
        }
    }

    /// Become main in the layer, ramping up over `duration`. A clip starting from
    /// zero weight restarts at time 0; one that was still audible keeps its time.
    pub fn blend_in(&mut self, duration: f32) {
        if !self.enabled || self.weight <= 0.0 {
            self.clip_time = 0.0;
            self.weight = 0.0;
        }
        self.enabled = true;
        self.main_in_layer = true;
        if duration > 0.0 && self.weight < 1.0 {
            self.blend = Some(Ramp::new(self.weight, 1.0, duration));
        } else {
            self.weight = 1.0;
            self.blend = None;
        }
    }

    /// Leave main, ramping down over `duration`.
    pub fn blend_out(&mut self, duration: f32) {
        self.main_in_layer = false;
        self.sequencing = false;
        self.next = None;
        if duration > 0.0 && self.enabled && self.weight > 0.0 {
            self.blend = Some(Ramp::new(self.weight, 0.0, duration));
        } else {
            self.reset();
        }
    }

    /// Immediately idle; the clip time is kept for inspection.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.main_in_layer = false;
        self.sequencing = false;
        self.weight = 0.0;
        self.blend = None;
        self.next = None;
    }

    pub fn advance_blend(&mut self, dt: f32) -> Option<BlendOutcome> {
        let ramp = self.blend.as_mut()?;
        ramp.elapsed += dt;
        self.weight = ramp.value();
        if !ramp.finished() {
            return None;
        }
        let fading_out = ramp.to <= 0.0;
        self.blend = None;
        if fading_out {
            self.reset();
            Some(BlendOutcome::FadedOut)
        } else {
            self.weight = 1.0;
            Some(BlendOutcome::ReachedMain)
        }
    }

    /// Advance local time; loops wrap and one-shots hold at the end.
    pub fn advance_time(&mut self, dt: f32, clip: &Clip) {
        self.clip_time = wrap_time(self.clip_time + dt, clip);
    }
}

/// Map a time into the clip's range.
pub fn wrap_time(time: f32, clip: &Clip) -> f32 {
    let length = clip.length();
    if length <= 0.0 {
        return 0.0;
    }
    if clip.looping() {
        let t = time.rem_euclid(length);
        // rem_euclid can return `length` itself for tiny negative inputs.
        if t >= length {
            0.0
        } else {
            t
        }
    } else {
        time.clamp(0.0, length)
    }
}

/// Engine-wide clock and flags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub play_time: f32,
    pub is_playing: bool,
    /// Sequencing flag of the last `play`; firing is decided per clip.
    pub sequencing: bool,
    pub speed: f32,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            play_time: 0.0,
            is_playing: false,
            sequencing: false,
            speed: 1.0,
        }
    }
}

/// A clip together with its runtime state.
#[derive(Clone, Debug)]
pub struct ClipSlot {
    pub clip: Clip,
    pub state: PlaybackState,
}

impl ClipSlot {
    pub fn new(clip: Clip) -> Self {
        Self {
            clip,
            state: PlaybackState::default(),
        }
    }
}
