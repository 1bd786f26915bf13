//! Output contracts from the engine.
//!
//! Values are pushed straight into the host's sink; outputs only carry the
//! semantic events raised since the previous `update()`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ids::InstanceId;

/// Discrete signals raised by engine operations and ticks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EngineEvent {
    ClipsListChanged,
    CurrentAnimationChanged {
        before: Option<String>,
        after: String,
    },
    TimeChanged {
        time: f32,
    },
    PlaybackStarted {
        animation: String,
        layer: String,
    },
    PlaybackStopped {
        animation: String,
        layer: String,
    },
    TransitionStarted {
        layer: String,
        from: String,
        to: String,
        duration: f32,
    },
    SequencingFired {
        layer: String,
        from: String,
        to: String,
    },
    /// First failed resolution of a target's parent reference.
    ParentUnresolved {
        target: String,
        atom: String,
        part: String,
    },
    Rebuilt {
        targets: usize,
        stitched: usize,
    },
    PerformanceWarning {
        metric: String,
        value: f32,
        threshold: f32,
    },
    Error {
        message: String,
    },
}

/// Outputs returned by `AnimationEngine::update()`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    pub instance: InstanceId,
    #[serde(default)]
    pub events: VecDeque<EngineEvent>,
}

impl Outputs {
    pub fn new(instance: InstanceId) -> Self {
        Self {
            instance,
            events: VecDeque::new(),
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    #[inline]
    pub fn push_event(&mut self, event: EngineEvent) {
        self.events.push_back(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
