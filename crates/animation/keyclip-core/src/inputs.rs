//! Input contracts for the engine.
//!
//! Adapters queue commands and pass them into `AnimationEngine::update()`; they
//! are applied before sequencing and parameter sampling for that tick.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Inputs {
    #[serde(default)]
    pub commands: Vec<Command>,
}

impl Inputs {
    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Play {
        animation: String,
        #[serde(default)]
        sequencing: bool,
    },
    Stop {
        animation: String,
    },
    StopAll,
    Select {
        animation: String,
    },
    SetSpeed {
        speed: f32,
    },
    SetTime {
        time: f32,
    },
    Rebuild,
}
