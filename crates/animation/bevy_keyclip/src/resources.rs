use bevy::prelude::*;
use hashbrown::HashMap;
use keyclip_core::{BufferedSink, EngineEvent, Inputs, StaticScene};

/// Commands queued by gameplay code, drained by the next `Update`.
#[derive(Resource, Default)]
pub struct PendingInputs(pub Inputs);

/// Scene and sink mirrored from the ECS for the current tick.
#[derive(Resource, Default)]
pub struct KeyclipHost {
    pub scene: StaticScene,
    pub sink: BufferedSink,
}

/// Float params exposed to the engine, keyed by `(storable, param)`. Values the
/// engine writes land back here.
#[derive(Resource, Default, Debug)]
pub struct KeyclipParams {
    pub values: HashMap<(String, String), f32>,
}

impl KeyclipParams {
    pub fn insert(&mut self, storable: &str, param: &str, value: f32) {
        self.values
            .insert((storable.to_string(), param.to_string()), value);
    }

    pub fn get(&self, storable: &str, param: &str) -> Option<f32> {
        self.values
            .get(&(storable.to_string(), param.to_string()))
            .copied()
    }
}

/// Events returned by the last `Update`.
#[derive(Resource, Default, Debug)]
pub struct KeyclipEvents {
    pub events: Vec<EngineEvent>,
}

/// Fixed timestep configuration (seconds per tick).
#[derive(Resource)]
pub struct FixedDt(pub f32);

impl Default for FixedDt {
    fn default() -> Self {
        Self(1.0 / 60.0)
    }
}
