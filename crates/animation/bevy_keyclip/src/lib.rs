//! Bevy adapter for `keyclip-core`.
//!
//! Each tick the ECS is mirrored into a [`StaticScene`](keyclip_core::StaticScene)
//! (atoms and their parts) and a [`BufferedSink`](keyclip_core::BufferedSink)
//! (controllers and float params), the engine runs against them, and whatever it
//! wrote is copied back onto `Transform`s and [`KeyclipParams`].
//!
//! `Update` drives [`AnimationEngine::update`]; `FixedUpdate` drives
//! [`AnimationEngine::fixed_update`].

use bevy::prelude::*;
use keyclip_core::{AnimationEngine, EngineConfig};

pub mod components;
pub mod resources;
pub mod systems;

pub use components::{KeyclipAtom, KeyclipController, KeyclipPart};
pub use resources::{FixedDt, KeyclipEvents, KeyclipHost, KeyclipParams, PendingInputs};

#[derive(Resource)]
pub struct KeyclipEngine(pub AnimationEngine);

#[derive(Default)]
pub struct KeyclipPlugin {
    pub config: EngineConfig,
}

impl Plugin for KeyclipPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(KeyclipEngine(AnimationEngine::new(
            "bevy",
            self.config.clone(),
        )))
        .init_resource::<PendingInputs>()
        .init_resource::<KeyclipHost>()
        .init_resource::<KeyclipParams>()
        .init_resource::<KeyclipEvents>()
        .init_resource::<FixedDt>()
        .add_systems(
            Update,
            (
                systems::sync_host_system,
                systems::update_engine_system,
                systems::apply_sink_system,
            )
                .chain(),
        )
        .add_systems(
            FixedUpdate,
            (
                systems::sync_host_system,
                systems::fixed_update_engine_system,
                systems::apply_sink_system,
            )
                .chain(),
        );
    }
}
