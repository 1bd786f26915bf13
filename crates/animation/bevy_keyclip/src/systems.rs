use bevy::core::FrameCount;
use bevy::prelude::*;
use hashbrown::HashMap;
use keyclip_core::{AtomHandle, BufferedSink, ControllerPose, Frame, Host, PartHandle, StaticScene};

use crate::components::{KeyclipAtom, KeyclipController, KeyclipPart};
use crate::resources::{FixedDt, KeyclipEvents, KeyclipHost, KeyclipParams, PendingInputs};
use crate::KeyclipEngine;

fn local_frame(tf: &Transform) -> Frame {
    Frame::new(tf.translation.to_array(), tf.rotation.to_array())
}

fn global_frame(gt: &GlobalTransform) -> Frame {
    let (_scale, rotation, translation) = gt.to_scale_rotation_translation();
    Frame::new(translation.to_array(), rotation.to_array())
}

/// Mirrors atoms, parts, controllers and params into a fresh scene and sink.
/// Entity bits are used as handles so bindings cached by the engine stay valid
/// across ticks for as long as the entity lives.
#[allow(clippy::too_many_arguments)]
pub fn sync_host_system(
    atoms: Query<(Entity, &KeyclipAtom)>,
    parts: Query<(&KeyclipPart, &GlobalTransform)>,
    children: Query<&Children>,
    controllers: Query<(&KeyclipController, &Transform, Option<&Parent>)>,
    globals: Query<&GlobalTransform>,
    frames: Option<Res<FrameCount>>,
    params: Res<KeyclipParams>,
    mut host: ResMut<KeyclipHost>,
) {
    let mut scene = StaticScene::new();
    scene.set_frame_count(frames.map_or(0, |f| u64::from(f.0)));

    // Depth-first walk collecting every part below an atom
    fn walk(
        e: Entity,
        atom: AtomHandle,
        scene: &mut StaticScene,
        parts: &Query<(&KeyclipPart, &GlobalTransform)>,
        children: &Query<&Children>,
    ) {
        if let Ok((part, gt)) = parts.get(e) {
            scene.insert_part(atom, &part.name, PartHandle(e.to_bits()), global_frame(gt));
        }
        if let Ok(cs) = children.get(e) {
            for &c in cs.iter() {
                walk(c, atom, scene, parts, children);
            }
        }
    }

    let mut seen: HashMap<&str, Entity> = HashMap::new();
    for (entity, atom) in atoms.iter() {
        if let Some(previous) = seen.insert(atom.id.as_str(), entity) {
            log::warn!(
                "atom id {} is used by {:?} and {:?}; the latter wins",
                atom.id,
                previous,
                entity
            );
        }
        let handle = AtomHandle(entity.to_bits());
        scene.insert_atom(&atom.id, handle);
        walk(entity, handle, &mut scene, &parts, &children);
    }

    let mut sink = BufferedSink::new();
    for (controller, tf, parent) in controllers.iter() {
        let hierarchy_parent = parent
            .and_then(|p| globals.get(p.get()).ok())
            .map(global_frame);
        sink.add_controller(
            &controller.name,
            ControllerPose {
                local: local_frame(tf),
                hierarchy_parent,
            },
        );
    }
    for ((storable, param), value) in params.values.iter() {
        sink.add_param(storable, param, *value);
    }

    host.scene = scene;
    host.sink = sink;
}

/// Variable-rate tick: drains queued commands and records the returned events.
pub fn update_engine_system(
    time: Res<Time>,
    mut eng: ResMut<KeyclipEngine>,
    mut pending: ResMut<PendingInputs>,
    mut host: ResMut<KeyclipHost>,
    mut events: ResMut<KeyclipEvents>,
) {
    let inputs = std::mem::take(&mut pending.0);
    let KeyclipHost { scene, sink } = &mut *host;
    let mut h = Host::new(&*scene, sink);
    let out = eng.0.update(time.delta_seconds(), inputs, &mut h);
    events.events.clear();
    events.events.extend(out.events.iter().cloned());
}

/// Fixed timestep: advance the clock and sample transforms with the fixed dt.
pub fn fixed_update_engine_system(
    dt: Res<FixedDt>,
    mut eng: ResMut<KeyclipEngine>,
    mut host: ResMut<KeyclipHost>,
) {
    let KeyclipHost { scene, sink } = &mut *host;
    let mut h = Host::new(&*scene, sink);
    eng.0.fixed_update(dt.0, &mut h);
}

/// Copy controller poses and params written during the tick back into the ECS.
pub fn apply_sink_system(
    mut host: ResMut<KeyclipHost>,
    mut controllers: Query<(&KeyclipController, &mut Transform)>,
    mut params: ResMut<KeyclipParams>,
) {
    let touched: HashMap<String, ControllerPose> = host
        .sink
        .touched_controllers()
        .map(|(name, pose)| (name.to_string(), *pose))
        .collect();
    if !touched.is_empty() {
        for (controller, mut tf) in controllers.iter_mut() {
            if let Some(pose) = touched.get(&controller.name) {
                tf.translation = Vec3::from_array(pose.local.position);
                tf.rotation = Quat::from_array(pose.local.rotation).normalize();
            }
        }
    }
    for (storable, param, value) in host.sink.touched_params() {
        params.insert(storable, param, value);
    }
    host.sink.clear_touched();
}
