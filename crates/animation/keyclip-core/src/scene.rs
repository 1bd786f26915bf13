//! Host-facing interfaces.
//!
//! The core never owns scene objects. It asks a [`SceneResolver`] for opaque
//! handles (atoms and their rigid sub-parts) and pushes evaluated values into an
//! [`AnimatableSink`]. Adapters (Bevy, tests) implement both; [`StaticScene`] and
//! [`BufferedSink`] are ready-made in-memory versions that adapters can fill from
//! their own world and apply back after a tick.

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use crate::interp::functions::{quat_conjugate, quat_mul, quat_rotate, IDENTITY_QUAT};

/// Opaque handle to a resolved atom (a named scene object).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct AtomHandle(pub u64);

/// Opaque handle to a rigid sub-part of an atom.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PartHandle(pub u64);

/// Rigid pose: position plus rotation quaternion `[x, y, z, w]`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl Default for Frame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Frame {
    pub const IDENTITY: Frame = Frame {
        position: [0.0; 3],
        rotation: IDENTITY_QUAT,
    };

    pub fn new(position: [f32; 3], rotation: [f32; 4]) -> Self {
        Self { position, rotation }
    }

    /// Map a point expressed in this frame into the outer frame.
    pub fn transform_point(&self, local: [f32; 3]) -> [f32; 3] {
        let r = quat_rotate(self.rotation, local);
        [
            r[0] + self.position[0],
            r[1] + self.position[1],
            r[2] + self.position[2],
        ]
    }

    /// Map a point expressed in the outer frame into this frame.
    pub fn inverse_transform_point(&self, world: [f32; 3]) -> [f32; 3] {
        let d = [
            world[0] - self.position[0],
            world[1] - self.position[1],
            world[2] - self.position[2],
        ];
        quat_rotate(quat_conjugate(self.rotation), d)
    }

    /// Rotation expressed in this frame, mapped to the outer frame.
    pub fn transform_rotation(&self, local: [f32; 4]) -> [f32; 4] {
        quat_mul(self.rotation, local)
    }

    /// Rotation expressed in the outer frame, mapped into this frame.
    pub fn inverse_transform_rotation(&self, world: [f32; 4]) -> [f32; 4] {
        quat_mul(quat_conjugate(self.rotation), world)
    }

    /// Compose a pose expressed in this frame into the outer frame.
    pub fn compose(&self, local: &Frame) -> Frame {
        Frame {
            position: self.transform_point(local.position),
            rotation: self.transform_rotation(local.rotation),
        }
    }

    /// Express an outer-frame pose relative to this frame.
    pub fn relative(&self, world: &Frame) -> Frame {
        Frame {
            position: self.inverse_transform_point(world.position),
            rotation: self.inverse_transform_rotation(world.rotation),
        }
    }
}

/// Coordinate space of a sink read/write.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Space {
    /// The controller's own local space (what keyframes without a parent are stored in).
    Local,
    /// Scene space; used when a target is keyed relative to an explicit parent.
    World,
}

/// Resolves scene objects for parent binding. All lookups may fail.
pub trait SceneResolver {
    /// Monotonic tick counter used to throttle failed lookups.
    fn frame_count(&self) -> u64;

    /// True while the host is loading a scene; resolution is not attempted.
    fn is_loading(&self) -> bool {
        false
    }

    fn resolve_atom(&self, atom_id: &str) -> Option<AtomHandle>;

    fn resolve_part(&self, atom: AtomHandle, part_id: &str) -> Option<PartHandle>;

    /// Current pose of a part, or None when it no longer exists.
    fn part_frame(&self, part: PartHandle) -> Option<Frame>;
}

/// Destination of evaluated values. Unknown names read as `None` and ignore writes.
pub trait AnimatableSink {
    fn position(&self, controller: &str, space: Space) -> Option<[f32; 3]>;
    fn rotation(&self, controller: &str, space: Space) -> Option<[f32; 4]>;
    fn set_position(&mut self, controller: &str, space: Space, value: [f32; 3]);
    fn set_rotation(&mut self, controller: &str, space: Space, value: [f32; 4]);
    fn float_param(&self, storable: &str, param: &str) -> Option<f32>;
    fn set_float_param(&mut self, storable: &str, param: &str, value: f32);
}

/// Optional external timeline object mirrored by clips that name one.
pub trait PatternDriver {
    fn set_float_param(&mut self, pattern: &str, name: &str, value: f32);
    fn set_bool_param(&mut self, pattern: &str, name: &str, value: bool);
    fn reset_and_play(&mut self, pattern: &str);
}

/// Host collaborators for calls that sample and apply values.
pub struct Host<'a> {
    pub scene: &'a dyn SceneResolver,
    pub sink: &'a mut dyn AnimatableSink,
}

impl<'a> Host<'a> {
    pub fn new(scene: &'a dyn SceneResolver, sink: &'a mut dyn AnimatableSink) -> Self {
        Self { scene, sink }
    }
}

/// In-memory scene: atoms, their parts and part poses.
#[derive(Debug, Default, Clone)]
pub struct StaticScene {
    atoms: HashMap<String, AtomHandle>,
    parts: HashMap<(AtomHandle, String), PartHandle>,
    frames: HashMap<PartHandle, Frame>,
    next_handle: u64,
    frame_count: u64,
    loading: bool,
}

impl StaticScene {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self) -> u64 {
        let id = self.next_handle;
        self.next_handle = self.next_handle.wrapping_add(1);
        id
    }

    /// Register an atom under `atom_id`, reusing the handle if it already exists.
    pub fn add_atom(&mut self, atom_id: &str) -> AtomHandle {
        if let Some(h) = self.atoms.get(atom_id) {
            return *h;
        }
        let handle = AtomHandle(self.alloc());
        self.atoms.insert(atom_id.to_string(), handle);
        handle
    }

    /// Register an atom with a caller-chosen handle (adapters use their own ids).
    pub fn insert_atom(&mut self, atom_id: &str, handle: AtomHandle) {
        self.atoms.insert(atom_id.to_string(), handle);
    }

    /// Register (or move) a part of an atom, creating the atom if needed.
    pub fn add_part(&mut self, atom_id: &str, part_id: &str, frame: Frame) -> PartHandle {
        let atom = self.add_atom(atom_id);
        let key = (atom, part_id.to_string());
        let handle = match self.parts.get(&key) {
            Some(h) => *h,
            None => {
                let h = PartHandle(self.alloc());
                self.parts.insert(key, h);
                h
            }
        };
        self.frames.insert(handle, frame);
        handle
    }

    /// Register a part with a caller-chosen handle.
    pub fn insert_part(&mut self, atom: AtomHandle, part_id: &str, handle: PartHandle, frame: Frame) {
        self.parts.insert((atom, part_id.to_string()), handle);
        self.frames.insert(handle, frame);
    }

    pub fn set_part_frame(&mut self, part: PartHandle, frame: Frame) {
        if let Some(f) = self.frames.get_mut(&part) {
            *f = frame;
        }
    }

    /// Tear down an atom and all of its parts.
    pub fn remove_atom(&mut self, atom_id: &str) {
        if let Some(atom) = self.atoms.remove(atom_id) {
            let dead: Vec<PartHandle> = self
                .parts
                .iter()
                .filter(|((a, _), _)| *a == atom)
                .map(|(_, h)| *h)
                .collect();
            self.parts.retain(|(a, _), _| *a != atom);
            for h in dead {
                self.frames.remove(&h);
            }
        }
    }

    pub fn set_frame_count(&mut self, frame: u64) {
        self.frame_count = frame;
    }

    pub fn advance_frame(&mut self) {
        self.frame_count = self.frame_count.wrapping_add(1);
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

impl SceneResolver for StaticScene {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn resolve_atom(&self, atom_id: &str) -> Option<AtomHandle> {
        self.atoms.get(atom_id).copied()
    }

    fn resolve_part(&self, atom: AtomHandle, part_id: &str) -> Option<PartHandle> {
        self.parts.get(&(atom, part_id.to_string())).copied()
    }

    fn part_frame(&self, part: PartHandle) -> Option<Frame> {
        self.frames.get(&part).copied()
    }
}

/// Pose of one controller as seen by [`BufferedSink`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerPose {
    pub local: Frame,
    /// World pose of the controller's hierarchy parent; None means local == world.
    pub hierarchy_parent: Option<Frame>,
}

impl ControllerPose {
    pub fn world(&self) -> Frame {
        match &self.hierarchy_parent {
            Some(parent) => parent.compose(&self.local),
            None => self.local,
        }
    }
}

/// In-memory sink that records which controllers and params were written.
#[derive(Debug, Default, Clone)]
pub struct BufferedSink {
    controllers: HashMap<String, ControllerPose>,
    params: HashMap<(String, String), f32>,
    touched_controllers: HashSet<String>,
    touched_params: HashSet<(String, String)>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_controller(&mut self, name: &str, pose: ControllerPose) {
        self.controllers.insert(name.to_string(), pose);
    }

    pub fn remove_controller(&mut self, name: &str) {
        self.controllers.remove(name);
    }

    pub fn add_param(&mut self, storable: &str, param: &str, value: f32) {
        self.params
            .insert((storable.to_string(), param.to_string()), value);
    }

    pub fn controller(&self, name: &str) -> Option<&ControllerPose> {
        self.controllers.get(name)
    }

    /// Controllers written since the last `clear_touched`.
    pub fn touched_controllers(&self) -> impl Iterator<Item = (&str, &ControllerPose)> {
        self.touched_controllers.iter().filter_map(|name| {
            self.controllers
                .get(name)
                .map(|pose| (name.as_str(), pose))
        })
    }

    /// Params written since the last `clear_touched`.
    pub fn touched_params(&self) -> impl Iterator<Item = (&str, &str, f32)> {
        self.touched_params.iter().filter_map(|key| {
            self.params
                .get(key)
                .map(|v| (key.0.as_str(), key.1.as_str(), *v))
        })
    }

    pub fn clear_touched(&mut self) {
        self.touched_controllers.clear();
        self.touched_params.clear();
    }
}

impl AnimatableSink for BufferedSink {
    fn position(&self, controller: &str, space: Space) -> Option<[f32; 3]> {
        let pose = self.controllers.get(controller)?;
        Some(match space {
            Space::Local => pose.local.position,
            Space::World => pose.world().position,
        })
    }

    fn rotation(&self, controller: &str, space: Space) -> Option<[f32; 4]> {
        let pose = self.controllers.get(controller)?;
        Some(match space {
            Space::Local => pose.local.rotation,
            Space::World => pose.world().rotation,
        })
    }

    fn set_position(&mut self, controller: &str, space: Space, value: [f32; 3]) {
        let Some(pose) = self.controllers.get_mut(controller) else {
            return;
        };
        pose.local.position = match (space, &pose.hierarchy_parent) {
            (Space::World, Some(parent)) => parent.inverse_transform_point(value),
            _ => value,
        };
        self.touched_controllers.insert(controller.to_string());
    }

    fn set_rotation(&mut self, controller: &str, space: Space, value: [f32; 4]) {
        let Some(pose) = self.controllers.get_mut(controller) else {
            return;
        };
        pose.local.rotation = match (space, &pose.hierarchy_parent) {
            (Space::World, Some(parent)) => parent.inverse_transform_rotation(value),
            _ => value,
        };
        self.touched_controllers.insert(controller.to_string());
    }

    fn float_param(&self, storable: &str, param: &str) -> Option<f32> {
        self.params
            .get(&(storable.to_string(), param.to_string()))
            .copied()
    }

    fn set_float_param(&mut self, storable: &str, param: &str, value: f32) {
        let key = (storable.to_string(), param.to_string());
        if let Some(v) = self.params.get_mut(&key) {
            *v = value;
            self.touched_params.insert(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx3(a: [f32; 3], b: [f32; 3]) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < 1e-5, "left={a:?} right={b:?}");
        }
    }

    #[test]
    fn frame_round_trips_points() {
        let half = std::f32::consts::FRAC_PI_4;
        let f = Frame::new([1.0, 2.0, 3.0], [0.0, half.sin(), 0.0, half.cos()]);
        let p = [0.5, -1.0, 2.0];
        approx3(f.inverse_transform_point(f.transform_point(p)), p);
    }

    #[test]
    fn removed_atom_parts_stop_resolving() {
        let mut scene = StaticScene::new();
        let part = scene.add_part("Table", "top", Frame::IDENTITY);
        let atom = scene.resolve_atom("Table").unwrap();
        assert_eq!(scene.resolve_part(atom, "top"), Some(part));
        scene.remove_atom("Table");
        assert!(scene.resolve_atom("Table").is_none());
        assert!(scene.part_frame(part).is_none());
    }

    #[test]
    fn world_writes_respect_hierarchy_parent() {
        let mut sink = BufferedSink::new();
        sink.add_controller(
            "hand",
            ControllerPose {
                local: Frame::IDENTITY,
                hierarchy_parent: Some(Frame::new([10.0, 0.0, 0.0], IDENTITY_QUAT)),
            },
        );
        sink.set_position("hand", Space::World, [11.0, 0.0, 0.0]);
        approx3(sink.position("hand", Space::Local).unwrap(), [1.0, 0.0, 0.0]);
        approx3(sink.position("hand", Space::World).unwrap(), [11.0, 0.0, 0.0]);
        assert_eq!(sink.touched_controllers().count(), 1);
    }

    #[test]
    fn unknown_names_are_ignored() {
        let mut sink = BufferedSink::new();
        sink.set_position("ghost", Space::Local, [1.0, 1.0, 1.0]);
        sink.set_float_param("s", "p", 1.0);
        assert!(sink.position("ghost", Space::Local).is_none());
        assert!(sink.float_param("s", "p").is_none());
        assert_eq!(sink.touched_controllers().count(), 0);
    }
}
