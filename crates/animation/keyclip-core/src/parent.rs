//! Parent reference frame binding for transform targets.
//!
//! The reference is an `(atom, part)` identifier pair. The resolved handle is a
//! cache that is re-validated through [`SceneResolver::part_frame`] every time it
//! is used, and failed lookups are retried at most once per scene frame.

use serde::{Deserialize, Serialize};

use crate::scene::{Frame, PartHandle, SceneResolver};

/// Identifiers of the scene object a target is keyed relative to.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ParentRef {
    pub atom: String,
    pub part: String,
}

/// Outcome of a resolution attempt.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ParentState {
    /// No parent reference: values are already in the controller's own space.
    Free,
    /// The parent resolved; values must be composed with this frame.
    Ready(Frame),
    /// The reference is set but unusable right now. `first_failure` is true the first
    /// time a non-silent attempt fails for this reference.
    Missing { first_failure: bool },
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParentBinding {
    reference: Option<ParentRef>,
    #[serde(skip)]
    handle: Option<PartHandle>,
    #[serde(skip)]
    last_check_frame: Option<u64>,
    #[serde(skip)]
    reported: bool,
}

impl PartialEq for ParentBinding {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl ParentBinding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reference(&self) -> Option<&ParentRef> {
        self.reference.as_ref()
    }

    /// Bind to `(atom, part)`. An empty part clears the binding, which is then
    /// immediately available.
    pub fn set_parent(&mut self, atom: &str, part: &str) {
        self.reference = if part.is_empty() {
            None
        } else {
            Some(ParentRef {
                atom: atom.to_string(),
                part: part.to_string(),
            })
        };
        self.handle = None;
        self.last_check_frame = None;
        self.reported = false;
    }

    pub fn clear(&mut self) {
        self.set_parent("", "");
    }

    /// True when there is no reference or the last resolution succeeded.
    pub fn available(&self) -> bool {
        self.reference.is_none() || self.handle.is_some()
    }

    pub fn handle(&self) -> Option<PartHandle> {
        self.handle
    }

    /// Whether a usable parent exists now (see [`resolve`](Self::resolve)).
    pub fn ensure_available(&mut self, scene: &dyn SceneResolver, silent: bool) -> bool {
        !matches!(self.resolve(scene, silent), ParentState::Missing { .. })
    }

    /// Validate the cached handle or try to resolve the reference.
    pub fn resolve(&mut self, scene: &dyn SceneResolver, silent: bool) -> ParentState {
        let Some(reference) = &self.reference else {
            return ParentState::Free;
        };

        if let Some(handle) = self.handle {
            match scene.part_frame(handle) {
                Some(frame) => return ParentState::Ready(frame),
                None => self.handle = None,
            }
        }

        let frame = scene.frame_count();
        if self.last_check_frame == Some(frame) {
            return ParentState::Missing {
                first_failure: false,
            };
        }
        self.last_check_frame = Some(frame);

        if scene.is_loading() {
            return ParentState::Missing {
                first_failure: false,
            };
        }

        let resolved = scene
            .resolve_atom(&reference.atom)
            .and_then(|atom| scene.resolve_part(atom, &reference.part))
            .and_then(|part| scene.part_frame(part).map(|f| (part, f)));

        match resolved {
            Some((part, frame)) => {
                self.handle = Some(part);
                ParentState::Ready(frame)
            }
            None => {
                let first_failure = !silent && !self.reported;
                if first_failure {
                    self.reported = true;
                }
                ParentState::Missing { first_failure }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::StaticScene;

    #[test]
    fn empty_part_clears_reference() {
        let mut b = ParentBinding::new();
        b.set_parent("Table", "top");
        assert!(!b.available());
        b.set_parent("Table", "");
        assert!(b.available());
        assert!(b.reference().is_none());
    }

    #[test]
    fn failed_lookup_is_throttled_per_frame_and_reported_once() {
        let mut scene = StaticScene::new();
        let mut b = ParentBinding::new();
        b.set_parent("Ghost", "hand");

        assert_eq!(
            b.resolve(&scene, false),
            ParentState::Missing { first_failure: true }
        );
        // Same frame: no new lookup.
        assert_eq!(
            b.resolve(&scene, false),
            ParentState::Missing {
                first_failure: false
            }
        );
        scene.advance_frame();
        assert_eq!(
            b.resolve(&scene, false),
            ParentState::Missing {
                first_failure: false
            }
        );
    }

    #[test]
    fn silent_attempts_do_not_consume_the_report() {
        let mut scene = StaticScene::new();
        let mut b = ParentBinding::new();
        b.set_parent("Ghost", "hand");
        assert!(!b.ensure_available(&scene, true));
        scene.advance_frame();
        assert_eq!(
            b.resolve(&scene, false),
            ParentState::Missing { first_failure: true }
        );
    }

    #[test]
    fn torn_down_part_invalidates_cache() {
        let mut scene = StaticScene::new();
        let frame = Frame::new([1.0, 0.0, 0.0], crate::interp::functions::IDENTITY_QUAT);
        scene.add_part("Table", "top", frame);
        let mut b = ParentBinding::new();
        b.set_parent("Table", "top");
        assert_eq!(b.resolve(&scene, false), ParentState::Ready(frame));
        assert!(b.handle().is_some());

        scene.remove_atom("Table");
        assert!(matches!(
            b.resolve(&scene, false),
            ParentState::Missing { .. }
        ));
        assert!(!b.available());
    }
}
