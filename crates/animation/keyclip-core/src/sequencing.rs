//! Next-clip directives.
//!
//! A clip's `next_animation_name` is either a literal clip name, the randomize
//! token (any other clip of the same animation set) or a group pattern ending in
//! `/*` (any other clip whose name starts with the prefix). The directive is
//! resolved once per play so a random pick stays stable for that run.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::clip::Clip;
use crate::config::snap;
use crate::error::{ClipError, Result};
use crate::playback::{ClipSlot, NextClip};

pub const RANDOMIZE_ANIMATION_NAME: &str = "(Randomize)";
pub const RANDOMIZE_GROUP_SUFFIX: &str = "/*";

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Directive<'a> {
    Literal(&'a str),
    Randomize,
    Group(&'a str),
}

impl<'a> Directive<'a> {
    pub fn parse(name: &'a str) -> Self {
        if name == RANDOMIZE_ANIMATION_NAME {
            Directive::Randomize
        } else if let Some(prefix) = name.strip_suffix(RANDOMIZE_GROUP_SUFFIX) {
            Directive::Group(prefix)
        } else {
            Directive::Literal(name)
        }
    }
}

/// Pool key for the randomize directive.
fn animation_set(clip: &Clip) -> &str {
    clip.animation_set().unwrap_or(clip.layer())
}

/// Resolve the successor of `slots[index]` started at `play_time`.
///
/// Returns `Ok(None)` when sequencing is off for this clip (no directive, a
/// non-positive delay, or no eligible candidate) and an error when a literal
/// name does not exist in the clip's layer.
pub fn resolve_next(
    slots: &[ClipSlot],
    index: usize,
    play_time: f32,
    step: f32,
    rng: &mut StdRng,
) -> Result<Option<NextClip>> {
    let Some(slot) = slots.get(index) else {
        return Ok(None);
    };
    let clip = &slot.clip;
    let Some(directive) = clip.next_animation_name() else {
        return Ok(None);
    };
    if clip.next_animation_time() <= 0.0 || slots.len() < 2 {
        return Ok(None);
    }

    let others = slots
        .iter()
        .map(|s| &s.clip)
        .filter(|c| c.layer() == clip.layer() && c.name() != clip.name());

    let name = match Directive::parse(directive) {
        Directive::Literal(name) => {
            if !slots
                .iter()
                .any(|s| s.clip.layer() == clip.layer() && s.clip.name() == name)
            {
                return Err(ClipError::ClipNotFound {
                    name: name.to_string(),
                });
            }
            Some(name.to_string())
        }
        Directive::Randomize => {
            let set = animation_set(clip);
            let pool: Vec<&str> = others
                .filter(|c| animation_set(c) == set)
                .map(Clip::name)
                .collect();
            pool.choose(rng).map(|n| n.to_string())
        }
        Directive::Group(prefix) => {
            let pool: Vec<&str> = others
                .filter(|c| c.name().starts_with(prefix))
                .map(Clip::name)
                .collect();
            pool.choose(rng).map(|n| n.to_string())
        }
    };

    Ok(name.map(|name| NextClip {
        name,
        trigger_time: snap(play_time + clip.next_animation_time(), step),
    }))
}
