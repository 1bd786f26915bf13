//! Engine: owns clips and their playback state across layers.
//!
//! Methods:
//! - clip management: add_clip, new_clip, remove_clip, clip/clip_mut, names
//! - playback: play, stop, stop_all, select_animation, set_time, set_speed
//! - rebuild: loop anchoring, tangents, continuity, transition stitching
//! - ticks: update (commands, blends, sequencing, params), fixed_update (clock, transforms)

use std::fmt;
use std::time::Instant;

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::clip::{Clip, PasteMode};
use crate::config::EngineConfig;
use crate::error::{ClipError, Result};
use crate::ids::{ClipKey, InstanceId};
use crate::inputs::{Command, Inputs};
use crate::outputs::{EngineEvent, Outputs};
use crate::playback::{wrap_time, BlendOutcome, ClipSlot, EngineState, PlaybackState};
use crate::sampling::{sample_params, sample_transforms, ParentFailure};
use crate::scene::{Host, PatternDriver};
use crate::sequencing::{resolve_next, Directive};

const PATTERN_SPEED: &str = "speed";
const PATTERN_TIME: &str = "currentTime";
const PATTERN_LOOP_ONCE: &str = "loopOnce";

/// Summary of one [`AnimationEngine::rebuild`] pass.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Dirty targets whose curves were prepared.
    pub targets: usize,
    /// Transition edges re-derived from neighbouring clips.
    pub stitched: usize,
    pub elapsed_ms: f32,
}

pub struct AnimationEngine {
    id: InstanceId,
    cfg: EngineConfig,
    slots: Vec<ClipSlot>,
    state: EngineState,
    current: Option<ClipKey>,
    /// Clip explicitly started last; `stop_all` returns the selection to it.
    played: Option<String>,
    rng: StdRng,
    patterns: Option<Box<dyn PatternDriver + Send + Sync>>,
    outputs: Outputs,
    /// Events already handed out by the previous `update`.
    delivered: usize,
    pending_sample: bool,
}

impl fmt::Debug for AnimationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationEngine")
            .field("id", &self.id)
            .field("clips", &self.slots.len())
            .field("state", &self.state)
            .field("current", &self.current)
            .field("patterns", &self.patterns.is_some())
            .finish()
    }
}

impl AnimationEngine {
    /// Create an engine whose sequencing generator is seeded from `cfg.rng_seed`.
    pub fn new(id: impl Into<InstanceId>, cfg: EngineConfig) -> Self {
        let rng = StdRng::seed_from_u64(cfg.rng_seed);
        Self::with_rng(id, cfg, rng)
    }

    /// Create an engine with an injected sequencing generator.
    pub fn with_rng(id: impl Into<InstanceId>, cfg: EngineConfig, rng: StdRng) -> Self {
        let id = id.into();
        Self {
            outputs: Outputs::new(id.clone()),
            id,
            cfg,
            slots: Vec::new(),
            state: EngineState::default(),
            current: None,
            played: None,
            rng,
            patterns: None,
            delivered: 0,
            pending_sample: false,
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn set_pattern_driver(&mut self, driver: Option<Box<dyn PatternDriver + Send + Sync>>) {
        self.patterns = driver;
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    #[inline]
    pub fn play_time(&self) -> f32 {
        self.state.play_time
    }

    /// Events raised since the last `update` that have not been handed out yet.
    pub fn pending_events(&self) -> impl Iterator<Item = &EngineEvent> {
        let start = self.delivered.min(self.outputs.events.len());
        self.outputs.events.range(start..)
    }

    fn emit(&mut self, event: EngineEvent) {
        let max = self.cfg.max_events_per_tick.max(1);
        while self.outputs.events.len() >= max {
            self.outputs.events.pop_front();
            self.delivered = self.delivered.saturating_sub(1);
        }
        self.outputs.push_event(event);
    }

    // ----- clip management -----

    fn index_of(&self, layer: &str, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.clip.layer() == layer && s.clip.name() == name)
    }

    fn indices_named(&self, name: &str) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.clip.name() == name)
            .map(|(i, _)| i)
            .collect()
    }

    fn current_index(&self) -> Option<usize> {
        let key = self.current.as_ref()?;
        self.index_of(&key.layer, &key.name)
    }

    /// Clip named `name`, preferring the current layer.
    fn find_by_name(&self, name: &str) -> Option<usize> {
        self.current
            .as_ref()
            .and_then(|k| self.index_of(&k.layer, name))
            .or_else(|| self.slots.iter().position(|s| s.clip.name() == name))
    }

    fn set_current(&mut self, idx: usize) {
        let key = self.slots[idx].clip.key();
        if self.current.as_ref() == Some(&key) {
            return;
        }
        let before = self.current.replace(key).map(|k| k.name);
        let after = self.slots[idx].clip.name().to_string();
        if before.as_deref() != Some(after.as_str()) {
            self.emit(EngineEvent::CurrentAnimationChanged { before, after });
        }
    }

    /// Add a clip. Names are unique within a layer.
    pub fn add_clip(&mut self, clip: Clip) -> Result<()> {
        if self.index_of(clip.layer(), clip.name()).is_some() {
            return Err(ClipError::DuplicateClip {
                name: clip.name().to_string(),
                layer: clip.layer().to_string(),
            });
        }
        log::debug!("[{}] add clip {}", self.id, clip.key());
        self.slots.push(ClipSlot::new(clip));
        if self.current_index().is_none() {
            self.set_current(self.slots.len() - 1);
        }
        self.emit(EngineEvent::ClipsListChanged);
        Ok(())
    }

    /// Create an empty clip named "Anim N" with configured defaults.
    pub fn new_clip(&mut self, layer: Option<&str>) -> &mut Clip {
        let name = self.new_animation_name();
        let layer = layer.unwrap_or(&self.cfg.default_layer).to_string();
        let clip = Clip::with_config(name, layer, &self.cfg);
        log::debug!("[{}] new clip {}", self.id, clip.key());
        self.slots.push(ClipSlot::new(clip));
        let idx = self.slots.len() - 1;
        if self.current_index().is_none() {
            self.set_current(idx);
        }
        self.emit(EngineEvent::ClipsListChanged);
        &mut self.slots[idx].clip
    }

    pub fn remove_clip(&mut self, layer: &str, name: &str) -> Result<Clip> {
        let idx = self
            .index_of(layer, name)
            .ok_or_else(|| ClipError::ClipNotFound {
                name: name.to_string(),
            })?;
        let slot = self.slots.remove(idx);
        log::debug!("[{}] removed clip {}", self.id, slot.clip.key());
        if self.current_index().is_none() {
            self.current = None;
            if !self.slots.is_empty() {
                self.set_current(0);
            }
        }
        if !self.slots.iter().any(|s| s.state.enabled) {
            self.state.is_playing = false;
        }
        self.emit(EngineEvent::ClipsListChanged);
        Ok(slot.clip)
    }

    pub fn clip(&self, layer: &str, name: &str) -> Option<&Clip> {
        self.index_of(layer, name).map(|i| &self.slots[i].clip)
    }

    pub fn clip_mut(&mut self, layer: &str, name: &str) -> Option<&mut Clip> {
        self.index_of(layer, name).map(|i| &mut self.slots[i].clip)
    }

    pub fn playback(&self, layer: &str, name: &str) -> Option<&PlaybackState> {
        self.index_of(layer, name).map(|i| &self.slots[i].state)
    }

    pub fn clips(&self) -> impl Iterator<Item = &Clip> {
        self.slots.iter().map(|s| &s.clip)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Distinct clip names in insertion order.
    pub fn animation_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for s in &self.slots {
            if !names.iter().any(|n| n == s.clip.name()) {
                names.push(s.clip.name().to_string());
            }
        }
        names
    }

    /// Distinct layer names in insertion order.
    pub fn layer_names(&self) -> Vec<String> {
        let mut layers: Vec<String> = Vec::new();
        for s in &self.slots {
            if !layers.iter().any(|l| l == s.clip.layer()) {
                layers.push(s.clip.layer().to_string());
            }
        }
        layers
    }

    /// First free "Anim N".
    pub fn new_animation_name(&self) -> String {
        (1..)
            .map(|n| format!("Anim {n}"))
            .find(|name| !self.slots.iter().any(|s| s.clip.name() == name))
            .unwrap_or_default()
    }

    /// The selected clip.
    pub fn current(&self) -> Option<&Clip> {
        self.current_index().map(|i| &self.slots[i].clip)
    }

    pub fn current_mut(&mut self) -> Option<&mut Clip> {
        self.current_index().map(|i| &mut self.slots[i].clip)
    }

    /// Local time of the selected clip.
    pub fn time(&self) -> f32 {
        self.current_index()
            .map(|i| self.slots[i].state.clip_time)
            .unwrap_or(0.0)
    }

    /// Seek the global clock and every enabled clip (plus the selected one).
    pub fn set_time(&mut self, time: f32) {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        let delta = time - self.state.play_time;
        self.state.play_time = time;
        let current = self.current_index();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.state.enabled || Some(i) == current {
                slot.state.clip_time = wrap_time(time, &slot.clip);
            }
            if let Some(next) = slot.state.next.as_mut() {
                next.trigger_time += delta;
            }
        }
        if let (Some(driver), Some(i)) = (self.patterns.as_mut(), current) {
            if let Some(pattern) = self.slots[i].clip.pattern() {
                driver.set_float_param(pattern, PATTERN_TIME, time);
            }
        }
        self.pending_sample = true;
        let time = self.time();
        self.emit(EngineEvent::TimeChanged { time });
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.state.speed
    }

    /// Playback speed; must be finite and strictly positive.
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(ClipError::InvalidSpeed { speed });
        }
        self.state.speed = speed;
        if let Some(driver) = self.patterns.as_mut() {
            for slot in &self.slots {
                if let Some(pattern) = slot.clip.pattern() {
                    driver.set_float_param(pattern, PATTERN_SPEED, speed);
                }
            }
        }
        Ok(())
    }

    pub fn needs_rebuild(&self) -> bool {
        self.slots.iter().any(|s| s.clip.needs_rebuild())
    }

    /// Copy each target's `selected` flag from the given clip to the same target in
    /// every other clip.
    pub fn propagate_selection(&mut self, layer: &str, name: &str) -> Result<()> {
        let src = self
            .index_of(layer, name)
            .ok_or_else(|| ClipError::ClipNotFound {
                name: name.to_string(),
            })?;
        let source: Vec<_> = self.slots[src].clip.targets().to_vec();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if i == src {
                continue;
            }
            for target in slot.clip.targets_mut() {
                if let Some(s) = source.iter().find(|s| s.targets_same_as(target)) {
                    target.set_selected(s.selected());
                }
            }
        }
        Ok(())
    }

    /// Property names animated by clips of more than one layer.
    pub fn layers_sharing_targets(&self) -> Vec<String> {
        let mut owners: HashMap<String, Vec<&str>> = HashMap::new();
        for slot in &self.slots {
            for target in slot.clip.targets() {
                let layers = owners.entry(target.name()).or_default();
                if !layers.contains(&slot.clip.layer()) {
                    layers.push(slot.clip.layer());
                }
            }
        }
        let mut shared: Vec<String> = owners
            .into_iter()
            .filter(|(_, layers)| layers.len() > 1)
            .map(|(name, _)| name)
            .collect();
        shared.sort();
        shared
    }

    // ----- patterns -----

    fn pattern_start(&mut self, idx: usize) {
        if let (Some(driver), Some(pattern)) =
            (self.patterns.as_mut(), self.slots[idx].clip.pattern())
        {
            driver.set_bool_param(pattern, PATTERN_LOOP_ONCE, false);
            driver.reset_and_play(pattern);
        }
    }

    fn pattern_leave(&mut self, idx: usize) {
        if let (Some(driver), Some(pattern)) =
            (self.patterns.as_mut(), self.slots[idx].clip.pattern())
        {
            driver.set_bool_param(pattern, PATTERN_LOOP_ONCE, true);
        }
    }

    // ----- playback -----

    /// Start every clip named `name` (one per layer). A layer that already has a
    /// main clip transitions to it over the new clip's blend duration.
    pub fn play(&mut self, name: &str, sequencing: bool) -> Result<()> {
        let indices = self.indices_named(name);
        if indices.is_empty() {
            return Err(ClipError::ClipNotFound {
                name: name.to_string(),
            });
        }
        // Resolve successors first so an unknown name fails before any state changes.
        let mut nexts = Vec::with_capacity(indices.len());
        for &i in &indices {
            let next = if sequencing {
                resolve_next(
                    &self.slots,
                    i,
                    self.state.play_time,
                    self.cfg.snap,
                    &mut self.rng,
                )?
            } else {
                None
            };
            nexts.push(next);
        }

        log::debug!("[{}] play {} (sequencing: {})", self.id, name, sequencing);
        self.state.is_playing = true;
        self.state.sequencing = sequencing;
        self.played = Some(name.to_string());
        for (&i, next) in indices.iter().zip(nexts) {
            let layer = self.slots[i].clip.layer().to_string();
            for slot in self.slots.iter_mut().filter(|s| s.clip.layer() == layer) {
                slot.state.next = None;
            }
            self.start_in_layer(i);
            self.slots[i].state.sequencing = sequencing;
            self.slots[i].state.next = next;
        }
        if let Some(idx) = self.find_by_name(name) {
            self.set_current(idx);
        }
        Ok(())
    }

    fn start_in_layer(&mut self, idx: usize) {
        let layer = self.slots[idx].clip.layer();
        let main = self
            .slots
            .iter()
            .enumerate()
            .find(|(i, s)| {
                *i != idx && s.clip.layer() == layer && s.state.enabled && s.state.main_in_layer
            })
            .map(|(i, _)| i);
        match main {
            Some(from) => self.transition(from, idx),
            None => {
                let state = &self.slots[idx].state;
                if state.enabled && state.main_in_layer {
                    return;
                }
                self.slots[idx].state.blend_in(0.0);
                self.pattern_start(idx);
                let clip = &self.slots[idx].clip;
                let (animation, layer) = (clip.name().to_string(), clip.layer().to_string());
                log::debug!("[{}] {} is main in {}", self.id, animation, layer);
                self.emit(EngineEvent::PlaybackStarted { animation, layer });
            }
        }
    }

    /// Crossfade within a layer: `from` blends out and `to` blends in, both over
    /// `to`'s blend duration.
    fn transition(&mut self, from: usize, to: usize) {
        let duration = self.slots[to].clip.blend_duration();
        self.slots[from].state.blend_out(duration);
        self.slots[to].state.blend_in(duration);
        self.pattern_leave(from);
        self.pattern_start(to);

        let layer = self.slots[to].clip.layer().to_string();
        let from_name = self.slots[from].clip.name().to_string();
        let to_name = self.slots[to].clip.name().to_string();
        log::debug!(
            "[{}] transition {} -> {} in {} over {}s",
            self.id,
            from_name,
            to_name,
            layer,
            duration
        );
        self.emit(EngineEvent::TransitionStarted {
            layer: layer.clone(),
            from: from_name.clone(),
            to: to_name,
            duration,
        });
        if !self.slots[from].state.enabled {
            self.emit(EngineEvent::PlaybackStopped {
                animation: from_name,
                layer,
            });
        }
    }

    fn stop_slot(&mut self, idx: usize) {
        if !self.slots[idx].state.enabled {
            return;
        }
        self.slots[idx].state.reset();
        self.pattern_leave(idx);
        let clip = &self.slots[idx].clip;
        let (animation, layer) = (clip.name().to_string(), clip.layer().to_string());
        log::debug!("[{}] stop {} in {}", self.id, animation, layer);
        self.emit(EngineEvent::PlaybackStopped { animation, layer });
    }

    /// Stop every clip named `name`; other layers are untouched.
    pub fn stop(&mut self, name: &str) -> Result<()> {
        let indices = self.indices_named(name);
        if indices.is_empty() {
            return Err(ClipError::ClipNotFound {
                name: name.to_string(),
            });
        }
        for i in indices {
            self.stop_slot(i);
        }
        if !self.slots.iter().any(|s| s.state.enabled) {
            self.state.is_playing = false;
        }
        Ok(())
    }

    /// Stop everything, return the selection to the clip that was played and snap
    /// its time, then sample it. A clip at its end rewinds (loops) or holds the
    /// length (one-shots); otherwise it keeps its time.
    pub fn stop_all(&mut self, host: &mut Host<'_>) {
        for i in 0..self.slots.len() {
            self.stop_slot(i);
        }
        self.state.is_playing = false;

        if let Some(idx) = self.played.clone().and_then(|n| self.find_by_name(&n)) {
            self.set_current(idx);
        }
        if let Some(idx) = self.current_index() {
            let snap = self.cfg.snap;
            let slot = &mut self.slots[idx];
            let length = slot.clip.length();
            slot.state.clip_time = if slot.state.clip_time < length - snap {
                self.cfg.snap_time(slot.state.clip_time)
            } else if slot.clip.looping() {
                0.0
            } else {
                length
            };
            let time = slot.state.clip_time;
            self.emit(EngineEvent::TimeChanged { time });
        }
        self.sample_selected(host);
    }

    /// Make `name` the selected clip. While playing this plays it; otherwise the
    /// clip is rewound to 0 and sampled immediately.
    pub fn select_animation(&mut self, name: &str, host: &mut Host<'_>) -> Result<()> {
        let idx = self
            .find_by_name(name)
            .ok_or_else(|| ClipError::ClipNotFound {
                name: name.to_string(),
            })?;
        if self.state.is_playing {
            let sequencing = self
                .current_index()
                .map_or(self.state.sequencing, |i| self.slots[i].state.sequencing);
            return self.play(name, sequencing);
        }
        self.set_current(idx);
        self.state.play_time = 0.0;
        self.slots[idx].state.clip_time = 0.0;
        self.emit(EngineEvent::TimeChanged { time: 0.0 });
        self.sample_selected(host);
        Ok(())
    }

    // ----- rebuild -----

    /// Validate clips, prepare dirty curves and re-derive transition edges.
    ///
    /// Slow passes are reported (log and event) but always complete.
    pub fn rebuild(&mut self) -> RebuildReport {
        let started = Instant::now();
        let dirty: Vec<bool> = self.slots.iter().map(|s| s.clip.needs_rebuild()).collect();

        let mut targets = 0;
        for (slot, _) in self.slots.iter_mut().zip(&dirty).filter(|(_, d)| **d) {
            slot.clip.validate();
            targets += slot.clip.prepare_dirty_targets();
        }

        let mut stitched = 0;
        for i in 0..self.slots.len() {
            if self.slots[i].clip.transition() {
                stitched += self.stitch_transition(i, &dirty);
            }
        }
        for slot in &mut self.slots {
            slot.clip.mark_clean();
        }

        let elapsed_ms = started.elapsed().as_secs_f32() * 1000.0;
        if elapsed_ms > self.cfg.rebuild_warning_ms {
            log::warn!(
                "[{}] rebuild took {:.0}ms (threshold {:.0}ms)",
                self.id,
                elapsed_ms,
                self.cfg.rebuild_warning_ms
            );
            self.emit(EngineEvent::PerformanceWarning {
                metric: "rebuild_ms".to_string(),
                value: elapsed_ms,
                threshold: self.cfg.rebuild_warning_ms,
            });
        }
        let shared = self.layers_sharing_targets();
        if !shared.is_empty() {
            log::warn!(
                "[{}] properties animated by more than one layer: {}",
                self.id,
                shared.join(", ")
            );
        }
        if targets > 0 || stitched > 0 {
            log::info!(
                "[{}] rebuilt {} targets, stitched {} edges in {:.2}ms",
                self.id,
                targets,
                stitched,
                elapsed_ms
            );
        }
        self.emit(EngineEvent::Rebuilt { targets, stitched });
        self.pending_sample = true;
        RebuildReport {
            targets,
            stitched,
            elapsed_ms,
        }
    }

    /// Paste the predecessor's tail at 0 and the successor's head at the end of
    /// clip `i`, when either side changed. Returns how many edges were pasted.
    fn stitch_transition(&mut self, i: usize, dirty: &[bool]) -> usize {
        let layer = self.slots[i].clip.layer().to_string();
        let name = self.slots[i].clip.name().to_string();
        let length = self.slots[i].clip.length();
        let mut pasted = 0;

        let predecessor = self.slots.iter().enumerate().position(|(j, s)| {
            j != i && s.clip.layer() == layer && s.clip.next_animation_name() == Some(name.as_str())
        });
        if let Some(p) = predecessor.filter(|p| dirty[*p] || dirty[i]) {
            let entry = {
                let clip = &self.slots[p].clip;
                clip.copy(clip.length(), true)
            };
            if self.slots[i].clip.paste(0.0, &entry, PasteMode::Merge) > 0 {
                pasted += 1;
            }
        }

        let successor = match self.slots[i].clip.next_animation_name().map(Directive::parse) {
            Some(Directive::Literal(next)) => self
                .slots
                .iter()
                .enumerate()
                .position(|(j, s)| j != i && s.clip.layer() == layer && s.clip.name() == next),
            _ => None,
        };
        if let Some(s) = successor.filter(|s| dirty[*s] || dirty[i]) {
            let entry = self.slots[s].clip.copy(0.0, true);
            if self.slots[i].clip.paste(length, &entry, PasteMode::Merge) > 0 {
                pasted += 1;
            }
        }

        if pasted > 0 {
            self.slots[i].clip.prepare_dirty_targets();
        }
        pasted
    }

    // ----- ticks -----

    /// Variable-rate tick: advance blends, apply commands, fire due sequencing
    /// transitions and sample float params. Returns every event raised since the
    /// previous call.
    pub fn update(&mut self, dt: f32, inputs: Inputs, host: &mut Host<'_>) -> &Outputs {
        let handed_out = self.delivered.min(self.outputs.events.len());
        self.outputs.events.drain(..handed_out);
        self.delivered = 0;

        let step = dt.max(0.0) * self.state.speed;
        for i in 0..self.slots.len() {
            if self.slots[i].state.advance_blend(step) == Some(BlendOutcome::FadedOut) {
                let clip = &self.slots[i].clip;
                let (animation, layer) = (clip.name().to_string(), clip.layer().to_string());
                log::debug!("[{}] {} faded out of {}", self.id, animation, layer);
                self.emit(EngineEvent::PlaybackStopped { animation, layer });
            }
        }

        for command in inputs.commands {
            if let Err(err) = self.apply_command(command, host) {
                log::warn!("[{}] command failed: {}", self.id, err);
                self.emit(EngineEvent::Error {
                    message: err.to_string(),
                });
            }
        }

        if self.state.is_playing {
            self.fire_sequencing();
        }

        if self.state.is_playing {
            for slot in self.slots.iter().filter(|s| s.state.enabled) {
                sample_params(&slot.clip, slot.state.clip_time, slot.state.weight, host.sink);
            }
        }

        self.delivered = self.outputs.events.len();
        &self.outputs
    }

    /// Fixed-rate tick: advance the clock and clip times, then sample transforms.
    pub fn fixed_update(&mut self, dt: f32, host: &mut Host<'_>) {
        if self.state.is_playing {
            let step = dt.max(0.0) * self.state.speed;
            self.state.play_time += step;
            for slot in self.slots.iter_mut().filter(|s| s.state.enabled) {
                slot.state.advance_time(step, &slot.clip);
            }
            let report = self.cfg.report_missing_parents;
            let mut failures = Vec::new();
            for slot in self.slots.iter_mut().filter(|s| s.state.enabled) {
                let (time, weight) = (slot.state.clip_time, slot.state.weight);
                sample_transforms(&mut slot.clip, time, weight, host, report, &mut failures);
            }
            self.report_parent_failures(failures);
            if self.pending_sample {
                self.pending_sample = false;
                for slot in self.slots.iter().filter(|s| s.state.enabled) {
                    sample_params(&slot.clip, slot.state.clip_time, slot.state.weight, host.sink);
                }
            }
        } else if self.pending_sample {
            self.sample_selected(host);
        }
    }

    /// Apply the current state immediately: every enabled clip while playing,
    /// otherwise the selected clip at full weight.
    pub fn sample(&mut self, host: &mut Host<'_>) {
        if !self.state.is_playing {
            self.sample_selected(host);
            return;
        }
        let report = self.cfg.report_missing_parents;
        let mut failures = Vec::new();
        for slot in self.slots.iter_mut().filter(|s| s.state.enabled) {
            let (time, weight) = (slot.state.clip_time, slot.state.weight);
            sample_params(&slot.clip, time, weight, host.sink);
            sample_transforms(&mut slot.clip, time, weight, host, report, &mut failures);
        }
        self.report_parent_failures(failures);
        self.pending_sample = false;
    }

    fn sample_selected(&mut self, host: &mut Host<'_>) {
        self.pending_sample = false;
        let Some(idx) = self.current_index() else {
            return;
        };
        let report = self.cfg.report_missing_parents;
        let mut failures = Vec::new();
        let slot = &mut self.slots[idx];
        let time = slot.state.clip_time;
        sample_params(&slot.clip, time, 1.0, host.sink);
        sample_transforms(&mut slot.clip, time, 1.0, host, report, &mut failures);
        self.report_parent_failures(failures);
    }

    fn report_parent_failures(&mut self, failures: Vec<ParentFailure>) {
        for f in failures {
            log::error!(
                "[{}] parent {}/{} of {} could not be resolved; using unparented values",
                self.id,
                f.atom,
                f.part,
                f.target
            );
            self.emit(EngineEvent::ParentUnresolved {
                target: f.target,
                atom: f.atom,
                part: f.part,
            });
        }
    }

    /// Transition every sequencing main clip whose resolved successor is due.
    fn fire_sequencing(&mut self) {
        let now = self.state.play_time;
        let due: Vec<(usize, String)> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.state.enabled && s.state.main_in_layer && s.state.sequencing
            })
            .filter_map(|(i, s)| {
                s.state
                    .next
                    .as_ref()
                    .filter(|n| now >= n.trigger_time)
                    .map(|n| (i, n.name.clone()))
            })
            .collect();

        for (from, to_name) in due {
            self.slots[from].state.next = None;
            let layer = self.slots[from].clip.layer().to_string();
            let from_name = self.slots[from].clip.name().to_string();
            let Some(to) = self.index_of(&layer, &to_name) else {
                log::warn!(
                    "[{}] sequencing target {} of {} no longer exists",
                    self.id,
                    to_name,
                    from_name
                );
                continue;
            };

            if to == from {
                self.slots[from].state.clip_time = 0.0;
            } else {
                self.transition(from, to);
                self.slots[to].state.sequencing = true;
            }
            log::debug!("[{}] sequencing {} -> {}", self.id, from_name, to_name);
            self.emit(EngineEvent::SequencingFired {
                layer: layer.clone(),
                from: from_name,
                to: to_name.clone(),
            });

            match resolve_next(&self.slots, to, now, self.cfg.snap, &mut self.rng) {
                Ok(next) => self.slots[to].state.next = next,
                Err(err) => {
                    log::warn!("[{}] cannot sequence after {}: {}", self.id, to_name, err);
                    self.emit(EngineEvent::Error {
                        message: err.to_string(),
                    });
                }
            }
            if self.current_index() == Some(from) {
                self.set_current(to);
            }
        }
    }

    fn apply_command(&mut self, command: Command, host: &mut Host<'_>) -> Result<()> {
        match command {
            Command::Play {
                animation,
                sequencing,
            } => self.play(&animation, sequencing),
            Command::Stop { animation } => self.stop(&animation),
            Command::StopAll => {
                self.stop_all(host);
                Ok(())
            }
            Command::Select { animation } => self.select_animation(&animation, host),
            Command::SetSpeed { speed } => self.set_speed(speed),
            Command::SetTime { time } => {
                self.set_time(time);
                Ok(())
            }
            Command::Rebuild => {
                self.rebuild();
                Ok(())
            }
        }
    }
}
