use keyclip_core::{
    AnimationEngine, Command, EngineConfig, EngineEvent, Inputs, Phase, Space, Target,
    RANDOMIZE_ANIMATION_NAME,
};
use keyclip_test_fixtures::{approx, clips, PatternCall, RecordingPatterns, TestHost, LAYER};

fn engine() -> AnimationEngine {
    AnimationEngine::new("playback-test", EngineConfig::default())
}

fn tick(engine: &mut AnimationEngine, host: &mut TestHost, dt: f32) -> Vec<EngineEvent> {
    let mut h = host.host();
    engine.fixed_update(dt, &mut h);
    engine
        .update(0.0, Inputs::default(), &mut h)
        .events
        .iter()
        .cloned()
        .collect()
}

/// it should ramp the incoming clip 0 → 0.5 → 1 and the outgoing clip 1 → 0.5 → 0
#[test]
fn crossfade_weights_are_linear() {
    let mut engine = engine();
    engine
        .add_clip(clips::param_clip("A", LAYER, 2.0, &[(0.0, 0.0)]))
        .unwrap();
    let mut b = clips::param_clip("B", LAYER, 2.0, &[(0.0, 1.0)]);
    b.set_blend_duration(1.0).unwrap();
    engine.add_clip(b).unwrap();
    let mut host = TestHost::new().with_param("Person", "smile", 0.0);

    engine.play("A", false).unwrap();
    engine.play("B", false).unwrap();
    let a = |e: &AnimationEngine| e.playback(LAYER, "A").unwrap().clone();
    let b = |e: &AnimationEngine| e.playback(LAYER, "B").unwrap().clone();
    approx(a(&engine).weight, 1.0, 1e-6);
    approx(b(&engine).weight, 0.0, 1e-6);
    assert_eq!(a(&engine).phase(), Phase::BlendingOut);
    assert_eq!(b(&engine).phase(), Phase::BlendingIn);

    let mut h = host.host();
    engine.update(0.5, Inputs::default(), &mut h);
    approx(a(&engine).weight, 0.5, 1e-6);
    approx(b(&engine).weight, 0.5, 1e-6);

    let events = engine.update(0.5, Inputs::default(), &mut h).events.clone();
    approx(a(&engine).weight, 0.0, 1e-6);
    approx(b(&engine).weight, 1.0, 1e-6);
    assert_eq!(a(&engine).phase(), Phase::Idle);
    assert_eq!(b(&engine).phase(), Phase::Main);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::PlaybackStopped { animation, .. } if animation == "A"
    )));
}

/// it should fire the literal successor exactly nextAnimationTime after the start
#[test]
fn sequencing_fires_at_start_plus_delay() {
    let mut engine = engine();
    let mut a = clips::param_clip("A", LAYER, 4.0, &[(0.0, 0.0)]);
    a.set_next_animation(Some("B".into()), 2.0);
    engine.add_clip(a).unwrap();
    let mut b = clips::param_clip("B", LAYER, 4.0, &[(0.0, 1.0)]);
    b.set_blend_duration(0.0).unwrap();
    engine.add_clip(b).unwrap();
    let mut host = TestHost::new().with_param("Person", "smile", 0.0);

    // Start at t0 = 0.5.
    engine.play("A", false).unwrap();
    tick(&mut engine, &mut host, 0.5);
    engine.play("A", true).unwrap();
    let trigger = engine
        .playback(LAYER, "A")
        .unwrap()
        .next
        .clone()
        .unwrap();
    assert_eq!(trigger.name, "B");
    approx(trigger.trigger_time, 2.5, 1e-6);

    for _ in 0..7 {
        let events = tick(&mut engine, &mut host, 0.25);
        assert!(!events
            .iter()
            .any(|e| matches!(e, EngineEvent::SequencingFired { .. })));
    }
    let events = tick(&mut engine, &mut host, 0.25);
    approx(engine.play_time(), 2.5, 1e-6);
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::SequencingFired { from, to, .. } if from == "A" && to == "B"
    )));
    assert_eq!(engine.playback(LAYER, "B").unwrap().phase(), Phase::Main);
    assert_eq!(engine.current().unwrap().name(), "B");
}

/// it should keep layers independent: stopping one leaves the other's main state untouched
#[test]
fn layers_play_and_stop_independently() {
    let mut engine = engine();
    engine
        .add_clip(clips::slide_clip("Idle", "Base", "hips", 2.0, &[(0.0, 1.0)]))
        .unwrap();
    engine
        .add_clip(clips::slide_clip("Smile", "Face", "jaw", 2.0, &[(0.0, 2.0)]))
        .unwrap();
    let mut host = TestHost::new().with_controller("hips").with_controller("jaw");

    engine.play("Idle", false).unwrap();
    engine.play("Smile", false).unwrap();
    tick(&mut engine, &mut host, 0.1);
    for (layer, name) in [("Base", "Idle"), ("Face", "Smile")] {
        let s = engine.playback(layer, name).unwrap();
        assert_eq!(s.phase(), Phase::Main);
        assert!(s.main_in_layer);
    }
    approx(host.x("hips"), 1.0, 1e-6);
    approx(host.x("jaw"), 2.0, 1e-6);

    let before = engine.playback("Base", "Idle").unwrap().clone();
    engine.stop("Smile").unwrap();
    let after = engine.playback("Base", "Idle").unwrap();
    assert_eq!(&before, after);
    assert!(engine.is_playing());
    assert_eq!(engine.playback("Face", "Smile").unwrap().phase(), Phase::Idle);
}

/// it should keep a layer's pending successor when another layer is played without sequencing
#[test]
fn sequencing_is_tracked_per_layer() {
    let mut engine = engine();
    let mut a = clips::slide_clip("A", "Base", "hips", 4.0, &[(0.0, 1.0)]);
    a.set_next_animation(Some("B".into()), 1.0);
    engine.add_clip(a).unwrap();
    let mut b = clips::slide_clip("B", "Base", "hips", 4.0, &[(0.0, 2.0)]);
    b.set_blend_duration(0.0).unwrap();
    engine.add_clip(b).unwrap();
    engine
        .add_clip(clips::slide_clip("Smile", "Face", "jaw", 2.0, &[(0.0, 3.0)]))
        .unwrap();
    let mut host = TestHost::new().with_controller("hips").with_controller("jaw");

    engine.play("A", true).unwrap();
    engine.play("Smile", false).unwrap();
    let mut fired = Vec::new();
    for _ in 0..4 {
        for e in tick(&mut engine, &mut host, 0.25) {
            if let EngineEvent::SequencingFired { layer, from, to } = e {
                fired.push((layer, from, to));
            }
        }
    }
    assert_eq!(
        fired,
        vec![("Base".to_string(), "A".to_string(), "B".to_string())]
    );
    assert_eq!(engine.playback("Base", "B").unwrap().phase(), Phase::Main);
    assert_eq!(engine.playback("Face", "Smile").unwrap().phase(), Phase::Main);
    assert!(engine.playback("Face", "Smile").unwrap().next.is_none());
}

/// it should keep sampling raw values and report a missing parent only once
#[test]
fn unresolved_parent_reports_single_diagnostic() {
    let mut engine = engine();
    let mut clip = clips::slide_clip("A", LAYER, "hand", 4.0, &[(0.0, 1.0), (2.0, 3.0)]);
    if let Some(Target::Transform(t)) = clip.target_mut("hand") {
        t.set_parent("Ghost", "palm");
    }
    engine.add_clip(clip).unwrap();
    let report = engine.rebuild();
    assert_eq!(report.targets, 1);

    let mut host = TestHost::new().with_controller("hand");
    engine.play("A", false).unwrap();
    let mut diagnostics = 0;
    for _ in 0..20 {
        let events = tick(&mut engine, &mut host, 0.1);
        diagnostics += events
            .iter()
            .filter(|e| matches!(e, EngineEvent::ParentUnresolved { .. }))
            .count();
        host.scene.advance_frame();
    }
    assert_eq!(diagnostics, 1);

    let time = engine.time();
    let expected = engine
        .clip(LAYER, "A")
        .and_then(|c| c.target("hand"))
        .and_then(|t| t.as_transform())
        .and_then(|t| t.evaluate_position(time))
        .unwrap();
    approx(host.x("hand"), expected[0], 1e-5);
}

/// it should compose keyed values with a resolved parent frame
#[test]
fn resolved_parent_writes_world_pose() {
    use keyclip_core::{interp::functions::IDENTITY_QUAT, AnimatableSink, Frame};

    let mut engine = engine();
    let mut clip = clips::slide_clip("A", LAYER, "hand", 2.0, &[(0.0, 1.0)]);
    if let Some(Target::Transform(t)) = clip.target_mut("hand") {
        t.set_parent("Table", "top");
    }
    engine.add_clip(clip).unwrap();
    let mut host = TestHost::new()
        .with_controller("hand")
        .with_part("Table", "top", Frame::new([10.0, 0.0, 0.0], IDENTITY_QUAT));
    engine.play("A", false).unwrap();
    tick(&mut engine, &mut host, 0.1);
    approx(host.sink.position("hand", Space::World).unwrap()[0], 11.0, 1e-5);
}

/// it should pick the same random successor for the same seed, never the clip itself
#[test]
fn randomized_sequencing_is_seeded() {
    let pick = |seed: u64| {
        let cfg = EngineConfig {
            rng_seed: seed,
            ..Default::default()
        };
        let mut engine = AnimationEngine::new("rng", cfg);
        for name in ["A", "B", "C", "D"] {
            let mut clip = clips::param_clip(name, LAYER, 2.0, &[(0.0, 0.0)]);
            clip.set_next_animation(Some(RANDOMIZE_ANIMATION_NAME.into()), 1.0);
            engine.add_clip(clip).unwrap();
        }
        let mut host = TestHost::new().with_param("Person", "smile", 0.0);
        engine.play("A", true).unwrap();
        let mut picks = Vec::new();
        let mut previous = "A".to_string();
        for _ in 0..6 {
            let next = engine
                .clips()
                .find(|c| engine.playback(LAYER, c.name()).unwrap().next.is_some())
                .map(|c| c.name().to_string())
                .unwrap();
            assert_eq!(next, previous);
            let target = engine.playback(LAYER, &next).unwrap().next.clone().unwrap();
            assert_ne!(target.name, next);
            picks.push(target.name.clone());
            tick(&mut engine, &mut host, 1.0);
            previous = target.name;
        }
        picks
    };
    assert_eq!(pick(11), pick(11));
}

/// it should return to the played clip and keep its mid-loop time on stop-all
#[test]
fn stop_all_restores_played_clip() {
    let mut engine = engine();
    let mut a = clips::slide_clip("A", LAYER, "hand", 2.0, &[(0.0, 1.0), (1.0, 2.0)]);
    a.set_next_animation(Some("B".into()), 1.0);
    engine.add_clip(a).unwrap();
    let mut b = clips::slide_clip("B", LAYER, "hand", 2.0, &[(0.0, 5.0)]);
    b.set_blend_duration(0.0).unwrap();
    engine.add_clip(b).unwrap();
    let mut host = TestHost::new().with_controller("hand");

    engine.play("A", true).unwrap();
    tick(&mut engine, &mut host, 0.5);
    tick(&mut engine, &mut host, 0.5);
    assert_eq!(engine.current().unwrap().name(), "B");

    engine.stop_all(&mut host.host());
    assert!(!engine.is_playing());
    assert_eq!(engine.current().unwrap().name(), "A");
    approx(engine.time(), 1.0, 1e-6);
    approx(host.x("hand"), 2.0, 1e-5);
}

/// it should rewind a loop and hold a one-shot only when stop-all finds them at the end
#[test]
fn stop_all_snaps_only_at_the_end() {
    let mut engine = engine();
    engine
        .add_clip(clips::slide_clip("Loop", LAYER, "hand", 2.0, &[(0.0, 1.0)]))
        .unwrap();
    let mut once = clips::slide_clip("Once", LAYER, "hand", 2.0, &[(0.0, 1.0)]);
    once.set_looping(false);
    engine.add_clip(once).unwrap();
    let mut host = TestHost::new().with_controller("hand");

    engine.play("Loop", false).unwrap();
    tick(&mut engine, &mut host, 1.25);
    engine.stop_all(&mut host.host());
    approx(engine.time(), 1.25, 1e-6);

    engine.play("Loop", false).unwrap();
    engine.set_time(1.9995);
    engine.stop_all(&mut host.host());
    approx(engine.time(), 0.0, 1e-6);

    let mut h = host.host();
    engine.select_animation("Once", &mut h).unwrap();
    engine.play("Once", false).unwrap();
    engine.fixed_update(3.0, &mut h);
    engine.stop_all(&mut h);
    assert_eq!(engine.current().unwrap().name(), "Once");
    approx(engine.time(), 2.0, 1e-6);
}

/// it should sample the selected clip immediately while stopped
#[test]
fn select_while_stopped_samples_instantly() {
    let mut engine = engine();
    engine
        .add_clip(clips::slide_clip("A", LAYER, "hand", 2.0, &[(0.0, 1.0)]))
        .unwrap();
    engine
        .add_clip(clips::slide_clip("B", LAYER, "hand", 2.0, &[(0.0, 5.0)]))
        .unwrap();
    let mut host = TestHost::new().with_controller("hand");
    engine.set_time(1.5);
    approx(engine.time(), 1.5, 1e-6);

    engine.select_animation("B", &mut host.host()).unwrap();
    assert!(!engine.is_playing());
    assert_eq!(engine.current().unwrap().name(), "B");
    approx(engine.time(), 0.0, 1e-6);
    approx(engine.play_time(), 0.0, 1e-6);
    approx(host.x("hand"), 5.0, 1e-6);
}

/// it should mirror speed, loop-once and reset-and-play to external patterns
#[test]
fn patterns_follow_playback() {
    let mut engine = engine();
    let mut a = clips::param_clip("A", LAYER, 2.0, &[(0.0, 0.0)]);
    a.set_pattern(Some("pat".into()));
    engine.add_clip(a).unwrap();
    let recorder = RecordingPatterns::new();
    engine.set_pattern_driver(Some(Box::new(recorder.clone())));

    engine.play("A", false).unwrap();
    engine.set_speed(2.0).unwrap();
    engine.set_time(0.5);
    engine.stop("A").unwrap();

    assert_eq!(
        recorder.snapshot(),
        vec![
            PatternCall::Bool("pat".into(), "loopOnce".into(), false),
            PatternCall::ResetAndPlay("pat".into()),
            PatternCall::Float("pat".into(), "speed".into(), 2.0),
            PatternCall::Float("pat".into(), "currentTime".into(), 0.5),
            PatternCall::Bool("pat".into(), "loopOnce".into(), true),
        ]
    );
}

/// it should apply queued commands and advance with speed
#[test]
fn commands_are_applied_in_update() {
    let mut engine = engine();
    engine
        .add_clip(clips::param_clip("A", LAYER, 4.0, &[(0.0, 0.0)]))
        .unwrap();
    let mut host = TestHost::new().with_param("Person", "smile", 0.0);
    let inputs = Inputs {
        commands: vec![
            Command::SetSpeed { speed: 2.0 },
            Command::Play {
                animation: "A".into(),
                sequencing: false,
            },
            Command::Stop {
                animation: "Missing".into(),
            },
        ],
    };
    let events = engine
        .update(0.0, inputs, &mut host.host())
        .events
        .clone();
    assert!(engine.is_playing());
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::PlaybackStarted { animation, .. } if animation == "A")));
    assert!(events.iter().any(|e| matches!(e, EngineEvent::Error { .. })));

    engine.fixed_update(0.5, &mut host.host());
    approx(engine.time(), 1.0, 1e-6);
}

/// it should copy each target's selection to the same target in other clips
#[test]
fn selection_propagates_across_clips() {
    let mut engine = engine();
    let mut a = clips::slide_clip("A", LAYER, "hand", 2.0, &[(0.0, 1.0)]);
    a.targets_mut()[0].set_selected(true);
    engine.add_clip(a).unwrap();
    engine
        .add_clip(clips::slide_clip("B", "Face", "hand", 2.0, &[(0.0, 1.0)]))
        .unwrap();
    engine.propagate_selection(LAYER, "A").unwrap();
    assert!(engine.clip("Face", "B").unwrap().targets()[0].selected());
    assert_eq!(engine.layers_sharing_targets(), vec!["hand".to_string()]);
}
