use keyclip_core::{AnimationEngine, EngineConfig, EngineEvent, Inputs, KEY_EPSILON};
use keyclip_test_fixtures::{approx, clips, TestHost, LAYER};

fn position_x(engine: &AnimationEngine, clip: &str, time: f32) -> f32 {
    engine
        .clip(LAYER, clip)
        .and_then(|c| c.target("hand"))
        .and_then(|t| t.as_transform())
        .and_then(|t| t.evaluate_position(time))
        .map(|p| p[0])
        .unwrap_or(f32::NAN)
}

/// it should make a looping clip's last value equal its first
#[test]
fn looping_clip_is_seamless_after_rebuild() {
    let mut engine = AnimationEngine::new("seam", EngineConfig::default());
    engine
        .add_clip(clips::param_clip(
            "A",
            LAYER,
            2.0,
            &[(0.0, 0.0), (0.7, 1.0), (1.3, -1.0), (1.9, 0.5)],
        ))
        .unwrap();
    engine.rebuild();

    let target = engine.clip(LAYER, "A").unwrap().targets()[0]
        .as_param()
        .unwrap();
    approx(
        target.evaluate(2.0).unwrap(),
        target.evaluate(0.0).unwrap(),
        1e-6,
    );
    let last = target.curve().last_frame().unwrap();
    approx(last.time, 2.0, KEY_EPSILON);
}

/// it should flip quaternion keys so adjacent keys never sit on opposite hemispheres
#[test]
fn rotation_keys_are_continuous_after_rebuild() {
    let mut clip = clips::turn_clip(
        "Turn",
        LAYER,
        "head",
        2.0,
        &[
            (0.0, [0.0, 0.0, 0.0, 1.0]),
            (1.0, [0.0, 0.0, 0.38, -0.92]),
            (2.0, [0.0, 0.0, 0.7, 0.7]),
        ],
    );
    clip.set_looping(false);
    let mut engine = AnimationEngine::new("quat", EngineConfig::default());
    engine.add_clip(clip).unwrap();
    engine.rebuild();

    let curves = engine
        .clip(LAYER, "Turn")
        .and_then(|c| c.target("head"))
        .and_then(|t| t.as_transform())
        .and_then(|t| t.rotation_curves())
        .unwrap();
    let keys = curves[0].len();
    assert_eq!(keys, 3);
    let q = |i: usize| -> [f32; 4] { std::array::from_fn(|c| curves[c].keys()[i].value) };
    for i in 1..keys {
        let (a, b) = (q(i - 1), q(i));
        let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        assert!(dot >= 0.0, "keys {} and {} are opposite: dot={dot}", i - 1, i);
    }
}

/// it should close a looping turn on an equivalent rotation and keep the last segment short
#[test]
fn looping_rotation_seam_keeps_the_short_path() {
    let clip = clips::turn_clip(
        "Spin",
        LAYER,
        "head",
        3.0,
        &[
            (0.0, [0.0, 0.0, 0.0, 1.0]),
            (1.0, [0.0, 0.0, 0.866, 0.5]),
            (2.0, [0.0, 0.0, 0.866, -0.5]),
        ],
    );
    let mut engine = AnimationEngine::new("spin", EngineConfig::default());
    engine.add_clip(clip).unwrap();
    engine.rebuild();

    let target = engine
        .clip(LAYER, "Spin")
        .and_then(|c| c.target("head"))
        .and_then(|t| t.as_transform())
        .unwrap();
    let dot = |a: [f32; 4], b: [f32; 4]| -> f32 { a.iter().zip(b.iter()).map(|(x, y)| x * y).sum() };

    let curves = target.rotation_curves().unwrap();
    let keys = curves[0].len();
    assert_eq!(keys, 4);
    let q = |i: usize| -> [f32; 4] { std::array::from_fn(|c| curves[c].keys()[i].value) };
    for i in 1..keys {
        assert!(dot(q(i - 1), q(i)) >= 0.0, "keys {} and {} are opposite", i - 1, i);
    }

    let start = target.evaluate_rotation(0.0).unwrap();
    let end = target.evaluate_rotation(3.0).unwrap();
    approx(dot(start, end).abs(), 1.0, 1e-4);

    // 300 degrees about z, reached by turning forward from 240.
    let mid = target.evaluate_rotation(2.5).unwrap();
    let expected = [0.0, 0.0, 0.5, -0.866];
    assert!(
        dot(mid, expected).abs() > 0.95,
        "seam segment took the long way: {mid:?}"
    );
}

/// it should key a transition clip's edges from its predecessor's tail and successor's head
#[test]
fn transition_edges_are_stitched() {
    let mut engine = AnimationEngine::new("stitch", EngineConfig::default());
    let mut a = clips::slide_clip("A", LAYER, "hand", 2.0, &[(0.0, 0.0), (2.0, 1.0)]);
    a.set_looping(false);
    a.set_next_animation(Some("T".into()), 2.0);
    engine.add_clip(a).unwrap();

    let mut t = clips::slide_clip("T", LAYER, "hand", 1.0, &[(0.0, 100.0), (1.0, 100.0)]);
    t.set_transition(true);
    t.set_next_animation(Some("B".into()), 1.0);
    engine.add_clip(t).unwrap();

    engine
        .add_clip(clips::slide_clip("B", LAYER, "hand", 2.0, &[(0.0, 7.0)]))
        .unwrap();

    let report = engine.rebuild();
    assert_eq!(report.stitched, 2);
    approx(position_x(&engine, "T", 0.0), 1.0, 1e-5);
    approx(position_x(&engine, "T", 1.0), 7.0, 1e-5);

    // Nothing changed, nothing re-stitched.
    assert_eq!(engine.rebuild().stitched, 0);
}

/// it should reproduce curves on a full clone and keep only boundaries otherwise
#[test]
fn clone_and_restore_targets() {
    let mut clip = clips::slide_clip(
        "A",
        LAYER,
        "hand",
        4.0,
        &[(0.0, 0.0), (1.0, 2.0), (3.0, -1.0), (4.0, 0.5)],
    );
    clip.set_looping(false);
    let original = clip.target("hand").unwrap().clone();

    let full = original.clone_target(true, 4.0);
    assert_eq!(full.key_times(), original.key_times());
    for t in [0.0, 0.5, 1.0, 2.5, 4.0] {
        let a = original.as_transform().unwrap().evaluate_position(t).unwrap();
        let b = full.as_transform().unwrap().evaluate_position(t).unwrap();
        approx(a[0], b[0], 1e-6);
    }

    let edges = original.clone_target(false, 4.0);
    assert_eq!(edges.key_times().len(), 2);
    let e = edges.as_transform().unwrap();
    approx(e.evaluate_position(0.0).unwrap()[0], 0.0, 1e-6);
    approx(e.evaluate_position(4.0).unwrap()[0], 0.5, 1e-6);

    // Shrink, then restore from the backup: keys past the new end are dropped.
    clip.set_length(2.0).unwrap();
    let target = clip.target_mut("hand").unwrap();
    target.restore_from(&original, 2.0).unwrap();
    let times = target.key_times();
    assert!(times.iter().all(|t| *t <= 2.0 + KEY_EPSILON), "{times:?}");
    assert!(times.iter().any(|t| (*t - 2.0).abs() <= KEY_EPSILON));
}

/// it should finish a slow rebuild and surface a performance warning
#[test]
fn slow_rebuild_is_reported_not_aborted() {
    let cfg = EngineConfig {
        rebuild_warning_ms: -1.0,
        ..Default::default()
    };
    let mut engine = AnimationEngine::new("slow", cfg);
    engine
        .add_clip(clips::param_clip("A", LAYER, 2.0, &[(0.0, 0.0), (1.0, 1.0)]))
        .unwrap();
    let report = engine.rebuild();
    assert_eq!(report.targets, 1);
    assert!(!engine.needs_rebuild());

    let mut host = TestHost::new();
    let events = engine
        .update(0.0, Inputs::default(), &mut host.host())
        .events
        .clone();
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::PerformanceWarning { metric, .. } if metric == "rebuild_ms")));
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::Rebuilt { targets: 1, .. })));
}
