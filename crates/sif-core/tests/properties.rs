use std::collections::BTreeMap;

use glam::DVec2;
use serde_json::json;
use sif_core::bline::sample_bline;
use sif_core::interpolation::{Resolution, Track, Waypoint};
use sif_core::keyframes::shape_property;
use sif_core::outline::{outline, OutlineOptions};
use sif_core::param::Param;
use sif_core::sampler::{sample_integer, sample_real, sample_vector};
use sif_core::shapes::Star;
use sif_core::units::VectorMap;
use sif_core::{synthesize, BoneArena, FrameWindow, ParamBuilder, Scope};
use sif_data::{Interpolation, Node};

fn node(value: serde_json::Value) -> Node {
    serde_json::from_value(value).unwrap()
}

fn build(value: serde_json::Value) -> Param {
    let defs = BTreeMap::new();
    let mut builder = ParamBuilder::new(&defs, "layer", 24.0);
    builder.build(&node(value)).unwrap()
}

fn synthesized(param: &Param, bones: &BoneArena) -> (Param, FrameWindow) {
    let mut window = FrameWindow::default();
    let param = synthesize(param, bones, "layer", &mut window).unwrap();
    (param, window)
}

#[test]
fn test_linear_tangents_are_chords() {
    let scalar = Track::new(vec![
        Waypoint::new(0.0, 2.0).with_modes(Interpolation::Linear, Interpolation::Linear),
        Waypoint::new(12.0, 5.0).with_modes(Interpolation::Linear, Interpolation::Linear),
    ])
    .unwrap();
    let Resolution::Curve {
        out_tangent,
        in_tangent,
        ..
    } = &scalar.segments()[0].resolution
    else {
        panic!("expected a curve");
    };
    assert_eq!(*out_tangent, 3.0);
    assert_eq!(*in_tangent, 3.0);

    let vector = Track::new(vec![
        Waypoint::new(0.0, DVec2::new(1.0, 1.0)).with_modes(Interpolation::Linear, Interpolation::Linear),
        Waypoint::new(6.0, DVec2::new(4.0, -1.0)).with_modes(Interpolation::Linear, Interpolation::Linear),
    ])
    .unwrap();
    let Resolution::Curve {
        out_tangent,
        in_tangent,
        ..
    } = &vector.segments()[0].resolution
    else {
        panic!("expected a curve");
    };
    assert_eq!(*out_tangent, DVec2::new(3.0, -2.0));
    assert_eq!(*in_tangent, DVec2::new(3.0, -2.0));
}

#[test]
fn test_constant_interval_holds() {
    let bones = BoneArena::default();
    let scope = Scope::new(&bones, "layer", 24.0);
    let param = build(json!({"animated": {"type": "real", "waypoints": [
        {"time": "0s", "value": {"real": 1.0}, "before": "constant", "after": "constant"},
        {"time": "1s", "value": {"real": 7.0}, "before": "constant", "after": "constant"}
    ]}}));
    for frame in 0..24 {
        assert_eq!(sample_real(&param, frame as f64, &scope, "value").unwrap(), 1.0);
    }
    assert_eq!(sample_real(&param, 24.0, &scope, "value").unwrap(), 7.0);
}

#[test]
fn test_clamped_never_overshoots() {
    let bones = BoneArena::default();
    let scope = Scope::new(&bones, "layer", 24.0);
    let param = build(json!({"animated": {"type": "real", "waypoints": [
        {"time": "0f", "value": {"real": 1.0}},
        {"time": "10f", "value": {"real": 2.0}},
        {"time": "20f", "value": {"real": 3.0}}
    ]}}));
    for tenth in 0..=200 {
        let v = sample_real(&param, tenth as f64 / 10.0, &scope, "value").unwrap();
        assert!((1.0..=3.0).contains(&v), "{} at {}", v, tenth);
    }
}

#[test]
fn test_window_covers_every_keyframe() {
    let bones = BoneArena::default();
    let param = build(json!({"add": {
        "lhs": {"animated": {"type": "real", "waypoints": [
            {"time": "5f", "value": {"real": 0.0}},
            {"time": "12f", "value": {"real": 1.0}}
        ]}},
        "rhs": {"animated": {"type": "real", "waypoints": [
            {"time": "-3f", "value": {"real": 0.0}},
            {"time": "8f", "value": {"real": 1.0}}
        ]}},
        "scalar": {"real": 1.0}
    }}));
    let mut window = FrameWindow::new(0, 0);
    let before = window;
    synthesize(&param, &bones, "layer", &mut window).unwrap();
    assert!(window.first() <= before.first());
    assert!(window.last() >= before.last());
    assert_eq!(window, FrameWindow::new(-3, 12));
}

#[test]
fn test_bone_chain_composes_through_parent() {
    let bones: Vec<sif_data::Bone> = serde_json::from_value(json!([
        {"id": "a", "origin": {"vector": [1.0, 0.0]}, "angle": {"angle": 90.0},
         "local_length_scale": {"real": 2.0}},
        {"id": "b", "parent": "a", "origin": {"vector": [2.0, 3.0]}, "angle": {"angle": 45.0}},
        {"id": "c", "parent": "b", "origin": {"vector": [1.0, 0.0]}}
    ]))
    .unwrap();
    let defs = BTreeMap::new();
    let mut builder = ParamBuilder::new(&defs, "layer", 24.0);
    let arena = BoneArena::build(&bones, &mut builder).unwrap();
    let scope = Scope::new(&arena, "layer", 24.0);

    // b's origin is scaled by a's local scale, then turned by a's angle
    let b = arena.resolve(arena.key("b").unwrap(), 0.0, &scope).unwrap();
    assert!(b.origin.distance(DVec2::new(-5.0, 4.0)) < 1e-12);
    assert!((b.angle - 135.0).abs() < 1e-12);
    assert_eq!(b.recursive_scale, DVec2::ONE);

    let c = arena.resolve(arena.key("c").unwrap(), 0.0, &scope).unwrap();
    let half = std::f64::consts::FRAC_1_SQRT_2;
    assert!(c.origin.distance(DVec2::new(-5.0 - half, 4.0 + half)) < 1e-12);
    assert!((c.angle - 135.0).abs() < 1e-12);
    assert_eq!(c.recursive_scale, DVec2::ONE);
}

#[test]
fn test_star_vertex_count_is_fixed() {
    let bones = BoneArena::default();
    let scope = Scope::new(&bones, "layer", 24.0);
    let points = build(json!({"animated": {"type": "integer", "waypoints": [
        {"time": "0f", "value": {"integer": 3}},
        {"time": "10f", "value": {"integer": 5}}
    ]}}));
    let (points, window) = synthesized(&points, &bones);
    assert_eq!(window, FrameWindow::new(0, 10));

    let mut frames = Vec::new();
    for frame in window.first()..=window.last() + 1 {
        let n = sample_integer(&points, frame as f64, &scope, "points").unwrap();
        let star = Star {
            radius1: 1.0,
            radius2: 0.5,
            angle: 90.0,
            points: n,
            regular_polygon: false,
        };
        frames.push((frame as f64, Some(star.path().to_bezier(&VectorMap::IDENTITY))));
    }
    let prop = shape_property(frames).unwrap();
    for kf in prop.keyframes().iter().filter(|k| k.s.is_some()) {
        assert_eq!(kf.s.as_ref().unwrap().len(), 10);
        assert_eq!(kf.e.as_ref().unwrap().len(), 10);
    }
}

#[test]
fn test_two_point_line_is_rectangle() {
    let bones = BoneArena::default();
    let scope = Scope::new(&bones, "layer", 24.0);
    let param = build(json!({"bline": {"loop": false, "entries": [
        {"point": {"vector": [0.0, 0.0]}},
        {"point": {"vector": [10.0, 0.0]}}
    ]}}));
    let (Param::Bline(bline), _) = synthesized(&param, &bones) else {
        panic!("expected a bline");
    };
    let opts = OutlineOptions {
        width: 2.0,
        round_tip: [false, false],
        ..OutlineOptions::default()
    };
    for frame in [0.0, 7.0, 1000.0] {
        let sampled = sample_bline(&bline, frame, &scope).unwrap();
        let path = outline(&sampled, &opts).unwrap();
        assert_eq!(path.len(), 4);
        let ys: Vec<f64> = path.vertices.iter().map(|v| v.point.y).collect();
        assert_eq!(ys, vec![-1.0, -1.0, 1.0, 1.0]);
        assert!(path.closed);
    }
}

#[test]
fn test_constants_survive_synthesis() {
    let bones = BoneArena::default();
    let scope = Scope::new(&bones, "layer", 24.0);
    let (param, window) = synthesized(&Param::real(2.5), &bones);
    assert_eq!(window.frames(), 0..=0);
    assert_eq!(sample_real(&param, 0.0, &scope, "value").unwrap(), 2.5);
    assert_eq!(sample_real(&param, 1_000_000.0, &scope, "value").unwrap(), 2.5);

    let (vector, _) = synthesized(&Param::vector(1.0, -1.0), &bones);
    assert_eq!(
        sample_vector(&vector, 1_000_000.0, &scope, "value").unwrap(),
        DVec2::new(1.0, -1.0)
    );
}
