//! Emission of resolved parameters as output properties.
//!
//! Keyframed leaves become one keyframe per interval with normalized
//! easing handles derived from the Hermite tangents. Converts and bone
//! links have no closed form in the output format and are sampled once per
//! frame across their window. Synthesized constants collapse to static
//! values.

use glam::{DVec2, DVec4};
use lottie_data::model::{BezierPath, BezierTangent, Keyframe, Property};
use tracing::debug;

use crate::error::Result;
use crate::interpolation::{ease_handles, Resolution, Steps, Track};
use crate::param::{AnimatedTrack, Param};
use crate::sampler::{sample_color, sample_real, sample_vector, Scope};
use crate::units::{ScalarMap, Units, VectorMap};
use crate::window::FrameWindow;

const LINEAR_OUT: DVec2 = DVec2::new(1.0 / 3.0, 1.0 / 3.0);
const LINEAR_IN: DVec2 = DVec2::new(2.0 / 3.0, 2.0 / 3.0);
const SHAPE_HANDLE: f64 = 0.5;

fn tangent(h: DVec2) -> BezierTangent {
    BezierTangent::scalar(h.x, h.y)
}

/// Easing handles of one interval in normalized time and value. An eased
/// side keeps its fixed shoulder; a flat interval keeps linear handles.
pub fn value_handles(
    start: f64,
    end: f64,
    out_tangent: f64,
    in_tangent: f64,
    ease_out: bool,
    ease_in: bool,
) -> (DVec2, DVec2) {
    let (mut o, mut i) = ease_handles(ease_out, ease_in);
    let delta = end - start;
    if delta.abs() > 1e-9 {
        if !ease_out {
            o = DVec2::new(1.0 / 3.0, out_tangent / 3.0 / delta);
        }
        if !ease_in {
            i = DVec2::new(2.0 / 3.0, 1.0 - in_tangent / 3.0 / delta);
        }
    }
    (o, i)
}

fn curve_keyframe<T>(t: f64, s: T, e: T, o: BezierTangent, i: BezierTangent) -> Keyframe<T> {
    Keyframe {
        s: Some(s),
        e: Some(e),
        o: Some(o),
        i: Some(i),
        ..Keyframe::sentinel(t)
    }
}

fn scalar_keyframes(track: &Track<f64>, map: ScalarMap) -> Vec<Keyframe<f64>> {
    let mut out = Vec::with_capacity(track.segments().len() + 1);
    for seg in track.segments() {
        let s = map.apply(seg.p1);
        match &seg.resolution {
            Resolution::Hold => out.push(Keyframe::hold(seg.start, s)),
            Resolution::Curve {
                out_tangent,
                in_tangent,
                ease_out,
                ease_in,
            } => {
                let e = map.apply(seg.p2);
                let (o, i) = value_handles(
                    s,
                    e,
                    map.apply_delta(*out_tangent),
                    map.apply_delta(*in_tangent),
                    *ease_out,
                    *ease_in,
                );
                out.push(curve_keyframe(seg.start, s, e, tangent(o), tangent(i)));
            }
        }
    }
    out.push(Keyframe::sentinel(track.last_frame()));
    out
}

fn step_keyframes<T: Clone, U>(steps: &Steps<T>, f: impl Fn(&T) -> U) -> Vec<Keyframe<U>> {
    let keys = steps.keys();
    let mut out: Vec<Keyframe<U>> = keys.iter().map(|(t, v)| Keyframe::hold(*t, f(v))).collect();
    if let Some((last, _)) = keys.last() {
        out.push(Keyframe::sentinel(*last));
    }
    out
}

fn vector_keyframes(track: &Track<DVec2>, map: VectorMap, spatial: bool) -> Vec<Keyframe<Vec<f64>>> {
    let mut out = Vec::with_capacity(track.segments().len() + 1);
    for seg in track.segments() {
        let s = map.apply(seg.p1);
        let Resolution::Curve {
            out_tangent,
            in_tangent,
            ease_out,
            ease_in,
        } = &seg.resolution
        else {
            out.push(Keyframe::hold(seg.start, vec![s.x, s.y]));
            continue;
        };
        let e = map.apply(seg.p2);
        let out_t = map.apply_delta(*out_tangent);
        let in_t = map.apply_delta(*in_tangent);
        let kf = if spatial {
            let (o, i) = ease_handles(*ease_out, *ease_in);
            let mut kf = curve_keyframe(seg.start, vec![s.x, s.y], vec![e.x, e.y], tangent(o), tangent(i));
            kf.to = Some(vec![out_t.x / 3.0, out_t.y / 3.0]);
            kf.ti = Some(vec![-in_t.x / 3.0, -in_t.y / 3.0]);
            kf
        } else {
            let (ox, ix) = value_handles(s.x, e.x, out_t.x, in_t.x, *ease_out, *ease_in);
            let (oy, iy) = value_handles(s.y, e.y, out_t.y, in_t.y, *ease_out, *ease_in);
            curve_keyframe(
                seg.start,
                vec![s.x, s.y],
                vec![e.x, e.y],
                BezierTangent {
                    x: vec![ox.x, oy.x],
                    y: vec![ox.y, oy.y],
                },
                BezierTangent {
                    x: vec![ix.x, iy.x],
                    y: vec![ix.y, iy.y],
                },
            )
        };
        out.push(kf);
    }
    out.push(Keyframe::sentinel(track.last_frame()));
    out
}

fn color_keyframes(track: &Track<DVec4>, units: &Units) -> Vec<Keyframe<Vec<f64>>> {
    let mut out = Vec::with_capacity(track.segments().len() + 1);
    for seg in track.segments() {
        let s = units.color(seg.p1);
        match &seg.resolution {
            Resolution::Hold => out.push(Keyframe::hold(seg.start, s)),
            Resolution::Curve {
                ease_out, ease_in, ..
            } => {
                let (o, i) = ease_handles(*ease_out, *ease_in);
                out.push(curve_keyframe(seg.start, s, units.color(seg.p2), tangent(o), tangent(i)));
            }
        }
    }
    out.push(Keyframe::sentinel(track.last_frame()));
    out
}

/// Samples `value_at` on every frame of `window` plus the one after it,
/// linking consecutive frames with linear keyframes. A single-frame window
/// gives a static property.
pub fn sampled_property<T: Clone>(
    window: &FrameWindow,
    mut value_at: impl FnMut(f64) -> Result<T>,
) -> Result<Property<T>> {
    if window.is_single() {
        return Ok(Property::fixed(value_at(window.first() as f64)?));
    }
    let first = window.first();
    let last = window.last() + 1;
    let mut values = Vec::with_capacity((last - first + 1) as usize);
    for frame in first..=last {
        values.push((frame as f64, value_at(frame as f64)?));
    }
    debug!(first, last, "sampled property");
    let mut keyframes: Vec<Keyframe<T>> = values
        .windows(2)
        .map(|pair| {
            curve_keyframe(
                pair[0].0,
                pair[0].1.clone(),
                pair[1].1.clone(),
                tangent(LINEAR_OUT),
                tangent(LINEAR_IN),
            )
        })
        .collect();
    keyframes.push(Keyframe::sentinel(last as f64));
    Ok(Property::animated(keyframes))
}

/// A real-valued parameter through `map`.
pub fn scalar_property(
    param: &Param,
    window: &FrameWindow,
    scope: &Scope,
    map: ScalarMap,
    what: &str,
) -> Result<Property<f64>> {
    match param {
        Param::Animated(AnimatedTrack::Real(t) | AnimatedTrack::Angle(t) | AnimatedTrack::Time(t)) => {
            if t.is_synthetic() {
                Ok(Property::fixed(map.apply(t.value_at(t.first_frame()))))
            } else {
                Ok(Property::animated(scalar_keyframes(t, map)))
            }
        }
        Param::Animated(AnimatedTrack::Integer(s)) => Ok(steps_property(s, |v| map.apply(*v as f64))),
        Param::Animated(AnimatedTrack::Bool(s)) => {
            Ok(steps_property(s, |v| map.apply(if *v { 1.0 } else { 0.0 })))
        }
        _ => sampled_property(window, |f| Ok(map.apply(sample_real(param, f, scope, what)?))),
    }
}

fn steps_property<T: Clone, U>(steps: &Steps<T>, f: impl Fn(&T) -> U) -> Property<U> {
    match steps.keys().first() {
        Some((_, v)) if steps.is_synthetic() => Property::fixed(f(v)),
        _ => Property::animated(step_keyframes(steps, f)),
    }
}

/// A vector parameter through `map`. Spatial vectors (positions) carry
/// their tangents as `to`/`ti`; others get per-axis easing.
pub fn vector_property(
    param: &Param,
    window: &FrameWindow,
    scope: &Scope,
    map: VectorMap,
    spatial: bool,
    what: &str,
) -> Result<Property<Vec<f64>>> {
    match param {
        Param::Animated(AnimatedTrack::Vector(t)) => {
            if t.is_synthetic() {
                let v = map.apply(t.value_at(t.first_frame()));
                Ok(Property::fixed(vec![v.x, v.y]))
            } else {
                Ok(Property::animated(vector_keyframes(t, map, spatial)))
            }
        }
        _ => sampled_property(window, |f| {
            let v = map.apply(sample_vector(param, f, scope, what)?);
            Ok(vec![v.x, v.y])
        }),
    }
}

/// A color parameter, gamma corrected.
pub fn color_property(
    param: &Param,
    window: &FrameWindow,
    scope: &Scope,
    units: &Units,
    what: &str,
) -> Result<Property<Vec<f64>>> {
    match param {
        Param::Animated(AnimatedTrack::Color(t)) => {
            if t.is_synthetic() {
                Ok(Property::fixed(units.color(t.value_at(t.first_frame()))))
            } else {
                Ok(Property::animated(color_keyframes(t, units)))
            }
        }
        _ => sampled_property(window, |f| Ok(units.color(sample_color(param, f, scope, what)?))),
    }
}

/// Per-frame shapes, one entry per consecutive frame including the one
/// after the window. Every shape is padded to the largest vertex count;
/// frames without geometry collapse onto a neighbour's first vertex.
/// `None` when no frame has geometry.
pub fn shape_property(frames: Vec<(f64, Option<BezierPath>)>) -> Option<Property<BezierPath>> {
    let count = frames
        .iter()
        .filter_map(|(_, p)| p.as_ref().map(BezierPath::len))
        .max()?;
    let fallback = frames.iter().find_map(|(_, p)| p.clone())?;
    let mut last_valid = fallback;
    let mut shapes = Vec::with_capacity(frames.len());
    for (frame, path) in frames {
        let mut shape = match path {
            Some(p) if !p.is_empty() => {
                last_valid = p.clone();
                p
            }
            _ => collapsed(&last_valid),
        };
        shape.pad_to(count);
        shapes.push((frame, shape));
    }
    if shapes.len() == 1 {
        return shapes.pop().map(|(_, s)| Property::fixed(s));
    }
    let handle = tangent(DVec2::splat(SHAPE_HANDLE));
    let mut keyframes: Vec<Keyframe<BezierPath>> = shapes
        .windows(2)
        .map(|pair| {
            curve_keyframe(
                pair[0].0,
                pair[0].1.clone(),
                pair[1].1.clone(),
                handle.clone(),
                handle.clone(),
            )
        })
        .collect();
    if let Some((t, _)) = shapes.last() {
        keyframes.push(Keyframe::sentinel(*t));
    }
    Some(Property::animated(keyframes))
}

/// `path` with every vertex moved onto its first one.
fn collapsed(path: &BezierPath) -> BezierPath {
    let mut out = BezierPath {
        c: path.c,
        ..BezierPath::default()
    };
    if let Some(&first) = path.v.first() {
        for _ in 0..path.len() {
            out.push(first, [0.0, 0.0], [0.0, 0.0]);
        }
    }
    out
}
