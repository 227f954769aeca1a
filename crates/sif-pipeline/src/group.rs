//! Group and switch layers, emitted as precompositions over an asset that
//! holds the nested canvas.

use glam::DVec2;
use lottie_data::model::{Asset, Keyframe, Layer, Property, Shape, Transform, Value as LottieValue};
use sif_core::keyframes::{sampled_property, scalar_property, vector_property};
use sif_core::param::AnimatedTrack;
use sif_core::sampler::{sample, sample_real, Scope};
use sif_core::units::VectorMap;
use sif_core::{FrameWindow, Param, ParamBuilder, Result, Value};
use sif_data as sif;
use tracing::{debug, warn};

use crate::{CanvasScope, Converter};

const PERCENT: VectorMap = VectorMap {
    scale: DVec2::new(100.0, 100.0),
    offset: DVec2::ZERO,
};

pub(crate) fn group_layer(
    conv: &mut Converter,
    canvas: &CanvasScope,
    layer: &sif::Layer,
    ind: u32,
    name: &str,
) -> Result<Layer> {
    let fps = conv.fps();
    let mut builder = ParamBuilder::new(&canvas.defs, name, fps);
    let transformation = builder.transformation(layer, "transformation")?;
    let origin = builder.optional(layer, "origin", Value::Vector(DVec2::ZERO))?;
    let amount = builder.optional(layer, "amount", Value::Real(1.0))?;
    let grow = builder.optional(layer, "outline_grow", Value::Real(0.0))?;
    let time_offset = builder.optional(layer, "time_offset", Value::Time(0.0))?;
    let time_dilation = builder.optional(layer, "time_dilation", Value::Real(1.0))?;
    let layer_name = match layer.kind.as_str() {
        "switch" => Some(builder.optional(layer, "layer_name", Value::String(String::new()))?),
        _ => None,
    };

    let bones = &canvas.bones;
    let scope = Scope::new(bones, name, fps);
    let units = conv.ctx.units.clone();
    let key = |param: &str| format!("{}/{}", ind, param);

    let mut ks = Transform::default();
    let (offset, w) = conv.ctx.synthesized(&key("offset"), &transformation.offset, bones, name)?;
    ks.p = vector_property(&offset, &w, &scope, units.canvas_map(), true, "offset")?;
    let (origin, w) = conv.ctx.synthesized(&key("origin"), &origin, bones, name)?;
    ks.a = vector_property(&origin, &w, &scope, units.canvas_map(), true, "origin")?;
    let (angle, w) = conv.ctx.synthesized(&key("angle"), &transformation.angle, bones, name)?;
    ks.r = scalar_property(&angle, &w, &scope, units.rotation_map(), "angle")?;
    let (scale, w) = conv.ctx.synthesized(&key("scale"), &transformation.scale, bones, name)?;
    ks.s = vector_property(&scale, &w, &scope, PERCENT, false, "scale")?;
    let (amount, w) = conv.ctx.synthesized(&key("amount"), &amount, bones, name)?;
    ks.o = scalar_property(&amount, &w, &scope, units.opacity_map(), "amount")?;

    let skew = &transformation.skew_angle;
    if skew.is_keyframed() || sample_real(skew, 0.0, &scope, "skew angle")?.abs() > 1e-9 {
        warn!(layer = name, "skew is not supported and was dropped");
    }

    let (grow, _) = conv.ctx.synthesized(&key("outline_grow"), &grow, bones, name)?;
    conv.ctx.push_grow(grow);
    let mut children = match &layer.canvas {
        Some(inner) => conv.convert_canvas(inner, Some(canvas)),
        None => Vec::new(),
    };
    conv.ctx.pop_grow();

    if let Some(layer_name) = layer_name {
        let (layer_name, _) = conv.ctx.synthesized(&key("layer_name"), &layer_name, bones, name)?;
        apply_switch(&mut children, &layer_name, &scope, conv.ip)?;
    }

    let (time_offset, mut timing) = conv.ctx.synthesized(&key("time_offset"), &time_offset, bones, name)?;
    let (time_dilation, w) = conv.ctx.synthesized(&key("time_dilation"), &time_dilation, bones, name)?;
    timing.merge(&w);
    let tm = time_remap(conv, &time_offset, &time_dilation, &timing, &scope)?;

    let id = conv.ctx.next_asset_id();
    debug!(layer = name, asset = %id, children = children.len(), "precomposition");
    conv.assets.push(Asset {
        id: id.clone(),
        nm: Some(name.to_string()),
        layers: children,
    });

    let mut out = Layer::new(0, ind, conv.ip, conv.op);
    out.nm = Some(name.to_string());
    out.ks = ks;
    out.tm = tm;
    out.ref_id = Some(id);
    out.w = Some(units.width.round() as u32);
    out.h = Some(units.height.round() as u32);
    Ok(out)
}

/// Time remap in seconds, sampled per frame. `None` when the group plays
/// in step with its parent.
fn time_remap(
    conv: &Converter,
    offset: &Param,
    dilation: &Param,
    timing: &FrameWindow,
    scope: &Scope,
) -> Result<Option<Property<f64>>> {
    if timing.is_empty() {
        let o = sample_real(offset, 0.0, scope, "time offset")?;
        let d = sample_real(dilation, 0.0, scope, "time dilation")?;
        if o.abs() < 1e-9 && (d - 1.0).abs() < 1e-9 {
            return Ok(None);
        }
    }
    let fps = conv.fps();
    let (lo, hi) = (conv.ip / fps, conv.op / fps);
    let first = conv.ip as i64;
    let window = FrameWindow::new(first, (conv.op as i64 - 1).max(first));
    let property = sampled_property(&window, |frame| {
        let o = sample_real(offset, frame, scope, "time offset")?;
        let d = sample_real(dilation, frame, scope, "time dilation")?;
        Ok((o + frame / fps * d).clamp(lo.min(hi), hi.max(lo)))
    })?;
    Ok(Some(property))
}

/// Frames at which the active layer name changes, with the name from
/// then on.
fn switch_keys(layer_name: &Param, scope: &Scope) -> Result<Vec<(f64, String)>> {
    match layer_name {
        Param::Animated(AnimatedTrack::String(steps)) => Ok(steps.keys().to_vec()),
        other => {
            let value = sample(other, 0.0, scope)?;
            let name = value.as_string(&format!("layer_name of layer '{}'", scope.layer))?;
            Ok(vec![(0.0, name.to_string())])
        }
    }
}

/// Hides every child of a switch except the one named by `layer_name`,
/// through hold keyframes on its opacity. An empty name selects the
/// top-most child.
fn apply_switch(children: &mut [Layer], layer_name: &Param, scope: &Scope, ip: f64) -> Result<()> {
    let keys = switch_keys(layer_name, scope)?;
    for (index, child) in children.iter_mut().enumerate() {
        let own = child.nm.clone().unwrap_or_default();
        let visible = |name: &str| name == own || (name.is_empty() && index == 0);
        set_switch_opacity(child, |full| {
            let mut steps: Vec<(f64, f64)> = Vec::with_capacity(keys.len());
            for (i, (frame, name)) in keys.iter().enumerate() {
                let t = if i == 0 { frame.min(ip) } else { *frame };
                let v = if visible(name) { full } else { 0.0 };
                if steps.last().map(|(_, prev)| *prev) != Some(v) {
                    steps.push((t, v));
                }
            }
            match steps.as_slice() {
                [] => Property::fixed(0.0),
                [(_, v)] => Property::fixed(*v),
                _ => {
                    let last = keys.last().map_or(0.0, |(t, _)| *t);
                    let mut keyframes: Vec<Keyframe<f64>> =
                        steps.iter().map(|(t, v)| Keyframe::hold(*t, *v)).collect();
                    keyframes.push(Keyframe::sentinel(last));
                    Property::animated(keyframes)
                }
            }
        });
    }
    Ok(())
}

/// Replaces the opacity a switch controls: the fill of a shape layer, the
/// layer opacity otherwise. `f` gets the opacity shown while visible.
fn set_switch_opacity(layer: &mut Layer, f: impl FnOnce(f64) -> Property<f64>) {
    let fill = layer.shapes.as_mut().and_then(|shapes| {
        shapes.iter_mut().find_map(|shape| match shape {
            Shape::Group(group) => group.it.iter_mut().find_map(|item| match item {
                Shape::Fill(fill) => Some(fill),
                _ => None,
            }),
            _ => None,
        })
    });
    match fill {
        Some(fill) => fill.o = f(static_value(&fill.o)),
        None => layer.ks.o = f(static_value(&layer.ks.o)),
    }
}

fn static_value(p: &Property<f64>) -> f64 {
    match &p.k {
        LottieValue::Static(v) => *v,
        _ => 100.0,
    }
}
