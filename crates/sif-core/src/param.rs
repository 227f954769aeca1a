//! Parameter trees: scene nodes with references resolved, times converted
//! to frames and animated leaves turned into interpolation tracks.

use std::collections::BTreeMap;

use glam::{DVec2, DVec4};
use sif_data::{self as sif, Node, ValueType};

use crate::error::{ConvertError, Result};
use crate::interpolation::{Steps, Track, Waypoint};
use crate::value::{Gradient, GradientStop, Smoothing, Value};

/// An animated leaf, typed by its value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimatedTrack {
    Real(Track<f64>),
    Angle(Track<f64>),
    Time(Track<f64>),
    Vector(Track<DVec2>),
    Color(Track<DVec4>),
    Gradient(Track<Gradient>),
    Bool(Steps<bool>),
    Integer(Steps<i64>),
    String(Steps<String>),
}

impl AnimatedTrack {
    pub fn value_at(&self, frame: f64) -> Value {
        match self {
            AnimatedTrack::Real(t) => Value::Real(t.value_at(frame)),
            AnimatedTrack::Angle(t) => Value::Angle(t.value_at(frame)),
            AnimatedTrack::Time(t) => Value::Time(t.value_at(frame)),
            AnimatedTrack::Vector(t) => Value::Vector(t.value_at(frame)),
            AnimatedTrack::Color(t) => Value::Color(t.value_at(frame)),
            AnimatedTrack::Gradient(t) => Value::Gradient(t.value_at(frame)),
            AnimatedTrack::Bool(s) => Value::Bool(s.value_at(frame)),
            AnimatedTrack::Integer(s) => Value::Integer(s.value_at(frame)),
            AnimatedTrack::String(s) => Value::String(s.value_at(frame)),
        }
    }

    /// Frames of every waypoint, in order.
    pub fn frames(&self) -> Vec<f64> {
        fn of<T>(t: &Track<T>) -> Vec<f64>
        where
            T: crate::value::Interpolatable,
        {
            t.waypoints().iter().map(|w| w.frame).collect()
        }
        fn keys<T: Clone>(s: &Steps<T>) -> Vec<f64> {
            s.keys().iter().map(|(f, _)| *f).collect()
        }
        match self {
            AnimatedTrack::Real(t) | AnimatedTrack::Angle(t) | AnimatedTrack::Time(t) => of(t),
            AnimatedTrack::Vector(t) => of(t),
            AnimatedTrack::Color(t) => of(t),
            AnimatedTrack::Gradient(t) => of(t),
            AnimatedTrack::Bool(s) => keys(s),
            AnimatedTrack::Integer(s) => keys(s),
            AnimatedTrack::String(s) => keys(s),
        }
    }

    pub fn is_synthetic(&self) -> bool {
        match self {
            AnimatedTrack::Real(t) | AnimatedTrack::Angle(t) | AnimatedTrack::Time(t) => {
                t.is_synthetic()
            }
            AnimatedTrack::Vector(t) => t.is_synthetic(),
            AnimatedTrack::Color(t) => t.is_synthetic(),
            AnimatedTrack::Gradient(t) => t.is_synthetic(),
            AnimatedTrack::Bool(s) => s.is_synthetic(),
            AnimatedTrack::Integer(s) => s.is_synthetic(),
            AnimatedTrack::String(s) => s.is_synthetic(),
        }
    }

    /// A synthetic track holding `value` at `frame` and `frame + 1`.
    pub fn constant_at(value: Value, frame: f64) -> Self {
        match value {
            Value::Real(v) => AnimatedTrack::Real(Track::constant_at(v, frame)),
            Value::Angle(v) => AnimatedTrack::Angle(Track::constant_at(v, frame)),
            Value::Time(v) => AnimatedTrack::Time(Track::constant_at(v, frame)),
            Value::Vector(v) => AnimatedTrack::Vector(Track::constant_at(v, frame)),
            Value::Color(v) => AnimatedTrack::Color(Track::constant_at(v, frame)),
            Value::Gradient(v) => AnimatedTrack::Gradient(Track::constant_at(v, frame)),
            Value::Bool(v) => AnimatedTrack::Bool(Steps::constant_at(v, frame)),
            Value::Integer(v) => AnimatedTrack::Integer(Steps::constant_at(v, frame)),
            Value::String(v) => AnimatedTrack::String(Steps::constant_at(v, frame)),
        }
    }
}

/// On/off switches over time for list entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Activepoints(Vec<(f64, bool)>);

impl Activepoints {
    pub fn new(mut points: Vec<(f64, bool)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Activepoints(points)
    }

    pub fn frames(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().map(|(f, _)| *f)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// How much the entry is switched on at `frame`, in `[0, 1]`. Between an
    /// on and an off point the amount ramps linearly.
    pub fn amount_at(&self, frame: f64) -> f64 {
        let points = &self.0;
        let Some(first) = points.first() else {
            return 1.0;
        };
        let on = |state: bool| if state { 1.0 } else { 0.0 };
        if let Some((_, state)) = points.iter().find(|(f, _)| *f == frame) {
            return on(*state);
        }
        if frame < first.0 {
            return on(first.1);
        }
        let idx = points.partition_point(|(f, _)| *f < frame);
        if idx >= points.len() {
            return on(points[points.len() - 1].1);
        }
        let (pf, ps) = points[idx - 1];
        let (nf, ns) = points[idx];
        if ps == ns {
            return on(ps);
        }
        let k = (frame - pf) / (nf - pf);
        on(ps) + (on(ns) - on(ps)) * k
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlineEntryParam {
    pub point: Param,
    pub width: Param,
    pub origin: Param,
    pub t1: Param,
    pub t2: Param,
    pub split_radius: Param,
    pub split_angle: Param,
    pub activepoints: Activepoints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlineParam {
    pub looped: bool,
    pub entries: Vec<BlineEntryParam>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidthPointParam {
    pub position: Param,
    pub width: Param,
    pub side_before: Param,
    pub side_after: Param,
    pub lower_bound: Param,
    pub upper_bound: Param,
    pub priority: i64,
    pub activepoints: Activepoints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WidthPointsParam {
    pub looped: bool,
    pub entries: Vec<WidthPointParam>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashItemParam {
    pub offset: Param,
    pub length: Param,
    pub side_before: Param,
    pub side_after: Param,
    pub activepoints: Activepoints,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneLinkParam {
    pub bone: String,
    pub base: Param,
    pub translate: bool,
    pub rotate: bool,
    pub scale: bool,
}

/// Components of a group layer transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformationParam {
    pub offset: Param,
    pub angle: Param,
    pub skew_angle: Param,
    pub scale: Param,
}

/// Combinators over sampled operands.
#[derive(Debug, Clone, PartialEq)]
pub enum Convert {
    Add { lhs: Param, rhs: Param, scalar: Param },
    Subtract { lhs: Param, rhs: Param, scalar: Param },
    Average(Vec<Param>),
    WeightedAverage(Vec<(Param, Param)>),
    Switch { link_off: Param, link_on: Param, switch: Param },
    Exponential { exp: Param, scale: Param },
    Power { base: Param, power: Param, epsilon: Param, infinite: Param },
    Cos { angle: Param, amp: Param },
    Sin { angle: Param, amp: Param },
    Atan2 { x: Param, y: Param },
    Composite { x: Param, y: Param },
    RadialComposite { radius: Param, theta: Param },
    Linear { slope: Param, offset: Param },
    Scale { link: Param, scalar: Param },
    Reciprocal { link: Param, epsilon: Param, infinite: Param },
    VectorLength(Param),
    VectorAngle(Param),
    VectorX(Param),
    VectorY(Param),
}

impl Convert {
    pub fn kind(&self) -> &'static str {
        match self {
            Convert::Add { .. } => "add",
            Convert::Subtract { .. } => "subtract",
            Convert::Average(_) => "average",
            Convert::WeightedAverage(_) => "weighted_average",
            Convert::Switch { .. } => "switch",
            Convert::Exponential { .. } => "exponential",
            Convert::Power { .. } => "power",
            Convert::Cos { .. } => "cos",
            Convert::Sin { .. } => "sin",
            Convert::Atan2 { .. } => "atan2",
            Convert::Composite { .. } => "composite",
            Convert::RadialComposite { .. } => "radial_composite",
            Convert::Linear { .. } => "linear",
            Convert::Scale { .. } => "scale",
            Convert::Reciprocal { .. } => "reciprocal",
            Convert::VectorLength(_) => "vector_length",
            Convert::VectorAngle(_) => "vector_angle",
            Convert::VectorX(_) => "vector_x",
            Convert::VectorY(_) => "vector_y",
        }
    }

    /// Every operand, in declaration order.
    pub fn operands(&self) -> Vec<&Param> {
        match self {
            Convert::Add { lhs, rhs, scalar } | Convert::Subtract { lhs, rhs, scalar } => {
                vec![lhs, rhs, scalar]
            }
            Convert::Average(entries) => entries.iter().collect(),
            Convert::WeightedAverage(entries) => {
                entries.iter().flat_map(|(w, v)| [w, v]).collect()
            }
            Convert::Switch {
                link_off,
                link_on,
                switch,
            } => vec![link_off, link_on, switch],
            Convert::Exponential { exp, scale } => vec![exp, scale],
            Convert::Power {
                base,
                power,
                epsilon,
                infinite,
            } => vec![base, power, epsilon, infinite],
            Convert::Cos { angle, amp } | Convert::Sin { angle, amp } => vec![angle, amp],
            Convert::Atan2 { x, y } | Convert::Composite { x, y } => vec![x, y],
            Convert::RadialComposite { radius, theta } => vec![radius, theta],
            Convert::Linear { slope, offset } => vec![slope, offset],
            Convert::Scale { link, scalar } => vec![link, scalar],
            Convert::Reciprocal {
                link,
                epsilon,
                infinite,
            } => vec![link, epsilon, infinite],
            Convert::VectorLength(v)
            | Convert::VectorAngle(v)
            | Convert::VectorX(v)
            | Convert::VectorY(v) => vec![v],
        }
    }

    /// Rebuilds the convert with every operand passed through `f`.
    pub fn try_map(&self, mut f: impl FnMut(&Param) -> Result<Param>) -> Result<Convert> {
        Ok(match self {
            Convert::Add { lhs, rhs, scalar } => Convert::Add {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
                scalar: f(scalar)?,
            },
            Convert::Subtract { lhs, rhs, scalar } => Convert::Subtract {
                lhs: f(lhs)?,
                rhs: f(rhs)?,
                scalar: f(scalar)?,
            },
            Convert::Average(entries) => {
                Convert::Average(entries.iter().map(&mut f).collect::<Result<_>>()?)
            }
            Convert::WeightedAverage(entries) => Convert::WeightedAverage(
                entries
                    .iter()
                    .map(|(w, v)| Ok((f(w)?, f(v)?)))
                    .collect::<Result<_>>()?,
            ),
            Convert::Switch {
                link_off,
                link_on,
                switch,
            } => Convert::Switch {
                link_off: f(link_off)?,
                link_on: f(link_on)?,
                switch: f(switch)?,
            },
            Convert::Exponential { exp, scale } => Convert::Exponential {
                exp: f(exp)?,
                scale: f(scale)?,
            },
            Convert::Power {
                base,
                power,
                epsilon,
                infinite,
            } => Convert::Power {
                base: f(base)?,
                power: f(power)?,
                epsilon: f(epsilon)?,
                infinite: f(infinite)?,
            },
            Convert::Cos { angle, amp } => Convert::Cos {
                angle: f(angle)?,
                amp: f(amp)?,
            },
            Convert::Sin { angle, amp } => Convert::Sin {
                angle: f(angle)?,
                amp: f(amp)?,
            },
            Convert::Atan2 { x, y } => Convert::Atan2 { x: f(x)?, y: f(y)? },
            Convert::Composite { x, y } => Convert::Composite { x: f(x)?, y: f(y)? },
            Convert::RadialComposite { radius, theta } => Convert::RadialComposite {
                radius: f(radius)?,
                theta: f(theta)?,
            },
            Convert::Linear { slope, offset } => Convert::Linear {
                slope: f(slope)?,
                offset: f(offset)?,
            },
            Convert::Scale { link, scalar } => Convert::Scale {
                link: f(link)?,
                scalar: f(scalar)?,
            },
            Convert::Reciprocal {
                link,
                epsilon,
                infinite,
            } => Convert::Reciprocal {
                link: f(link)?,
                epsilon: f(epsilon)?,
                infinite: f(infinite)?,
            },
            Convert::VectorLength(v) => Convert::VectorLength(f(v)?),
            Convert::VectorAngle(v) => Convert::VectorAngle(f(v)?),
            Convert::VectorX(v) => Convert::VectorX(f(v)?),
            Convert::VectorY(v) => Convert::VectorY(f(v)?),
        })
    }
}

/// A resolved parameter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// A value that never changes. Frame-window synthesis turns these into
    /// synthetic tracks.
    Constant(Value),
    Animated(AnimatedTrack),
    Convert(Box<Convert>),
    BoneLink(Box<BoneLinkParam>),
    Bline(BlineParam),
    WidthPoints(WidthPointsParam),
    Dashes(Vec<DashItemParam>),
    VectorList(Vec<Param>),
}

impl Param {
    pub fn real(v: f64) -> Self {
        Param::Constant(Value::Real(v))
    }

    pub fn vector(x: f64, y: f64) -> Self {
        Param::Constant(Value::Vector(DVec2::new(x, y)))
    }

    /// True for animated leaves that came from real waypoints.
    pub fn is_keyframed(&self) -> bool {
        matches!(self, Param::Animated(track) if !track.is_synthetic())
    }
}

/// Builds [`Param`] trees from scene nodes for one layer.
pub struct ParamBuilder<'a> {
    defs: &'a BTreeMap<String, Node>,
    layer: &'a str,
    fps: f64,
    resolving: Vec<String>,
}

impl<'a> ParamBuilder<'a> {
    pub fn new(defs: &'a BTreeMap<String, Node>, layer: &'a str, fps: f64) -> Self {
        ParamBuilder {
            defs,
            layer,
            fps,
            resolving: Vec::new(),
        }
    }

    pub fn layer(&self) -> &str {
        self.layer
    }

    /// Builds a required layer parameter.
    pub fn required(&mut self, layer: &sif::Layer, name: &str) -> Result<Param> {
        match layer.param(name) {
            Some(node) => self.build(node),
            None => Err(ConvertError::MissingParam {
                layer: self.layer.to_string(),
                param: name.to_string(),
            }),
        }
    }

    /// Builds an optional layer parameter, falling back to `default`.
    pub fn optional(&mut self, layer: &sif::Layer, name: &str, default: Value) -> Result<Param> {
        match layer.param(name) {
            Some(node) => self.build(node),
            None => Ok(Param::Constant(default)),
        }
    }

    /// Builds a group transformation. A missing parameter is the identity;
    /// a reference is followed to the transformation it names.
    pub fn transformation(&mut self, layer: &sif::Layer, name: &str) -> Result<TransformationParam> {
        let default = sif::Transformation::default();
        let mut node = layer.param(name);
        let mut hops = 0;
        while let Some(Node::Reference(id)) = node {
            hops += 1;
            if hops > self.defs.len() {
                return Err(ConvertError::DanglingReference {
                    id: id.clone(),
                    layer: self.layer.to_string(),
                });
            }
            node = Some(self.defs.get(id).ok_or_else(|| ConvertError::DanglingReference {
                id: id.clone(),
                layer: self.layer.to_string(),
            })?);
        }
        let t = match node {
            None => &default,
            Some(Node::Transformation(t)) => t,
            Some(_) => {
                return Err(ConvertError::mismatch(
                    "transformation",
                    "value",
                    &format!("{} of layer '{}'", name, self.layer),
                ))
            }
        };
        Ok(TransformationParam {
            offset: self.build(&t.offset)?,
            angle: self.build(&t.angle)?,
            skew_angle: self.build(&t.skew_angle)?,
            scale: self.build(&t.scale)?,
        })
    }

    fn frame(&self, time: &sif::Time) -> Result<f64> {
        Ok((time.to_seconds(self.fps)? * self.fps).round())
    }

    fn boxed(&mut self, node: &Node) -> Result<Param> {
        self.build(node)
    }

    pub fn build(&mut self, node: &Node) -> Result<Param> {
        Ok(match node {
            Node::Real(v) => Param::Constant(Value::Real(*v)),
            Node::Angle(v) => Param::Constant(Value::Angle(*v)),
            Node::Integer(v) => Param::Constant(Value::Integer(*v)),
            Node::Bool(v) => Param::Constant(Value::Bool(*v)),
            Node::Vector([x, y]) => Param::Constant(Value::Vector(DVec2::new(*x, *y))),
            Node::Color(c) => Param::Constant(Value::Color(DVec4::from_array(*c))),
            Node::Gradient(stops) => Param::Constant(Value::Gradient(gradient(stops))),
            Node::Time(t) => Param::Constant(Value::Time(t.to_seconds(self.fps)?)),
            Node::String(s) => Param::Constant(Value::String(s.clone())),
            Node::Animated(anim) => Param::Animated(self.animated(anim)?),
            Node::Reference(id) => self.reference(id)?,
            Node::Add(a) => Param::Convert(Box::new(Convert::Add {
                lhs: self.boxed(&a.lhs)?,
                rhs: self.boxed(&a.rhs)?,
                scalar: self.boxed(&a.scalar)?,
            })),
            Node::Subtract(a) => Param::Convert(Box::new(Convert::Subtract {
                lhs: self.boxed(&a.lhs)?,
                rhs: self.boxed(&a.rhs)?,
                scalar: self.boxed(&a.scalar)?,
            })),
            Node::Average(e) => Param::Convert(Box::new(Convert::Average(
                e.entries.iter().map(|n| self.build(n)).collect::<Result<_>>()?,
            ))),
            Node::WeightedAverage(e) => Param::Convert(Box::new(Convert::WeightedAverage(
                e.entries
                    .iter()
                    .map(|w| Ok((self.build(&w.weight)?, self.build(&w.value)?)))
                    .collect::<Result<_>>()?,
            ))),
            Node::Switch(s) => Param::Convert(Box::new(Convert::Switch {
                link_off: self.boxed(&s.link_off)?,
                link_on: self.boxed(&s.link_on)?,
                switch: self.boxed(&s.switch)?,
            })),
            Node::Exponential(e) => Param::Convert(Box::new(Convert::Exponential {
                exp: self.boxed(&e.exp)?,
                scale: self.boxed(&e.scale)?,
            })),
            Node::Power(p) => Param::Convert(Box::new(Convert::Power {
                base: self.boxed(&p.base)?,
                power: self.boxed(&p.power)?,
                epsilon: self.boxed(&p.epsilon)?,
                infinite: self.boxed(&p.infinite)?,
            })),
            Node::Cos(t) => Param::Convert(Box::new(Convert::Cos {
                angle: self.boxed(&t.angle)?,
                amp: self.boxed(&t.amp)?,
            })),
            Node::Sin(t) => Param::Convert(Box::new(Convert::Sin {
                angle: self.boxed(&t.angle)?,
                amp: self.boxed(&t.amp)?,
            })),
            Node::Atan2(a) => Param::Convert(Box::new(Convert::Atan2 {
                x: self.boxed(&a.x)?,
                y: self.boxed(&a.y)?,
            })),
            Node::Composite(c) => Param::Convert(Box::new(Convert::Composite {
                x: self.boxed(&c.x)?,
                y: self.boxed(&c.y)?,
            })),
            Node::RadialComposite(r) => Param::Convert(Box::new(Convert::RadialComposite {
                radius: self.boxed(&r.radius)?,
                theta: self.boxed(&r.theta)?,
            })),
            Node::Linear(l) => Param::Convert(Box::new(Convert::Linear {
                slope: self.boxed(&l.slope)?,
                offset: self.boxed(&l.offset)?,
            })),
            Node::Scale(s) => Param::Convert(Box::new(Convert::Scale {
                link: self.boxed(&s.link)?,
                scalar: self.boxed(&s.scalar)?,
            })),
            Node::Reciprocal(r) => Param::Convert(Box::new(Convert::Reciprocal {
                link: self.boxed(&r.link)?,
                epsilon: self.boxed(&r.epsilon)?,
                infinite: self.boxed(&r.infinite)?,
            })),
            Node::VectorLength(v) => {
                Param::Convert(Box::new(Convert::VectorLength(self.boxed(&v.vector)?)))
            }
            Node::VectorAngle(v) => {
                Param::Convert(Box::new(Convert::VectorAngle(self.boxed(&v.vector)?)))
            }
            Node::VectorX(v) => Param::Convert(Box::new(Convert::VectorX(self.boxed(&v.vector)?))),
            Node::VectorY(v) => Param::Convert(Box::new(Convert::VectorY(self.boxed(&v.vector)?))),
            Node::BoneLink(b) => Param::BoneLink(Box::new(BoneLinkParam {
                bone: b.bone.clone(),
                base: self.boxed(&b.base_value)?,
                translate: b.translate,
                rotate: b.rotate,
                scale: b.scale,
            })),
            Node::Transformation(_) => {
                return Err(ConvertError::mismatch(
                    "value",
                    "transformation",
                    &format!("parameter of layer '{}'", self.layer),
                ))
            }
            Node::Bline(b) => Param::Bline(self.bline(b)?),
            Node::Wplist(w) => Param::WidthPoints(self.width_points(w)?),
            Node::Dilist(d) => Param::Dashes(self.dashes(d)?),
            Node::VectorList(items) => {
                Param::VectorList(items.iter().map(|n| self.build(n)).collect::<Result<_>>()?)
            }
        })
    }

    fn reference(&mut self, id: &str) -> Result<Param> {
        let dangling = || ConvertError::DanglingReference {
            id: id.to_string(),
            layer: self.layer.to_string(),
        };
        if self.resolving.iter().any(|r| r == id) {
            return Err(dangling());
        }
        let defs = self.defs;
        let node = defs.get(id).ok_or_else(dangling)?;
        self.resolving.push(id.to_string());
        let param = self.build(node);
        self.resolving.pop();
        param
    }

    fn activepoints(&self, points: &[sif::Activepoint]) -> Result<Activepoints> {
        Ok(Activepoints::new(
            points
                .iter()
                .map(|p| Ok((self.frame(&p.time)?, p.on)))
                .collect::<Result<_>>()?,
        ))
    }

    fn animated(&mut self, anim: &sif::Animated) -> Result<AnimatedTrack> {
        let layer = self.layer.to_string();
        let empty = || ConvertError::EmptyAnimation {
            context: layer.clone(),
        };
        if anim.waypoints.is_empty() {
            return Err(empty());
        }
        let context = format!("waypoint of layer '{}'", layer);
        let mut keys = Vec::with_capacity(anim.waypoints.len());
        for record in &anim.waypoints {
            let frame = self.frame(&record.time)?;
            let value = match self.build(&record.value)? {
                Param::Constant(v) => v,
                _ => {
                    return Err(ConvertError::mismatch(
                        "constant value",
                        "animated node",
                        &context,
                    ))
                }
            };
            keys.push((record, frame, value));
        }

        fn track<T: crate::value::Interpolatable>(
            keys: &[(&sif::WaypointRecord, f64, Value)],
            smoothing: Smoothing,
            extract: impl Fn(&Value) -> Result<T>,
        ) -> Result<Option<Track<T>>> {
            let waypoints = keys
                .iter()
                .map(|(r, frame, v)| {
                    Ok(Waypoint::new(*frame, extract(v)?)
                        .with_modes(r.before, r.after)
                        .with_tcb(r.tension, r.continuity, r.bias))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Track::with_smoothing(waypoints, smoothing))
        }
        fn steps<T: Clone>(
            keys: &[(&sif::WaypointRecord, f64, Value)],
            extract: impl Fn(&Value) -> Result<T>,
        ) -> Result<Option<Steps<T>>> {
            let keys = keys
                .iter()
                .map(|(_, frame, v)| Ok((*frame, extract(v)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(Steps::new(keys))
        }

        let ctx = context.as_str();
        let track = match anim.value_type {
            ValueType::Real => {
                track(&keys, Smoothing::Full, |v| v.as_real(ctx))?.map(AnimatedTrack::Real)
            }
            ValueType::Angle => track(&keys, Smoothing::LinearOnly, |v| v.as_real(ctx))?
                .map(AnimatedTrack::Angle),
            ValueType::Time => {
                track(&keys, Smoothing::Full, |v| v.as_real(ctx))?.map(AnimatedTrack::Time)
            }
            ValueType::Vector => {
                track(&keys, Smoothing::Full, |v| v.as_vector(ctx))?.map(AnimatedTrack::Vector)
            }
            ValueType::Color => {
                track(&keys, Smoothing::LinearOnly, |v| v.as_color(ctx))?.map(AnimatedTrack::Color)
            }
            ValueType::Gradient => track(&keys, Smoothing::LinearOnly, |v| match v {
                Value::Gradient(g) => Ok(g.clone()),
                other => Err(ConvertError::mismatch("gradient", other.type_name(), ctx)),
            })?
            .map(AnimatedTrack::Gradient),
            ValueType::Bool => steps(&keys, |v| v.as_bool(ctx))?.map(AnimatedTrack::Bool),
            ValueType::Integer => steps(&keys, |v| v.as_integer(ctx))?.map(AnimatedTrack::Integer),
            ValueType::String => {
                steps(&keys, |v| v.as_string(ctx).map(str::to_string))?.map(AnimatedTrack::String)
            }
        };
        track.ok_or_else(empty)
    }

    fn bline(&mut self, bline: &sif::Bline) -> Result<BlineParam> {
        let mut entries = Vec::with_capacity(bline.entries.len());
        for entry in &bline.entries {
            entries.push(BlineEntryParam {
                point: self.build(&entry.point)?,
                width: self.build(&entry.width)?,
                origin: self.build(&entry.origin)?,
                t1: self.build(&entry.t1)?,
                t2: self.build(&entry.t2)?,
                split_radius: self.build(&entry.split_radius)?,
                split_angle: self.build(&entry.split_angle)?,
                activepoints: self.activepoints(&entry.activepoints)?,
            });
        }
        Ok(BlineParam {
            looped: bline.looped,
            entries,
        })
    }

    fn width_points(&mut self, list: &sif::WidthPointList) -> Result<WidthPointsParam> {
        let mut entries = Vec::with_capacity(list.entries.len());
        for entry in &list.entries {
            entries.push(WidthPointParam {
                position: self.build(&entry.position)?,
                width: self.build(&entry.width)?,
                side_before: self.build(&entry.side_before)?,
                side_after: self.build(&entry.side_after)?,
                lower_bound: self.build(&entry.lower_bound)?,
                upper_bound: self.build(&entry.upper_bound)?,
                priority: entry.priority,
                activepoints: self.activepoints(&entry.activepoints)?,
            });
        }
        Ok(WidthPointsParam {
            looped: list.looped,
            entries,
        })
    }

    fn dashes(&mut self, list: &sif::DashItemList) -> Result<Vec<DashItemParam>> {
        let mut entries = Vec::with_capacity(list.entries.len());
        for entry in &list.entries {
            entries.push(DashItemParam {
                offset: self.build(&entry.offset)?,
                length: self.build(&entry.length)?,
                side_before: self.build(&entry.side_before)?,
                side_after: self.build(&entry.side_after)?,
                activepoints: self.activepoints(&entry.activepoints)?,
            });
        }
        Ok(entries)
    }
}

fn gradient(stops: &[sif::GradientStop]) -> Gradient {
    Gradient::new(
        stops
            .iter()
            .map(|s| GradientStop {
                pos: s.pos,
                color: DVec4::from_array(s.color),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: serde_json::Value) -> Node {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_constant_and_reference() {
        let mut defs = BTreeMap::new();
        defs.insert("w".to_string(), Node::Real(2.5));
        let mut builder = ParamBuilder::new(&defs, "layer", 24.0);
        let p = builder.build(&node(json!({"reference": "w"}))).unwrap();
        assert_eq!(p, Param::real(2.5));
    }

    #[test]
    fn test_dangling_reference() {
        let defs = BTreeMap::new();
        let mut builder = ParamBuilder::new(&defs, "Circle", 24.0);
        let err = builder.build(&node(json!({"reference": "missing"}))).unwrap_err();
        assert_eq!(
            err,
            ConvertError::DanglingReference {
                id: "missing".into(),
                layer: "Circle".into()
            }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_self_reference_is_dangling() {
        let mut defs = BTreeMap::new();
        defs.insert("a".to_string(), Node::Reference("a".into()));
        let mut builder = ParamBuilder::new(&defs, "layer", 24.0);
        assert!(matches!(
            builder.build(&Node::Reference("a".into())),
            Err(ConvertError::DanglingReference { .. })
        ));
    }

    #[test]
    fn test_animated_frames_are_rounded() {
        let defs = BTreeMap::new();
        let mut builder = ParamBuilder::new(&defs, "layer", 24.0);
        let p = builder
            .build(&node(json!({"animated": {"type": "real", "waypoints": [
                {"time": "0.52", "value": {"real": 1.0}},
                {"time": "1s", "value": {"real": 2.0}}
            ]}})))
            .unwrap();
        let Param::Animated(track) = p else {
            panic!("expected animated");
        };
        assert_eq!(track.frames(), vec![12.0, 24.0]);
        assert!(!track.is_synthetic());
    }

    #[test]
    fn test_animated_type_mismatch() {
        let defs = BTreeMap::new();
        let mut builder = ParamBuilder::new(&defs, "layer", 24.0);
        let err = builder
            .build(&node(json!({"animated": {"type": "vector", "waypoints": [
                {"time": 0, "value": {"real": 1.0}}
            ]}})))
            .unwrap_err();
        assert!(matches!(err, ConvertError::TypeMismatch { .. }));
    }

    #[test]
    fn test_empty_animation() {
        let defs = BTreeMap::new();
        let mut builder = ParamBuilder::new(&defs, "layer", 24.0);
        let err = builder
            .build(&node(json!({"animated": {"type": "real", "waypoints": []}})))
            .unwrap_err();
        assert!(matches!(err, ConvertError::EmptyAnimation { .. }));
    }

    #[test]
    fn test_missing_required_param() {
        let defs = BTreeMap::new();
        let layer: sif::Layer = serde_json::from_value(json!({"type": "circle"})).unwrap();
        let mut builder = ParamBuilder::new(&defs, "Circle", 24.0);
        assert!(matches!(
            builder.required(&layer, "radius"),
            Err(ConvertError::MissingParam { .. })
        ));
        assert_eq!(
            builder.optional(&layer, "amount", Value::Real(1.0)).unwrap(),
            Param::real(1.0)
        );
    }

    #[test]
    fn test_activepoint_amounts() {
        let points = Activepoints::new(vec![(10.0, true), (0.0, false), (20.0, true)]);
        assert_eq!(points.amount_at(-5.0), 0.0);
        assert_eq!(points.amount_at(0.0), 0.0);
        assert!((points.amount_at(2.5) - 0.25).abs() < 1e-12);
        assert_eq!(points.amount_at(15.0), 1.0);
        assert_eq!(points.amount_at(30.0), 1.0);
        assert_eq!(Activepoints::default().amount_at(3.0), 1.0);
    }

    #[test]
    fn test_bline_defaults() {
        let defs = BTreeMap::new();
        let mut builder = ParamBuilder::new(&defs, "layer", 24.0);
        let p = builder
            .build(&node(json!({"bline": {"loop": true, "entries": [
                {"point": {"vector": [0.0, 0.0]}}
            ]}})))
            .unwrap();
        let Param::Bline(bline) = p else {
            panic!("expected bline");
        };
        assert!(bline.looped);
        assert_eq!(bline.entries[0].width, Param::real(1.0));
        assert_eq!(bline.entries[0].split_radius, Param::Constant(Value::Bool(true)));
    }

    #[test]
    fn test_transformation_through_reference() {
        let mut defs = BTreeMap::new();
        defs.insert(
            "t".to_string(),
            node(json!({"transformation": {"offset": {"vector": [1.0, 2.0]}, "angle": {"angle": 30.0}}})),
        );
        let layer: sif::Layer = serde_json::from_value(json!({
            "type": "group", "params": {"transformation": {"reference": "t"}}
        }))
        .unwrap();
        let mut builder = ParamBuilder::new(&defs, "group", 24.0);
        let t = builder.transformation(&layer, "transformation").unwrap();
        assert_eq!(t.offset, Param::vector(1.0, 2.0));
        assert_eq!(t.angle, Param::Constant(Value::Angle(30.0)));
        assert_eq!(t.scale, Param::vector(1.0, 1.0));

        let bare: sif::Layer = serde_json::from_value(json!({"type": "group"})).unwrap();
        let t = builder.transformation(&bare, "transformation").unwrap();
        assert_eq!(t.offset, Param::vector(0.0, 0.0));
    }
}
