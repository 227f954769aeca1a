use glam::{DVec2, DVec4};

use crate::error::{ConvertError, Result};

/// A sampled parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Real(f64),
    Angle(f64), // degrees
    Integer(i64),
    Bool(bool),
    Vector(DVec2),
    Color(DVec4),
    Gradient(Gradient),
    Time(f64), // seconds
    String(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Real(_) => "real",
            Value::Angle(_) => "angle",
            Value::Integer(_) => "integer",
            Value::Bool(_) => "bool",
            Value::Vector(_) => "vector",
            Value::Color(_) => "color",
            Value::Gradient(_) => "gradient",
            Value::Time(_) => "time",
            Value::String(_) => "string",
        }
    }

    /// Any scalar as a real number. Angles stay in degrees.
    pub fn as_real(&self, context: &str) -> Result<f64> {
        match self {
            Value::Real(v) | Value::Angle(v) | Value::Time(v) => Ok(*v),
            Value::Integer(v) => Ok(*v as f64),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(ConvertError::mismatch("real", other.type_name(), context)),
        }
    }

    pub fn as_vector(&self, context: &str) -> Result<DVec2> {
        match self {
            Value::Vector(v) => Ok(*v),
            other => Err(ConvertError::mismatch("vector", other.type_name(), context)),
        }
    }

    pub fn as_bool(&self, context: &str) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Integer(v) => Ok(*v != 0),
            other => Err(ConvertError::mismatch("bool", other.type_name(), context)),
        }
    }

    pub fn as_integer(&self, context: &str) -> Result<i64> {
        match self {
            Value::Integer(v) => Ok(*v),
            Value::Real(v) => Ok(v.round() as i64),
            Value::Bool(b) => Ok(*b as i64),
            other => Err(ConvertError::mismatch("integer", other.type_name(), context)),
        }
    }

    pub fn as_color(&self, context: &str) -> Result<DVec4> {
        match self {
            Value::Color(c) => Ok(*c),
            other => Err(ConvertError::mismatch("color", other.type_name(), context)),
        }
    }

    pub fn as_string(&self, context: &str) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(ConvertError::mismatch("string", other.type_name(), context)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub pos: f64,
    pub color: DVec4,
}

/// Color stops ordered by position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Gradient(pub Vec<GradientStop>);

impl Gradient {
    pub fn new(mut stops: Vec<GradientStop>) -> Self {
        stops.sort_by(|a, b| a.pos.total_cmp(&b.pos));
        Gradient(stops)
    }

    /// Color at `pos`, linear between neighbouring stops and clamped
    /// outside them.
    pub fn color_at(&self, pos: f64) -> DVec4 {
        let stops = &self.0;
        let Some(first) = stops.first() else {
            return DVec4::ZERO;
        };
        if pos <= first.pos {
            return first.color;
        }
        let idx = stops.partition_point(|s| s.pos <= pos);
        if idx >= stops.len() {
            return stops[stops.len() - 1].color;
        }
        let a = &stops[idx - 1];
        let b = &stops[idx];
        let span = b.pos - a.pos;
        if span <= 0.0 {
            return b.color;
        }
        a.color.lerp(b.color, (pos - a.pos) / span)
    }

    fn positions_with(&self, other: &Gradient) -> Vec<f64> {
        let mut positions: Vec<f64> = self
            .0
            .iter()
            .chain(other.0.iter())
            .map(|s| s.pos)
            .collect();
        positions.sort_by(f64::total_cmp);
        positions.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        positions
    }

    fn combine(&self, other: &Gradient, f: impl Fn(DVec4, DVec4) -> DVec4) -> Gradient {
        Gradient(
            self.positions_with(other)
                .into_iter()
                .map(|pos| GradientStop {
                    pos,
                    color: f(self.color_at(pos), other.color_at(pos)),
                })
                .collect(),
        )
    }
}

/// Which interpolation modes a value type supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Smoothing {
    /// Every mode is honoured.
    Full,
    /// `tcb` and `clamped` degrade to `linear`.
    LinearOnly,
}

/// Values that can be blended along a Hermite curve.
pub trait Interpolatable: Sized + Clone + std::fmt::Debug {
    fn add(&self, other: &Self) -> Self;
    fn sub(&self, other: &Self) -> Self;
    fn scale(&self, k: f64) -> Self;

    /// Catmull-Rom style tangent at `p2` that never overshoots monotone
    /// neighbours `p1`, `p3` sampled at times `t1 < t2 < t3`.
    fn clamped_tangent(p1: &Self, p2: &Self, p3: &Self, t1: f64, t2: f64, t3: f64) -> Self;

    fn smoothing() -> Smoothing {
        Smoothing::Full
    }

    fn lerp(&self, other: &Self, t: f64) -> Self {
        self.add(&other.sub(self).scale(t))
    }
}

fn clamped_scalar(p1: f64, p2: f64, p3: f64, t1: f64, t2: f64, t3: f64) -> f64 {
    let pm = if t3 != t1 {
        p1 + (p3 - p1) * (t2 - t1) / (t3 - t1)
    } else {
        p2
    };
    let bias = if p3 > p1 {
        if p2 >= p3 || p2 <= p1 {
            return 0.0;
        }
        if p2 > pm {
            (pm - p2) / (p3 - pm)
        } else if p2 < pm {
            (pm - p2) / (pm - p1)
        } else {
            0.0
        }
    } else if p1 > p3 {
        if p2 >= p1 || p2 <= p3 {
            return 0.0;
        }
        if p2 > pm {
            (pm - p2) / (pm - p1)
        } else if p2 < pm {
            (pm - p2) / (p3 - pm)
        } else {
            0.0
        }
    } else {
        return 0.0;
    };
    (p2 - p1) * (1.0 + bias) / 2.0 + (p3 - p2) * (1.0 - bias) / 2.0
}

impl Interpolatable for f64 {
    fn add(&self, other: &Self) -> Self {
        self + other
    }
    fn sub(&self, other: &Self) -> Self {
        self - other
    }
    fn scale(&self, k: f64) -> Self {
        self * k
    }
    fn clamped_tangent(p1: &Self, p2: &Self, p3: &Self, t1: f64, t2: f64, t3: f64) -> Self {
        clamped_scalar(*p1, *p2, *p3, t1, t2, t3)
    }
}

impl Interpolatable for DVec2 {
    fn add(&self, other: &Self) -> Self {
        *self + *other
    }
    fn sub(&self, other: &Self) -> Self {
        *self - *other
    }
    fn scale(&self, k: f64) -> Self {
        *self * k
    }
    fn clamped_tangent(p1: &Self, p2: &Self, p3: &Self, t1: f64, t2: f64, t3: f64) -> Self {
        DVec2::new(
            clamped_scalar(p1.x, p2.x, p3.x, t1, t2, t3),
            clamped_scalar(p1.y, p2.y, p3.y, t1, t2, t3),
        )
    }
}

impl Interpolatable for DVec4 {
    fn add(&self, other: &Self) -> Self {
        *self + *other
    }
    fn sub(&self, other: &Self) -> Self {
        *self - *other
    }
    fn scale(&self, k: f64) -> Self {
        *self * k
    }
    fn clamped_tangent(p1: &Self, p2: &Self, p3: &Self, t1: f64, t2: f64, t3: f64) -> Self {
        DVec4::new(
            clamped_scalar(p1.x, p2.x, p3.x, t1, t2, t3),
            clamped_scalar(p1.y, p2.y, p3.y, t1, t2, t3),
            clamped_scalar(p1.z, p2.z, p3.z, t1, t2, t3),
            clamped_scalar(p1.w, p2.w, p3.w, t1, t2, t3),
        )
    }
    fn smoothing() -> Smoothing {
        Smoothing::LinearOnly
    }
}

impl Interpolatable for Gradient {
    fn add(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a + b)
    }
    fn sub(&self, other: &Self) -> Self {
        self.combine(other, |a, b| a - b)
    }
    fn scale(&self, k: f64) -> Self {
        Gradient(
            self.0
                .iter()
                .map(|s| GradientStop {
                    pos: s.pos,
                    color: s.color * k,
                })
                .collect(),
        )
    }
    fn clamped_tangent(p1: &Self, p2: &Self, p3: &Self, t1: f64, t2: f64, t3: f64) -> Self {
        let positions = p1.positions_with(p2);
        Gradient(
            positions
                .into_iter()
                .map(|pos| GradientStop {
                    pos,
                    color: DVec4::clamped_tangent(
                        &p1.color_at(pos),
                        &p2.color_at(pos),
                        &p3.color_at(pos),
                        t1,
                        t2,
                        t3,
                    ),
                })
                .collect(),
        )
    }
    fn smoothing() -> Smoothing {
        Smoothing::LinearOnly
    }
}
