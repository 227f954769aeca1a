//! Parameter value sampling. Leaves are read from their tracks; converts
//! sample their operands at the same frame and combine them.

use glam::{DVec2, DVec4};

use crate::bones::BoneArena;
use crate::error::{ConvertError, Result};
use crate::math::radial_to_vector;
use crate::param::{BoneLinkParam, Convert, Param};
use crate::value::{Gradient, Interpolatable, Value};

/// What a sampled parameter may refer to: the bones of its canvas and the
/// layer it belongs to, for error reports.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'a> {
    pub bones: &'a BoneArena,
    pub layer: &'a str,
    pub fps: f64,
}

impl<'a> Scope<'a> {
    pub fn new(bones: &'a BoneArena, layer: &'a str, fps: f64) -> Self {
        Scope { bones, layer, fps }
    }

    fn context(&self, what: &str) -> String {
        format!("{} of layer '{}'", what, self.layer)
    }
}

/// Value of `param` at `frame`.
pub fn sample(param: &Param, frame: f64, scope: &Scope) -> Result<Value> {
    match param {
        Param::Constant(v) => Ok(v.clone()),
        Param::Animated(track) => Ok(track.value_at(frame)),
        Param::Convert(convert) => sample_convert(convert, frame, scope),
        Param::BoneLink(link) => sample_bone_link(link, frame, scope),
        Param::Bline(_) | Param::WidthPoints(_) | Param::Dashes(_) | Param::VectorList(_) => Err(
            ConvertError::mismatch("value", "list", &scope.context("parameter")),
        ),
    }
}

pub fn sample_real(param: &Param, frame: f64, scope: &Scope, what: &str) -> Result<f64> {
    sample(param, frame, scope)?.as_real(&scope.context(what))
}

pub fn sample_vector(param: &Param, frame: f64, scope: &Scope, what: &str) -> Result<DVec2> {
    sample(param, frame, scope)?.as_vector(&scope.context(what))
}

pub fn sample_bool(param: &Param, frame: f64, scope: &Scope, what: &str) -> Result<bool> {
    sample(param, frame, scope)?.as_bool(&scope.context(what))
}

pub fn sample_integer(param: &Param, frame: f64, scope: &Scope, what: &str) -> Result<i64> {
    sample(param, frame, scope)?.as_integer(&scope.context(what))
}

pub fn sample_color(param: &Param, frame: f64, scope: &Scope, what: &str) -> Result<DVec4> {
    sample(param, frame, scope)?.as_color(&scope.context(what))
}

fn binary(
    a: &Value,
    b: &Value,
    context: &str,
    real: impl Fn(f64, f64) -> f64,
    vector: impl Fn(DVec2, DVec2) -> DVec2,
    color: impl Fn(DVec4, DVec4) -> DVec4,
    gradient: impl Fn(&Gradient, &Gradient) -> Gradient,
) -> Result<Value> {
    Ok(match (a, b) {
        (Value::Real(x), Value::Real(y)) => Value::Real(real(*x, *y)),
        (Value::Angle(x), Value::Angle(y)) => Value::Angle(real(*x, *y)),
        (Value::Time(x), Value::Time(y)) => Value::Time(real(*x, *y)),
        (Value::Integer(x), Value::Integer(y)) => {
            Value::Integer(real(*x as f64, *y as f64).round() as i64)
        }
        (Value::Vector(x), Value::Vector(y)) => Value::Vector(vector(*x, *y)),
        (Value::Color(x), Value::Color(y)) => Value::Color(color(*x, *y)),
        (Value::Gradient(x), Value::Gradient(y)) => Value::Gradient(gradient(x, y)),
        (x, y) => return Err(ConvertError::mismatch(x.type_name(), y.type_name(), context)),
    })
}

fn add(a: &Value, b: &Value, context: &str) -> Result<Value> {
    binary(a, b, context, |x, y| x + y, |x, y| x + y, |x, y| x + y, |x, y| x.add(y))
}

fn subtract(a: &Value, b: &Value, context: &str) -> Result<Value> {
    binary(a, b, context, |x, y| x - y, |x, y| x - y, |x, y| x - y, |x, y| x.sub(y))
}

fn scale(v: &Value, k: f64, context: &str) -> Result<Value> {
    Ok(match v {
        Value::Real(x) => Value::Real(x * k),
        Value::Angle(x) => Value::Angle(x * k),
        Value::Time(x) => Value::Time(x * k),
        Value::Integer(x) => Value::Integer((*x as f64 * k).round() as i64),
        Value::Vector(x) => Value::Vector(*x * k),
        Value::Color(x) => Value::Color(*x * k),
        Value::Gradient(g) => Value::Gradient(g.scale(k)),
        other => return Err(ConvertError::mismatch("scalable value", other.type_name(), context)),
    })
}

fn sample_convert(convert: &Convert, frame: f64, scope: &Scope) -> Result<Value> {
    let context = scope.context(convert.kind());
    let ctx = context.as_str();
    let s = |p: &Param| sample(p, frame, scope);
    let real = |p: &Param| sample(p, frame, scope)?.as_real(ctx);

    match convert {
        Convert::Add { lhs, rhs, scalar } => scale(&add(&s(lhs)?, &s(rhs)?, ctx)?, real(scalar)?, ctx),
        Convert::Subtract { lhs, rhs, scalar } => {
            scale(&subtract(&s(lhs)?, &s(rhs)?, ctx)?, real(scalar)?, ctx)
        }
        Convert::Average(entries) => {
            let mut values = entries.iter().map(s);
            let first = values
                .next()
                .ok_or_else(|| ConvertError::mismatch("entries", "empty list", ctx))??;
            let mut sum = first;
            for v in values {
                sum = add(&sum, &v?, ctx)?;
            }
            scale(&sum, 1.0 / entries.len() as f64, ctx)
        }
        Convert::WeightedAverage(entries) => {
            let mut sum: Option<Value> = None;
            let mut total = 0.0;
            let mut plain: Option<Value> = None;
            for (weight, value) in entries {
                let w = real(weight)?;
                let v = s(value)?;
                plain = Some(match plain {
                    Some(p) => add(&p, &v, ctx)?,
                    None => v.clone(),
                });
                let weighted = scale(&v, w, ctx)?;
                sum = Some(match sum {
                    Some(acc) => add(&acc, &weighted, ctx)?,
                    None => weighted,
                });
                total += w;
            }
            match (sum, plain) {
                (Some(sum), _) if total.abs() > f64::EPSILON => scale(&sum, 1.0 / total, ctx),
                // All weights zero: plain average
                (Some(_), Some(plain)) => scale(&plain, 1.0 / entries.len() as f64, ctx),
                _ => Err(ConvertError::mismatch("entries", "empty list", ctx)),
            }
        }
        Convert::Switch {
            link_off,
            link_on,
            switch,
        } => {
            if s(switch)?.as_bool(ctx)? {
                s(link_on)
            } else {
                s(link_off)
            }
        }
        Convert::Exponential { exp, scale } => Ok(Value::Real(real(exp)?.exp() * real(scale)?)),
        Convert::Power {
            base,
            power,
            epsilon,
            infinite,
        } => {
            let (b, p) = (real(base)?, real(power)?);
            let (eps, inf) = (real(epsilon)?, real(infinite)?);
            if b.abs() < eps && p < 0.0 {
                Ok(Value::Real(inf))
            } else {
                Ok(Value::Real(b.powf(p)))
            }
        }
        Convert::Cos { angle, amp } => Ok(Value::Real(real(amp)? * real(angle)?.to_radians().cos())),
        Convert::Sin { angle, amp } => Ok(Value::Real(real(amp)? * real(angle)?.to_radians().sin())),
        Convert::Atan2 { x, y } => Ok(Value::Angle(real(y)?.atan2(real(x)?).to_degrees())),
        Convert::Composite { x, y } => Ok(Value::Vector(DVec2::new(real(x)?, real(y)?))),
        Convert::RadialComposite { radius, theta } => {
            Ok(Value::Vector(radial_to_vector(real(radius)?, real(theta)?)))
        }
        Convert::Linear { slope, offset } => {
            let seconds = frame / scope.fps;
            let slope = s(slope)?;
            add(&s(offset)?, &scale(&slope, seconds, ctx)?, ctx)
        }
        Convert::Scale { link, scalar } => scale(&s(link)?, real(scalar)?, ctx),
        Convert::Reciprocal {
            link,
            epsilon,
            infinite,
        } => {
            let (v, eps, inf) = (real(link)?, real(epsilon)?, real(infinite)?);
            if v.abs() < eps {
                Ok(Value::Real(if v < 0.0 { -inf } else { inf }))
            } else {
                Ok(Value::Real(1.0 / v))
            }
        }
        Convert::VectorLength(v) => Ok(Value::Real(s(v)?.as_vector(ctx)?.length())),
        Convert::VectorAngle(v) => {
            let v = s(v)?.as_vector(ctx)?;
            Ok(Value::Angle(v.y.atan2(v.x).to_degrees()))
        }
        Convert::VectorX(v) => Ok(Value::Real(s(v)?.as_vector(ctx)?.x)),
        Convert::VectorY(v) => Ok(Value::Real(s(v)?.as_vector(ctx)?.y)),
    }
}

fn sample_bone_link(link: &BoneLinkParam, frame: f64, scope: &Scope) -> Result<Value> {
    let key = scope
        .bones
        .key(&link.bone)
        .ok_or_else(|| ConvertError::DanglingBone {
            bone: link.bone.clone(),
            layer: scope.layer.to_string(),
        })?;
    let pose = scope.bones.resolve(key, frame, scope)?;
    Ok(match sample(&link.base, frame, scope)? {
        Value::Vector(mut v) => {
            if link.scale {
                v *= pose.recursive_scale;
            }
            if link.rotate {
                v = DVec2::from_angle(pose.angle.to_radians()).rotate(v);
            }
            if link.translate {
                v += pose.origin;
            }
            Value::Vector(v)
        }
        Value::Angle(a) if link.rotate => Value::Angle(a + pose.angle),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::{Track, Waypoint};
    use crate::param::AnimatedTrack;
    use sif_data::Interpolation;

    fn scope(bones: &BoneArena) -> Scope<'_> {
        Scope::new(bones, "layer", 24.0)
    }

    fn ramp() -> Param {
        let track = Track::new(vec![
            Waypoint::new(0.0, 0.0).with_modes(Interpolation::Linear, Interpolation::Linear),
            Waypoint::new(10.0, 10.0).with_modes(Interpolation::Linear, Interpolation::Linear),
        ])
        .unwrap();
        Param::Animated(AnimatedTrack::Real(track))
    }

    #[test]
    fn test_add_with_scalar() {
        let bones = BoneArena::default();
        let p = Param::Convert(Box::new(Convert::Add {
            lhs: ramp(),
            rhs: Param::real(1.0),
            scalar: Param::real(2.0),
        }));
        assert_eq!(sample(&p, 5.0, &scope(&bones)).unwrap(), Value::Real(12.0));
    }

    #[test]
    fn test_add_type_mismatch() {
        let bones = BoneArena::default();
        let p = Param::Convert(Box::new(Convert::Add {
            lhs: Param::real(1.0),
            rhs: Param::vector(1.0, 1.0),
            scalar: Param::real(1.0),
        }));
        assert!(matches!(
            sample(&p, 0.0, &scope(&bones)),
            Err(ConvertError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_average_and_weighted_average() {
        let bones = BoneArena::default();
        let avg = Param::Convert(Box::new(Convert::Average(vec![
            Param::vector(0.0, 0.0),
            Param::vector(2.0, 4.0),
        ])));
        assert_eq!(
            sample(&avg, 0.0, &scope(&bones)).unwrap(),
            Value::Vector(DVec2::new(1.0, 2.0))
        );
        let weighted = Param::Convert(Box::new(Convert::WeightedAverage(vec![
            (Param::real(3.0), Param::real(0.0)),
            (Param::real(1.0), Param::real(4.0)),
        ])));
        assert_eq!(sample(&weighted, 0.0, &scope(&bones)).unwrap(), Value::Real(1.0));
    }

    #[test]
    fn test_trig_and_composites() {
        let bones = BoneArena::default();
        let sc = scope(&bones);
        let cos = Param::Convert(Box::new(Convert::Cos {
            angle: Param::Constant(Value::Angle(60.0)),
            amp: Param::real(2.0),
        }));
        assert!((sample_real(&cos, 0.0, &sc, "cos").unwrap() - 1.0).abs() < 1e-12);

        let radial = Param::Convert(Box::new(Convert::RadialComposite {
            radius: Param::real(2.0),
            theta: Param::Constant(Value::Angle(90.0)),
        }));
        let v = sample_vector(&radial, 0.0, &sc, "radial").unwrap();
        assert!(v.distance(DVec2::new(0.0, 2.0)) < 1e-12);

        let atan = Param::Convert(Box::new(Convert::Atan2 {
            x: Param::real(1.0),
            y: Param::real(1.0),
        }));
        assert!((sample_real(&atan, 0.0, &sc, "atan2").unwrap() - 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_uses_seconds() {
        let bones = BoneArena::default();
        let p = Param::Convert(Box::new(Convert::Linear {
            slope: Param::real(2.0),
            offset: Param::real(1.0),
        }));
        // 48 frames at 24 fps = 2 s
        assert_eq!(sample(&p, 48.0, &scope(&bones)).unwrap(), Value::Real(5.0));
    }

    #[test]
    fn test_reciprocal_and_power_guards() {
        let bones = BoneArena::default();
        let sc = scope(&bones);
        let rec = Param::Convert(Box::new(Convert::Reciprocal {
            link: Param::real(0.0),
            epsilon: Param::real(1e-6),
            infinite: Param::real(999999.0),
        }));
        assert_eq!(sample_real(&rec, 0.0, &sc, "r").unwrap(), 999999.0);
        let pow = Param::Convert(Box::new(Convert::Power {
            base: Param::real(2.0),
            power: Param::real(3.0),
            epsilon: Param::real(1e-6),
            infinite: Param::real(999999.0),
        }));
        assert_eq!(sample_real(&pow, 0.0, &sc, "p").unwrap(), 8.0);
    }

    #[test]
    fn test_switch_convert() {
        let bones = BoneArena::default();
        let p = Param::Convert(Box::new(Convert::Switch {
            link_off: Param::real(1.0),
            link_on: Param::real(2.0),
            switch: Param::Constant(Value::Bool(true)),
        }));
        assert_eq!(sample(&p, 0.0, &scope(&bones)).unwrap(), Value::Real(2.0));
    }

    #[test]
    fn test_dangling_bone_link() {
        let bones = BoneArena::default();
        let p = Param::BoneLink(Box::new(BoneLinkParam {
            bone: "ghost".into(),
            base: Param::vector(1.0, 0.0),
            translate: true,
            rotate: true,
            scale: true,
        }));
        let err = sample(&p, 0.0, &scope(&bones)).unwrap_err();
        assert_eq!(
            err,
            ConvertError::DanglingBone {
                bone: "ghost".into(),
                layer: "layer".into()
            }
        );
    }

    #[test]
    fn test_list_is_not_a_value() {
        let bones = BoneArena::default();
        let p = Param::VectorList(vec![]);
        assert!(sample(&p, 0.0, &scope(&bones)).is_err());
    }
}
