//! Shape layers: filled regions, outlines and primitives, each emitted as
//! one path with a fill and a transform.

use std::collections::HashMap;

use glam::{DVec2, DVec4};
use lottie_data::model::{
    FillShape, GroupShape, Layer, PathShape, Property, Shape, Transform, TransformShape,
};
use sif_core::advanced_outline::{advanced_outline, AdvancedOutlineOptions, CuspType};
use sif_core::bline::{sample_bline, sample_dashes, sample_width_points, SampledBline, SideType};
use sif_core::keyframes::{color_property, scalar_property, shape_property, vector_property};
use sif_core::outline::{outline, OutlineOptions};
use sif_core::path::ScenePath;
use sif_core::sampler::{sample_bool, sample_integer, sample_real, sample_vector, Scope};
use sif_core::shapes::{circle, polygon, rectangle, region, Star};
use sif_core::{ConvertError, FrameWindow, Param, ParamBuilder, Result, Value};
use sif_data as sif;
use tracing::debug;

use crate::{CanvasScope, Converter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Region,
    Outline,
    AdvancedOutline,
    Polygon,
    Star,
    Circle,
    Rectangle,
}

impl ShapeKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "region" => ShapeKind::Region,
            "outline" => ShapeKind::Outline,
            "advanced_outline" => ShapeKind::AdvancedOutline,
            "polygon" => ShapeKind::Polygon,
            "star" => ShapeKind::Star,
            "circle" => ShapeKind::Circle,
            "rectangle" => ShapeKind::Rectangle,
            _ => return None,
        })
    }

    /// Outlines scale with the grow amount of enclosing groups.
    pub fn is_outline(self) -> bool {
        matches!(self, ShapeKind::Outline | ShapeKind::AdvancedOutline)
    }

    /// Geometry parameters with their defaults; `None` marks a required one.
    fn params(self) -> Vec<(&'static str, Option<Value>)> {
        let real = |v: f64| Some(Value::Real(v));
        let flag = |v: bool| Some(Value::Bool(v));
        let code = |v: i64| Some(Value::Integer(v));
        match self {
            ShapeKind::Region => vec![("bline", None)],
            ShapeKind::Outline => vec![
                ("bline", None),
                ("width", real(1.0)),
                ("expand", real(0.0)),
                ("sharp_cusps", flag(true)),
                ("round_tip[0]", flag(true)),
                ("round_tip[1]", flag(true)),
                ("homogeneous", flag(true)),
            ],
            ShapeKind::AdvancedOutline => vec![
                ("bline", None),
                ("wplist", None),
                ("width", real(1.0)),
                ("expand", real(0.0)),
                ("smoothness", real(1.0)),
                ("start_tip", code(1)),
                ("end_tip", code(1)),
                ("cusp_type", code(0)),
                ("homogeneous", flag(false)),
                ("dash_enabled", flag(false)),
                ("dash_offset", real(0.0)),
            ],
            ShapeKind::Polygon => vec![("vector_list", None)],
            ShapeKind::Star => vec![
                ("radius1", real(1.0)),
                ("radius2", real(0.38)),
                ("angle", Some(Value::Angle(90.0))),
                ("points", code(5)),
                ("regular_polygon", flag(false)),
            ],
            ShapeKind::Circle => vec![("radius", real(1.0))],
            ShapeKind::Rectangle => vec![
                ("point1", Some(Value::Vector(DVec2::ZERO))),
                ("point2", Some(Value::Vector(DVec2::ONE))),
                ("expand", real(0.0)),
            ],
        }
    }

    fn build_params(
        self,
        builder: &mut ParamBuilder,
        layer: &sif::Layer,
    ) -> Result<Vec<(&'static str, Param)>> {
        let mut out = Vec::new();
        for (name, default) in self.params() {
            let param = match default {
                Some(value) => builder.optional(layer, name, value)?,
                None => builder.required(layer, name)?,
            };
            out.push((name, param));
        }
        if self == ShapeKind::AdvancedOutline {
            let dashes = match layer.param("dilist") {
                Some(_) => builder.required(layer, "dilist")?,
                None => Param::Dashes(Vec::new()),
            };
            out.push(("dilist", dashes));
        }
        Ok(out)
    }
}

fn not_a_list(expected: &str, param: &str, layer: &str) -> ConvertError {
    ConvertError::TypeMismatch {
        expected: expected.to_string(),
        found: "value".to_string(),
        context: format!("{} of layer '{}'", param, layer),
    }
}

/// Synthesized geometry parameters of one layer.
struct Geometry<'a> {
    kind: ShapeKind,
    params: HashMap<&'static str, Param>,
    scope: Scope<'a>,
}

impl Geometry<'_> {
    fn param(&self, name: &str) -> Result<&Param> {
        self.params.get(name).ok_or_else(|| ConvertError::MissingParam {
            layer: self.scope.layer.to_string(),
            param: name.to_string(),
        })
    }

    fn real(&self, name: &str, frame: f64) -> Result<f64> {
        sample_real(self.param(name)?, frame, &self.scope, name)
    }

    fn vector(&self, name: &str, frame: f64) -> Result<DVec2> {
        sample_vector(self.param(name)?, frame, &self.scope, name)
    }

    fn flag(&self, name: &str, frame: f64) -> Result<bool> {
        sample_bool(self.param(name)?, frame, &self.scope, name)
    }

    fn integer(&self, name: &str, frame: f64) -> Result<i64> {
        sample_integer(self.param(name)?, frame, &self.scope, name)
    }

    fn bline(&self, frame: f64) -> Result<SampledBline> {
        match self.param("bline")? {
            Param::Bline(bline) => sample_bline(bline, frame, &self.scope),
            _ => Err(not_a_list("spline", "bline", self.scope.layer)),
        }
    }

    /// Scene-unit path at `frame`, `None` when the geometry degenerates.
    fn path_at(&self, frame: f64, grow: f64, samples: usize) -> Result<Option<ScenePath>> {
        Ok(match self.kind {
            ShapeKind::Region => region(&self.bline(frame)?),
            ShapeKind::Outline => {
                let opts = OutlineOptions {
                    width: self.real("width", frame)?,
                    expand: self.real("expand", frame)?,
                    sharp_cusps: self.flag("sharp_cusps", frame)?,
                    round_tip: [
                        self.flag("round_tip[0]", frame)?,
                        self.flag("round_tip[1]", frame)?,
                    ],
                    homogeneous: self.flag("homogeneous", frame)?,
                    grow,
                    samples,
                };
                outline(&self.bline(frame)?, &opts)
            }
            ShapeKind::AdvancedOutline => {
                let Param::WidthPoints(list) = self.param("wplist")? else {
                    return Err(not_a_list("width point list", "wplist", self.scope.layer));
                };
                let Param::Dashes(items) = self.param("dilist")? else {
                    return Err(not_a_list("dash item list", "dilist", self.scope.layer));
                };
                let widths = sample_width_points(list, frame, &self.scope)?;
                let dashes = sample_dashes(items, frame, &self.scope)?;
                let opts = AdvancedOutlineOptions {
                    width: self.real("width", frame)?,
                    expand: self.real("expand", frame)?,
                    smoothness: self.real("smoothness", frame)?,
                    start_tip: SideType::from_code(self.integer("start_tip", frame)?),
                    end_tip: SideType::from_code(self.integer("end_tip", frame)?),
                    cusp_type: CuspType::from_code(self.integer("cusp_type", frame)?),
                    homogeneous: self.flag("homogeneous", frame)?,
                    dash_enabled: self.flag("dash_enabled", frame)?,
                    dash_offset: self.real("dash_offset", frame)?,
                    grow,
                    samples,
                };
                advanced_outline(&self.bline(frame)?, &widths, &dashes, &opts)
            }
            ShapeKind::Polygon => {
                let Param::VectorList(items) = self.param("vector_list")? else {
                    return Err(not_a_list("vector list", "vector_list", self.scope.layer));
                };
                let points = items
                    .iter()
                    .map(|p| sample_vector(p, frame, &self.scope, "vector_list"))
                    .collect::<Result<Vec<_>>>()?;
                polygon(&points)
            }
            ShapeKind::Star => Some(
                Star {
                    radius1: self.real("radius1", frame)?,
                    radius2: self.real("radius2", frame)?,
                    angle: self.real("angle", frame)?,
                    points: self.integer("points", frame)?,
                    regular_polygon: self.flag("regular_polygon", frame)?,
                }
                .path(),
            ),
            ShapeKind::Circle => Some(circle(self.real("radius", frame)?)),
            ShapeKind::Rectangle => Some(rectangle(
                self.vector("point1", frame)?,
                self.vector("point2", frame)?,
                self.real("expand", frame)?,
            )),
        })
    }
}

/// Converts a shape layer. `Ok(None)` when no frame produced geometry.
pub(crate) fn shape_layer(
    conv: &mut Converter,
    canvas: &CanvasScope,
    layer: &sif::Layer,
    ind: u32,
    name: &str,
) -> Result<Option<Layer>> {
    let kind = ShapeKind::from_name(&layer.kind).ok_or_else(|| ConvertError::Unsupported {
        kind: format!("layer type '{}'", layer.kind),
    })?;
    let fps = conv.fps();
    let mut builder = ParamBuilder::new(&canvas.defs, name, fps);
    let raw = kind.build_params(&mut builder, layer)?;
    let color = builder.optional(layer, "color", Value::Color(DVec4::ONE))?;
    let amount = builder.optional(layer, "amount", Value::Real(1.0))?;
    let origin = builder.optional(layer, "origin", Value::Vector(DVec2::ZERO))?;

    let bones = &canvas.bones;
    let mut window = FrameWindow::default();
    let mut params = HashMap::with_capacity(raw.len());
    for (param_name, param) in raw {
        let key = format!("{}/{}", ind, param_name);
        let (resolved, w) = conv.ctx.synthesized(&key, &param, bones, name)?;
        window.merge(&w);
        params.insert(param_name, resolved);
    }
    if kind.is_outline() {
        window.merge(&conv.ctx.grow_window(bones, name)?);
    }

    let scope = Scope::new(bones, name, fps);
    let geometry = Geometry {
        kind,
        params,
        scope,
    };
    let frames: Vec<i64> = if window.is_single() {
        vec![window.first()]
    } else {
        (window.first()..=window.last() + 1).collect()
    };
    let canvas_map = conv.ctx.units.canvas_map();
    let mut paths = Vec::with_capacity(frames.len());
    for frame in frames {
        let frame = frame as f64;
        let grow = if kind.is_outline() {
            conv.ctx.grow_at(frame, &scope)?
        } else {
            1.0
        };
        let path = geometry.path_at(frame, grow, conv.ctx.samples)?;
        paths.push((frame, path.map(|p| p.to_bezier(&canvas_map))));
    }
    debug!(layer = name, frames = paths.len(), "shape sampled");
    let Some(path) = shape_property(paths) else {
        return Ok(None);
    };

    let units = conv.ctx.units.clone();
    let (color, color_window) = conv.ctx.synthesized(&format!("{}/color", ind), &color, bones, name)?;
    let (origin, origin_window) = conv.ctx.synthesized(&format!("{}/origin", ind), &origin, bones, name)?;
    let (amount, amount_window) = conv.ctx.synthesized(&format!("{}/amount", ind), &amount, bones, name)?;

    let fill = FillShape {
        nm: Some("Fill".to_string()),
        c: color_property(&color, &color_window, &scope, &units, "color")?,
        o: Property::fixed(100.0),
        r: 1,
    };
    let transform = Transform {
        p: vector_property(&origin, &origin_window, &scope, units.transform_map(), true, "origin")?,
        ..Transform::default()
    };

    let mut out = Layer::new(4, ind, conv.ip, conv.op);
    out.nm = Some(name.to_string());
    out.ks.o = scalar_property(&amount, &amount_window, &scope, units.opacity_map(), "amount")?;
    out.shapes = Some(vec![Shape::Group(GroupShape {
        nm: Some(name.to_string()),
        np: 3,
        it: vec![
            Shape::Path(PathShape {
                nm: Some("Path".to_string()),
                ind: 0,
                ks: path,
            }),
            Shape::Fill(fill),
            Shape::Transform(TransformShape { t: transform }),
        ],
    })]);
    Ok(Some(out))
}
