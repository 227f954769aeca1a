//! Whole-document conversion from Synfig scenes to Lottie.
//!
//! Layers are dispatched by type: filled and stroked primitives become
//! shape layers, groups and switches become precompositions. A fatal error
//! drops only the layer it occurred in; everything is collected into the
//! returned [`Conversion`].

pub mod group;
pub mod layers;
pub mod options;

use std::collections::BTreeMap;

use lottie_data::model::{Asset, Layer, LottieJson};
use sif_core::{BoneArena, ConversionContext, ConvertError, ParamBuilder, Units};
use sif_data::{self as sif, Document, Node};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub use options::ConvertOptions;

/// Output format version written into every document.
pub const LOTTIE_VERSION: &str = "5.3.4";

/// An error attributed to the layer it occurred in.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("layer '{layer}': {source}")]
pub struct LayerError {
    pub layer: String,
    #[source]
    pub source: ConvertError,
}

impl LayerError {
    pub fn is_fatal(&self) -> bool {
        self.source.is_fatal()
    }
}

/// A converted document with every error met on the way.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub lottie: LottieJson,
    pub errors: Vec<LayerError>,
}

impl Conversion {
    /// True when at least one layer was dropped by a fatal error.
    pub fn has_fatal(&self) -> bool {
        self.errors.iter().any(LayerError::is_fatal)
    }

    /// Serializes the document, rounded to the configured precision.
    pub fn to_json(&self, opts: &ConvertOptions) -> serde_json::Result<String> {
        let mut value = serde_json::to_value(&self.lottie)?;
        if let Some(precision) = opts.precision {
            lottie_data::round_floats(&mut value, precision);
        }
        if opts.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
    }
}

/// Definitions and bones visible from one canvas.
pub(crate) struct CanvasScope {
    pub defs: BTreeMap<String, Node>,
    pub bones: BoneArena,
}

/// Mutable state threaded through one document conversion.
pub(crate) struct Converter {
    pub ctx: ConversionContext,
    /// In and out points of every layer.
    pub ip: f64,
    pub op: f64,
    pub assets: Vec<Asset>,
    pub errors: Vec<LayerError>,
}

impl Converter {
    pub fn fps(&self) -> f64 {
        self.ctx.units.fps
    }

    pub fn report(&mut self, layer: &str, err: ConvertError) {
        if err.is_fatal() {
            error!(layer, error = %err, "layer dropped");
        } else {
            warn!(layer, error = %err, "layer skipped");
        }
        self.errors.push(LayerError {
            layer: layer.to_string(),
            source: err,
        });
    }

    /// Definitions and bones of `canvas`, layered over those of `parent`.
    pub fn canvas_scope(&mut self, canvas: &sif::Canvas, parent: Option<&CanvasScope>) -> CanvasScope {
        let mut defs = parent.map(|p| p.defs.clone()).unwrap_or_default();
        defs.extend(canvas.defs.iter().map(|(k, v)| (k.clone(), v.clone())));

        let fps = self.fps();
        let built = {
            let mut builder = ParamBuilder::new(&defs, "skeleton", fps);
            match parent {
                Some(p) => p.bones.extend(&canvas.bones, &mut builder),
                None => BoneArena::build(&canvas.bones, &mut builder),
            }
        };
        let bones = match built {
            Ok(bones) => bones,
            Err(err) => {
                self.report("skeleton", err);
                BoneArena::default()
            }
        };
        CanvasScope { defs, bones }
    }

    /// Converts the layers of a canvas, top-most first.
    pub fn convert_canvas(&mut self, canvas: &sif::Canvas, parent: Option<&CanvasScope>) -> Vec<Layer> {
        let scope = self.canvas_scope(canvas, parent);
        let mut out = Vec::with_capacity(canvas.layers.len());
        for layer in canvas.layers.iter().rev() {
            if let Some(converted) = self.convert_layer(layer, &scope) {
                out.push(converted);
            }
        }
        out
    }

    fn convert_layer(&mut self, layer: &sif::Layer, scope: &CanvasScope) -> Option<Layer> {
        let ind = self.ctx.next_layer_index();
        let name = layer
            .desc
            .clone()
            .unwrap_or_else(|| format!("{} {}", layer.kind, ind));
        if !layer.active {
            debug!(layer = %name, "disabled layer skipped");
            return None;
        }
        let result = match layer.kind.as_str() {
            "group" | "switch" => group::group_layer(self, scope, layer, ind, &name).map(Some),
            kind if layers::ShapeKind::from_name(kind).is_some() => {
                layers::shape_layer(self, scope, layer, ind, &name)
            }
            other => Err(ConvertError::Unsupported {
                kind: format!("layer type '{}'", other),
            }),
        };
        match result {
            Ok(Some(converted)) => {
                info!(layer = %name, kind = %layer.kind, "layer converted");
                Some(converted)
            }
            Ok(None) => {
                warn!(layer = %name, "layer has no geometry at any frame");
                None
            }
            Err(err) => {
                self.report(&name, err);
                None
            }
        }
    }
}

/// Converts a whole document. Never fails: layers that cannot be converted
/// are left out and their errors collected.
pub fn convert_document(doc: &Document, opts: &ConvertOptions) -> Conversion {
    let mut units = Units::new(doc);
    if let Some(fps) = opts.frame_rate {
        units = units.with_fps(fps);
    }
    if !opts.pad_shapes {
        warn!("shape padding cannot be disabled; shapes keep a fixed vertex count");
    }
    let fps = units.fps;
    let mut errors = Vec::new();
    let mut frame_of = |time: &sif::Time| match time.to_seconds(fps) {
        Ok(s) => (s * fps).round(),
        Err(err) => {
            errors.push(LayerError {
                layer: "document".to_string(),
                source: err.into(),
            });
            0.0
        }
    };
    let ip = frame_of(&doc.begin_time);
    let op = frame_of(&doc.end_time);

    let mut conv = Converter {
        ctx: ConversionContext::new(units.clone(), opts.samples),
        ip,
        op,
        assets: Vec::new(),
        errors,
    };
    let layers = conv.convert_canvas(&doc.canvas, None);
    info!(
        name = doc.name.as_deref().unwrap_or("scene"),
        layers = layers.len(),
        assets = conv.assets.len(),
        errors = conv.errors.len(),
        "document converted"
    );

    Conversion {
        lottie: LottieJson {
            v: LOTTIE_VERSION.to_string(),
            nm: doc.name.clone(),
            ip,
            op,
            fr: fps,
            w: units.width.round() as u32,
            h: units.height.round() as u32,
            ddd: 0,
            layers,
            assets: conv.assets,
            markers: Vec::new(),
        },
        errors: conv.errors,
    }
}
