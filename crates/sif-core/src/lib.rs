//! Animation curve and shape discretization engine.
//!
//! Scene parameters are resolved into [`param::Param`] trees, synthesized
//! into track-only trees over a [`window::FrameWindow`], sampled per frame
//! and emitted as output properties. Splines are discretized into fixed
//! vertex count polygons by [`outline`] and [`advanced_outline`].

pub mod advanced_outline;
pub mod bline;
pub mod bones;
pub mod context;
pub mod error;
pub mod interpolation;
pub mod keyframes;
pub mod math;
pub mod outline;
pub mod param;
pub mod path;
pub mod sampler;
pub mod shapes;
pub mod units;
pub mod value;
pub mod window;

pub use bones::{BoneArena, BonePose};
pub use context::ConversionContext;
pub use error::{ConvertError, Result};
pub use param::{Param, ParamBuilder};
pub use sampler::Scope;
pub use units::Units;
pub use value::Value;
pub use window::{synthesize, FrameWindow};
