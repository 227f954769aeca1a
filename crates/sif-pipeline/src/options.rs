use serde::{Deserialize, Serialize};
use sif_core::math::CURVE_SAMPLES;

/// Conversion settings. Every field has a default, so a config file only
/// needs the ones it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Decimal places kept for every float of the output. `None` keeps full
    /// precision.
    pub precision: Option<u32>,
    pub pretty: bool,
    /// Samples per spline segment when measuring outlines.
    pub samples: usize,
    /// Replaces the document frame rate.
    pub frame_rate: Option<f64>,
    /// Shapes always keep one vertex count across their keyframes; turning
    /// this off is reported and ignored.
    pub pad_shapes: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            precision: Some(3),
            pretty: false,
            samples: CURVE_SAMPLES,
            frame_rate: None,
            pad_shapes: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let opts: ConvertOptions = serde_json::from_value(json!({"pretty": true})).unwrap();
        assert!(opts.pretty);
        assert_eq!(opts.precision, Some(3));
        assert_eq!(opts.samples, CURVE_SAMPLES);
        assert!(opts.pad_shapes);
    }

    #[test]
    fn test_null_precision_disables_rounding() {
        let opts: ConvertOptions = serde_json::from_value(json!({"precision": null})).unwrap();
        assert_eq!(opts.precision, None);
    }
}
