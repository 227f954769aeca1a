//! Coordinate and unit normalization between scene units and output pixels.

use glam::{DVec2, DVec4};
use sif_data::Document;

/// `v * scale + offset` on a single component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarMap {
    pub scale: f64,
    pub offset: f64,
}

impl ScalarMap {
    pub const IDENTITY: ScalarMap = ScalarMap {
        scale: 1.0,
        offset: 0.0,
    };

    pub fn new(scale: f64, offset: f64) -> Self {
        ScalarMap { scale, offset }
    }

    pub fn apply(&self, v: f64) -> f64 {
        v * self.scale + self.offset
    }

    /// Maps a difference (tangent) rather than a position.
    pub fn apply_delta(&self, d: f64) -> f64 {
        d * self.scale
    }
}

/// Component-wise affine map on vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorMap {
    pub scale: DVec2,
    pub offset: DVec2,
}

impl VectorMap {
    pub const IDENTITY: VectorMap = VectorMap {
        scale: DVec2::ONE,
        offset: DVec2::ZERO,
    };

    pub fn apply(&self, v: DVec2) -> DVec2 {
        v * self.scale + self.offset
    }

    pub fn apply_delta(&self, d: DVec2) -> DVec2 {
        d * self.scale
    }
}

/// Document level unit conversions.
#[derive(Debug, Clone, PartialEq)]
pub struct Units {
    pub pix_per_unit: f64,
    pub width: f64,
    pub height: f64,
    pub fps: f64,
    pub gamma: [f64; 3],
}

impl Units {
    pub fn new(doc: &Document) -> Self {
        Units {
            pix_per_unit: doc.width / (doc.view_box[2] - doc.view_box[0]),
            width: doc.width,
            height: doc.height,
            fps: doc.fps,
            gamma: doc.gamma,
        }
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    /// Nearest whole frame of a time in seconds.
    pub fn time_to_frame(&self, seconds: f64) -> f64 {
        (seconds * self.fps).round()
    }

    pub fn frame_to_time(&self, frame: f64) -> f64 {
        frame / self.fps
    }

    /// Positions on the canvas: scaled, y flipped and moved so the scene
    /// origin sits at the canvas center.
    pub fn canvas_map(&self) -> VectorMap {
        VectorMap {
            scale: DVec2::new(self.pix_per_unit, -self.pix_per_unit),
            offset: DVec2::new(self.width / 2.0, self.height / 2.0),
        }
    }

    /// Offsets and tangents: scaled and y flipped, no translation.
    pub fn transform_map(&self) -> VectorMap {
        VectorMap {
            scale: DVec2::new(self.pix_per_unit, -self.pix_per_unit),
            offset: DVec2::ZERO,
        }
    }

    pub fn canvas_vector(&self, v: DVec2) -> DVec2 {
        self.canvas_map().apply(v)
    }

    pub fn transform_vector(&self, v: DVec2) -> DVec2 {
        self.transform_map().apply(v)
    }

    pub fn distance(&self, d: f64) -> f64 {
        d * self.pix_per_unit
    }

    /// Layer rotation: counter-clockwise degrees become clockwise.
    pub fn rotation_map(&self) -> ScalarMap {
        ScalarMap::new(-1.0, 0.0)
    }

    /// Amounts in `[0, 1]` become percentages.
    pub fn opacity_map(&self) -> ScalarMap {
        ScalarMap::new(100.0, 0.0)
    }

    /// Gamma corrected, clamped RGBA.
    pub fn color(&self, c: DVec4) -> Vec<f64> {
        let channel = |v: f64, gamma: f64| {
            let v = v.max(0.0);
            let v = if gamma > 0.0 { v.powf(1.0 / gamma) } else { v };
            v.clamp(0.0, 1.0)
        };
        vec![
            channel(c.x, self.gamma[0]),
            channel(c.y, self.gamma[1]),
            channel(c.z, self.gamma[2]),
            c.w.clamp(0.0, 1.0),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units() -> Units {
        Units {
            pix_per_unit: 60.0,
            width: 480.0,
            height: 270.0,
            fps: 24.0,
            gamma: [2.2, 2.2, 2.2],
        }
    }

    #[test]
    fn test_canvas_vector_centers_origin() {
        let u = units();
        assert_eq!(u.canvas_vector(DVec2::ZERO), DVec2::new(240.0, 135.0));
        assert_eq!(u.canvas_vector(DVec2::new(1.0, 1.0)), DVec2::new(300.0, 75.0));
        assert_eq!(u.transform_vector(DVec2::new(1.0, 1.0)), DVec2::new(60.0, -60.0));
    }

    #[test]
    fn test_time_to_frame_rounds() {
        let u = units();
        assert_eq!(u.time_to_frame(0.5), 12.0);
        assert_eq!(u.time_to_frame(0.52), 12.0);
        assert_eq!(u.time_to_frame(0.53), 13.0);
    }

    #[test]
    fn test_color_gamma_and_clamp() {
        let u = units();
        let c = u.color(DVec4::new(1.0, 0.0, 2.0, 0.5));
        assert_eq!(c, vec![1.0, 0.0, 1.0, 0.5]);
        let c = u.color(DVec4::new(0.25, 0.25, 0.25, 1.0));
        assert!((c[0] - 0.25f64.powf(1.0 / 2.2)).abs() < 1e-12);
    }
}
