//! Vertex paths in scene units and their conversion to output shapes.

use glam::DVec2;
use lottie_data::model::BezierPath;

use crate::units::VectorMap;

/// A path vertex. Handles are offsets from the point, as the output format
/// stores them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathVertex {
    pub point: DVec2,
    pub in_handle: DVec2,
    pub out_handle: DVec2,
}

impl PathVertex {
    pub fn corner(point: DVec2) -> Self {
        PathVertex {
            point,
            in_handle: DVec2::ZERO,
            out_handle: DVec2::ZERO,
        }
    }

    /// Vertex of a spline with Hermite tangents `t1` (incoming) and `t2`
    /// (outgoing).
    pub fn from_tangents(point: DVec2, t1: DVec2, t2: DVec2) -> Self {
        PathVertex {
            point,
            in_handle: -t1 / 3.0,
            out_handle: t2 / 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScenePath {
    pub vertices: Vec<PathVertex>,
    pub closed: bool,
}

impl ScenePath {
    pub fn new(closed: bool) -> Self {
        ScenePath {
            vertices: Vec::new(),
            closed,
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn push(&mut self, vertex: PathVertex) {
        self.vertices.push(vertex);
    }

    pub fn translate(mut self, offset: DVec2) -> Self {
        for v in &mut self.vertices {
            v.point += offset;
        }
        self
    }

    /// Output path: points through `map`, handles through its linear part.
    pub fn to_bezier(&self, map: &VectorMap) -> BezierPath {
        let mut out = BezierPath {
            c: self.closed,
            ..BezierPath::default()
        };
        for v in &self.vertices {
            let p = map.apply(v.point);
            let i = map.apply_delta(v.in_handle);
            let o = map.apply_delta(v.out_handle);
            out.push([p.x, p.y], [i.x, i.y], [o.x, o.y]);
        }
        out
    }
}
