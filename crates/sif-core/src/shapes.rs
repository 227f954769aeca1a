//! Filled primitives as scene-unit paths at one frame.

use glam::DVec2;

use crate::bline::SampledBline;
use crate::path::{PathVertex, ScenePath};

/// Handle length of a quarter circle drawn with one cubic.
pub const CIRCLE_KAPPA: f64 = 0.552_284_749_8;

/// The filled area of a spline. Open splines are closed with a straight
/// edge.
pub fn region(bline: &SampledBline) -> Option<ScenePath> {
    if bline.distinct_points() < 2 {
        return None;
    }
    let mut path = ScenePath::new(true);
    for v in &bline.vertices {
        path.push(PathVertex::from_tangents(v.point, v.t1, v.t2));
    }
    if !bline.looped {
        // The closing edge of an open region is straight
        if let Some(first) = path.vertices.first_mut() {
            first.in_handle = DVec2::ZERO;
        }
        if let Some(last) = path.vertices.last_mut() {
            last.out_handle = DVec2::ZERO;
        }
    }
    Some(path)
}

pub fn polygon(points: &[DVec2]) -> Option<ScenePath> {
    if points.is_empty() {
        return None;
    }
    let mut path = ScenePath::new(true);
    for p in points {
        path.push(PathVertex::corner(*p));
    }
    Some(path)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    pub radius1: f64,
    pub radius2: f64,
    /// Degrees, counter-clockwise from +x.
    pub angle: f64,
    pub points: i64,
    pub regular_polygon: bool,
}

impl Star {
    /// Alternating outer and inner vertices, starting at `angle` on the
    /// outer radius. A regular polygon keeps only the outer ones.
    pub fn path(&self) -> ScenePath {
        let points = self.points.max(2);
        let step = 360.0 / points as f64;
        let at = |radius: f64, degrees: f64| {
            let (sin, cos) = degrees.to_radians().sin_cos();
            DVec2::new(cos, sin) * radius
        };
        let mut path = ScenePath::new(true);
        for i in 0..points {
            let theta = self.angle + step * i as f64;
            path.push(PathVertex::corner(at(self.radius1, theta)));
            if !self.regular_polygon {
                path.push(PathVertex::corner(at(self.radius2, theta + step / 2.0)));
            }
        }
        path
    }
}

/// Four-vertex circle around the origin, counter-clockwise from +x.
pub fn circle(radius: f64) -> ScenePath {
    let handle = radius * CIRCLE_KAPPA;
    let mut path = ScenePath::new(true);
    for quarter in 0..4 {
        let (sin, cos) = (quarter as f64 * std::f64::consts::FRAC_PI_2).sin_cos();
        let direction = DVec2::new(-sin, cos);
        path.push(PathVertex {
            point: DVec2::new(cos, sin) * radius,
            in_handle: -direction * handle,
            out_handle: direction * handle,
        });
    }
    path
}

/// Axis-aligned rectangle spanned by two corners, grown by `expand` on
/// every side.
pub fn rectangle(point1: DVec2, point2: DVec2, expand: f64) -> ScenePath {
    let lo = point1.min(point2) - DVec2::splat(expand);
    let hi = point1.max(point2) + DVec2::splat(expand);
    let mut path = ScenePath::new(true);
    for p in [
        DVec2::new(lo.x, hi.y),
        DVec2::new(hi.x, hi.y),
        DVec2::new(hi.x, lo.y),
        DVec2::new(lo.x, lo.y),
    ] {
        path.push(PathVertex::corner(p));
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bline::BlineVertex;

    #[test]
    fn test_star_alternates_radii() {
        let star = Star {
            radius1: 2.0,
            radius2: 1.0,
            angle: 90.0,
            points: 5,
            regular_polygon: false,
        };
        let path = star.path();
        assert_eq!(path.len(), 10);
        assert!((path.vertices[0].point - DVec2::new(0.0, 2.0)).length() < 1e-12);
        assert!((path.vertices[1].point.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_regular_polygon_drops_inner_points() {
        let star = Star {
            radius1: 1.0,
            radius2: 0.5,
            angle: 0.0,
            points: 6,
            regular_polygon: true,
        };
        let path = star.path();
        assert_eq!(path.len(), 6);
        assert!(path.vertices.iter().all(|v| (v.point.length() - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_circle_handles_are_tangent() {
        let path = circle(2.0);
        assert_eq!(path.len(), 4);
        let v = path.vertices[0];
        assert_eq!(v.point, DVec2::new(2.0, 0.0));
        assert!((v.out_handle - DVec2::new(0.0, 2.0 * CIRCLE_KAPPA)).length() < 1e-12);
        assert!((v.in_handle + v.out_handle).length() < 1e-12);
    }

    #[test]
    fn test_rectangle_expand() {
        let path = rectangle(DVec2::new(1.0, 1.0), DVec2::new(-1.0, -1.0), 0.5);
        let xs: Vec<f64> = path.vertices.iter().map(|v| v.point.x).collect();
        assert_eq!(xs, vec![-1.5, 1.5, 1.5, -1.5]);
        assert_eq!(path.vertices[0].point.y, 1.5);
    }

    #[test]
    fn test_region_uses_tangents() {
        let bline = SampledBline::new(
            true,
            vec![
                BlineVertex::new(DVec2::ZERO, DVec2::new(3.0, 0.0), DVec2::new(3.0, 0.0)),
                BlineVertex::new(DVec2::new(1.0, 1.0), DVec2::ZERO, DVec2::ZERO),
            ],
        );
        let path = region(&bline).unwrap();
        assert!(path.closed);
        assert_eq!(path.vertices[0].out_handle, DVec2::new(1.0, 0.0));
        assert_eq!(path.vertices[0].in_handle, DVec2::new(-1.0, 0.0));
    }

    #[test]
    fn test_region_of_single_point_is_empty() {
        let bline = SampledBline::new(true, vec![BlineVertex::new(DVec2::ZERO, DVec2::ZERO, DVec2::ZERO)]);
        assert!(region(&bline).is_none());
    }
}
