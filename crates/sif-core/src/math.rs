//! Numeric curve primitives: cubic Hermite segments, arc length sampling
//! and the small amount of 2D vector algebra the discretizers need.

use glam::DVec2;
use kurbo::{CubicBez, ParamCurve, ParamCurveDeriv, Point};

/// Chord samples used for every arc length estimate.
pub const CURVE_SAMPLES: usize = 50;

/// Shoulders of the S-shaped time remap used by ease waypoints.
pub const EASE_OUT_HANDLE: DVec2 = DVec2::new(0.42, 0.0);
pub const EASE_IN_HANDLE: DVec2 = DVec2::new(0.58, 1.0);

/// Perpendicular in the source convention, `(x, y) -> (y, -x)`.
///
/// Note this is the opposite rotation of `DVec2::perp`.
#[inline]
pub fn perp(v: DVec2) -> DVec2 {
    DVec2::new(v.y, -v.x)
}

/// Unit vector in the direction of `v`, or zero for a zero vector.
#[inline]
pub fn norm(v: DVec2) -> DVec2 {
    v.normalize_or_zero()
}

#[inline]
fn to_point(v: DVec2) -> Point {
    Point::new(v.x, v.y)
}

#[inline]
fn from_point(p: Point) -> DVec2 {
    DVec2::new(p.x, p.y)
}

/// A cubic Hermite segment between two points with their tangents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hermite {
    pub p1: DVec2,
    pub p2: DVec2,
    pub t1: DVec2,
    pub t2: DVec2,
}

impl Hermite {
    pub fn new(p1: DVec2, p2: DVec2, t1: DVec2, t2: DVec2) -> Self {
        Hermite { p1, p2, t1, t2 }
    }

    /// The equivalent cubic Bezier.
    pub fn to_cubic(&self) -> CubicBez {
        CubicBez::new(
            to_point(self.p1),
            to_point(self.p1 + self.t1 / 3.0),
            to_point(self.p2 - self.t2 / 3.0),
            to_point(self.p2),
        )
    }

    pub fn value(&self, t: f64) -> DVec2 {
        from_point(self.to_cubic().eval(t))
    }

    pub fn derivative(&self, t: f64) -> DVec2 {
        from_point(self.to_cubic().deriv().eval(t))
    }

    /// Approximate arc length of the whole segment.
    pub fn length(&self) -> f64 {
        self.find_distance(0.0, 1.0)
    }

    /// Approximate arc length between parameters `from` and `to`, summing
    /// `CURVE_SAMPLES` chords.
    pub fn find_distance(&self, from: f64, to: f64) -> f64 {
        if from == to {
            return 0.0;
        }
        let cubic = self.to_cubic();
        let step = (to - from) / CURVE_SAMPLES as f64;
        let mut prev = cubic.eval(from);
        let mut total = 0.0;
        for i in 1..=CURVE_SAMPLES {
            let p = cubic.eval(from + step * i as f64);
            total += prev.distance(p);
            prev = p;
        }
        total
    }
}

/// Intersection of the line through `p1` with direction `t1` and the line
/// through `p2` with direction `t2`. Vertical lines use a very large slope.
pub fn line_intersection(p1: DVec2, t1: DVec2, p2: DVec2, t2: DVec2) -> DVec2 {
    const NEAR_INFINITY: f64 = 1e10;

    let m1 = if t1.x != 0.0 { t1.y / t1.x } else { NEAR_INFINITY };
    let m2 = if t2.x != 0.0 { t2.y / t2.x } else { NEAR_INFINITY };

    let (a1, a2) = (m1, m2);
    let (b1, b2) = (-1.0, -1.0);
    let c1 = p1.y - m1 * p1.x;
    let c2 = p2.y - m2 * p2.x;

    let det_inv = 1.0 / (a1 * b2 - a2 * b1);
    DVec2::new((b1 * c2 - b2 * c1) * det_inv, (a2 * c1 - a1 * c2) * det_inv)
}

/// Solves the unit cubic Bezier easing curve with handles `p1`, `p2` for
/// the ordinate at abscissa `x`.
pub fn solve_cubic_bezier(p1: DVec2, p2: DVec2, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    // Newton-Raphson
    let mut t = x;
    for _ in 0..8 {
        let one_minus_t = 1.0 - t;
        let x_est = 3.0 * one_minus_t * one_minus_t * t * p1.x
            + 3.0 * one_minus_t * t * t * p2.x
            + t * t * t;

        let err = x_est - x;
        if err.abs() < 1e-7 {
            break;
        }

        let dx_dt = 3.0 * one_minus_t * one_minus_t * p1.x
            + 6.0 * one_minus_t * t * (p2.x - p1.x)
            + 3.0 * t * t * (1.0 - p2.x);

        if dx_dt.abs() < 1e-9 {
            break;
        }
        t -= err / dx_dt;
    }

    let one_minus_t = 1.0 - t;
    3.0 * one_minus_t * one_minus_t * t * p1.y + 3.0 * one_minus_t * t * t * p2.y + t * t * t
}

/// Basis weights `(h00, h10, h01, h11)` of the cubic Hermite at `u`.
#[inline]
pub fn hermite_basis(u: f64) -> (f64, f64, f64, f64) {
    let u2 = u * u;
    let u3 = u2 * u;
    (
        2.0 * u3 - 3.0 * u2 + 1.0,
        u3 - 2.0 * u2 + u,
        -2.0 * u3 + 3.0 * u2,
        u3 - u2,
    )
}

/// `(r cos θ, r sin θ)` with θ in degrees.
pub fn radial_to_vector(radius: f64, theta_deg: f64) -> DVec2 {
    let theta = theta_deg.to_radians();
    DVec2::new(radius * theta.cos(), radius * theta.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perp_is_clockwise() {
        assert_eq!(perp(DVec2::new(1.0, 0.0)), DVec2::new(0.0, -1.0));
        assert_eq!(perp(DVec2::new(0.0, 1.0)), DVec2::new(1.0, 0.0));
    }

    #[test]
    fn test_norm_of_zero_is_zero() {
        assert_eq!(norm(DVec2::ZERO), DVec2::ZERO);
        assert!((norm(DVec2::new(3.0, 4.0)).length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hermite_endpoints_and_derivative() {
        let h = Hermite::new(
            DVec2::new(0.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(10.0, 0.0),
        );
        assert!(h.value(0.0).distance(DVec2::ZERO) < 1e-12);
        assert!(h.value(1.0).distance(DVec2::new(10.0, 0.0)) < 1e-12);
        // Tangents equal to the chord make the segment a straight line
        assert!(h.value(0.5).distance(DVec2::new(5.0, 0.0)) < 1e-12);
        assert!(h.derivative(0.3).distance(DVec2::new(10.0, 0.0)) < 1e-9);
        assert!((h.length() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_curved_length_exceeds_chord() {
        let h = Hermite::new(
            DVec2::ZERO,
            DVec2::new(10.0, 0.0),
            DVec2::new(0.0, 20.0),
            DVec2::new(0.0, -20.0),
        );
        assert!(h.length() > 10.0);
        let half = h.find_distance(0.0, 0.5);
        assert!((half * 2.0 - h.length()).abs() < 1e-6);
    }

    #[test]
    fn test_line_intersection() {
        let p = line_intersection(
            DVec2::new(0.0, 1.0),
            DVec2::new(1.0, 0.0),
            DVec2::new(5.0, 0.0),
            DVec2::new(1.0, 1.0),
        );
        assert!(p.distance(DVec2::new(6.0, 1.0)) < 1e-9);
    }

    #[test]
    fn test_solve_cubic_bezier_linear_and_ease() {
        let linear = solve_cubic_bezier(DVec2::new(1.0 / 3.0, 1.0 / 3.0), DVec2::new(2.0 / 3.0, 2.0 / 3.0), 0.4);
        assert!((linear - 0.4).abs() < 1e-6);

        let mid = solve_cubic_bezier(EASE_OUT_HANDLE, EASE_IN_HANDLE, 0.5);
        assert!((mid - 0.5).abs() < 1e-6);
        let early = solve_cubic_bezier(EASE_OUT_HANDLE, EASE_IN_HANDLE, 0.1);
        assert!(early < 0.1);
    }

    #[test]
    fn test_hermite_basis_partition() {
        let (h00, _, h01, _) = hermite_basis(0.37);
        assert!((h00 + h01 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_radial_to_vector() {
        let v = radial_to_vector(2.0, 90.0);
        assert!(v.distance(DVec2::new(0.0, 2.0)) < 1e-12);
    }
}
