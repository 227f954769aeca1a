//! Constant-profile outlines: a spline stroked with per-vertex widths,
//! sharp cusps and optional round tips, flattened to one closed polygon.

use glam::DVec2;
use tracing::debug;

use crate::bline::SampledBline;
use crate::math::{line_intersection, norm, perp, Hermite, CURVE_SAMPLES};
use crate::path::{PathVertex, ScenePath};

pub(crate) const EPSILON: f64 = 1e-9;
pub(crate) const CUSP_TANGENT_ADJUST: f64 = 0.025;
pub(crate) const ROUND_END_FACTOR: f64 = 4.0;
const CUSP_THRESHOLD: f64 = 0.40;
const SPIKE_AMOUNT: f64 = 4.0;

#[derive(Debug, Clone, PartialEq)]
pub struct OutlineOptions {
    pub width: f64,
    pub expand: f64,
    pub sharp_cusps: bool,
    /// Round tips at the start and at the end of an open line.
    pub round_tip: [bool; 2],
    pub homogeneous: bool,
    /// Width multiplier accumulated from enclosing groups.
    pub grow: f64,
    pub samples: usize,
}

impl Default for OutlineOptions {
    fn default() -> Self {
        OutlineOptions {
            width: 1.0,
            expand: 0.0,
            sharp_cusps: true,
            round_tip: [true, true],
            homogeneous: true,
            grow: 1.0,
            samples: CURVE_SAMPLES,
        }
    }
}

/// Which side of the stroke a cusp point belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    A,
    B,
}

/// Extra point that joins the offset curves at a sharp corner, if any.
///
/// `last` is the tangent arriving at `vertex`, `curr` the one leaving it.
/// Wide turns get a mitre at the intersection of the offset lines, shallow
/// ones a bounded spike along the bisector.
pub(crate) fn sharp_cusp(vertex: DVec2, curr: DVec2, last: DVec2, w: f64) -> Option<(Side, DVec2)> {
    let t1 = norm(perp(last));
    let t2 = norm(perp(curr));
    let cross = t1.dot(perp(t2));
    let spread = (t1 - t2).length();
    if cross > CUSP_THRESHOLD {
        let p = line_intersection(vertex + t1 * w, last, vertex + t2 * w, curr);
        Some((Side::A, p))
    } else if cross < -CUSP_THRESHOLD {
        let p = line_intersection(vertex - t1 * w, last, vertex - t2 * w, curr);
        Some((Side::B, p))
    } else if cross > 0.0 && spread > 1.0 {
        let amount = (cross / CUSP_THRESHOLD).max(0.0) * (SPIKE_AMOUNT - 1.0) + 1.0;
        Some((Side::A, vertex + norm(t1 + t2) * w * amount))
    } else if cross < 0.0 && spread > 1.0 {
        let amount = (-cross / CUSP_THRESHOLD).max(0.0) * (SPIKE_AMOUNT - 1.0) + 1.0;
        Some((Side::B, vertex - norm(t1 + t2) * w * amount))
    } else {
        None
    }
}

/// Strokes `bline`. Returns `None` when the line has fewer than two distinct
/// points or every segment collapses.
///
/// Segments whose inner tangents are both zero are straight and contribute
/// only their end points.
pub fn outline(bline: &SampledBline, opts: &OutlineOptions) -> Option<ScenePath> {
    let n = bline.len();
    if bline.distinct_points() < 2 {
        debug!(vertices = n, "degenerate outline skipped");
        return None;
    }
    let vertices = &bline.vertices;
    let gv = opts.grow;
    let samples = opts.samples.max(1);
    let half_width = |w: f64| gv * (w * opts.width * 0.5 + opts.expand);

    let start = if bline.looped { n - 1 } else { 0 };
    let mut first_tangent = vertices[0].t2;
    let mut last_tangent = vertices[start].t1;
    if bline.looped && opts.sharp_cusps && last_tangent == DVec2::ZERO && n > 1 {
        let prev = &vertices[(start + n - 1) % n];
        let cur = &vertices[start];
        last_tangent =
            Hermite::new(prev.point, cur.point, prev.t2, cur.t1).derivative(1.0 - CUSP_TANGENT_ADJUST);
    }

    let mut side_a: Vec<PathVertex> = Vec::new();
    let mut side_b: Vec<PathVertex> = Vec::new();
    let mut first = !bline.looped;

    for k in 0..bline.segment_count() {
        let Some((cur, next)) = bline.segment_ends(k) else {
            break;
        };
        let prev_t = cur.t1;
        let mut iter_t = cur.t2;
        let mut next_t = next.t1;
        let split = cur.split_angle || cur.split_radius;

        let straight = iter_t == DVec2::ZERO && next_t == DVec2::ZERO;
        if straight {
            iter_t = next.point - cur.point;
            next_t = iter_t;
            if iter_t == DVec2::ZERO {
                continue;
            }
        }

        let curve = Hermite::new(cur.point, next.point, iter_t, next_t);
        let iter_w = half_width(cur.width);
        let next_w = half_width(next.width);

        if first {
            first_tangent = curve.derivative(CUSP_TANGENT_ADJUST);
        }

        if !first
            && opts.sharp_cusps
            && split
            && (prev_t != iter_t || iter_t == DVec2::ZERO)
            && last_tangent != DVec2::ZERO
        {
            let curr = curve.derivative(CUSP_TANGENT_ADJUST);
            match sharp_cusp(cur.point, curr, last_tangent, iter_w) {
                Some((Side::A, p)) => side_a.push(PathVertex::corner(p)),
                Some((Side::B, p)) => side_b.push(PathVertex::corner(p)),
                None => {}
            }
        }

        let steps = if straight { 1 } else { samples };
        let points: Vec<DVec2> = (0..=steps)
            .map(|i| curve.value(i as f64 / steps as f64))
            .collect();
        let mut dists = Vec::with_capacity(points.len());
        let mut length = 0.0;
        for (i, p) in points.iter().enumerate() {
            if i > 0 {
                length += p.distance(points[i - 1]);
            }
            dists.push(length);
        }

        // The end point is added separately with the settled tangent
        for i in 0..steps {
            let t = i as f64 / steps as f64;
            let d = norm(perp(
                curve.derivative(t.clamp(CUSP_TANGENT_ADJUST, 1.0 - CUSP_TANGENT_ADJUST)),
            ));
            let k = if opts.homogeneous && length > EPSILON {
                dists[i] / length
            } else {
                t
            };
            let w = iter_w + (next_w - iter_w) * k;
            side_a.push(PathVertex::corner(points[i] + d * w));
            side_b.push(PathVertex::corner(points[i] - d * w));
        }

        last_tangent = curve.derivative(1.0 - CUSP_TANGENT_ADJUST);
        let d = norm(perp(last_tangent));
        side_a.push(PathVertex::corner(next.point + d * next_w));
        side_b.push(PathVertex::corner(next.point - d * next_w));
        first = false;
    }

    if side_a.len() < 2 || side_b.len() < 2 {
        return None;
    }

    let mut path = ScenePath::new(true);
    if bline.looped {
        path.vertices.extend(side_a);
        path.vertices.extend(side_b.into_iter().rev());
        return Some(path);
    }

    if opts.round_tip[1] {
        let v = &vertices[n - 1];
        let tangent = norm(last_tangent);
        let w = half_width(v.width);
        let tan = tangent * w * (ROUND_END_FACTOR / 3.0);
        if let Some(end) = side_a.last_mut() {
            *end = PathVertex {
                point: v.point + perp(tangent) * w,
                in_handle: DVec2::ZERO,
                out_handle: tan,
            };
        }
        path.vertices.extend(side_a);
        path.push(PathVertex {
            point: v.point - perp(tangent) * w,
            in_handle: tan,
            out_handle: DVec2::ZERO,
        });
    } else {
        path.vertices.extend(side_a);
    }

    if opts.round_tip[0] {
        let v = &vertices[0];
        let tangent = norm(first_tangent);
        let w = half_width(v.width);
        let tan = -tangent * w * (ROUND_END_FACTOR / 3.0);
        side_b[0] = PathVertex {
            point: v.point - perp(tangent) * w,
            in_handle: DVec2::ZERO,
            out_handle: tan,
        };
        path.vertices.extend(side_b.into_iter().rev());
        path.push(PathVertex {
            point: v.point + perp(tangent) * w,
            in_handle: tan,
            out_handle: DVec2::ZERO,
        });
    } else {
        path.vertices.extend(side_b.into_iter().rev());
    }
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bline::BlineVertex;

    fn line(points: &[(f64, f64)], looped: bool) -> SampledBline {
        SampledBline::new(
            looped,
            points
                .iter()
                .map(|&(x, y)| BlineVertex::new(DVec2::new(x, y), DVec2::ZERO, DVec2::ZERO))
                .collect(),
        )
    }

    fn no_tips() -> OutlineOptions {
        OutlineOptions {
            width: 2.0,
            round_tip: [false, false],
            ..OutlineOptions::default()
        }
    }

    #[test]
    fn test_straight_segment_is_rectangle() {
        let path = outline(&line(&[(0.0, 0.0), (10.0, 0.0)], false), &no_tips()).unwrap();
        let points: Vec<DVec2> = path.vertices.iter().map(|v| v.point).collect();
        assert_eq!(
            points,
            vec![
                DVec2::new(0.0, -1.0),
                DVec2::new(10.0, -1.0),
                DVec2::new(10.0, 1.0),
                DVec2::new(0.0, 1.0),
            ]
        );
        assert!(path.closed);
    }

    #[test]
    fn test_round_tips_add_handles() {
        let opts = OutlineOptions {
            width: 2.0,
            ..OutlineOptions::default()
        };
        let path = outline(&line(&[(0.0, 0.0), (10.0, 0.0)], false), &opts).unwrap();
        assert_eq!(path.len(), 6);
        let tip = &path.vertices[1];
        assert_eq!(tip.point, DVec2::new(10.0, -1.0));
        assert!(tip.out_handle.distance(DVec2::new(4.0 / 3.0, 0.0)) < 1e-12);
        let cap = &path.vertices[2];
        assert_eq!(cap.point, DVec2::new(10.0, 1.0));
        assert_eq!(cap.in_handle, tip.out_handle);
    }

    #[test]
    fn test_degenerate_line_is_skipped() {
        assert!(outline(&line(&[(1.0, 1.0)], false), &no_tips()).is_none());
        assert!(outline(&line(&[(1.0, 1.0), (1.0, 1.0)], false), &no_tips()).is_none());
    }

    #[test]
    fn test_curved_segment_sample_count() {
        let mut bline = line(&[(0.0, 0.0), (10.0, 0.0)], false);
        bline.vertices[0].t2 = DVec2::new(0.0, 10.0);
        bline.vertices[1].t1 = DVec2::new(0.0, -10.0);
        let path = outline(&bline, &no_tips()).unwrap();
        assert_eq!(path.len(), 2 * (CURVE_SAMPLES + 1));
    }

    #[test]
    fn test_square_loop_gets_mitres() {
        let square = line(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)], true);
        let path = outline(&square, &no_tips()).unwrap();
        // Four straight sides with two points per side, plus a mitre at
        // every corner
        assert_eq!(path.len(), 4 * 2 * 2 + 4);
        let far = path
            .vertices
            .iter()
            .map(|v| v.point.length())
            .fold(0.0, f64::max);
        assert!(far > 4.0 * 2f64.sqrt());
    }

    #[test]
    fn test_sharp_cusp_sides() {
        // A left turn mitres the outer side
        let hit = sharp_cusp(DVec2::ZERO, DVec2::new(0.0, 1.0), DVec2::new(1.0, 0.0), 1.0);
        let (side, p) = hit.unwrap();
        assert_eq!(side, Side::A);
        assert!(p.distance(DVec2::new(1.0, -1.0)) < 1e-6);
        let (side, _) = sharp_cusp(DVec2::ZERO, DVec2::new(0.0, -1.0), DVec2::new(1.0, 0.0), 1.0).unwrap();
        assert_eq!(side, Side::B);
        assert!(sharp_cusp(DVec2::ZERO, DVec2::X, DVec2::X, 1.0).is_none());
    }
}
