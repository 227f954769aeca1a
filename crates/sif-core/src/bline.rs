//! Spline, width point and dash lists sampled at one frame.

use glam::DVec2;

use crate::error::Result;
use crate::math::Hermite;
use crate::param::{BlineParam, DashItemParam, WidthPointsParam};
use crate::sampler::{sample_bool, sample_integer, sample_real, sample_vector, Scope};

/// One spline vertex at a fixed frame. Tangents already honour the split
/// flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlineVertex {
    pub point: DVec2,
    pub width: f64,
    pub origin: f64,
    pub t1: DVec2,
    pub t2: DVec2,
    pub split_radius: bool,
    pub split_angle: bool,
}

impl BlineVertex {
    pub fn new(point: DVec2, t1: DVec2, t2: DVec2) -> Self {
        BlineVertex {
            point,
            width: 1.0,
            origin: 0.5,
            t1,
            t2,
            split_radius: true,
            split_angle: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampledBline {
    pub looped: bool,
    pub vertices: Vec<BlineVertex>,
}

impl SampledBline {
    pub fn new(looped: bool, vertices: Vec<BlineVertex>) -> Self {
        SampledBline { looped, vertices }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Number of curve segments. A looped line has one per vertex.
    pub fn segment_count(&self) -> usize {
        let n = self.vertices.len();
        if self.looped {
            n
        } else {
            n.saturating_sub(1)
        }
    }

    /// End vertices of segment `k`. A looped line starts with the closing
    /// segment from its last vertex to its first.
    pub fn segment_ends(&self, k: usize) -> Option<(&BlineVertex, &BlineVertex)> {
        let n = self.vertices.len();
        if k >= self.segment_count() {
            return None;
        }
        if self.looped {
            Some((&self.vertices[(k + n - 1) % n], &self.vertices[k]))
        } else {
            Some((&self.vertices[k], &self.vertices[k + 1]))
        }
    }

    pub fn segment(&self, k: usize) -> Option<Hermite> {
        self.segment_ends(k)
            .map(|(a, b)| Hermite::new(a.point, b.point, a.t2, b.t1))
    }

    pub fn segments(&self) -> impl Iterator<Item = Hermite> + '_ {
        (0..self.segment_count()).filter_map(|k| self.segment(k))
    }

    /// Arc length of every segment.
    pub fn lengths(&self) -> Vec<f64> {
        self.segments().map(|s| s.length()).collect()
    }

    pub fn length(&self) -> f64 {
        self.lengths().iter().sum()
    }

    /// Number of distinct vertex positions.
    pub fn distinct_points(&self) -> usize {
        let mut seen: Vec<DVec2> = Vec::with_capacity(self.vertices.len());
        for v in &self.vertices {
            if !seen.iter().any(|p| p.abs_diff_eq(v.point, 1e-12)) {
                seen.push(v.point);
            }
        }
        seen.len()
    }
}

/// Applies the radius and angle split flags to a tangent pair.
///
/// Without a radius split the out tangent takes the in tangent's length,
/// without an angle split it takes the in tangent's direction. A radius
/// split with a zero in tangent keeps the out tangent as declared.
pub fn split_tangents(t1: DVec2, t2: DVec2, split_radius: bool, split_angle: bool) -> (DVec2, DVec2) {
    if split_radius && split_angle {
        return (t1, t2);
    }
    if split_radius && t1.length_squared() == 0.0 {
        return (t1, t2);
    }
    let mut radius = t2.length();
    let mut angle = t2.y.atan2(t2.x);
    if !split_radius {
        radius = t1.length();
    }
    if !split_angle {
        angle = t1.y.atan2(t1.x);
    }
    (t1, DVec2::from_angle(angle) * radius)
}

/// Samples every entry of a spline at `frame`.
///
/// Entries switched fully off by their activepoints are dropped. Partially
/// active entries are blended toward the curve running through their
/// nearest fully active neighbours, at the entry's `origin` parameter.
pub fn sample_bline(param: &BlineParam, frame: f64, scope: &Scope) -> Result<SampledBline> {
    let mut sampled = Vec::with_capacity(param.entries.len());
    for entry in &param.entries {
        let amount = entry.activepoints.amount_at(frame);
        if amount <= 0.0 {
            continue;
        }
        let split_radius = sample_bool(&entry.split_radius, frame, scope, "split radius")?;
        let split_angle = sample_bool(&entry.split_angle, frame, scope, "split angle")?;
        let (t1, t2) = split_tangents(
            sample_vector(&entry.t1, frame, scope, "tangent")?,
            sample_vector(&entry.t2, frame, scope, "tangent")?,
            split_radius,
            split_angle,
        );
        let vertex = BlineVertex {
            point: sample_vector(&entry.point, frame, scope, "vertex")?,
            width: sample_real(&entry.width, frame, scope, "vertex width")?,
            origin: sample_real(&entry.origin, frame, scope, "vertex origin")?,
            t1,
            t2,
            split_radius,
            split_angle,
        };
        sampled.push((vertex, amount));
    }
    Ok(SampledBline::new(param.looped, blend_partial(sampled, param.looped)))
}

fn blend_partial(entries: Vec<(BlineVertex, f64)>, looped: bool) -> Vec<BlineVertex> {
    let n = entries.len();
    let full = |i: usize| entries[i].1 >= 1.0;
    let neighbour = |i: usize, forward: bool| -> Option<usize> {
        let mut j = i;
        for _ in 1..n {
            j = match (forward, looped) {
                (true, true) => (j + 1) % n,
                (false, true) => (j + n - 1) % n,
                (true, false) if j + 1 < n => j + 1,
                (false, false) if j > 0 => j - 1,
                _ => return None,
            };
            if full(j) {
                return Some(j);
            }
        }
        None
    };

    let mut out = Vec::with_capacity(n);
    for (i, (vertex, amount)) in entries.iter().enumerate() {
        if *amount >= 1.0 {
            out.push(*vertex);
            continue;
        }
        let (Some(p), Some(q)) = (neighbour(i, false), neighbour(i, true)) else {
            out.push(*vertex);
            continue;
        };
        let (prev, next) = (&entries[p].0, &entries[q].0);
        let t = vertex.origin.clamp(0.0, 1.0);
        let curve = Hermite::new(prev.point, next.point, prev.t2, next.t1);
        let deriv = curve.derivative(t);
        let off = BlineVertex {
            point: curve.value(t),
            width: prev.width + (next.width - prev.width) * t,
            t1: deriv * t,
            t2: deriv * (1.0 - t),
            ..*vertex
        };
        out.push(BlineVertex {
            point: off.point.lerp(vertex.point, *amount),
            width: off.width + (vertex.width - off.width) * amount,
            t1: off.t1.lerp(vertex.t1, *amount),
            t2: off.t2.lerp(vertex.t2, *amount),
            ..*vertex
        });
    }
    out
}

/// How a width point or dash joins the stroke on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideType {
    Interpolate,
    Rounded,
    Squared,
    Peak,
    Flat,
}

impl SideType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => SideType::Rounded,
            2 => SideType::Squared,
            3 => SideType::Peak,
            4 => SideType::Flat,
            _ => SideType::Interpolate,
        }
    }

    pub fn is_interpolate(self) -> bool {
        self == SideType::Interpolate
    }
}

/// A width point with its position normalized into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidthPoint {
    pub position: f64,
    pub width: f64,
    pub side_before: SideType,
    pub side_after: SideType,
    pub priority: i64,
}

impl WidthPoint {
    pub fn new(position: f64, width: f64, side_before: SideType, side_after: SideType) -> Self {
        WidthPoint {
            position,
            width,
            side_before,
            side_after,
            priority: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampledWidthPoints {
    pub looped: bool,
    pub points: Vec<WidthPoint>,
}

/// Position of a width point within its bounds, wrapped for looped lists
/// and clamped otherwise, then normalized.
pub fn normalized_position(position: f64, lower: f64, upper: f64, looped: bool) -> f64 {
    let range = upper - lower;
    if range.abs() < 1e-12 {
        return 0.0;
    }
    let bound = if looped {
        let p = (position - lower) % range;
        if p >= 0.0 {
            lower + p
        } else {
            upper + p
        }
    } else {
        position.clamp(lower.min(upper), lower.max(upper))
    };
    (bound - lower) / range
}

/// Samples a width point list, sorted by position then priority. Entries
/// count as present when at least half active.
pub fn sample_width_points(
    param: &WidthPointsParam,
    frame: f64,
    scope: &Scope,
) -> Result<SampledWidthPoints> {
    let mut points = Vec::with_capacity(param.entries.len());
    for entry in &param.entries {
        if entry.activepoints.amount_at(frame) < 0.5 {
            continue;
        }
        let position = sample_real(&entry.position, frame, scope, "width point position")?;
        let lower = sample_real(&entry.lower_bound, frame, scope, "width point bound")?;
        let upper = sample_real(&entry.upper_bound, frame, scope, "width point bound")?;
        points.push(WidthPoint {
            position: normalized_position(position, lower, upper, param.looped),
            width: sample_real(&entry.width, frame, scope, "width point width")?,
            side_before: SideType::from_code(sample_integer(
                &entry.side_before,
                frame,
                scope,
                "width point side",
            )?),
            side_after: SideType::from_code(sample_integer(
                &entry.side_after,
                frame,
                scope,
                "width point side",
            )?),
            priority: entry.priority,
        });
    }
    points.sort_by(|a, b| {
        a.position
            .total_cmp(&b.position)
            .then(a.priority.cmp(&b.priority))
    });
    Ok(SampledWidthPoints {
        looped: param.looped,
        points,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashItem {
    pub offset: f64,
    pub length: f64,
    pub side_before: SideType,
    pub side_after: SideType,
}

pub fn sample_dashes(items: &[DashItemParam], frame: f64, scope: &Scope) -> Result<Vec<DashItem>> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if item.activepoints.amount_at(frame) < 0.5 {
            continue;
        }
        out.push(DashItem {
            offset: sample_real(&item.offset, frame, scope, "dash offset")?,
            length: sample_real(&item.length, frame, scope, "dash length")?,
            side_before: SideType::from_code(sample_integer(
                &item.side_before,
                frame,
                scope,
                "dash side",
            )?),
            side_after: SideType::from_code(sample_integer(
                &item.side_after,
                frame,
                scope,
                "dash side",
            )?),
        });
    }
    Ok(out)
}
