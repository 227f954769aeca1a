//! Advanced outlines: width profiles from width point lists, five tip
//! styles, sharp or rounded cusps, and dashing.
//!
//! Positions along a spline come in two flavours. The *standard* position
//! splits `[0, 1]` evenly between segments. The *homogeneous* position is
//! the fraction of arc length. Width profiles are always interpolated in
//! homogeneous space; the walk along the curve happens in standard space.

use glam::DVec2;
use tracing::debug;

use crate::bline::{BlineVertex, DashItem, SampledBline, SampledWidthPoints, SideType};
use crate::math::{norm, perp, Hermite, CURVE_SAMPLES};
use crate::outline::{sharp_cusp, Side, CUSP_TANGENT_ADJUST, EPSILON, ROUND_END_FACTOR};
use crate::path::{PathVertex, ScenePath};

const MAX_ITERATIONS: usize = 100;
const MAX_ERROR: f64 = 1e-5;
const INTERPOLATE_EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CuspType {
    Sharp,
    Rounded,
}

impl CuspType {
    pub fn from_code(code: i64) -> Self {
        if code == 1 {
            CuspType::Rounded
        } else {
            CuspType::Sharp
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvancedOutlineOptions {
    pub width: f64,
    pub expand: f64,
    pub smoothness: f64,
    pub start_tip: SideType,
    pub end_tip: SideType,
    pub cusp_type: CuspType,
    /// Width point positions are arc length fractions.
    pub homogeneous: bool,
    pub dash_enabled: bool,
    pub dash_offset: f64,
    pub grow: f64,
    pub samples: usize,
}

impl Default for AdvancedOutlineOptions {
    fn default() -> Self {
        AdvancedOutlineOptions {
            width: 1.0,
            expand: 0.0,
            smoothness: 1.0,
            start_tip: SideType::Rounded,
            end_tip: SideType::Rounded,
            cusp_type: CuspType::Sharp,
            homogeneous: false,
            dash_enabled: false,
            dash_offset: 0.0,
            grow: 1.0,
            samples: CURVE_SAMPLES,
        }
    }
}

/// Arc length bookkeeping for one sampled spline.
pub struct ArcLength<'a> {
    bline: &'a SampledBline,
    lengths: Vec<f64>,
    total: f64,
}

impl<'a> ArcLength<'a> {
    pub fn new(bline: &'a SampledBline) -> Self {
        let lengths = bline.lengths();
        let total = lengths.iter().sum();
        ArcLength {
            bline,
            lengths,
            total,
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    /// Splits a position into its fractional part and the whole turns to add
    /// back. Looped lists wrap, others clamp.
    fn wrap(pos: f64, index_loop: bool) -> (f64, f64) {
        if index_loop {
            let whole = pos.trunc();
            let mut frac = pos - whole;
            let mut turns = whole;
            if frac < 0.0 {
                frac += 1.0;
                turns -= 1.0;
            }
            (frac, turns)
        } else {
            (pos.clamp(0.0, 1.0), 0.0)
        }
    }

    /// Standard position to arc length fraction.
    pub fn std_to_hom(&self, pos: f64, index_loop: bool) -> f64 {
        if pos == 0.0 || pos == 1.0 {
            return pos;
        }
        let size = self.lengths.len();
        if size < 1 {
            return 0.0;
        }
        let (pos, turns) = Self::wrap(pos, index_loop);
        if self.total == 0.0 || pos >= 1.0 {
            return turns + pos;
        }
        let scaled = pos * size as f64;
        let from = (scaled as usize).min(size - 1);
        let mut covered: f64 = self.lengths[..from].iter().sum();
        if let Some(curve) = self.bline.segment(from) {
            covered += curve.find_distance(0.0, scaled - from as f64);
        }
        turns + covered / self.total
    }

    /// Arc length fraction to standard position, solving each segment's
    /// length function with the secant method. Non-convergence keeps the
    /// last estimate.
    pub fn hom_to_std(&self, pos: f64, index_loop: bool) -> f64 {
        if pos == 0.0 || pos == 1.0 {
            return pos;
        }
        let size = self.lengths.len();
        if size < 1 {
            return 0.0;
        }
        let (pos, turns) = Self::wrap(pos, index_loop);
        if self.total == 0.0 || pos >= 1.0 {
            return turns + pos;
        }
        let target = pos * self.total;
        let mut covered = 0.0;
        let mut seg = 0;
        while seg + 1 < size && covered + self.lengths[seg] < target {
            covered += self.lengths[seg];
            seg += 1;
        }
        let seg_length = self.lengths[seg];
        let local = match self.bline.segment(seg) {
            Some(curve) if seg_length > 0.0 => {
                secant_solve(&curve, (target - covered) / seg_length, seg_length)
            }
            _ => 0.0,
        };
        turns + (seg as f64 + local) / size as f64
    }
}

fn secant_solve(curve: &Hermite, fraction: f64, length: f64) -> f64 {
    let f = |s: f64| fraction - curve.find_distance(0.0, s) / length;
    let (mut s1, mut s2) = (0.0, 1.0);
    let (mut f1, mut f2) = (f(s1), f(s2));
    let mut estimate = s1;
    for _ in 0..MAX_ITERATIONS {
        if f1 == f2 {
            break;
        }
        estimate = s1 - f1 * (s1 - s2) / (f1 - f2);
        let fe = f(estimate);
        s2 = s1;
        s1 = estimate;
        f2 = f1;
        f1 = fe;
        if (f2 - f1).abs() <= MAX_ERROR {
            break;
        }
    }
    estimate
}

/// A width point placed on the curve in both position spaces.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Knot {
    std: f64,
    hom: f64,
    width: f64,
    before: SideType,
    after: SideType,
}

impl Knot {
    fn at(pos: f64, width: f64, before: SideType, after: SideType) -> Self {
        Knot {
            std: pos,
            hom: pos,
            width,
            before,
            after,
        }
    }
}

/// Width between two width points at homogeneous position `p`, blended
/// with the smoothstep `q(1-s) + q³(10 + q(6q - 15))s`. A side that is not
/// interpolated contributes zero width.
fn widthpoint_interpolate(prev: &Knot, next: &Knot, p: f64, smoothness: f64) -> f64 {
    let (np, pp) = (next.hom, prev.hom);
    let (mut nw, mut pw) = (next.width, prev.width);
    let ease = |q: f64| q * (1.0 - smoothness) + q * q * q * (10.0 + q * (6.0 * q - 15.0)) * smoothness;

    if p == np {
        return nw;
    }
    if p == pp {
        return pw;
    }
    if np > pp {
        if np > p && p > pp {
            if !next.before.is_interpolate() {
                nw = 0.0;
            }
            if !prev.after.is_interpolate() {
                pw = 0.0;
            }
            let q = if np - pp < INTERPOLATE_EPSILON {
                0.5
            } else {
                (p - pp) / (np - pp)
            };
            pw + (nw - pw) * ease(q)
        } else if p < pp {
            if prev.before.is_interpolate() {
                pw
            } else {
                0.0
            }
        } else if next.after.is_interpolate() {
            nw
        } else {
            0.0
        }
    } else if p > pp || np > p {
        // Across the seam of a looped list
        if !next.before.is_interpolate() {
            nw = 0.0;
        }
        if !prev.after.is_interpolate() {
            pw = 0.0;
        }
        let span = np + 1.0 - pp;
        let q = if span < INTERPOLATE_EPSILON {
            0.5
        } else if p > pp {
            (p - pp) / span
        } else {
            (p + 1.0 - pp) / span
        };
        pw + (nw - pw) * ease(q)
    } else {
        if !next.after.is_interpolate() {
            nw = 0.0;
        }
        if !prev.before.is_interpolate() {
            pw = 0.0;
        }
        let q = if pp - np < INTERPOLATE_EPSILON {
            0.5
        } else {
            (p - np) / (pp - np)
        };
        nw + (pw - nw) * ease(q)
    }
}

/// The width profile, sorted by homogeneous position.
struct Profile {
    knots: Vec<Knot>,
    looped: bool,
    smoothness: f64,
}

impl Profile {
    fn width_at(&self, p: f64) -> f64 {
        let knots = &self.knots;
        match knots.len() {
            0 => return 1.0,
            1 => return widthpoint_interpolate(&knots[0], &knots[0], p, self.smoothness),
            _ => {}
        }
        let idx = knots.partition_point(|k| k.hom <= p);
        let last = knots.len() - 1;
        let (prev, next) = if self.looped {
            if idx == 0 || idx > last {
                (last, 0)
            } else {
                (idx - 1, idx)
            }
        } else if idx == 0 {
            (0, 1)
        } else if idx > last {
            (last - 1, last)
        } else {
            (idx - 1, idx)
        };
        widthpoint_interpolate(&knots[prev], &knots[next], p, self.smoothness)
    }
}

struct Sides {
    a: Vec<DVec2>,
    b: Vec<DVec2>,
}

impl Sides {
    fn push(&mut self, a: DVec2, b: DVec2) {
        self.a.push(a);
        self.b.push(b);
    }

    fn both(&mut self, p: DVec2) {
        self.push(p, p);
    }
}

/// Strokes `bline` with a width profile. Returns `None` for degenerate
/// lines: open lines need two points, and every line needs two distinct
/// positions.
pub fn advanced_outline(
    bline: &SampledBline,
    width_points: &SampledWidthPoints,
    dashes: &[DashItem],
    opts: &AdvancedOutlineOptions,
) -> Option<ScenePath> {
    let n = bline.len();
    if n == 0 || (!bline.looped && n == 1) || bline.distinct_points() < 2 {
        debug!(vertices = n, "degenerate advanced outline skipped");
        return None;
    }
    let arc = ArcLength::new(bline);
    let wp_loop = width_points.looped;
    let to_knot = |pos: f64, width: f64, before: SideType, after: SideType| -> Knot {
        let (std, hom) = if opts.homogeneous {
            (arc.hom_to_std(pos, wp_loop), pos)
        } else {
            (pos, arc.std_to_hom(pos, wp_loop))
        };
        Knot {
            std: std.clamp(0.0, 1.0),
            hom,
            width,
            before,
            after,
        }
    };

    let mut base: Vec<Knot> = width_points
        .points
        .iter()
        .map(|p| to_knot(p.position, p.width, p.side_before, p.side_after))
        .collect();
    let mut profile = base.clone();
    insert_ends(&mut base, bline.looped, opts);
    if !bline.looped || width_points.points.is_empty() {
        profile = base.clone();
    }
    sort_knots(&mut base);
    sort_knots(&mut profile);
    let profile = Profile {
        knots: profile,
        looped: bline.looped,
        smoothness: opts.smoothness,
    };

    let mut start_tip = opts.start_tip;
    let mut end_tip = opts.end_tip;
    let dashed = if opts.dash_enabled && !dashes.is_empty() {
        dash_knots(&arc, dashes, opts.dash_offset, &base, wp_loop, &profile)
    } else {
        None
    };
    let mut walk = match dashed {
        Some(dashed) => {
            start_tip = dashed.start_tip;
            end_tip = dashed.end_tip;
            dashed.knots
        }
        None => base,
    };
    if walk.is_empty() {
        return None;
    }

    if !bline.looped {
        if walk[0].std == 0.0 {
            walk[0].before = start_tip;
        }
        let last = walk.len() - 1;
        if walk[last].std == 1.0 {
            walk[last].after = end_tip;
        }
    }
    if opts.dash_enabled && !dashes.is_empty() {
        if walk[0].before.is_interpolate() {
            walk[0].before = start_tip;
        }
        let last = walk.len() - 1;
        if walk[last].after.is_interpolate() {
            walk[last].after = end_tip;
        }
    }

    let mut walker = Walker::new(bline, &arc, &profile, opts);
    walker.run(&walk);
    walker.finish()
}

fn sort_knots(knots: &mut [Knot]) {
    knots.sort_by(|a, b| a.std.total_cmp(&b.std));
}

/// Closes the profile at the line ends: open lines get their tips, looped
/// ones carry the width across the seam.
fn insert_ends(knots: &mut Vec<Knot>, looped: bool, opts: &AdvancedOutlineOptions) {
    let interp = SideType::Interpolate;
    let (Some(front), Some(back)) = (knots.first().copied(), knots.last().copied()) else {
        if looped {
            knots.push(Knot::at(0.0, 1.0, interp, interp));
            knots.push(Knot::at(1.0, 1.0, interp, interp));
        } else {
            knots.push(Knot::at(0.0, 1.0, opts.start_tip, interp));
            knots.push(Knot::at(1.0, 1.0, interp, opts.end_tip));
        }
        return;
    };
    if !looped {
        if front.before.is_interpolate() && front.std != 0.0 {
            knots.push(Knot::at(0.0, front.width, opts.start_tip, interp));
        }
        if back.after.is_interpolate() && back.std != 1.0 {
            knots.push(Knot::at(1.0, back.width, interp, opts.end_tip));
        }
        return;
    }
    if front.before.is_interpolate() || back.after.is_interpolate() {
        if front.std != 0.0 {
            let w = widthpoint_interpolate(&back, &front, 0.0, opts.smoothness);
            knots.push(Knot::at(0.0, w, interp, interp));
        }
        if back.std != 1.0 {
            let w = widthpoint_interpolate(&back, &front, 1.0, opts.smoothness);
            knots.push(Knot::at(1.0, w, interp, interp));
        }
    }
}

struct DashedKnots {
    knots: Vec<Knot>,
    start_tip: SideType,
    end_tip: SideType,
}

/// Replaces the walk list with dash boundaries. `None` when the line or the
/// dash pattern has no length, in which case dashing is ignored.
fn dash_knots(
    arc: &ArcLength,
    dashes: &[DashItem],
    dash_offset: f64,
    base: &[Knot],
    wp_loop: bool,
    profile: &Profile,
) -> Option<DashedKnots> {
    let total = arc.total();
    if total <= EPSILON {
        return None;
    }
    let pattern: f64 = dashes.iter().map(|d| d.offset + d.length).sum();
    if pattern <= EPSILON {
        debug!("zero length dash pattern ignored");
        return None;
    }
    let interp = SideType::Interpolate;
    let dash_knot = |fraction: f64, before: SideType, after: SideType| Knot {
        std: arc.hom_to_std(fraction, wp_loop),
        hom: fraction,
        width: profile.width_at(fraction),
        before,
        after,
    };

    let mut offset = dash_offset;
    if offset.abs() > pattern {
        offset %= pattern;
    }
    let origin = if offset >= 0.0 { offset } else { pattern + offset };
    let mut start_tip = SideType::Flat;
    let mut end_tip = SideType::Flat;

    let mut forward = Vec::new();
    let mut pos = origin;
    let mut i = 0;
    while pos < total {
        let d = &dashes[i];
        forward.push(dash_knot((pos + d.offset) / total, d.side_before, interp));
        forward.push(dash_knot((pos + d.offset + d.length) / total, interp, d.side_after));
        pos += d.offset + d.length;
        i = (i + 1) % dashes.len();
    }
    if let Some(mut after) = forward.pop() {
        if after.hom >= 1.0 {
            after.std = 1.0;
            after.hom = 1.0;
            match forward.last() {
                Some(before) if before.hom >= 1.0 => {
                    forward.pop();
                }
                _ => {
                    end_tip = after.after;
                    forward.push(after);
                }
            }
        } else {
            forward.push(after);
        }
    }

    let mut backward = Vec::new();
    let mut pos = origin;
    let mut r = dashes.len() - 1;
    while pos > 0.0 {
        let d = &dashes[r];
        backward.push(dash_knot(pos / total, interp, d.side_after));
        backward.push(dash_knot((pos - d.length) / total, d.side_before, interp));
        pos -= d.offset + d.length;
        r = if r == 0 { dashes.len() - 1 } else { r - 1 };
    }
    backward.reverse();
    if !backward.is_empty() {
        let mut before = backward.remove(0);
        if before.hom <= 0.0 {
            before.std = 0.0;
            before.hom = 0.0;
            match backward.first() {
                Some(after) if after.hom <= 0.0 => {
                    backward.remove(0);
                }
                _ => {
                    start_tip = before.before;
                    backward.insert(0, before);
                }
            }
        } else {
            backward.insert(0, before);
        }
    }

    let mut boundaries = backward;
    boundaries.extend(forward);
    if boundaries.is_empty() {
        boundaries.push(dash_knot(0.5, SideType::Flat, interp));
        boundaries.push(dash_knot(0.5, interp, SideType::Flat));
    }

    // Dash ends that fall inside the drawn parts of the base profile, plus
    // base points that fall inside a dash
    let mut knots = Vec::new();
    for pair in base.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if a.after.is_interpolate() || b.before.is_interpolate() {
            knots.extend(
                boundaries
                    .iter()
                    .filter(|d| d.std > a.std && d.std < b.std)
                    .copied(),
            );
        }
    }
    for dash in boundaries.chunks_exact(2) {
        let (lo, hi) = (dash[0].std, dash[1].std);
        knots.extend(base.iter().filter(|k| k.std >= lo && k.std <= hi).copied());
    }
    sort_knots(&mut knots);
    if knots.is_empty() {
        knots.push(dash_knot(0.5, SideType::Flat, SideType::Flat));
    }
    Some(DashedKnots {
        knots,
        start_tip,
        end_tip,
    })
}

/// Walks the curve in standard position, emitting both offset sides.
struct Walker<'a> {
    bline: &'a SampledBline,
    arc: &'a ArcLength<'a>,
    profile: &'a Profile,
    opts: &'a AdvancedOutlineOptions,
    segments: usize,
    bezier_size: f64,
    step: f64,
    seg: usize,
    last_tangent: DVec2,
    sides: Sides,
}

impl<'a> Walker<'a> {
    fn new(
        bline: &'a SampledBline,
        arc: &'a ArcLength<'a>,
        profile: &'a Profile,
        opts: &'a AdvancedOutlineOptions,
    ) -> Self {
        let segments = bline.segment_count().max(1);
        Walker {
            bline,
            arc,
            profile,
            opts,
            segments,
            bezier_size: 1.0 / segments as f64,
            step: 1.0 / opts.samples.max(1) as f64 / bline.len() as f64,
            seg: 0,
            last_tangent: DVec2::ZERO,
            sides: Sides {
                a: Vec::new(),
                b: Vec::new(),
            },
        }
    }

    fn vertex_pos(&self, k: usize) -> f64 {
        if k >= self.segments {
            1.0
        } else {
            k as f64 * self.bezier_size
        }
    }

    fn local(&self, pos: f64) -> f64 {
        (pos - self.vertex_pos(self.seg)) / self.bezier_size
    }

    fn curve(&self) -> Hermite {
        self.bline
            .segment(self.seg)
            .unwrap_or_else(|| Hermite::new(DVec2::ZERO, DVec2::ZERO, DVec2::ZERO, DVec2::ZERO))
    }

    /// Segment end tangents, replaced by the curve direction near the end
    /// when zero.
    fn end_tangents(&self, curve: &Hermite) -> (DVec2, DVec2) {
        let mut start = curve.t1;
        let mut end = curve.t2;
        if start.length() == 0.0 {
            start = curve.derivative(CUSP_TANGENT_ADJUST);
        }
        if end.length() == 0.0 {
            end = curve.derivative(1.0 - CUSP_TANGENT_ADJUST);
        }
        (start, end)
    }

    fn direction(&self, curve: &Hermite, q: f64) -> DVec2 {
        let (start, end) = self.end_tangents(curve);
        if q < EPSILON {
            norm(start)
        } else if q > 1.0 - EPSILON {
            norm(end)
        } else {
            norm(curve.derivative(q))
        }
    }

    fn half_width(&self, profile_width: f64) -> f64 {
        self.opts.grow * (self.opts.expand + self.opts.width * 0.5 * profile_width)
    }

    fn width_at_std(&self, pos: f64) -> f64 {
        self.half_width(self.profile.width_at(self.arc.std_to_hom(pos, false)))
    }

    /// Whether the vertex starting segment `seg` is a corner.
    fn split_at(&self, seg: usize) -> bool {
        self.bline.segment_ends(seg).is_some_and(|(v, _)| is_split(v))
    }

    fn advance_to(&mut self, pos: f64) {
        while self.seg + 1 < self.segments && pos > self.vertex_pos(self.seg + 1) {
            self.last_tangent = self.curve().derivative(1.0 - CUSP_TANGENT_ADJUST);
            self.seg += 1;
        }
    }

    fn run(&mut self, walk: &[Knot]) {
        let first_tangent = {
            let curve = self.curve();
            self.end_tangents(&curve).0
        };
        for (k, knot) in walk.iter().enumerate() {
            match k.checked_sub(1).map(|p| &walk[p]) {
                Some(prev) if prev.after.is_interpolate() || knot.before.is_interpolate() => {
                    self.interpolate(prev, knot);
                }
                _ => self.advance_to(knot.std),
            }
            let curve = self.curve();
            let q = self.local(knot.std);
            let tangent = self.direction(&curve, q);
            let w = self.half_width(knot.width);
            add_tip(&mut self.sides, curve.value(q), tangent, knot, w, self.opts.samples);
        }

        // Join the seam of a looped line
        let (Some(front), Some(back)) = (walk.first(), walk.last()) else {
            return;
        };
        let seam = self
            .bline
            .segment_ends(self.segments - 1)
            .filter(|(_, v)| is_split(v))
            .map(|(_, v)| v.point);
        if self.bline.looped && (front.before.is_interpolate() || back.after.is_interpolate()) {
            if let Some(seam) = seam {
                let curve = self.curve();
                let w = self.half_width(self.profile.width_at(back.hom));
                add_cusp(
                    &mut self.sides,
                    seam,
                    first_tangent,
                    curve.derivative(1.0 - CUSP_TANGENT_ADJUST),
                    w,
                    self.opts.cusp_type,
                    self.opts.samples,
                );
            }
        }
    }

    /// Samples the stretch between two width points, inserting vertex
    /// corners on the way, and ends on `knot`.
    fn interpolate(&mut self, prev: &Knot, knot: &Knot) {
        let end = knot.std;
        let mut pos = prev.std + EPSILON;
        let mut zero_next = !prev.after.is_interpolate();
        loop {
            let next_vertex = self.vertex_pos(self.seg + 1);
            if pos > end && next_vertex >= end {
                break;
            }
            let curve = self.curve();
            if pos > next_vertex && next_vertex < end {
                let q = self.local(next_vertex);
                let d = norm(perp(
                    curve.derivative(q.clamp(CUSP_TANGENT_ADJUST, 1.0 - CUSP_TANGENT_ADJUST)),
                ));
                let p = curve.value(q);
                let w = self.width_at_std(next_vertex);
                self.sides.push(p + d * w, p - d * w);
                self.last_tangent = curve.derivative(1.0 - CUSP_TANGENT_ADJUST);
                self.seg += 1;
                if self.split_at(self.seg) {
                    let next_curve = self.curve();
                    add_cusp(
                        &mut self.sides,
                        next_curve.p1,
                        next_curve.derivative(CUSP_TANGENT_ADJUST),
                        self.last_tangent,
                        w,
                        self.opts.cusp_type,
                        self.opts.samples,
                    );
                }
                pos = next_vertex + EPSILON;
                continue;
            }
            let q = self.local(pos);
            let d = perp(norm(curve.derivative(q)));
            let p = curve.value(q);
            let w = if zero_next {
                zero_next = false;
                0.0
            } else {
                self.width_at_std(pos)
            };
            self.sides.push(p + d * w, p - d * w);
            pos += self.step;
        }

        let curve = self.curve();
        let q = self.local(end);
        let d = perp(self.direction(&curve, q));
        let p = curve.value(q);
        let width = if knot.before.is_interpolate() {
            knot.width
        } else {
            0.0
        };
        let w = self.half_width(width);
        self.sides.push(p + d * w, p - d * w);
    }

    fn finish(self) -> Option<ScenePath> {
        let Sides { mut a, mut b } = self.sides;
        if self.bline.looped {
            b.reverse();
            for side in [&mut a, &mut b] {
                if let Some(cut) = side.iter().position(|p| p.is_nan()) {
                    side.truncate(cut);
                }
            }
            a.extend(b);
        } else {
            a.extend(b.into_iter().rev());
        }
        if a.len() < 3 {
            return None;
        }
        let mut path = ScenePath::new(true);
        path.vertices = a.into_iter().map(PathVertex::corner).collect();
        Some(path)
    }
}

fn is_split(v: &BlineVertex) -> bool {
    v.split_angle || v.t1.length() == 0.0 || v.t2.length() == 0.0
}

/// Fractions `0, step, 2·step, ...` strictly below `limit`.
fn fractions(step: f64, limit: f64) -> impl Iterator<Item = f64> {
    (0..)
        .map(move |i| i as f64 * step)
        .take_while(move |n| *n < limit)
}

fn add_tip(sides: &mut Sides, vertex: DVec2, tangent: DVec2, knot: &Knot, w: f64, samples: usize) {
    let step = 2.0 / samples.max(1) as f64;
    let side = perp(tangent);
    match knot.before {
        SideType::Rounded => {
            let curve = Hermite::new(
                vertex - side * w,
                vertex + side * w,
                -tangent * w * ROUND_END_FACTOR,
                tangent * w * ROUND_END_FACTOR,
            );
            sides.both(vertex);
            for n in fractions(step, 0.499999) {
                sides.push(curve.value(0.5 + n), curve.value(0.5 - n));
            }
            sides.push(curve.value(1.0), curve.value(0.0));
        }
        SideType::Squared => {
            sides.both(vertex);
            sides.both(vertex - tangent * w);
            sides.push(vertex + (side - tangent) * w, vertex + (-side - tangent) * w);
            sides.push(vertex + side * w, vertex - side * w);
        }
        SideType::Peak => {
            sides.both(vertex);
            sides.both(vertex - tangent * w);
            sides.push(vertex + side * w, vertex - side * w);
        }
        SideType::Flat => sides.both(vertex),
        SideType::Interpolate => {}
    }
    match knot.after {
        SideType::Rounded => {
            let curve = Hermite::new(
                vertex - side * w,
                vertex + side * w,
                tangent * w * ROUND_END_FACTOR,
                -tangent * w * ROUND_END_FACTOR,
            );
            for n in fractions(step, 0.499999) {
                sides.push(curve.value(1.0 - n), curve.value(n));
            }
            sides.both(curve.value(0.5));
            sides.both(vertex);
        }
        SideType::Squared => {
            sides.both(vertex);
            sides.both(vertex + tangent * w);
            sides.push(vertex + (-side + tangent) * w, vertex + (side + tangent) * w);
            sides.push(vertex - side * w, vertex + side * w);
            sides.both(vertex);
        }
        SideType::Peak => {
            sides.both(vertex);
            sides.both(vertex + tangent * w);
            sides.push(vertex - side * w, vertex + side * w);
            sides.both(vertex);
        }
        SideType::Flat => sides.both(vertex),
        SideType::Interpolate => {}
    }
}

fn add_cusp(
    sides: &mut Sides,
    vertex: DVec2,
    curr: DVec2,
    last: DVec2,
    w: f64,
    cusp_type: CuspType,
    samples: usize,
) {
    match cusp_type {
        CuspType::Sharp => match sharp_cusp(vertex, curr, last, w) {
            Some((Side::A, p)) => sides.a.push(p),
            Some((Side::B, p)) => sides.b.push(p),
            None => {}
        },
        CuspType::Rounded => {
            let t1 = norm(perp(last));
            let t2 = norm(perp(curr));
            let cross = t1.dot(perp(t2));
            let step = 4.0 / samples.max(1) as f64;
            if cross > 0.0 {
                if let Some(curve) = round_corner(vertex + t1 * w, vertex + t2 * w, t1, t2, w, false) {
                    sides.a.extend(fractions(step, 0.999999).map(|n| curve.value(n)));
                }
            } else if cross < 0.0 {
                if let Some(curve) = round_corner(vertex - t1 * w, vertex - t2 * w, t2, t1, w, true) {
                    sides.b.extend(fractions(step, 0.999999).map(|n| curve.value(n)));
                }
            }
        }
    }
}

/// Arc from `p1` to `p2` around a corner whose offset directions turn from
/// `from` to `to`. `reversed` walks the arc back from the end angle.
fn round_corner(p1: DVec2, p2: DVec2, from: DVec2, to: DVec2, w: f64, reversed: bool) -> Option<Hermite> {
    let mut offset = from.y.atan2(from.x);
    let mut angle = to.y.atan2(to.x) - offset;
    if angle < 0.0 && offset > 0.0 {
        angle += std::f64::consts::TAU;
        offset += std::f64::consts::TAU;
    }
    let sin = angle.sin();
    if sin.abs() < 1e-12 {
        return None;
    }
    let tangent = 4.0 * ((2.0 * (angle / 2.0).cos() - angle.cos() - 1.0) / sin);
    let handle = |a: f64| DVec2::new(-tangent * w * a.sin(), tangent * w * a.cos());
    let (start, end) = if reversed {
        (handle(angle + offset), handle(offset))
    } else {
        (handle(offset), handle(angle + offset))
    };
    Some(Hermite::new(p1, p2, start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bline::WidthPoint;

    fn line(points: &[(f64, f64)], looped: bool) -> SampledBline {
        SampledBline::new(
            looped,
            points
                .iter()
                .map(|&(x, y)| BlineVertex::new(DVec2::new(x, y), DVec2::ZERO, DVec2::ZERO))
                .collect(),
        )
    }

    fn flat_ends() -> AdvancedOutlineOptions {
        AdvancedOutlineOptions {
            width: 2.0,
            start_tip: SideType::Flat,
            end_tip: SideType::Flat,
            ..AdvancedOutlineOptions::default()
        }
    }

    fn max_abs_y(path: &ScenePath) -> f64 {
        path.vertices.iter().map(|v| v.point.y.abs()).fold(0.0, f64::max)
    }

    #[test]
    fn test_std_hom_round_trip() {
        let mut bline = line(&[(0.0, 0.0), (1.0, 0.0), (10.0, 0.0)], false);
        bline.vertices[1].t1 = DVec2::new(1.0, 0.0);
        bline.vertices[1].t2 = DVec2::new(9.0, 0.0);
        let arc = ArcLength::new(&bline);
        // The first half of the standard range covers a tenth of the length
        assert!((arc.std_to_hom(0.5, false) - 0.1).abs() < 1e-6);
        for pos in [0.1, 0.3, 0.5, 0.75, 0.9] {
            let back = arc.hom_to_std(arc.std_to_hom(pos, false), false);
            assert!((back - pos).abs() < 1e-3, "{} -> {}", pos, back);
        }
        assert_eq!(arc.std_to_hom(1.0, false), 1.0);
    }

    #[test]
    fn test_wrapped_positions() {
        let bline = line(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)], true);
        let arc = ArcLength::new(&bline);
        let inside = arc.std_to_hom(0.25, true);
        assert!((arc.std_to_hom(1.25, true) - (1.0 + inside)).abs() < 1e-9);
        assert!((arc.std_to_hom(-0.75, true) - (inside - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_widthpoint_interpolate_smoothstep() {
        let a = Knot::at(0.0, 1.0, SideType::Interpolate, SideType::Interpolate);
        let b = Knot::at(1.0, 3.0, SideType::Interpolate, SideType::Interpolate);
        assert_eq!(widthpoint_interpolate(&a, &b, 0.0, 1.0), 1.0);
        assert_eq!(widthpoint_interpolate(&a, &b, 1.0, 1.0), 3.0);
        assert!((widthpoint_interpolate(&a, &b, 0.5, 1.0) - 2.0).abs() < 1e-12);
        // Linear when smoothness is zero
        assert!((widthpoint_interpolate(&a, &b, 0.25, 0.0) - 1.5).abs() < 1e-12);
        // Smoothstep flattens near the ends
        assert!(widthpoint_interpolate(&a, &b, 0.1, 1.0) < 1.2);
        // A tip side contributes no width
        let tipped = Knot {
            before: SideType::Rounded,
            ..b
        };
        assert!((widthpoint_interpolate(&a, &tipped, 0.5, 0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_widthpoint_interpolate_across_seam() {
        let prev = Knot::at(0.8, 2.0, SideType::Interpolate, SideType::Interpolate);
        let next = Knot::at(0.2, 4.0, SideType::Interpolate, SideType::Interpolate);
        assert!((widthpoint_interpolate(&prev, &next, 0.0, 0.0) - 3.0).abs() < 1e-12);
        assert!((widthpoint_interpolate(&prev, &next, 0.9, 0.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_width_open_line() {
        let bline = line(&[(0.0, 0.0), (10.0, 0.0)], false);
        let path = advanced_outline(&bline, &SampledWidthPoints::default(), &[], &flat_ends()).unwrap();
        assert!(path.closed);
        let ys: Vec<f64> = path.vertices.iter().map(|v| v.point.y.abs()).collect();
        assert!(ys.iter().all(|y| *y < 1.0 + 1e-9));
        assert!((max_abs_y(&path) - 1.0).abs() < 1e-9);
        let xs = path.vertices.iter().map(|v| v.point.x);
        assert!(xs.clone().all(|x| (-1e-9..=10.0 + 1e-9).contains(&x)));
    }

    #[test]
    fn test_width_point_shapes_profile() {
        let bline = line(&[(0.0, 0.0), (10.0, 0.0)], false);
        let wps = SampledWidthPoints {
            looped: false,
            points: vec![
                WidthPoint::new(0.0, 0.0, SideType::Interpolate, SideType::Interpolate),
                WidthPoint::new(1.0, 2.0, SideType::Interpolate, SideType::Interpolate),
            ],
        };
        let path = advanced_outline(&bline, &wps, &[], &flat_ends()).unwrap();
        // Starts at zero width, ends at a half width of 2
        let near_start = path
            .vertices
            .iter()
            .filter(|v| v.point.x < 0.5)
            .map(|v| v.point.y.abs())
            .fold(0.0, f64::max);
        assert!(near_start < 0.1);
        assert!((max_abs_y(&path) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_tips_extend_past_ends() {
        let bline = line(&[(0.0, 0.0), (10.0, 0.0)], false);
        let opts = AdvancedOutlineOptions {
            width: 2.0,
            ..AdvancedOutlineOptions::default()
        };
        let path = advanced_outline(&bline, &SampledWidthPoints::default(), &[], &opts).unwrap();
        let min_x = path.vertices.iter().map(|v| v.point.x).fold(f64::MAX, f64::min);
        let max_x = path.vertices.iter().map(|v| v.point.x).fold(f64::MIN, f64::max);
        assert!(min_x < -0.5);
        assert!(max_x > 10.5);
    }

    #[test]
    fn test_dashes_leave_gaps() {
        let bline = line(&[(0.0, 0.0), (10.0, 0.0)], false);
        let opts = AdvancedOutlineOptions {
            dash_enabled: true,
            homogeneous: true,
            ..flat_ends()
        };
        let dashes = [DashItem {
            offset: 1.0,
            length: 1.0,
            side_before: SideType::Flat,
            side_after: SideType::Flat,
        }];
        let path = advanced_outline(&bline, &SampledWidthPoints::default(), &dashes, &opts).unwrap();
        // Gap between 0 and 1, dash from 1 to 2: nothing wide left of x = 1
        let wide_in_gap = path
            .vertices
            .iter()
            .any(|v| v.point.x < 0.99 && v.point.y.abs() > 1e-6);
        assert!(!wide_in_gap);
        let wide_in_dash = path
            .vertices
            .iter()
            .any(|v| v.point.x > 1.1 && v.point.x < 1.9 && (v.point.y.abs() - 1.0).abs() < 1e-9);
        assert!(wide_in_dash);
    }

    #[test]
    fn test_zero_dash_pattern_is_ignored() {
        let bline = line(&[(0.0, 0.0), (10.0, 0.0)], false);
        let dashed = AdvancedOutlineOptions {
            dash_enabled: true,
            ..flat_ends()
        };
        let dashes = [DashItem {
            offset: 0.0,
            length: 0.0,
            side_before: SideType::Flat,
            side_after: SideType::Flat,
        }];
        let wps = SampledWidthPoints::default();
        let a = advanced_outline(&bline, &wps, &dashes, &dashed).unwrap();
        let b = advanced_outline(&bline, &wps, &[], &flat_ends()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_point_open_line_has_no_geometry() {
        let bline = line(&[(0.0, 0.0)], false);
        assert!(advanced_outline(&bline, &SampledWidthPoints::default(), &[], &flat_ends()).is_none());
    }

    #[test]
    fn test_looped_square_is_closed_ring() {
        let square = line(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)], true);
        let path = advanced_outline(&square, &SampledWidthPoints::default(), &[], &flat_ends()).unwrap();
        assert!(path.vertices.iter().all(|v| !v.point.is_nan()));
        let far = path.vertices.iter().map(|v| v.point.distance(DVec2::new(2.0, 2.0)));
        assert!(far.fold(0.0, f64::max) > 3.0);
    }
}
