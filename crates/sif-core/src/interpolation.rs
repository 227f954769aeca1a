//! Waypoint interpolation: turns an ordered waypoint list into Hermite
//! segments, resolving `tcb`, `clamped`, `linear`, `ease` and `constant`
//! modes into tangent pairs.

use glam::DVec2;
use sif_data::Interpolation;

use crate::math::{hermite_basis, solve_cubic_bezier, EASE_IN_HANDLE, EASE_OUT_HANDLE};
use crate::value::{Interpolatable, Smoothing};

/// Weight of the current span in the time-normalized tangent rescale.
const TIME_ADJUST: f64 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint<T> {
    pub frame: f64,
    pub value: T,
    pub before: Interpolation,
    pub after: Interpolation,
    pub tension: f64,
    pub continuity: f64,
    pub bias: f64,
}

impl<T> Waypoint<T> {
    /// A waypoint with the default `clamped` modes and zero TCB triple.
    pub fn new(frame: f64, value: T) -> Self {
        Waypoint {
            frame,
            value,
            before: Interpolation::Clamped,
            after: Interpolation::Clamped,
            tension: 0.0,
            continuity: 0.0,
            bias: 0.0,
        }
    }

    pub fn with_modes(mut self, before: Interpolation, after: Interpolation) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    pub fn with_tcb(mut self, tension: f64, continuity: f64, bias: f64) -> Self {
        self.tension = tension;
        self.continuity = continuity;
        self.bias = bias;
        self
    }
}

/// Outcome of resolving one interval.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    /// The interval keeps the start value until the next interval begins.
    Hold,
    Curve {
        out_tangent: T,
        in_tangent: T,
        ease_out: bool,
        ease_in: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment<T> {
    pub start: f64,
    pub end: f64,
    pub p1: T,
    pub p2: T,
    pub resolution: Resolution<T>,
}

impl<T: Interpolatable> Segment<T> {
    pub fn is_hold(&self) -> bool {
        matches!(self.resolution, Resolution::Hold)
    }

    /// Value at `frame`, which must lie inside `[start, end]`.
    pub fn evaluate(&self, frame: f64) -> T {
        match &self.resolution {
            Resolution::Hold => self.p1.clone(),
            Resolution::Curve {
                out_tangent,
                in_tangent,
                ease_out,
                ease_in,
            } => {
                let span = self.end - self.start;
                let mut u = if span > 0.0 {
                    ((frame - self.start) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                if *ease_out || *ease_in {
                    u = solve_cubic_bezier(
                        ease_handles(*ease_out, *ease_in).0,
                        ease_handles(*ease_out, *ease_in).1,
                        u,
                    );
                }
                let (h00, h10, h01, h11) = hermite_basis(u);
                self.p1
                    .scale(h00)
                    .add(&out_tangent.scale(h10))
                    .add(&self.p2.scale(h01))
                    .add(&in_tangent.scale(h11))
            }
        }
    }
}

/// Time remap handles for an eased segment. Non-eased sides keep the
/// identity handle.
pub fn ease_handles(ease_out: bool, ease_in: bool) -> (DVec2, DVec2) {
    let out = if ease_out {
        EASE_OUT_HANDLE
    } else {
        DVec2::new(1.0 / 3.0, 1.0 / 3.0)
    };
    let inn = if ease_in {
        EASE_IN_HANDLE
    } else {
        DVec2::new(2.0 / 3.0, 2.0 / 3.0)
    };
    (out, inn)
}

fn effective(mode: Interpolation, smoothing: Smoothing) -> Interpolation {
    match (smoothing, mode) {
        (Smoothing::LinearOnly, Interpolation::Tcb | Interpolation::Clamped) => {
            Interpolation::Linear
        }
        _ => mode,
    }
}

fn is_straight(mode: Interpolation) -> bool {
    matches!(mode, Interpolation::Linear | Interpolation::Ease)
}

/// Resolves the interval between `waypoints[i]` and `waypoints[i + 1]`.
///
/// `prev_segment` is the already resolved interval ending at
/// `waypoints[i]`; a `tcb` waypoint entered through a non-`tcb` side
/// reuses its incoming tangent.
pub fn resolve_interval<T: Interpolatable>(
    waypoints: &[Waypoint<T>],
    i: usize,
    prev_segment: Option<&Segment<T>>,
    smoothing: Smoothing,
) -> Resolution<T> {
    let cur = &waypoints[i];
    let next = &waypoints[i + 1];
    let prev = i.checked_sub(1).map(|p| &waypoints[p]);
    let after_next = waypoints.get(i + 2);

    let cur_before = effective(cur.before, smoothing);
    let cur_after = effective(cur.after, smoothing);
    let next_before = effective(next.before, smoothing);

    if cur_after == Interpolation::Constant || next_before == Interpolation::Constant {
        return Resolution::Hold;
    }

    let p1 = &cur.value;
    let p2 = &next.value;
    let chord = p2.sub(p1);
    let zero = chord.scale(0.0);

    // Outgoing tangent at `cur`
    let mut t1 = zero.clone();
    match (cur_after, prev) {
        (Interpolation::Tcb, Some(prev)) => {
            let incoming = prev_segment.map(|seg| match &seg.resolution {
                Resolution::Curve { in_tangent, .. } => in_tangent.clone(),
                Resolution::Hold => zero.clone(),
            });
            t1 = match incoming {
                Some(incoming) if cur_before != Interpolation::Tcb => incoming,
                _ => {
                    let (t, c, b) = (cur.tension, cur.continuity, cur.bias);
                    p1.sub(&prev.value)
                        .scale((1.0 - t) * (1.0 + c) * (1.0 + b) / 2.0)
                        .add(&p2.sub(p1).scale((1.0 - t) * (1.0 - c) * (1.0 - b) / 2.0))
                }
            };
        }
        (Interpolation::Clamped, Some(prev)) => {
            t1 = T::clamped_tangent(&prev.value, p1, p2, prev.frame, cur.frame, next.frame);
        }
        (mode, _) if is_straight(mode) => t1 = chord.clone(),
        (Interpolation::Tcb | Interpolation::Clamped, None) => t1 = chord.clone(),
        _ => {}
    }

    // Incoming tangent at `next`
    let mut t2 = zero;
    match (next_before, after_next) {
        (Interpolation::Tcb, Some(an)) => {
            let (t, c, b) = (next.tension, next.continuity, next.bias);
            t2 = p2
                .sub(p1)
                .scale((1.0 - t) * (1.0 - c) * (1.0 + b) / 2.0)
                .add(&an.value.sub(p2).scale((1.0 - t) * (1.0 + c) * (1.0 - b) / 2.0));
        }
        (Interpolation::Clamped, Some(an)) => {
            t2 = T::clamped_tangent(p1, p2, &an.value, cur.frame, next.frame, an.frame);
        }
        (mode, _) if is_straight(mode) => t2 = chord,
        (Interpolation::Tcb | Interpolation::Clamped, None) => t2 = chord,
        _ => {}
    }

    // Rescale so adjacent spans of unequal length meet with the same slope
    let dt = next.frame - cur.frame;
    if !is_straight(cur_after) {
        if let Some(prev) = prev {
            let prev_dt = cur.frame - prev.frame;
            t1 = t1.scale(dt * (TIME_ADJUST + 1.0) / (dt * TIME_ADJUST + prev_dt));
        }
    }
    if !is_straight(next_before) {
        if let Some(an) = after_next {
            let next_dt = an.frame - next.frame;
            t2 = t2.scale(dt * (TIME_ADJUST + 1.0) / (dt * TIME_ADJUST + next_dt));
        }
    }

    Resolution::Curve {
        out_tangent: t1,
        in_tangent: t2,
        ease_out: cur_after == Interpolation::Ease,
        ease_in: next_before == Interpolation::Ease,
    }
}

/// Builds every segment of a sorted, de-duplicated waypoint list.
pub fn build_segments<T: Interpolatable>(
    waypoints: &[Waypoint<T>],
    smoothing: Smoothing,
) -> Vec<Segment<T>> {
    let mut segments: Vec<Segment<T>> = Vec::with_capacity(waypoints.len().saturating_sub(1));
    for i in 0..waypoints.len().saturating_sub(1) {
        let resolution = resolve_interval(waypoints, i, segments.last(), smoothing);
        let cur = &waypoints[i];

        // A tcb waypoint left through another mode shares its outgoing
        // tangent with the interval before it.
        if effective(cur.before, smoothing) == Interpolation::Tcb
            && effective(cur.after, smoothing) != Interpolation::Tcb
        {
            if let (
                Resolution::Curve { out_tangent, .. },
                Some(Segment {
                    resolution: Resolution::Curve { in_tangent, .. },
                    ..
                }),
            ) = (&resolution, segments.last_mut())
            {
                *in_tangent = out_tangent.clone();
            }
        }

        let next = &waypoints[i + 1];
        let (p1, p2) = match resolution {
            Resolution::Hold => (cur.value.clone(), cur.value.clone()),
            _ => (cur.value.clone(), next.value.clone()),
        };
        segments.push(Segment {
            start: cur.frame,
            end: next.frame,
            p1,
            p2,
            resolution,
        });
    }
    segments
}

/// An animated, continuously interpolated parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Track<T> {
    waypoints: Vec<Waypoint<T>>,
    segments: Vec<Segment<T>>,
    smoothing: Smoothing,
    synthetic: bool,
}

impl<T: Interpolatable> Track<T> {
    /// Sorts and de-duplicates `waypoints` (the first waypoint at a frame
    /// wins) and resolves the segments. `None` when there are no waypoints.
    pub fn new(waypoints: Vec<Waypoint<T>>) -> Option<Self> {
        Self::with_smoothing(waypoints, T::smoothing())
    }

    /// Like [`Track::new`], restricting the modes further. Angles use
    /// `Smoothing::LinearOnly` even though they are plain reals.
    pub fn with_smoothing(mut waypoints: Vec<Waypoint<T>>, smoothing: Smoothing) -> Option<Self> {
        if waypoints.is_empty() {
            return None;
        }
        let smoothing = match T::smoothing() {
            Smoothing::LinearOnly => Smoothing::LinearOnly,
            Smoothing::Full => smoothing,
        };
        waypoints.sort_by(|a, b| a.frame.total_cmp(&b.frame));
        waypoints.dedup_by(|later, earlier| later.frame == earlier.frame);
        let segments = build_segments(&waypoints, smoothing);
        Some(Track {
            waypoints,
            segments,
            smoothing,
            synthetic: false,
        })
    }

    /// A constant track: the value held at `frame` and `frame + 1` with
    /// `constant` interpolation on both sides.
    pub fn constant_at(value: T, frame: f64) -> Self {
        let waypoints = vec![
            Waypoint::new(frame, value.clone())
                .with_modes(Interpolation::Constant, Interpolation::Constant),
            Waypoint::new(frame + 1.0, value)
                .with_modes(Interpolation::Constant, Interpolation::Constant),
        ];
        let segments = build_segments(&waypoints, T::smoothing());
        Track {
            waypoints,
            segments,
            smoothing: T::smoothing(),
            synthetic: true,
        }
    }

    pub fn waypoints(&self) -> &[Waypoint<T>] {
        &self.waypoints
    }

    pub fn segments(&self) -> &[Segment<T>] {
        &self.segments
    }

    /// True when the track was synthesized from a single value.
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn first_frame(&self) -> f64 {
        self.waypoints[0].frame
    }

    pub fn last_frame(&self) -> f64 {
        self.waypoints[self.waypoints.len() - 1].frame
    }

    pub fn value_at(&self, frame: f64) -> T {
        let first = &self.waypoints[0];
        let last = &self.waypoints[self.waypoints.len() - 1];
        if self.segments.is_empty() || frame <= first.frame {
            return first.value.clone();
        }
        if frame >= last.frame {
            return last.value.clone();
        }
        let idx = self.segments.partition_point(|s| s.end <= frame);
        match self.segments.get(idx) {
            Some(segment) => segment.evaluate(frame),
            None => last.value.clone(),
        }
    }
}

/// A discrete parameter (booleans, counts, strings): every value holds
/// until the next key.
#[derive(Debug, Clone, PartialEq)]
pub struct Steps<T> {
    keys: Vec<(f64, T)>,
    synthetic: bool,
}

impl<T: Clone> Steps<T> {
    pub fn new(mut keys: Vec<(f64, T)>) -> Option<Self> {
        if keys.is_empty() {
            return None;
        }
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        keys.dedup_by(|later, earlier| later.0 == earlier.0);
        Some(Steps {
            keys,
            synthetic: false,
        })
    }

    pub fn constant_at(value: T, frame: f64) -> Self {
        Steps {
            keys: vec![(frame, value.clone()), (frame + 1.0, value)],
            synthetic: true,
        }
    }

    pub fn keys(&self) -> &[(f64, T)] {
        &self.keys
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn value_at(&self, frame: f64) -> T {
        let idx = self.keys.partition_point(|(f, _)| *f <= frame);
        let key = if idx == 0 { 0 } else { idx - 1 };
        self.keys[key].1.clone()
    }
}
