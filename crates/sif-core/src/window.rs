//! Frame windows and the synthesis pass that makes every leaf a track.

use std::ops::RangeInclusive;

use crate::bones::BoneArena;
use crate::error::{ConvertError, Result};
use crate::param::{
    Activepoints, AnimatedTrack, BlineEntryParam, BlineParam, BoneLinkParam, DashItemParam, Param,
    WidthPointParam, WidthPointsParam,
};

/// Inclusive range of whole frames. Only ever widened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    first: i64,
    last: i64,
}

impl Default for FrameWindow {
    fn default() -> Self {
        FrameWindow::EMPTY
    }
}

impl FrameWindow {
    pub const EMPTY: FrameWindow = FrameWindow {
        first: i64::MAX,
        last: i64::MIN,
    };

    pub fn new(first: i64, last: i64) -> Self {
        FrameWindow {
            first: first.min(last),
            last: first.max(last),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    pub fn widen(&mut self, frame: f64) {
        let frame = frame.round() as i64;
        self.first = self.first.min(frame);
        self.last = self.last.max(frame);
    }

    pub fn merge(&mut self, other: &FrameWindow) {
        if !other.is_empty() {
            self.first = self.first.min(other.first);
            self.last = self.last.max(other.last);
        }
    }

    /// First frame, `0` when nothing was found.
    pub fn first(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.first
        }
    }

    /// Last frame, `0` when nothing was found.
    pub fn last(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.last
        }
    }

    pub fn frames(&self) -> RangeInclusive<i64> {
        self.first()..=self.last()
    }

    /// True when the resolved window covers a single frame.
    pub fn is_single(&self) -> bool {
        self.first() == self.last()
    }
}

/// Rebuilds `param` so every leaf is an animated track and widens `window`
/// over every keyframe reachable from it, bones included.
///
/// Leaves without waypoints become synthetic two-key tracks that do not
/// widen the window. A leaf with a single waypoint keeps its frame in the
/// window but is held constant.
pub fn synthesize(
    param: &Param,
    bones: &BoneArena,
    layer: &str,
    window: &mut FrameWindow,
) -> Result<Param> {
    Ok(match param {
        Param::Constant(value) => Param::Animated(AnimatedTrack::constant_at(value.clone(), 0.0)),
        Param::Animated(track) => {
            if track.is_synthetic() {
                return Ok(param.clone());
            }
            let frames = track.frames();
            for frame in &frames {
                window.widen(*frame);
            }
            match frames.as_slice() {
                [only] => Param::Animated(AnimatedTrack::constant_at(track.value_at(*only), *only)),
                _ => param.clone(),
            }
        }
        Param::Convert(convert) => Param::Convert(Box::new(
            convert.try_map(|p| synthesize(p, bones, layer, window))?,
        )),
        Param::BoneLink(link) => {
            let key = bones.key(&link.bone).ok_or_else(|| ConvertError::DanglingBone {
                bone: link.bone.clone(),
                layer: layer.to_string(),
            })?;
            window.merge(&bones.chain_window(key, layer)?);
            Param::BoneLink(Box::new(BoneLinkParam {
                base: synthesize(&link.base, bones, layer, window)?,
                ..(**link).clone()
            }))
        }
        Param::Bline(bline) => {
            let mut entries = Vec::with_capacity(bline.entries.len());
            for e in &bline.entries {
                widen_activepoints(&e.activepoints, window);
                entries.push(BlineEntryParam {
                    point: synthesize(&e.point, bones, layer, window)?,
                    width: synthesize(&e.width, bones, layer, window)?,
                    origin: synthesize(&e.origin, bones, layer, window)?,
                    t1: synthesize(&e.t1, bones, layer, window)?,
                    t2: synthesize(&e.t2, bones, layer, window)?,
                    split_radius: synthesize(&e.split_radius, bones, layer, window)?,
                    split_angle: synthesize(&e.split_angle, bones, layer, window)?,
                    activepoints: e.activepoints.clone(),
                });
            }
            Param::Bline(BlineParam {
                looped: bline.looped,
                entries,
            })
        }
        Param::WidthPoints(list) => {
            let mut entries = Vec::with_capacity(list.entries.len());
            for e in &list.entries {
                widen_activepoints(&e.activepoints, window);
                entries.push(WidthPointParam {
                    position: synthesize(&e.position, bones, layer, window)?,
                    width: synthesize(&e.width, bones, layer, window)?,
                    side_before: synthesize(&e.side_before, bones, layer, window)?,
                    side_after: synthesize(&e.side_after, bones, layer, window)?,
                    lower_bound: synthesize(&e.lower_bound, bones, layer, window)?,
                    upper_bound: synthesize(&e.upper_bound, bones, layer, window)?,
                    priority: e.priority,
                    activepoints: e.activepoints.clone(),
                });
            }
            Param::WidthPoints(WidthPointsParam {
                looped: list.looped,
                entries,
            })
        }
        Param::Dashes(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for e in items {
                widen_activepoints(&e.activepoints, window);
                entries.push(DashItemParam {
                    offset: synthesize(&e.offset, bones, layer, window)?,
                    length: synthesize(&e.length, bones, layer, window)?,
                    side_before: synthesize(&e.side_before, bones, layer, window)?,
                    side_after: synthesize(&e.side_after, bones, layer, window)?,
                    activepoints: e.activepoints.clone(),
                });
            }
            Param::Dashes(entries)
        }
        Param::VectorList(items) => Param::VectorList(
            items
                .iter()
                .map(|p| synthesize(p, bones, layer, window))
                .collect::<Result<_>>()?,
        ),
    })
}

fn widen_activepoints(points: &Activepoints, window: &mut FrameWindow) {
    for frame in points.frames() {
        window.widen(frame);
    }
}
