//! Bone arena and pose composition.
//!
//! Bones live in a flat arena per canvas and refer to their parents by key.
//! Poses are memoized per `(bone, frame)` for the lifetime of the arena,
//! which is one document conversion.

use std::cell::RefCell;
use std::collections::HashMap;

use glam::DVec2;
use sif_data as sif;
use tracing::debug;

use crate::error::{ConvertError, Result};
use crate::math::radial_to_vector;
use crate::param::{Param, ParamBuilder};
use crate::sampler::{sample_real, sample_vector, Scope};
use crate::window::{synthesize, FrameWindow};

pub type BoneKey = usize;

/// Global transform of a bone at one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub origin: DVec2,
    pub angle: f64, // degrees
    pub local_scale: f64,
    pub recursive_scale: DVec2,
}

impl BonePose {
    pub const ROOT: BonePose = BonePose {
        origin: DVec2::ZERO,
        angle: 0.0,
        local_scale: 1.0,
        recursive_scale: DVec2::ONE,
    };
}

#[derive(Debug, Clone, PartialEq)]
enum Parent {
    Root,
    Bone(BoneKey),
    Missing(String),
}

#[derive(Debug, Clone)]
pub struct BoneNode {
    pub id: String,
    pub name: Option<String>,
    parent: Parent,
    pub origin: Param,
    pub angle: Param,
    pub local_scale: Param,
    pub recursive_scale: Param,
    window: FrameWindow,
}

#[derive(Debug, Clone, Copy)]
enum BoneState {
    Resolving,
    Resolved(BonePose),
}

#[derive(Debug, Default)]
pub struct BoneArena {
    bones: Vec<BoneNode>,
    ids: HashMap<String, BoneKey>,
    memo: RefCell<HashMap<(BoneKey, u64), BoneState>>,
}

impl BoneArena {
    /// Arena holding the bones of one canvas.
    pub fn build(bones: &[sif::Bone], builder: &mut ParamBuilder) -> Result<Self> {
        BoneArena::default().extend(bones, builder)
    }

    /// Arena for a nested canvas: the enclosing bones plus its own. Inner
    /// ids shadow outer ones.
    pub fn extend(&self, bones: &[sif::Bone], builder: &mut ParamBuilder) -> Result<Self> {
        let mut arena = BoneArena {
            bones: self.bones.clone(),
            ids: self.ids.clone(),
            memo: RefCell::new(HashMap::new()),
        };
        let base = arena.bones.len();
        for (i, bone) in bones.iter().enumerate() {
            arena.ids.insert(bone.id.clone(), base + i);
        }
        for bone in bones {
            let parent = match &bone.parent {
                None => Parent::Root,
                Some(id) => match arena.ids.get(id) {
                    Some(key) => Parent::Bone(*key),
                    None => Parent::Missing(id.clone()),
                },
            };
            arena.bones.push(BoneNode {
                id: bone.id.clone(),
                name: bone.name.clone(),
                parent,
                origin: builder.build(&bone.origin)?,
                angle: builder.build(&bone.angle)?,
                local_scale: builder.build(&bone.local_length_scale)?,
                recursive_scale: builder.build(&bone.recursive_length_scale)?,
                window: FrameWindow::EMPTY,
            });
        }

        // Synthesis reads the arena for bone links, so collect then assign
        let layer = builder.layer().to_string();
        let mut synthesized = Vec::with_capacity(bones.len());
        for node in &arena.bones[base..] {
            let mut window = FrameWindow::EMPTY;
            let params = [
                synthesize(&node.origin, &arena, &layer, &mut window)?,
                synthesize(&node.angle, &arena, &layer, &mut window)?,
                synthesize(&node.local_scale, &arena, &layer, &mut window)?,
                synthesize(&node.recursive_scale, &arena, &layer, &mut window)?,
            ];
            synthesized.push((params, window));
        }
        for (node, (params, window)) in arena.bones[base..].iter_mut().zip(synthesized) {
            let [origin, angle, local_scale, recursive_scale] = params;
            node.origin = origin;
            node.angle = angle;
            node.local_scale = local_scale;
            node.recursive_scale = recursive_scale;
            node.window = window;
        }
        Ok(arena)
    }

    pub fn key(&self, id: &str) -> Option<BoneKey> {
        self.ids.get(id).copied()
    }

    pub fn get(&self, key: BoneKey) -> Option<&BoneNode> {
        self.bones.get(key)
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Union of the keyframe windows of a bone and all of its ancestors.
    pub fn chain_window(&self, key: BoneKey, layer: &str) -> Result<FrameWindow> {
        let mut window = FrameWindow::EMPTY;
        let mut current = Some(key);
        let mut steps = 0;
        while let Some(k) = current {
            let node = &self.bones[k];
            window.merge(&node.window);
            steps += 1;
            if steps > self.bones.len() {
                return Err(ConvertError::BoneCycle {
                    bone: node.id.clone(),
                });
            }
            current = match &node.parent {
                Parent::Root => None,
                Parent::Bone(p) => Some(*p),
                Parent::Missing(id) => {
                    return Err(ConvertError::DanglingBone {
                        bone: id.clone(),
                        layer: layer.to_string(),
                    })
                }
            };
        }
        Ok(window)
    }

    /// Global pose of bone `key` at `frame`.
    pub fn resolve(&self, key: BoneKey, frame: f64, scope: &Scope) -> Result<BonePose> {
        let node = self.bones.get(key).ok_or_else(|| ConvertError::DanglingBone {
            bone: format!("#{}", key),
            layer: scope.layer.to_string(),
        })?;
        let memo_key = (key, frame.to_bits());
        match self.memo.borrow().get(&memo_key) {
            Some(BoneState::Resolved(pose)) => return Ok(*pose),
            Some(BoneState::Resolving) => {
                return Err(ConvertError::BoneCycle {
                    bone: node.id.clone(),
                })
            }
            None => {}
        }
        self.memo.borrow_mut().insert(memo_key, BoneState::Resolving);
        let result = self.compose(node, frame, scope);
        let mut memo = self.memo.borrow_mut();
        match &result {
            Ok(pose) => {
                memo.insert(memo_key, BoneState::Resolved(*pose));
            }
            Err(_) => {
                memo.remove(&memo_key);
            }
        }
        result
    }

    fn compose(&self, node: &BoneNode, frame: f64, scope: &Scope) -> Result<BonePose> {
        let origin = sample_vector(&node.origin, frame, scope, "bone origin")?;
        let angle = sample_real(&node.angle, frame, scope, "bone angle")?;
        let local_scale = sample_real(&node.local_scale, frame, scope, "bone scale")?;

        let parent = match &node.parent {
            Parent::Root => BonePose::ROOT,
            Parent::Bone(key) => self.resolve(*key, frame, scope)?,
            Parent::Missing(id) => {
                return Err(ConvertError::DanglingBone {
                    bone: id.clone(),
                    layer: scope.layer.to_string(),
                })
            }
        };

        let scaled = origin * parent.local_scale;
        let theta = scaled.y.atan2(scaled.x).to_degrees();
        let placed = radial_to_vector(scaled.length(), theta + parent.angle);
        debug!(bone = %node.id, frame, "resolved bone pose");

        // Recursive length scale is held at unity
        Ok(BonePose {
            origin: parent.origin + placed,
            angle: parent.angle + angle,
            local_scale,
            recursive_scale: DVec2::ONE,
        })
    }
}
