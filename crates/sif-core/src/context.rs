//! State owned by one document conversion.

use std::collections::HashMap;

use tracing::debug;

use crate::bones::BoneArena;
use crate::error::Result;
use crate::param::Param;
use crate::sampler::{sample_real, Scope};
use crate::units::Units;
use crate::window::{synthesize, FrameWindow};

/// Id counters, the synthesized parameter cache and the outline grow stack
/// of a single conversion. Never shared between documents.
#[derive(Debug)]
pub struct ConversionContext {
    pub units: Units,
    /// Samples per segment for outlines.
    pub samples: usize,
    next_layer: u32,
    next_asset: u32,
    synthesized: HashMap<String, (Param, FrameWindow)>,
    grow: Vec<Param>,
}

impl ConversionContext {
    pub fn new(units: Units, samples: usize) -> Self {
        ConversionContext {
            units,
            samples: samples.max(1),
            next_layer: 0,
            next_asset: 0,
            synthesized: HashMap::new(),
            grow: Vec::new(),
        }
    }

    /// Next layer index, unique within the document.
    pub fn next_layer_index(&mut self) -> u32 {
        self.next_layer += 1;
        self.next_layer
    }

    pub fn next_asset_id(&mut self) -> String {
        let id = format!("precomp_{}", self.next_asset);
        self.next_asset += 1;
        id
    }

    /// Synthesizes `param` once per `key`, returning the track-only tree
    /// and its frame window. Later calls with the same key reuse the first
    /// result.
    pub fn synthesized(
        &mut self,
        key: &str,
        param: &Param,
        bones: &BoneArena,
        layer: &str,
    ) -> Result<(Param, FrameWindow)> {
        if let Some(hit) = self.synthesized.get(key) {
            return Ok(hit.clone());
        }
        let mut window = FrameWindow::default();
        let resolved = synthesize(param, bones, layer, &mut window)?;
        debug!(key, first = window.first(), last = window.last(), "synthesized");
        self.synthesized
            .insert(key.to_string(), (resolved.clone(), window));
        Ok((resolved, window))
    }

    /// Enters a group carrying an outline grow amount.
    pub fn push_grow(&mut self, grow: Param) {
        self.grow.push(grow);
    }

    pub fn pop_grow(&mut self) {
        self.grow.pop();
    }

    /// Width multiplier of outlines at `frame`: `e` raised to the sum of the
    /// enclosing groups' grow amounts.
    pub fn grow_at(&self, frame: f64, scope: &Scope) -> Result<f64> {
        let mut total = 0.0;
        for grow in &self.grow {
            total += sample_real(grow, frame, scope, "outline grow")?;
        }
        Ok(total.exp())
    }

    /// Frame window of every grow amount on the stack.
    pub fn grow_window(&self, bones: &BoneArena, layer: &str) -> Result<FrameWindow> {
        let mut window = FrameWindow::default();
        for grow in &self.grow {
            synthesize(grow, bones, layer, &mut window)?;
        }
        Ok(window)
    }
}
