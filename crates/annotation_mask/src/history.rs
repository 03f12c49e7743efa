//! Patch-based undo/redo over a [`MaskStore`].
//!
//! Each entry holds the raw bytes of a rectangle as they were before an edit.
//! Undoing swaps those bytes back in and keeps the displaced bytes on the redo
//! stack, so an undo followed by a redo is bit-exact.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    config::UndoBudget,
    error::{MaskError, Result},
    store::MaskStore,
    types::{MaskRect, PixelRegion},
};

#[derive(Debug, Clone, PartialEq)]
pub struct UndoAction {
    /// Class the edit painted with (0 for erase or mixed edits)
    pub class_id: u8,
    pub bbox: MaskRect,
    pub previous_patch: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl UndoAction {
    /// Capture the current bytes under `bbox`. Must run before the edit
    /// touches any pixel inside it.
    pub fn capture(store: &MaskStore, bbox: MaskRect, class_id: u8) -> Result<Self> {
        Ok(Self {
            class_id,
            previous_patch: store.read_region(&bbox)?,
            bbox,
            timestamp: Utc::now(),
        })
    }

    fn cost(&self, budget: &UndoBudget) -> usize {
        self.previous_patch.len() + budget.entry_overhead
    }
}

/// Before-state of an edit whose extent is not known up front, such as a
/// freehand stroke. The captured rectangle only ever grows; bytes already
/// captured are kept because they still describe the pre-edit raster.
#[derive(Debug, Clone)]
pub struct EditCapture {
    class_id: u8,
    region: Option<PixelRegion>,
    patch: Vec<u8>,
    touched: bool,
}

impl EditCapture {
    pub fn new(class_id: u8) -> Self {
        Self {
            class_id,
            region: None,
            patch: Vec::new(),
            touched: false,
        }
    }

    pub fn region(&self) -> Option<PixelRegion> {
        self.region
    }

    /// Make sure `needed` is captured, growing by `margin` pixels when it is
    /// not. Only pixels outside the current capture are read from the store.
    pub fn cover(&mut self, store: &MaskStore, needed: PixelRegion, margin: u32) -> Result<()> {
        self.touched = true;
        if let Some(current) = self.region {
            if current.contains_region(&needed) {
                return Ok(());
            }
        }
        let geometry = store.geometry().ok_or(MaskError::NoImageLoaded)?;
        let grown = needed.expanded(margin, geometry.mask_width, geometry.mask_height);

        let (region, patch) = match self.region {
            None => (grown, store.read_pixels(grown)?),
            Some(current) => {
                let union = current.union(&grown);
                let mut patch = store.read_pixels(union)?;
                let union_w = union.width as usize;
                let current_w = current.width as usize;
                for row in 0..current.height as usize {
                    let dst = (current.y - union.y) as usize + row;
                    let dst_start = dst * union_w + (current.x - union.x) as usize;
                    patch[dst_start..dst_start + current_w]
                        .copy_from_slice(&self.patch[row * current_w..(row + 1) * current_w]);
                }
                (union, patch)
            }
        };
        self.region = Some(region);
        self.patch = patch;
        Ok(())
    }

    pub fn is_touched(&self) -> bool {
        self.touched
    }

    /// `None` when nothing was captured.
    pub fn into_action(self) -> Option<UndoAction> {
        let region = self.region?;
        Some(UndoAction {
            class_id: self.class_id,
            bbox: region.into(),
            previous_patch: self.patch,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    budget: UndoBudget,
    undo_stack: VecDeque<UndoAction>,
    redo_stack: Vec<UndoAction>,
    memory: usize,
}

impl UndoLog {
    pub fn new(budget: UndoBudget) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn budget(&self) -> UndoBudget {
        self.budget
    }

    /// Bytes charged against the budget by both stacks.
    pub fn memory_usage(&self) -> usize {
        self.memory
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.memory = 0;
    }

    /// Capture the before-state of an edit over `bbox`.
    pub fn begin_edit(&self, store: &MaskStore, bbox: MaskRect, class_id: u8) -> Result<UndoAction> {
        UndoAction::capture(store, bbox, class_id)
    }

    /// Record a finished edit. Invalidates redo history and evicts the oldest
    /// entries until the budget holds again.
    pub fn commit(&mut self, action: UndoAction) {
        for dropped in self.redo_stack.drain(..) {
            self.memory -= dropped.cost(&self.budget);
        }
        self.memory += action.cost(&self.budget);
        self.undo_stack.push_back(action);
        self.enforce_budget();
    }

    fn enforce_budget(&mut self) {
        let mut evicted = 0;
        while self.memory > self.budget.max_bytes || self.undo_stack.len() > self.budget.max_entries {
            let Some(oldest) = self.undo_stack.pop_front() else {
                break;
            };
            self.memory -= oldest.cost(&self.budget);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, memory = self.memory, "evicted undo entries");
            if self.undo_stack.is_empty() {
                warn!(
                    max_bytes = self.budget.max_bytes,
                    "edit exceeds the undo budget on its own and cannot be undone"
                );
            }
        }
    }

    /// Restore the state before the most recent edit. Returns the touched
    /// rectangle.
    pub fn undo(&mut self, store: &mut MaskStore) -> Result<MaskRect> {
        let action = self.undo_stack.pop_back().ok_or(MaskError::NothingToUndo)?;
        match swap_in(store, &action) {
            Ok(displaced) => {
                let bbox = action.bbox;
                self.redo_stack.push(displaced);
                Ok(bbox)
            }
            Err(err) => {
                self.undo_stack.push_back(action);
                Err(err)
            }
        }
    }

    /// Reapply the most recently undone edit.
    pub fn redo(&mut self, store: &mut MaskStore) -> Result<MaskRect> {
        let action = self.redo_stack.pop().ok_or(MaskError::NothingToRedo)?;
        match swap_in(store, &action) {
            Ok(displaced) => {
                let bbox = action.bbox;
                self.undo_stack.push_back(displaced);
                Ok(bbox)
            }
            Err(err) => {
                self.redo_stack.push(action);
                Err(err)
            }
        }
    }
}

/// Write `action`'s patch and return an action holding what it replaced.
fn swap_in(store: &mut MaskStore, action: &UndoAction) -> Result<UndoAction> {
    let displaced = UndoAction::capture(store, action.bbox, action.class_id)?;
    store.write_region(&action.bbox, &action.previous_patch)?;
    Ok(displaced)
}
