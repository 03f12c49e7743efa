use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{MaskError, Result};

/// Highest class value a raster pixel may hold. Value 0 is unlabeled.
pub const MAX_CLASSES: u8 = 8;
/// Upper bound for either mask axis.
pub const MAX_MASK_DIMENSION: u32 = 4096;
/// Mask resolution relative to the source image when the cap does not apply.
pub const MAX_MASK_SCALE: f64 = 2.0;
pub const MIN_VIEW_SCALE: f64 = 0.1;
pub const MAX_VIEW_SCALE: f64 = 10.0;
pub const COLOR_SNAP_THRESHOLD: f64 = 30.0;
/// Every channel at or above this value counts as anti-aliased background.
pub const BACKGROUND_THRESHOLD: u8 = 250;
pub const DEFAULT_CONTOUR_EPSILON: f32 = 1.0;

/// Memory and entry limits for the undo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct UndoBudget {
    /// Upper bound for patch bytes plus per-entry overhead across both stacks
    pub max_bytes: usize,
    /// Upper bound for the number of undo entries
    pub max_entries: usize,
    /// Bookkeeping cost charged per entry on top of its patch
    pub entry_overhead: usize,
}

impl Default for UndoBudget {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024,
            max_entries: 200,
            entry_overhead: 64,
        }
    }
}

/// Tunables of the mask engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MaskConfig {
    #[schemars(range(min = 1, max = 4096))]
    pub max_mask_dimension: u32,
    pub max_mask_scale: f64,
    pub min_scale: f64,
    pub max_scale: f64,
    pub color_snap_threshold: f64,
    pub background_threshold: u8,
    pub contour_epsilon: f32,
    pub undo: UndoBudget,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            max_mask_dimension: MAX_MASK_DIMENSION,
            max_mask_scale: MAX_MASK_SCALE,
            min_scale: MIN_VIEW_SCALE,
            max_scale: MAX_VIEW_SCALE,
            color_snap_threshold: COLOR_SNAP_THRESHOLD,
            background_threshold: BACKGROUND_THRESHOLD,
            contour_epsilon: DEFAULT_CONTOUR_EPSILON,
            undo: UndoBudget::default(),
        }
    }
}

impl MaskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_mask_dimension == 0 || self.max_mask_dimension > MAX_MASK_DIMENSION {
            return Err(MaskError::InvalidConfig(format!(
                "max_mask_dimension must be in 1..={MAX_MASK_DIMENSION}, got {}",
                self.max_mask_dimension
            )));
        }
        if !(self.max_mask_scale.is_finite() && self.max_mask_scale > 0.0) {
            return Err(MaskError::InvalidConfig(format!(
                "max_mask_scale must be positive, got {}",
                self.max_mask_scale
            )));
        }
        if !(self.min_scale.is_finite() && self.min_scale > 0.0 && self.min_scale <= self.max_scale)
            || !self.max_scale.is_finite()
        {
            return Err(MaskError::InvalidConfig(format!(
                "view scale bounds [{}, {}] are invalid",
                self.min_scale, self.max_scale
            )));
        }
        if !(self.color_snap_threshold.is_finite() && self.color_snap_threshold >= 0.0) {
            return Err(MaskError::InvalidConfig(
                "color_snap_threshold must be finite and non-negative".to_string(),
            ));
        }
        if !(self.contour_epsilon.is_finite() && self.contour_epsilon >= 0.0) {
            return Err(MaskError::InvalidConfig(
                "contour_epsilon must be finite and non-negative".to_string(),
            ));
        }
        if self.undo.max_entries == 0 || self.undo.max_bytes == 0 {
            return Err(MaskError::InvalidConfig(
                "undo budget must allow at least one entry".to_string(),
            ));
        }
        Ok(())
    }
}
