use image::GrayImage;
use crate::{error::Result, types::Contour};

/// Trait for contour extraction algorithms
pub trait ContourExtractor: Send + Sync {
    /// Extract closed contours from a binary (0 / non-zero) mask
    fn extract_contours(&self, mask: &GrayImage) -> Result<Vec<Contour>>;
}

/// Trait for polygon simplification algorithms
pub trait ContourSimplifier: Send + Sync {
    /// Reduce the point count of each contour in place
    fn simplify(&self, contours: &mut [Contour], epsilon: f32) -> Result<()>;
}

/// Trait for contour post-processing steps
pub trait ContourPostProcessor: Send + Sync {
    /// Post-process the extracted contours; may drop entries
    fn process(&self, contours: &mut Vec<Contour>) -> Result<()>;
}
