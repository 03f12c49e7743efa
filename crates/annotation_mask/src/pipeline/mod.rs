pub mod builder;

use image::GrayImage;
use crate::{
    algorithms::scale_contour,
    error::Result,
    traits::{ContourExtractor, ContourPostProcessor, ContourSimplifier},
    types::Contour,
};

/// Binary mask to export-ready contours: extraction, simplification and
/// post-processing in mask space, then scaling into image space.
pub struct ContourPipeline {
    contour_extractor: Box<dyn ContourExtractor>,
    simplifier: Option<(Box<dyn ContourSimplifier>, f32)>,
    postprocessors: Vec<Box<dyn ContourPostProcessor>>,
}

impl ContourPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> builder::ContourPipelineBuilder {
        builder::ContourPipelineBuilder::new()
    }

    pub fn new(
        contour_extractor: Box<dyn ContourExtractor>,
        simplifier: Option<(Box<dyn ContourSimplifier>, f32)>,
        postprocessors: Vec<Box<dyn ContourPostProcessor>>,
    ) -> Self {
        Self {
            contour_extractor,
            simplifier,
            postprocessors,
        }
    }

    /// Contours in mask coordinates.
    pub fn extract(&self, mask: &GrayImage) -> Result<Vec<Contour>> {
        let mut contours = self.contour_extractor.extract_contours(mask)?;

        if let Some((simplifier, epsilon)) = &self.simplifier {
            simplifier.simplify(&mut contours, *epsilon)?;
        }

        for postprocessor in &self.postprocessors {
            postprocessor.process(&mut contours)?;
        }

        contours.retain(|contour| !contour.is_empty());
        Ok(contours)
    }

    /// Contours in image coordinates.
    pub fn process(&self, mask: &GrayImage, mask_scale: f64) -> Result<Vec<Contour>> {
        let mut contours = self.extract(mask)?;
        for contour in &mut contours {
            contour.points = scale_contour(&contour.points, mask_scale);
        }
        Ok(contours)
    }

    /// Get information about the pipeline configuration
    pub fn info(&self) -> String {
        format!(
            "ContourPipeline: 1 extractor, simplification {}, {} postprocessors",
            match &self.simplifier {
                Some((_, epsilon)) => format!("epsilon={epsilon}"),
                None => "off".to_string(),
            },
            self.postprocessors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::ImageprocContourExtractor;
    use image::Luma;

    fn square(size: u32, x0: u32, side: u32) -> GrayImage {
        let mut img = GrayImage::new(size, size);
        for y in x0..x0 + side {
            for x in x0..x0 + side {
                img.put_pixel(x, y, Luma([1]));
            }
        }
        img
    }

    #[test]
    fn test_default_pipeline_simplifies_square() {
        let pipeline = ContourPipeline::builder().build();
        let contours = pipeline.extract(&square(40, 10, 10)).unwrap();
        assert_eq!(contours.len(), 1);
        assert_eq!(
            contours[0].points,
            vec![[10.0, 10.0], [19.0, 10.0], [19.0, 19.0], [10.0, 19.0]]
        );
    }

    #[test]
    fn test_process_scales_to_image_space() {
        let pipeline = ContourPipeline::builder().build();
        let contours = pipeline.process(&square(40, 10, 10), 2.0).unwrap();
        assert_eq!(contours[0].points[0], [5.0, 5.0]);
        assert_eq!(contours[0].points[2], [9.5, 9.5]);
    }

    #[test]
    fn test_without_simplification_keeps_all_points() {
        let pipeline = ContourPipeline::builder().without_simplification().build();
        let contours = pipeline.extract(&square(40, 10, 10)).unwrap();
        assert_eq!(contours[0].len(), 36);
        assert!(pipeline.info().contains("off"));
    }

    #[test]
    fn test_alternative_extractor() {
        let pipeline = ContourPipeline::builder()
            .set_contour_extractor(ImageprocContourExtractor)
            .with_simplification(1.0)
            .build();
        let contours = pipeline.extract(&square(40, 10, 10)).unwrap();
        assert_eq!(contours.len(), 1);
        // the ring keeps its start point, which may sit mid-edge
        assert!((4..=5).contains(&contours[0].len()));
    }
}
