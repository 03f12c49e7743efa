use crate::{
    algorithms::{BoundaryTracer, DouglasPeuckerSimplifier, MinimumAreaFilter, MinimumPointsFilter},
    config::DEFAULT_CONTOUR_EPSILON,
    pipeline::ContourPipeline,
    traits::{ContourExtractor, ContourPostProcessor, ContourSimplifier},
};

/// Builder for contour pipelines with a fluent API.
///
/// Unless told otherwise the pipeline traces with [`BoundaryTracer`],
/// simplifies with Douglas-Peucker at [`DEFAULT_CONTOUR_EPSILON`] and drops
/// contours with fewer than three points.
pub struct ContourPipelineBuilder {
    contour_extractor: Option<Box<dyn ContourExtractor>>,
    simplifier: Option<(Box<dyn ContourSimplifier>, f32)>,
    postprocessors: Vec<Box<dyn ContourPostProcessor>>,
}

impl ContourPipelineBuilder {
    pub fn new() -> Self {
        Self {
            contour_extractor: None,
            simplifier: Some((Box::new(DouglasPeuckerSimplifier), DEFAULT_CONTOUR_EPSILON)),
            postprocessors: Vec::new(),
        }
    }

    /// Set the contour extractor (replaces any existing one)
    pub fn set_contour_extractor<E>(mut self, extractor: E) -> Self
    where
        E: ContourExtractor + 'static,
    {
        self.contour_extractor = Some(Box::new(extractor));
        self
    }

    /// Set the simplifier and its tolerance (replaces any existing one)
    pub fn set_simplifier<S>(mut self, simplifier: S, epsilon: f32) -> Self
    where
        S: ContourSimplifier + 'static,
    {
        self.simplifier = Some((Box::new(simplifier), epsilon));
        self
    }

    /// Douglas-Peucker with the given tolerance in mask pixels
    pub fn with_simplification(self, epsilon: f32) -> Self {
        self.set_simplifier(DouglasPeuckerSimplifier, epsilon)
    }

    pub fn without_simplification(mut self) -> Self {
        self.simplifier = None;
        self
    }

    /// Add a post-processor to the pipeline
    pub fn add_postprocessor<P>(mut self, postprocessor: P) -> Self
    where
        P: ContourPostProcessor + 'static,
    {
        self.postprocessors.push(Box::new(postprocessor));
        self
    }

    pub fn with_min_area(self, min_area: f32) -> Self {
        self.add_postprocessor(MinimumAreaFilter { min_area })
    }

    /// Build the pipeline with default components if not specified
    pub fn build(mut self) -> ContourPipeline {
        let contour_extractor = self
            .contour_extractor
            .unwrap_or_else(|| Box::new(BoundaryTracer));

        // simplification can collapse a ring, so the point filter always runs last
        self.postprocessors.push(Box::new(MinimumPointsFilter::default()));

        ContourPipeline::new(contour_extractor, self.simplifier, self.postprocessors)
    }

    /// Standard pipeline with the given simplification tolerance
    pub fn build_default(epsilon: f32) -> ContourPipeline {
        Self::new().with_simplification(epsilon).build()
    }
}

impl Default for ContourPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
