use geo_types::{Coord, LineString};
use crate::{
    error::Result,
    traits::{ContourPostProcessor, ContourSimplifier},
    types::Contour,
};

fn to_linestring(points: &[[f32; 2]]) -> LineString<f32> {
    LineString::new(points.iter().map(|&[x, y]| Coord { x, y }).collect())
}

/// Douglas-Peucker on an open polyline. Both endpoints are always kept.
pub fn douglas_peucker(points: &[[f32; 2]], epsilon: f32) -> Vec<[f32; 2]> {
    use geo::Simplify;

    if points.len() < 3 {
        return points.to_vec();
    }
    to_linestring(points)
        .simplify(&epsilon)
        .coords()
        .map(|coord| [coord.x, coord.y])
        .collect()
}

/// Douglas-Peucker on a closed ring. The ring is closed through its first
/// point while simplifying, so no arbitrary split point survives.
pub fn simplify_ring(points: &[[f32; 2]], epsilon: f32) -> Vec<[f32; 2]> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut closed = points.to_vec();
    closed.push(points[0]);
    let mut simplified = douglas_peucker(&closed, epsilon);
    simplified.pop();
    simplified
}

/// Map mask-space points back to image space.
pub fn scale_contour(points: &[[f32; 2]], mask_scale: f64) -> Vec<[f32; 2]> {
    if !(mask_scale.is_finite() && mask_scale > 0.0) {
        return points.to_vec();
    }
    points
        .iter()
        .map(|&[x, y]| [(x as f64 / mask_scale) as f32, (y as f64 / mask_scale) as f32])
        .collect()
}

/// Douglas-Peucker simplifier using geo crate's implementation
#[derive(Debug, Clone, Default)]
pub struct DouglasPeuckerSimplifier;

impl ContourSimplifier for DouglasPeuckerSimplifier {
    fn simplify(&self, contours: &mut [Contour], epsilon: f32) -> Result<()> {
        for contour in contours {
            contour.points = simplify_ring(&contour.points, epsilon);
        }
        Ok(())
    }
}

/// Drops contours that are no longer polygons
#[derive(Debug, Clone)]
pub struct MinimumPointsFilter {
    pub min_points: usize,
}

impl Default for MinimumPointsFilter {
    fn default() -> Self {
        Self { min_points: 3 }
    }
}

impl ContourPostProcessor for MinimumPointsFilter {
    fn process(&self, contours: &mut Vec<Contour>) -> Result<()> {
        contours.retain(|contour| contour.len() >= self.min_points);
        Ok(())
    }
}

/// Drops contours enclosing less than `min_area` square pixels
#[derive(Debug, Clone)]
pub struct MinimumAreaFilter {
    pub min_area: f32,
}

impl Default for MinimumAreaFilter {
    fn default() -> Self {
        Self { min_area: 1.0 }
    }
}

impl ContourPostProcessor for MinimumAreaFilter {
    fn process(&self, contours: &mut Vec<Contour>) -> Result<()> {
        contours.retain(|contour| contour.area() >= self.min_area);
        Ok(())
    }
}
