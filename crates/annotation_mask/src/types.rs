use std::collections::BTreeMap;

use geo_types::{Coord, LineString, Polygon};
use image::GrayImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    config::{MaskConfig, MAX_CLASSES},
    error::{MaskError, Result},
};

/// Axis-aligned rectangle in mask space with fractional bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MaskRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl MaskRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Square covering every integer coordinate within `radius` of `center`.
    pub fn around(center: [f32; 2], radius: f32) -> Self {
        Self {
            x: center[0] - radius,
            y: center[1] - radius,
            width: 2.0 * radius + 1.0,
            height: 2.0 * radius + 1.0,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Integer bounds `(x0, y0, x1, y1)` with exclusive max, rounded outward.
    pub fn outer_bounds(&self) -> (i64, i64, i64, i64) {
        (
            self.x.floor() as i64,
            self.y.floor() as i64,
            (self.x + self.width).ceil() as i64,
            (self.y + self.height).ceil() as i64,
        )
    }
}

impl From<PixelRegion> for MaskRect {
    fn from(region: PixelRegion) -> Self {
        Self {
            x: region.x as f32,
            y: region.y as f32,
            width: region.width as f32,
            height: region.height as f32,
        }
    }
}

/// Integer rectangle already clamped to a mask buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn contains_region(&self, other: &PixelRegion) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn union(&self, other: &PixelRegion) -> PixelRegion {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PixelRegion {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }

    /// Grow by `margin` on every side without leaving a `width`x`height` buffer.
    pub fn expanded(&self, margin: u32, width: u32, height: u32) -> PixelRegion {
        let x = self.x.saturating_sub(margin);
        let y = self.y.saturating_sub(margin);
        let right = self.right().saturating_add(margin).min(width);
        let bottom = self.bottom().saturating_add(margin).min(height);
        PixelRegion {
            x,
            y,
            width: right.saturating_sub(x),
            height: bottom.saturating_sub(y),
        }
    }
}

/// Image and mask dimensions of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MaskGeometry {
    pub image_width: u32,
    pub image_height: u32,
    pub mask_width: u32,
    pub mask_height: u32,
    /// Mask pixels per image pixel
    pub mask_scale: f64,
}

impl MaskGeometry {
    /// Mask resolution for an image: twice the image size, capped so that
    /// neither axis exceeds the configured maximum dimension.
    pub fn for_image(width: u32, height: u32, config: &MaskConfig) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(MaskError::InvalidDimensions { width, height });
        }
        config.validate()?;
        let longest = width.max(height) as f64;
        let mask_scale = config
            .max_mask_scale
            .min(config.max_mask_dimension as f64 / longest);
        let to_mask = |dim: u32| -> u32 {
            ((dim as f64 * mask_scale).round() as u32).clamp(1, config.max_mask_dimension)
        };

        Ok(Self {
            image_width: width,
            image_height: height,
            mask_width: to_mask(width),
            mask_height: to_mask(height),
            mask_scale,
        })
    }

    pub fn mask_len(&self) -> usize {
        self.mask_width as usize * self.mask_height as usize
    }

    pub fn full_region(&self) -> PixelRegion {
        PixelRegion::new(0, 0, self.mask_width, self.mask_height)
    }
}

/// A semantic label with its display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct MaskClass {
    /// Zero-based class index
    pub id: u8,
    pub color: [u8; 3],
}

impl MaskClass {
    /// The value this class occupies in the raster.
    pub fn raster_value(&self) -> u8 {
        self.id + 1
    }

    pub fn packed_rgb(&self) -> u32 {
        pack_rgb(self.color)
    }
}

pub fn pack_rgb([r, g, b]: [u8; 3]) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Ordered set of at most eight classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassPalette {
    classes: Vec<MaskClass>,
}

impl ClassPalette {
    pub fn new(colors: &[[u8; 3]]) -> Result<Self> {
        if colors.len() > MAX_CLASSES as usize {
            return Err(MaskError::InvalidClass(colors.len() as u8));
        }
        let classes = colors
            .iter()
            .enumerate()
            .map(|(id, &color)| MaskClass { id: id as u8, color })
            .collect();
        Ok(Self { classes })
    }

    pub fn from_classes(mut classes: Vec<MaskClass>) -> Self {
        classes.truncate(MAX_CLASSES as usize);
        Self { classes }
    }

    pub fn classes(&self) -> &[MaskClass] {
        &self.classes
    }

    pub fn get(&self, id: u8) -> Option<&MaskClass> {
        self.classes.iter().find(|class| class.id == id)
    }

    pub fn by_raster_value(&self, value: u8) -> Option<&MaskClass> {
        value.checked_sub(1).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl Default for ClassPalette {
    fn default() -> Self {
        Self {
            classes: [
                [230, 25, 75],
                [60, 180, 75],
                [0, 130, 200],
                [255, 225, 25],
                [245, 130, 48],
                [145, 30, 180],
                [70, 240, 240],
                [240, 50, 230],
            ]
            .into_iter()
            .enumerate()
            .map(|(id, color)| MaskClass { id: id as u8, color })
            .collect(),
        }
    }
}

/// Result of quantizing a color annotation image.
#[derive(Debug, Clone)]
pub struct ParsedAnnotation {
    pub classes: Vec<MaskClass>,
    /// Binary (0/1) mask per class id at source resolution
    pub masks: BTreeMap<u8, GrayImage>,
    pub width: u32,
    pub height: u32,
}

impl ParsedAnnotation {
    /// Number of labeled pixels per class id.
    pub fn pixel_counts(&self) -> BTreeMap<u8, usize> {
        self.masks
            .iter()
            .map(|(&id, mask)| (id, mask.as_raw().iter().filter(|&&v| v != 0).count()))
            .collect()
    }
}

/// A closed polygon ring; the last point connects back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Contour {
    pub points: Vec<[f32; 2]>,
}

impl Contour {
    pub fn new(points: Vec<[f32; 2]>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f32> {
        let coords: Vec<Coord<f32>> = self.points.iter().map(|&[x, y]| Coord { x, y }).collect();
        Polygon::new(LineString::new(coords), vec![])
    }

    pub fn area(&self) -> f32 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Length of the closed ring
    pub fn perimeter(&self) -> f32 {
        if self.points.len() < 2 {
            return 0.0;
        }
        let closing = [self.points[self.points.len() - 1], self.points[0]];
        self.points
            .windows(2)
            .chain(std::iter::once(&closing[..]))
            .map(|w| {
                let dx = w[1][0] - w[0][0];
                let dy = w[1][1] - w[0][1];
                (dx * dx + dy * dy).sqrt()
            })
            .sum()
    }

    pub fn bounding_box(&self) -> ([f32; 2], [f32; 2]) {
        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        for &[x, y] in &self.points {
            min = [min[0].min(x), min[1].min(y)];
            max = [max[0].max(x), max[1].max(y)];
        }
        (min, max)
    }
}

/// All contours of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClassOutline {
    pub class_id: u8,
    pub color: Option<[u8; 3]>,
    pub contours: Vec<Contour>,
}

/// Export-ready outlines of a whole mask, in image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComputedOutline {
    pub classes: Vec<ClassOutline>,
    /// Original image dimensions
    pub image_width: u32,
    pub image_height: u32,
}

impl ComputedOutline {
    pub fn contour_count(&self) -> usize {
        self.classes.iter().map(|c| c.contours.len()).sum()
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: &str) -> Result<()> {
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_images_get_double_resolution() {
        let geometry = MaskGeometry::for_image(2048, 1000, &MaskConfig::default()).unwrap();
        assert_eq!(geometry.mask_scale, 2.0);
        assert_eq!((geometry.mask_width, geometry.mask_height), (4096, 2000));
    }

    #[test]
    fn test_large_images_are_capped() {
        let geometry = MaskGeometry::for_image(8192, 4000, &MaskConfig::default()).unwrap();
        assert_eq!(geometry.mask_scale, 0.5);
        assert_eq!((geometry.mask_width, geometry.mask_height), (4096, 2000));

        let odd = MaskGeometry::for_image(3000, 7, &MaskConfig::default()).unwrap();
        assert!(odd.mask_width <= 4096);
        assert!(odd.mask_scale > 0.0 && odd.mask_scale <= 2.0);
    }

    #[test]
    fn test_zero_dimensions_are_rejected() {
        assert!(matches!(
            MaskGeometry::for_image(0, 10, &MaskConfig::default()),
            Err(MaskError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_zero_max_dimension_is_rejected() {
        let config = MaskConfig {
            max_mask_dimension: 0,
            ..MaskConfig::default()
        };
        assert!(matches!(
            MaskGeometry::for_image(10, 10, &config),
            Err(MaskError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_outer_bounds_round_outward() {
        let rect = MaskRect::new(1.5, 2.2, 3.0, 0.5);
        assert_eq!(rect.outer_bounds(), (1, 2, 5, 3));
    }

    #[test]
    fn test_region_union_and_expand() {
        let a = PixelRegion::new(2, 2, 3, 3);
        let b = PixelRegion::new(4, 0, 2, 2);
        assert_eq!(a.union(&b), PixelRegion::new(2, 0, 4, 5));
        assert_eq!(a.expanded(4, 8, 6), PixelRegion::new(0, 0, 8, 6));
        assert!(a.union(&b).contains_region(&a));
    }

    #[test]
    fn test_contour_metrics() {
        let square = Contour::new(vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]);
        assert_eq!(square.area(), 16.0);
        assert_eq!(square.perimeter(), 16.0);
        assert_eq!(square.bounding_box(), ([0.0, 0.0], [4.0, 4.0]));
    }

    #[test]
    fn test_palette_lookup_by_raster_value() {
        let palette = ClassPalette::default();
        assert_eq!(palette.len(), 8);
        assert_eq!(palette.by_raster_value(1).map(|c| c.id), Some(0));
        assert!(palette.by_raster_value(0).is_none());
    }
}
