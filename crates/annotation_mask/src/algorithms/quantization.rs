//! Conversion of hand-drawn color annotations into per-class binary masks.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use tracing::{info, warn};

use crate::{
    config::{MaskConfig, MAX_CLASSES},
    types::{pack_rgb, MaskClass, ParsedAnnotation},
};

/// Quantizes a color image into at most eight classes.
///
/// Near-white pixels are background. Every other exact color becomes a class,
/// ordered by packed RGB value. Anti-aliased pixels that match no class
/// exactly snap to the nearest class color when it is close enough.
#[derive(Debug, Clone)]
pub struct ColorMaskParser {
    pub snap_threshold: f64,
    pub background_threshold: u8,
    pub max_classes: u8,
}

impl Default for ColorMaskParser {
    fn default() -> Self {
        Self::from_config(&MaskConfig::default())
    }
}

impl ColorMaskParser {
    pub fn from_config(config: &MaskConfig) -> Self {
        Self {
            snap_threshold: config.color_snap_threshold,
            background_threshold: config.background_threshold,
            max_classes: MAX_CLASSES,
        }
    }

    pub fn is_background(&self, [r, g, b]: [u8; 3]) -> bool {
        let t = self.background_threshold;
        r >= t && g >= t && b >= t
    }

    pub fn parse(&self, image: &RgbImage) -> ParsedAnnotation {
        self.parse_rgba(&DynamicImage::ImageRgb8(image.clone()).to_rgba8())
    }

    pub fn parse_dynamic(&self, image: &DynamicImage) -> ParsedAnnotation {
        self.parse_rgba(&image.to_rgba8())
    }

    /// Fully transparent pixels count as background.
    pub fn parse_rgba(&self, image: &RgbaImage) -> ParsedAnnotation {
        let (width, height) = image.dimensions();
        let sample = |p: &image::Rgba<u8>| -> Option<[u8; 3]> {
            let [r, g, b, a] = p.0;
            (a != 0 && !self.is_background([r, g, b])).then_some([r, g, b])
        };

        let distinct: BTreeSet<u32> = image.pixels().filter_map(|p| sample(p)).map(pack_rgb).collect();
        if distinct.len() > self.max_classes as usize {
            warn!(
                colors = distinct.len(),
                kept = self.max_classes,
                "more distinct colors than classes; extra colors are left unlabeled"
            );
        }
        let classes: Vec<MaskClass> = distinct
            .iter()
            .take(self.max_classes as usize)
            .enumerate()
            .map(|(id, &packed)| MaskClass {
                id: id as u8,
                color: unpack_rgb(packed),
            })
            .collect();

        let mut masks: BTreeMap<u8, GrayImage> = classes
            .iter()
            .map(|class| (class.id, GrayImage::new(width, height)))
            .collect();
        let mut cache: HashMap<u32, Option<u8>> = HashMap::new();

        for (x, y, pixel) in image.enumerate_pixels() {
            let Some(rgb) = sample(pixel) else {
                continue;
            };
            let class_id = *cache
                .entry(pack_rgb(rgb))
                .or_insert_with(|| self.classify(rgb, &classes));
            if let Some(mask) = class_id.and_then(|id| masks.get_mut(&id)) {
                mask.put_pixel(x, y, image::Luma([1]));
            }
        }

        info!(width, height, classes = classes.len(), "parsed color annotation");
        ParsedAnnotation {
            classes,
            masks,
            width,
            height,
        }
    }

    /// Exact match first, then the nearest class color under the threshold.
    pub fn classify(&self, rgb: [u8; 3], classes: &[MaskClass]) -> Option<u8> {
        if let Some(class) = classes.iter().find(|class| class.color == rgb) {
            return Some(class.id);
        }
        classes
            .iter()
            .map(|class| (class.id, color_distance(rgb, class.color)))
            .filter(|&(_, distance)| distance < self.snap_threshold)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }
}

fn unpack_rgb(packed: u32) -> [u8; 3] {
    [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8]
}

fn color_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}
