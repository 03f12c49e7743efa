//! Ownership of the class-indexed raster and all pixel I/O.
//!
//! Coordinates are mask-space. Every rectangular access rounds its bounds
//! outward (floor of the minimum, ceil of the maximum) and clamps to the
//! buffer, so a read and a write of the same rectangle touch the same pixels.

use std::collections::VecDeque;

use image::{GrayImage, Luma};
use tracing::{debug, info};

use crate::{
    config::{MaskConfig, MAX_CLASSES},
    error::{MaskError, Result},
    types::{MaskGeometry, MaskRect, ParsedAnnotation, PixelRegion},
};

/// Row-major `u8` class buffer. `data.len() == width * height`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RasterMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl RasterMask {
    /// Zero-filled mask. Reports allocation failure instead of aborting.
    fn try_new(width: u32, height: u32) -> Result<Self> {
        let len = width as usize * height as usize;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| MaskError::AllocationFailed { width, height })?;
        data.resize(len, 0);
        Ok(Self { width, height, data })
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// A pending flood fill: the connected pixels and their bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillPlan {
    pub bounds: PixelRegion,
    pub original_value: u8,
    pixels: Vec<usize>,
}

impl FillPlan {
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }
}

fn check_class(value: u8) -> Result<()> {
    if value > MAX_CLASSES {
        return Err(MaskError::InvalidClass(value));
    }
    Ok(())
}

fn check_inside(raster: &RasterMask, region: PixelRegion) -> Result<()> {
    if region.right() > raster.width || region.bottom() > raster.height {
        return Err(MaskError::DimensionMismatch {
            expected: (raster.width, raster.height),
            actual: (region.right(), region.bottom()),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MaskStore {
    config: MaskConfig,
    geometry: Option<MaskGeometry>,
    raster: Option<RasterMask>,
}

impl MaskStore {
    pub fn new(config: MaskConfig) -> Self {
        Self {
            config,
            geometry: None,
            raster: None,
        }
    }

    pub fn geometry(&self) -> Option<MaskGeometry> {
        self.geometry
    }

    pub fn has_mask(&self) -> bool {
        self.raster.is_some()
    }

    /// Record the image geometry and allocate a fresh mask for it.
    ///
    /// The new buffer is allocated before the old one is dropped, so a failed
    /// allocation leaves the previous image and mask intact.
    pub fn load_image(&mut self, width: u32, height: u32) -> Result<MaskGeometry> {
        let geometry = MaskGeometry::for_image(width, height, &self.config)?;
        let raster = RasterMask::try_new(geometry.mask_width, geometry.mask_height)?;
        self.geometry = Some(geometry);
        self.raster = Some(raster);
        info!(
            image_width = width,
            image_height = height,
            mask_width = geometry.mask_width,
            mask_height = geometry.mask_height,
            mask_scale = geometry.mask_scale,
            "allocated mask"
        );
        Ok(geometry)
    }

    /// Record an image without allocating its mask yet.
    pub fn register_image(&mut self, width: u32, height: u32) -> Result<MaskGeometry> {
        let geometry = MaskGeometry::for_image(width, height, &self.config)?;
        self.geometry = Some(geometry);
        self.raster = None;
        Ok(geometry)
    }

    /// Allocate the mask of an already registered image if it has none.
    pub fn ensure_mask(&mut self) -> Result<MaskGeometry> {
        let geometry = self.geometry.ok_or(MaskError::NoImageLoaded)?;
        if self.raster.is_none() {
            self.raster = Some(RasterMask::try_new(
                geometry.mask_width,
                geometry.mask_height,
            )?);
            debug!("allocated mask on request");
        }
        Ok(geometry)
    }

    /// Release the image and its mask.
    pub fn clear_image(&mut self) {
        self.geometry = None;
        self.raster = None;
    }

    fn raster(&self) -> Result<&RasterMask> {
        match (&self.geometry, &self.raster) {
            (None, _) => Err(MaskError::NoImageLoaded),
            (Some(_), None) => Err(MaskError::NoMaskAllocated),
            (Some(_), Some(raster)) => Ok(raster),
        }
    }

    fn raster_mut(&mut self) -> Result<&mut RasterMask> {
        match (&self.geometry, &mut self.raster) {
            (None, _) => Err(MaskError::NoImageLoaded),
            (Some(_), None) => Err(MaskError::NoMaskAllocated),
            (Some(_), Some(raster)) => Ok(raster),
        }
    }

    /// Clamp a rectangle to the buffer. `None` when nothing remains.
    pub fn resolve(&self, bbox: &MaskRect) -> Result<Option<PixelRegion>> {
        let raster = self.raster()?;
        if !bbox.is_finite() {
            return Ok(None);
        }
        let (x0, y0, x1, y1) = bbox.outer_bounds();
        let x0 = x0.clamp(0, raster.width as i64);
        let y0 = y0.clamp(0, raster.height as i64);
        let x1 = x1.clamp(0, raster.width as i64);
        let y1 = y1.clamp(0, raster.height as i64);
        if x1 <= x0 || y1 <= y0 {
            return Ok(None);
        }
        Ok(Some(PixelRegion::new(
            x0 as u32,
            y0 as u32,
            (x1 - x0) as u32,
            (y1 - y0) as u32,
        )))
    }

    /// Copy of the pixels under `bbox`, empty if it misses the buffer.
    pub fn read_region(&self, bbox: &MaskRect) -> Result<Vec<u8>> {
        match self.resolve(bbox)? {
            Some(region) => self.read_pixels(region),
            None => Ok(Vec::new()),
        }
    }

    pub fn read_pixels(&self, region: PixelRegion) -> Result<Vec<u8>> {
        let raster = self.raster()?;
        check_inside(raster, region)?;
        let mut out = Vec::with_capacity(region.area());
        for y in region.y..region.bottom() {
            let start = raster.index(region.x, y);
            out.extend_from_slice(&raster.data[start..start + region.width as usize]);
        }
        Ok(out)
    }

    /// Inverse of [`MaskStore::read_region`] for the same rectangle.
    pub fn write_region(&mut self, bbox: &MaskRect, bytes: &[u8]) -> Result<Option<PixelRegion>> {
        let region = self.resolve(bbox)?;
        let expected = region.map_or(0, |r| r.area());
        if bytes.len() != expected {
            return Err(MaskError::InvalidPatchSize {
                expected,
                actual: bytes.len(),
            });
        }
        match region {
            Some(region) => {
                self.write_pixels(region, bytes)?;
                Ok(Some(region))
            }
            None => Ok(None),
        }
    }

    pub fn write_pixels(&mut self, region: PixelRegion, bytes: &[u8]) -> Result<()> {
        if bytes.len() != region.area() {
            return Err(MaskError::InvalidPatchSize {
                expected: region.area(),
                actual: bytes.len(),
            });
        }
        if let Some(&bad) = bytes.iter().find(|&&v| v > MAX_CLASSES) {
            return Err(MaskError::InvalidClass(bad));
        }
        let raster = self.raster_mut()?;
        check_inside(raster, region)?;
        let row_len = region.width as usize;
        for (row, y) in (region.y..region.bottom()).enumerate() {
            let start = raster.index(region.x, y);
            raster.data[start..start + row_len]
                .copy_from_slice(&bytes[row * row_len..(row + 1) * row_len]);
        }
        Ok(())
    }

    /// Pixels a stamp would touch, without writing anything.
    pub fn stamp_region(&self, center: [f32; 2], radius: f32) -> Result<Option<PixelRegion>> {
        self.resolve(&MaskRect::around(center, radius.max(0.0)))
    }

    /// Set every pixel within `radius` (inclusive) of `center` to `value`.
    /// Value 0 erases.
    pub fn stamp(&mut self, center: [f32; 2], radius: f32, value: u8) -> Result<Option<PixelRegion>> {
        check_class(value)?;
        let radius = radius.max(0.0);
        let Some(region) = self.stamp_region(center, radius)? else {
            return Ok(None);
        };
        let raster = self.raster_mut()?;
        let r2 = radius * radius;
        for y in region.y..region.bottom() {
            let dy = y as f32 - center[1];
            for x in region.x..region.right() {
                let dx = x as f32 - center[0];
                if dx * dx + dy * dy <= r2 {
                    let idx = raster.index(x, y);
                    raster.data[idx] = value;
                }
            }
        }
        Ok(Some(region))
    }

    /// Zero the whole buffer, keeping its dimensions.
    pub fn clear(&mut self) -> Result<()> {
        self.raster_mut()?.data.fill(0);
        Ok(())
    }

    pub fn read_full(&self) -> Result<Vec<u8>> {
        Ok(self.raster()?.data.clone())
    }

    /// Replace the whole buffer with a snapshot of the same dimensions.
    pub fn restore_full(&mut self, bytes: &[u8]) -> Result<()> {
        let geometry = self.geometry.ok_or(MaskError::NoImageLoaded)?;
        self.write_pixels(geometry.full_region(), bytes)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Result<Option<u8>> {
        let raster = self.raster()?;
        if x >= raster.width || y >= raster.height {
            return Ok(None);
        }
        Ok(Some(raster.data[raster.index(x, y)]))
    }

    /// Binary (0/1) layer of one raster value.
    pub fn binary_layer(&self, value: u8) -> Result<GrayImage> {
        let raster = self.raster()?;
        let data = raster.data.iter().map(|&v| u8::from(v == value)).collect();
        GrayImage::from_raw(raster.width, raster.height, data).ok_or(MaskError::InvalidPatchSize {
            expected: raster.data.len(),
            actual: 0,
        })
    }

    /// Number of pixels per raster value, indexed by value.
    pub fn histogram(&self) -> Result<[usize; MAX_CLASSES as usize + 1]> {
        let mut counts = [0usize; MAX_CLASSES as usize + 1];
        for &v in &self.raster()?.data {
            counts[v as usize] += 1;
        }
        Ok(counts)
    }

    /// Collect the 4-connected run of equal value containing `seed`.
    ///
    /// Returns `None` when the seed is outside the buffer or already holds
    /// `value`.
    pub fn plan_fill(&self, seed: [u32; 2], value: u8) -> Result<Option<FillPlan>> {
        check_class(value)?;
        let raster = self.raster()?;
        let [sx, sy] = seed;
        if sx >= raster.width || sy >= raster.height {
            return Ok(None);
        }
        let original_value = raster.data[raster.index(sx, sy)];
        if original_value == value {
            return Ok(None);
        }

        let (w, h) = (raster.width as usize, raster.height as usize);
        let mut seen = vec![false; w * h];
        let mut queue = VecDeque::from([raster.index(sx, sy)]);
        seen[raster.index(sx, sy)] = true;
        let mut pixels = Vec::new();
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx as usize, sy as usize, sx as usize, sy as usize);

        while let Some(idx) = queue.pop_front() {
            pixels.push(idx);
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);

            let neighbors = [
                (x > 0).then(|| idx - 1),
                (x + 1 < w).then(|| idx + 1),
                (y > 0).then(|| idx - w),
                (y + 1 < h).then(|| idx + w),
            ];
            for n in neighbors.into_iter().flatten() {
                if !seen[n] && raster.data[n] == original_value {
                    seen[n] = true;
                    queue.push_back(n);
                }
            }
        }

        Ok(Some(FillPlan {
            bounds: PixelRegion::new(
                min_x as u32,
                min_y as u32,
                (max_x - min_x + 1) as u32,
                (max_y - min_y + 1) as u32,
            ),
            original_value,
            pixels,
        }))
    }

    pub fn apply_fill(&mut self, plan: &FillPlan, value: u8) -> Result<PixelRegion> {
        check_class(value)?;
        let raster = self.raster_mut()?;
        for &idx in &plan.pixels {
            if let Some(pixel) = raster.data.get_mut(idx) {
                *pixel = value;
            }
        }
        Ok(plan.bounds)
    }

    /// Median-filter one class layer with a 3x3 window.
    ///
    /// Pixels that leave the class become unlabeled; pixels that join it are
    /// taken over regardless of their previous class. Returns the number of
    /// changed pixels.
    pub fn smooth_class(&mut self, value: u8) -> Result<usize> {
        check_class(value)?;
        if value == 0 {
            return Ok(0);
        }
        let layer = self.binary_layer(value)?;
        let smoothed = imageproc::filter::median_filter(&layer, 1, 1);
        let raster = self.raster_mut()?;
        let mut changed = 0;
        for (pixel, (&Luma([before]), &Luma([after]))) in raster
            .data
            .iter_mut()
            .zip(layer.pixels().zip(smoothed.pixels()))
        {
            if before != after {
                *pixel = if after != 0 { value } else { 0 };
                changed += 1;
            }
        }
        debug!(class = value, changed, "smoothed class layer");
        Ok(changed)
    }

    /// Overwrite the raster with an imported annotation.
    ///
    /// Each binary mask is sampled nearest-neighbor into mask resolution and
    /// written as `class id + 1`.
    pub fn populate(&mut self, parsed: &ParsedAnnotation) -> Result<()> {
        let geometry = self.geometry.ok_or(MaskError::NoImageLoaded)?;
        if (parsed.width, parsed.height) != (geometry.image_width, geometry.image_height) {
            return Err(MaskError::DimensionMismatch {
                expected: (geometry.image_width, geometry.image_height),
                actual: (parsed.width, parsed.height),
            });
        }
        for class in &parsed.classes {
            check_class(class.raster_value())?;
        }
        for mask in parsed.masks.values() {
            if mask.dimensions() != (parsed.width, parsed.height) {
                return Err(MaskError::DimensionMismatch {
                    expected: (parsed.width, parsed.height),
                    actual: mask.dimensions(),
                });
            }
        }

        let src_x: Vec<u32> = (0..geometry.mask_width)
            .map(|mx| ((mx as f64 / geometry.mask_scale) as u32).min(parsed.width - 1))
            .collect();
        let src_y: Vec<u32> = (0..geometry.mask_height)
            .map(|my| ((my as f64 / geometry.mask_scale) as u32).min(parsed.height - 1))
            .collect();

        let raster = self.raster_mut()?;
        raster.data.fill(0);
        for class in &parsed.classes {
            let Some(mask) = parsed.masks.get(&class.id) else {
                continue;
            };
            let value = class.raster_value();
            for (my, &sy) in src_y.iter().enumerate() {
                let row = my * raster.width as usize;
                for (mx, &sx) in src_x.iter().enumerate() {
                    if mask.get_pixel(sx, sy)[0] != 0 {
                        raster.data[row + mx] = value;
                    }
                }
            }
        }
        info!(classes = parsed.classes.len(), "populated mask from annotation");
        Ok(())
    }
}
