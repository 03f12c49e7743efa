use geo_types::Coord;
use image::DynamicImage;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr, VariantNames};
use tracing::{debug, info};

use crate::{
    algorithms::ColorMaskParser,
    config::{MaskConfig, MAX_CLASSES},
    error::{MaskError, Result},
    history::{EditCapture, UndoLog},
    pipeline::{builder::ContourPipelineBuilder, ContourPipeline},
    store::MaskStore,
    transform::ViewTransform,
    types::{ClassOutline, ClassPalette, ComputedOutline, MaskGeometry, ParsedAnnotation, PixelRegion},
};

#[derive(
    Debug, Clone,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, EnumIter, VariantNames, IntoStaticStr,
    PartialEq
)]
#[serde(tag = "type", content = "params")]
#[strum(serialize_all = "snake_case")]
pub enum EditorCommand {
    /// Open an image and allocate a blank mask for it
    #[serde(rename = "load_image")]
    LoadImage {
        #[schemars(range(min = 1))]
        width: u32,
        #[schemars(range(min = 1))]
        height: u32,
    },

    /// Close the image and release its mask
    #[serde(rename = "clear_image")]
    ClearImage,

    /// Move the view by a screen-space delta
    #[serde(rename = "pan")]
    Pan { dx: f64, dy: f64 },

    /// Zoom around a screen point
    #[serde(rename = "pinch")]
    Pinch {
        #[schemars(range(min = 0.0))]
        scale_factor: f64,
        center_x: f64,
        center_y: f64,
    },

    /// Rotate around a screen point (radians)
    #[serde(rename = "rotate")]
    Rotate {
        angle: f64,
        center_x: f64,
        center_y: f64,
    },

    /// Center and scale the image inside a view of the given size
    #[serde(rename = "fit_to_view")]
    FitToView { view_width: f64, view_height: f64 },

    /// Start a freehand stroke at a screen point
    #[serde(rename = "begin_stroke")]
    BeginStroke {
        x: f64,
        y: f64,
        #[schemars(range(min = 0.0))]
        radius: f64,
        #[schemars(range(min = 0, max = 7))]
        class_id: u8,
        #[serde(default)]
        erase: bool,
    },

    /// Extend the open stroke to a screen point
    #[serde(rename = "continue_stroke")]
    ContinueStroke { x: f64, y: f64 },

    /// Finish the open stroke as one undoable edit
    #[serde(rename = "end_stroke")]
    EndStroke,

    /// Flood-fill the region under a screen point
    #[serde(rename = "fill")]
    Fill {
        x: f64,
        y: f64,
        #[schemars(range(min = 0, max = 7))]
        class_id: u8,
    },

    /// Median-smooth one class layer
    #[serde(rename = "smooth")]
    Smooth {
        #[schemars(range(min = 0, max = 7))]
        class_id: u8,
    },

    /// Erase every label
    #[serde(rename = "clear_mask")]
    ClearMask,

    #[serde(rename = "undo")]
    Undo,

    #[serde(rename = "redo")]
    Redo,
}

impl EditorCommand {
    /// Get the JSON schema for all commands
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(EditorCommand)
    }

    /// Get a list of all available command names
    pub fn command_names() -> &'static [&'static str] {
        <Self as VariantNames>::VARIANTS
    }

    /// Commands that change mask pixels and therefore touch history.
    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            Self::BeginStroke { .. }
                | Self::ContinueStroke { .. }
                | Self::EndStroke
                | Self::Fill { .. }
                | Self::Smooth { .. }
                | Self::ClearMask
                | Self::Undo
                | Self::Redo
        )
    }

    /// Get a description of the command
    pub fn description(&self) -> &'static str {
        match self {
            Self::LoadImage { .. } => "Open an image of the given size and allocate a blank mask",
            Self::ClearImage => "Close the current image and release its mask",
            Self::Pan { .. } => "Translate the view by a screen-space delta",
            Self::Pinch { .. } => "Zoom the view around a screen point, clamped to the scale bounds",
            Self::Rotate { .. } => "Rotate the view around a screen point",
            Self::FitToView { .. } => "Center the image in the view at the largest scale that fits",
            Self::BeginStroke { .. } => "Start painting (or erasing) a freehand stroke",
            Self::ContinueStroke { .. } => "Extend the open stroke with gap-free interpolation",
            Self::EndStroke => "Commit the open stroke as a single undo step",
            Self::Fill { .. } => "Flood-fill the 4-connected region under a point with a class",
            Self::Smooth { .. } => "Remove speckle from a class with a 3x3 median filter",
            Self::ClearMask => "Erase every label in the mask",
            Self::Undo => "Revert the most recent edit",
            Self::Redo => "Reapply the most recently reverted edit",
        }
    }
}

#[derive(Debug, Clone)]
struct StrokeState {
    capture: EditCapture,
    /// Last stamp center in mask coordinates
    last: Coord<f64>,
    radius: f32,
    value: u8,
}

/// Raster value painted by a class id, or 0 when erasing.
fn paint_value(class_id: u8, erase: bool) -> Result<u8> {
    if class_id >= MAX_CLASSES {
        return Err(MaskError::InvalidClass(class_id));
    }
    Ok(if erase { 0 } else { class_id + 1 })
}

fn merge(dirty: Option<PixelRegion>, region: Option<PixelRegion>) -> Option<PixelRegion> {
    match (dirty, region) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    }
}

/// Parameter range of the segment `from → to` that lies inside `[min, max]`
/// on both axes (Liang-Barsky), or `None` when the segment misses the box.
fn clip_segment(from: Coord<f64>, to: Coord<f64>, min: Coord<f64>, max: Coord<f64>) -> Option<(f64, f64)> {
    let d = to - from;
    if !(d.x.is_finite() && d.y.is_finite()) {
        return None;
    }
    let mut t0 = 0.0f64;
    let mut t1 = 1.0f64;
    for (p, q) in [
        (-d.x, from.x - min.x),
        (d.x, max.x - from.x),
        (-d.y, from.y - min.y),
        (d.y, max.y - from.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    (t0 <= t1).then_some((t0, t1))
}

/// Stamp once, capturing the before-state of every pixel the stamp covers.
fn stamp_captured(store: &mut MaskStore, stroke: &mut StrokeState, center: [f32; 2]) -> Result<Option<PixelRegion>> {
    let Some(region) = store.stamp_region(center, stroke.radius)? else {
        return Ok(None);
    };
    let margin = (stroke.radius * 4.0).ceil().max(8.0) as u32;
    stroke.capture.cover(store, region, margin)?;
    store.stamp(center, stroke.radius, stroke.value)
}

/// An editing session over one image: view, mask, history and palette.
///
/// Every user action arrives as an [`EditorCommand`]; [`MaskEditor::execute`]
/// returns the mask region that needs redrawing.
#[derive(Debug, Clone)]
pub struct MaskEditor {
    config: MaskConfig,
    store: MaskStore,
    transform: ViewTransform,
    history: UndoLog,
    palette: ClassPalette,
    stroke: Option<StrokeState>,
}

impl Default for MaskEditor {
    fn default() -> Self {
        Self::build(MaskConfig::default())
    }
}

impl MaskEditor {
    pub fn new(config: MaskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MaskConfig) -> Self {
        Self {
            store: MaskStore::new(config.clone()),
            transform: ViewTransform::new(&config),
            history: UndoLog::new(config.undo),
            palette: ClassPalette::default(),
            stroke: None,
            config,
        }
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    pub fn store(&self) -> &MaskStore {
        &self.store
    }

    pub fn transform(&self) -> &ViewTransform {
        &self.transform
    }

    pub fn history(&self) -> &UndoLog {
        &self.history
    }

    pub fn palette(&self) -> &ClassPalette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: ClassPalette) {
        self.palette = palette;
    }

    pub fn geometry(&self) -> Option<MaskGeometry> {
        self.store.geometry()
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn execute(&mut self, command: EditorCommand) -> Result<Option<PixelRegion>> {
        let name: &'static str = (&command).into();
        debug!(command = name, edit = command.is_edit(), "executing editor command");

        match command {
            EditorCommand::LoadImage { width, height } => self.load_image(width, height).map(Some),
            EditorCommand::ClearImage => {
                self.clear_image();
                Ok(None)
            }
            EditorCommand::Pan { dx, dy } => {
                self.transform.apply_pan(Coord { x: dx, y: dy });
                Ok(None)
            }
            EditorCommand::Pinch {
                scale_factor,
                center_x,
                center_y,
            } => {
                self.transform
                    .apply_pinch(scale_factor, Coord { x: center_x, y: center_y });
                Ok(None)
            }
            EditorCommand::Rotate {
                angle,
                center_x,
                center_y,
            } => {
                self.transform
                    .apply_rotation(angle, Coord { x: center_x, y: center_y });
                Ok(None)
            }
            EditorCommand::FitToView {
                view_width,
                view_height,
            } => {
                let geometry = self.store.geometry().ok_or(MaskError::NoImageLoaded)?;
                self.transform.fit_to_view(
                    [geometry.image_width as f64, geometry.image_height as f64],
                    [view_width, view_height],
                );
                Ok(None)
            }
            EditorCommand::BeginStroke {
                x,
                y,
                radius,
                class_id,
                erase,
            } => self.begin_stroke(Coord { x, y }, radius, class_id, erase),
            EditorCommand::ContinueStroke { x, y } => self.continue_stroke(Coord { x, y }),
            EditorCommand::EndStroke => self.end_stroke().map(|_| None),
            EditorCommand::Fill { x, y, class_id } => self.fill(Coord { x, y }, class_id),
            EditorCommand::Smooth { class_id } => self.smooth(class_id),
            EditorCommand::ClearMask => self.clear_mask(),
            EditorCommand::Undo => self.undo(),
            EditorCommand::Redo => self.redo(),
        }
    }

    /// Open a new image. Drops the open stroke and all history.
    pub fn load_image(&mut self, width: u32, height: u32) -> Result<PixelRegion> {
        let geometry = self.store.load_image(width, height)?;
        self.transform.reset();
        self.transform.set_mask_scale(geometry.mask_scale);
        self.history.clear();
        self.stroke = None;
        Ok(geometry.full_region())
    }

    pub fn clear_image(&mut self) {
        self.store.clear_image();
        self.transform.reset();
        self.history.clear();
        self.stroke = None;
    }

    fn screen_to_mask(&self, point: Coord<f64>) -> [f32; 2] {
        let mask = self.transform.screen_to_mask(point);
        [mask.x as f32, mask.y as f32]
    }

    /// Start a stroke, ending any stroke still open.
    pub fn begin_stroke(
        &mut self,
        point: Coord<f64>,
        radius: f64,
        class_id: u8,
        erase: bool,
    ) -> Result<Option<PixelRegion>> {
        let value = paint_value(class_id, erase)?;
        self.store.ensure_mask()?;
        if self.stroke.is_some() {
            self.end_stroke()?;
        }

        let last = self.transform.screen_to_mask(point);
        let center = [last.x as f32, last.y as f32];
        let radius = self.transform.screen_radius_to_mask(radius.max(0.0)) as f32;
        let mut stroke = StrokeState {
            capture: EditCapture::new(if erase { 0 } else { class_id }),
            last,
            radius: if radius.is_finite() { radius } else { 0.0 },
            value,
        };
        let dirty = stamp_captured(&mut self.store, &mut stroke, center)?;
        self.stroke = Some(stroke);
        Ok(dirty)
    }

    /// Extend the open stroke, stamping at most `max(1, radius / 2)` mask
    /// pixels apart. Only the part of the segment within reach of the mask is
    /// stamped, so the work is bounded by the mask size.
    pub fn continue_stroke(&mut self, point: Coord<f64>) -> Result<Option<PixelRegion>> {
        let target = self.transform.screen_to_mask(point);
        let stroke = self.stroke.as_mut().ok_or(MaskError::NoActiveStroke)?;
        let geometry = self.store.geometry().ok_or(MaskError::NoImageLoaded)?;
        let from = std::mem::replace(&mut stroke.last, target);

        let reach = f64::from(stroke.radius) + 1.0;
        let min = Coord { x: -reach, y: -reach };
        let max = Coord {
            x: f64::from(geometry.mask_width) + reach,
            y: f64::from(geometry.mask_height) + reach,
        };
        let Some((t0, t1)) = clip_segment(from, target, min, max) else {
            return Ok(None);
        };
        let start = from + (target - from) * t0;
        let end = from + (target - from) * t1;

        let delta = end - start;
        let distance = delta.x.hypot(delta.y);
        let spacing = f64::from((stroke.radius / 2.0).max(1.0));
        let steps = (distance / spacing).ceil().max(1.0) as usize;
        // a clipped entry point has not been stamped yet
        let first = if t0 > 0.0 { 0 } else { 1 };

        let mut dirty = None;
        for step in first..=steps {
            let center = start + delta * (step as f64 / steps as f64);
            let center = [center.x as f32, center.y as f32];
            dirty = merge(dirty, stamp_captured(&mut self.store, stroke, center)?);
        }
        Ok(dirty)
    }

    /// Commit the open stroke. Returns whether an undo entry was recorded.
    pub fn end_stroke(&mut self) -> Result<bool> {
        let stroke = self.stroke.take().ok_or(MaskError::NoActiveStroke)?;
        match stroke.capture.into_action() {
            Some(action) => {
                self.history.commit(action);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close an open stroke so history operations see it as one edit.
    fn settle_stroke(&mut self) {
        if let Some(stroke) = self.stroke.take() {
            if let Some(action) = stroke.capture.into_action() {
                self.history.commit(action);
            }
        }
    }

    pub fn fill(&mut self, point: Coord<f64>, class_id: u8) -> Result<Option<PixelRegion>> {
        let value = paint_value(class_id, false)?;
        self.store.ensure_mask()?;
        self.settle_stroke();

        let [x, y] = self.screen_to_mask(point);
        if x < 0.0 || y < 0.0 {
            return Ok(None);
        }
        let Some(plan) = self.store.plan_fill([x as u32, y as u32], value)? else {
            return Ok(None);
        };
        let action = self.history.begin_edit(&self.store, plan.bounds.into(), class_id)?;
        let region = self.store.apply_fill(&plan, value)?;
        self.history.commit(action);
        debug!(pixels = plan.pixel_count(), class = class_id, "filled region");
        Ok(Some(region))
    }

    pub fn smooth(&mut self, class_id: u8) -> Result<Option<PixelRegion>> {
        let value = paint_value(class_id, false)?;
        let geometry = self.store.ensure_mask()?;
        self.settle_stroke();

        let region = geometry.full_region();
        let action = self.history.begin_edit(&self.store, region.into(), class_id)?;
        if self.store.smooth_class(value)? == 0 {
            return Ok(None);
        }
        self.history.commit(action);
        Ok(Some(region))
    }

    pub fn clear_mask(&mut self) -> Result<Option<PixelRegion>> {
        let geometry = self.store.ensure_mask()?;
        self.settle_stroke();

        let region = geometry.full_region();
        let action = self.history.begin_edit(&self.store, region.into(), 0)?;
        self.store.clear()?;
        self.history.commit(action);
        Ok(Some(region))
    }

    pub fn undo(&mut self) -> Result<Option<PixelRegion>> {
        self.settle_stroke();
        let bbox = self.history.undo(&mut self.store)?;
        self.store.resolve(&bbox)
    }

    pub fn redo(&mut self) -> Result<Option<PixelRegion>> {
        self.settle_stroke();
        let bbox = self.history.redo(&mut self.store)?;
        self.store.resolve(&bbox)
    }

    /// Replace the whole mask with a saved raster. History is reset because
    /// earlier patches no longer describe this content.
    pub fn restore_snapshot(&mut self, bytes: &[u8]) -> Result<()> {
        self.store.ensure_mask()?;
        self.store.restore_full(bytes)?;
        self.history.clear();
        self.stroke = None;
        Ok(())
    }

    /// Populate the mask from a hand-drawn color annotation of the loaded
    /// image. The parsed classes become the palette and history is reset.
    pub fn import_color_annotation(&mut self, image: &DynamicImage) -> Result<ParsedAnnotation> {
        let parsed = ColorMaskParser::from_config(&self.config).parse_dynamic(image);
        self.import_parsed(&parsed)?;
        Ok(parsed)
    }

    pub fn import_parsed(&mut self, parsed: &ParsedAnnotation) -> Result<()> {
        self.store.ensure_mask()?;
        self.store.populate(parsed)?;
        if !parsed.classes.is_empty() {
            self.palette = ClassPalette::from_classes(parsed.classes.clone());
        }
        self.history.clear();
        self.stroke = None;
        info!(classes = parsed.classes.len(), "imported color annotation");
        Ok(())
    }

    /// Per-class contours in image coordinates.
    pub fn export_contours(&self, epsilon: f32) -> Result<ComputedOutline> {
        self.export_contours_with(&ContourPipelineBuilder::build_default(epsilon))
    }

    pub fn export_contours_with(&self, pipeline: &ContourPipeline) -> Result<ComputedOutline> {
        let geometry = self.store.geometry().ok_or(MaskError::NoImageLoaded)?;
        let histogram = self.store.histogram()?;

        let mut classes = Vec::new();
        for value in 1..=MAX_CLASSES {
            if histogram[value as usize] == 0 {
                continue;
            }
            let layer = self.store.binary_layer(value)?;
            let contours = pipeline.process(&layer, geometry.mask_scale)?;
            if contours.is_empty() {
                continue;
            }
            let class_id = value - 1;
            classes.push(ClassOutline {
                class_id,
                color: self.palette.get(class_id).map(|class| class.color),
                contours,
            });
        }

        let outline = ComputedOutline {
            classes,
            image_width: geometry.image_width,
            image_height: geometry.image_height,
        };
        debug!(contours = outline.contour_count(), "exported contours");
        Ok(outline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with_image(width: u32, height: u32) -> MaskEditor {
        let mut editor = MaskEditor::default();
        editor
            .execute(EditorCommand::LoadImage { width, height })
            .unwrap();
        editor
    }

    fn pixel(editor: &MaskEditor, x: u32, y: u32) -> u8 {
        editor.store().pixel(x, y).unwrap().unwrap()
    }

    #[test]
    fn test_load_image_sets_mask_scale() {
        let editor = editor_with_image(50, 40);
        let geometry = editor.geometry().unwrap();
        assert_eq!((geometry.mask_width, geometry.mask_height), (100, 80));
        assert_eq!(editor.transform().mask_scale(), 2.0);
    }

    #[test]
    fn test_stroke_interpolation_leaves_no_gaps() {
        let mut editor = editor_with_image(50, 50);
        editor
            .execute(EditorCommand::BeginStroke {
                x: 5.0,
                y: 10.0,
                radius: 1.0,
                class_id: 0,
                erase: false,
            })
            .unwrap();
        let dirty = editor
            .execute(EditorCommand::ContinueStroke { x: 40.0, y: 10.0 })
            .unwrap()
            .unwrap();
        assert!(dirty.x <= 12 && dirty.right() >= 82);

        for x in 10..=80 {
            assert_eq!(pixel(&editor, x, 20), 1, "gap at x = {x}");
        }
        assert_eq!(pixel(&editor, 45, 22), 1);
        assert_eq!(pixel(&editor, 45, 23), 0);
    }

    #[test]
    fn test_far_off_stroke_point_paints_to_edge() {
        let mut editor = editor_with_image(10, 10);
        editor
            .execute(EditorCommand::BeginStroke {
                x: 5.0,
                y: 5.0,
                radius: 1.0,
                class_id: 0,
                erase: false,
            })
            .unwrap();
        let dirty = editor
            .execute(EditorCommand::ContinueStroke { x: 1e12, y: 5.0 })
            .unwrap()
            .unwrap();
        assert_eq!(dirty.right(), 20);
        for x in 10..20 {
            assert_eq!(pixel(&editor, x, 10), 1, "gap at x = {x}");
        }
        assert_eq!(pixel(&editor, 19, 13), 0);

        // beyond f32 range, and a segment that never reaches the mask
        editor
            .execute(EditorCommand::ContinueStroke { x: 1e40, y: 1e40 })
            .unwrap();
        let outside = editor
            .execute(EditorCommand::ContinueStroke { x: -1e30, y: 1e40 })
            .unwrap();
        assert!(outside.is_none());

        // coming back from far away enters through the edge
        editor
            .execute(EditorCommand::ContinueStroke { x: 1e12, y: 2.0 })
            .unwrap();
        let back = editor
            .execute(EditorCommand::ContinueStroke { x: 2.0, y: 2.0 })
            .unwrap()
            .unwrap();
        assert_eq!(back.right(), 20);
        assert_eq!(pixel(&editor, 4, 4), 1);
        assert_eq!(pixel(&editor, 19, 4), 1);

        editor.execute(EditorCommand::EndStroke).unwrap();
        assert_eq!(editor.history().undo_len(), 1);
    }

    #[test]
    fn test_clip_segment() {
        let min = Coord { x: 0.0, y: 0.0 };
        let max = Coord { x: 10.0, y: 10.0 };
        let inside = clip_segment(Coord { x: 1.0, y: 1.0 }, Coord { x: 9.0, y: 9.0 }, min, max);
        assert_eq!(inside, Some((0.0, 1.0)));

        let (t0, t1) =
            clip_segment(Coord { x: -10.0, y: 5.0 }, Coord { x: 30.0, y: 5.0 }, min, max).unwrap();
        assert_eq!((t0, t1), (0.25, 0.5));

        let miss = clip_segment(Coord { x: -5.0, y: 20.0 }, Coord { x: 20.0, y: 20.0 }, min, max);
        assert_eq!(miss, None);
    }

    #[test]
    fn test_stroke_is_one_undo_step() {
        let mut editor = editor_with_image(50, 50);
        let before = editor.store().read_full().unwrap();
        editor
            .execute(EditorCommand::BeginStroke {
                x: 5.0,
                y: 5.0,
                radius: 2.0,
                class_id: 3,
                erase: false,
            })
            .unwrap();
        for i in 1..10 {
            editor
                .execute(EditorCommand::ContinueStroke {
                    x: 5.0 + 3.0 * i as f64,
                    y: 5.0 + 2.0 * i as f64,
                })
                .unwrap();
        }
        editor.execute(EditorCommand::EndStroke).unwrap();
        assert_eq!(editor.history().undo_len(), 1);

        let painted = editor.store().read_full().unwrap();
        assert!(painted.iter().any(|&v| v == 4));

        editor.execute(EditorCommand::Undo).unwrap();
        assert_eq!(editor.store().read_full().unwrap(), before);
        editor.execute(EditorCommand::Redo).unwrap();
        assert_eq!(editor.store().read_full().unwrap(), painted);
    }

    #[test]
    fn test_new_stroke_ends_open_stroke() {
        let mut editor = editor_with_image(20, 20);
        let begin = |x| EditorCommand::BeginStroke {
            x,
            y: 5.0,
            radius: 1.0,
            class_id: 1,
            erase: false,
        };
        editor.execute(begin(3.0)).unwrap();
        editor.execute(begin(12.0)).unwrap();
        editor.execute(EditorCommand::EndStroke).unwrap();
        assert_eq!(editor.history().undo_len(), 2);
    }

    #[test]
    fn test_erase_stroke_writes_zero() {
        let mut editor = editor_with_image(10, 10);
        editor
            .execute(EditorCommand::Fill { x: 0.0, y: 0.0, class_id: 2 })
            .unwrap();
        editor
            .execute(EditorCommand::BeginStroke {
                x: 5.0,
                y: 5.0,
                radius: 1.0,
                class_id: 0,
                erase: true,
            })
            .unwrap();
        editor.execute(EditorCommand::EndStroke).unwrap();
        assert_eq!(pixel(&editor, 10, 10), 0);
        assert_eq!(pixel(&editor, 0, 0), 3);
    }

    #[test]
    fn test_end_without_stroke_is_noop_error() {
        let mut editor = editor_with_image(10, 10);
        let err = editor.execute(EditorCommand::EndStroke).unwrap_err();
        assert!(matches!(err, MaskError::NoActiveStroke));
        assert!(err.is_noop());
    }

    #[test]
    fn test_fill_and_undo() {
        let mut editor = editor_with_image(10, 10);
        let region = editor
            .execute(EditorCommand::Fill { x: 0.0, y: 0.0, class_id: 2 })
            .unwrap()
            .unwrap();
        assert_eq!(region, PixelRegion::new(0, 0, 20, 20));
        assert_eq!(editor.store().histogram().unwrap()[3], 400);

        // same value again changes nothing and records nothing
        let again = editor
            .execute(EditorCommand::Fill { x: 1.0, y: 1.0, class_id: 2 })
            .unwrap();
        assert!(again.is_none());
        assert_eq!(editor.history().undo_len(), 1);

        editor.execute(EditorCommand::Undo).unwrap();
        assert_eq!(editor.store().histogram().unwrap()[0], 400);
    }

    #[test]
    fn test_invalid_class_is_rejected() {
        let mut editor = editor_with_image(10, 10);
        let err = editor
            .execute(EditorCommand::Fill { x: 0.0, y: 0.0, class_id: 8 })
            .unwrap_err();
        assert!(matches!(err, MaskError::InvalidClass(8)));
    }

    #[test]
    fn test_smooth_removes_speckle() {
        let mut editor = editor_with_image(10, 10);
        let mut raster = vec![0u8; 400];
        for y in 2..8 {
            for x in 2..8 {
                raster[y * 20 + x] = 1;
            }
        }
        raster[15 * 20 + 15] = 1;
        editor.restore_snapshot(&raster).unwrap();

        let region = editor.execute(EditorCommand::Smooth { class_id: 0 }).unwrap();
        assert!(region.is_some());
        assert_eq!(pixel(&editor, 15, 15), 0);
        assert_eq!(pixel(&editor, 5, 5), 1);

        editor.execute(EditorCommand::Undo).unwrap();
        assert_eq!(editor.store().read_full().unwrap(), raster);
    }

    #[test]
    fn test_clear_mask_is_undoable() {
        let mut editor = editor_with_image(10, 10);
        editor
            .execute(EditorCommand::Fill { x: 0.0, y: 0.0, class_id: 0 })
            .unwrap();
        editor.execute(EditorCommand::ClearMask).unwrap();
        assert_eq!(editor.store().histogram().unwrap()[0], 400);
        editor.execute(EditorCommand::Undo).unwrap();
        assert_eq!(editor.store().histogram().unwrap()[1], 400);
    }

    #[test]
    fn test_load_image_resets_history() {
        let mut editor = editor_with_image(10, 10);
        editor
            .execute(EditorCommand::Fill { x: 0.0, y: 0.0, class_id: 0 })
            .unwrap();
        editor
            .execute(EditorCommand::LoadImage { width: 12, height: 12 })
            .unwrap();
        assert!(!editor.history().can_undo());
        assert_eq!(editor.store().histogram().unwrap()[0], 24 * 24);
    }

    #[test]
    fn test_import_requires_matching_dimensions() {
        let mut editor = editor_with_image(10, 10);
        let annotation = DynamicImage::new_rgb8(20, 20);
        let err = editor.import_color_annotation(&annotation).unwrap_err();
        assert!(matches!(err, MaskError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_edits_without_image_fail() {
        let mut editor = MaskEditor::default();
        let err = editor
            .execute(EditorCommand::Fill { x: 0.0, y: 0.0, class_id: 0 })
            .unwrap_err();
        assert!(matches!(err, MaskError::NoImageLoaded));
        assert!(editor.execute(EditorCommand::Pan { dx: 1.0, dy: 1.0 }).is_ok());
    }

    #[test]
    fn test_command_json_shape() {
        let command: EditorCommand =
            serde_json::from_str(r#"{"type":"fill","params":{"x":1.5,"y":2.0,"class_id":3}}"#).unwrap();
        assert_eq!(command, EditorCommand::Fill { x: 1.5, y: 2.0, class_id: 3 });

        let undo = serde_json::to_string(&EditorCommand::Undo).unwrap();
        assert_eq!(undo, r#"{"type":"undo"}"#);
        assert_eq!(EditorCommand::Undo.to_string(), "undo");
        assert!(EditorCommand::command_names().contains(&"begin_stroke"));
    }
}
