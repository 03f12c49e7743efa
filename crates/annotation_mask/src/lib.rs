//! # Annotation Mask Engine
//!
//! Core of an image-annotation tool: a per-pixel class mask edited through
//! view gestures, with bounded undo history, color-annotation import and
//! polygon export.
//!
//! ## Core Features
//!
//! - **View Transform**: pan, pivot-preserving zoom and rotation between screen,
//!   image and mask coordinates, with non-finite input guarded everywhere
//! - **Mask Store**: one byte per mask pixel (0 = unlabeled, 1..=8 = class),
//!   at up to twice the image resolution and at most 4096 px on the long axis
//! - **Undo Log**: region patches rather than snapshots, under a byte budget
//! - **Color Import**: quantize a hand-drawn color image into up to 8 classes
//! - **Contour Export**: trait-based pipeline from class layers to simplified
//!   polygons in image coordinates
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use annotation_mask::{EditorCommand, MaskEditor};
//!
//! let mut editor = MaskEditor::default();
//! editor.execute(EditorCommand::LoadImage { width: 640, height: 480 })?;
//!
//! editor.execute(EditorCommand::BeginStroke {
//!     x: 100.0, y: 100.0, radius: 8.0, class_id: 0, erase: false,
//! })?;
//! editor.execute(EditorCommand::ContinueStroke { x: 180.0, y: 140.0 })?;
//! editor.execute(EditorCommand::EndStroke)?;
//!
//! let outline = editor.export_contours(1.0)?;
//! outline.save_json("outline.json")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Importing a Color Annotation
//!
//! ```rust,no_run
//! use annotation_mask::MaskEditor;
//!
//! let annotation = image::open("annotation.png")?;
//! let mut editor = MaskEditor::default();
//! editor.load_image(annotation.width(), annotation.height())?;
//! let parsed = editor.import_color_annotation(&annotation)?;
//! println!("{} classes", parsed.classes.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod config;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod transform;
pub mod store;
pub mod history;
pub mod editor;

// Re-exports for convenience
pub use error::{MaskError, Result};
pub use config::{MaskConfig, UndoBudget};
pub use types::*;
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{ContourPipeline, builder::ContourPipelineBuilder};
pub use transform::ViewTransform;
pub use store::MaskStore;
pub use history::{EditCapture, UndoAction, UndoLog};
pub use editor::{EditorCommand, MaskEditor};
