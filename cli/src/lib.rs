use annotation_mask::{EditorCommand, MaskConfig, MaskEditor, MaskError};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    TomlDeError(#[from] toml::de::Error),
    #[error(transparent)]
    TomlSerError(#[from] toml::ser::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    MaskError(#[from] MaskError),
    #[error("Command {index} ({command}) failed: {source}")]
    CommandFailed {
        index: usize,
        command: String,
        source: MaskError,
    },
    #[error("Unsupported file format. Please use .toml or .json files")]
    UnsupportedFileFormat,
}

/// On-disk form of the engine configuration.
pub struct ConfigFile;

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<MaskConfig, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<MaskConfig, CliError> {
        let config: MaskConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<MaskConfig, CliError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<MaskConfig, CliError> {
        let config: MaskConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<MaskConfig, CliError> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(CliError::UnsupportedFileFormat),
        }
    }

    /// Convert configuration to TOML string
    pub fn to_toml(config: &MaskConfig) -> Result<String, CliError> {
        Ok(toml::to_string_pretty(config)?)
    }
}

/// Load a JSON array of editor commands
pub fn load_commands<P: AsRef<Path>>(path: P) -> Result<Vec<EditorCommand>, CliError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Snapshot of a session after import or replay
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SessionSummary {
    pub image_width: u32,
    pub image_height: u32,
    pub mask_width: u32,
    pub mask_height: u32,
    pub mask_scale: f64,
    /// Labeled mask pixels per class id
    pub class_pixels: BTreeMap<u8, usize>,
    pub unlabeled_pixels: usize,
    pub undo_steps: usize,
    pub redo_steps: usize,
    pub history_bytes: usize,
}

impl SessionSummary {
    pub fn from_editor(editor: &MaskEditor) -> Result<Self, CliError> {
        let geometry = editor.geometry().ok_or(MaskError::NoImageLoaded)?;
        let histogram = editor.store().histogram()?;
        let class_pixels = histogram
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, count)| **count > 0)
            .map(|(value, count)| ((value - 1) as u8, *count))
            .collect();
        let history = editor.history();
        Ok(Self {
            image_width: geometry.image_width,
            image_height: geometry.image_height,
            mask_width: geometry.mask_width,
            mask_height: geometry.mask_height,
            mask_scale: geometry.mask_scale,
            class_pixels,
            unlabeled_pixels: histogram[0],
            undo_steps: history.undo_len(),
            redo_steps: history.redo_len(),
            history_bytes: history.memory_usage(),
        })
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(&self)?)
    }
}

/// Run commands against a fresh session on a `width`×`height` image.
///
/// Empty-history undo/redo and stray stroke ends are skipped with a warning;
/// any other failure stops the replay.
pub fn replay(
    config: MaskConfig,
    width: u32,
    height: u32,
    commands: Vec<EditorCommand>,
) -> Result<MaskEditor, CliError> {
    let mut editor = MaskEditor::new(config)?;
    editor.load_image(width, height)?;

    for (index, command) in commands.into_iter().enumerate() {
        let name = command.to_string();
        match editor.execute(command) {
            Ok(dirty) => debug!(index, command = %name, ?dirty, "applied"),
            Err(err) if err.is_noop() => warn!(index, command = %name, "skipped: {err}"),
            Err(source) => {
                return Err(CliError::CommandFailed {
                    index,
                    command: name,
                    source,
                })
            }
        }
    }

    Ok(editor)
}
