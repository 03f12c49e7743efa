use thiserror::Error;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("Failed to load image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("No image loaded")]
    NoImageLoaded,

    #[error("Image is loaded but no mask has been allocated")]
    NoMaskAllocated,

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Could not load image: failed to allocate a {width}x{height} mask")]
    AllocationFailed { width: u32, height: u32 },

    #[error("Invalid patch size: expected {expected} bytes, got {actual}")]
    InvalidPatchSize { expected: usize, actual: usize },

    #[error("Invalid class value {0} (maximum is {max})", max = crate::config::MAX_CLASSES)]
    InvalidClass(u8),

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("No stroke in progress")]
    NoActiveStroke,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaskError {
    /// History conditions that callers should treat as a disabled action
    /// rather than a failure.
    pub fn is_noop(&self) -> bool {
        matches!(
            self,
            Self::NothingToUndo | Self::NothingToRedo | Self::NoActiveStroke
        )
    }
}

pub type Result<T> = std::result::Result<T, MaskError>;
