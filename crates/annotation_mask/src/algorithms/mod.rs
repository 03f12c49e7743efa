pub mod extraction;
pub mod quantization;
pub mod simplification;

pub use extraction::*;
pub use quantization::*;
pub use simplification::*;
