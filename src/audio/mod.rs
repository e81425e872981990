// Audio module - PCM frame sources, preprocessing and windowing

pub mod preprocess;
pub mod reader;
pub mod window;

// Re-export commonly used types for convenience
pub use preprocess::SignalPreprocessor;
pub use reader::{FrameReader, MemoryFrameReader, WavFrameReader};
pub use window::{WindowConfig, WindowSpec, WindowedSignalSource};
