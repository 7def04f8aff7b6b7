//! File-backed streams

pub mod stream;
pub mod wav;

pub use stream::{FilePlayer, FileRecorder};
pub use wav::{WavError, WavFile, WavFormat, WavWriter};
