//! Domain layer - media data model
//!
//! Pure data shared by every layer: codec descriptors and lists, frames and
//! named events, media descriptors, identifiers and errors.

pub mod codec;
pub mod frame;
pub mod media;
pub mod shared;

pub use shared::{MpfError, Result};
