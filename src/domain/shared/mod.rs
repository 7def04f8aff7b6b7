//! Shared kernel - Common types used across the media plane

pub mod error;
pub mod result;
pub mod value_objects;

pub use error::MpfError;
pub use result::Result;
pub use value_objects::*;
