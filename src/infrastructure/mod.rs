//! Infrastructure layer - media processing and transport

pub mod media;
pub mod metrics;
