//! MPF - media processing framework
//!
//! The media plane of a speech server: RTP/RTCP transport with an adaptive
//! jitter buffer, codec negotiation, and media contexts that wire
//! terminations into bridges, mixers and multipliers ticked by a real-time
//! engine.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{Engine, EngineHandle};
pub use config::MpfConfig;
pub use domain::shared::{MpfError, Result};
