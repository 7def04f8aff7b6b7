//! Media descriptors produced by signaling and read back after negotiation

pub mod descriptor;

pub use descriptor::{
    MediaState, RtpMediaDescriptor, RtpStreamDescriptor, StreamCapabilities, StreamDirection,
};
