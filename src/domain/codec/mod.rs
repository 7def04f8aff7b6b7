//! Codec descriptors, capabilities and negotiation

pub mod descriptor;
pub mod list;

pub use descriptor::{
    CodecAttribs, CodecCapabilities, CodecDescriptor, SampleRates, CODEC_FRAME_TIME_BASE, LPCM,
    RTP_PT_CN, RTP_PT_DYNAMIC, RTP_PT_UNKNOWN, TELEPHONE_EVENT,
};
pub use list::{lists_intersect, CodecList};
