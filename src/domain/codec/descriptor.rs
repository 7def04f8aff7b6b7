//! Codec descriptors and capabilities
//!
//! A descriptor names one wire format (payload type, encoding name, sample
//! rate, channels). Capabilities describe what a codec implementation or a
//! stream is able to handle, expressed as a name plus a sample-rate mask.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base frame duration, in milliseconds
pub const CODEC_FRAME_TIME_BASE: u32 = 10;

/// First dynamic RTP payload type
pub const RTP_PT_DYNAMIC: u8 = 96;
/// Highest dynamic RTP payload type
pub const RTP_PT_DYNAMIC_MAX: u8 = 127;
/// Payload type placeholder for descriptors not yet bound to a number
pub const RTP_PT_UNKNOWN: u8 = 128;
/// Comfort noise (RFC3389)
pub const RTP_PT_CN: u8 = 13;

/// Encoding name of RFC4733 named events
pub const TELEPHONE_EVENT: &str = "telephone-event";
/// Encoding name of the internal host-order linear codec
pub const LPCM: &str = "LPCM";

bitflags! {
    /// Supported sampling rates
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct SampleRates: u8 {
        const RATE_8000 = 0x01;
        const RATE_16000 = 0x02;
        const RATE_32000 = 0x04;
        const RATE_48000 = 0x08;
        const RATE_11025 = 0x10;
        const RATE_22050 = 0x20;
        const RATE_44100 = 0x40;
    }
}

impl SampleRates {
    /// Map a sampling rate in Hz to its mask bit
    pub fn from_rate(rate: u32) -> Option<Self> {
        match rate {
            8000 => Some(Self::RATE_8000),
            16000 => Some(Self::RATE_16000),
            32000 => Some(Self::RATE_32000),
            48000 => Some(Self::RATE_48000),
            11025 => Some(Self::RATE_11025),
            22050 => Some(Self::RATE_22050),
            44100 => Some(Self::RATE_44100),
            _ => None,
        }
    }

    /// Check whether the mask contains the given rate
    pub fn supports(&self, rate: u32) -> bool {
        Self::from_rate(rate).map_or(false, |bit| self.contains(bit))
    }
}

/// Codec descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    pub payload_type: u8,
    pub name: String,
    pub sampling_rate: u32,
    pub channel_count: u8,
    /// Optional format parameters (fmtp)
    pub format: Option<String>,
    pub enabled: bool,
}

impl CodecDescriptor {
    pub fn new(payload_type: u8, name: impl Into<String>, sampling_rate: u32) -> Self {
        Self {
            payload_type,
            name: name.into(),
            sampling_rate,
            channel_count: 1,
            format: None,
            enabled: true,
        }
    }

    /// Internal linear PCM descriptor
    pub fn lpcm(sampling_rate: u32, channel_count: u8) -> Self {
        Self {
            channel_count,
            ..Self::new(RTP_PT_UNKNOWN, LPCM, sampling_rate)
        }
    }

    /// RFC4733 named event descriptor
    pub fn telephone_event(payload_type: u8, sampling_rate: u32) -> Self {
        Self::new(payload_type, TELEPHONE_EVENT, sampling_rate)
    }

    /// Payload type is statically assigned (RFC3551)
    pub fn is_static(&self) -> bool {
        self.payload_type < RTP_PT_DYNAMIC
    }

    /// Descriptor names RFC4733 named events
    pub fn is_event(&self) -> bool {
        self.name.eq_ignore_ascii_case(TELEPHONE_EVENT)
    }

    /// Descriptor names the internal linear codec
    pub fn is_lpcm(&self) -> bool {
        self.name.eq_ignore_ascii_case(LPCM)
    }

    /// Match rule used in negotiation
    ///
    /// Static payload types match by number alone; otherwise name (case
    /// insensitive), sampling rate and channel count must agree.
    pub fn matches(&self, other: &CodecDescriptor) -> bool {
        if self.is_static() && other.is_static() {
            return self.payload_type == other.payload_type;
        }
        self.name.eq_ignore_ascii_case(&other.name)
            && self.sampling_rate == other.sampling_rate
            && self.channel_count == other.channel_count
    }

    /// Samples per 10ms frame (all channels)
    pub fn frame_samples(&self) -> usize {
        self.channel_count as usize * self.sampling_rate as usize * CODEC_FRAME_TIME_BASE as usize
            / 1000
    }

    /// Bytes per 10ms frame for a codec with the given sample width
    pub fn frame_size(&self, bits_per_sample: u8) -> usize {
        self.frame_samples() * bits_per_sample as usize / 8
    }

    /// Bytes per 10ms frame of internal linear audio at this rate
    pub fn lpcm_frame_size(&self) -> usize {
        self.frame_size(16)
    }
}

impl fmt::Display for CodecDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.name, self.payload_type, self.sampling_rate)?;
        if self.channel_count > 1 {
            write!(f, "/{}", self.channel_count)?;
        }
        Ok(())
    }
}

/// Codec attributes advertised by an implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecAttribs {
    pub name: String,
    pub bits_per_sample: u8,
    pub sample_rates: SampleRates,
}

impl CodecAttribs {
    pub fn new(name: impl Into<String>, bits_per_sample: u8, sample_rates: SampleRates) -> Self {
        Self {
            name: name.into(),
            bits_per_sample,
            sample_rates,
        }
    }

    /// Name matches and the rate is in the mask
    pub fn matches(&self, descriptor: &CodecDescriptor) -> bool {
        self.name.eq_ignore_ascii_case(&descriptor.name)
            && self.sample_rates.supports(descriptor.sampling_rate)
    }
}

/// Set of codecs a stream can handle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecCapabilities {
    pub attribs: Vec<CodecAttribs>,
    pub allow_named_events: bool,
}

impl CodecCapabilities {
    pub fn new() -> Self {
        Self {
            attribs: Vec::new(),
            allow_named_events: true,
        }
    }

    /// Add a capability entry
    pub fn add(&mut self, name: impl Into<String>, sample_rates: SampleRates) {
        self.attribs.push(CodecAttribs::new(name, 0, sample_rates));
    }

    /// Add an entry for any implementation's attributes
    pub fn add_attribs(&mut self, attribs: &CodecAttribs) {
        self.attribs.push(attribs.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.attribs.is_empty() && !self.allow_named_events
    }

    /// Check whether a descriptor is covered by these capabilities
    pub fn matches(&self, descriptor: &CodecDescriptor) -> bool {
        if descriptor.is_event() {
            return self.allow_named_events;
        }
        self.attribs.iter().any(|attribs| attribs.matches(descriptor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_match_by_payload_type() {
        let pcmu = CodecDescriptor::new(0, "PCMU", 8000);
        let renamed = CodecDescriptor::new(0, "G711U", 8000);
        assert!(pcmu.matches(&renamed));

        let pcma = CodecDescriptor::new(8, "PCMA", 8000);
        assert!(!pcmu.matches(&pcma));
    }

    #[test]
    fn test_dynamic_match_by_name_rate_channels() {
        let a = CodecDescriptor::new(96, "L16", 8000);
        let b = CodecDescriptor::new(97, "l16", 8000);
        assert!(a.matches(&b));

        let c = CodecDescriptor::new(96, "L16", 16000);
        assert!(!a.matches(&c));

        let mut d = CodecDescriptor::new(96, "L16", 8000);
        d.channel_count = 2;
        assert!(!a.matches(&d));
    }

    #[test]
    fn test_frame_sizes() {
        let pcmu = CodecDescriptor::new(0, "PCMU", 8000);
        assert_eq!(pcmu.frame_samples(), 80);
        assert_eq!(pcmu.frame_size(8), 80);
        assert_eq!(pcmu.lpcm_frame_size(), 160);

        let wide = CodecDescriptor::lpcm(16000, 1);
        assert_eq!(wide.frame_samples(), 160);
        assert_eq!(wide.lpcm_frame_size(), 320);
    }

    #[test]
    fn test_capabilities_match() {
        let mut caps = CodecCapabilities::new();
        caps.add("PCMU", SampleRates::RATE_8000);

        assert!(caps.matches(&CodecDescriptor::new(0, "PCMU", 8000)));
        assert!(!caps.matches(&CodecDescriptor::new(0, "PCMU", 16000)));
        assert!(!caps.matches(&CodecDescriptor::new(8, "PCMA", 8000)));
        assert!(caps.matches(&CodecDescriptor::telephone_event(101, 8000)));

        caps.allow_named_events = false;
        assert!(!caps.matches(&CodecDescriptor::telephone_event(101, 8000)));
    }

    #[test]
    fn test_sample_rate_mask() {
        let mask = SampleRates::RATE_8000 | SampleRates::RATE_16000;
        assert!(mask.supports(8000));
        assert!(mask.supports(16000));
        assert!(!mask.supports(44100));
        assert!(!mask.supports(12345));
    }
}
