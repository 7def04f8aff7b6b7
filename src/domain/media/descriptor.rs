//! Media descriptors exchanged with signaling

use crate::domain::codec::{CodecCapabilities, CodecList};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Stream direction, from the stream's point of view
    ///
    /// SEND: the stream sends media out (frames are written to it).
    /// RECEIVE: the stream receives media (frames are read from it).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct StreamDirection: u8 {
        const SEND = 0x01;
        const RECEIVE = 0x02;
        const DUPLEX = Self::SEND.bits() | Self::RECEIVE.bits();
    }
}

impl Default for StreamDirection {
    fn default() -> Self {
        StreamDirection::empty()
    }
}

impl StreamDirection {
    /// Direction as seen by the remote party
    pub fn reverse(self) -> Self {
        let mut reversed = StreamDirection::empty();
        if self.contains(StreamDirection::SEND) {
            reversed |= StreamDirection::RECEIVE;
        }
        if self.contains(StreamDirection::RECEIVE) {
            reversed |= StreamDirection::SEND;
        }
        reversed
    }

    pub fn can_send(self) -> bool {
        self.contains(StreamDirection::SEND)
    }

    pub fn can_receive(self) -> bool {
        self.contains(StreamDirection::RECEIVE)
    }
}

impl fmt::Display for StreamDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.can_send(), self.can_receive()) {
            (true, true) => "sendrecv",
            (true, false) => "sendonly",
            (false, true) => "recvonly",
            (false, false) => "inactive",
        };
        f.write_str(name)
    }
}

/// Media state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaState {
    #[default]
    Disabled,
    Enabled,
}

/// Stream capabilities: direction plus supported codecs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCapabilities {
    pub direction: StreamDirection,
    pub codecs: CodecCapabilities,
}

impl StreamCapabilities {
    pub fn new(direction: StreamDirection) -> Self {
        Self {
            direction,
            codecs: CodecCapabilities::new(),
        }
    }
}

/// RTP media description (one SDP m= line)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpMediaDescriptor {
    pub state: MediaState,
    pub direction: StreamDirection,
    pub ip: String,
    pub ext_ip: Option<String>,
    pub port: u16,
    /// Packetization time in ms; 0 means unspecified
    pub ptime: u16,
    /// Media line position
    pub id: usize,
    /// Media identification (RFC5888)
    pub mid: usize,
    pub codec_list: CodecList,
}

impl RtpMediaDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enabled duplex media at the given address
    pub fn enabled(ip: impl Into<String>, port: u16) -> Self {
        Self {
            state: MediaState::Enabled,
            direction: StreamDirection::DUPLEX,
            ip: ip.into(),
            port,
            ..Default::default()
        }
    }

    /// Address advertised to the peer
    pub fn advertised_ip(&self) -> &str {
        self.ext_ip.as_deref().unwrap_or(&self.ip)
    }
}

/// Descriptor handed to an RTP termination on add/modify
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpStreamDescriptor {
    pub local: Option<RtpMediaDescriptor>,
    pub remote: Option<RtpMediaDescriptor>,
    pub capabilities: Option<StreamCapabilities>,
}

impl RtpStreamDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(remote: RtpMediaDescriptor) -> Self {
        Self {
            remote: Some(remote),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_direction() {
        assert_eq!(StreamDirection::SEND.reverse(), StreamDirection::RECEIVE);
        assert_eq!(StreamDirection::RECEIVE.reverse(), StreamDirection::SEND);
        assert_eq!(StreamDirection::DUPLEX.reverse(), StreamDirection::DUPLEX);
        assert_eq!(StreamDirection::empty().reverse(), StreamDirection::empty());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(StreamDirection::DUPLEX.to_string(), "sendrecv");
        assert_eq!(StreamDirection::empty().to_string(), "inactive");
    }

    #[test]
    fn test_advertised_ip() {
        let mut media = RtpMediaDescriptor::enabled("10.0.0.1", 5000);
        assert_eq!(media.advertised_ip(), "10.0.0.1");
        media.ext_ip = Some("203.0.113.7".to_string());
        assert_eq!(media.advertised_ip(), "203.0.113.7");
    }
}
