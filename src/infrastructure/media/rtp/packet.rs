//! RTP Header Handling (RFC 3550)
//!
//! Receive side parses the fixed header, skips CSRC identifiers and any
//! header extension, and strips padding to locate the payload. Transmit side
//! writes a fixed 12-byte header (no CSRC, no extension).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// RTP version carried in every header
pub const RTP_VERSION: u8 = 2;
/// Largest datagram accepted from the RTP socket
pub const MAX_RTP_PACKET_SIZE: usize = 1500;

/// RTP fixed header
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |V=2|P|X|  CC   |M|     PT      |       sequence number         |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                           timestamp                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           synchronization source (SSRC) identifier            |
/// +=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+=+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    /// Fixed header size
    pub const SIZE: usize = 12;

    pub fn new(payload_type: u8, marker: bool, sequence: u16, timestamp: u32, ssrc: u32) -> Self {
        Self {
            marker,
            payload_type,
            sequence,
            timestamp,
            ssrc,
        }
    }

    /// Parse a datagram and return the header with its payload
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), RtpError> {
        if data.len() < Self::SIZE {
            return Err(RtpError::PacketTooShort);
        }

        let mut buf = data;

        // Byte 0: V(2), P(1), X(1), CC(4)
        let byte0 = buf.get_u8();
        let version = byte0 >> 6;
        if version != RTP_VERSION {
            return Err(RtpError::InvalidVersion(version));
        }
        let padding = byte0 & 0x20 != 0;
        let extension = byte0 & 0x10 != 0;
        let csrc_count = (byte0 & 0x0F) as usize;

        // Byte 1: M(1), PT(7)
        let byte1 = buf.get_u8();
        let header = Self {
            marker: byte1 & 0x80 != 0,
            payload_type: byte1 & 0x7F,
            sequence: buf.get_u16(),
            timestamp: buf.get_u32(),
            ssrc: buf.get_u32(),
        };

        let mut offset = Self::SIZE + csrc_count * 4;
        if extension {
            // profile(16) + length in 32-bit words(16)
            if data.len() < offset + 4 {
                return Err(RtpError::PacketTooShort);
            }
            let length = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            offset += 4 + length * 4;
        }
        if offset >= data.len() {
            return Err(RtpError::EmptyPayload);
        }

        let mut end = data.len();
        if padding {
            let padding_len = data[end - 1] as usize;
            if padding_len == 0 || offset + padding_len > end {
                return Err(RtpError::InvalidPadding);
            }
            end -= padding_len;
        }
        if offset >= end {
            return Err(RtpError::EmptyPayload);
        }

        Ok((header, &data[offset..end]))
    }

    /// Write the fixed header
    pub fn write(&self, buf: &mut impl BufMut) {
        buf.put_u8(RTP_VERSION << 6);
        buf.put_u8(((self.marker as u8) << 7) | (self.payload_type & 0x7F));
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
    }

    /// Header followed by payload
    pub fn packetize(&self, payload: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::SIZE + payload.len());
        self.write(&mut buf);
        buf.put_slice(payload);
        buf.freeze()
    }
}

impl fmt::Display for RtpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RTP[PT={}, Seq={}, TS={}, SSRC={:08x}{}]",
            self.payload_type,
            self.sequence,
            self.timestamp,
            self.ssrc,
            if self.marker { ", M" } else { "" }
        )
    }
}

/// RTP errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtpError {
    #[error("Packet too short")]
    PacketTooShort,
    #[error("Invalid version: {0}")]
    InvalidVersion(u8),
    #[error("Invalid padding")]
    InvalidPadding,
    #[error("Packet carries no payload")]
    EmptyPayload,
}
