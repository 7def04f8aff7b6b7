//! RTCP (RTP Control Protocol) Implementation (RFC 3550)
//!
//! Streams emit compound packets of the form `SR|RR, SDES(CNAME) [, BYE]`.
//! Inbound compound packets are split and decoded for diagnostics.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};

/// NTP timestamp is seconds since 1900, Unix is since 1970
const NTP_EPOCH_OFFSET: u64 = 2_208_988_800;

/// SDES item types
const SDES_END: u8 = 0;
const SDES_CNAME: u8 = 1;

/// RTCP Packet Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RtcpPacketType {
    /// Sender Report
    SR = 200,
    /// Receiver Report
    RR = 201,
    /// Source Description
    SDES = 202,
    /// Goodbye
    BYE = 203,
    /// Application Defined
    APP = 204,
}

impl RtcpPacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            200 => Some(Self::SR),
            201 => Some(Self::RR),
            202 => Some(Self::SDES),
            203 => Some(Self::BYE),
            204 => Some(Self::APP),
            _ => None,
        }
    }
}

/// Current wall clock as a 64-bit NTP timestamp
pub fn ntp_now() -> u64 {
    ntp_timestamp(Utc::now())
}

/// 64-bit NTP timestamp (32.32 fixed point seconds since 1900)
pub fn ntp_timestamp(time: DateTime<Utc>) -> u64 {
    let seconds = (time.timestamp().max(0) as u64).wrapping_add(NTP_EPOCH_OFFSET);
    let nanos = time.timestamp_subsec_nanos().min(999_999_999) as u64;
    let fraction = (nanos << 32) / 1_000_000_000;

    (seconds << 32) | fraction
}

fn put_header(buf: &mut BytesMut, count: u8, packet_type: RtcpPacketType, length_words: usize) {
    buf.put_u8(0x80 | (count & 0x1F));
    buf.put_u8(packet_type as u8);
    buf.put_u16(length_words as u16);
}

/// RTCP Packet
#[derive(Debug, Clone, PartialEq)]
pub enum RtcpPacket {
    SenderReport(SenderReport),
    ReceiverReport(ReceiverReport),
    SourceDescription(SourceDescription),
    Goodbye(Goodbye),
    /// Well-formed packet of a type we do not decode (APP and unknowns)
    Other(u8),
}

impl RtcpPacket {
    /// Parse a single RTCP packet
    pub fn parse(data: &[u8]) -> Result<Self, RtcpError> {
        if data.len() < 4 {
            return Err(RtcpError::PacketTooShort);
        }

        let version = (data[0] >> 6) & 0x03;
        if version != 2 {
            return Err(RtcpError::InvalidVersion(version));
        }

        let packet_type = data[1];
        match RtcpPacketType::from_u8(packet_type) {
            Some(RtcpPacketType::SR) => Ok(RtcpPacket::SenderReport(SenderReport::parse(data)?)),
            Some(RtcpPacketType::RR) => Ok(RtcpPacket::ReceiverReport(ReceiverReport::parse(data)?)),
            Some(RtcpPacketType::SDES) => {
                Ok(RtcpPacket::SourceDescription(SourceDescription::parse(data)?))
            }
            Some(RtcpPacketType::BYE) => Ok(RtcpPacket::Goodbye(Goodbye::parse(data)?)),
            _ => Ok(RtcpPacket::Other(packet_type)),
        }
    }

    /// Split and parse a compound packet
    ///
    /// Every sub-packet length must fit exactly into the datagram.
    pub fn parse_compound(data: &[u8]) -> Result<Vec<Self>, RtcpError> {
        let mut packets = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let rest = &data[offset..];
            if rest.len() < 4 {
                return Err(RtcpError::MalformedCompound);
            }
            let length = (u16::from_be_bytes([rest[2], rest[3]]) as usize + 1) * 4;
            if length > rest.len() {
                return Err(RtcpError::MalformedCompound);
            }
            packets.push(Self::parse(&rest[..length])?);
            offset += length;
        }

        if packets.is_empty() {
            return Err(RtcpError::PacketTooShort);
        }
        Ok(packets)
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        match self {
            RtcpPacket::SenderReport(sr) => sr.serialize_into(buf),
            RtcpPacket::ReceiverReport(rr) => rr.serialize_into(buf),
            RtcpPacket::SourceDescription(sdes) => sdes.serialize_into(buf),
            RtcpPacket::Goodbye(bye) => bye.serialize_into(buf),
            RtcpPacket::Other(_) => {}
        }
    }

    /// Serialize RTCP packet to bytes
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        self.serialize_into(&mut buf);
        buf.freeze()
    }
}

/// Concatenate packets into one compound datagram
pub fn compound(packets: &[RtcpPacket]) -> Bytes {
    let mut buf = BytesMut::with_capacity(128);
    for packet in packets {
        packet.serialize_into(&mut buf);
    }
    buf.freeze()
}

/// Sender Report (SR)
#[derive(Debug, Clone, PartialEq)]
pub struct SenderReport {
    pub ssrc: u32,
    pub ntp_timestamp: u64,
    pub rtp_timestamp: u32,
    pub packet_count: u32,
    pub octet_count: u32,
    pub reports: Vec<ReceptionReport>,
}

impl SenderReport {
    pub fn new(ssrc: u32, rtp_timestamp: u32, packet_count: u32, octet_count: u32) -> Self {
        Self {
            ssrc,
            ntp_timestamp: ntp_now(),
            rtp_timestamp,
            packet_count,
            octet_count,
            reports: Vec::new(),
        }
    }

    pub fn add_report(&mut self, report: ReceptionReport) {
        if self.reports.len() < 31 {
            self.reports.push(report);
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, RtcpError> {
        if data.len() < 28 {
            return Err(RtcpError::PacketTooShort);
        }

        let mut buf = data;

        let byte0 = buf.get_u8();
        let count = byte0 & 0x1F;
        let _pt = buf.get_u8();
        let length = buf.get_u16() as usize;

        if data.len() < (length + 1) * 4 {
            return Err(RtcpError::PacketTooShort);
        }

        let ssrc = buf.get_u32();
        let ntp_timestamp = buf.get_u64();
        let rtp_timestamp = buf.get_u32();
        let packet_count = buf.get_u32();
        let octet_count = buf.get_u32();

        let mut reports = Vec::new();
        for _ in 0..count {
            if buf.remaining() < ReceptionReport::SIZE {
                return Err(RtcpError::PacketTooShort);
            }
            reports.push(ReceptionReport::parse_from_buf(&mut buf));
        }

        Ok(Self {
            ssrc,
            ntp_timestamp,
            rtp_timestamp,
            packet_count,
            octet_count,
            reports,
        })
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        let length = 6 + (self.reports.len() * 6);
        put_header(buf, self.reports.len() as u8, RtcpPacketType::SR, length);

        // Sender info
        buf.put_u32(self.ssrc);
        buf.put_u64(self.ntp_timestamp);
        buf.put_u32(self.rtp_timestamp);
        buf.put_u32(self.packet_count);
        buf.put_u32(self.octet_count);

        for report in &self.reports {
            report.serialize_into_buf(buf);
        }
    }
}

/// Receiver Report (RR)
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverReport {
    pub ssrc: u32,
    pub reports: Vec<ReceptionReport>,
}

impl ReceiverReport {
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            reports: Vec::new(),
        }
    }

    pub fn add_report(&mut self, report: ReceptionReport) {
        if self.reports.len() < 31 {
            self.reports.push(report);
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, RtcpError> {
        if data.len() < 8 {
            return Err(RtcpError::PacketTooShort);
        }

        let mut buf = data;

        let byte0 = buf.get_u8();
        let count = byte0 & 0x1F;
        let _pt = buf.get_u8();
        let length = buf.get_u16() as usize;

        if data.len() < (length + 1) * 4 {
            return Err(RtcpError::PacketTooShort);
        }

        let ssrc = buf.get_u32();

        let mut reports = Vec::new();
        for _ in 0..count {
            if buf.remaining() < ReceptionReport::SIZE {
                return Err(RtcpError::PacketTooShort);
            }
            reports.push(ReceptionReport::parse_from_buf(&mut buf));
        }

        Ok(Self { ssrc, reports })
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        let length = 1 + (self.reports.len() * 6);
        put_header(buf, self.reports.len() as u8, RtcpPacketType::RR, length);
        buf.put_u32(self.ssrc);
        for report in &self.reports {
            report.serialize_into_buf(buf);
        }
    }
}

/// Reception Report Block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceptionReport {
    pub ssrc: u32,
    pub fraction_lost: u8,
    /// 24-bit signed on the wire
    pub cumulative_lost: i32,
    pub highest_seq: u32,
    pub jitter: u32,
    pub lsr: u32,  // Last SR timestamp
    pub dlsr: u32, // Delay since last SR
}

impl ReceptionReport {
    pub const SIZE: usize = 24;

    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrc,
            ..Default::default()
        }
    }

    fn parse_from_buf(buf: &mut &[u8]) -> Self {
        let ssrc = buf.get_u32();
        let fraction_lost = buf.get_u8();
        let raw = ((buf.get_u8() as u32) << 16) | ((buf.get_u8() as u32) << 8) | (buf.get_u8() as u32);
        // sign-extend 24 bits
        let cumulative_lost = ((raw << 8) as i32) >> 8;

        Self {
            ssrc,
            fraction_lost,
            cumulative_lost,
            highest_seq: buf.get_u32(),
            jitter: buf.get_u32(),
            lsr: buf.get_u32(),
            dlsr: buf.get_u32(),
        }
    }

    fn serialize_into_buf(&self, buf: &mut BytesMut) {
        let lost = (self.cumulative_lost as u32) & 0x00FF_FFFF;
        buf.put_u32(self.ssrc);
        buf.put_u8(self.fraction_lost);
        buf.put_u8(((lost >> 16) & 0xFF) as u8);
        buf.put_u8(((lost >> 8) & 0xFF) as u8);
        buf.put_u8((lost & 0xFF) as u8);
        buf.put_u32(self.highest_seq);
        buf.put_u32(self.jitter);
        buf.put_u32(self.lsr);
        buf.put_u32(self.dlsr);
    }
}

/// Source Description (SDES) carrying one CNAME chunk per source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDescription {
    pub chunks: Vec<SdesChunk>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    pub ssrc: u32,
    pub cname: String,
}

impl SourceDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cname(ssrc: u32, cname: impl Into<String>) -> Self {
        Self {
            chunks: vec![SdesChunk {
                ssrc,
                cname: cname.into(),
            }],
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, RtcpError> {
        if data.len() < 4 {
            return Err(RtcpError::PacketTooShort);
        }
        let count = (data[0] & 0x1F) as usize;
        let end = ((u16::from_be_bytes([data[2], data[3]]) as usize + 1) * 4).min(data.len());
        let mut offset = 4;
        let mut chunks = Vec::with_capacity(count);

        for _ in 0..count {
            if offset + 4 > end {
                return Err(RtcpError::PacketTooShort);
            }
            let ssrc = u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]);
            offset += 4;

            let mut cname = String::new();
            // items until END, then skip to the next 32-bit boundary
            while offset < end && data[offset] != SDES_END {
                if offset + 2 > end {
                    return Err(RtcpError::PacketTooShort);
                }
                let item_type = data[offset];
                let len = data[offset + 1] as usize;
                let text_end = offset + 2 + len;
                if text_end > end {
                    return Err(RtcpError::PacketTooShort);
                }
                if item_type == SDES_CNAME {
                    cname = String::from_utf8_lossy(&data[offset + 2..text_end]).into_owned();
                }
                offset = text_end;
            }
            offset = (offset + 4) & !3;
            chunks.push(SdesChunk { ssrc, cname });
        }

        Ok(Self { chunks })
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(0x80 | (self.chunks.len() as u8 & 0x1F));
        buf.put_u8(RtcpPacketType::SDES as u8);
        buf.put_u16(0);

        for chunk in &self.chunks {
            let cname = chunk.cname.as_bytes();
            let len = cname.len().min(255);
            buf.put_u32(chunk.ssrc);
            buf.put_u8(SDES_CNAME);
            buf.put_u8(len as u8);
            buf.put_slice(&cname[..len]);
            // at least one END octet, then pad to a 32-bit boundary
            let padding = 4 - ((2 + len) & 3);
            buf.put_bytes(SDES_END, padding);
        }

        let words = (buf.len() - start) / 4 - 1;
        buf[start + 2..start + 4].copy_from_slice(&(words as u16).to_be_bytes());
    }
}

/// Goodbye (BYE)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goodbye {
    pub ssrcs: Vec<u32>,
    pub reason: Option<String>,
}

impl Goodbye {
    pub fn new(ssrc: u32) -> Self {
        Self {
            ssrcs: vec![ssrc],
            reason: None,
        }
    }

    pub fn with_reason(ssrc: u32, reason: impl Into<String>) -> Self {
        Self {
            ssrcs: vec![ssrc],
            reason: Some(reason.into()),
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, RtcpError> {
        if data.len() < 4 {
            return Err(RtcpError::PacketTooShort);
        }

        let mut buf = data;
        let byte0 = buf.get_u8();
        let count = byte0 & 0x1F;
        let _pt = buf.get_u8();
        let length = buf.get_u16() as usize;
        let end = ((length + 1) * 4).min(data.len());
        let mut buf = &data[4..end];

        let mut ssrcs = Vec::new();
        for _ in 0..count {
            if buf.remaining() < 4 {
                return Err(RtcpError::PacketTooShort);
            }
            ssrcs.push(buf.get_u32());
        }

        let mut reason = None;
        if buf.remaining() > 0 {
            let len = buf.get_u8() as usize;
            if buf.remaining() < len {
                return Err(RtcpError::PacketTooShort);
            }
            reason = Some(String::from_utf8_lossy(&buf[..len]).into_owned());
        }

        Ok(Self { ssrcs, reason })
    }

    pub fn serialize_into(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.put_u8(0x80 | (self.ssrcs.len() as u8 & 0x1F));
        buf.put_u8(RtcpPacketType::BYE as u8);
        buf.put_u16(0);

        for ssrc in &self.ssrcs {
            buf.put_u32(*ssrc);
        }

        if let Some(reason) = &self.reason {
            let text = reason.as_bytes();
            let len = text.len().min(255);
            buf.put_u8(len as u8);
            buf.put_slice(&text[..len]);
            let rem = (1 + len) & 3;
            if rem != 0 {
                buf.put_bytes(0, 4 - rem);
            }
        }

        let words = (buf.len() - start) / 4 - 1;
        buf[start + 2..start + 4].copy_from_slice(&(words as u16).to_be_bytes());
    }
}

/// RTCP Errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RtcpError {
    #[error("Packet too short")]
    PacketTooShort,
    #[error("Invalid version: {0}")]
    InvalidVersion(u8),
    #[error("Malformed Compound RTCP Packet")]
    MalformedCompound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ntp_timestamp() {
        let time = DateTime::from_timestamp(1, 500_000_000).unwrap();
        let ntp = ntp_timestamp(time);
        assert_eq!(ntp >> 32, NTP_EPOCH_OFFSET + 1);
        assert_eq!(ntp & 0xFFFF_FFFF, 1 << 31);
    }

    #[test]
    fn test_sender_report() {
        let mut sr = SenderReport::new(0x12345678, 1000, 100, 16000);
        let mut rr = ReceptionReport::new(0x9ABCDEF0);
        rr.fraction_lost = 64;
        rr.cumulative_lost = -3;
        rr.highest_seq = 70_000;
        sr.add_report(rr.clone());

        let data = RtcpPacket::SenderReport(sr).serialize();
        assert_eq!(data.len(), 28 + ReceptionReport::SIZE);
        let parsed = SenderReport::parse(&data).unwrap();

        assert_eq!(parsed.ssrc, 0x12345678);
        assert_eq!(parsed.rtp_timestamp, 1000);
        assert_eq!(parsed.packet_count, 100);
        assert_eq!(parsed.octet_count, 16000);
        assert_eq!(parsed.reports, vec![rr]);
    }

    #[test]
    fn test_receiver_report() {
        let rr = ReceiverReport::new(0xAABBCCDD);
        let data = RtcpPacket::ReceiverReport(rr).serialize();
        let parsed = ReceiverReport::parse(&data).unwrap();

        assert_eq!(parsed.ssrc, 0xAABBCCDD);
        assert_eq!(parsed.reports.len(), 0);
    }

    #[test]
    fn test_sdes_cname_padding() {
        // 2 + 9 = 11 octets of items, one END octet pads to 12
        let data = RtcpPacket::SourceDescription(SourceDescription::cname(7, "127.0.0.1")).serialize();
        assert_eq!(data.len() % 4, 0);
        assert_eq!(data.len(), 4 + 4 + 12);
        assert_eq!(data[data.len() - 1], 0);

        // 2 + 10 = 12 octets, a full word of END octets follows
        let data = RtcpPacket::SourceDescription(SourceDescription::cname(7, "10.0.0.100")).serialize();
        assert_eq!(data.len(), 4 + 4 + 16);

        let parsed = SourceDescription::parse(&data).unwrap();
        assert_eq!(parsed.chunks[0].ssrc, 7);
        assert_eq!(parsed.chunks[0].cname, "10.0.0.100");
    }

    #[test]
    fn test_goodbye() {
        let bye = Goodbye::new(0x11223344);
        let data = RtcpPacket::Goodbye(bye).serialize();
        let parsed = Goodbye::parse(&data).unwrap();

        assert_eq!(parsed.ssrcs.len(), 1);
        assert_eq!(parsed.ssrcs[0], 0x11223344);
        assert_eq!(parsed.reason, None);
    }

    #[test]
    fn test_goodbye_reason() {
        let data = RtcpPacket::Goodbye(Goodbye::with_reason(5, "Session ended")).serialize();
        assert_eq!(data.len() % 4, 0);
        let parsed = Goodbye::parse(&data).unwrap();
        assert_eq!(parsed.reason.as_deref(), Some("Session ended"));
    }

    #[test]
    fn test_compound_roundtrip() {
        let data = compound(&[
            RtcpPacket::ReceiverReport(ReceiverReport::new(1)),
            RtcpPacket::SourceDescription(SourceDescription::cname(1, "host")),
            RtcpPacket::Goodbye(Goodbye::with_reason(1, "Talkspurt ended")),
        ]);

        let packets = RtcpPacket::parse_compound(&data).unwrap();
        assert_eq!(packets.len(), 3);
        assert!(matches!(packets[0], RtcpPacket::ReceiverReport(_)));
        assert!(matches!(packets[1], RtcpPacket::SourceDescription(_)));
        assert!(matches!(&packets[2], RtcpPacket::Goodbye(b) if b.reason.as_deref() == Some("Talkspurt ended")));
    }

    #[test]
    fn test_compound_malformed_length() {
        let mut data = RtcpPacket::ReceiverReport(ReceiverReport::new(1)).serialize().to_vec();
        // claim one more word than present
        data[3] += 1;
        assert_eq!(RtcpPacket::parse_compound(&data), Err(RtcpError::MalformedCompound));
    }
}
