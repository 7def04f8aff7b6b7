//! RTP transmit path
//!
//! Packetizes `ptime / 10` encoded frames per RTP packet, marks the first
//! packet of each talkspurt and sends named events as soon as they arrive.

use super::packet::RtpHeader;
use crate::domain::codec::{CodecDescriptor, CODEC_FRAME_TIME_BASE};
use crate::domain::frame::{Frame, FrameMarker, NAMED_EVENT_SIZE};
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use tracing::trace;

/// Sender statistics carried in RTCP SR
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcpSrStat {
    pub ssrc: u32,
    pub sent_packets: u32,
    pub sent_octets: u32,
}

/// Packets produced by one transmitted frame
#[derive(Debug, Default)]
#[must_use]
pub struct TxOutput {
    pub packets: Vec<Bytes>,
    /// An empty frame at a packet boundary ended the talkspurt
    pub talkspurt_ended: bool,
}

/// RTP transmitter
pub struct RtpTransmitter {
    payload_type: u8,
    event_payload_type: Option<u8>,
    samples_per_frame: u32,
    ptime: u16,
    packet_frames: usize,
    current_frames: usize,
    inactivity: bool,
    last_seq: u16,
    timestamp: u32,
    timestamp_base: u32,
    header: RtpHeader,
    packet: BytesMut,
    /// Encoded silence used to complete a partially filled packet
    silence: Vec<u8>,
    sr_stat: RtcpSrStat,
}

impl RtpTransmitter {
    /// `silence` is one encoded frame of silence for the tx codec
    pub fn new(
        ssrc: u32,
        descriptor: &CodecDescriptor,
        event_payload_type: Option<u8>,
        ptime: u16,
        silence: Vec<u8>,
    ) -> Self {
        let mut rng = rand::thread_rng();
        let ptime = if ptime == 0 { 20 } else { ptime };
        let packet_frames = ((ptime as u32 / CODEC_FRAME_TIME_BASE) as usize).max(1);

        Self {
            payload_type: descriptor.payload_type,
            event_payload_type,
            samples_per_frame: descriptor.frame_samples() as u32,
            ptime,
            packet_frames,
            current_frames: 0,
            inactivity: true,
            last_seq: rng.gen(),
            timestamp: rng.gen(),
            timestamp_base: 0,
            header: RtpHeader::new(descriptor.payload_type, false, 0, 0, ssrc),
            packet: BytesMut::with_capacity(RtpHeader::SIZE + packet_frames * silence.len()),
            silence,
            sr_stat: RtcpSrStat {
                ssrc,
                ..Default::default()
            },
        }
    }

    pub fn ptime(&self) -> u16 {
        self.ptime
    }

    pub fn packet_frames(&self) -> usize {
        self.packet_frames
    }

    pub fn sr_stat(&self) -> &RtcpSrStat {
        &self.sr_stat
    }

    pub fn last_seq(&self) -> u16 {
        self.last_seq
    }

    /// RTP timestamp of the most recent frame
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Advance one frame and packetize it
    pub fn transmit(&mut self, frame: &Frame) -> TxOutput {
        let mut output = TxOutput::default();
        self.timestamp = self.timestamp.wrapping_add(self.samples_per_frame);

        if frame.is_empty() {
            if !self.inactivity {
                if self.current_frames == 0 {
                    // ptime aligned end of talkspurt
                    self.inactivity = true;
                    output.talkspurt_ended = true;
                } else {
                    let silence = std::mem::take(&mut self.silence);
                    self.data_append(&silence, &mut output);
                    self.silence = silence;
                }
            }
            return output;
        }

        if frame.has_event() {
            if let Some(event_pt) = self.event_payload_type {
                if matches!(frame.marker, FrameMarker::StartOfEvent | FrameMarker::NewSegment) {
                    self.timestamp_base = self.timestamp;
                }
                output.packets.push(self.event_packet(event_pt, frame));
            }
        }

        if frame.has_audio() {
            if self.current_frames == 0 {
                self.header = RtpHeader::new(
                    self.payload_type,
                    self.inactivity,
                    0,
                    self.timestamp,
                    self.sr_stat.ssrc,
                );
                self.packet.clear();
                self.inactivity = false;
            }
            self.data_append(&frame.payload, &mut output);
        }

        output
    }

    fn data_append(&mut self, payload: &[u8], output: &mut TxOutput) {
        self.packet.put_slice(payload);
        self.current_frames += 1;
        if self.current_frames < self.packet_frames {
            return;
        }

        self.last_seq = self.last_seq.wrapping_add(1);
        self.header.sequence = self.last_seq;
        trace!("Send {} size={}", self.header, self.packet.len());

        let mut data = BytesMut::with_capacity(RtpHeader::SIZE + self.packet.len());
        self.header.write(&mut data);
        data.put_slice(&self.packet);

        self.sr_stat.sent_packets = self.sr_stat.sent_packets.wrapping_add(1);
        self.sr_stat.sent_octets = self.sr_stat.sent_octets.wrapping_add(self.packet.len() as u32);
        self.packet.clear();
        self.current_frames = 0;
        output.packets.push(data.freeze());
    }

    fn event_packet(&mut self, payload_type: u8, frame: &Frame) -> Bytes {
        self.last_seq = self.last_seq.wrapping_add(1);
        let header = RtpHeader::new(
            payload_type,
            frame.marker == FrameMarker::StartOfEvent,
            self.last_seq,
            self.timestamp_base,
            self.sr_stat.ssrc,
        );

        let mut event = frame.event;
        event.edge = frame.marker == FrameMarker::EndOfEvent;
        trace!("Send {} event={} dur={} edge={}", header, event.event_id, event.duration, event.edge);

        let mut data = BytesMut::with_capacity(RtpHeader::SIZE + NAMED_EVENT_SIZE);
        header.write(&mut data);
        event.serialize(&mut data);

        self.sr_stat.sent_packets = self.sr_stat.sent_packets.wrapping_add(1);
        self.sr_stat.sent_octets = self.sr_stat.sent_octets.wrapping_add(NAMED_EVENT_SIZE as u32);
        data.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::NamedEvent;

    fn pcmu_transmitter(ptime: u16) -> RtpTransmitter {
        RtpTransmitter::new(0x1234, &CodecDescriptor::new(0, "PCMU", 8000), Some(101), ptime, vec![0xFF; 80])
    }

    fn audio() -> Frame {
        Frame::audio(vec![0x55; 80])
    }

    #[test]
    fn test_packetization_two_frames_per_packet() {
        let mut tx = pcmu_transmitter(20);
        assert_eq!(tx.packet_frames(), 2);
        let seq = tx.last_seq();

        assert!(tx.transmit(&audio()).packets.is_empty());
        let out = tx.transmit(&audio());
        assert_eq!(out.packets.len(), 1);

        let (header, payload) = RtpHeader::parse(&out.packets[0]).unwrap();
        assert_eq!(header.sequence, seq.wrapping_add(1));
        assert!(header.marker);
        assert_eq!(header.ssrc, 0x1234);
        assert_eq!(payload.len(), 160);
        assert_eq!(tx.sr_stat().sent_packets, 1);
        assert_eq!(tx.sr_stat().sent_octets, 160);
    }

    #[test]
    fn test_timestamp_advances_every_frame() {
        let mut tx = pcmu_transmitter(20);
        let start = tx.timestamp();

        let _ = tx.transmit(&audio());
        let _ = tx.transmit(&audio());
        let _ = tx.transmit(&Frame::empty());
        assert_eq!(tx.timestamp(), start.wrapping_add(240));
    }

    #[test]
    fn test_marker_only_after_inactivity() {
        let mut tx = pcmu_transmitter(10);
        let first = tx.transmit(&audio());
        let second = tx.transmit(&audio());
        assert!(RtpHeader::parse(&first.packets[0]).unwrap().0.marker);
        assert!(!RtpHeader::parse(&second.packets[0]).unwrap().0.marker);

        let end = tx.transmit(&Frame::empty());
        assert!(end.talkspurt_ended);
        assert!(end.packets.is_empty());

        // still inactive, no second notification
        assert!(!tx.transmit(&Frame::empty()).talkspurt_ended);

        let resumed = tx.transmit(&audio());
        assert!(RtpHeader::parse(&resumed.packets[0]).unwrap().0.marker);
    }

    #[test]
    fn test_partial_packet_padded_with_silence() {
        let mut tx = pcmu_transmitter(20);
        let _ = tx.transmit(&audio());
        let out = tx.transmit(&Frame::empty());
        assert!(!out.talkspurt_ended);
        assert_eq!(out.packets.len(), 1);

        let (_, payload) = RtpHeader::parse(&out.packets[0]).unwrap();
        assert!(payload[..80].iter().all(|&b| b == 0x55));
        assert!(payload[80..].iter().all(|&b| b == 0xFF));

        assert!(tx.transmit(&Frame::empty()).talkspurt_ended);
    }

    #[test]
    fn test_event_sent_immediately() {
        let mut tx = pcmu_transmitter(20);
        let mut event = NamedEvent::new(5);
        event.duration = 80;

        let start = tx.transmit(&Frame::event(event, FrameMarker::StartOfEvent));
        assert_eq!(start.packets.len(), 1);
        let (header, payload) = RtpHeader::parse(&start.packets[0]).unwrap();
        assert_eq!(header.payload_type, 101);
        assert!(header.marker);
        let base = header.timestamp;
        assert_eq!(NamedEvent::parse(payload).unwrap().event_id, 5);

        event.duration = 160;
        let end = tx.transmit(&Frame::event(event, FrameMarker::EndOfEvent));
        let (header, payload) = RtpHeader::parse(&end.packets[0]).unwrap();
        assert!(!header.marker);
        assert_eq!(header.timestamp, base);
        let parsed = NamedEvent::parse(payload).unwrap();
        assert!(parsed.edge);
        assert_eq!(parsed.duration, 160);
        assert_eq!(tx.sr_stat().sent_octets, 8);
    }

    #[test]
    fn test_event_without_event_payload_type_dropped() {
        let mut tx = RtpTransmitter::new(1, &CodecDescriptor::new(0, "PCMU", 8000), None, 20, vec![0xFF; 80]);
        let out = tx.transmit(&Frame::event(NamedEvent::new(1), FrameMarker::StartOfEvent));
        assert!(out.packets.is_empty());
    }
}
