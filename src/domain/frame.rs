//! Media frames
//!
//! A frame carries one 10ms quantum of audio and/or a named event between
//! the stages of a media context.

use bitflags::bitflags;
use bytes::{Buf, BufMut};

bitflags! {
    /// Content present in a frame; empty means no media
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameType: u8 {
        const AUDIO = 0x01;
        const EVENT = 0x02;
    }
}

impl Default for FrameType {
    fn default() -> Self {
        FrameType::empty()
    }
}

/// Frame marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameMarker {
    #[default]
    None,
    /// First frame of a named event
    StartOfEvent,
    /// Last frame of a named event
    EndOfEvent,
    /// Long-lasting event continued in a new segment
    NewSegment,
}

/// Size of an RFC4733 named event payload
pub const NAMED_EVENT_SIZE: usize = 4;

/// RFC4733 named event payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NamedEvent {
    pub event_id: u8,
    /// End of event bit
    pub edge: bool,
    pub reserved: bool,
    /// Power level in -dBm0 (0-63)
    pub volume: u8,
    /// Duration in timestamp units
    pub duration: u16,
}

impl NamedEvent {
    pub fn new(event_id: u8) -> Self {
        Self {
            event_id,
            volume: 10,
            ..Default::default()
        }
    }

    /// Parse from network byte order
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < NAMED_EVENT_SIZE {
            return None;
        }
        let mut buf = data;
        let event_id = buf.get_u8();
        // Byte 1: E(1), R(1), volume(6)
        let flags = buf.get_u8();
        let duration = buf.get_u16();
        Some(Self {
            event_id,
            edge: flags & 0x80 != 0,
            reserved: flags & 0x40 != 0,
            volume: flags & 0x3F,
            duration,
        })
    }

    /// Serialize to network byte order
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.event_id);
        let mut flags = self.volume & 0x3F;
        if self.edge {
            flags |= 0x80;
        }
        if self.reserved {
            flags |= 0x40;
        }
        buf.put_u8(flags);
        buf.put_u16(self.duration);
    }

    /// DTMF character for events 0-15
    pub fn to_dtmf_char(&self) -> Option<char> {
        match self.event_id {
            0..=9 => Some((b'0' + self.event_id) as char),
            10 => Some('*'),
            11 => Some('#'),
            12..=15 => Some((b'A' + self.event_id - 12) as char),
            _ => None,
        }
    }

    /// Event id for a DTMF character
    pub fn dtmf_event_id(digit: char) -> Option<u8> {
        match digit.to_ascii_uppercase() {
            c @ '0'..='9' => Some(c as u8 - b'0'),
            '*' => Some(10),
            '#' => Some(11),
            c @ 'A'..='D' => Some(c as u8 - b'A' + 12),
            _ => None,
        }
    }
}

/// Media frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    pub frame_type: FrameType,
    pub marker: FrameMarker,
    /// Encoded (or linear) audio payload
    pub payload: Vec<u8>,
    pub event: NamedEvent,
}

impl Frame {
    /// Frame without media
    pub fn empty() -> Self {
        Self::default()
    }

    /// Audio frame carrying `payload`
    pub fn audio(payload: Vec<u8>) -> Self {
        Self {
            frame_type: FrameType::AUDIO,
            payload,
            ..Default::default()
        }
    }

    /// Silent placeholder of `size` zero bytes, flagged as no media
    pub fn silence(size: usize) -> Self {
        Self {
            payload: vec![0; size],
            ..Default::default()
        }
    }

    /// Event frame
    pub fn event(event: NamedEvent, marker: FrameMarker) -> Self {
        Self {
            frame_type: FrameType::EVENT,
            marker,
            event,
            ..Default::default()
        }
    }

    pub fn has_audio(&self) -> bool {
        self.frame_type.contains(FrameType::AUDIO)
    }

    pub fn has_event(&self) -> bool {
        self.frame_type.contains(FrameType::EVENT)
    }

    pub fn is_empty(&self) -> bool {
        self.frame_type.is_empty()
    }

    /// Reset to an empty frame, keeping the payload allocation zeroed
    pub fn clear(&mut self) {
        self.frame_type = FrameType::empty();
        self.marker = FrameMarker::None;
        self.event = NamedEvent::default();
        self.payload.iter_mut().for_each(|b| *b = 0);
    }
}

/// Interpret a linear payload as host-order 16-bit samples
pub fn lpcm_samples(payload: &[u8]) -> impl Iterator<Item = i16> + '_ {
    payload
        .chunks_exact(2)
        .map(|pair| i16::from_ne_bytes([pair[0], pair[1]]))
}

/// Write host-order 16-bit samples into a payload
pub fn lpcm_write(samples: impl IntoIterator<Item = i16>, payload: &mut Vec<u8>) {
    payload.clear();
    for sample in samples {
        payload.extend_from_slice(&sample.to_ne_bytes());
    }
}
