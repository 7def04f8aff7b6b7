//! Codec adapters placed between streams and dataflow objects
//!
//! A decoder turns a source's wire frames into internal linear frames; an
//! encoder does the reverse for a sink. Events and markers pass through.

use crate::domain::codec::CodecDescriptor;
use crate::domain::frame::{Frame, FrameType};
use crate::infrastructure::media::codec::Codec;
use tracing::warn;

/// Wire format to linear
pub struct Decoder {
    codec: Box<dyn Codec>,
    descriptor: CodecDescriptor,
    frame: Frame,
}

impl Decoder {
    pub fn new(mut codec: Box<dyn Codec>, descriptor: CodecDescriptor) -> Self {
        if let Err(e) = codec.open() {
            warn!("Failed to open decoder {}: {}", descriptor, e);
        }
        let frame = Frame::silence(descriptor.lpcm_frame_size());
        Self {
            codec,
            descriptor,
            frame,
        }
    }

    pub fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    /// Decode into the internal scratch frame
    pub fn process(&mut self, input: &Frame) -> &Frame {
        let size = self.descriptor.lpcm_frame_size();
        self.frame.frame_type = input.frame_type;
        self.frame.marker = input.marker;
        self.frame.event = input.event;

        if input.has_audio() {
            if let Err(e) = self.codec.decode(&input.payload, &mut self.frame.payload) {
                warn!("Decode {} failed: {}", self.descriptor, e);
                self.frame.frame_type.remove(FrameType::AUDIO);
            }
        }
        if !self.frame.has_audio() {
            self.frame.payload.clear();
            self.frame.payload.resize(size, 0);
        }
        &self.frame
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        let _ = self.codec.close();
    }
}

/// Linear to wire format
pub struct Encoder {
    codec: Box<dyn Codec>,
    descriptor: CodecDescriptor,
    frame: Frame,
}

impl Encoder {
    pub fn new(mut codec: Box<dyn Codec>, descriptor: CodecDescriptor) -> Self {
        if let Err(e) = codec.open() {
            warn!("Failed to open encoder {}: {}", descriptor, e);
        }
        Self {
            codec,
            descriptor,
            frame: Frame::empty(),
        }
    }

    pub fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    /// Encode into the internal scratch frame
    pub fn process(&mut self, input: &Frame) -> &Frame {
        self.frame.frame_type = input.frame_type;
        self.frame.marker = input.marker;
        self.frame.event = input.event;
        self.frame.payload.clear();

        if input.has_audio() {
            if let Err(e) = self.codec.encode(&input.payload, &mut self.frame.payload) {
                warn!("Encode {} failed: {}", self.descriptor, e);
                self.frame.frame_type.remove(FrameType::AUDIO);
            }
        }
        &self.frame
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        let _ = self.codec.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::{lpcm_samples, lpcm_write, FrameMarker, NamedEvent};
    use crate::infrastructure::media::codec::G711Codec;

    fn pcmu() -> CodecDescriptor {
        CodecDescriptor::new(0, "PCMU", 8000)
    }

    #[test]
    fn test_decode_then_encode() {
        let mut encoder = Encoder::new(Box::new(G711Codec::pcmu()), pcmu());
        let mut decoder = Decoder::new(Box::new(G711Codec::pcmu()), pcmu());

        let mut payload = Vec::new();
        lpcm_write(std::iter::repeat(1000).take(80), &mut payload);
        let encoded = encoder.process(&Frame::audio(payload)).clone();
        assert_eq!(encoded.payload.len(), 80);

        let decoded = decoder.process(&encoded);
        assert!(decoded.has_audio());
        assert_eq!(decoded.payload.len(), 160);
        // mu-law is lossy but close at this level
        assert!(lpcm_samples(&decoded.payload).all(|s| (s - 1000).abs() < 40));
    }

    #[test]
    fn test_decoder_silence_for_empty_frame() {
        let mut decoder = Decoder::new(Box::new(G711Codec::pcmu()), pcmu());
        let decoded = decoder.process(&Frame::empty());
        assert!(decoded.is_empty());
        assert_eq!(decoded.payload, vec![0; 160]);
    }

    #[test]
    fn test_event_passes_through() {
        let mut encoder = Encoder::new(Box::new(G711Codec::pcmu()), pcmu());
        let frame = Frame::event(NamedEvent::new(3), FrameMarker::StartOfEvent);
        let encoded = encoder.process(&frame);
        assert!(encoded.has_event());
        assert_eq!(encoded.event.event_id, 3);
        assert_eq!(encoded.marker, FrameMarker::StartOfEvent);
    }
}
