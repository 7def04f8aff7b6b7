//! One-to-one objects: transcoding bridge and pass-through null bridge

use super::adapter::{Decoder, Encoder};
use super::{FrameCache, FrameSink};
use crate::domain::frame::Frame;
use crate::domain::shared::SlotId;

/// Source to sink through optional decoder and encoder
pub struct Bridge {
    pub(crate) source: SlotId,
    pub(crate) sink: SlotId,
    decoder: Option<Decoder>,
    encoder: Option<Encoder>,
}

impl Bridge {
    pub fn new(source: SlotId, sink: SlotId, decoder: Option<Decoder>, encoder: Option<Encoder>) -> Self {
        Self {
            source,
            sink,
            decoder,
            encoder,
        }
    }

    pub fn process(&mut self, frames: &FrameCache, sink: &mut dyn FrameSink) {
        let empty = Frame::empty();
        let mut frame = frames.get(&self.source).unwrap_or(&empty);
        if let Some(decoder) = self.decoder.as_mut() {
            frame = decoder.process(frame);
        }
        if let Some(encoder) = self.encoder.as_mut() {
            frame = encoder.process(frame);
        }
        sink.write_frame(self.sink, frame);
    }

    pub fn trace(&self) -> String {
        let decoder = self.decoder.as_ref().map_or("-".to_string(), |d| d.descriptor().to_string());
        let encoder = self.encoder.as_ref().map_or("-".to_string(), |e| e.descriptor().to_string());
        format!("Bridge {} -> [{} | {}] -> {}", self.source, decoder, encoder, self.sink)
    }
}

/// Source and sink share a format; frames are passed unchanged
pub struct NullBridge {
    pub(crate) source: SlotId,
    pub(crate) sink: SlotId,
}

impl NullBridge {
    pub fn new(source: SlotId, sink: SlotId) -> Self {
        Self { source, sink }
    }

    pub fn process(&mut self, frames: &FrameCache, sink: &mut dyn FrameSink) {
        match frames.get(&self.source) {
            Some(frame) => sink.write_frame(self.sink, frame),
            None => sink.write_frame(self.sink, &Frame::empty()),
        }
    }

    pub fn trace(&self) -> String {
        format!("NullBridge {} -> {}", self.source, self.sink)
    }
}
