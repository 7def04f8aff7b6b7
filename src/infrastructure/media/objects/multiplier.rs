//! One-to-many multiplier

use super::adapter::{Decoder, Encoder};
use super::{FrameCache, FrameSink};
use crate::domain::frame::Frame;
use crate::domain::shared::SlotId;

pub struct MultiplierOutput {
    pub slot: SlotId,
    pub encoder: Option<Encoder>,
}

pub struct Multiplier {
    pub(crate) source: SlotId,
    decoder: Option<Decoder>,
    pub(crate) outputs: Vec<MultiplierOutput>,
}

impl Multiplier {
    pub fn new(source: SlotId, decoder: Option<Decoder>, outputs: Vec<MultiplierOutput>) -> Self {
        Self {
            source,
            decoder,
            outputs,
        }
    }

    pub fn process(&mut self, frames: &FrameCache, sink: &mut dyn FrameSink) {
        let empty = Frame::empty();
        let mut frame = frames.get(&self.source).unwrap_or(&empty);
        if let Some(decoder) = self.decoder.as_mut() {
            frame = decoder.process(frame);
        }

        for output in self.outputs.iter_mut() {
            match output.encoder.as_mut() {
                Some(encoder) => sink.write_frame(output.slot, encoder.process(frame)),
                None => sink.write_frame(output.slot, frame),
            }
        }
    }

    pub fn trace(&self) -> String {
        let sinks: Vec<String> = self.outputs.iter().map(|o| o.slot.to_string()).collect();
        format!("Multiplier {} -> [{}]", self.source, sinks.join(","))
    }
}
