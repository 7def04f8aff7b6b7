//! Many-to-one mixer
//!
//! Decoded 16-bit samples are summed with wrap-around; the first event seen
//! in a tick is forwarded.

use super::adapter::{Decoder, Encoder};
use super::{FrameCache, FrameSink};
use crate::domain::frame::{lpcm_samples, lpcm_write, Frame, FrameMarker, FrameType};
use crate::domain::shared::SlotId;

pub struct MixerInput {
    pub slot: SlotId,
    pub decoder: Option<Decoder>,
}

pub struct Mixer {
    pub(crate) inputs: Vec<MixerInput>,
    pub(crate) sink: SlotId,
    encoder: Option<Encoder>,
    samples: Vec<i16>,
    mix: Frame,
}

impl Mixer {
    /// `frame_samples` is the 10ms sample count of the linear mix
    pub fn new(inputs: Vec<MixerInput>, sink: SlotId, encoder: Option<Encoder>, frame_samples: usize) -> Self {
        Self {
            inputs,
            sink,
            encoder,
            samples: vec![0; frame_samples],
            mix: Frame::silence(frame_samples * 2),
        }
    }

    pub fn process(&mut self, frames: &FrameCache, sink: &mut dyn FrameSink) {
        let empty = Frame::empty();
        self.samples.iter_mut().for_each(|s| *s = 0);
        self.mix.frame_type = FrameType::empty();
        self.mix.marker = FrameMarker::None;

        for input in self.inputs.iter_mut() {
            let mut frame = frames.get(&input.slot).unwrap_or(&empty);
            if let Some(decoder) = input.decoder.as_mut() {
                frame = decoder.process(frame);
            }

            if frame.has_audio() {
                for (acc, sample) in self.samples.iter_mut().zip(lpcm_samples(&frame.payload)) {
                    *acc = acc.wrapping_add(sample);
                }
                self.mix.frame_type |= FrameType::AUDIO;
            }
            if frame.has_event() && !self.mix.has_event() {
                self.mix.event = frame.event;
                self.mix.marker = frame.marker;
                self.mix.frame_type |= FrameType::EVENT;
            }
        }
        lpcm_write(self.samples.iter().copied(), &mut self.mix.payload);

        let mut frame = &self.mix;
        if let Some(encoder) = self.encoder.as_mut() {
            frame = encoder.process(frame);
        }
        sink.write_frame(self.sink, frame);
    }

    pub fn trace(&self) -> String {
        let sources: Vec<String> = self.inputs.iter().map(|i| i.slot.to_string()).collect();
        format!("Mixer [{}] -> {}", sources.join(","), self.sink)
    }
}
