//! Dataflow objects realized from a context's association matrix

pub mod adapter;
pub mod bridge;
pub mod mixer;
pub mod multiplier;

pub use adapter::{Decoder, Encoder};
pub use bridge::{Bridge, NullBridge};
pub use mixer::{Mixer, MixerInput};
pub use multiplier::{Multiplier, MultiplierOutput};

use crate::domain::frame::Frame;
use crate::domain::shared::SlotId;
use std::collections::HashMap;

/// Frames read from each source during one tick
pub type FrameCache = HashMap<SlotId, Frame>;

/// Destination for processed frames
pub trait FrameSink {
    fn write_frame(&mut self, slot: SlotId, frame: &Frame);
}

/// Dataflow node
pub enum MpfObject {
    Bridge(Bridge),
    NullBridge(NullBridge),
    Mixer(Mixer),
    Multiplier(Multiplier),
}

impl MpfObject {
    pub fn kind(&self) -> &'static str {
        match self {
            MpfObject::Bridge(_) => "bridge",
            MpfObject::NullBridge(_) => "null-bridge",
            MpfObject::Mixer(_) => "mixer",
            MpfObject::Multiplier(_) => "multiplier",
        }
    }

    /// Slots read by this object
    pub fn sources(&self) -> Vec<SlotId> {
        match self {
            MpfObject::Bridge(b) => vec![b.source],
            MpfObject::NullBridge(b) => vec![b.source],
            MpfObject::Mixer(m) => m.inputs.iter().map(|i| i.slot).collect(),
            MpfObject::Multiplier(m) => vec![m.source],
        }
    }

    /// Slots written by this object
    pub fn sinks(&self) -> Vec<SlotId> {
        match self {
            MpfObject::Bridge(b) => vec![b.sink],
            MpfObject::NullBridge(b) => vec![b.sink],
            MpfObject::Mixer(m) => vec![m.sink],
            MpfObject::Multiplier(m) => m.outputs.iter().map(|o| o.slot).collect(),
        }
    }

    pub fn process(&mut self, frames: &FrameCache, sink: &mut dyn FrameSink) {
        match self {
            MpfObject::Bridge(b) => b.process(frames, sink),
            MpfObject::NullBridge(b) => b.process(frames, sink),
            MpfObject::Mixer(m) => m.process(frames, sink),
            MpfObject::Multiplier(m) => m.process(frames, sink),
        }
    }

    pub fn trace(&self) -> String {
        match self {
            MpfObject::Bridge(b) => b.trace(),
            MpfObject::NullBridge(b) => b.trace(),
            MpfObject::Mixer(m) => m.trace(),
            MpfObject::Multiplier(m) => m.trace(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::{lpcm_samples, lpcm_write, FrameMarker, NamedEvent};

    #[derive(Default)]
    struct Collect(Vec<(SlotId, Frame)>);

    impl FrameSink for Collect {
        fn write_frame(&mut self, slot: SlotId, frame: &Frame) {
            self.0.push((slot, frame.clone()));
        }
    }

    fn linear(value: i16) -> Frame {
        let mut payload = Vec::new();
        lpcm_write(std::iter::repeat(value).take(80), &mut payload);
        Frame::audio(payload)
    }

    #[test]
    fn test_null_bridge_passes_frame() {
        let mut object = MpfObject::NullBridge(NullBridge::new(SlotId(0), SlotId(1)));
        let mut frames = FrameCache::new();
        frames.insert(SlotId(0), linear(7));

        let mut out = Collect::default();
        object.process(&frames, &mut out);
        assert_eq!(out.0, vec![(SlotId(1), linear(7))]);
    }

    #[test]
    fn test_bridge_missing_source_writes_empty() {
        let mut object = MpfObject::Bridge(Bridge::new(SlotId(0), SlotId(1), None, None));
        let mut out = Collect::default();
        object.process(&FrameCache::new(), &mut out);
        assert!(out.0[0].1.is_empty());
    }

    #[test]
    fn test_mixer_sums_with_wraparound() {
        let inputs = vec![
            MixerInput { slot: SlotId(0), decoder: None },
            MixerInput { slot: SlotId(1), decoder: None },
            MixerInput { slot: SlotId(3), decoder: None },
        ];
        let mut object = MpfObject::Mixer(Mixer::new(inputs, SlotId(2), None, 80));
        assert_eq!(object.sources(), vec![SlotId(0), SlotId(1), SlotId(3)]);

        let mut frames = FrameCache::new();
        frames.insert(SlotId(0), linear(i16::MAX));
        frames.insert(SlotId(1), linear(1));
        frames.insert(SlotId(3), Frame::event(NamedEvent::new(9), FrameMarker::StartOfEvent));

        let mut out = Collect::default();
        object.process(&frames, &mut out);
        let (slot, mixed) = &out.0[0];
        assert_eq!(*slot, SlotId(2));
        assert!(mixed.has_audio());
        assert!(mixed.has_event());
        assert_eq!(mixed.event.event_id, 9);
        assert!(lpcm_samples(&mixed.payload).all(|s| s == i16::MIN));
    }

    #[test]
    fn test_mixer_silent_inputs_yield_empty_frame() {
        let inputs = vec![MixerInput { slot: SlotId(0), decoder: None }];
        let mut object = MpfObject::Mixer(Mixer::new(inputs, SlotId(1), None, 80));
        let mut out = Collect::default();
        object.process(&FrameCache::new(), &mut out);
        assert!(out.0[0].1.is_empty());
        assert_eq!(out.0[0].1.payload.len(), 160);
    }

    #[test]
    fn test_multiplier_fans_out() {
        let outputs = vec![
            MultiplierOutput { slot: SlotId(1), encoder: None },
            MultiplierOutput { slot: SlotId(2), encoder: None },
        ];
        let mut object = MpfObject::Multiplier(Multiplier::new(SlotId(0), None, outputs));
        assert_eq!(object.sinks(), vec![SlotId(1), SlotId(2)]);

        let mut frames = FrameCache::new();
        frames.insert(SlotId(0), linear(3));
        let mut out = Collect::default();
        object.process(&frames, &mut out);
        assert_eq!(out.0.len(), 2);
        assert_eq!(out.0[1], (SlotId(2), linear(3)));
    }
}
