//! Media context
//!
//! A context holds a fixed number of termination slots and a directed
//! association matrix between them. Applying the topology turns the matrix
//! into dataflow objects; each engine tick reads every source once and runs
//! the objects.

use super::codec::CodecManager;
use super::objects::{
    Bridge, Decoder, Encoder, FrameCache, FrameSink, Mixer, MixerInput, MpfObject, Multiplier, MultiplierOutput,
    NullBridge,
};
use super::termination::Termination;
use crate::domain::codec::CodecDescriptor;
use crate::domain::frame::Frame;
use crate::domain::shared::{ContextId, MpfError, Result, SlotId, TerminationId};
use tracing::{debug, info, trace, warn};

struct Slot {
    termination: Box<dyn Termination>,
    /// Outgoing associations (row count)
    tx_count: usize,
    /// Incoming associations (column count)
    rx_count: usize,
    rx_open: bool,
    tx_open: bool,
}

/// Set of associated terminations and the objects realizing them
pub struct MediaContext {
    id: ContextId,
    name: String,
    capacity: usize,
    count: usize,
    slots: Vec<Option<Slot>>,
    /// `capacity x capacity`, row = source, column = sink
    matrix: Vec<bool>,
    objects: Vec<MpfObject>,
    frames: FrameCache,
    applied: bool,
}

/// Writes object output to the sink streams of a context
struct SlotWriter<'a> {
    slots: &'a mut [Option<Slot>],
}

impl FrameSink for SlotWriter<'_> {
    fn write_frame(&mut self, slot: SlotId, frame: &Frame) {
        if let Some(Some(entry)) = self.slots.get_mut(slot.0) {
            if !entry.tx_open {
                return;
            }
            if let Err(e) = entry.termination.stream_mut().write_frame(frame) {
                trace!("Write frame to {} failed: {}", entry.termination.name(), e);
            }
        }
    }
}

impl MediaContext {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            id: ContextId::new(),
            name: name.into(),
            capacity,
            count: 0,
            slots,
            matrix: vec![false; capacity * capacity],
            objects: Vec::new(),
            frames: FrameCache::new(),
            applied: false,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_applied(&self) -> bool {
        self.applied
    }

    pub fn objects(&self) -> &[MpfObject] {
        &self.objects
    }

    pub fn slot_of(&self, id: TerminationId) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.termination.id() == id))
            .map(SlotId)
    }

    pub fn termination(&self, slot: SlotId) -> Option<&dyn Termination> {
        self.slots.get(slot.0)?.as_ref().map(|s| s.termination.as_ref())
    }

    pub fn termination_mut(&mut self, slot: SlotId) -> Option<&mut dyn Termination> {
        let slot = self.slots.get_mut(slot.0)?.as_mut()?;
        Some(slot.termination.as_mut())
    }

    /// Iterate occupied slots
    pub fn terminations(&self) -> impl Iterator<Item = (SlotId, &dyn Termination)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|s| (SlotId(i), s.termination.as_ref())))
    }

    pub fn tx_count(&self, slot: SlotId) -> usize {
        self.slot(slot).map_or(0, |s| s.tx_count)
    }

    pub fn rx_count(&self, slot: SlotId) -> usize {
        self.slot(slot).map_or(0, |s| s.rx_count)
    }

    /// Directed edge `source -> sink` is present
    pub fn is_associated(&self, source: SlotId, sink: SlotId) -> bool {
        source.0 < self.capacity && sink.0 < self.capacity && self.matrix[self.edge(source.0, sink.0)]
    }

    /// Place a termination into the first free slot
    pub fn termination_add(&mut self, termination: Box<dyn Termination>) -> Result<SlotId> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            warn!(
                "Failed to add termination {} to context {}: capacity {} exceeded",
                termination.name(),
                self.name,
                self.capacity
            );
            return Err(MpfError::CapacityExceeded(format!(
                "context {} holds at most {} terminations",
                self.name, self.capacity
            )));
        };

        debug!("Add termination {} to context {} [{}]", termination.name(), self.name, index);
        self.slots[index] = Some(Slot {
            termination,
            tx_count: 0,
            rx_count: 0,
            rx_open: false,
            tx_open: false,
        });
        self.count += 1;
        Ok(SlotId(index))
    }

    /// Take a termination out of the context together with its associations
    ///
    /// An applied topology is destroyed first since its objects may refer
    /// to the slot.
    pub fn termination_subtract(&mut self, slot: SlotId) -> Result<Box<dyn Termination>> {
        if self.slot(slot).is_none() {
            return Err(MpfError::NotFound(format!("{} in context {}", slot, self.name)));
        }
        if self.applied {
            self.topology_destroy();
        }

        for other in 0..self.capacity {
            self.edge_clear(slot.0, other);
            self.edge_clear(other, slot.0);
        }

        let entry = self.slots[slot.0]
            .take()
            .ok_or_else(|| MpfError::NotFound(format!("{} in context {}", slot, self.name)))?;
        self.count -= 1;
        debug!(
            "Subtract termination {} from context {} [{}]",
            entry.termination.name(),
            self.name,
            slot.0
        );
        Ok(entry.termination)
    }

    /// Associate two terminations
    ///
    /// Each direction is added only if the first end can produce media and
    /// the second can consume it.
    pub fn association_add(&mut self, t1: SlotId, t2: SlotId) -> Result<()> {
        let (Some(a), Some(b)) = (self.slot(t1), self.slot(t2)) else {
            return Err(MpfError::NotFound(format!("association {} <-> {}", t1, t2)));
        };
        let forward = a.termination.stream().is_source() && b.termination.stream().is_sink();
        let backward = b.termination.stream().is_source() && a.termination.stream().is_sink();

        if forward {
            self.edge_set(t1.0, t2.0);
        }
        if backward {
            self.edge_set(t2.0, t1.0);
        }
        debug!(
            "Add association {} {} {} in context {}",
            t1,
            match (forward, backward) {
                (true, true) => "<->",
                (true, false) => "->",
                (false, true) => "<-",
                (false, false) => "x",
            },
            t2,
            self.name
        );
        Ok(())
    }

    /// Remove both directions between two terminations
    pub fn association_remove(&mut self, t1: SlotId, t2: SlotId) -> Result<()> {
        if self.slot(t1).is_none() || self.slot(t2).is_none() {
            return Err(MpfError::NotFound(format!("association {} <-> {}", t1, t2)));
        }
        self.edge_clear(t1.0, t2.0);
        self.edge_clear(t2.0, t1.0);
        debug!("Remove association {} <-> {} in context {}", t1, t2, self.name);
        Ok(())
    }

    /// Remove every association in the context
    pub fn associations_reset(&mut self) {
        self.matrix.iter_mut().for_each(|edge| *edge = false);
        for slot in self.slots.iter_mut().flatten() {
            slot.tx_count = 0;
            slot.rx_count = 0;
        }
        debug!("Reset associations in context {}", self.name);
    }

    /// Realize the association matrix as dataflow objects
    ///
    /// Any existing topology is destroyed first.
    pub fn topology_apply(&mut self, codecs: &CodecManager) -> Result<()> {
        if self.applied {
            self.topology_destroy();
        }
        self.streams_open(codecs);

        for i in 0..self.capacity {
            let Some(slot) = self.slot(SlotId(i)) else {
                continue;
            };
            let (tx_count, rx_count) = (slot.tx_count, slot.rx_count);

            if tx_count == 1 {
                if let Some(j) = (0..self.capacity).find(|&j| self.matrix[self.edge(i, j)]) {
                    if self.rx_count(SlotId(j)) == 1 {
                        if let Some(object) = self.bridge_create(SlotId(i), SlotId(j), codecs) {
                            self.objects.push(object);
                        }
                    }
                }
            } else if tx_count > 1 {
                if let Some(object) = self.multiplier_create(SlotId(i), codecs) {
                    self.objects.push(object);
                }
            }

            if rx_count > 1 {
                if let Some(object) = self.mixer_create(SlotId(i), codecs) {
                    self.objects.push(object);
                }
            }
        }

        self.applied = true;
        info!("Apply topology in context {} [{} objects]", self.name, self.objects.len());
        for object in &self.objects {
            debug!("{}", object.trace());
        }
        Ok(())
    }

    /// Drop every object and close the streams they used
    pub fn topology_destroy(&mut self) {
        if !self.applied {
            return;
        }
        self.objects.clear();
        self.frames.clear();

        for slot in self.slots.iter_mut().flatten() {
            if slot.rx_open {
                if let Err(e) = slot.termination.stream_mut().close_rx() {
                    debug!("Close rx of {} failed: {}", slot.termination.name(), e);
                }
                slot.rx_open = false;
            }
            if slot.tx_open {
                if let Err(e) = slot.termination.stream_mut().close_tx() {
                    debug!("Close tx of {} failed: {}", slot.termination.name(), e);
                }
                slot.tx_open = false;
            }
        }
        self.applied = false;
        info!("Destroy topology in context {}", self.name);
    }

    /// Run one tick
    pub fn process(&mut self) {
        if self.objects.is_empty() {
            return;
        }

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let Some(slot) = slot.as_mut() else {
                continue;
            };
            if !slot.rx_open {
                continue;
            }
            let frame = self.frames.entry(SlotId(i)).or_default();
            if let Err(e) = slot.termination.stream_mut().read_frame(frame) {
                trace!("Read frame from {} failed: {}", slot.termination.name(), e);
                frame.clear();
            }
        }

        let mut writer = SlotWriter {
            slots: &mut self.slots,
        };
        for object in self.objects.iter_mut() {
            object.process(&self.frames, &mut writer);
        }
    }

    /// Log the association matrix
    pub fn trace(&self) {
        for (i, slot) in self.slots.iter().enumerate() {
            let Some(slot) = slot else {
                continue;
            };
            let row: String = (0..self.capacity)
                .map(|j| if self.matrix[self.edge(i, j)] { '1' } else { '0' })
                .collect();
            debug!(
                "{} [{}] {} tx:{} rx:{} {}",
                self.name,
                i,
                row,
                slot.tx_count,
                slot.rx_count,
                slot.termination.stream().trace()
            );
        }
    }

    fn slot(&self, slot: SlotId) -> Option<&Slot> {
        self.slots.get(slot.0)?.as_ref()
    }

    fn edge(&self, source: usize, sink: usize) -> usize {
        source * self.capacity + sink
    }

    fn edge_set(&mut self, source: usize, sink: usize) {
        let edge = self.edge(source, sink);
        if self.matrix[edge] {
            return;
        }
        self.matrix[edge] = true;
        if let Some(slot) = self.slots[source].as_mut() {
            slot.tx_count += 1;
        }
        if let Some(slot) = self.slots[sink].as_mut() {
            slot.rx_count += 1;
        }
    }

    fn edge_clear(&mut self, source: usize, sink: usize) {
        let edge = self.edge(source, sink);
        if !self.matrix[edge] {
            return;
        }
        self.matrix[edge] = false;
        if let Some(slot) = self.slots[source].as_mut() {
            slot.tx_count -= 1;
        }
        if let Some(slot) = self.slots[sink].as_mut() {
            slot.rx_count -= 1;
        }
    }

    /// Open rx on every associated source and tx on every associated sink
    fn streams_open(&mut self, codecs: &CodecManager) {
        for slot in self.slots.iter_mut().flatten() {
            let name = slot.termination.name().to_string();
            let stream = slot.termination.stream_mut();

            if slot.tx_count > 0 && !slot.rx_open {
                let codec = stream.base().rx_descriptor.as_ref().and_then(|d| codecs.codec_get(d));
                match stream.open_rx(codec) {
                    Ok(()) => slot.rx_open = true,
                    Err(e) => warn!("Failed to open rx of {}: {}", name, e),
                }
            }
            if slot.rx_count > 0 && !slot.tx_open {
                let codec = stream.base().tx_descriptor.as_ref().and_then(|d| codecs.codec_get(d));
                match stream.open_tx(codec) {
                    Ok(()) => slot.tx_open = true,
                    Err(e) => warn!("Failed to open tx of {}: {}", name, e),
                }
            }
        }
    }

    fn rx_descriptor(&self, slot: SlotId) -> Option<CodecDescriptor> {
        self.slot(slot)?.termination.stream().base().rx_descriptor.clone()
    }

    fn tx_descriptor(&self, slot: SlotId) -> Option<CodecDescriptor> {
        self.slot(slot)?.termination.stream().base().tx_descriptor.clone()
    }

    fn bridge_create(&self, source: SlotId, sink: SlotId, codecs: &CodecManager) -> Option<MpfObject> {
        let rx = self.rx_descriptor(source)?;
        let tx = self.tx_descriptor(sink)?;
        if !rates_agree(&rx, &tx) {
            return None;
        }
        if rx.matches(&tx) && rx.sampling_rate == tx.sampling_rate {
            return Some(MpfObject::NullBridge(NullBridge::new(source, sink)));
        }
        let decoder = decoder_create(&rx, codecs).ok()?;
        let encoder = encoder_create(&tx, codecs).ok()?;
        Some(MpfObject::Bridge(Bridge::new(source, sink, decoder, encoder)))
    }

    fn multiplier_create(&self, source: SlotId, codecs: &CodecManager) -> Option<MpfObject> {
        let rx = self.rx_descriptor(source)?;
        let mut outputs = Vec::new();
        for j in 0..self.capacity {
            let sink = SlotId(j);
            if !self.matrix[self.edge(source.0, j)] || self.rx_count(sink) != 1 {
                continue;
            }
            let Some(tx) = self.tx_descriptor(sink) else {
                continue;
            };
            if !rates_agree(&rx, &tx) {
                continue;
            }
            let Ok(encoder) = encoder_create(&tx, codecs) else {
                continue;
            };
            outputs.push(MultiplierOutput { slot: sink, encoder });
        }
        if outputs.is_empty() {
            return None;
        }
        let decoder = decoder_create(&rx, codecs).ok()?;
        Some(MpfObject::Multiplier(Multiplier::new(source, decoder, outputs)))
    }

    fn mixer_create(&self, sink: SlotId, codecs: &CodecManager) -> Option<MpfObject> {
        let tx = self.tx_descriptor(sink)?;
        let mut inputs = Vec::new();
        for i in 0..self.capacity {
            let source = SlotId(i);
            if !self.matrix[self.edge(i, sink.0)] {
                continue;
            }
            let Some(rx) = self.rx_descriptor(source) else {
                continue;
            };
            if !rates_agree(&rx, &tx) {
                continue;
            }
            let Ok(decoder) = decoder_create(&rx, codecs) else {
                continue;
            };
            inputs.push(MixerInput { slot: source, decoder });
        }
        if inputs.is_empty() {
            return None;
        }
        let encoder = encoder_create(&tx, codecs).ok()?;
        Some(MpfObject::Mixer(Mixer::new(inputs, sink, encoder, tx.frame_samples())))
    }
}

impl Drop for MediaContext {
    fn drop(&mut self) {
        self.topology_destroy();
    }
}

/// Resampling is not supported; such legs are left unconnected
fn rates_agree(rx: &CodecDescriptor, tx: &CodecDescriptor) -> bool {
    if rx.sampling_rate != tx.sampling_rate || rx.channel_count != tx.channel_count {
        warn!("Cannot connect {} -> {}: sampling rates differ", rx, tx);
        return false;
    }
    true
}

fn decoder_create(descriptor: &CodecDescriptor, codecs: &CodecManager) -> Result<Option<Decoder>> {
    if descriptor.is_lpcm() {
        return Ok(None);
    }
    match codecs.codec_get(descriptor) {
        Some(codec) => Ok(Some(Decoder::new(codec, descriptor.clone()))),
        None => {
            warn!("No decoder for {}", descriptor);
            Err(MpfError::Codec(format!("no decoder for {}", descriptor)))
        }
    }
}

fn encoder_create(descriptor: &CodecDescriptor, codecs: &CodecManager) -> Result<Option<Encoder>> {
    if descriptor.is_lpcm() {
        return Ok(None);
    }
    match codecs.codec_get(descriptor) {
        Some(codec) => Ok(Some(Encoder::new(codec, descriptor.clone()))),
        None => {
            warn!("No encoder for {}", descriptor);
            Err(MpfError::Codec(format!("no encoder for {}", descriptor)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::media::{StreamCapabilities, StreamDirection};
    use crate::infrastructure::media::codec::Codec;
    use crate::infrastructure::media::stream::{AudioStream, StreamBase};
    use crate::infrastructure::media::termination::StreamTermination;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct TestStream {
        base: StreamBase,
        written: Arc<Mutex<Vec<Frame>>>,
        value: u8,
    }

    impl AudioStream for TestStream {
        fn base(&self) -> &StreamBase {
            &self.base
        }

        fn open_rx(&mut self, _codec: Option<Box<dyn Codec>>) -> Result<()> {
            Ok(())
        }

        fn close_rx(&mut self) -> Result<()> {
            Ok(())
        }

        fn read_frame(&mut self, frame: &mut Frame) -> Result<()> {
            let size = match &self.base.rx_descriptor {
                Some(d) if d.is_lpcm() => d.lpcm_frame_size(),
                Some(d) => d.frame_samples(),
                None => 0,
            };
            *frame = Frame::audio(vec![self.value; size]);
            Ok(())
        }

        fn open_tx(&mut self, _codec: Option<Box<dyn Codec>>) -> Result<()> {
            Ok(())
        }

        fn close_tx(&mut self) -> Result<()> {
            Ok(())
        }

        fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            self.written.lock().push(frame.clone());
            Ok(())
        }
    }

    fn termination(
        direction: StreamDirection,
        descriptor: CodecDescriptor,
        value: u8,
    ) -> (Box<dyn Termination>, Arc<Mutex<Vec<Frame>>>) {
        let mut base = StreamBase::new(StreamCapabilities::new(direction));
        base.rx_descriptor = Some(descriptor.clone());
        base.tx_descriptor = Some(descriptor);
        let written = Arc::new(Mutex::new(Vec::new()));
        let stream = TestStream {
            base,
            written: written.clone(),
            value,
        };
        (Box::new(StreamTermination::new("test", Box::new(stream))), written)
    }

    fn lpcm() -> CodecDescriptor {
        CodecDescriptor::lpcm(8000, 1)
    }

    #[test]
    fn test_capacity_exceeded() {
        let mut context = MediaContext::new("ctx", 1);
        context
            .termination_add(termination(StreamDirection::DUPLEX, lpcm(), 0).0)
            .unwrap();
        let result = context.termination_add(termination(StreamDirection::DUPLEX, lpcm(), 0).0);
        assert!(matches!(result, Err(MpfError::CapacityExceeded(_))));
    }

    #[test]
    fn test_association_respects_direction() {
        let mut context = MediaContext::new("ctx", 4);
        let a = context
            .termination_add(termination(StreamDirection::RECEIVE, lpcm(), 0).0)
            .unwrap();
        let b = context
            .termination_add(termination(StreamDirection::DUPLEX, lpcm(), 0).0)
            .unwrap();
        context.association_add(a, b).unwrap();

        assert!(context.is_associated(a, b));
        assert!(!context.is_associated(b, a));
        assert_eq!(context.tx_count(a), 1);
        assert_eq!(context.rx_count(a), 0);
        assert_eq!(context.rx_count(b), 1);
    }

    #[test]
    fn test_duplex_pair_builds_null_bridges() {
        let codecs = CodecManager::with_default_codecs();
        let mut context = MediaContext::new("ctx", 4);
        let (t1, w1) = termination(StreamDirection::DUPLEX, lpcm(), 1);
        let (t2, w2) = termination(StreamDirection::DUPLEX, lpcm(), 2);
        let a = context.termination_add(t1).unwrap();
        let b = context.termination_add(t2).unwrap();
        context.association_add(a, b).unwrap();
        context.topology_apply(&codecs).unwrap();

        assert_eq!(context.objects().len(), 2);
        assert!(context.objects().iter().all(|o| o.kind() == "null-bridge"));

        context.process();
        assert_eq!(w1.lock()[0].payload, vec![2; 160]);
        assert_eq!(w2.lock()[0].payload, vec![1; 160]);
    }

    #[test]
    fn test_two_sources_into_one_sink_builds_mixer() {
        let codecs = CodecManager::with_default_codecs();
        let mut context = MediaContext::new("ctx", 4);
        let a = context
            .termination_add(termination(StreamDirection::RECEIVE, lpcm(), 1).0)
            .unwrap();
        let b = context
            .termination_add(termination(StreamDirection::RECEIVE, lpcm(), 2).0)
            .unwrap();
        let (sink, written) = termination(StreamDirection::SEND, lpcm(), 0);
        let c = context.termination_add(sink).unwrap();
        context.association_add(a, c).unwrap();
        context.association_add(b, c).unwrap();
        context.topology_apply(&codecs).unwrap();

        assert_eq!(context.objects().len(), 1);
        let mixer = &context.objects()[0];
        assert_eq!(mixer.kind(), "mixer");
        assert_eq!(mixer.sources(), vec![a, b]);
        assert_eq!(mixer.sinks(), vec![c]);

        context.process();
        // Bytes 0x0101 + 0x0202 per sample
        assert_eq!(written.lock()[0].payload, vec![3; 160]);
    }

    #[test]
    fn test_one_source_two_sinks_builds_multiplier() {
        let codecs = CodecManager::with_default_codecs();
        let mut context = MediaContext::new("ctx", 4);
        let a = context
            .termination_add(termination(StreamDirection::RECEIVE, lpcm(), 5).0)
            .unwrap();
        let (s1, w1) = termination(StreamDirection::SEND, lpcm(), 0);
        let (s2, w2) = termination(StreamDirection::SEND, lpcm(), 0);
        let b = context.termination_add(s1).unwrap();
        let c = context.termination_add(s2).unwrap();
        context.association_add(a, b).unwrap();
        context.association_add(a, c).unwrap();
        context.topology_apply(&codecs).unwrap();

        assert_eq!(context.objects().len(), 1);
        assert_eq!(context.objects()[0].kind(), "multiplier");
        context.process();
        assert_eq!(w1.lock().len(), 1);
        assert_eq!(w2.lock().len(), 1);
    }

    #[test]
    fn test_pcmu_to_lpcm_inserts_decoder() {
        let codecs = CodecManager::with_default_codecs();
        let mut context = MediaContext::new("ctx", 2);
        let a = context
            .termination_add(termination(StreamDirection::RECEIVE, CodecDescriptor::new(0, "PCMU", 8000), 0xFF).0)
            .unwrap();
        let (sink, written) = termination(StreamDirection::SEND, lpcm(), 0);
        let b = context.termination_add(sink).unwrap();
        context.association_add(a, b).unwrap();
        context.topology_apply(&codecs).unwrap();

        assert_eq!(context.objects()[0].kind(), "bridge");
        context.process();
        // 0xFF is mu-law zero
        let frame = written.lock()[0].clone();
        assert_eq!(frame.payload.len(), 160);
        assert!(frame.payload.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_subtract_removes_associations_and_topology() {
        let codecs = CodecManager::with_default_codecs();
        let mut context = MediaContext::new("ctx", 4);
        let (t1, _) = termination(StreamDirection::DUPLEX, lpcm(), 1);
        let id = t1.id();
        let a = context.termination_add(t1).unwrap();
        let b = context
            .termination_add(termination(StreamDirection::DUPLEX, lpcm(), 2).0)
            .unwrap();
        context.association_add(a, b).unwrap();
        context.topology_apply(&codecs).unwrap();

        assert_eq!(context.slot_of(id), Some(a));
        let removed = context.termination_subtract(a).unwrap();
        assert_eq!(removed.id(), id);
        assert!(!context.is_applied());
        assert!(context.objects().is_empty());
        assert_eq!(context.tx_count(b), 0);
        assert_eq!(context.rx_count(b), 0);
        assert_eq!(context.count(), 1);
        assert!(context.slot_of(id).is_none());
    }

    #[test]
    fn test_associations_reset() {
        let mut context = MediaContext::new("ctx", 4);
        let a = context
            .termination_add(termination(StreamDirection::DUPLEX, lpcm(), 1).0)
            .unwrap();
        let b = context
            .termination_add(termination(StreamDirection::DUPLEX, lpcm(), 2).0)
            .unwrap();
        context.association_add(a, b).unwrap();
        context.associations_reset();
        assert!(!context.is_associated(a, b));
        assert_eq!(context.tx_count(a), 0);
        assert!(context.association_remove(a, SlotId(3)).is_err());
    }
}
