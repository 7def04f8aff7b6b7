//! In-memory frame queues bridging application threads and the engine
//!
//! A buffer stream reads the frames an application pushed into its
//! incoming queue (e.g. synthesized speech) and writes the frames the
//! context produces into its outgoing queue (e.g. audio for a recognizer).

use super::codec::Codec;
use super::dtmf::{DtmfDetector, DtmfGenerator};
use super::stream::{AudioStream, StreamBase};
use crate::domain::codec::CodecDescriptor;
use crate::domain::frame::Frame;
use crate::domain::media::{StreamCapabilities, StreamDirection};
use crate::domain::shared::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Bounded frame queue shared across threads
#[derive(Clone)]
pub struct FrameQueue {
    frames: Arc<Mutex<VecDeque<Frame>>>,
    capacity: usize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append a frame; the oldest frame is dropped when full
    ///
    /// Returns false if a frame was dropped.
    pub fn push(&self, frame: Frame) -> bool {
        let mut frames = self.frames.lock();
        let dropped = frames.len() >= self.capacity;
        if dropped {
            frames.pop_front();
        }
        frames.push_back(frame);
        !dropped
    }

    pub fn pop(&self) -> Option<Frame> {
        self.frames.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}

/// Linear audio stream over two frame queues
pub struct BufferStream {
    base: StreamBase,
    incoming: FrameQueue,
    outgoing: FrameQueue,
    generator: Option<Arc<DtmfGenerator>>,
    detector: Option<Arc<DtmfDetector>>,
}

impl BufferStream {
    pub fn new(direction: StreamDirection, sample_rate: u32, capacity: usize) -> Self {
        let mut base = StreamBase::new(StreamCapabilities::new(direction));
        let descriptor = CodecDescriptor::lpcm(sample_rate, 1);
        if direction.can_receive() {
            base.rx_descriptor = Some(descriptor.clone());
        }
        if direction.can_send() {
            base.tx_descriptor = Some(descriptor);
        }
        Self {
            base,
            incoming: FrameQueue::new(capacity),
            outgoing: FrameQueue::new(capacity),
            generator: None,
            detector: None,
        }
    }

    /// Digits queued on the generator are mixed into frames read from the
    /// stream
    pub fn with_generator(mut self, generator: Arc<DtmfGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Frames written to the stream are inspected for digits
    pub fn with_detector(mut self, detector: Arc<DtmfDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Queue read by the context
    pub fn incoming(&self) -> FrameQueue {
        self.incoming.clone()
    }

    /// Queue written by the context
    pub fn outgoing(&self) -> FrameQueue {
        self.outgoing.clone()
    }
}

impl AudioStream for BufferStream {
    fn base(&self) -> &StreamBase {
        &self.base
    }

    fn open_rx(&mut self, _codec: Option<Box<dyn Codec>>) -> Result<()> {
        debug!("Open buffer stream rx");
        Ok(())
    }

    fn close_rx(&mut self) -> Result<()> {
        debug!("Close buffer stream rx [{} pending]", self.incoming.len());
        self.incoming.clear();
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut Frame) -> Result<()> {
        match self.incoming.pop() {
            Some(next) => *frame = next,
            None => frame.clear(),
        }
        if let Some(generator) = &self.generator {
            generator.put_frame(frame);
        }
        Ok(())
    }

    fn open_tx(&mut self, _codec: Option<Box<dyn Codec>>) -> Result<()> {
        debug!("Open buffer stream tx");
        Ok(())
    }

    fn close_tx(&mut self) -> Result<()> {
        debug!("Close buffer stream tx");
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if let Some(detector) = &self.detector {
            detector.put_frame(frame);
        }
        if !self.outgoing.push(frame.clone()) {
            trace!("Buffer stream outgoing queue full, oldest frame dropped");
        }
        Ok(())
    }
}
