//! Terminations: named media endpoints placed into a media context
//!
//! A termination owns one audio stream and exposes the lifecycle used by
//! the engine: add, modify, subtract, destroy. Factories build the
//! termination and its stream for a given kind of endpoint.

use super::codec::CodecManager;
use super::stream::AudioStream;
use super::timer::{TimerId, TimerManager};
use crate::domain::media::RtpStreamDescriptor;
use crate::domain::shared::{MpfError, Result, TerminationId};
use tracing::debug;

/// Engine services lent to terminations while they run an operation
pub struct MediaEnv<'a> {
    pub timers: &'a mut TimerManager,
    pub codecs: &'a CodecManager,
}

/// Descriptor accompanying add/modify
///
/// On return it carries the negotiated (local) side for the signaling
/// answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationDescriptor {
    Rtp(RtpStreamDescriptor),
}

/// Termination lifecycle
pub trait Termination: Send {
    fn id(&self) -> TerminationId;

    fn name(&self) -> &str;

    fn stream(&self) -> &dyn AudioStream;

    fn stream_mut(&mut self) -> &mut dyn AudioStream;

    /// Placed into a context
    fn add(&mut self, descriptor: Option<&mut TerminationDescriptor>, env: &mut MediaEnv<'_>) -> Result<()> {
        match descriptor {
            Some(descriptor) => self.modify(descriptor, env),
            None => Ok(()),
        }
    }

    fn modify(&mut self, _descriptor: &mut TerminationDescriptor, _env: &mut MediaEnv<'_>) -> Result<()> {
        Err(MpfError::InvalidOperation(format!(
            "termination {} does not accept descriptors",
            self.name()
        )))
    }

    /// Removed from its context; no further media flows
    fn subtract(&mut self, _env: &mut MediaEnv<'_>) -> Result<()> {
        Ok(())
    }

    /// A timer owned by this termination expired
    fn on_timer(&mut self, _timer: TimerId, _env: &mut MediaEnv<'_>) {}

    fn destroy(&mut self) -> Result<()> {
        debug!("Destroy termination {}", self.name());
        self.stream_mut().destroy()
    }
}

/// Builds terminations of one kind
pub trait TerminationFactory: Send + Sync {
    fn create_termination(&self, name: &str) -> Result<Box<dyn Termination>>;
}

/// Termination around a self-contained stream (file, buffer)
pub struct StreamTermination {
    id: TerminationId,
    name: String,
    stream: Box<dyn AudioStream>,
}

impl StreamTermination {
    pub fn new(name: impl Into<String>, stream: Box<dyn AudioStream>) -> Self {
        Self {
            id: TerminationId::new(),
            name: name.into(),
            stream,
        }
    }
}

impl Termination for StreamTermination {
    fn id(&self) -> TerminationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self) -> &dyn AudioStream {
        self.stream.as_ref()
    }

    fn stream_mut(&mut self) -> &mut dyn AudioStream {
        self.stream.as_mut()
    }
}
