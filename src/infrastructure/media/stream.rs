//! Audio stream contract
//!
//! Every media endpoint (RTP, file, in-memory buffer) implements
//! [`AudioStream`]. Operations outside a stream's capabilities fail with
//! `InvalidOperation`; the media context only calls `read_frame` on
//! sources and `write_frame` on sinks.

use super::codec::Codec;
use crate::domain::codec::CodecDescriptor;
use crate::domain::frame::Frame;
use crate::domain::media::{StreamCapabilities, StreamDirection};
use crate::domain::shared::{MpfError, Result};
use std::fmt::Write;

/// State shared by all stream implementations
#[derive(Debug, Clone)]
pub struct StreamBase {
    pub capabilities: StreamCapabilities,
    /// Current direction, a subset of the capabilities
    pub direction: StreamDirection,
    pub rx_descriptor: Option<CodecDescriptor>,
    pub rx_event_descriptor: Option<CodecDescriptor>,
    pub tx_descriptor: Option<CodecDescriptor>,
    pub tx_event_descriptor: Option<CodecDescriptor>,
}

impl StreamBase {
    pub fn new(capabilities: StreamCapabilities) -> Self {
        Self {
            direction: capabilities.direction,
            capabilities,
            rx_descriptor: None,
            rx_event_descriptor: None,
            tx_descriptor: None,
            tx_event_descriptor: None,
        }
    }
}

fn unsupported(operation: &str) -> MpfError {
    MpfError::InvalidOperation(format!("{} is not supported by this stream", operation))
}

/// Audio stream operations
pub trait AudioStream: Send {
    fn base(&self) -> &StreamBase;

    fn direction(&self) -> StreamDirection {
        self.base().direction
    }

    /// Stream yields frames (`read_frame`)
    fn is_source(&self) -> bool {
        self.direction().can_receive() && self.base().rx_descriptor.is_some()
    }

    /// Stream consumes frames (`write_frame`)
    fn is_sink(&self) -> bool {
        self.direction().can_send() && self.base().tx_descriptor.is_some()
    }

    fn destroy(&mut self) -> Result<()> {
        Ok(())
    }

    fn open_rx(&mut self, _codec: Option<Box<dyn Codec>>) -> Result<()> {
        Err(unsupported("open_rx"))
    }

    fn close_rx(&mut self) -> Result<()> {
        Err(unsupported("close_rx"))
    }

    fn read_frame(&mut self, _frame: &mut Frame) -> Result<()> {
        Err(unsupported("read_frame"))
    }

    fn open_tx(&mut self, _codec: Option<Box<dyn Codec>>) -> Result<()> {
        Err(unsupported("open_tx"))
    }

    fn close_tx(&mut self) -> Result<()> {
        Err(unsupported("close_tx"))
    }

    fn write_frame(&mut self, _frame: &Frame) -> Result<()> {
        Err(unsupported("write_frame"))
    }

    /// One-line description of the negotiated formats
    fn trace(&self) -> String {
        let base = self.base();
        let mut out = format!("[{}]", base.direction);
        if let Some(rx) = &base.rx_descriptor {
            let _ = write!(out, " rx:{}", rx);
        }
        if let Some(tx) = &base.tx_descriptor {
            let _ = write!(out, " tx:{}", tx);
        }
        out
    }
}
