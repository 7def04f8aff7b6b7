//! Audio Codec Implementations

pub mod g711;
pub mod linear;
pub mod manager;

pub use g711::{G711Codec, G711Type};
pub use linear::{L16Codec, LpcmCodec};
pub use manager::CodecManager;

use crate::domain::codec::CodecAttribs;
use crate::domain::shared::{MpfError, Result};

/// Codec implementation
///
/// `encode` takes internal linear frames and produces the wire format;
/// `decode` does the reverse.
pub trait Codec: Send {
    fn attribs(&self) -> &CodecAttribs;

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn encode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()>;

    fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()>;

    /// Split a packet payload into frames of `frame_size` bytes
    fn dissect<'a>(&self, payload: &'a [u8], frame_size: usize) -> Result<Vec<&'a [u8]>> {
        if frame_size == 0 || payload.len() < frame_size {
            return Err(MpfError::Codec(format!(
                "{}: payload of {} bytes shorter than frame of {}",
                self.attribs().name,
                payload.len(),
                frame_size
            )));
        }
        Ok(payload.chunks_exact(frame_size).collect())
    }

    /// Fill `output` with `size` bytes of encoded silence
    fn initialize(&self, output: &mut Vec<u8>, size: usize) {
        output.clear();
        output.resize(size, 0);
    }
}
