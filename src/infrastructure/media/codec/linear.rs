//! Linear PCM codecs
//!
//! LPCM is the internal representation (host byte order); L16 is its
//! network byte order counterpart on the wire.

use super::Codec;
use crate::domain::codec::{CodecAttribs, CodecDescriptor, SampleRates, LPCM};
use crate::domain::shared::Result;

fn all_rates() -> SampleRates {
    SampleRates::all()
}

/// Internal linear codec, a plain copy in both directions
pub struct LpcmCodec {
    attribs: CodecAttribs,
}

impl LpcmCodec {
    pub fn new() -> Self {
        Self {
            attribs: CodecAttribs::new(LPCM, 16, all_rates()),
        }
    }
}

impl Default for LpcmCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for LpcmCodec {
    fn attribs(&self) -> &CodecAttribs {
        &self.attribs
    }

    fn encode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        output.clear();
        output.extend_from_slice(input);
        Ok(())
    }

    fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        output.clear();
        output.extend_from_slice(input);
        Ok(())
    }
}

/// L16 (RFC3551), big-endian 16-bit linear
pub struct L16Codec {
    attribs: CodecAttribs,
}

impl L16Codec {
    pub const NAME: &'static str = "L16";

    pub fn new() -> Self {
        Self {
            attribs: CodecAttribs::new(Self::NAME, 16, all_rates()),
        }
    }

    /// Default dynamic descriptor offered for L16
    pub fn descriptor() -> CodecDescriptor {
        CodecDescriptor::new(96, Self::NAME, 8000)
    }

    fn swap(input: &[u8], output: &mut Vec<u8>, to_wire: bool) {
        output.clear();
        output.reserve(input.len());
        for pair in input.chunks_exact(2) {
            let bytes = if to_wire {
                i16::from_ne_bytes([pair[0], pair[1]]).to_be_bytes()
            } else {
                i16::from_be_bytes([pair[0], pair[1]]).to_ne_bytes()
            };
            output.extend_from_slice(&bytes);
        }
    }
}

impl Default for L16Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for L16Codec {
    fn attribs(&self) -> &CodecAttribs {
        &self.attribs
    }

    fn encode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        Self::swap(input, output, true);
        Ok(())
    }

    fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        Self::swap(input, output, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::{lpcm_samples, lpcm_write};

    #[test]
    fn test_l16_is_big_endian_on_wire() {
        let mut linear = Vec::new();
        lpcm_write([0x0102i16, -2], &mut linear);

        let mut codec = L16Codec::new();
        let mut wire = Vec::new();
        codec.encode(&linear, &mut wire).unwrap();
        assert_eq!(wire, vec![0x01, 0x02, 0xFF, 0xFE]);

        let mut back = Vec::new();
        codec.decode(&wire, &mut back).unwrap();
        assert_eq!(lpcm_samples(&back).collect::<Vec<_>>(), vec![0x0102, -2]);
    }

    #[test]
    fn test_lpcm_copies() {
        let mut codec = LpcmCodec::new();
        let mut out = Vec::new();
        codec.encode(&[1, 2, 3, 4], &mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
        assert!(codec.attribs().sample_rates.supports(48000));
    }
}
