//! G.711 Audio Codec Implementation
//!
//! G.711 is a narrowband audio codec that provides toll-quality audio at 64 kbit/s.
//! It includes two main companding algorithms:
//! - μ-law (PCMU): Used primarily in North America and Japan
//! - A-law (PCMA): Used in Europe and rest of the world
//!
//! Both codecs take internal linear frames (host order 16-bit) on encode and
//! produce them on decode.

use super::Codec;
use crate::domain::codec::{CodecAttribs, CodecDescriptor, SampleRates};
use crate::domain::frame::{lpcm_samples, lpcm_write};
use crate::domain::shared::Result;

/// G.711 Codec Type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum G711Type {
    /// μ-law (PCMU) - Payload Type 0
    PCMU,
    /// A-law (PCMA) - Payload Type 8
    PCMA,
}

impl G711Type {
    /// Get RTP payload type
    pub fn payload_type(&self) -> u8 {
        match self {
            G711Type::PCMU => 0,
            G711Type::PCMA => 8,
        }
    }

    /// Get codec name
    pub fn name(&self) -> &'static str {
        match self {
            G711Type::PCMU => "PCMU",
            G711Type::PCMA => "PCMA",
        }
    }

    /// Encoded silence byte
    pub fn silence(&self) -> u8 {
        match self {
            G711Type::PCMU => 0xFF,
            G711Type::PCMA => 0xD5,
        }
    }

    /// Static descriptor (RFC3551)
    pub fn descriptor(&self) -> CodecDescriptor {
        CodecDescriptor::new(self.payload_type(), self.name(), 8000)
    }

    pub fn attribs(&self) -> CodecAttribs {
        CodecAttribs::new(self.name(), 8, SampleRates::RATE_8000)
    }
}

const ULAW_BIAS: i32 = 0x84;
const ULAW_CLIP: i32 = 32635;

/// Compress one linear sample to μ-law
pub fn linear_to_ulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };
    pcm = pcm.min(ULAW_CLIP) + ULAW_BIAS;

    // pcm >> 7 is in 1..=255, its highest bit is the segment
    let exponent = 7 - ((pcm >> 7) as u8).leading_zeros() as u8;
    let mantissa = ((pcm >> (exponent + 3)) & 0x0F) as u8;

    !(sign | (exponent << 4) | mantissa)
}

/// Expand one μ-law byte to a linear sample
pub fn ulaw_to_linear(ulaw: u8) -> i16 {
    let u = !ulaw;
    let exponent = (u >> 4) & 0x07;
    let mantissa = (u & 0x0F) as i32;
    let magnitude = (((mantissa << 3) + ULAW_BIAS) << exponent) - ULAW_BIAS;
    if u & 0x80 != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Segment end points for A-law (13-bit magnitude)
const ALAW_SEG_END: [i32; 8] = [0x1F, 0x3F, 0x7F, 0xFF, 0x1FF, 0x3FF, 0x7FF, 0xFFF];

/// Compress one linear sample to A-law
pub fn linear_to_alaw(sample: i16) -> u8 {
    let mut pcm = (sample as i32) >> 3;
    let mask = if pcm >= 0 {
        0xD5
    } else {
        pcm = -pcm - 1;
        0x55
    };

    let segment = ALAW_SEG_END.iter().position(|&end| pcm <= end);
    let alaw = match segment {
        None => 0x7F,
        Some(seg) => {
            let mantissa = (if seg < 2 { pcm >> 1 } else { pcm >> seg }) & 0x0F;
            ((seg as i32) << 4 | mantissa) as u8
        }
    };
    alaw ^ mask
}

/// Expand one A-law byte to a linear sample
pub fn alaw_to_linear(alaw: u8) -> i16 {
    let a = alaw ^ 0x55;
    let mut magnitude = ((a & 0x0F) as i32) << 4;
    let segment = (a & 0x70) >> 4;
    match segment {
        0 => magnitude += 8,
        1 => magnitude += 0x108,
        _ => {
            magnitude += 0x108;
            magnitude <<= segment - 1;
        }
    }
    if a & 0x80 != 0 {
        magnitude as i16
    } else {
        -magnitude as i16
    }
}

/// G.711 codec instance
pub struct G711Codec {
    kind: G711Type,
    attribs: CodecAttribs,
}

impl G711Codec {
    pub fn new(kind: G711Type) -> Self {
        Self {
            kind,
            attribs: kind.attribs(),
        }
    }

    pub fn pcmu() -> Self {
        Self::new(G711Type::PCMU)
    }

    pub fn pcma() -> Self {
        Self::new(G711Type::PCMA)
    }

    pub fn kind(&self) -> G711Type {
        self.kind
    }
}

impl Codec for G711Codec {
    fn attribs(&self) -> &CodecAttribs {
        &self.attribs
    }

    fn encode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        output.clear();
        let compress = match self.kind {
            G711Type::PCMU => linear_to_ulaw,
            G711Type::PCMA => linear_to_alaw,
        };
        output.extend(lpcm_samples(input).map(compress));
        Ok(())
    }

    fn decode(&mut self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let expand = match self.kind {
            G711Type::PCMU => ulaw_to_linear,
            G711Type::PCMA => alaw_to_linear,
        };
        lpcm_write(input.iter().map(|&byte| expand(byte)), output);
        Ok(())
    }

    fn initialize(&self, output: &mut Vec<u8>, size: usize) {
        output.clear();
        output.resize(size, self.kind.silence());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(samples: &[i16]) -> Vec<u8> {
        let mut out = Vec::new();
        lpcm_write(samples.iter().copied(), &mut out);
        out
    }

    #[test]
    fn test_g711_type_payload() {
        assert_eq!(G711Type::PCMU.payload_type(), 0);
        assert_eq!(G711Type::PCMA.payload_type(), 8);
        assert_eq!(G711Type::PCMA.descriptor().name, "PCMA");
    }

    #[test]
    fn test_ulaw_reference_points() {
        assert_eq!(linear_to_ulaw(0), 0xFF);
        assert_eq!(ulaw_to_linear(0xFF), 0);
        assert_eq!(ulaw_to_linear(0x00), -32124);
        assert_eq!(ulaw_to_linear(0x80), 32124);
        // extreme input must not overflow
        assert_eq!(linear_to_ulaw(i16::MIN), 0x00);
    }

    #[test]
    fn test_alaw_reference_points() {
        assert_eq!(linear_to_alaw(0), 0xD5);
        assert_eq!(alaw_to_linear(0xD5), 8);
        assert_eq!(alaw_to_linear(0x55), -8);
    }

    #[test]
    fn test_pcmu_encode_decode() {
        let original: Vec<i16> = vec![0, 1000, -1000, 5000, -5000, 10000, -10000];
        let mut codec = G711Codec::pcmu();
        let mut encoded = Vec::new();
        let mut decoded = Vec::new();
        codec.encode(&linear(&original), &mut encoded).unwrap();
        assert_eq!(encoded.len(), original.len());
        codec.decode(&encoded, &mut decoded).unwrap();

        let decoded: Vec<i16> = lpcm_samples(&decoded).collect();
        for (orig, dec) in original.iter().zip(decoded.iter()) {
            let diff = (orig - dec).abs();
            assert!(diff < 500, "Difference too large: {} vs {}", orig, dec);
        }
    }

    #[test]
    fn test_pcma_encode_decode() {
        let original: Vec<i16> = vec![5000, -5000, 10000, -10000, 20000, -20000];
        let mut codec = G711Codec::pcma();
        let mut encoded = Vec::new();
        let mut decoded = Vec::new();
        codec.encode(&linear(&original), &mut encoded).unwrap();
        codec.decode(&encoded, &mut decoded).unwrap();

        let decoded: Vec<i16> = lpcm_samples(&decoded).collect();
        for (orig, dec) in original.iter().zip(decoded.iter()) {
            assert_eq!(orig.signum(), dec.signum());
            let ratio = dec.abs() as f64 / orig.abs() as f64;
            assert!(ratio > 0.9 && ratio < 1.1, "{} -> {}", orig, dec);
        }
    }

    #[test]
    fn test_initialize_silence() {
        let codec = G711Codec::pcma();
        let mut out = Vec::new();
        codec.initialize(&mut out, 80);
        assert_eq!(out.len(), 80);
        assert!(out.iter().all(|&b| b == 0xD5));
    }
}
