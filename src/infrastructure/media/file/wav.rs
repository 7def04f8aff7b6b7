//! RIFF/WAVE container for 16-bit PCM

use std::io::{self, Read, Seek, SeekFrom, Write};
use thiserror::Error;

const WAVE_FORMAT_PCM: u16 = 1;
const HEADER_SIZE: u32 = 44;

#[derive(Error, Debug)]
pub enum WavError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid WAV file: {0}")]
    InvalidFormat(String),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),
}

/// WAV audio format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// 16-bit PCM
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample: 16,
        }
    }

    /// Bytes per sample frame (all channels)
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }

    /// Duration in seconds of `data_size` bytes
    pub fn duration(&self, data_size: usize) -> f64 {
        let frames = data_size / self.block_align().max(1) as usize;
        frames as f64 / self.sample_rate as f64
    }
}

/// Decoded WAV file: format plus little-endian sample data
#[derive(Debug, Clone)]
pub struct WavFile {
    pub format: WavFormat,
    pub data: Vec<u8>,
}

impl WavFile {
    /// Parse a 16-bit PCM WAV stream; chunks other than `fmt ` and `data`
    /// are skipped
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self, WavError> {
        let mut riff = [0u8; 12];
        reader.read_exact(&mut riff)?;
        if &riff[0..4] != b"RIFF" {
            return Err(WavError::InvalidFormat("missing RIFF signature".into()));
        }
        if &riff[8..12] != b"WAVE" {
            return Err(WavError::InvalidFormat("not a WAVE file".into()));
        }

        let mut format = None;
        let mut data = None;
        while format.is_none() || data.is_none() {
            let mut chunk = [0u8; 8];
            if reader.read_exact(&mut chunk).is_err() {
                break;
            }
            let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as usize;

            match &chunk[0..4] {
                b"fmt " => format = Some(Self::parse_fmt(reader, size)?),
                b"data" => {
                    let mut samples = vec![0u8; size];
                    reader.read_exact(&mut samples)?;
                    data = Some(samples);
                }
                _ => {
                    reader.seek(SeekFrom::Current(size as i64))?;
                }
            }
            // Chunks are word aligned
            if size % 2 != 0 {
                reader.seek(SeekFrom::Current(1))?;
            }
        }

        let format = format.ok_or_else(|| WavError::InvalidFormat("missing fmt chunk".into()))?;
        let data = data.ok_or_else(|| WavError::InvalidFormat("missing data chunk".into()))?;
        Ok(Self { format, data })
    }

    fn parse_fmt<R: Read>(reader: &mut R, size: usize) -> Result<WavFormat, WavError> {
        if size < 16 {
            return Err(WavError::InvalidFormat("fmt chunk too small".into()));
        }
        let mut fmt = vec![0u8; size];
        reader.read_exact(&mut fmt)?;

        let audio_format = u16::from_le_bytes([fmt[0], fmt[1]]);
        let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
        let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
        let bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);

        if audio_format != WAVE_FORMAT_PCM {
            return Err(WavError::UnsupportedFormat(format!("audio format {}", audio_format)));
        }
        if bits_per_sample != 16 {
            return Err(WavError::UnsupportedFormat(format!("{} bits per sample", bits_per_sample)));
        }
        if channels == 0 || sample_rate == 0 {
            return Err(WavError::InvalidFormat(format!(
                "{} channels at {} Hz",
                channels, sample_rate
            )));
        }
        Ok(WavFormat {
            channels,
            sample_rate,
            bits_per_sample,
        })
    }

    pub fn duration(&self) -> f64 {
        self.format.duration(self.data.len())
    }

    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }
}

/// Incremental WAV writer; sizes are patched on `finalize`
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    format: WavFormat,
    data_size: u32,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(mut inner: W, format: WavFormat) -> Result<Self, WavError> {
        write_header(&mut inner, &format, 0)?;
        Ok(Self {
            inner,
            format,
            data_size: 0,
        })
    }

    pub fn format(&self) -> &WavFormat {
        &self.format
    }

    /// Bytes of sample data written so far
    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    pub fn write_samples(&mut self, samples: impl IntoIterator<Item = i16>) -> Result<(), WavError> {
        let mut buf = Vec::new();
        for sample in samples {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
        self.inner.write_all(&buf)?;
        self.data_size += buf.len() as u32;
        Ok(())
    }

    /// Patch the header sizes and hand back the inner writer
    pub fn finalize(mut self) -> Result<W, WavError> {
        self.inner.seek(SeekFrom::Start(0))?;
        write_header(&mut self.inner, &self.format, self.data_size)?;
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

fn write_header<W: Write>(out: &mut W, format: &WavFormat, data_size: u32) -> io::Result<()> {
    let mut header = Vec::with_capacity(HEADER_SIZE as usize);
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(HEADER_SIZE - 8 + data_size).to_le_bytes());
    header.extend_from_slice(b"WAVE");
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes());
    header.extend_from_slice(&WAVE_FORMAT_PCM.to_le_bytes());
    header.extend_from_slice(&format.channels.to_le_bytes());
    header.extend_from_slice(&format.sample_rate.to_le_bytes());
    header.extend_from_slice(&format.byte_rate().to_le_bytes());
    header.extend_from_slice(&format.block_align().to_le_bytes());
    header.extend_from_slice(&format.bits_per_sample.to_le_bytes());
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());
    out.write_all(&header)
}
