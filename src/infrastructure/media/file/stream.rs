//! WAV file streams: a playback source and a recorder sink

use super::wav::{WavFile, WavFormat, WavWriter};
use crate::domain::codec::CodecDescriptor;
use crate::domain::frame::{lpcm_samples, lpcm_write, Frame, FrameType};
use crate::domain::media::{StreamCapabilities, StreamDirection};
use crate::domain::shared::{MpfError, Result};
use crate::infrastructure::media::codec::Codec;
use crate::infrastructure::media::stream::{AudioStream, StreamBase};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Plays a WAV file as linear frames, then yields empty frames
pub struct FilePlayer {
    base: StreamBase,
    path: PathBuf,
    samples: Vec<i16>,
    position: usize,
    frame_samples: usize,
    eof: bool,
}

impl FilePlayer {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let wav = WavFile::from_reader(&mut file)
            .map_err(|e| MpfError::InvalidOperation(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_wav(path, &wav))
    }

    pub fn from_wav(path: impl Into<PathBuf>, wav: &WavFile) -> Self {
        let descriptor = CodecDescriptor::lpcm(wav.format.sample_rate, wav.format.channels as u8);
        let mut base = StreamBase::new(StreamCapabilities::new(StreamDirection::RECEIVE));
        let frame_samples = descriptor.frame_samples();
        base.rx_descriptor = Some(descriptor);
        Self {
            base,
            path: path.into(),
            samples: wav.samples().collect(),
            position: 0,
            frame_samples,
            eof: false,
        }
    }

    /// All samples have been played
    pub fn is_eof(&self) -> bool {
        self.eof
    }
}

impl AudioStream for FilePlayer {
    fn base(&self) -> &StreamBase {
        &self.base
    }

    fn open_rx(&mut self, _codec: Option<Box<dyn Codec>>) -> Result<()> {
        info!("Open file player {} [{} samples]", self.path.display(), self.samples.len());
        self.position = 0;
        self.eof = false;
        Ok(())
    }

    fn close_rx(&mut self) -> Result<()> {
        debug!("Close file player {}", self.path.display());
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if self.position >= self.samples.len() {
            if !self.eof {
                info!("File player {} reached end of file", self.path.display());
                self.eof = true;
            }
            frame.clear();
            return Ok(());
        }

        let end = (self.position + self.frame_samples).min(self.samples.len());
        let chunk = &self.samples[self.position..end];
        // The last frame is padded with silence
        let padding = self.frame_samples - chunk.len();
        *frame = Frame::empty();
        frame.frame_type = FrameType::AUDIO;
        lpcm_write(
            chunk.iter().copied().chain(std::iter::repeat(0).take(padding)),
            &mut frame.payload,
        );
        self.position = end;
        Ok(())
    }
}

/// Records linear frames into a WAV file
pub struct FileRecorder {
    base: StreamBase,
    path: PathBuf,
    format: WavFormat,
    writer: Option<WavWriter<BufWriter<File>>>,
    /// Stop writing once this many bytes are recorded (0 = unlimited)
    max_size: u32,
}

impl FileRecorder {
    pub fn new(path: impl Into<PathBuf>, sample_rate: u32, max_size: u32) -> Self {
        let mut base = StreamBase::new(StreamCapabilities::new(StreamDirection::SEND));
        base.tx_descriptor = Some(CodecDescriptor::lpcm(sample_rate, 1));
        Self {
            base,
            path: path.into(),
            format: WavFormat::pcm16(sample_rate, 1),
            writer: None,
            max_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes of audio recorded by the open writer
    pub fn recorded_size(&self) -> u32 {
        self.writer.as_ref().map_or(0, |w| w.data_size())
    }
}

impl AudioStream for FileRecorder {
    fn base(&self) -> &StreamBase {
        &self.base
    }

    fn destroy(&mut self) -> Result<()> {
        if self.writer.is_some() {
            self.close_tx()?;
        }
        Ok(())
    }

    fn open_tx(&mut self, _codec: Option<Box<dyn Codec>>) -> Result<()> {
        let file = File::create(&self.path)?;
        let writer = WavWriter::new(BufWriter::new(file), self.format)
            .map_err(|e| MpfError::InvalidOperation(format!("{}: {}", self.path.display(), e)))?;
        info!("Open file recorder {}", self.path.display());
        self.writer = Some(writer);
        Ok(())
    }

    fn close_tx(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Err(MpfError::InvalidOperation("file recorder is not open".into()));
        };
        let size = writer.data_size();
        writer
            .finalize()
            .map_err(|e| MpfError::InvalidOperation(format!("{}: {}", self.path.display(), e)))?;
        info!("Close file recorder {} [{} bytes]", self.path.display(), size);
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(MpfError::InvalidOperation("file recorder is not open".into()));
        };
        if self.max_size != 0 && writer.data_size() >= self.max_size {
            return Ok(());
        }

        let result = if frame.has_audio() {
            writer.write_samples(lpcm_samples(&frame.payload))
        } else {
            let samples = self.base.tx_descriptor.as_ref().map_or(0, |d| d.frame_samples());
            writer.write_samples(std::iter::repeat(0).take(samples))
        };
        result.map_err(|e| {
            warn!("Failed to record to {}: {}", self.path.display(), e);
            MpfError::InvalidOperation(e.to_string())
        })
    }
}
