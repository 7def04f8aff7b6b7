//! Media processing implementations

pub mod buffer_stream;
pub mod codec;
pub mod context;
pub mod dtmf;
pub mod file;
pub mod objects;
pub mod rtp;
pub mod stream;
pub mod termination;
pub mod timer;

pub use buffer_stream::{BufferStream, FrameQueue};
pub use codec::{Codec, CodecManager};
pub use context::MediaContext;
pub use dtmf::{DtmfBand, DtmfDetector, DtmfGenerator};
pub use file::{FilePlayer, FileRecorder};
pub use objects::MpfObject;
pub use rtp::{RtpStream, RtpTermination, RtpTerminationFactory};
pub use stream::{AudioStream, StreamBase};
pub use termination::{MediaEnv, StreamTermination, Termination, TerminationDescriptor, TerminationFactory};
pub use timer::{TimerId, TimerManager};
