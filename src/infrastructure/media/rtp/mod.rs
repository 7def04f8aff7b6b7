//! RTP (Real-time Transport Protocol) Implementation
//!
//! This module implements RTP/RTCP according to RFC 3550.

pub mod jitter_buffer;
pub mod packet;
pub mod receiver;
pub mod rtcp;
pub mod socket;
pub mod stream;
pub mod termination;
pub mod transmitter;

pub use jitter_buffer::{JbError, JitterBuffer, JitterBufferStats};
pub use packet::{RtpError, RtpHeader};
pub use receiver::{RtpReceiver, RtpRxStats, RxOutcome, SeqResult};
pub use rtcp::{Goodbye, ReceiverReport, RtcpError, RtcpPacket, SenderReport, SourceDescription};
pub use socket::{PortAllocator, RtpSocketPair};
pub use stream::{RtpStream, RtpStreamConfig, RTCP_BYE_SESSION_ENDED, RTCP_BYE_TALKSPURT_ENDED};
pub use termination::{RtpTermination, RtpTerminationFactory};
pub use transmitter::{RtpTransmitter, TxOutput};
