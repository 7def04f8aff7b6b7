//! RTP receive path
//!
//! Validates inbound packets, tracks SSRC, sequence and timestamp history,
//! maintains RFC 3550 reception statistics and feeds the jitter buffer.

use super::jitter_buffer::JitterBuffer;
use super::packet::{RtpError, RtpHeader};
use crate::domain::codec::{CodecDescriptor, RTP_PT_CN};
use crate::domain::frame::{Frame, NamedEvent};
use crate::infrastructure::metrics;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

const RTP_SEQ_MOD: u32 = 1 << 16;
/// Largest forward sequence jump treated as in-order
const MAX_DROPOUT: u16 = 3000;
/// Backward sequence distance treated as misorder rather than drift
const MAX_MISORDER: u32 = 3000;
/// Consecutive packets a new SSRC must deliver before adoption
const SSRC_PROBATION: u8 = 5;
/// Arrival/timestamp deviation (samples) forcing a restart
const DEVIATION_THRESHOLD: i64 = 4000;
/// Discarded to received percentage forcing a restart
const DISCARDED_TO_RECEIVED_RATIO_THRESHOLD: u32 = 30;
/// Silence gap after which a talkspurt marker is synthesized
const TALKSPURT_GAP: Duration = Duration::from_millis(1000);

/// Overall receiver counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtpRxStats {
    pub received_packets: u32,
    pub invalid_packets: u32,
    pub discarded_packets: u32,
    pub ignored_packets: u32,
    pub misordered_packets: u32,
    pub lost_packets: u32,
    pub restarts: u8,
}

/// Values reported in an RTCP reception report block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtcpRrStat {
    pub ssrc: u32,
    pub fraction: u8,
    pub lost: i32,
    pub last_seq: u32,
    pub jitter: u32,
    pub lsr: u32,
    pub dlsr: u32,
}

#[derive(Debug, Clone, Default)]
struct RxHistory {
    seq_cycles: u32,
    seq_num_base: u16,
    seq_num_max: u16,
    bad_seq: Option<u16>,
    ts_last: u32,
    time_last: Option<Instant>,
    ssrc_new: u32,
    ssrc_probation: u8,
}

#[derive(Debug, Clone, Default)]
struct PeriodicHistory {
    expected_prior: u32,
    received_prior: u32,
    discarded_prior: u32,
    jitter_min: u32,
    jitter_max: u32,
}

/// Sequence number classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqResult {
    Update,
    Misorder,
    Drift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SsrcResult {
    Update,
    Probation,
    Restart,
}

/// What became of one inbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    /// Audio written to the jitter buffer
    Buffered,
    /// Named event written to the jitter buffer
    Event,
    /// Rejected by the jitter buffer
    Discarded,
    /// Comfort noise or unknown payload type
    Ignored,
    /// Sent by an SSRC still on probation
    Probation,
    /// Timestamp drift restarted the receiver, packet dropped
    Restarted,
}

/// RTP receiver
pub struct RtpReceiver {
    descriptor: CodecDescriptor,
    event_payload_type: Option<u8>,
    jb: JitterBuffer,
    stat: RtpRxStats,
    rr_stat: RtcpRrStat,
    history: RxHistory,
    periodic: PeriodicHistory,
}

impl RtpReceiver {
    pub fn new(jb: JitterBuffer, descriptor: CodecDescriptor, event_payload_type: Option<u8>) -> Self {
        Self {
            descriptor,
            event_payload_type,
            jb,
            stat: RtpRxStats::default(),
            rr_stat: RtcpRrStat::default(),
            history: RxHistory::default(),
            periodic: PeriodicHistory::default(),
        }
    }

    pub fn descriptor(&self) -> &CodecDescriptor {
        &self.descriptor
    }

    pub fn jitter_buffer(&self) -> &JitterBuffer {
        &self.jb
    }

    pub fn stats(&self) -> &RtpRxStats {
        &self.stat
    }

    pub fn rr_stat(&self) -> &RtcpRrStat {
        &self.rr_stat
    }

    /// Lowest and highest jitter seen in the current reporting period
    pub fn jitter_range(&self) -> (u32, u32) {
        (self.periodic.jitter_min, self.periodic.jitter_max)
    }

    /// Extended packets expected from the first to the highest sequence
    fn expected_packets(&self) -> u32 {
        if self.history.time_last.is_none() {
            return 0;
        }
        (self.history.seq_cycles + self.history.seq_num_max as u32)
            .wrapping_sub(self.history.seq_num_base as u32)
            .wrapping_add(1)
    }

    fn stat_init(&mut self, header: &RtpHeader, time: Instant) {
        self.rr_stat.ssrc = header.ssrc;
        self.history.seq_num_base = header.sequence;
        self.history.seq_num_max = header.sequence;
        self.history.bad_seq = None;
        self.history.ts_last = header.timestamp;
        self.history.time_last = Some(time);
    }

    /// Reset statistics and history, keeping the restart count
    fn restart(&mut self) {
        let restarts = self.stat.restarts.wrapping_add(1);
        self.stat = RtpRxStats {
            restarts,
            ..Default::default()
        };
        self.history = RxHistory::default();
        self.periodic = PeriodicHistory::default();
        self.jb.restart();
        metrics::record_receiver_restart();
        debug!(ssrc = format_args!("{:08x}", self.rr_stat.ssrc), restarts, "Restart RTP receiver");
    }

    fn ssrc_update(&mut self, ssrc: u32) -> SsrcResult {
        if self.rr_stat.ssrc == ssrc {
            // known ssrc, abandon any pending probation
            self.history.ssrc_probation = 0;
            self.history.ssrc_new = 0;
            return SsrcResult::Update;
        }

        if self.history.ssrc_probation > 0 && self.history.ssrc_new == ssrc {
            self.history.ssrc_probation -= 1;
            if self.history.ssrc_probation == 0 {
                self.rr_stat.ssrc = ssrc;
                return SsrcResult::Restart;
            }
        } else {
            self.history.ssrc_new = ssrc;
            self.history.ssrc_probation = SSRC_PROBATION - 1;
        }
        SsrcResult::Probation
    }

    /// Classify a sequence number and extend the highest one seen
    pub fn seq_update(&mut self, seq: u16) -> SeqResult {
        let delta = seq.wrapping_sub(self.history.seq_num_max);
        let result = if delta < MAX_DROPOUT {
            if seq < self.history.seq_num_max {
                // sequence number wrapped
                self.history.seq_cycles = self.history.seq_cycles.wrapping_add(RTP_SEQ_MOD);
            }
            self.history.seq_num_max = seq;
            SeqResult::Update
        } else if delta as u32 <= RTP_SEQ_MOD - MAX_MISORDER {
            SeqResult::Drift
        } else {
            self.stat.misordered_packets += 1;
            SeqResult::Misorder
        };
        self.stat.received_packets += 1;
        result
    }

    /// Update the interarrival jitter estimate; false on drift
    fn ts_update(&mut self, time: Instant, ts: u32) -> bool {
        let elapsed = self
            .history
            .time_last
            .map_or(0, |last| time.saturating_duration_since(last).as_millis() as i64);
        let arrival = elapsed * self.descriptor.channel_count as i64 * self.descriptor.sampling_rate as i64
            / 1000;
        let deviation = (arrival - ts.wrapping_sub(self.history.ts_last) as i32 as i64).abs();

        if deviation > DEVIATION_THRESHOLD {
            return false;
        }

        let deviation = deviation as u32;
        self.rr_stat.jitter = self
            .rr_stat
            .jitter
            .wrapping_add(deviation)
            .wrapping_sub((self.rr_stat.jitter + 8) >> 4);
        trace!(jitter = self.rr_stat.jitter, deviation, "RTP jitter update");
        self.history.time_last = Some(time);
        self.history.ts_last = ts;

        self.periodic.jitter_min = self.periodic.jitter_min.min(self.rr_stat.jitter);
        self.periodic.jitter_max = self.periodic.jitter_max.max(self.rr_stat.jitter);
        true
    }

    fn failure_threshold_check(&mut self) {
        let received = self.stat.received_packets - self.periodic.received_prior;
        let discarded = self.stat.discarded_packets - self.periodic.discarded_prior;

        if discarded * 100 > received * DISCARDED_TO_RECEIVED_RATIO_THRESHOLD {
            warn!(received, discarded, "RTP discard ratio exceeded");
            self.restart();
        }
    }

    /// Process one datagram from the RTP socket
    pub fn receive(&mut self, data: &[u8], time: Instant) -> Result<RxOutcome, RtpError> {
        let (header, payload) = match RtpHeader::parse(data) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.stat.invalid_packets += 1;
                return Err(e);
            }
        };
        trace!("Receive {} size={}", header, payload.len());

        if self.stat.received_packets == 0 {
            self.stat_init(&header, time);
        }

        match self.ssrc_update(header.ssrc) {
            SsrcResult::Probation => {
                self.stat.invalid_packets += 1;
                return Ok(RxOutcome::Probation);
            }
            SsrcResult::Restart => {
                debug!(ssrc = format_args!("{:08x}", header.ssrc), "Adopt new RTP SSRC");
                self.restart();
                self.stat_init(&header, time);
            }
            SsrcResult::Update => {}
        }

        if self.seq_update(header.sequence) == SeqResult::Drift {
            // confirmed once the next packet continues the new sequence
            if self.history.bad_seq == Some(header.sequence) {
                debug!(seq = header.sequence, "RTP sequence restarted");
                self.restart();
                self.stat_init(&header, time);
                self.stat.received_packets += 1;
            } else {
                self.history.bad_seq = Some(header.sequence.wrapping_add(1));
            }
        }
        metrics::record_rtp_received();

        if header.payload_type == self.descriptor.payload_type {
            let gap = self
                .history
                .time_last
                .map_or(false, |last| time.saturating_duration_since(last) > TALKSPURT_GAP);
            if !self.ts_update(time, header.timestamp) {
                self.restart();
                return Ok(RxOutcome::Restarted);
            }

            let marker = header.marker || gap;
            if let Err(e) = self.jb.write(payload, header.timestamp, marker) {
                trace!("Jitter buffer rejected packet: {}", e);
                self.stat.discarded_packets += 1;
                metrics::record_rtp_discarded();
                self.failure_threshold_check();
                return Ok(RxOutcome::Discarded);
            }
            Ok(RxOutcome::Buffered)
        } else if Some(header.payload_type) == self.event_payload_type {
            let Some(event) = NamedEvent::parse(payload) else {
                self.stat.discarded_packets += 1;
                return Ok(RxOutcome::Discarded);
            };
            if self.jb.event_write(&event, header.timestamp, header.marker).is_err() {
                self.stat.discarded_packets += 1;
                metrics::record_rtp_discarded();
                return Ok(RxOutcome::Discarded);
            }
            Ok(RxOutcome::Event)
        } else {
            if header.payload_type != RTP_PT_CN {
                trace!(pt = header.payload_type, "Unexpected RTP payload type");
            }
            self.stat.ignored_packets += 1;
            Ok(RxOutcome::Ignored)
        }
    }

    /// Pop the next 10ms frame
    pub fn read(&mut self) -> Frame {
        self.jb.read()
    }

    /// Close the reporting period: fraction lost and cumulative loss
    pub fn periodic_history_update(&mut self) {
        let expected_packets = self.expected_packets();

        let expected_interval = expected_packets.wrapping_sub(self.periodic.expected_prior);
        self.periodic.expected_prior = expected_packets;

        let received_interval = self.stat.received_packets - self.periodic.received_prior;
        self.periodic.received_prior = self.stat.received_packets;

        let lost_interval = expected_interval.saturating_sub(received_interval);

        self.rr_stat.fraction = if expected_interval == 0 || lost_interval == 0 {
            0
        } else {
            ((lost_interval << 8) / expected_interval).min(255) as u8
        };

        self.rr_stat.lost = expected_packets.saturating_sub(self.stat.received_packets) as i32;
        self.rr_stat.last_seq = self.history.seq_num_max as u32;

        self.periodic.discarded_prior = self.stat.discarded_packets;
        self.periodic.jitter_min = self.rr_stat.jitter;
        self.periodic.jitter_max = self.rr_stat.jitter;
    }

    /// Final loss accounting when the receiver is closed
    pub fn close(&mut self) -> &RtpRxStats {
        self.stat.lost_packets = if self.stat.received_packets > 0 {
            self.expected_packets().saturating_sub(self.stat.received_packets)
        } else {
            0
        };
        &self.stat
    }
}
