//! Jitter Buffer Implementation
//!
//! Ring of frame slots indexed by RTP timestamp. Writes are placed
//! `playout_delay` ahead of the read cursor; reads advance one frame per
//! tick. The delay grows on late packets when adaptive, and a min/max
//! window over the buffered length detects clock skew between the sender
//! and the local tick.

use crate::config::JitterBufferConfig;
use crate::domain::codec::CodecDescriptor;
use crate::domain::frame::{Frame, FrameMarker, FrameType, NamedEvent};
use crate::infrastructure::media::codec::Codec;
use thiserror::Error;
use tracing::{debug, trace};

/// Reads per skew measurement window
pub const SKEW_WINDOW: usize = 50;

/// Rejected jitter buffer writes
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JbError {
    #[error("Frame arrived too late")]
    TooLate,
    #[error("Frame arrived too early")]
    TooEarly,
    #[error("Payload is not frame aligned")]
    Misaligned,
}

/// Jitter Buffer Statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JitterBufferStats {
    pub frames_written: u64,
    pub frames_read: u64,
    pub underflows: u64,
    pub too_late: u64,
    pub too_early: u64,
    pub misaligned: u64,
    pub events_written: u64,
    pub skew_corrections: u64,
    pub restarts: u64,
}

/// Named event currently being assembled
#[derive(Debug, Clone, Copy)]
struct EventTrack {
    event_id: u8,
    ts: u32,
    duration: u16,
    ended: bool,
}

/// Jitter Buffer
pub struct JitterBuffer {
    config: JitterBufferConfig,
    codec: Option<Box<dyn Codec>>,
    frames: Vec<Frame>,
    frame_count: usize,
    frame_ts: u32,
    frame_size: usize,

    playout_delay_ts: u32,
    max_playout_delay_ts: u32,

    write_sync: bool,
    write_ts_offset: u32,
    write_ts: u32,
    read_ts: u32,
    /// Slot holding the frame at `read_ts`
    read_slot: usize,

    event: Option<EventTrack>,

    min_length_ts: u32,
    max_length_ts: u32,
    measurement_count: usize,

    stats: JitterBufferStats,
}

/// Signed distance between two timestamps
fn ts_diff(a: u32, b: u32) -> i32 {
    a.wrapping_sub(b) as i32
}

impl JitterBuffer {
    /// Create a buffer for the given receive descriptor
    ///
    /// `codec` dissects packet payloads into frames; without one the
    /// payload is treated as 16-bit linear audio.
    pub fn new(
        config: &JitterBufferConfig,
        descriptor: &CodecDescriptor,
        codec: Option<Box<dyn Codec>>,
    ) -> Self {
        let config = config.normalized();
        let ms_to_ts = |ms: u32| {
            (ms as u64 * descriptor.channel_count as u64 * descriptor.sampling_rate as u64 / 1000)
                as u32
        };

        let frame_ts = (descriptor.frame_samples() as u32).max(1);
        let bits_per_sample = codec.as_ref().map_or(16, |c| c.attribs().bits_per_sample);
        let frame_size = descriptor.frame_size(bits_per_sample);
        let playout_delay_ts = ms_to_ts(config.initial_playout_delay);
        let max_playout_delay_ts = ms_to_ts(config.max_playout_delay);
        let frame_count = (max_playout_delay_ts / frame_ts) as usize + 1;

        debug!(
            "Create jitter buffer [{}] playout={}ms max={}ms frames={}",
            descriptor, config.initial_playout_delay, config.max_playout_delay, frame_count
        );

        Self {
            config,
            codec,
            frames: vec![Frame::empty(); frame_count],
            frame_count,
            frame_ts,
            frame_size,
            playout_delay_ts,
            max_playout_delay_ts,
            write_sync: true,
            write_ts_offset: 0,
            write_ts: 0,
            read_ts: 0,
            read_slot: 0,
            event: None,
            min_length_ts: 0,
            max_length_ts: 0,
            measurement_count: 0,
            stats: JitterBufferStats::default(),
        }
    }

    /// Drop buffered frames and resynchronize on the next write
    pub fn restart(&mut self) {
        for frame in self.frames.iter_mut() {
            frame.clear();
        }
        self.write_sync = true;
        self.write_ts_offset = 0;
        self.write_ts = self.read_ts;
        self.event = None;
        self.measurement_count = 0;
        self.stats.restarts += 1;
        debug!("Restart jitter buffer at ts={}", self.read_ts);
    }

    pub fn frame_ts(&self) -> u32 {
        self.frame_ts
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn playout_delay_ts(&self) -> u32 {
        self.playout_delay_ts
    }

    pub fn max_playout_delay_ts(&self) -> u32 {
        self.max_playout_delay_ts
    }

    pub fn read_ts(&self) -> u32 {
        self.read_ts
    }

    pub fn write_ts(&self) -> u32 {
        self.write_ts
    }

    /// Buffered length in timestamp units
    pub fn length_ts(&self) -> u32 {
        self.write_ts.wrapping_sub(self.read_ts)
    }

    pub fn is_empty(&self) -> bool {
        self.write_ts == self.read_ts
    }

    pub fn stats(&self) -> &JitterBufferStats {
        &self.stats
    }

    /// Slots are addressed by distance from the read cursor, so the mapping
    /// stays continuous when timestamps wrap past `u32::MAX`. `ts` must not
    /// precede `read_ts`.
    fn slot(&mut self, ts: u32) -> &mut Frame {
        let distance = (ts.wrapping_sub(self.read_ts) / self.frame_ts) as usize;
        let index = (self.read_slot + distance) % self.frame_count;
        &mut self.frames[index]
    }

    /// Round a length down to whole frames
    fn align(&self, ts: u32) -> u32 {
        ts - ts % self.frame_ts
    }

    /// Round a timeline position down onto the frame grid of the read cursor
    fn align_position(&self, ts: u32) -> u32 {
        let offset = ts.wrapping_sub(self.read_ts) as i32 as i64;
        let frame_ts = self.frame_ts as i64;
        self.read_ts
            .wrapping_add((offset.div_euclid(frame_ts) * frame_ts) as u32)
    }

    fn resync(&mut self, ts: u32) {
        self.write_ts_offset = ts.wrapping_sub(self.read_ts);
        self.write_sync = false;
        trace!("Resync jitter buffer offset={}", self.write_ts_offset);
    }

    fn target_ts(&self, ts: u32) -> u32 {
        self.align_position(
            ts.wrapping_sub(self.write_ts_offset)
                .wrapping_add(self.playout_delay_ts),
        )
    }

    /// Number of free frames from `write_ts` onward
    fn fits(&self, write_ts: u32, frames: usize) -> bool {
        let distance = (write_ts.wrapping_sub(self.read_ts) / self.frame_ts) as usize;
        distance + frames <= self.frame_count
    }

    /// Skew to add to a late-write adjustment, derived from the current window
    fn skew_estimate(&self) -> u32 {
        if !self.config.time_skew_detection || self.measurement_count == 0 {
            return 0;
        }
        if self.min_length_ts > 0 && self.max_length_ts < self.playout_delay_ts {
            self.align(self.playout_delay_ts - self.max_length_ts)
        } else {
            0
        }
    }

    /// Write one packet payload carrying consecutive frames
    pub fn write(&mut self, payload: &[u8], ts: u32, marker: bool) -> Result<(), JbError> {
        let frame_size = self.frame_size;
        let dissected: Option<Vec<&[u8]>> = match &self.codec {
            Some(codec) => codec.dissect(payload, frame_size).ok(),
            None if frame_size > 0 && payload.len() >= frame_size => {
                Some(payload.chunks_exact(frame_size).collect())
            }
            None => None,
        };
        let Some(chunks) = dissected else {
            self.stats.misaligned += 1;
            return Err(JbError::Misaligned);
        };

        if self.write_sync || (marker && self.is_empty()) {
            self.resync(ts);
        }

        let mut write_ts = self.target_ts(ts);
        if ts_diff(write_ts, self.read_ts) < 0 {
            if !self.config.adaptive {
                self.stats.too_late += 1;
                return Err(JbError::TooLate);
            }

            let delta = self.read_ts.wrapping_sub(write_ts) + self.skew_estimate();
            if self.playout_delay_ts + delta > self.max_playout_delay_ts {
                self.stats.too_late += 1;
                return Err(JbError::TooLate);
            }
            self.playout_delay_ts += delta;
            write_ts = write_ts.wrapping_add(delta);
            debug!(
                "Increase playout delay by {} to {} ts",
                delta, self.playout_delay_ts
            );
        }

        if !self.fits(write_ts, chunks.len()) {
            self.stats.too_early += 1;
            return Err(JbError::TooEarly);
        }

        let frame_ts = self.frame_ts;
        for chunk in chunks {
            let slot = self.slot(write_ts);
            slot.payload.clear();
            slot.payload.extend_from_slice(chunk);
            slot.frame_type |= FrameType::AUDIO;
            write_ts = write_ts.wrapping_add(frame_ts);
            self.stats.frames_written += 1;
        }

        if ts_diff(write_ts, self.write_ts) > 0 {
            self.write_ts = write_ts;
        }
        Ok(())
    }

    /// Write an RFC4733 named event
    ///
    /// Retransmissions and duplicate end packets collapse into the event
    /// already buffered, so the reader sees one start, updates and one end.
    pub fn event_write(&mut self, event: &NamedEvent, ts: u32, marker: bool) -> Result<(), JbError> {
        if self.write_sync || (marker && self.is_empty()) {
            self.resync(ts);
        }

        let (frame_marker, is_new) = match self.event {
            Some(track) if track.event_id == event.event_id && track.ts == ts => {
                if track.ended {
                    return Ok(());
                }
                if event.edge {
                    (FrameMarker::EndOfEvent, false)
                } else if event.duration <= track.duration {
                    return Ok(());
                } else {
                    (FrameMarker::None, false)
                }
            }
            _ => (FrameMarker::StartOfEvent, true),
        };

        let base_ts = self.target_ts(ts);
        let offset = if is_new {
            0
        } else {
            self.align((event.duration as u32).saturating_sub(self.frame_ts))
        };
        let mut write_ts = base_ts.wrapping_add(offset);
        if ts_diff(write_ts, self.read_ts) < 0 {
            write_ts = self.read_ts;
        }

        // keep start/end markers already in place
        while self.fits(write_ts, 1) {
            let slot = self.slot(write_ts);
            if slot.frame_type.contains(FrameType::EVENT) && slot.marker != FrameMarker::None {
                write_ts = write_ts.wrapping_add(self.frame_ts);
                continue;
            }
            break;
        }
        let frames = if is_new && event.edge { 2 } else { 1 };
        if !self.fits(write_ts, frames) {
            self.stats.too_early += 1;
            return Err(JbError::TooEarly);
        }

        self.put_event(write_ts, event, frame_marker);
        if is_new && event.edge {
            write_ts = write_ts.wrapping_add(self.frame_ts);
            self.put_event(write_ts, event, FrameMarker::EndOfEvent);
        }

        self.event = Some(EventTrack {
            event_id: event.event_id,
            ts,
            duration: event.duration,
            ended: event.edge,
        });

        let end_ts = write_ts.wrapping_add(self.frame_ts);
        if ts_diff(end_ts, self.write_ts) > 0 {
            self.write_ts = end_ts;
        }
        Ok(())
    }

    fn put_event(&mut self, ts: u32, event: &NamedEvent, marker: FrameMarker) {
        let slot = self.slot(ts);
        slot.frame_type |= FrameType::EVENT;
        slot.event = *event;
        slot.marker = marker;
        self.stats.events_written += 1;
    }

    /// Read the frame at the read cursor
    ///
    /// Underflow yields an empty frame and leaves the cursor in place.
    pub fn read(&mut self) -> Frame {
        let frame = if ts_diff(self.write_ts, self.read_ts) > 0 {
            let read_ts = self.read_ts;
            let slot = self.slot(read_ts);
            let frame = slot.clone();
            slot.clear();
            self.read_ts = self.read_ts.wrapping_add(self.frame_ts);
            self.read_slot = (self.read_slot + 1) % self.frame_count;
            self.stats.frames_read += 1;
            frame
        } else {
            self.stats.underflows += 1;
            Frame::empty()
        };

        self.skew_update();
        frame
    }

    fn skew_update(&mut self) {
        if !self.config.time_skew_detection {
            return;
        }

        let length = self.length_ts();
        if self.measurement_count == 0 {
            self.min_length_ts = length;
            self.max_length_ts = length;
        } else {
            self.min_length_ts = self.min_length_ts.min(length);
            self.max_length_ts = self.max_length_ts.max(length);
        }
        self.measurement_count += 1;
        if self.measurement_count < SKEW_WINDOW {
            return;
        }

        let skew = if self.min_length_ts > 0 && self.max_length_ts < self.playout_delay_ts {
            self.align(self.playout_delay_ts - self.max_length_ts)
        } else {
            0
        };

        if skew > 0 {
            // future writes land `skew` later; shift the window accordingly
            self.write_ts_offset = self.write_ts_offset.wrapping_sub(skew);
            self.min_length_ts += skew;
            self.max_length_ts += skew;
            self.stats.skew_corrections += 1;
            debug!(
                "Compensate time skew of {} ts (buffered {}..{})",
                skew, self.min_length_ts, self.max_length_ts
            );
        } else {
            self.min_length_ts = length;
            self.max_length_ts = length;
        }
        self.measurement_count = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::media::codec::G711Codec;

    fn config(adaptive: bool) -> JitterBufferConfig {
        JitterBufferConfig {
            min_playout_delay: 10,
            initial_playout_delay: 50,
            max_playout_delay: 200,
            adaptive,
            time_skew_detection: false,
        }
    }

    fn create(config: &JitterBufferConfig) -> JitterBuffer {
        let descriptor = CodecDescriptor::new(0, "PCMU", 8000);
        JitterBuffer::new(config, &descriptor, Some(Box::new(G711Codec::pcmu())))
    }

    fn payload(value: u8) -> Vec<u8> {
        vec![value; 80]
    }

    #[test]
    fn test_jitter_buffer_creation() {
        let jb = create(&config(true));
        assert_eq!(jb.frame_ts(), 80);
        assert_eq!(jb.frame_size(), 80);
        assert_eq!(jb.playout_delay_ts(), 400);
        assert_eq!(jb.max_playout_delay_ts(), 1600);
        assert!(jb.is_empty());
    }

    #[test]
    fn test_in_order_playback() {
        let mut jb = create(&config(false));
        jb.write(&payload(1), 0, true).unwrap();
        jb.write(&payload(2), 80, false).unwrap();
        jb.write(&payload(3), 160, false).unwrap();

        // playout delay of 50ms: five empty frames first
        for _ in 0..5 {
            assert!(jb.read().is_empty());
        }
        for value in 1..=3 {
            let frame = jb.read();
            assert!(frame.has_audio());
            assert_eq!(frame.payload, payload(value));
        }
        assert_eq!(jb.stats().underflows, 0);

        // exhausted: empty frame, cursor stays
        let read_ts = jb.read_ts();
        assert!(jb.read().is_empty());
        assert_eq!(jb.read_ts(), read_ts);
        assert_eq!(jb.stats().underflows, 1);
    }

    #[test]
    fn test_multi_frame_packet() {
        let mut jb = create(&config(false));
        let mut packet = payload(7);
        packet.extend(payload(8));
        jb.write(&packet, 0, true).unwrap();
        assert_eq!(jb.length_ts(), 400 + 160);
    }

    #[test]
    fn test_too_late_without_adaptation() {
        let mut jb = create(&config(false));
        jb.write(&payload(1), 0, true).unwrap();
        for _ in 0..6 {
            jb.read();
        }
        assert_eq!(jb.read_ts(), 480);

        assert_eq!(jb.write(&payload(2), 0, false), Err(JbError::TooLate));
        assert_eq!(jb.write(&payload(2), 0u32.wrapping_sub(80), false), Err(JbError::TooLate));
        assert_eq!(jb.playout_delay_ts(), 400);
        assert_eq!(jb.stats().too_late, 2);
    }

    #[test]
    fn test_adaptive_growth_by_delta() {
        let mut jb = create(&config(true));
        jb.write(&payload(1), 0, true).unwrap();
        for _ in 0..6 {
            jb.read();
        }

        // lands at 400, read cursor at 480
        assert_eq!(jb.write(&payload(2), 0, false), Ok(()));
        assert_eq!(jb.playout_delay_ts(), 480);

        // lands at 400 again with the grown delay
        assert_eq!(jb.write(&payload(3), 0u32.wrapping_sub(80), false), Ok(()));
        assert_eq!(jb.playout_delay_ts(), 560);
    }

    #[test]
    fn test_adaptive_bounded_by_max_delay() {
        let mut cfg = config(true);
        cfg.max_playout_delay = 60;
        let mut jb = create(&cfg);
        jb.write(&payload(1), 0, true).unwrap();
        for _ in 0..6 {
            jb.read();
        }
        assert_eq!(jb.write(&payload(2), 0, false), Ok(()));
        assert_eq!(jb.playout_delay_ts(), 480);
        assert_eq!(
            jb.write(&payload(3), 0u32.wrapping_sub(80), false),
            Err(JbError::TooLate)
        );
        assert_eq!(jb.playout_delay_ts(), 480);
    }

    #[test]
    fn test_too_early() {
        let mut jb = create(&config(false));
        jb.write(&payload(1), 0, true).unwrap();
        assert_eq!(jb.write(&payload(2), 3000, false), Err(JbError::TooEarly));
    }

    #[test]
    fn test_misaligned() {
        let mut jb = create(&config(false));
        assert_eq!(jb.write(&[0u8; 40], 0, true), Err(JbError::Misaligned));
        assert_eq!(jb.stats().misaligned, 1);
    }

    #[test]
    fn test_marker_resyncs_empty_buffer() {
        let mut jb = create(&config(false));
        jb.write(&payload(1), 0, true).unwrap();
        for _ in 0..6 {
            jb.read();
        }
        assert!(jb.is_empty());

        // new talkspurt with an unrelated timestamp
        jb.write(&payload(2), 123_456, true).unwrap();
        assert_eq!(jb.length_ts(), 400 + 80);
    }

    #[test]
    fn test_restart() {
        let mut jb = create(&config(false));
        jb.write(&payload(1), 0, true).unwrap();
        jb.restart();
        assert!(jb.is_empty());
        jb.write(&payload(2), 99_040, false).unwrap();
        assert_eq!(jb.length_ts(), 480);
        assert_eq!(jb.stats().restarts, 1);
    }

    #[test]
    fn test_event_collapse() {
        let mut jb = create(&config(false));
        let mut event = NamedEvent::new(1);

        event.duration = 80;
        jb.event_write(&event, 0, true).unwrap();
        event.duration = 160;
        jb.event_write(&event, 0, false).unwrap();
        // retransmission
        jb.event_write(&event, 0, false).unwrap();
        event.duration = 240;
        event.edge = true;
        jb.event_write(&event, 0, false).unwrap();
        // end retransmitted twice
        jb.event_write(&event, 0, false).unwrap();
        jb.event_write(&event, 0, false).unwrap();

        let mut markers = Vec::new();
        for _ in 0..12 {
            let frame = jb.read();
            if frame.has_event() {
                markers.push(frame.marker);
            }
        }
        assert_eq!(
            markers,
            vec![
                FrameMarker::StartOfEvent,
                FrameMarker::None,
                FrameMarker::EndOfEvent
            ]
        );
        assert_eq!(jb.stats().events_written, 3);
    }

    #[test]
    fn test_event_end_only() {
        let mut jb = create(&config(false));
        let mut event = NamedEvent::new(11);
        event.edge = true;
        event.duration = 800;
        jb.event_write(&event, 0, true).unwrap();

        let markers: Vec<FrameMarker> = (0..10)
            .map(|_| jb.read())
            .filter(|f| f.has_event())
            .map(|f| f.marker)
            .collect();
        assert_eq!(
            markers,
            vec![FrameMarker::StartOfEvent, FrameMarker::EndOfEvent]
        );
    }

    #[test]
    fn test_playback_across_timestamp_wrap() {
        let mut jb = create(&config(false));
        // 30ms before the cursor wraps; not a multiple of the frame span
        jb.read_ts = 0u32.wrapping_sub(240);
        jb.write_ts = jb.read_ts;

        for value in 1..=4u8 {
            jb.write(&payload(value), 80 * value as u32, value == 1).unwrap();
        }
        assert_eq!(jb.length_ts(), 400 + 320);

        for _ in 0..5 {
            assert!(jb.read().is_empty());
        }
        for value in 1..=4u8 {
            assert_eq!(jb.read().payload, payload(value));
        }
        assert_eq!(jb.read_ts(), 0u32.wrapping_sub(240).wrapping_add(9 * 80));
        assert!(jb.is_empty());
    }

    #[test]
    fn test_adaptive_growth_includes_skew() {
        let mut cfg = config(true);
        cfg.time_skew_detection = true;
        let mut jb = create(&cfg);

        // two reads ahead of the sender: 80 ts short of the playout delay
        jb.write(&payload(1), 0, true).unwrap();
        jb.read();
        jb.read();
        for i in 1..=60u32 {
            jb.write(&payload(2), 80 * i, false).unwrap();
            jb.read();
        }
        assert_eq!(jb.read_ts(), 4960);
        assert_eq!(jb.length_ts(), 320);
        assert_eq!(jb.playout_delay_ts(), 400);
        assert_eq!(jb.skew_estimate(), 80);

        // lands at 4400: 560 late, plus the 80 of skew
        assert_eq!(jb.write(&payload(3), 4000, false), Ok(()));
        assert_eq!(jb.playout_delay_ts(), 400 + 560 + 80);

        // growing again would exceed the 200ms maximum
        assert_eq!(jb.write(&payload(4), 1600, false), Err(JbError::TooLate));
        assert_eq!(jb.playout_delay_ts(), 1040);
        assert!(jb.playout_delay_ts() <= jb.max_playout_delay_ts());
        assert_eq!(jb.stats().too_late, 1);
    }

    #[test]
    fn test_time_skew_correction() {
        let mut cfg = config(false);
        cfg.time_skew_detection = true;
        let mut jb = create(&cfg);

        jb.write(&payload(1), 0, true).unwrap();
        jb.read();
        jb.read();
        for i in 1..=150u32 {
            jb.write(&payload(2), 80 * i, false).unwrap();
            jb.read();
        }

        assert_eq!(jb.stats().skew_corrections, 1);
        assert_eq!(jb.length_ts(), 400);
    }
}
