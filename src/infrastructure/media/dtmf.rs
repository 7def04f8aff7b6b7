//! DTMF generation and detection
//!
//! Digits are carried either out of band as RFC4733 named events or in band
//! as dual tones in linear audio. Generator and detector are shared between
//! the engine task and application threads, so each keeps its state behind
//! its own mutex.

use crate::domain::frame::{lpcm_samples, lpcm_write, Frame, FrameMarker, FrameType, NamedEvent};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::f64::consts::PI;
use tracing::debug;

/// Tone length of a generated digit
pub const DTMF_TONE_MS: u32 = 100;
/// Silence between generated digits
pub const DTMF_GAP_MS: u32 = 50;
const FRAME_MS: u32 = 10;
/// Amplitude of each of the two tones
const TONE_AMPLITUDE: f64 = 8000.0;
const MAX_DIGITS: usize = 32;

const LOW_FREQS: [f64; 4] = [697.0, 770.0, 852.0, 941.0];
const HIGH_FREQS: [f64; 4] = [1209.0, 1336.0, 1477.0, 1633.0];
const KEYPAD: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Low and high tone of a digit
pub fn dtmf_frequencies(digit: char) -> Option<(f64, f64)> {
    let digit = digit.to_ascii_uppercase();
    KEYPAD.iter().enumerate().find_map(|(row, keys)| {
        keys.iter()
            .position(|&key| key == digit)
            .map(|col| (LOW_FREQS[row], HIGH_FREQS[col]))
    })
}

/// Where digits travel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtmfBand {
    /// Dual tones mixed into linear audio
    InBand,
    /// RFC4733 named events
    OutOfBand,
}

struct Tone {
    digit: char,
    event_id: u8,
    low: f64,
    high: f64,
    /// Samples emitted so far
    sample: usize,
    elapsed_ms: u32,
}

#[derive(Default)]
struct GeneratorState {
    queue: VecDeque<char>,
    tone: Option<Tone>,
    /// Remaining silence before the next digit
    gap_ms: u32,
}

/// Produces queued digits into outgoing frames
pub struct DtmfGenerator {
    band: DtmfBand,
    sample_rate: u32,
    state: Mutex<GeneratorState>,
}

impl DtmfGenerator {
    pub fn new(band: DtmfBand, sample_rate: u32) -> Self {
        Self {
            band,
            sample_rate,
            state: Mutex::new(GeneratorState::default()),
        }
    }

    pub fn band(&self) -> DtmfBand {
        self.band
    }

    /// Queue digits for sending; returns how many were accepted
    pub fn enqueue(&self, digits: &str) -> usize {
        let mut state = self.state.lock();
        let mut accepted = 0;
        for digit in digits.chars() {
            if NamedEvent::dtmf_event_id(digit).is_none() {
                debug!("Skip invalid DTMF digit {:?}", digit);
                continue;
            }
            if state.queue.len() >= MAX_DIGITS {
                break;
            }
            state.queue.push_back(digit.to_ascii_uppercase());
            accepted += 1;
        }
        accepted
    }

    /// Drop queued digits and the one in progress
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.queue.clear();
        state.tone = None;
        state.gap_ms = 0;
    }

    pub fn is_sending(&self) -> bool {
        let state = self.state.lock();
        state.tone.is_some() || !state.queue.is_empty()
    }

    /// Apply the generator to the next outgoing 10ms frame
    ///
    /// Returns true when the frame was modified.
    pub fn put_frame(&self, frame: &mut Frame) -> bool {
        let mut state = self.state.lock();

        if state.tone.is_none() {
            if state.gap_ms > 0 {
                state.gap_ms = state.gap_ms.saturating_sub(FRAME_MS);
                return false;
            }
            let Some(digit) = state.queue.pop_front() else {
                return false;
            };
            let (Some((low, high)), Some(event_id)) = (dtmf_frequencies(digit), NamedEvent::dtmf_event_id(digit))
            else {
                return false;
            };
            debug!("Generate DTMF {} [{:?}]", digit, self.band);
            state.tone = Some(Tone {
                digit,
                event_id,
                low,
                high,
                sample: 0,
                elapsed_ms: 0,
            });
        }

        let Some(tone) = state.tone.as_mut() else {
            return false;
        };
        let first = tone.elapsed_ms == 0;
        tone.elapsed_ms += FRAME_MS;
        let last = tone.elapsed_ms >= DTMF_TONE_MS;
        let frame_samples = (self.sample_rate * FRAME_MS / 1000) as usize;

        match self.band {
            DtmfBand::InBand => {
                let rate = self.sample_rate as f64;
                let start = tone.sample;
                let (low, high) = (tone.low, tone.high);
                lpcm_write(
                    (start..start + frame_samples).map(|n| {
                        let t = n as f64 / rate;
                        let value = TONE_AMPLITUDE * ((2.0 * PI * low * t).sin() + (2.0 * PI * high * t).sin());
                        value as i16
                    }),
                    &mut frame.payload,
                );
                frame.frame_type |= FrameType::AUDIO;
            }
            DtmfBand::OutOfBand => {
                let mut event = NamedEvent::new(tone.event_id);
                event.duration = (tone.sample + frame_samples).min(u16::MAX as usize) as u16;
                event.edge = last;
                frame.event = event;
                frame.marker = if first {
                    FrameMarker::StartOfEvent
                } else if last {
                    FrameMarker::EndOfEvent
                } else {
                    FrameMarker::None
                };
                frame.frame_type |= FrameType::EVENT;
            }
        }
        tone.sample += frame_samples;

        if last {
            debug!("DTMF {} generated", tone.digit);
            state.tone = None;
            state.gap_ms = DTMF_GAP_MS;
        }
        true
    }
}

/// Goertzel block length at 8kHz
const GOERTZEL_BLOCK_8K: usize = 205;
/// Minimum mean-square energy of a tone block
const MIN_ENERGY: f64 = 100_000.0;
/// Each tone must hold this share of the block energy
const MIN_TONE_SHARE: f64 = 0.1;

#[derive(Default)]
struct DetectorState {
    digits: VecDeque<char>,
    /// Event id of the RFC4733 event in progress
    event: Option<u8>,
    block: Vec<f64>,
    /// Digit seen in the last tone block
    tone: Option<char>,
}

impl DetectorState {
    fn push(&mut self, digit: char) {
        if self.digits.len() >= MAX_DIGITS {
            self.digits.pop_front();
        }
        debug!("Detected DTMF {}", digit);
        self.digits.push_back(digit);
    }
}

/// Collects digits from incoming frames
pub struct DtmfDetector {
    band: DtmfBand,
    block_size: usize,
    low_coeffs: [f64; 4],
    high_coeffs: [f64; 4],
    state: Mutex<DetectorState>,
}

impl DtmfDetector {
    pub fn new(band: DtmfBand, sample_rate: u32) -> Self {
        let rate = sample_rate as f64;
        let coeff = |freq: f64| 2.0 * (2.0 * PI * freq / rate).cos();
        Self {
            band,
            block_size: GOERTZEL_BLOCK_8K * sample_rate as usize / 8000,
            low_coeffs: LOW_FREQS.map(coeff),
            high_coeffs: HIGH_FREQS.map(coeff),
            state: Mutex::new(DetectorState::default()),
        }
    }

    pub fn band(&self) -> DtmfBand {
        self.band
    }

    /// Inspect an incoming frame
    pub fn put_frame(&self, frame: &Frame) {
        let mut state = self.state.lock();
        match self.band {
            DtmfBand::OutOfBand => {
                if !frame.has_event() {
                    return;
                }
                let id = frame.event.event_id;
                let ending = frame.event.edge || frame.marker == FrameMarker::EndOfEvent;
                // A lone end frame is a retransmission of an event already seen
                if frame.marker == FrameMarker::StartOfEvent || (state.event != Some(id) && !ending) {
                    if let Some(digit) = frame.event.to_dtmf_char() {
                        state.push(digit);
                    }
                    state.event = Some(id);
                }
                if ending {
                    state.event = None;
                }
            }
            DtmfBand::InBand => {
                if !frame.has_audio() {
                    state.block.clear();
                    state.tone = None;
                    return;
                }
                for sample in lpcm_samples(&frame.payload) {
                    state.block.push(sample as f64);
                    if state.block.len() == self.block_size {
                        let digit = self.goertzel(&state.block);
                        state.block.clear();
                        if let Some(digit) = digit.filter(|&d| state.tone != Some(d)) {
                            state.push(digit);
                        }
                        state.tone = digit;
                    }
                }
            }
        }
    }

    /// Next detected digit
    pub fn digit_get(&self) -> Option<char> {
        self.state.lock().digits.pop_front()
    }

    /// Detected digits not yet taken
    pub fn digits(&self) -> String {
        self.state.lock().digits.iter().collect()
    }

    pub fn reset(&self) {
        let mut state = self.state.lock();
        *state = DetectorState::default();
    }

    fn goertzel(&self, block: &[f64]) -> Option<char> {
        let n = block.len() as f64;
        let energy: f64 = block.iter().map(|x| x * x).sum();
        if energy / n < MIN_ENERGY {
            return None;
        }

        let power = |coeff: f64| {
            let (mut s1, mut s2) = (0.0, 0.0);
            for &x in block {
                let s = x + coeff * s1 - s2;
                s2 = s1;
                s1 = s;
            }
            s1 * s1 + s2 * s2 - coeff * s1 * s2
        };
        let strongest = |coeffs: &[f64; 4]| {
            coeffs
                .iter()
                .map(|&c| power(c))
                .enumerate()
                .fold((0, 0.0), |best, (i, p)| if p > best.1 { (i, p) } else { best })
        };

        let (row, low_power) = strongest(&self.low_coeffs);
        let (col, high_power) = strongest(&self.high_coeffs);
        // Normalized so a lone pure tone scores 0.5
        let share = |p: f64| p / (energy * n);
        if share(low_power) < MIN_TONE_SHARE || share(high_power) < MIN_TONE_SHARE {
            return None;
        }
        Some(KEYPAD[row][col])
    }
}
