//! Media context topology integration tests over in-memory and file streams

use mpf::domain::frame::{lpcm_samples, lpcm_write, Frame};
use mpf::domain::media::StreamDirection;
use mpf::infrastructure::media::file::{WavFile, WavFormat, WavWriter};
use mpf::infrastructure::media::{
    BufferStream, CodecManager, FilePlayer, FileRecorder, FrameQueue, MediaContext, StreamTermination,
};
use std::fs::File;
use std::io::BufWriter;

/// 10ms at 8kHz
const SAMPLES: usize = 80;

fn pcm(value: i16) -> Frame {
    let mut payload = Vec::new();
    lpcm_write(std::iter::repeat(value).take(SAMPLES), &mut payload);
    Frame::audio(payload)
}

fn source(context: &mut MediaContext, name: &str, rate: u32) -> (mpf::domain::shared::SlotId, FrameQueue) {
    let stream = BufferStream::new(StreamDirection::RECEIVE, rate, 16);
    let queue = stream.incoming();
    let slot = context
        .termination_add(Box::new(StreamTermination::new(name, Box::new(stream))))
        .unwrap();
    (slot, queue)
}

fn sink(context: &mut MediaContext, name: &str, rate: u32) -> (mpf::domain::shared::SlotId, FrameQueue) {
    let stream = BufferStream::new(StreamDirection::SEND, rate, 16);
    let queue = stream.outgoing();
    let slot = context
        .termination_add(Box::new(StreamTermination::new(name, Box::new(stream))))
        .unwrap();
    (slot, queue)
}

#[test]
fn test_two_sources_mixed_into_one_sink() {
    let codecs = CodecManager::with_default_codecs();
    let mut context = MediaContext::new("conference", 4);
    let (a, a_in) = source(&mut context, "a", 8000);
    let (b, b_in) = source(&mut context, "b", 8000);
    let (c, c_out) = sink(&mut context, "c", 8000);

    context.association_add(a, c).unwrap();
    context.association_add(b, c).unwrap();
    assert_eq!(context.rx_count(c), 2);
    context.topology_apply(&codecs).unwrap();

    let kinds: Vec<&str> = context.objects().iter().map(|o| o.kind()).collect();
    assert_eq!(kinds, vec!["mixer"]);

    a_in.push(pcm(100));
    b_in.push(pcm(23));
    context.process();

    let mixed = c_out.pop().unwrap();
    assert!(mixed.has_audio());
    assert!(lpcm_samples(&mixed.payload).all(|s| s == 123));
    assert_eq!(mixed.payload.len(), SAMPLES * 2);
}

#[test]
fn test_one_source_fans_out() {
    let codecs = CodecManager::with_default_codecs();
    let mut context = MediaContext::new("fan-out", 4);
    let (a, a_in) = source(&mut context, "a", 8000);
    let (b, b_out) = sink(&mut context, "b", 8000);
    let (c, c_out) = sink(&mut context, "c", 8000);

    context.association_add(a, b).unwrap();
    context.association_add(a, c).unwrap();
    context.topology_apply(&codecs).unwrap();
    assert_eq!(context.objects().len(), 1);
    assert_eq!(context.objects()[0].kind(), "multiplier");

    a_in.push(pcm(-7));
    context.process();

    for out in [b_out, c_out] {
        let frame = out.pop().unwrap();
        assert!(lpcm_samples(&frame.payload).all(|s| s == -7));
    }
}

#[test]
fn test_matching_formats_use_null_bridge() {
    let codecs = CodecManager::with_default_codecs();
    let mut context = MediaContext::new("bridge", 2);
    let (a, a_in) = source(&mut context, "a", 8000);
    let (b, b_out) = sink(&mut context, "b", 8000);

    context.association_add(a, b).unwrap();
    context.topology_apply(&codecs).unwrap();
    assert_eq!(context.objects()[0].kind(), "null-bridge");

    let frame = pcm(42);
    a_in.push(frame.clone());
    context.process();
    assert_eq!(b_out.pop().unwrap().payload, frame.payload);

    // Nothing queued: the sink still gets a frame, without audio
    context.process();
    assert!(!b_out.pop().unwrap().has_audio());
}

#[test]
fn test_rate_mismatch_leaves_legs_unconnected() {
    let codecs = CodecManager::with_default_codecs();
    let mut context = MediaContext::new("wideband", 2);
    let (a, _) = source(&mut context, "a", 16000);
    let (b, b_out) = sink(&mut context, "b", 8000);

    context.association_add(a, b).unwrap();
    context.topology_apply(&codecs).unwrap();
    assert!(context.is_applied());
    assert!(context.objects().is_empty());

    context.process();
    assert!(b_out.is_empty());
}

#[test]
fn test_subtract_and_reapply() {
    let codecs = CodecManager::with_default_codecs();
    let mut context = MediaContext::new("shrinking", 4);
    let (a, a_in) = source(&mut context, "a", 8000);
    let (b, _) = source(&mut context, "b", 8000);
    let (c, c_out) = sink(&mut context, "c", 8000);
    context.association_add(a, c).unwrap();
    context.association_add(b, c).unwrap();
    context.topology_apply(&codecs).unwrap();
    assert_eq!(context.objects()[0].kind(), "mixer");

    let removed = context.termination_subtract(b).unwrap();
    assert_eq!(removed.name(), "b");
    assert!(!context.is_applied());
    assert_eq!(context.rx_count(c), 1);

    context.topology_apply(&codecs).unwrap();
    assert_eq!(context.objects()[0].kind(), "null-bridge");
    a_in.push(pcm(5));
    context.process();
    assert!(lpcm_samples(&c_out.pop().unwrap().payload).all(|s| s == 5));
}

#[test]
fn test_file_played_into_recorder() {
    let dir = std::env::temp_dir();
    let input = dir.join(format!("mpf-play-{}.wav", uuid::Uuid::new_v4()));
    let output = dir.join(format!("mpf-record-{}.wav", uuid::Uuid::new_v4()));

    // 30ms of a ramp
    let samples: Vec<i16> = (0..240).map(|i| i as i16 * 10).collect();
    let mut writer = WavWriter::new(BufWriter::new(File::create(&input).unwrap()), WavFormat::pcm16(8000, 1)).unwrap();
    writer.write_samples(samples.iter().copied()).unwrap();
    writer.finalize().unwrap();

    let codecs = CodecManager::with_default_codecs();
    let mut context = MediaContext::new("recording", 2);
    let player = FilePlayer::open(&input).unwrap();
    let recorder = FileRecorder::new(&output, 8000, 0);
    let a = context
        .termination_add(Box::new(StreamTermination::new("player", Box::new(player))))
        .unwrap();
    let b = context
        .termination_add(Box::new(StreamTermination::new("recorder", Box::new(recorder))))
        .unwrap();
    context.association_add(a, b).unwrap();
    context.topology_apply(&codecs).unwrap();

    for _ in 0..3 {
        context.process();
    }
    // Closing the recorder finalizes the header
    context.topology_destroy();

    let recorded = WavFile::from_reader(&mut File::open(&output).unwrap()).unwrap();
    let recorded: Vec<i16> = recorded.samples().collect();
    assert_eq!(recorded, samples);

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_file(&output);
}
