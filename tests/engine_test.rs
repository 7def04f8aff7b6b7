//! Engine command API integration tests

use mpf::config::{EngineConfig, MpfConfig};
use mpf::domain::frame::{lpcm_samples, lpcm_write, Frame};
use mpf::domain::media::{RtpStreamDescriptor, StreamDirection};
use mpf::domain::shared::TerminationId;
use mpf::infrastructure::media::{
    BufferStream, CodecManager, DtmfBand, DtmfDetector, DtmfGenerator, RtpTerminationFactory, StreamTermination,
    Termination, TerminationDescriptor, TerminationFactory,
};
use mpf::{Engine, MpfError};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn buffer(name: &str, stream: BufferStream) -> Box<dyn Termination> {
    Box::new(StreamTermination::new(name, Box::new(stream)))
}

fn engine_config(context_capacity: usize) -> EngineConfig {
    EngineConfig {
        context_capacity,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_frames_flow_between_buffers() {
    let (engine, task) = Engine::spawn(&engine_config(2), Arc::new(CodecManager::with_default_codecs()));

    let context = assert_ok!(engine.context_create("loop").await);
    let source = BufferStream::new(StreamDirection::RECEIVE, 8000, 16);
    let input = source.incoming();
    let sink = BufferStream::new(StreamDirection::SEND, 8000, 64);
    let output = sink.outgoing();

    let (a, _) = assert_ok!(engine.termination_add(context, buffer("a", source), None).await);
    let (b, _) = assert_ok!(engine.termination_add(context, buffer("b", sink), None).await);
    assert_ok!(engine.association_add(a, b).await);
    assert_ok!(engine.topology_apply(context).await);

    let mut payload = Vec::new();
    lpcm_write(std::iter::repeat(1000).take(80), &mut payload);
    input.push(Frame::audio(payload));

    let mut received = None;
    for _ in 0..100 {
        if let Some(frame) = output.pop().filter(Frame::has_audio) {
            received = Some(frame);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let frame = received.expect("no audio reached the sink");
    assert!(lpcm_samples(&frame.payload).all(|s| s == 1000));

    assert_ok!(engine.context_destroy(context).await);
    assert_ok!(engine.shutdown().await);
    task.await.unwrap();
}

#[tokio::test]
async fn test_inband_dtmf_detected_through_engine() {
    let (engine, task) = Engine::spawn(&engine_config(2), Arc::new(CodecManager::with_default_codecs()));

    let generator = Arc::new(DtmfGenerator::new(DtmfBand::InBand, 8000));
    let detector = Arc::new(DtmfDetector::new(DtmfBand::InBand, 8000));
    let source = BufferStream::new(StreamDirection::RECEIVE, 8000, 16).with_generator(generator.clone());
    let sink = BufferStream::new(StreamDirection::SEND, 8000, 16).with_detector(detector.clone());

    let context = engine.context_create("dtmf").await.unwrap();
    let (a, _) = engine.termination_add(context, buffer("tones", source), None).await.unwrap();
    let (b, _) = engine.termination_add(context, buffer("ears", sink), None).await.unwrap();
    engine.association_add(a, b).await.unwrap();
    engine.topology_apply(context).await.unwrap();

    generator.enqueue("59");
    for _ in 0..200 {
        if detector.digits().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(detector.digits(), "59");

    engine.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_context_capacity_enforced() {
    let (engine, task) = Engine::spawn(&engine_config(1), Arc::new(CodecManager::with_default_codecs()));
    let context = engine.context_create("tiny").await.unwrap();

    engine
        .termination_add(context, buffer("first", BufferStream::new(StreamDirection::RECEIVE, 8000, 4)), None)
        .await
        .unwrap();
    let error = assert_err!(
        engine
            .termination_add(context, buffer("second", BufferStream::new(StreamDirection::SEND, 8000, 4)), None)
            .await
    );
    assert!(matches!(error, MpfError::CapacityExceeded(_)));

    engine.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let (engine, task) = Engine::spawn(&engine_config(2), Arc::new(CodecManager::with_default_codecs()));

    let context = engine.context_create("gone").await.unwrap();
    engine.context_destroy(context).await.unwrap();
    assert!(matches!(engine.context_destroy(context).await, Err(MpfError::NotFound(_))));
    assert!(matches!(engine.topology_apply(context).await, Err(MpfError::NotFound(_))));

    let stray = TerminationId::new();
    assert!(matches!(engine.termination_subtract(stray).await, Err(MpfError::NotFound(_))));

    engine.shutdown().await.unwrap();
    task.await.unwrap();
    // Commands after shutdown report the stopped engine
    assert!(matches!(engine.context_create("late").await, Err(MpfError::EngineStopped)));
}

#[tokio::test]
async fn test_rtp_offer_answer_through_engine() {
    let mut config = MpfConfig::default();
    config.rtp.ip = "127.0.0.1".to_string();
    config.rtp.codecs = "PCMU PCMA".to_string();
    config.rtp.port_min = 43000;
    config.rtp.port_max = 43200;
    let codecs = Arc::new(CodecManager::with_default_codecs());
    let rtp = RtpTerminationFactory::new(&config, &codecs).unwrap();
    let (engine, task) = Engine::spawn(&config.engine, codecs);

    let caller = engine.context_create("caller").await.unwrap();
    let callee = engine.context_create("callee").await.unwrap();

    let (caller_rtp, offer) = engine
        .termination_add(
            caller,
            rtp.create_termination("caller-rtp").unwrap(),
            Some(TerminationDescriptor::Rtp(RtpStreamDescriptor::new())),
        )
        .await
        .unwrap();
    let Some(TerminationDescriptor::Rtp(offer)) = offer else {
        panic!("no offer");
    };
    let offer = offer.local.unwrap();
    assert_eq!(offer.codec_list.len(), 2);

    let (_, answer) = engine
        .termination_add(
            callee,
            rtp.create_termination("callee-rtp").unwrap(),
            Some(TerminationDescriptor::Rtp(RtpStreamDescriptor::with_remote(offer))),
        )
        .await
        .unwrap();
    let Some(TerminationDescriptor::Rtp(answer)) = answer else {
        panic!("no answer");
    };
    let answer = answer.local.unwrap();
    assert_eq!(answer.codec_list.primary().map(|c| c.payload_type), Some(0));

    let TerminationDescriptor::Rtp(updated) = engine
        .termination_modify(
            caller_rtp,
            TerminationDescriptor::Rtp(RtpStreamDescriptor::with_remote(answer)),
        )
        .await
        .unwrap();
    assert_eq!(updated.local.unwrap().direction, StreamDirection::DUPLEX);

    engine.context_destroy(caller).await.unwrap();
    engine.context_destroy(callee).await.unwrap();
    engine.shutdown().await.unwrap();
    task.await.unwrap();
}
