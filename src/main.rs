use mpf::application::{Engine, EngineHandle};
use mpf::config::MpfConfig;
use mpf::domain::media::{MediaState, RtpStreamDescriptor, StreamDirection};
use mpf::domain::shared::ContextId;
use mpf::infrastructure::media::{
    BufferStream, CodecManager, DtmfBand, DtmfDetector, DtmfGenerator, RtpTerminationFactory, StreamTermination,
    TerminationDescriptor, TerminationFactory,
};
use mpf::infrastructure::metrics::init_metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_DIGITS: &str = "1234*#";
/// Frames buffered per demo queue
const QUEUE_FRAMES: usize = 100;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting MPF media engine");

    // Optional config file as the first argument
    let path = std::env::args().nth(1);
    let config = MpfConfig::load(path.as_deref())?;
    info!("Configuration loaded: {:?}", config);

    if config.metrics.enabled {
        init_metrics(config.metrics.listen.parse()?)?;
        info!("Prometheus metrics on {}", config.metrics.listen);
    }

    let codecs = Arc::new(CodecManager::with_default_codecs());
    let rtp = RtpTerminationFactory::new(&config, &codecs)?;
    let (engine, task) = Engine::spawn(&config.engine, codecs);

    let call = loopback_call(&engine, &rtp).await?;
    info!("Loopback call established, press Ctrl-C to stop");

    let mut interval = tokio::time::interval(Duration::from_secs(2));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = interval.tick() => {
                let digits = call.detector.digits();
                while call.detector.digit_get().is_some() {}
                if !digits.is_empty() {
                    info!("Callee detected DTMF {}", digits);
                }
                if !call.generator.is_sending() {
                    call.generator.enqueue(DEMO_DIGITS);
                }
            }
        }
    }

    info!("Shutting down");
    for context in [call.caller, call.callee] {
        if let Err(e) = engine.context_destroy(context).await {
            warn!("Failed to destroy context {}: {}", context, e);
        }
    }
    engine.shutdown().await?;
    task.await?;
    Ok(())
}

struct LoopbackCall {
    caller: ContextId,
    callee: ContextId,
    generator: Arc<DtmfGenerator>,
    detector: Arc<DtmfDetector>,
}

/// Two RTP legs on loopback: a DTMF source feeds the caller leg, the callee
/// leg feeds a detecting sink
async fn loopback_call(
    engine: &EngineHandle,
    rtp: &RtpTerminationFactory,
) -> anyhow::Result<LoopbackCall> {
    let caller = engine.context_create("caller").await?;
    let callee = engine.context_create("callee").await?;

    // Offer from the caller leg
    let (caller_rtp, offer) = engine
        .termination_add(
            caller,
            rtp.create_termination("caller-rtp")?,
            Some(TerminationDescriptor::Rtp(RtpStreamDescriptor::new())),
        )
        .await?;
    let Some(TerminationDescriptor::Rtp(offer)) = offer else {
        anyhow::bail!("caller leg produced no offer");
    };
    let mut offer = offer.local.ok_or_else(|| anyhow::anyhow!("caller leg has no local media"))?;
    offer.state = MediaState::Enabled;

    // Answer from the callee leg
    let (callee_rtp, answer) = engine
        .termination_add(
            callee,
            rtp.create_termination("callee-rtp")?,
            Some(TerminationDescriptor::Rtp(RtpStreamDescriptor::with_remote(offer))),
        )
        .await?;
    let Some(TerminationDescriptor::Rtp(answer)) = answer else {
        anyhow::bail!("callee leg produced no answer");
    };
    let answer = answer.local.ok_or_else(|| anyhow::anyhow!("callee leg has no local media"))?;
    info!(
        "Negotiated {}",
        answer
            .codec_list
            .primary()
            .map_or_else(|| "nothing".to_string(), |codec| codec.to_string())
    );
    engine
        .termination_modify(
            caller_rtp,
            TerminationDescriptor::Rtp(RtpStreamDescriptor::with_remote(answer)),
        )
        .await?;

    let rate = 8000;
    let generator = Arc::new(DtmfGenerator::new(DtmfBand::OutOfBand, rate));
    let detector = Arc::new(DtmfDetector::new(DtmfBand::OutOfBand, rate));

    let source = BufferStream::new(StreamDirection::RECEIVE, rate, QUEUE_FRAMES).with_generator(generator.clone());
    let (source_id, _) = engine
        .termination_add(caller, Box::new(StreamTermination::new("dtmf-source", Box::new(source))), None)
        .await?;
    let sink = BufferStream::new(StreamDirection::SEND, rate, QUEUE_FRAMES).with_detector(detector.clone());
    let (sink_id, _) = engine
        .termination_add(callee, Box::new(StreamTermination::new("dtmf-sink", Box::new(sink))), None)
        .await?;

    engine.association_add(source_id, caller_rtp).await?;
    engine.association_add(callee_rtp, sink_id).await?;
    engine.topology_apply(caller).await?;
    engine.topology_apply(callee).await?;

    generator.enqueue(DEMO_DIGITS);
    Ok(LoopbackCall {
        caller,
        callee,
        generator,
        detector,
    })
}
