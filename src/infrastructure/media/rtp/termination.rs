//! RTP termination and its factory

use super::socket::PortAllocator;
use super::stream::{RtpStream, RtpStreamConfig};
use crate::config::MpfConfig;
use crate::domain::shared::{Result, TerminationId};
use crate::infrastructure::media::codec::CodecManager;
use crate::infrastructure::media::stream::AudioStream;
use crate::infrastructure::media::termination::{MediaEnv, Termination, TerminationDescriptor, TerminationFactory};
use crate::infrastructure::media::timer::TimerId;
use std::sync::Arc;
use tracing::debug;

/// Termination carrying an RTP stream
pub struct RtpTermination {
    id: TerminationId,
    name: String,
    stream: RtpStream,
}

impl RtpTermination {
    pub fn new(name: impl Into<String>, config: Arc<RtpStreamConfig>, ports: Arc<PortAllocator>) -> Self {
        let id = TerminationId::new();
        Self {
            id,
            name: name.into(),
            stream: RtpStream::new(id, config, ports),
        }
    }

    pub fn rtp_stream(&self) -> &RtpStream {
        &self.stream
    }

    pub fn rtp_stream_mut(&mut self) -> &mut RtpStream {
        &mut self.stream
    }
}

impl Termination for RtpTermination {
    fn id(&self) -> TerminationId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self) -> &dyn AudioStream {
        &self.stream
    }

    fn stream_mut(&mut self) -> &mut dyn AudioStream {
        &mut self.stream
    }

    fn modify(&mut self, descriptor: &mut TerminationDescriptor, env: &mut MediaEnv<'_>) -> Result<()> {
        match descriptor {
            TerminationDescriptor::Rtp(rtp) => {
                debug!("Modify RTP termination {}", self.name);
                self.stream.modify(rtp, env)
            }
        }
    }

    fn subtract(&mut self, env: &mut MediaEnv<'_>) -> Result<()> {
        self.stream.remove(env);
        Ok(())
    }

    fn on_timer(&mut self, timer: TimerId, env: &mut MediaEnv<'_>) {
        self.stream.on_timer(timer, env);
    }
}

/// Creates RTP terminations sharing one configuration and port range
pub struct RtpTerminationFactory {
    config: Arc<RtpStreamConfig>,
    ports: Arc<PortAllocator>,
}

impl RtpTerminationFactory {
    pub fn new(config: &MpfConfig, codecs: &CodecManager) -> Result<Self> {
        let codec_list = codecs.codec_list_load(&config.rtp.codecs)?;
        let stream_config = RtpStreamConfig {
            rtp: config.rtp.clone(),
            jitter_buffer: config.jitter_buffer.normalized(),
            rtcp: config.rtcp.clone(),
            max_packets_per_tick: config.engine.max_packets_per_tick,
            codec_list,
        };
        Ok(Self {
            config: Arc::new(stream_config),
            ports: Arc::new(PortAllocator::new(config.rtp.port_min, config.rtp.port_max)),
        })
    }

    pub fn config(&self) -> &RtpStreamConfig {
        &self.config
    }

    /// Typed variant of `create_termination`
    pub fn create(&self, name: &str) -> RtpTermination {
        RtpTermination::new(name, self.config.clone(), self.ports.clone())
    }
}

impl TerminationFactory for RtpTerminationFactory {
    fn create_termination(&self, name: &str) -> Result<Box<dyn Termination>> {
        Ok(Box::new(self.create(name)))
    }
}
