//! RTP stream
//!
//! Owns the socket pair, receiver and transmitter of one RTP session and
//! implements the audio stream contract on top of them. Signaling drives the
//! stream through `modify`, which creates or updates the local media, records
//! the remote media and negotiates codecs. The session is ENABLED while the
//! remote media is enabled; RTCP timers run only in that state.

use super::jitter_buffer::JitterBuffer;
use super::packet::MAX_RTP_PACKET_SIZE;
use super::receiver::{RtpReceiver, RxOutcome};
use super::rtcp::{self, Goodbye, ReceiverReport, ReceptionReport, RtcpPacket, SenderReport, SourceDescription};
use super::socket::{PortAllocator, RtpSocketPair};
use super::transmitter::RtpTransmitter;
use crate::config::{JitterBufferConfig, RtcpByePolicy, RtcpConfig, RtpConfig};
use crate::domain::codec::{lists_intersect, CodecCapabilities, CodecList};
use crate::domain::frame::Frame;
use crate::domain::media::{MediaState, RtpMediaDescriptor, RtpStreamDescriptor, StreamCapabilities, StreamDirection};
use crate::domain::shared::{MpfError, Result, TerminationId};
use crate::infrastructure::media::codec::{Codec, CodecManager};
use crate::infrastructure::media::stream::{AudioStream, StreamBase};
use crate::infrastructure::media::termination::MediaEnv;
use crate::infrastructure::media::timer::TimerId;
use crate::infrastructure::metrics;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// BYE reason when the session is disabled or removed
pub const RTCP_BYE_SESSION_ENDED: &str = "Session ended";
/// BYE reason at the end of each talkspurt
pub const RTCP_BYE_TALKSPURT_ENDED: &str = "Talkspurt ended";

const MAX_RTCP_PACKET_SIZE: usize = 1500;

/// Settings shared by every RTP stream of a factory
#[derive(Debug, Clone)]
pub struct RtpStreamConfig {
    pub rtp: RtpConfig,
    pub jitter_buffer: JitterBufferConfig,
    pub rtcp: RtcpConfig,
    /// Datagrams drained from the RTP socket per read
    pub max_packets_per_tick: usize,
    /// Offered codecs; empty means every registered codec
    pub codec_list: CodecList,
}

impl RtpStreamConfig {
    fn bye_enabled(&self) -> bool {
        self.rtcp.enabled && self.rtcp.bye_policy != RtcpByePolicy::Disable
    }
}

fn resolve(ip: &str, port: u16) -> Option<SocketAddr> {
    (ip, port).to_socket_addrs().ok().and_then(|mut addrs| addrs.next())
}

/// RTP stream
pub struct RtpStream {
    base: StreamBase,
    termination: TerminationId,
    config: Arc<RtpStreamConfig>,
    ports: Arc<PortAllocator>,
    state: MediaState,
    ssrc: u32,
    local_media: Option<RtpMediaDescriptor>,
    remote_media: Option<RtpMediaDescriptor>,
    sockets: Option<RtpSocketPair>,
    remote_rtp: Option<SocketAddr>,
    remote_rtcp: Option<SocketAddr>,
    receiver: Option<RtpReceiver>,
    transmitter: Option<RtpTransmitter>,
    rtcp_tx_timer: Option<TimerId>,
    rtcp_rx_timer: Option<TimerId>,
    recv_buf: Vec<u8>,
}

impl RtpStream {
    pub fn new(termination: TerminationId, config: Arc<RtpStreamConfig>, ports: Arc<PortAllocator>) -> Self {
        let mut base = StreamBase::new(StreamCapabilities::new(StreamDirection::DUPLEX));
        // no media flows until negotiated
        base.direction = StreamDirection::empty();

        Self {
            base,
            termination,
            config,
            ports,
            state: MediaState::Disabled,
            ssrc: rand::random(),
            local_media: None,
            remote_media: None,
            sockets: None,
            remote_rtp: None,
            remote_rtcp: None,
            receiver: None,
            transmitter: None,
            rtcp_tx_timer: None,
            rtcp_rx_timer: None,
            recv_buf: vec![0; MAX_RTP_PACKET_SIZE],
        }
    }

    pub fn state(&self) -> MediaState {
        self.state
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn local_media(&self) -> Option<&RtpMediaDescriptor> {
        self.local_media.as_ref()
    }

    pub fn remote_media(&self) -> Option<&RtpMediaDescriptor> {
        self.remote_media.as_ref()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.sockets.as_ref().map(RtpSocketPair::local_addr)
    }

    pub fn receiver(&self) -> Option<&RtpReceiver> {
        self.receiver.as_ref()
    }

    pub fn transmitter(&self) -> Option<&RtpTransmitter> {
        self.transmitter.as_ref()
    }

    /// RTCP timers currently armed
    pub fn rtcp_timers(&self) -> (Option<TimerId>, Option<TimerId>) {
        (self.rtcp_tx_timer, self.rtcp_rx_timer)
    }

    fn offered_codecs(&self, codecs: &CodecManager) -> CodecList {
        if self.config.codec_list.is_empty() {
            codecs.codec_list_get()
        } else {
            self.config.codec_list.clone()
        }
    }

    fn local_media_create(
        &mut self,
        local: Option<RtpMediaDescriptor>,
        remote: Option<&RtpMediaDescriptor>,
        capabilities: Option<&StreamCapabilities>,
        codecs: &CodecManager,
    ) -> Result<()> {
        // default local media: enabled duplex
        let mut local = local.unwrap_or_else(|| RtpMediaDescriptor {
            state: MediaState::Enabled,
            direction: StreamDirection::DUPLEX,
            ..Default::default()
        });
        if let Some(remote) = remote {
            local.id = remote.id;
        }
        if local.ip.is_empty() {
            local.ip = self.config.rtp.ip.clone();
            local.ext_ip = self.config.rtp.ext_ip.clone();
        }

        let mut status = Ok(());
        if local.port == 0 {
            match self.ports.bind_pair(&local.ip) {
                Some(pair) => {
                    local.port = pair.local_addr().port();
                    self.sockets = Some(pair);
                }
                None => {
                    local.state = MediaState::Disabled;
                    status = Err(MpfError::Socket(format!("no free RTP port on {}", local.ip)));
                }
            }
        } else {
            match RtpSocketPair::bind(&local.ip, local.port) {
                Ok(pair) => self.sockets = Some(pair),
                Err(e) => {
                    local.state = MediaState::Disabled;
                    status = Err(MpfError::Socket(format!("bind {}:{}: {}", local.ip, local.port, e)));
                }
            }
        }

        if self.config.rtp.ptime > 0 {
            local.ptime = self.config.rtp.ptime;
        }

        if local.codec_list.is_empty() {
            local.codec_list = self.offered_codecs(codecs);
            if let Some(capabilities) = capabilities {
                local.codec_list.modify(&capabilities.codecs);
            }
        }

        self.local_media = Some(local);
        status
    }

    fn local_media_update(
        &mut self,
        mut media: RtpMediaDescriptor,
        capabilities: Option<&CodecCapabilities>,
        codecs: &CodecManager,
    ) -> Result<()> {
        let mut status = Ok(());
        let changed = self
            .local_media
            .as_ref()
            .map_or(true, |current| current.ip != media.ip || current.port != media.port);

        if changed {
            self.sockets = None;
            match RtpSocketPair::bind(&media.ip, media.port) {
                Ok(pair) => {
                    media.port = pair.local_addr().port();
                    self.sockets = Some(pair);
                }
                Err(e) => {
                    media.state = MediaState::Disabled;
                    status = Err(MpfError::Socket(format!("bind {}:{}: {}", media.ip, media.port, e)));
                }
            }
        }

        if media.codec_list.is_empty() {
            media.codec_list = codecs.codec_list_get();
            if let Some(capabilities) = capabilities {
                media.codec_list.modify(capabilities);
            }
        }

        self.local_media = Some(media);
        status
    }

    fn remote_media_update(&mut self, media: RtpMediaDescriptor) -> Result<()> {
        let mut status = Ok(());
        if media.state == MediaState::Enabled {
            let changed = self
                .remote_media
                .as_ref()
                .map_or(true, |current| current.ip != media.ip || current.port != media.port);
            if changed {
                self.remote_rtp = resolve(&media.ip, media.port);
                self.remote_rtcp = media.port.checked_add(1).and_then(|port| resolve(&media.ip, port));
                if self.remote_rtp.is_none() {
                    status = Err(MpfError::Socket(format!(
                        "cannot resolve remote {}:{}",
                        media.ip, media.port
                    )));
                }
            }
        }
        self.remote_media = Some(media);
        status
    }

    fn session_name(&self) -> String {
        self.local_addr()
            .map_or_else(|| "unbound".to_string(), |addr| addr.to_string())
    }

    fn timers_arm(&mut self, env: &mut MediaEnv<'_>) {
        if !self.config.rtcp.enabled {
            return;
        }
        if self.config.rtcp.tx_interval_ms > 0 {
            let id = *self
                .rtcp_tx_timer
                .get_or_insert_with(|| env.timers.create(self.termination));
            env.timers.set(id, self.config.rtcp.tx_interval_ms);
        }
        if self.config.rtcp.rx_resolution_ms > 0 {
            let id = *self
                .rtcp_rx_timer
                .get_or_insert_with(|| env.timers.create(self.termination));
            env.timers.set(id, self.config.rtcp.rx_resolution_ms);
        }
    }

    fn timers_kill(&mut self, env: &mut MediaEnv<'_>) {
        for id in [self.rtcp_tx_timer, self.rtcp_rx_timer].into_iter().flatten() {
            env.timers.kill(id);
        }
    }

    /// Leave the ENABLED state: stop RTCP and say goodbye per policy
    fn session_disable(&mut self, env: &mut MediaEnv<'_>) {
        self.state = MediaState::Disabled;
        self.timers_kill(env);
        if self.config.bye_enabled() {
            self.rtcp_bye_send(RTCP_BYE_SESSION_ENDED);
        }
    }

    fn media_negotiate(&mut self, env: &mut MediaEnv<'_>) -> Result<()> {
        let (Some(local), Some(remote)) = (self.local_media.as_mut(), self.remote_media.as_mut()) else {
            return Err(MpfError::InvalidOperation("media negotiation requires local and remote media".into()));
        };

        local.id = remote.id;
        local.mid = remote.mid;
        local.ptime = remote.ptime;
        let remote_state = remote.state;

        if self.state == MediaState::Disabled && remote_state == MediaState::Enabled {
            self.state = MediaState::Enabled;
            info!("Enable RTP Session {}", self.session_name());
            self.timers_arm(env);
        } else if self.state == MediaState::Enabled && remote_state == MediaState::Disabled {
            info!("Disable RTP Session {}", self.session_name());
            self.session_disable(env);
        }

        let (Some(local), Some(remote)) = (self.local_media.as_mut(), self.remote_media.as_mut()) else {
            return Ok(());
        };
        local.state = remote.state;
        local.direction = remote.direction.reverse();
        self.base.direction = local.direction;

        if remote.state == MediaState::Enabled {
            if remote.codec_list.is_empty() {
                // no remote codecs available, answer with the local ones
                remote.codec_list = local.codec_list.clone();
            }
            if let Err(e) = lists_intersect(
                &mut local.codec_list,
                &mut remote.codec_list,
                self.config.rtp.own_preference,
            ) {
                warn!("RTP Session {}: {}", self.session_name(), e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Apply a signaling descriptor; on return `descriptor.local` holds the answer
    pub fn modify(&mut self, descriptor: &mut RtpStreamDescriptor, env: &mut MediaEnv<'_>) -> Result<()> {
        let capabilities = descriptor.capabilities.clone();
        let mut status = if self.local_media.is_none() {
            self.local_media_create(
                descriptor.local.take(),
                descriptor.remote.as_ref(),
                capabilities.as_ref(),
                env.codecs,
            )
        } else if let Some(local) = descriptor.local.take() {
            self.local_media_update(local, capabilities.as_ref().map(|c| &c.codecs), env.codecs)
        } else {
            Ok(())
        };

        if status.is_ok() {
            if let Some(remote) = descriptor.remote.take() {
                status = self
                    .remote_media_update(remote)
                    .and_then(|_| self.media_negotiate(env));
            }
        }

        if self.base.direction.can_send() {
            if let Some(list) = self.remote_media.as_ref().map(|m| &m.codec_list) {
                self.base.tx_descriptor = list.primary().cloned();
                if let Some(event) = list.event() {
                    self.base.tx_event_descriptor = Some(event.clone());
                }
            }
        }
        if self.base.direction.can_receive() {
            if let Some(list) = self.local_media.as_ref().map(|m| &m.codec_list) {
                self.base.rx_descriptor = list.primary().cloned();
                if let Some(event) = list.event() {
                    self.base.rx_event_descriptor = Some(event.clone());
                }
            }
        }

        descriptor.local = self.local_media.clone();
        descriptor.remote = self.remote_media.clone();
        status
    }

    /// Terminal transition on subtract
    pub fn remove(&mut self, env: &mut MediaEnv<'_>) {
        if self.state == MediaState::Enabled {
            info!("Remove RTP Session {}", self.session_name());
            self.session_disable(env);
        }
        for id in [self.rtcp_tx_timer.take(), self.rtcp_rx_timer.take()].into_iter().flatten() {
            env.timers.remove(id);
        }
        self.sockets = None;
    }

    pub fn on_timer(&mut self, timer: TimerId, env: &mut MediaEnv<'_>) {
        if self.state != MediaState::Enabled {
            return;
        }
        if Some(timer) == self.rtcp_tx_timer {
            self.rtcp_report_send();
            env.timers.set(timer, self.config.rtcp.tx_interval_ms);
        } else if Some(timer) == self.rtcp_rx_timer {
            self.rtcp_receive();
            env.timers.set(timer, self.config.rtcp.rx_resolution_ms);
        }
    }

    /// SR when sending, RR otherwise; one report block when receiving
    fn rtcp_report_generate(&mut self) -> RtcpPacket {
        let direction = self.base.direction;
        if !direction.is_empty() {
            if let Some(receiver) = self.receiver.as_mut() {
                receiver.periodic_history_update();
            }
        }

        let block = direction
            .can_receive()
            .then(|| {
                self.receiver.as_ref().map(|receiver| {
                    let stat = receiver.rr_stat();
                    debug!(
                        "Generate RTCP RR [ssrc:{} last_seq:{} j:{} lost:{} frac:{}]",
                        stat.ssrc, stat.last_seq, stat.jitter, stat.lost, stat.fraction
                    );
                    ReceptionReport {
                        ssrc: stat.ssrc,
                        fraction_lost: stat.fraction,
                        cumulative_lost: stat.lost,
                        highest_seq: stat.last_seq,
                        jitter: stat.jitter,
                        lsr: stat.lsr,
                        dlsr: stat.dlsr,
                    }
                })
            })
            .flatten();

        if direction.can_send() {
            let (packets, octets, ts) = self.transmitter.as_ref().map_or((0, 0, 0), |tx| {
                (tx.sr_stat().sent_packets, tx.sr_stat().sent_octets, tx.timestamp())
            });
            debug!("Generate RTCP SR [ssrc:{} s:{} o:{} ts:{}]", self.ssrc, packets, octets, ts);
            let mut sr = SenderReport::new(self.ssrc, ts, packets, octets);
            if let Some(block) = block {
                sr.add_report(block);
            }
            RtcpPacket::SenderReport(sr)
        } else {
            let mut rr = ReceiverReport::new(self.ssrc);
            if let Some(block) = block {
                rr.add_report(block);
            }
            RtcpPacket::ReceiverReport(rr)
        }
    }

    fn rtcp_sdes_generate(&self) -> RtcpPacket {
        let cname = self.local_media.as_ref().map_or("", |m| m.ip.as_str());
        RtcpPacket::SourceDescription(SourceDescription::cname(self.ssrc, cname))
    }

    fn rtcp_send(&mut self, bye: Option<&str>) -> bool {
        let (Some(sockets), Some(remote)) = (self.sockets.as_ref(), self.remote_rtcp) else {
            // session is not initialized
            return false;
        };
        if !sockets.has_rtcp() {
            return false;
        }

        let mut packets = vec![self.rtcp_report_generate(), self.rtcp_sdes_generate()];
        if let Some(reason) = bye {
            packets.push(RtcpPacket::Goodbye(Goodbye::with_reason(self.ssrc, reason)));
        }
        let data = rtcp::compound(&packets);
        let kind = if bye.is_some() { "bye" } else { "report" };

        let Some(sockets) = self.sockets.as_ref() else {
            return false;
        };
        match sockets.send_rtcp(&data, remote) {
            Ok(_) => {
                debug!(
                    "Send Compound RTCP Packet [{}] [{} bytes] {} -> {}",
                    kind,
                    data.len(),
                    sockets.local_addr(),
                    remote
                );
                metrics::record_rtcp_sent(kind);
                true
            }
            Err(e) => {
                warn!("Failed to Send Compound RTCP Packet [{} bytes] -> {}: {}", data.len(), remote, e);
                false
            }
        }
    }

    /// Compound SR/RR + SDES
    pub fn rtcp_report_send(&mut self) -> bool {
        self.rtcp_send(None)
    }

    /// Compound SR/RR + SDES + BYE
    pub fn rtcp_bye_send(&mut self, reason: &str) -> bool {
        self.rtcp_send(Some(reason))
    }

    fn rtcp_receive(&mut self) {
        let Some(sockets) = self.sockets.as_ref() else {
            return;
        };
        let mut buf = [0u8; MAX_RTCP_PACKET_SIZE];
        for _ in 0..self.config.max_packets_per_tick.max(1) {
            match sockets.recv_rtcp(&mut buf) {
                Ok(Some((len, from))) => {
                    debug!("Receive Compound RTCP Packet [{} bytes] <- {}", len, from);
                    compound_packet_receive(&buf[..len]);
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("RTCP receive failed: {}", e);
                    break;
                }
            }
        }
    }
}

/// Decode an inbound compound packet for diagnostics
pub fn compound_packet_receive(data: &[u8]) -> bool {
    let packets = match RtcpPacket::parse_compound(data) {
        Ok(packets) => packets,
        Err(e) => {
            warn!("{}", e);
            return false;
        }
    };

    for packet in packets {
        match packet {
            RtcpPacket::SenderReport(sr) => {
                debug!(
                    "Get RTCP SR [ssrc:{} s:{} o:{} ts:{}]",
                    sr.ssrc, sr.packet_count, sr.octet_count, sr.rtp_timestamp
                );
                for rr in &sr.reports {
                    log_reception_report(rr);
                }
            }
            RtcpPacket::ReceiverReport(rr) => {
                for block in &rr.reports {
                    log_reception_report(block);
                }
            }
            RtcpPacket::Goodbye(bye) => {
                debug!("Get RTCP BYE {:?} reason={:?}", bye.ssrcs, bye.reason);
            }
            RtcpPacket::SourceDescription(_) | RtcpPacket::Other(_) => {}
        }
    }
    true
}

fn log_reception_report(rr: &ReceptionReport) {
    debug!(
        "Get RTCP RR [ssrc:{} last_seq:{} j:{} lost:{} frac:{}]",
        rr.ssrc, rr.highest_seq, rr.jitter, rr.cumulative_lost, rr.fraction_lost
    );
}

impl AudioStream for RtpStream {
    fn base(&self) -> &StreamBase {
        &self.base
    }

    fn open_rx(&mut self, codec: Option<Box<dyn Codec>>) -> Result<()> {
        let (Some(sockets), Some(remote)) = (self.sockets.as_ref(), self.remote_rtp) else {
            return Err(MpfError::InvalidOperation("RTP session is not established".into()));
        };
        let Some(descriptor) = self.base.rx_descriptor.clone() else {
            return Err(MpfError::NoCodecMatch("no receive codec negotiated".into()));
        };

        let jb = JitterBuffer::new(&self.config.jitter_buffer, &descriptor, codec);
        info!(
            "Open RTP Receiver {} <- {} playout [{} ms]",
            sockets.local_addr(),
            remote,
            self.config.jitter_buffer.initial_playout_delay
        );
        let event_pt = self.base.rx_event_descriptor.as_ref().map(|d| d.payload_type);
        self.receiver = Some(RtpReceiver::new(jb, descriptor, event_pt));
        Ok(())
    }

    fn close_rx(&mut self) -> Result<()> {
        let Some(mut receiver) = self.receiver.take() else {
            return Err(MpfError::InvalidOperation("RTP receiver is not open".into()));
        };
        let jitter = receiver.rr_stat().jitter;
        let stat = receiver.close();
        info!(
            "Close RTP Receiver {} [r:{} l:{} j:{}]",
            self.session_name(),
            stat.received_packets,
            stat.lost_packets,
            jitter
        );
        Ok(())
    }

    fn read_frame(&mut self, frame: &mut Frame) -> Result<()> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Err(MpfError::InvalidOperation("RTP receiver is not open".into()));
        };

        if let Some(sockets) = self.sockets.as_ref() {
            for _ in 0..self.config.max_packets_per_tick {
                match sockets.recv_rtp(&mut self.recv_buf) {
                    Ok(Some((len, from))) => match receiver.receive(&self.recv_buf[..len], Instant::now()) {
                        Ok(RxOutcome::Buffered | RxOutcome::Event | RxOutcome::Ignored) => {}
                        Ok(outcome) => trace!("RTP packet from {} not buffered: {:?}", from, outcome),
                        Err(e) => {
                            trace!("Invalid RTP packet from {}: {}", from, e);
                            metrics::record_rtp_invalid();
                        }
                    },
                    Ok(None) => break,
                    Err(e) => {
                        debug!("RTP receive failed: {}", e);
                        break;
                    }
                }
            }
        }

        *frame = receiver.read();
        Ok(())
    }

    fn open_tx(&mut self, codec: Option<Box<dyn Codec>>) -> Result<()> {
        let (Some(sockets), Some(remote)) = (self.sockets.as_ref(), self.remote_rtp) else {
            return Err(MpfError::InvalidOperation("RTP session is not established".into()));
        };
        let Some(codec) = codec else {
            return Err(MpfError::Codec("no codec for RTP transmitter".into()));
        };
        let Some(descriptor) = self.base.tx_descriptor.as_ref() else {
            return Err(MpfError::NoCodecMatch("no send codec negotiated".into()));
        };

        let ptime = match self.remote_media.as_ref().map_or(0, |m| m.ptime) {
            0 => self.config.rtp.ptime,
            ptime => ptime,
        };
        let frame_size = descriptor.frame_size(codec.attribs().bits_per_sample);
        let mut silence = Vec::with_capacity(frame_size);
        codec.initialize(&mut silence, frame_size);

        let event_pt = self.base.tx_event_descriptor.as_ref().map(|d| d.payload_type);
        info!("Open RTP Transmitter {} -> {}", sockets.local_addr(), remote);
        self.transmitter = Some(RtpTransmitter::new(self.ssrc, descriptor, event_pt, ptime, silence));
        Ok(())
    }

    fn close_tx(&mut self) -> Result<()> {
        let Some(transmitter) = self.transmitter.take() else {
            return Err(MpfError::InvalidOperation("RTP transmitter is not open".into()));
        };
        info!(
            "Close RTP Transmitter {} [s:{} o:{}]",
            self.session_name(),
            transmitter.sr_stat().sent_packets,
            transmitter.sr_stat().sent_octets
        );
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let Some(transmitter) = self.transmitter.as_mut() else {
            return Err(MpfError::InvalidOperation("RTP transmitter is not open".into()));
        };
        let output = transmitter.transmit(frame);

        if let (Some(sockets), Some(remote)) = (self.sockets.as_ref(), self.remote_rtp) {
            for packet in &output.packets {
                match sockets.send_rtp(packet, remote) {
                    Ok(_) => metrics::record_rtp_sent(),
                    Err(e) => {
                        warn!("Failed to send RTP packet -> {}: {}", remote, e);
                        return Err(e.into());
                    }
                }
            }
        }

        if output.talkspurt_ended
            && self.config.rtcp.enabled
            && self.config.rtcp.bye_policy == RtcpByePolicy::PerTalkspurt
        {
            self.rtcp_bye_send(RTCP_BYE_TALKSPURT_ENDED);
        }
        Ok(())
    }

    fn trace(&self) -> String {
        let base = self.base();
        let mut out = format!("RTP {} [{}]", self.session_name(), base.direction);
        if let Some(rx) = &base.rx_descriptor {
            out.push_str(&format!(" rx:{}", rx));
        }
        if let Some(tx) = &base.tx_descriptor {
            out.push_str(&format!(" tx:{}", tx));
        }
        out
    }
}
