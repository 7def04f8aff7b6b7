//! Prometheus metrics

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

/// Install the Prometheus exporter with an HTTP scrape endpoint
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(listen: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(listen)
        .install()?;

    describe_counter!(
        "mpf_rtp_packets_received_total",
        "Total number of RTP packets accepted by receivers"
    );
    describe_counter!(
        "mpf_rtp_packets_discarded_total",
        "RTP packets rejected by the jitter buffer"
    );
    describe_counter!(
        "mpf_rtp_packets_invalid_total",
        "Datagrams on RTP sockets that failed header parsing"
    );
    describe_counter!(
        "mpf_rtp_packets_sent_total",
        "Total number of RTP packets sent"
    );
    describe_counter!(
        "mpf_rtp_receiver_restarts_total",
        "Receiver restarts caused by drift, SSRC change or discard ratio"
    );
    describe_counter!(
        "mpf_rtcp_packets_sent_total",
        "Compound RTCP packets sent, labelled by kind"
    );
    describe_counter!(
        "mpf_engine_ticks_total",
        "Engine scheduler ticks processed"
    );
    describe_gauge!(
        "mpf_active_contexts",
        "Number of media contexts processed per tick"
    );

    Ok(())
}

pub fn record_rtp_received() {
    counter!("mpf_rtp_packets_received_total").increment(1);
}

pub fn record_rtp_discarded() {
    counter!("mpf_rtp_packets_discarded_total").increment(1);
}

pub fn record_rtp_invalid() {
    counter!("mpf_rtp_packets_invalid_total").increment(1);
}

pub fn record_rtp_sent() {
    counter!("mpf_rtp_packets_sent_total").increment(1);
}

pub fn record_receiver_restart() {
    counter!("mpf_rtp_receiver_restarts_total").increment(1);
}

/// `kind` is one of "report" or "bye"
pub fn record_rtcp_sent(kind: &'static str) {
    counter!("mpf_rtcp_packets_sent_total", "kind" => kind).increment(1);
}

pub fn record_engine_tick() {
    counter!("mpf_engine_ticks_total").increment(1);
}

pub fn update_active_contexts(count: usize) {
    gauge!("mpf_active_contexts").set(count as f64);
}
