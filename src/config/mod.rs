//! Configuration management
//!
//! Configuration is layered: built-in defaults, then an optional file
//! (any format the `config` crate understands, TOML in practice), then
//! `MPF__SECTION__KEY` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "MPF";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MpfConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub rtp: RtpConfig,

    #[serde(default)]
    pub jitter_buffer: JitterBufferConfig,

    #[serde(default)]
    pub rtcp: RtcpConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Media engine scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Processing quantum in milliseconds
    pub tick_ms: u64,
    /// Maximum terminations per context
    pub context_capacity: usize,
    /// RTP packets drained from a socket per tick
    pub max_packets_per_tick: usize,
    /// Depth of the engine command queue
    pub command_queue: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            context_capacity: 5,
            max_packets_per_tick: 5,
            command_queue: 64,
        }
    }
}

/// RTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtpConfig {
    /// Local address to bind
    pub ip: String,
    /// Address advertised to peers (NAT)
    pub ext_ip: Option<String>,
    pub port_min: u16,
    pub port_max: u16,
    /// Packetization time in ms
    pub ptime: u16,
    /// Offered codecs, e.g. "PCMU PCMA L16/96/8000 telephone-event/101/8000"
    pub codecs: String,
    /// Local codec order wins the intersection
    pub own_preference: bool,
}

impl Default for RtpConfig {
    fn default() -> Self {
        Self {
            ip: "127.0.0.1".to_string(),
            ext_ip: None,
            port_min: 5000,
            port_max: 6000,
            ptime: 20,
            codecs: "PCMU PCMA L16/96/8000 telephone-event/101/8000".to_string(),
            own_preference: false,
        }
    }
}

/// Jitter buffer settings, delays in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JitterBufferConfig {
    pub min_playout_delay: u32,
    pub initial_playout_delay: u32,
    pub max_playout_delay: u32,
    /// Grow the playout delay on late packets
    pub adaptive: bool,
    /// Detect and compensate sender/receiver clock skew
    pub time_skew_detection: bool,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            min_playout_delay: 20,
            initial_playout_delay: 50,
            max_playout_delay: 200,
            adaptive: true,
            time_skew_detection: true,
        }
    }
}

impl JitterBufferConfig {
    /// Bring the delays into a consistent order: min <= initial <= max
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if config.initial_playout_delay < config.min_playout_delay {
            config.initial_playout_delay = config.min_playout_delay;
        }
        if config.max_playout_delay < config.initial_playout_delay {
            config.max_playout_delay = config.initial_playout_delay * 2;
        }
        config
    }
}

/// When an RTCP BYE is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RtcpByePolicy {
    /// Never
    Disable,
    /// When the RTP session is disabled or removed
    #[default]
    PerSession,
    /// At the end of each talkspurt, and per session
    PerTalkspurt,
}

/// RTCP settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RtcpConfig {
    pub enabled: bool,
    pub bye_policy: RtcpByePolicy,
    /// Report interval in ms; 0 disables periodic reports
    pub tx_interval_ms: u64,
    /// Inbound poll period in ms; 0 disables reception
    pub rx_resolution_ms: u64,
}

impl Default for RtcpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bye_policy: RtcpByePolicy::PerSession,
            tx_interval_ms: 5000,
            rx_resolution_ms: 1000,
        }
    }
}

/// Prometheus exporter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: "0.0.0.0:9100".to_string(),
        }
    }
}

impl MpfConfig {
    /// Load from an optional file plus environment overrides
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path.as_ref()).required(false));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: MpfConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: MpfConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_ms == 0 {
            return Err(ConfigError::Invalid("engine.tick_ms must be positive".into()));
        }
        if self.engine.context_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine.context_capacity must be positive".into(),
            ));
        }
        if self.rtp.port_min >= self.rtp.port_max {
            return Err(ConfigError::Invalid(format!(
                "rtp port range {}-{} is empty",
                self.rtp.port_min, self.rtp.port_max
            )));
        }
        if self.rtp.ptime != 0 && self.rtp.ptime % 10 != 0 {
            return Err(ConfigError::Invalid(format!(
                "rtp.ptime {} is not a multiple of 10ms",
                self.rtp.ptime
            )));
        }
        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Load error: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MpfConfig::default();
        assert_eq!(config.engine.tick_ms, 10);
        assert_eq!(config.engine.max_packets_per_tick, 5);
        assert_eq!(config.rtp.port_min, 5000);
        assert_eq!(config.rtp.ptime, 20);
        assert_eq!(config.jitter_buffer.initial_playout_delay, 50);
        assert_eq!(config.rtcp.bye_policy, RtcpByePolicy::PerSession);
        assert!(!config.rtcp.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[rtp]
ip = "10.0.0.5"
port_min = 7000
port_max = 7100
own_preference = true

[jitter_buffer]
adaptive = false

[rtcp]
enabled = true
bye_policy = "per-talkspurt"
"#;

        let config = MpfConfig::from_toml(toml).unwrap();
        assert_eq!(config.rtp.ip, "10.0.0.5");
        assert_eq!(config.rtp.port_min, 7000);
        assert_eq!(config.rtp.ptime, 20);
        assert!(config.rtp.own_preference);
        assert!(!config.jitter_buffer.adaptive);
        assert_eq!(config.jitter_buffer.max_playout_delay, 200);
        assert_eq!(config.rtcp.bye_policy, RtcpByePolicy::PerTalkspurt);
    }

    #[test]
    fn test_invalid_port_range() {
        let toml = r#"
[rtp]
port_min = 6000
port_max = 5000
"#;
        assert!(matches!(
            MpfConfig::from_toml(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_without_file() {
        let config = MpfConfig::load(None::<&str>).unwrap();
        assert_eq!(config.engine.context_capacity, 5);
    }

    #[test]
    fn test_jitter_buffer_normalized() {
        let config = JitterBufferConfig {
            min_playout_delay: 40,
            initial_playout_delay: 20,
            max_playout_delay: 30,
            ..Default::default()
        }
        .normalized();
        assert_eq!(config.initial_playout_delay, 40);
        assert_eq!(config.max_playout_delay, 80);
    }
}
