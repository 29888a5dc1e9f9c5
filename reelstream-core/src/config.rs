//! Centralized configuration for Reelstream.
//!
//! All tunable parameters live here so sessions, ports, outbound networking
//! and streaming share one source of truth instead of scattered constants.

use std::net::{IpAddr, Ipv4Addr};
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Reelstream components.
///
/// Groups related settings into logical sections and supports environment
/// variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct ReelstreamConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub ports: PortConfig,
    pub network: NetworkConfig,
    pub streaming: StreamingConfig,
    pub simulation: SimulationConfig,
}

/// HTTP API listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the API binds to
    pub host: IpAddr,
    /// Port the API listens on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3347,
        }
    }
}

/// Session lifecycle configuration.
///
/// Controls how long metadata may take to arrive, when a session counts as
/// idle, how often the reaper sweeps, and where scratch directories live.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Maximum wait for torrent metadata before creation fails
    pub metadata_timeout: Duration,
    /// Inactivity after which the reaper destroys a session
    pub idle_timeout: Duration,
    /// Period of the idle reaper
    pub sweep_interval: Duration,
    /// Parent directory for per-session scratch directories
    pub temp_root: PathBuf,
    /// Name prefix of per-session scratch directories
    pub temp_prefix: String,
    /// Largest `.torrent` body accepted from a resolved link
    pub max_torrent_body: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_secs(180),
            idle_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(120),
            temp_root: std::env::temp_dir(),
            temp_prefix: "reelstream-torrent-".to_string(),
            max_torrent_body: 10 * 1024 * 1024, // 10 MiB
        }
    }
}

/// Listening port allocation for torrent engines.
#[derive(Debug, Clone)]
pub struct PortConfig {
    /// Range drawn from while looking for an unleased port
    pub primary: Range<u16>,
    /// Range used once every draw collided; no collision check is made here
    pub fallback: Range<u16>,
    /// Random draws from the primary range before falling back
    pub max_attempts: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            primary: 10000..60000,
            fallback: 60000..65000,
            max_attempts: 50,
        }
    }
}

/// Outbound HTTP and proxy configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// User agent for indexer calls and link resolution
    pub user_agent: &'static str,
    /// Overall request timeout of the shared HTTP client
    pub request_timeout: Duration,
    /// TCP connect timeout, also bounds the SOCKS5 handshake
    pub connect_timeout: Duration,
    /// How long pooled connections stay idle before being closed
    pub pool_idle_timeout: Duration,
    /// Idle pooled connections kept per host
    pub pool_max_idle_per_host: usize,
    /// Endpoint used to check that a proxy forwards traffic
    pub proxy_check_url: String,
    /// Timeout of a proxy check request
    pub proxy_check_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(30),
            pool_max_idle_per_host: 10,
            proxy_check_url: "https://httpbin.org/ip".to_string(),
            proxy_check_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP streaming configuration.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Bytes requested from the engine per body chunk
    pub chunk_size: usize,
    /// Largest subtitle file converted in memory
    pub max_subtitle_bytes: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256 * 1024,                // 256 KiB
            max_subtitle_bytes: 10 * 1024 * 1024, // 10 MiB
        }
    }
}

/// Configuration of the local library engine used in development.
///
/// Each top-level entry of `library_dir` is served as one torrent.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Directory whose entries are exposed as torrents
    pub library_dir: PathBuf,
    /// Simulated download speed in bytes per second
    pub download_rate: u64,
    /// Delay before metadata becomes known
    pub metadata_delay: Duration,
    /// Bind a TCP listener on the leased port like a real engine would
    pub bind_listener: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            library_dir: PathBuf::from("library"),
            download_rate: 4 * 1024 * 1024, // 4 MiB/s
            metadata_delay: Duration::from_millis(500),
            bind_listener: true,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for fast, deterministic tests.
    pub fn instant() -> Self {
        Self {
            library_dir: PathBuf::from("library"),
            download_rate: u64::MAX,
            metadata_delay: Duration::ZERO,
            bind_listener: false,
        }
    }
}

impl ReelstreamConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparsable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse::<u16>("REELSTREAM_PORT") {
            config.server.port = port;
        }
        if let Some(host) = env_parse::<IpAddr>("REELSTREAM_HOST") {
            config.server.host = host;
        }

        if let Some(seconds) = env_parse::<u64>("REELSTREAM_METADATA_TIMEOUT") {
            config.session.metadata_timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = env_parse::<u64>("REELSTREAM_IDLE_TIMEOUT") {
            config.session.idle_timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = env_parse::<u64>("REELSTREAM_SWEEP_INTERVAL") {
            config.session.sweep_interval = Duration::from_secs(seconds);
        }
        if let Ok(dir) = std::env::var("REELSTREAM_TEMP_ROOT") {
            config.session.temp_root = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("REELSTREAM_LIBRARY_DIR") {
            config.simulation.library_dir = PathBuf::from(dir);
        }
        if let Some(rate) = env_parse::<u64>("REELSTREAM_DOWNLOAD_RATE") {
            config.simulation.download_rate = rate;
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Timeouts are short and the library engine delivers instantly.
    pub fn for_testing() -> Self {
        Self {
            session: SessionConfig {
                metadata_timeout: Duration::from_secs(2),
                idle_timeout: Duration::from_secs(5),
                sweep_interval: Duration::from_secs(1),
                ..SessionConfig::default()
            },
            simulation: SimulationConfig::instant(),
            ..Default::default()
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ReelstreamConfig::default();

        assert_eq!(config.session.metadata_timeout, Duration::from_secs(180));
        assert_eq!(config.session.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.session.sweep_interval, Duration::from_secs(120));
        assert_eq!(config.session.temp_prefix, "reelstream-torrent-");
        assert_eq!(config.ports.primary, 10000..60000);
        assert_eq!(config.ports.fallback, 60000..65000);
        assert_eq!(config.ports.max_attempts, 50);
        assert_eq!(config.streaming.chunk_size, 256 * 1024);
        assert_eq!(config.streaming.max_subtitle_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_testing_preset_shortens_timeouts() {
        let config = ReelstreamConfig::for_testing();

        assert!(config.session.metadata_timeout < Duration::from_secs(180));
        assert!(config.session.idle_timeout < Duration::from_secs(600));
        assert_eq!(config.simulation.metadata_delay, Duration::ZERO);
        assert!(!config.simulation.bind_listener);
    }

    #[test]
    fn test_env_override() {
        unsafe {
            std::env::set_var("REELSTREAM_IDLE_TIMEOUT", "42");
            std::env::set_var("REELSTREAM_DOWNLOAD_RATE", "1024");
            std::env::set_var("REELSTREAM_METADATA_TIMEOUT", "not-a-number");
        }

        let config = ReelstreamConfig::from_env();

        assert_eq!(config.session.idle_timeout, Duration::from_secs(42));
        assert_eq!(config.simulation.download_rate, 1024);
        assert_eq!(config.session.metadata_timeout, Duration::from_secs(180));

        unsafe {
            std::env::remove_var("REELSTREAM_IDLE_TIMEOUT");
            std::env::remove_var("REELSTREAM_DOWNLOAD_RATE");
            std::env::remove_var("REELSTREAM_METADATA_TIMEOUT");
        }
    }
}
