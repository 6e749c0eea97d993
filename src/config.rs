use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::game::constants::{client, net};

/// Configuration validation failures
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("reconcile interval must be at least 1 ms")]
    ZeroReconcileInterval,
    #[error("max message size must be at least 1 byte")]
    ZeroMessageSize,
    #[error("tick rate must be at least 1 Hz")]
    ZeroTickRate,
    #[error("update interval must be at least 1 ms")]
    ZeroUpdateInterval,
    #[error("server url must start with ws:// or wss://, got '{0}'")]
    InvalidServerUrl(String),
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// Port to listen on (0 lets the OS choose)
    pub port: u16,
    /// Period of the full-snapshot reconciliation broadcast
    pub reconcile_interval_ms: u64,
    /// Largest inbound WebSocket message accepted
    pub max_message_size: usize,
    /// Port for the metrics endpoint (0 disables it)
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: net::DEFAULT_PORT,
            reconcile_interval_ms: net::RECONCILE_INTERVAL_MS,
            max_message_size: net::MAX_MESSAGE_SIZE,
            metrics_port: 9090,
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Load config from `lookup`; unparsable values are logged and skipped
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Some(port) = lookup("PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                config.port = parsed;
            } else {
                tracing::warn!("Invalid PORT '{}', using default", port);
            }
        }

        if let Some(interval) = lookup("RECONCILE_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(parsed) if parsed > 0 => config.reconcile_interval_ms = parsed,
                _ => tracing::warn!("Invalid RECONCILE_INTERVAL_MS '{}', using default", interval),
            }
        }

        if let Some(size) = lookup("MAX_MESSAGE_SIZE") {
            match size.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.max_message_size = parsed,
                _ => tracing::warn!("Invalid MAX_MESSAGE_SIZE '{}', using default", size),
            }
        }

        if let Some(port) = lookup("METRICS_PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                config.metrics_port = parsed;
            } else {
                tracing::warn!("Invalid METRICS_PORT '{}', using default", port);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reconcile_interval_ms == 0 {
            return Err(ConfigError::ZeroReconcileInterval);
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::ZeroMessageSize);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }
}

/// Client sync agent configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay URL, e.g. `ws://localhost:8080`
    pub server_url: String,
    /// Local simulation ticks per second
    pub tick_rate_hz: u32,
    /// How often the client sends its own craft as `craftUpdate`
    pub update_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: client::DEFAULT_SERVER_URL.to_string(),
            tick_rate_hz: client::TICK_RATE,
            update_interval_ms: client::UPDATE_INTERVAL_MS,
        }
    }
}

impl ClientConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::load_from(|key| std::env::var(key).ok())
    }

    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("CRAFT_SERVER_URL") {
            config.server_url = url;
        }

        if let Some(rate) = lookup("CLIENT_TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if parsed > 0 && parsed <= 1000 => config.tick_rate_hz = parsed,
                _ => tracing::warn!("CLIENT_TICK_RATE must be 1-1000, using default"),
            }
        }

        if let Some(interval) = lookup("CLIENT_UPDATE_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(parsed) if parsed > 0 => config.update_interval_ms = parsed,
                _ => tracing::warn!("Invalid CLIENT_UPDATE_INTERVAL_MS '{}', using default", interval),
            }
        }

        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidServerUrl(self.server_url.clone()));
        }
        if self.tick_rate_hz == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::ZeroUpdateInterval);
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz.max(1) as f64)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}
