use std::{
    net::{Ipv4Addr, SocketAddrV4},
    str::FromStr,
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WORKER_THREADS: usize = 8;
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 30_000;

/// Process configuration. Sources are layered: an optional Settings file,
/// then the plain environment (so the deployment artifact's PORT variable
/// works as-is), then GANTRY_ prefixed environment overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_bind_address() -> String {
    DEFAULT_BIND_ADDRESS.to_owned()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

fn default_drain_timeout_ms() -> u64 {
    DEFAULT_DRAIN_TIMEOUT_MS
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            worker_threads: default_worker_threads(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl ServerSettings {
    /// Merge configuration sources and deserialize the application settings
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("Settings").required(false))
            .add_source(Environment::default().try_parsing(true))
            .add_source(Environment::with_prefix("GANTRY").try_parsing(true))
            .build()?;

        let settings: ServerSettings = config.try_deserialize()?;
        settings.validate().map_err(ConfigError::Message)?;
        Ok(settings)
    }

    pub fn validate(self: &Self) -> Result<(), String> {
        if self.worker_threads == 0 {
            return Err("worker_threads must be at least 1".to_owned());
        }
        Ok(())
    }

    pub fn socket_addr(self: &Self) -> Result<SocketAddrV4, String> {
        let ip = Ipv4Addr::from_str(&self.bind_address)
            .map_err(|_| format!("Failed to parse {} as an IPv4 address", self.bind_address))?;
        Ok(SocketAddrV4::new(ip, self.port))
    }

    pub fn drain_timeout(self: &Self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployment_contract() {
        let settings = ServerSettings::default();
        assert_eq!(settings.bind_address, "0.0.0.0");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.worker_threads, 8);
        assert_eq!(settings.drain_timeout_ms, 30_000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let settings = ServerSettings {
            worker_threads: 0,
            ..ServerSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn socket_addr_combines_address_and_port() {
        let settings = ServerSettings {
            bind_address: "127.0.0.1".to_owned(),
            port: 9000,
            ..ServerSettings::default()
        };
        let addr = settings.socket_addr().unwrap();
        assert_eq!(addr.ip(), &Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(addr.port(), 9000);
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let settings = ServerSettings {
            bind_address: "not-an-address".to_owned(),
            ..ServerSettings::default()
        };
        assert!(settings.socket_addr().is_err());
    }
}
