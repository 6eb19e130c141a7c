use serde::{Deserialize, Serialize};
use std::path::Path;

/// Protocol-level constants.
pub mod protocol {
    /// Default first port of the local known-relay set (non-client mode).
    pub const DEFAULT_FIRST_PORT: u16 = 9001;

    /// Default first port of the known-relay set in "client" demo mode.
    pub const DEFAULT_FIRST_PORT_CLIENT_MODE: u16 = 8801;

    /// Number of consecutive local ports making up the default known set.
    pub const DEFAULT_KNOWN_PORT_COUNT: u16 = 10;

    /// Maximum accepted cell payload size, in bytes.
    pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

    /// Initial read buffer size for a per-connection handler.
    pub const INITIAL_READ_BUFFER: usize = 4 * 1024;

    /// Baseline read deadline for an idle connection handler.
    pub const READ_DEADLINE_SECS: u64 = 30;

    /// Bounded connect timeout when dialing the next hop.
    pub const CONNECT_TIMEOUT_SECS: u64 = 5;

    /// Default cover-traffic interval.
    pub const DEFAULT_RANDOM_TRAFFIC_INTERVAL_SECS: u64 = 10;

    /// Default upper bound for simulated per-hop latency.
    pub const DEFAULT_RANDOM_DELAY_UPPER_MS: u64 = 5000;
}

/// Circuit-building constants.
pub mod routing {
    /// Circuit length below which `build_circuit` rejects the request.
    pub const MIN_CIRCUIT_LENGTH: usize = 2;
}

/// The role a relay plays within one circuit. Per-circuit, not global: a
/// relay holds no memory of its role across cells (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayRole {
    Entry,
    Middle,
    Exit,
    Unassigned,
}

impl Default for RelayRole {
    fn default() -> Self {
        Self::Unassigned
    }
}

impl std::fmt::Display for RelayRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Entry => "entry",
            Self::Middle => "middle",
            Self::Exit => "exit",
            Self::Unassigned => "unassigned",
        };
        write!(f, "{s}")
    }
}

/// Overlay-wide configuration recognized by relays and the client driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Candidate relay endpoints, ordered, conventionally consecutive local
    /// ports.
    pub known_ports: Vec<u16>,

    /// Desired circuit length. `0` means "choose uniformly in
    /// `[2, known_ports.len()]`".
    pub random_path_length: usize,

    /// Whether relays emit cover traffic on a timer.
    pub enable_random_traffic: bool,

    /// Cover-traffic period, in seconds.
    pub random_traffic_interval_sec: u64,

    /// Upper bound for simulated per-hop latency, in milliseconds.
    pub random_delay_upper_ms: u64,

    /// Force a particular relay's role instead of inferring it per-cell.
    /// Debugging aid only; the handler dispatch never requires it.
    pub role_override: Option<RelayRole>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let known_ports = (0..protocol::DEFAULT_KNOWN_PORT_COUNT)
            .map(|i| protocol::DEFAULT_FIRST_PORT + i)
            .collect();

        Self {
            known_ports,
            random_path_length: 0,
            enable_random_traffic: false,
            random_traffic_interval_sec: protocol::DEFAULT_RANDOM_TRAFFIC_INTERVAL_SECS,
            random_delay_upper_ms: protocol::DEFAULT_RANDOM_DELAY_UPPER_MS,
            role_override: None,
        }
    }
}

impl RelayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known_ports(mut self, ports: Vec<u16>) -> Self {
        self.known_ports = ports;
        self
    }

    pub fn with_random_path_length(mut self, length: usize) -> Self {
        self.random_path_length = length;
        self
    }

    pub fn with_random_traffic(mut self, enabled: bool, interval_secs: u64) -> Self {
        self.enable_random_traffic = enabled;
        self.random_traffic_interval_sec = interval_secs;
        self
    }

    /// Force a relay's role at start time instead of leaving it
    /// `Unassigned` until dispatch tags it for observability (spec §6).
    pub fn with_role_override(mut self, role: RelayRole) -> Self {
        self.role_override = Some(role);
        self
    }

    /// Relay endpoints for `127.0.0.1`, derived from `known_ports`.
    pub fn known_endpoints(&self) -> Vec<crate::types::Endpoint> {
        self.known_ports
            .iter()
            .map(|port| crate::types::Endpoint::new(format!("127.0.0.1:{port}")))
            .collect()
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Write(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("failed to write config file: {0}")]
    Write(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_ten_known_ports() {
        let config = RelayConfig::default();
        assert_eq!(config.known_ports.len(), 10);
        assert_eq!(config.known_ports[0], protocol::DEFAULT_FIRST_PORT);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = RelayConfig::new()
            .with_known_ports(vec![9001, 9002])
            .with_random_path_length(2)
            .with_random_traffic(true, 1);

        assert_eq!(config.known_ports, vec![9001, 9002]);
        assert_eq!(config.random_path_length, 2);
        assert!(config.enable_random_traffic);
        assert_eq!(config.random_traffic_interval_sec, 1);
    }

    #[test]
    fn role_override_defaults_to_none() {
        let config = RelayConfig::new();
        assert_eq!(config.role_override, None);
    }

    #[test]
    fn with_role_override_sets_the_field() {
        let config = RelayConfig::new().with_role_override(RelayRole::Exit);
        assert_eq!(config.role_override, Some(RelayRole::Exit));
    }

    #[test]
    fn known_endpoints_are_localhost() {
        let config = RelayConfig::new().with_known_ports(vec![9001]);
        let endpoints = config.known_endpoints();
        assert_eq!(endpoints[0].as_str(), "127.0.0.1:9001");
    }

    #[test]
    fn round_trips_through_toml_file() {
        let dir = std::env::temp_dir().join(format!(
            "relaynet-config-test-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relaynet.toml");

        let config = RelayConfig::new().with_known_ports(vec![9001, 9002, 9003]);
        config.to_file(&path).unwrap();

        let loaded = RelayConfig::from_file(&path).unwrap();
        assert_eq!(loaded.known_ports, config.known_ports);

        std::fs::remove_dir_all(&dir).ok();
    }
}
