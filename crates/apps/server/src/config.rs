use crate::identity::ModIdentity;
use modgate_network::TransportConfig;
use std::{env, path::PathBuf, time::Duration};

/// Configuration for the modgate binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the server binds to (e.g. `0.0.0.0:2456`).
    pub bind_address: String,
    /// Address a client connects to.
    pub server_address: String,
    /// Identity advertised in the handshake.
    pub identity: ModIdentity,
    /// File hashed into the fingerprint. `None` hashes the running executable.
    pub fingerprint_path: Option<PathBuf>,
    /// Identifiers sent to validated peers in the admin list.
    pub admins: Vec<String>,
    /// Period of the stats log line. Zero disables it.
    pub metrics_interval: Duration,
    /// Connection timeout for clients.
    pub connect_timeout_ms: u64,
}

impl ServerConfig {
    /// Builds a configuration from environment variables while falling back to
    /// defaults for a local game server.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = ModIdentity::default();
        let bind_address = env::var("MODGATE_BIND").unwrap_or_else(|_| "0.0.0.0:2456".into());
        let server_address =
            env::var("MODGATE_SERVER").unwrap_or_else(|_| "127.0.0.1:2456".into());

        let identity = ModIdentity {
            name: env::var("MODGATE_MOD_NAME").unwrap_or(defaults.name),
            version: env::var("MODGATE_MOD_VERSION").unwrap_or(defaults.version),
            author: env::var("MODGATE_MOD_AUTHOR").unwrap_or(defaults.author),
        };
        anyhow::ensure!(!identity.name.is_empty(), "mod name must not be empty");
        anyhow::ensure!(!identity.version.is_empty(), "mod version must not be empty");

        let fingerprint_path = env::var("MODGATE_FINGERPRINT_PATH")
            .ok()
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        let admins = env::var("MODGATE_ADMINS")
            .map(|value| parse_list(&value))
            .unwrap_or_default();

        let metrics_interval = env::var("MODGATE_METRICS_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        let connect_timeout_ms = env::var("MODGATE_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);

        Ok(Self {
            bind_address,
            server_address,
            identity,
            fingerprint_path,
            admins,
            metrics_interval,
            connect_timeout_ms,
        })
    }

    /// Transport settings for the given address.
    pub fn transport(&self, address: &str) -> TransportConfig {
        TransportConfig {
            address: address.to_string(),
            connect_timeout_ms: self.connect_timeout_ms,
            ..TransportConfig::default()
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
