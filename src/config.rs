//! Server configuration from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket server binds to.
    pub bind_addr: SocketAddr,
    /// Optional path to the generated catalog JSON seeded into the store at
    /// boot (the import pipeline's artifact).
    pub catalog_path: Option<String>,
    /// Bound on how long a join attempt may hold its in-flight lock.
    pub join_timeout: Duration,
}

impl ServerConfig {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("FANTASTA_ADDR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8090)));

        let catalog_path = std::env::var("FANTASTA_CATALOG")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let join_timeout = std::env::var("FANTASTA_JOIN_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(10));

        ServerConfig {
            bind_addr,
            catalog_path,
            join_timeout,
        }
    }
}
