use serde::Deserialize;
use std::path::Path;
use tracing::error;

const DEFAULT_FEED_PORT: u16 = 3737;
const DEFAULT_API_PORT: u16 = 3738;

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

// ─── TOML config file ─────────────────────────────────────────────────────────

/// Optional TOML config file; all fields are overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Observer feed (WebSocket) port (default: 3737).
    port: Option<u16>,
    /// Producer update API (HTTP) port (default: 3738).
    api_port: Option<u16>,
    /// Bind address for both servers (default: "127.0.0.1"; use "0.0.0.0" for LAN access).
    bind_address: Option<String>,
    /// Log level filter string, e.g. "debug", "info,taskhub=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json" (structured).
    log_format: Option<String>,
}

fn load_toml(path: &Path) -> Option<TomlConfig> {
    let contents = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config file, using defaults");
            None
        }
    }
}

// ─── HubConfig ───────────────────────────────────────────────────────────────

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Observer feed (WebSocket + HTTP health) port.
    pub port: u16,
    /// Producer update API (HTTP) port.
    pub api_port: u16,
    /// Bind address for both servers.
    pub bind_address: String,
    /// Log level filter string.
    pub log: String,
    /// Log output format: "pretty" | "json".
    pub log_format: String,
}

impl HubConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env, passed as `Some(value)` from clap
    ///   2. TOML file passed via `--config`
    ///   3. Built-in defaults
    pub fn new(
        port: Option<u16>,
        api_port: Option<u16>,
        bind_address: Option<String>,
        log: Option<String>,
        config_path: Option<&Path>,
    ) -> Self {
        let toml = config_path.and_then(load_toml).unwrap_or_default();

        let port = port.or(toml.port).unwrap_or(DEFAULT_FEED_PORT);
        let api_port = api_port.or(toml.api_port).unwrap_or(DEFAULT_API_PORT);

        let bind_address = bind_address
            .or(toml.bind_address)
            .unwrap_or_else(default_bind_address);

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("TASKHUB_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        Self {
            port,
            api_port,
            bind_address,
            log,
            log_format,
        }
    }
}
