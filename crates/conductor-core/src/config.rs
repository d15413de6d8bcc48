//! Configuration system for conductor.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $CONDUCTOR_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/conductor/config.toml
//!   3. ~/.config/conductor/config.toml

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConductorConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub task_watcher: TaskWatcherSettings,
    pub heartbeat: HeartbeatSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// host:port the HTTP API binds to.
    pub listen_address: String,
    /// Basic auth username. Empty = auth disabled.
    pub username: String,
    pub password: String,
    pub cors_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Etcd,
    /// Process-local store. Nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// etcd client URLs, e.g. "http://127.0.0.1:4001".
    pub etcd_cluster: Vec<String>,
    /// Per-request timeout for non-watch store calls.
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskWatcherSettings {
    /// Period of the reconciliation sweep over all tasks.
    pub sweep_interval_secs: u64,
    pub callback_timeout_secs: u64,
    /// A claimed delivery older than this is retried by the sweep.
    pub resolving_timeout_secs: u64,
    /// Pause before re-subscribing after the watch stream ends.
    pub restart_delay_ms: u64,
    pub max_in_flight_deliveries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    pub register_with_router: bool,
    /// Route URIs that should reach this server.
    pub domain_names: Vec<String>,
    pub nats_addresses: Vec<String>,
    pub nats_username: String,
    pub nats_password: String,
    /// Interval used until the router greets us.
    pub initial_interval_ms: u64,
    /// Interval used after `fast_beats` beats without a greeting.
    pub steady_interval_secs: u64,
    pub fast_beats: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:8887".to_string(),
            username: String::new(),
            password: String::new(),
            cors_enabled: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Etcd,
            etcd_cluster: vec!["http://127.0.0.1:4001".to_string()],
            request_timeout_secs: 10,
        }
    }
}

impl Default for TaskWatcherSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 30,
            callback_timeout_secs: 30,
            resolving_timeout_secs: 120,
            restart_delay_ms: 1000,
            max_in_flight_deliveries: 16,
        }
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            register_with_router: false,
            domain_names: Vec::new(),
            nats_addresses: Vec::new(),
            nats_username: String::new(),
            nats_password: String::new(),
            initial_interval_ms: 1000,
            steady_interval_secs: 20,
            fast_beats: 10,
        }
    }
}

impl TaskWatcherSettings {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn resolving_timeout(&self) -> Duration {
        Duration::from_secs(self.resolving_timeout_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

impl HeartbeatSettings {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms.max(1))
    }

    pub fn steady_interval(&self) -> Duration {
        Duration::from_secs(self.steady_interval_secs.max(1))
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("conductor")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ConductorConfig {
    /// Load config: env vars → file → defaults.
    ///
    /// A missing file means defaults. A file that exists but cannot be read
    /// or parsed is an error, as is an override that does not parse.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path(), |name| std::env::var(name).ok())
    }

    pub fn load_from(
        path: &std::path::Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            ConductorConfig::default()
        };
        config.apply_overrides(lookup)?;
        Ok(config)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("CONDUCTOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&ConductorConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply `CONDUCTOR_<SECTION>__<FIELD>` overrides. `lookup` resolves a
    /// variable name; `load` passes the process environment.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let server = &mut self.server;
        if let Some(v) = lookup("CONDUCTOR_SERVER__LISTEN_ADDRESS") {
            server.listen_address = v;
        }
        if let Some(v) = lookup("CONDUCTOR_SERVER__USERNAME") {
            server.username = v;
        }
        if let Some(v) = lookup("CONDUCTOR_SERVER__PASSWORD") {
            server.password = v;
        }
        override_with(&lookup, "CONDUCTOR_SERVER__CORS_ENABLED", &mut server.cors_enabled, parse_flag)?;

        let store = &mut self.store;
        override_with(&lookup, "CONDUCTOR_STORE__BACKEND", &mut store.backend, |v| match v {
            "etcd" => Some(StoreBackend::Etcd),
            "memory" => Some(StoreBackend::Memory),
            _ => None,
        })?;
        if let Some(v) = lookup("CONDUCTOR_STORE__ETCD_CLUSTER") {
            store.etcd_cluster = split_list(&v);
        }
        override_num(&lookup, "CONDUCTOR_STORE__REQUEST_TIMEOUT_SECS", &mut store.request_timeout_secs)?;

        let watcher = &mut self.task_watcher;
        override_num(&lookup, "CONDUCTOR_TASK_WATCHER__SWEEP_INTERVAL_SECS", &mut watcher.sweep_interval_secs)?;
        override_num(&lookup, "CONDUCTOR_TASK_WATCHER__CALLBACK_TIMEOUT_SECS", &mut watcher.callback_timeout_secs)?;
        override_num(&lookup, "CONDUCTOR_TASK_WATCHER__RESOLVING_TIMEOUT_SECS", &mut watcher.resolving_timeout_secs)?;
        override_num(&lookup, "CONDUCTOR_TASK_WATCHER__RESTART_DELAY_MS", &mut watcher.restart_delay_ms)?;
        override_num(&lookup, "CONDUCTOR_TASK_WATCHER__MAX_IN_FLIGHT_DELIVERIES", &mut watcher.max_in_flight_deliveries)?;

        let heartbeat = &mut self.heartbeat;
        override_with(&lookup, "CONDUCTOR_HEARTBEAT__REGISTER_WITH_ROUTER", &mut heartbeat.register_with_router, parse_flag)?;
        if let Some(v) = lookup("CONDUCTOR_HEARTBEAT__DOMAIN_NAMES") {
            heartbeat.domain_names = split_list(&v);
        }
        if let Some(v) = lookup("CONDUCTOR_HEARTBEAT__NATS_ADDRESSES") {
            heartbeat.nats_addresses = split_list(&v);
        }
        if let Some(v) = lookup("CONDUCTOR_HEARTBEAT__NATS_USERNAME") {
            heartbeat.nats_username = v;
        }
        if let Some(v) = lookup("CONDUCTOR_HEARTBEAT__NATS_PASSWORD") {
            heartbeat.nats_password = v;
        }
        override_num(&lookup, "CONDUCTOR_HEARTBEAT__INITIAL_INTERVAL_MS", &mut heartbeat.initial_interval_ms)?;
        override_num(&lookup, "CONDUCTOR_HEARTBEAT__STEADY_INTERVAL_SECS", &mut heartbeat.steady_interval_secs)?;
        override_num(&lookup, "CONDUCTOR_HEARTBEAT__FAST_BEATS", &mut heartbeat.fast_beats)?;
        Ok(())
    }

    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;
        if self.store.backend == StoreBackend::Etcd && self.store.etcd_cluster.is_empty() {
            return Err(ConfigError::Invalid(
                "store.etcd_cluster must list at least one address".into(),
            ));
        }
        if self.heartbeat.register_with_router
            && (self.heartbeat.nats_addresses.is_empty() || self.heartbeat.domain_names.is_empty())
        {
            return Err(ConfigError::Invalid(
                "register_with_router is set, but nats addresses or domain names were left blank"
                    .into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.listen_address.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "{} is not a valid listen address",
                self.server.listen_address
            ))
        })
    }
}

fn override_with<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    field: &mut T,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<(), ConfigError> {
    if let Some(v) = lookup(name) {
        *field = parse(v.trim())
            .ok_or_else(|| ConfigError::Invalid(format!("{name}={v} is not a valid value")))?;
    }
    Ok(())
}

fn override_num<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    field: &mut T,
) -> Result<(), ConfigError> {
    override_with(lookup, name, field, |v| v.parse().ok())
}

fn parse_flag(v: &str) -> Option<bool> {
    match v {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
