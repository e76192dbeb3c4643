//! Environment-driven configuration.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ports::runtime::ResourceLimits;
use crate::retry::BackoffPolicy;

/// Orchestrator settings. `from_env` reads `LAUNCHPAD_*` variables and
/// falls back to the documented defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Inclusive host-port range handed to the pool.
    pub port_min: u16,
    pub port_max: u16,
    /// Port the deployed app listens on inside its container.
    pub container_port: u16,
    pub limits: ResourceLimits,
    /// No access for this long and a Running deployment is reclaimed.
    pub idle_threshold: Duration,
    pub sweep_interval: Duration,
    pub stop_grace: Duration,
    /// Host used when deriving public URLs.
    pub public_host: String,
    /// Injected into every container.
    pub container_env: Vec<(String, String)>,
    /// `None` keeps history in memory only.
    pub history_path: Option<PathBuf>,
    pub forced_stop: BackoffPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port_min: 8100,
            port_max: 8199,
            container_port: 8000,
            limits: ResourceLimits::default(),
            idle_threshold: Duration::from_secs(15 * 60),
            sweep_interval: Duration::from_secs(60),
            stop_grace: Duration::from_secs(10),
            public_host: "localhost".to_string(),
            container_env: vec![("NODE_ENV".to_string(), "production".to_string())],
            history_path: None,
            forced_stop: BackoffPolicy::forced_stop(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("LAUNCHPAD_PORT_MIN") {
            config.port_min = v;
        }
        if let Some(v) = env_parse("LAUNCHPAD_PORT_MAX") {
            config.port_max = v;
        }
        if let Some(v) = env_parse("LAUNCHPAD_CONTAINER_PORT") {
            config.container_port = v;
        }
        if let Some(v) = env_parse("LAUNCHPAD_MEMORY_MB") {
            config.limits.memory_mb = v;
        }
        if let Some(v) = env_parse("LAUNCHPAD_CPUS") {
            config.limits.cpus = v;
        }
        if let Some(v) = env_parse("LAUNCHPAD_IDLE_THRESHOLD_SECS") {
            config.idle_threshold = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("LAUNCHPAD_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_parse("LAUNCHPAD_STOP_GRACE_SECS") {
            config.stop_grace = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("LAUNCHPAD_PUBLIC_HOST") {
            config.public_host = v;
        }
        if let Ok(v) = std::env::var("LAUNCHPAD_HISTORY_PATH") {
            config.history_path = Some(PathBuf::from(v));
        }

        // Forward selected host env vars into deployed containers.
        let forward = std::env::var("LAUNCHPAD_FORWARD_ENV")
            .unwrap_or_else(|_| "OPENAI_API_KEY".to_string());
        for key in forward.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            if let Ok(value) = std::env::var(key) {
                config.container_env.push((key.to_string(), value));
            }
        }

        config
    }

    pub fn port_range(&self) -> RangeInclusive<u16> {
        self.port_min..=self.port_max
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
