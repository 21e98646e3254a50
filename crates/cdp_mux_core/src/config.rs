use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9229";
const DEFAULT_DISCOVERY_ENDPOINT: &str = "http://127.0.0.1:9222";
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Address the front-end client connects to.
    pub listen_addr: String,
    /// Base URL of the device's target listing (`<endpoint>/json/list`).
    pub discovery_endpoint: String,
    pub discovery_timeout: Duration,
    pub poll_interval: Duration,
    pub local_root: Option<PathBuf>,
    pub device_root: Option<String>,
    /// JSON file overriding the default prelude.
    pub prelude_path: Option<PathBuf>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            discovery_endpoint: DEFAULT_DISCOVERY_ENDPOINT.to_string(),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            local_root: None,
            device_root: None,
            prelude_path: None,
        }
    }
}

impl MuxConfig {
    pub fn new(listen_addr: impl Into<String>, discovery_endpoint: impl Into<String>) -> Self {
        Self {
            listen_addr: listen_addr.into(),
            discovery_endpoint: discovery_endpoint.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        let listen_addr =
            std::env::var("CDP_MUX_LISTEN").unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string());

        let discovery_endpoint = std::env::var("CDP_MUX_DISCOVERY")
            .unwrap_or_else(|_| DEFAULT_DISCOVERY_ENDPOINT.to_string());

        let discovery_timeout =
            duration_from_env("CDP_MUX_TIMEOUT_MS").unwrap_or(DEFAULT_DISCOVERY_TIMEOUT);
        let poll_interval = duration_from_env("CDP_MUX_POLL_MS").unwrap_or(DEFAULT_POLL_INTERVAL);

        Self {
            listen_addr,
            discovery_endpoint,
            discovery_timeout,
            poll_interval,
            local_root: std::env::var_os("CDP_MUX_LOCAL_ROOT").map(PathBuf::from),
            device_root: std::env::var("CDP_MUX_DEVICE_ROOT").ok(),
            prelude_path: std::env::var_os("CDP_MUX_PRELUDE").map(PathBuf::from),
        }
    }
}

fn duration_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
