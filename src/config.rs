use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Origin of the Loom backend and app shell, without a trailing slash.
    pub upstream_url: String,
    pub host: IpAddr,
    pub port: u16,
    /// Bearer token to seed the credential slot with, until the client hands one over.
    pub api_token: Option<String>,
    pub default_max_retries: i32,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub max_body_size: usize,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Tag a background wake must carry to start a pass.
    pub tag: String,
    /// Periodic wake interval; `None` disables the timer.
    pub interval: Option<Duration>,
    /// Connectivity probe interval; `None` disables the probe.
    pub probe_interval: Option<Duration>,
    pub request_timeout: Duration,
    /// Start a best-effort pass after each enqueue while online.
    pub on_enqueue: bool,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub version: u32,
    pub max_age: Duration,
    pub app_shell: String,
    pub precache: Vec<String>,
}

impl CacheConfig {
    pub fn static_cache_name(&self) -> String {
        format!("loom-static-v{}", self.version)
    }

    pub fn api_cache_name(&self) -> String {
        format!("loom-api-v{}", self.version)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: "sync-offline-actions".to_string(),
            interval: Some(Duration::from_secs(300)),
            probe_interval: Some(Duration::from_secs(30)),
            request_timeout: Duration::from_secs(30),
            on_enqueue: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: 1,
            max_age: Duration::from_secs(7 * 24 * 60 * 60),
            app_shell: "/".to_string(),
            precache: vec!["/".into(), "/index.html".into(), "/manifest.json".into()],
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_or("LOOM_DATABASE_URL", "sqlite://loom-sync.db");
        let upstream_url = env_required("LOOM_UPSTREAM_URL")?
            .trim_end_matches('/')
            .to_string();

        let host: IpAddr = env_or("LOOM_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| format!("Invalid LOOM_HOST: {e}"))?;

        let port: u16 = env_or("LOOM_PORT", "4100")
            .parse()
            .map_err(|e| format!("Invalid LOOM_PORT: {e}"))?;

        let api_token = std::env::var("LOOM_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let default_max_retries: i32 = env_or("LOOM_DEFAULT_MAX_RETRIES", "3")
            .parse()
            .map_err(|e| format!("Invalid LOOM_DEFAULT_MAX_RETRIES: {e}"))?;
        if default_max_retries < 0 {
            return Err("Invalid LOOM_DEFAULT_MAX_RETRIES: must not be negative".to_string());
        }

        let sync = SyncConfig {
            tag: env_or("LOOM_SYNC_TAG", "sync-offline-actions"),
            interval: env_secs("LOOM_SYNC_INTERVAL_SECS", 300)?,
            probe_interval: env_secs("LOOM_PROBE_INTERVAL_SECS", 30)?,
            request_timeout: env_secs("LOOM_REQUEST_TIMEOUT_SECS", 30)?
                .unwrap_or(Duration::from_secs(30)),
            on_enqueue: env_or("LOOM_SYNC_ON_ENQUEUE", "true") != "false",
        };

        let max_age = env_secs("LOOM_CACHE_MAX_AGE_SECS", 7 * 24 * 60 * 60)?
            .ok_or("Invalid LOOM_CACHE_MAX_AGE_SECS: must be greater than zero")?;

        let cache = CacheConfig {
            version: env_or("LOOM_CACHE_VERSION", "1")
                .parse()
                .map_err(|e| format!("Invalid LOOM_CACHE_VERSION: {e}"))?,
            max_age,
            app_shell: env_or("LOOM_APP_SHELL", "/"),
            precache: env_or("LOOM_PRECACHE", "/,/index.html,/manifest.json")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        };

        let max_body_size: usize = env_or("LOOM_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid LOOM_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("LOOM_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            upstream_url,
            host,
            port,
            api_token,
            default_max_retries,
            sync,
            cache,
            max_body_size,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Seconds from the environment; `0` maps to `None`.
fn env_secs(key: &str, default: u64) -> Result<Option<Duration>, String> {
    let secs: u64 = env_or(key, &default.to_string())
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}
