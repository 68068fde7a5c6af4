use anyhow::{Context, anyhow};
use serde::Deserialize;
use std::{env, fs, path::Path, time::Duration};

/// Runtime configuration loaded from the environment (with `.env` support),
/// mirroring the layering the server side uses: env vars first, an optional
/// TOML/JSON file for the worker-tuning knobs that are awkward to express
/// as flat env vars.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub data_dir: String,
    pub db_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub vector_store_url: String,
    pub media_store_url: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub public_key_path: Option<String>,
    pub auth_disabled: bool,
    pub server_host: String,
    pub server_port: u16,

    pub worker: WorkerTuning,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerTuning {
    #[serde(with = "humantime_duration")]
    pub poll_interval: Duration,
    pub max_retries: i32,
    #[serde(with = "humantime_duration")]
    pub lease_duration: Duration,
}

/// Deserializes durations the way operators write them in a worker-tuning
/// file (`"5s"`, `"2m"`) rather than serde's native `{secs, nanos}` shape.
mod humantime_duration {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

impl Default for WorkerTuning {
    fn default() -> Self {
        WorkerTuning {
            poll_interval: Duration::from_secs(5),
            max_retries: 3,
            lease_duration: Duration::from_secs(60),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let worker = WorkerTuning::load_from_env()?;

        Ok(RuntimeConfig {
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            db_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            db_max_connections: parse_env_or("DB_MAX_CONNECTIONS", 10),
            db_min_connections: parse_env_or("DB_MIN_CONNECTIONS", 1),
            vector_store_url: env::var("VECTOR_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:6333".to_string()),
            media_store_url: env::var("MEDIA_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            broker_host: env::var("BROKER_HOST").unwrap_or_else(|_| "localhost".to_string()),
            broker_port: parse_env_or("BROKER_PORT", 6379),
            public_key_path: env::var("PUBLIC_KEY_PATH").ok(),
            auth_disabled: parse_env_or("AUTH_DISABLED", false),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: parse_env_or("SERVER_PORT", 8002),
            worker,
        })
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.broker_host, self.broker_port)
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }
}

fn parse_env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl WorkerTuning {
    /// Evaluation order: `$WORKER_CONFIG_PATH` (TOML or JSON), then the
    /// individual `WORKER_*` env vars, then defaults.
    fn load_from_env() -> anyhow::Result<Self> {
        if let Ok(path) = env::var("WORKER_CONFIG_PATH") {
            return Self::load_from_file(Path::new(&path));
        }

        let mut tuning = Self::default();
        if let Ok(raw) = env::var("WORKER_POLL_INTERVAL") {
            tuning.poll_interval = humantime::parse_duration(&raw)
                .with_context(|| format!("invalid WORKER_POLL_INTERVAL: {raw}"))?;
        }
        if let Ok(raw) = env::var("WORKER_MAX_RETRIES") {
            tuning.max_retries = raw
                .parse()
                .with_context(|| format!("invalid WORKER_MAX_RETRIES: {raw}"))?;
        }
        if let Ok(raw) = env::var("WORKER_LEASE_DURATION") {
            tuning.lease_duration = humantime::parse_duration(&raw)
                .with_context(|| format!("invalid WORKER_LEASE_DURATION: {raw}"))?;
        }
        Ok(tuning)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read worker config from {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)
                .with_context(|| format!("invalid worker config {}", path.display())),
            _ => toml::from_str(&contents)
                .map_err(|err| anyhow!("invalid worker config {}: {}", path.display(), err)),
        }
    }
}
