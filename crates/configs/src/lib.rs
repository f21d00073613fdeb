//! # configs
//!
//! Layered settings for the worker: `.env` (dotenvy), then
//! `config/default.toml` if present, then `BRIDGE__*` environment variables.
//! Every field has a default, so the worker starts with no configuration.

use std::net::SocketAddr;
use std::time::Duration;

use config::{Config, Environment, File};
use domains::ModerationThresholds;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub scheduler: SchedulerSettings,
    pub broker: BrokerSettings,
    pub moderation: ModerationThresholds,
    pub embedding: EmbeddingSettings,
    pub analysis: AnalysisSettings,
    pub notifications: NotificationSettings,
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Loads from the default locations.
    pub fn load() -> Result<Self, SettingsError> {
        if let Err(err) = dotenvy::dotenv() {
            tracing::debug!("no .env file loaded: {err}");
        }
        Self::load_from("config/default")
    }

    /// Loads with `file` (extension optional) as the file layer.
    pub fn load_from(file: &str) -> Result<Self, SettingsError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("BRIDGE").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.broker.concurrency == 0 {
            return Err(SettingsError::Invalid("broker.concurrency must be at least 1".into()));
        }
        if self.scheduler.scan_concurrency == 0 {
            return Err(SettingsError::Invalid("scheduler.scan_concurrency must be at least 1".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(SettingsError::Invalid("embedding.dimensions must be positive".into()));
        }
        if self.analysis.requests_per_minute == 0 {
            return Err(SettingsError::Invalid("analysis.requests_per_minute must be positive".into()));
        }
        if let Some((name, _)) = self.scheduler.intervals().into_iter().find(|(_, secs)| *secs == 0) {
            return Err(SettingsError::Invalid(format!("scheduler.{name} must be positive")));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: SocketAddr::from(([0, 0, 0, 0], 8080)) }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// When unset the worker runs against the in-memory store.
    pub url: Option<SecretString>,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { url: None, max_connections: 10 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct RedisSettings {
    /// When unset the worker uses the in-process broker and lock.
    pub url: Option<SecretString>,
}

/// Intervals are in seconds.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub start_delay_secs: u64,
    pub moderation_scan_secs: u64,
    pub tagging_scan_secs: u64,
    pub embedding_scan_secs: u64,
    pub user_interest_scan_secs: u64,
    pub finalizer_secs: u64,
    pub notification_retention_secs: u64,
    /// How many publishes a scan keeps in flight
    pub scan_concurrency: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            start_delay_secs: 30,
            moderation_scan_secs: 60,
            tagging_scan_secs: 300,
            embedding_scan_secs: 300,
            user_interest_scan_secs: 24 * 60 * 60,
            finalizer_secs: 60,
            notification_retention_secs: 36 * 60 * 60,
            scan_concurrency: 2,
        }
    }
}

impl SchedulerSettings {
    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    /// Every job interval by its setting name.
    fn intervals(&self) -> [(&'static str, u64); 6] {
        [
            ("moderation_scan_secs", self.moderation_scan_secs),
            ("tagging_scan_secs", self.tagging_scan_secs),
            ("embedding_scan_secs", self.embedding_scan_secs),
            ("user_interest_scan_secs", self.user_interest_scan_secs),
            ("finalizer_secs", self.finalizer_secs),
            ("notification_retention_secs", self.notification_retention_secs),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// Concurrent handlers per consumer group
    pub concurrency: usize,
    /// Redeliveries after the first attempt
    pub retry_count: u32,
    pub retry_interval_ms: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self { concurrency: 2, retry_count: 2, retry_interval_ms: 1000 }
    }
}

impl BrokerSettings {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".into(),
            model: "mxbai-embed-large".into(),
            dimensions: domains::EMBEDDING_DIMENSIONS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub moderation_url: String,
    pub tagging_url: String,
    pub api_key: Option<SecretString>,
    /// Client-side ceiling shared by all calls to one collaborator
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            moderation_url: "http://localhost:8000/moderate".into(),
            tagging_url: "http://localhost:8000/categorize".into(),
            api_key: None,
            requests_per_minute: 30,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub retention_days: i64,
    /// Cosine distance under which a profile matches a job posting
    pub job_match_max_distance: f32,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { retention_days: 30, job_match_max_distance: 1.0 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct TelemetrySettings {
    pub log_format: LogFormat,
}
