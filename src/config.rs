use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: "data/logs".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Idle time in seconds after which a conversation is dropped (default: 30 minutes)
    #[serde(default = "default_idle_timeout_sec")]
    pub idle_timeout_sec: u64,
    /// How often the sweeper looks for idle conversations (default: 5 minutes)
    #[serde(default = "default_sweep_interval_sec")]
    pub sweep_interval_sec: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_sec: default_idle_timeout_sec(),
            sweep_interval_sec: default_sweep_interval_sec(),
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::seconds(self.idle_timeout_sec as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_sec.max(1))
    }
}

fn default_idle_timeout_sec() -> u64 {
    30 * 60
}

fn default_sweep_interval_sec() -> u64 {
    5 * 60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    /// Bucket size (default: 10)
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// One token is added back every `refill_ms` milliseconds (default: 100)
    #[serde(default = "default_refill_ms")]
    pub refill_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            burst: default_burst(),
            refill_ms: default_refill_ms(),
        }
    }
}

fn default_burst() -> u32 {
    10
}

fn default_refill_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SearchConfig {
    /// Minimum cosine similarity for a hit (default: 0.1)
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    /// Maximum number of hits shown (default: 10)
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            limit: default_limit(),
        }
    }
}

fn default_threshold() -> f32 {
    0.1
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    /// Serve `/health`, `/metrics` and `/` over HTTP (default: true)
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    #[serde(default = "default_health_host")]
    pub host: String,
    #[serde(default = "default_health_port")]
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            host: default_health_host(),
            port: default_health_port(),
        }
    }
}

impl HealthConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_health_enabled() -> bool {
    true
}

fn default_health_host() -> String {
    "0.0.0.0".to_string()
}

fn default_health_port() -> u16 {
    8080
}

impl Config {
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(config::Environment::with_prefix("EXP").separator("__"));

        builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn log_level(&self) -> tracing::Level {
        match self.logging.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}
