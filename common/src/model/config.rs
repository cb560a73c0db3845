use super::logger_config::LoggerConfig;
use errors::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API Configuration
#[derive(Serialize, Deserialize, Clone)]
pub struct Api {
    /// Bind address for the API server
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number for the API server
    #[serde(default = "default_port")]
    pub port: u16,
    /// API key guarding the producer routes; producer routes are refused when unset
    pub api_key: Option<String>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
        }
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &self.api_key.as_ref().map(|_| "***REDACTED***"))
            .finish()
    }
}

/// Redis Configuration
#[derive(Serialize, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis server hostname
    pub redis_host: String,
    /// Redis server port
    pub redis_port: u16,
    /// Redis database index
    #[serde(default)]
    pub redis_db: u16,
    /// Optional Redis username
    pub redis_username: Option<String>,
    /// Optional Redis password
    pub redis_password: Option<String>,
    /// Connection pool size (default: 100)
    pub pool_size: Option<usize>,
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("redis_host", &self.redis_host)
            .field("redis_port", &self.redis_port)
            .field("redis_db", &self.redis_db)
            .field("redis_username", &self.redis_username)
            .field("redis_password", &self.redis_password.as_ref().map(|_| "***REDACTED***"))
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// Session relay tuning
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RelayConfig {
    /// Upper bound of a single blocking log read in milliseconds (default: 5000)
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
    /// Heartbeat ping interval in seconds; unset relies on transport disconnect detection
    pub heartbeat_secs: Option<u64>,
    /// Pause after a failed log read before the queue pump retries (default: 500)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            block_ms: default_block_ms(),
            heartbeat_secs: None,
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Notification log retention
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RetentionConfig {
    /// Entries older than this many hours are trimmed; 0 keeps the log forever
    #[serde(default)]
    pub log_retention_hours: u64,
    /// Interval between retention sweeps in seconds (default: 3600)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            log_retention_hours: 0,
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

/// Main Configuration
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// Application instance name
    #[serde(default = "default_name")]
    pub name: String,
    /// API server configuration
    #[serde(default)]
    pub api: Api,
    /// Redis backend; the in-process backend is used when absent
    pub redis: Option<RedisConfig>,
    /// Session relay configuration
    #[serde(default)]
    pub relay: RelayConfig,
    /// Log retention configuration
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Logger configuration
    pub logger: Option<LoggerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            api: Api::default(),
            redis: None,
            relay: RelayConfig::default(),
            retention: RetentionConfig::default(),
            logger: None,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn load(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: Config = toml::from_str(&config_str).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.relay.block_ms == 0 {
            return Err(ConfigError::Invalid("relay.block_ms must be greater than 0".into()).into());
        }
        if self.retention.log_retention_hours > 0 && self.retention.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retention.sweep_interval_secs must be greater than 0".into(),
            )
            .into());
        }
        Ok(())
    }
}

fn default_name() -> String {
    "oprelay".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_block_ms() -> u64 {
    5000
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_sweep_interval_secs() -> u64 {
    3600
}
