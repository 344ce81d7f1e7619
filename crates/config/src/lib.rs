use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

// ==================================================================================
// MASTER CONFIG
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasterConfig {
    pub application: ApplicationConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    pub platforms: Vec<PlatformConfig>,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    pub calculation: CalculationConfig,
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

impl MasterConfig {
    pub fn enabled_platforms(&self) -> impl Iterator<Item = &PlatformConfig> {
        self.platforms.iter().filter(|p| p.enabled)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApplicationConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

// ==================================================================================
// CACHE
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Maximum history retained per (platform, rate) key
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_cache_max_size(),
        }
    }
}

// ==================================================================================
// PLATFORMS (upstream providers)
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// Platform name used in callbacks, cache keys and store keys
    pub name: String,
    /// Provider kind looked up in the provider registry (`tcp`, `rest`)
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    // TCP
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_enabled")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    // REST
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Raw rate names to subscribe to (e.g. `PF1_USDTRY`)
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

// ==================================================================================
// FILTERS
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Filter kind looked up in the filter registry (`jump_threshold`, `moving_average`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional display name, defaults to the kind
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub params: HashMap<String, f64>,
    /// Platform -> rate names this filter applies to. Absent means everywhere.
    #[serde(default)]
    pub scope: Option<HashMap<String, Vec<String>>>,
}

impl FilterConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    pub fn param(&self, key: &str) -> Option<f64> {
        self.params.get(key).copied()
    }
}

// ==================================================================================
// CALCULATION
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CalculationConfig {
    /// Script engine; only `rhai` is supported
    #[serde(default = "default_calculation_method")]
    pub method: String,
    pub formula_path: PathBuf,
    /// Reference rate every target depends on
    #[serde(default = "default_base_rate")]
    pub base_rate: String,
    /// Instruments to calculate (e.g. `USDTRY`, `EURUSD`)
    pub targets: Vec<String>,
    /// Operation budget for a single formula call
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
}

// ==================================================================================
// KAFKA
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub topic: String,
    #[serde(default = "default_kafka_acks")]
    pub acks: String,
    #[serde(default = "default_kafka_retries")]
    pub retries: u32,
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,
    #[serde(default = "default_kafka_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_reinit_period_seconds")]
    pub reinit_period_seconds: u64,
}

// ==================================================================================
// STORE
// ==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(rename = "type")]
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_max_list_size")]
    pub max_list_size: usize,
    #[serde(default = "default_retention_interval_seconds")]
    pub retention_interval_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            redis: None,
            ttl_seconds: default_ttl_seconds(),
            max_list_size: default_max_list_size(),
            retention_interval_seconds: default_retention_interval_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub db_index: u8,
}

// ==================================================================================
// OBSERVABILITY
// ==================================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `pretty`, `json` or `compact`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}
