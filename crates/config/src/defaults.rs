pub fn default_enabled() -> bool {
    true
}

pub fn default_cache_max_size() -> usize {
    10
}

pub fn default_reconnect_delay_ms() -> u64 {
    5000
}

pub fn default_poll_interval_ms() -> u64 {
    5000
}

pub fn default_request_timeout_ms() -> u64 {
    3000
}

pub fn default_calculation_method() -> String {
    "rhai".to_string()
}

pub fn default_base_rate() -> String {
    "USDTRY".to_string()
}

pub fn default_max_operations() -> u64 {
    100_000
}

pub fn default_kafka_acks() -> String {
    "all".to_string()
}

pub fn default_kafka_retries() -> u32 {
    3
}

pub fn default_delivery_timeout_ms() -> u64 {
    30_000
}

pub fn default_kafka_request_timeout_ms() -> u64 {
    5000
}

pub fn default_reinit_period_seconds() -> u64 {
    10
}

pub fn default_store_backend() -> super::StoreBackend {
    super::StoreBackend::Memory
}

pub fn default_ttl_seconds() -> u64 {
    300
}

pub fn default_max_list_size() -> usize {
    100
}

pub fn default_retention_interval_seconds() -> u64 {
    60
}

pub fn default_redis_port() -> u16 {
    6379
}

pub fn default_log_format() -> String {
    "pretty".to_string()
}

pub fn default_metrics_port() -> u16 {
    9090
}

/// Provider kinds the binary registers
pub const KNOWN_PROVIDER_KINDS: &[&str] = &["tcp", "rest"];

/// Filter kinds the binary registers
pub const KNOWN_FILTER_KINDS: &[&str] = &["jump_threshold", "moving_average"];
