use crate::*;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ValidationError {
    #[error("Application name is required")]
    MissingApplicationName,

    #[error("cache.max_size must be a positive integer")]
    InvalidCacheSize,

    #[error("At least one platform must be enabled")]
    NoEnabledPlatforms,

    #[error("Duplicate platform name '{0}'")]
    DuplicatePlatform(String),

    #[error("Platform '{name}': {message}")]
    InvalidPlatform { name: String, message: String },

    #[error("Filter '{name}': {message}")]
    InvalidFilter { name: String, message: String },

    #[error("Unsupported calculation method: {0}. Must be: rhai")]
    UnsupportedCalculationMethod(String),

    #[error("Calculation: {message}")]
    InvalidCalculation { message: String },

    #[error("Kafka: {message}")]
    InvalidKafka { message: String },

    #[error("Store: {message}")]
    InvalidStore { message: String },

    #[error("Invalid log format: {0}. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Environment variable '{var}' is missing or invalid: {message}")]
    InvalidEnvVar { var: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &MasterConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    if config.application.name.trim().is_empty() {
        report.add_error(ValidationError::MissingApplicationName);
    }
    if config.cache.max_size == 0 {
        report.add_error(ValidationError::InvalidCacheSize);
    }

    validate_platforms(&config.platforms, &mut report);
    validate_filters(&config.filters, &config.platforms, &mut report);
    validate_calculation(&config.calculation, &mut report);
    validate_kafka(&config.kafka, &mut report);
    validate_store(&config.store, &mut report);

    let valid_formats = ["pretty", "json", "compact"];
    if !valid_formats.contains(&config.logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(config.logging.format.clone()));
    }

    if let Some(metrics) = &config.metrics {
        if metrics.enabled && metrics.port == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: "metrics.port".to_string(),
            });
        }
    }

    report
}

fn validate_platforms(platforms: &[PlatformConfig], report: &mut ValidationReport) {
    if !platforms.iter().any(|p| p.enabled) {
        report.add_error(ValidationError::NoEnabledPlatforms);
    }

    let mut seen = HashSet::new();
    for platform in platforms {
        if !seen.insert(platform.name.as_str()) {
            report.add_error(ValidationError::DuplicatePlatform(platform.name.clone()));
        }
        validate_platform(platform, report);
    }
}

fn validate_platform(platform: &PlatformConfig, report: &mut ValidationReport) {
    let invalid = |message: &str| ValidationError::InvalidPlatform {
        name: platform.name.clone(),
        message: message.to_string(),
    };

    if platform.name.trim().is_empty() {
        report.add_error(invalid("name is required"));
    }

    match platform.kind.as_str() {
        "tcp" => {
            if platform.host.as_deref().map_or(true, str::is_empty) {
                report.add_error(invalid("tcp platforms require a host"));
            }
            if platform.port.map_or(true, |p| p == 0) {
                report.add_error(invalid("tcp platforms require a non-zero port"));
            }
            if platform.reconnect_delay_ms == 0 {
                report.add_warning(
                    &format!("platforms.{}.reconnect_delay_ms", platform.name),
                    "zero reconnect delay retries in a tight loop",
                );
            }
        }
        "rest" => match platform.base_url.as_deref() {
            Some(raw) if has_unresolved_env_vars(raw) => {
                report.add_error(ValidationError::InvalidEnvVar {
                    var: format!("platforms.{}.base_url", platform.name),
                    message: format!("unresolved placeholder in '{}'", raw),
                });
            }
            Some(raw) => {
                if let Err(e) = url::Url::parse(raw) {
                    report.add_error(invalid(&format!("invalid base_url '{}': {}", raw, e)));
                }
            }
            None => report.add_error(invalid("rest platforms require a base_url")),
        },
        other => {
            if !KNOWN_PROVIDER_KINDS.contains(&other) {
                report.add_error(invalid(&format!(
                    "unknown type '{}', expected one of {:?}",
                    other, KNOWN_PROVIDER_KINDS
                )));
            }
        }
    }

    if platform.kind == "rest" {
        if platform.poll_interval_ms == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: format!("platforms.{}.poll_interval_ms", platform.name),
            });
        }
        if platform.request_timeout_ms == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: format!("platforms.{}.request_timeout_ms", platform.name),
            });
        }
        if let Some(key) = platform.api_key.as_deref() {
            if has_unresolved_env_vars(key) {
                report.add_warning(
                    &format!("platforms.{}.api_key", platform.name),
                    "api_key references an unset environment variable; requests go out unauthenticated",
                );
            }
        }
    }

    if platform.enabled && platform.subscriptions.is_empty() {
        report.add_warning(
            &format!("platforms.{}.subscriptions", platform.name),
            "platform is enabled but subscribes to nothing",
        );
    }

    for rate in &platform.subscriptions {
        if common_prefix(rate).is_none() {
            report.add_error(invalid(&format!(
                "subscription '{}' must look like <PREFIX>_<INSTRUMENT>",
                rate
            )));
        }
    }
}

fn common_prefix(rate: &str) -> Option<&str> {
    match rate.split_once('_') {
        Some((prefix, instrument)) if !prefix.is_empty() && !instrument.is_empty() => Some(prefix),
        _ => None,
    }
}

fn validate_filters(
    filters: &[FilterConfig],
    platforms: &[PlatformConfig],
    report: &mut ValidationReport,
) {
    let platform_names: HashSet<&str> = platforms.iter().map(|p| p.name.as_str()).collect();

    for filter in filters {
        let invalid = |message: String| ValidationError::InvalidFilter {
            name: filter.display_name().to_string(),
            message,
        };

        let required: &[&str] = match filter.kind.as_str() {
            "jump_threshold" => &["max_jump_fraction"],
            "moving_average" => &["max_deviation_fraction"],
            other => {
                report.add_error(invalid(format!(
                    "unknown type '{}', expected one of {:?}",
                    other, KNOWN_FILTER_KINDS
                )));
                continue;
            }
        };

        for key in required {
            match filter.param(key) {
                Some(v) if v.is_finite() && v > 0.0 => {}
                Some(v) => report.add_error(invalid(format!("{} must be positive, got {}", key, v))),
                None => report.add_error(invalid(format!("missing parameter {}", key))),
            }
        }

        if let Some(scope) = &filter.scope {
            for platform in scope.keys() {
                if !platform_names.contains(platform.as_str()) {
                    report.add_warning(
                        &format!("filters.{}.scope", filter.display_name()),
                        &format!("scope names unknown platform '{}'", platform),
                    );
                }
            }
        }
    }
}

fn validate_calculation(calc: &CalculationConfig, report: &mut ValidationReport) {
    if !calc.method.eq_ignore_ascii_case("rhai") {
        report.add_error(ValidationError::UnsupportedCalculationMethod(calc.method.clone()));
    }

    if calc.targets.is_empty() {
        report.add_error(ValidationError::InvalidCalculation {
            message: "at least one target is required".to_string(),
        });
    }

    if calc.base_rate.len() != 6 || !calc.base_rate.chars().all(|c| c.is_ascii_uppercase()) {
        report.add_error(ValidationError::InvalidCalculation {
            message: format!(
                "base_rate must be a six-letter currency pair, got '{}'",
                calc.base_rate
            ),
        });
    }

    if !calc.targets.iter().any(|t| t == &calc.base_rate) {
        report.add_warning(
            "calculation.targets",
            "base_rate is not a target; its own result will not be published",
        );
    }

    if !calc.formula_path.exists() {
        report.add_error(ValidationError::InvalidCalculation {
            message: format!("formula file not found: {}", calc.formula_path.display()),
        });
    }

    if calc.max_operations == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "calculation.max_operations".to_string(),
        });
    }
}

fn validate_kafka(kafka: &KafkaConfig, report: &mut ValidationReport) {
    if kafka.bootstrap_servers.trim().is_empty() {
        report.add_error(ValidationError::InvalidKafka {
            message: "bootstrap_servers is required".to_string(),
        });
    } else if has_unresolved_env_vars(&kafka.bootstrap_servers) {
        report.add_error(ValidationError::InvalidEnvVar {
            var: "kafka.bootstrap_servers".to_string(),
            message: format!("unresolved placeholder in '{}'", kafka.bootstrap_servers),
        });
    }

    if kafka.topic.trim().is_empty() {
        report.add_error(ValidationError::InvalidKafka {
            message: "topic is required".to_string(),
        });
    }

    let valid_acks = ["0", "1", "all", "-1"];
    if !valid_acks.contains(&kafka.acks.as_str()) {
        report.add_error(ValidationError::InvalidKafka {
            message: format!("acks must be one of {:?}, got '{}'", valid_acks, kafka.acks),
        });
    }

    for (field, value) in [
        ("kafka.delivery_timeout_ms", kafka.delivery_timeout_ms),
        ("kafka.request_timeout_ms", kafka.request_timeout_ms),
        ("kafka.reinit_period_seconds", kafka.reinit_period_seconds),
    ] {
        if value == 0 {
            report.add_error(ValidationError::InvalidPositiveInteger {
                field: field.to_string(),
            });
        }
    }

    if kafka.delivery_timeout_ms < kafka.request_timeout_ms {
        report.add_warning(
            "kafka.delivery_timeout_ms",
            "delivery timeout is shorter than the request timeout",
        );
    }
}

fn validate_store(store: &StoreConfig, report: &mut ValidationReport) {
    if store.backend == StoreBackend::Redis {
        match &store.redis {
            None => report.add_error(ValidationError::InvalidStore {
                message: "redis backend requires a redis section".to_string(),
            }),
            Some(redis) if redis.host.trim().is_empty() => {
                report.add_error(ValidationError::InvalidStore {
                    message: "redis.host is required".to_string(),
                })
            }
            Some(redis) if has_unresolved_env_vars(&redis.password) => {
                report.add_error(ValidationError::InvalidEnvVar {
                    var: "store.redis.password".to_string(),
                    message: "unresolved placeholder".to_string(),
                })
            }
            Some(_) => {}
        }
    }

    if store.ttl_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "store.ttl_seconds".to_string(),
        });
    }
    if store.max_list_size == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "store.max_list_size".to_string(),
        });
    }
    if store.retention_interval_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "store.retention_interval_seconds".to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config(dir: &tempfile::TempDir) -> MasterConfig {
        let formula = dir.path().join("formula.rhai");
        std::fs::write(&formula, "fn compute(ctx) { [1.0, 2.0] }").unwrap();

        let mut config = generate_default_config();
        config.calculation.formula_path = formula;
        config.platforms[1].api_key = Some("secret".to_string());
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let report = validate_config(&valid_config(&dir));
        assert!(report.is_valid(), "unexpected errors: {:?}", report.errors);
    }

    #[test]
    fn test_platform_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(&dir);
        config.platforms[0].host = None;
        config.platforms[1].base_url = Some("not a url".to_string());
        config.platforms[1].name = "PF1".to_string();

        let report = validate_config(&config);
        assert!(!report.is_valid());
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicatePlatform(n) if n == "PF1")));
        assert!(report.errors.len() >= 3);
    }

    #[test]
    fn test_unknown_kinds_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(&dir);
        config.platforms[0].kind = "websocket".to_string();
        config.filters[0].kind = "bollinger".to_string();

        let report = validate_config(&config);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidPlatform { .. })));
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidFilter { .. })));
    }

    #[test]
    fn test_filter_params_must_be_positive() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(&dir);
        config
            .filters[0]
            .params
            .insert("max_jump_fraction".to_string(), -0.1);
        config.filters[1].params.clear();

        let report = validate_config(&config);
        let filter_errors = report
            .errors
            .iter()
            .filter(|e| matches!(e, ValidationError::InvalidFilter { .. }))
            .count();
        assert_eq!(filter_errors, 2);
    }

    #[test]
    fn test_calculation_and_kafka_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(&dir);
        config.calculation.method = "javascript".to_string();
        config.calculation.formula_path = dir.path().join("missing.rhai");
        config.kafka.acks = "most".to_string();
        config.kafka.bootstrap_servers = "${FXAGG_TEST_UNSET_BROKER}".to_string();

        let report = validate_config(&config);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnsupportedCalculationMethod(_))));
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidEnvVar { .. })));
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidKafka { .. })));
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidCalculation { .. })));
    }

    #[test]
    fn test_redis_backend_requires_section() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(&dir);
        config.store.backend = StoreBackend::Redis;

        let report = validate_config(&config);
        assert!(report
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidStore { .. })));
    }

    #[test]
    fn test_base_rate_not_targeted_warns() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = valid_config(&dir);
        config.calculation.targets = vec!["EURUSD".to_string()];

        let report = validate_config(&config);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.field == "calculation.targets"));
    }
}
