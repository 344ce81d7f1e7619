use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MasterConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    parse_config(&content)
}

/// Parse configuration text, substituting environment variables first
pub fn parse_config(content: &str) -> Result<MasterConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    let config: MasterConfig = serde_yaml::from_str(&substituted)
        .with_context(|| "Failed to parse YAML configuration")?;

    info!(
        platforms = config.platforms.len(),
        filters = config.filters.len(),
        targets = config.calculation.targets.len(),
        "Configuration loaded successfully"
    );
    Ok(config)
}

#[instrument]
pub fn generate_default_config() -> MasterConfig {
    use defaults::*;

    let tcp_rates = ["PF1_USDTRY", "PF1_EURUSD", "PF1_GBPUSD"];
    let rest_rates = ["PF2_USDTRY", "PF2_EURUSD", "PF2_GBPUSD"];

    MasterConfig {
        application: ApplicationConfig {
            name: "fxagg".to_string(),
            description: "FX rate aggregation pipeline".to_string(),
        },
        cache: CacheConfig::default(),
        platforms: vec![
            PlatformConfig {
                name: "PF1".to_string(),
                kind: "tcp".to_string(),
                enabled: true,
                host: Some("localhost".to_string()),
                port: Some(8081),
                auto_reconnect: true,
                reconnect_delay_ms: default_reconnect_delay_ms(),
                base_url: None,
                api_key: None,
                poll_interval_ms: default_poll_interval_ms(),
                request_timeout_ms: default_request_timeout_ms(),
                subscriptions: tcp_rates.iter().map(|s| s.to_string()).collect(),
            },
            PlatformConfig {
                name: "PF2".to_string(),
                kind: "rest".to_string(),
                enabled: true,
                host: None,
                port: None,
                auto_reconnect: true,
                reconnect_delay_ms: default_reconnect_delay_ms(),
                base_url: Some("http://localhost:8080/api/rates".to_string()),
                api_key: Some("${PF2_API_KEY}".to_string()),
                poll_interval_ms: default_poll_interval_ms(),
                request_timeout_ms: default_request_timeout_ms(),
                subscriptions: rest_rates.iter().map(|s| s.to_string()).collect(),
            },
        ],
        filters: vec![
            FilterConfig {
                kind: "jump_threshold".to_string(),
                name: None,
                enabled: true,
                params: HashMap::from([("max_jump_fraction".to_string(), 0.01)]),
                scope: None,
            },
            FilterConfig {
                kind: "moving_average".to_string(),
                name: None,
                enabled: true,
                params: HashMap::from([
                    ("max_deviation_fraction".to_string(), 0.02),
                    ("min_history".to_string(), 1.0),
                ]),
                scope: None,
            },
        ],
        calculation: CalculationConfig {
            method: default_calculation_method(),
            formula_path: PathBuf::from("formulas/formula.rhai"),
            base_rate: default_base_rate(),
            targets: vec![
                "USDTRY".to_string(),
                "EURUSD".to_string(),
                "GBPUSD".to_string(),
            ],
            max_operations: default_max_operations(),
        },
        kafka: KafkaConfig {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: "fx-rates".to_string(),
            acks: default_kafka_acks(),
            retries: default_kafka_retries(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            request_timeout_ms: default_kafka_request_timeout_ms(),
            reinit_period_seconds: default_reinit_period_seconds(),
        },
        store: StoreConfig::default(),
        logging: LoggingConfig::default(),
        metrics: Some(MetricsConfig {
            enabled: true,
            port: default_metrics_port(),
        }),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &MasterConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}
