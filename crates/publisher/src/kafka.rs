//! `rdkafka` sink

use async_trait::async_trait;
use config::KafkaConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::PublishError;
use crate::sink::{RecordSink, SinkFactory};

/// Builds `FutureProducer` sinks and checks the broker before handing them out
pub struct KafkaSinkFactory;

#[async_trait]
impl SinkFactory for KafkaSinkFactory {
    async fn create(&self, config: &KafkaConfig) -> Result<Arc<dyn RecordSink>, PublishError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("acks", &config.acks)
            .set("retries", config.retries.to_string())
            .set("delivery.timeout.ms", config.delivery_timeout_ms.to_string())
            .set("request.timeout.ms", config.request_timeout_ms.to_string())
            .create()
            .map_err(|e| PublishError::Init(e.to_string()))?;

        // librdkafka connects lazily; fetch metadata so a dead broker fails here
        let probe = producer.clone();
        let topic = config.topic.clone();
        let timeout = Duration::from_millis(config.request_timeout_ms);
        tokio::task::spawn_blocking(move || {
            probe
                .client()
                .fetch_metadata(Some(&topic), timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| PublishError::Init(e.to_string()))?
        .map(|brokers| debug!(brokers, "Broker metadata fetched"))
        .map_err(|e| PublishError::Init(e.to_string()))?;

        Ok(Arc::new(KafkaSink {
            producer,
            topic: config.topic.clone(),
            send_timeout: Duration::from_millis(config.request_timeout_ms),
        }))
    }
}

struct KafkaSink {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

#[async_trait]
impl RecordSink for KafkaSink {
    async fn send(&self, key: &str, payload: &str) -> Result<(), PublishError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);
        self.producer
            .send(record, self.send_timeout)
            .await
            .map(|_| ())
            .map_err(|(e, _)| PublishError::Send(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_broker_fails_creation() {
        let config = KafkaConfig {
            // nothing listens on port 1
            bootstrap_servers: "127.0.0.1:1".to_string(),
            topic: "fx-rates".to_string(),
            acks: "all".to_string(),
            retries: 0,
            delivery_timeout_ms: 5_000,
            request_timeout_ms: 500,
            reinit_period_seconds: 10,
        };

        let result = KafkaSinkFactory.create(&config).await;
        assert!(matches!(result, Err(PublishError::Init(_))));
    }
}
