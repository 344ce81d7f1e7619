//! Outbound record sinks
//!
//! A `RecordSink` delivers one keyed record. A `SinkFactory` builds a complete
//! sink from configuration; the producer service asks it for a fresh sink every
//! time it recovers.

use async_trait::async_trait;
use config::KafkaConfig;
use std::sync::Arc;

use crate::error::PublishError;

#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Deliver `payload` under `key`, returning once the broker acknowledged it
    async fn send(&self, key: &str, payload: &str) -> Result<(), PublishError>;
}

#[async_trait]
pub trait SinkFactory: Send + Sync {
    /// Build a connected sink. Fails when the broker is unreachable.
    async fn create(&self, config: &KafkaConfig) -> Result<Arc<dyn RecordSink>, PublishError>;
}

/// Sink factory for the enabled transport
pub fn default_sink_factory() -> Arc<dyn SinkFactory> {
    #[cfg(feature = "kafka")]
    {
        Arc::new(crate::kafka::KafkaSinkFactory)
    }
    #[cfg(not(feature = "kafka"))]
    {
        Arc::new(DisabledSinkFactory)
    }
}

/// Factory used when the crate is built without the `kafka` feature
#[cfg(not(feature = "kafka"))]
pub struct DisabledSinkFactory;

#[cfg(not(feature = "kafka"))]
#[async_trait]
impl SinkFactory for DisabledSinkFactory {
    async fn create(&self, _config: &KafkaConfig) -> Result<Arc<dyn RecordSink>, PublishError> {
        Err(PublishError::Init("built without the kafka feature".to_string()))
    }
}
