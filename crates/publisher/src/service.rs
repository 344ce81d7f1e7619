//! Kafka producer service
//!
//! A small state machine around one sink:
//!
//! ```text
//! Uninitialized --build ok--> Ready(sink) --send error--> Failed
//!       |                        ^                           |
//!       +------build error-------|----> Failed <--build err--+
//!                                +-------health check--------+
//! ```
//!
//! Sends never wait for recovery. While the state is not `Ready` a send fails
//! fast with `PublishError::Unavailable` and the message is dropped.

use common::{encode_record, Rate};
use config::KafkaConfig;
use observability::PipelineMetrics;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::PublishError;
use crate::sink::{RecordSink, SinkFactory};

enum ProducerState {
    Uninitialized,
    Ready(Arc<dyn RecordSink>),
    Failed { reason: String },
}

impl ProducerState {
    fn name(&self) -> &'static str {
        match self {
            ProducerState::Uninitialized => "uninitialized",
            ProducerState::Ready(_) => "ready",
            ProducerState::Failed { .. } => "failed",
        }
    }
}

pub struct KafkaProducerService {
    config: KafkaConfig,
    factory: Arc<dyn SinkFactory>,
    state: Mutex<ProducerState>,
    /// Serializes rebuilds so concurrent health checks build one sink
    rebuild: tokio::sync::Mutex<()>,
}

impl KafkaProducerService {
    /// Create the service and try to build the first sink.
    ///
    /// Never fails: an unreachable broker leaves the service `Failed` until a
    /// health check succeeds.
    pub async fn new(config: KafkaConfig, factory: Arc<dyn SinkFactory>) -> Self {
        let service = Self {
            config,
            factory,
            state: Mutex::new(ProducerState::Uninitialized),
            rebuild: tokio::sync::Mutex::new(()),
        };
        service.initialize().await;
        service
    }

    pub fn config(&self) -> &KafkaConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), ProducerState::Ready(_))
    }

    /// `uninitialized`, `ready` or `failed`
    pub fn state_name(&self) -> &'static str {
        self.state.lock().name()
    }

    /// Last build or send failure, if the service is `Failed`
    pub fn failure_reason(&self) -> Option<String> {
        match &*self.state.lock() {
            ProducerState::Failed { reason } => Some(reason.clone()),
            _ => None,
        }
    }

    async fn initialize(&self) -> bool {
        let _guard = self.rebuild.lock().await;
        if self.is_ready() {
            return true;
        }

        match self.factory.create(&self.config).await {
            Ok(sink) => {
                *self.state.lock() = ProducerState::Ready(sink);
                PipelineMetrics::producer_ready(true);
                info!(
                    bootstrap_servers = %self.config.bootstrap_servers,
                    topic = %self.config.topic,
                    acks = %self.config.acks,
                    retries = self.config.retries,
                    delivery_timeout_ms = self.config.delivery_timeout_ms,
                    request_timeout_ms = self.config.request_timeout_ms,
                    "Kafka producer ready"
                );
                true
            }
            Err(e) => {
                warn!(
                    bootstrap_servers = %self.config.bootstrap_servers,
                    error = %e,
                    "Kafka producer initialization failed"
                );
                *self.state.lock() = ProducerState::Failed {
                    reason: e.to_string(),
                };
                PipelineMetrics::producer_ready(false);
                false
            }
        }
    }

    /// Rebuild the sink unless it is ready. Returns whether it is ready now.
    pub async fn health_check(&self) -> bool {
        if self.is_ready() {
            return true;
        }
        debug!(state = self.state_name(), "Producer not ready, reinitializing");
        self.initialize().await
    }

    /// Run `health_check` every `reinit_period_seconds` until `shutdown`
    pub fn spawn_health_check(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let period = Duration::from_secs(self.config.reinit_period_seconds.max(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick fires immediately; construction already tried
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        service.health_check().await;
                    }
                }
            }
            debug!("Producer health check stopped");
        })
    }

    fn current_sink(&self) -> Result<Arc<dyn RecordSink>, PublishError> {
        match &*self.state.lock() {
            ProducerState::Ready(sink) => Ok(sink.clone()),
            ProducerState::Uninitialized => Err(PublishError::Unavailable("not initialized".to_string())),
            ProducerState::Failed { reason } => Err(PublishError::Unavailable(reason.clone())),
        }
    }

    /// Drop `failed` if it is still the active sink
    fn mark_failed(&self, failed: &Arc<dyn RecordSink>, reason: String) {
        let mut state = self.state.lock();
        if let ProducerState::Ready(current) = &*state {
            if Arc::ptr_eq(current, failed) {
                *state = ProducerState::Failed { reason };
                PipelineMetrics::producer_ready(false);
            }
        }
    }

    /// Publish one rate keyed by its name
    pub async fn send_rate(&self, rate: &Rate) -> Result<(), PublishError> {
        let payload = encode_record(rate)?;
        let sink = self.current_sink().map_err(|e| {
            PipelineMetrics::publish_failed("unavailable");
            e
        })?;

        match sink.send(&rate.name, &payload).await {
            Ok(()) => {
                debug!(rate = %rate.name, payload = %payload, "Rate published");
                Ok(())
            }
            Err(e) => {
                error!(rate = %rate.name, error = %e, "Publish failed, producer marked failed");
                PipelineMetrics::publish_failed("send");
                self.mark_failed(&sink, e.to_string());
                Err(e)
            }
        }
    }

    /// Publish every rate, returning the names that were delivered.
    ///
    /// Undelivered rates are logged and dropped.
    pub async fn send_rates_to_kafka(&self, rates: &BTreeMap<String, Rate>) -> Vec<String> {
        let mut delivered = Vec::with_capacity(rates.len());
        for (name, rate) in rates {
            match self.send_rate(rate).await {
                Ok(()) => delivered.push(name.clone()),
                Err(e) => warn!(rate = %name, error = %e, "Rate not published"),
            }
        }
        PipelineMetrics::published(delivered.len());
        delivered
    }
}
