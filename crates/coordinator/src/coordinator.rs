//! Provider listener driving the pipeline
//!
//! Every accepted tick is cached, stored and followed by one calculation
//! cycle. Cycles are serialized so that two providers never consume the same
//! inputs twice.

use async_trait::async_trait;
use calculation::{DynamicFormulaService, RateCalculatorService};
use common::{Rate, RateFields, RateStatus};
use config::MasterConfig;
use filter::{FilterRegistry, FilterService};
use observability::{PipelineMetrics, TickKind};
use provider::ProviderListener;
use publisher::{KafkaProducerService, SinkFactory};
use rate_cache::RateCache;
use std::sync::Arc;
use std::time::Instant;
use storage::{calculated_key, create_store, raw_key, RateStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CoordinatorResult;

/// Counts from one calculation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub calculated: usize,
    pub published: usize,
    pub consumed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Coordinator {
    cache: Arc<RateCache>,
    store: Arc<dyn RateStore>,
    calculator: Arc<RateCalculatorService>,
    producer: Arc<KafkaProducerService>,
    cycle: Mutex<()>,
}

impl Coordinator {
    pub fn new(
        cache: Arc<RateCache>,
        store: Arc<dyn RateStore>,
        calculator: Arc<RateCalculatorService>,
        producer: Arc<KafkaProducerService>,
    ) -> Self {
        Self {
            cache,
            store,
            calculator,
            producer,
            cycle: Mutex::new(()),
        }
    }

    /// Assemble the pipeline from configuration.
    ///
    /// Fails on invalid filter settings or an unreachable Redis store. An
    /// unreachable broker is not fatal; the producer starts failed and recovers.
    pub async fn from_config(config: &MasterConfig, sinks: Arc<dyn SinkFactory>) -> CoordinatorResult<Self> {
        let filters = FilterService::from_config(&config.filters, &FilterRegistry::with_defaults())?;
        let cache = Arc::new(RateCache::new(config.cache.max_size, Arc::new(filters)));
        let store = create_store(&config.store).await?;

        let formula = Arc::new(DynamicFormulaService::new(&config.calculation));
        let calculator = Arc::new(RateCalculatorService::new(&config.calculation, formula));
        let producer = Arc::new(KafkaProducerService::new(config.kafka.clone(), sinks).await);

        info!(
            cache_max_size = cache.max_size(),
            store = store.backend(),
            targets = ?calculator.targets(),
            producer = producer.state_name(),
            "Pipeline assembled"
        );
        Ok(Self::new(cache, store, calculator, producer))
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn RateStore> {
        &self.store
    }

    pub fn producer(&self) -> &Arc<KafkaProducerService> {
        &self.producer
    }

    async fn persist(&self, key: &str, rate: &Rate) {
        if let Err(e) = self.store.put(key, rate).await {
            warn!(key = %key, error = %e, "Store write failed");
            PipelineMetrics::store_error("put");
        }
    }

    /// Snapshot, calculate, store, publish, then consume the inputs.
    ///
    /// Inputs are consumed once a result was calculated from them, whether or
    /// not the result was delivered.
    pub async fn run_cycle(&self) -> CycleReport {
        let _cycle = self.cycle.lock().await;
        let started = Instant::now();

        let snapshot = self.cache.snapshot_latest();
        let outcome = self.calculator.calculate(&snapshot);

        for (name, rate) in &outcome.rates {
            self.persist(&calculated_key(name), rate).await;
        }

        let published = if outcome.rates.is_empty() {
            0
        } else {
            self.producer.send_rates_to_kafka(&outcome.rates).await.len()
        };

        for input in &outcome.consumed {
            let name = &input.rate.name;
            self.cache.mark_rate_to_non_active(&input.platform, name, &input.rate);
            if let Err(e) = self
                .store
                .mark_inactive(&raw_key(&input.platform, name), input.rate.fields.timestamp)
                .await
            {
                warn!(platform = %input.platform, rate = %name, error = %e, "Store deactivate failed");
                PipelineMetrics::store_error("mark_inactive");
            }
        }

        PipelineMetrics::cycle_duration(started.elapsed());
        let report = CycleReport {
            calculated: outcome.rates.len(),
            published,
            consumed: outcome.consumed.len(),
            skipped: outcome.skipped.len(),
            failed: outcome.failures.len(),
        };
        if report.calculated > 0 || report.failed > 0 {
            debug!(?report, "Cycle complete");
        }
        report
    }
}

#[async_trait]
impl ProviderListener for Coordinator {
    async fn on_connect(&self, platform: &str, status: bool) {
        info!(platform = %platform, status, "Provider connected");
        PipelineMetrics::provider_connected(platform, status);
    }

    async fn on_dis_connect(&self, platform: &str, status: bool) {
        if status {
            info!(platform = %platform, "Provider disconnected");
        } else {
            warn!(platform = %platform, "Provider lost its connection");
        }
        PipelineMetrics::provider_connected(platform, false);
    }

    async fn on_rate_available(&self, platform: &str, rate_name: &str, rate: Rate) {
        let (cached, kind) = match self.cache.add_first_rate(platform, rate_name, rate.fields) {
            Some(cached) => (cached, TickKind::Available),
            None => {
                // a resubscribed or reconnected feed starts over with "available"
                debug!(platform = %platform, rate = %rate_name, "Key has history, applying as update");
                match self.cache.add_new_rate(platform, rate_name, rate.fields) {
                    Some(cached) => (cached, TickKind::Update),
                    None => return,
                }
            }
        };

        PipelineMetrics::tick_accepted(platform, kind);
        self.persist(&raw_key(platform, rate_name), &cached).await;
        self.run_cycle().await;
    }

    async fn on_rate_update(&self, platform: &str, rate_name: &str, fields: RateFields) {
        // rejections are logged and counted by the cache and the filter chain
        let Some(cached) = self.cache.add_new_rate(platform, rate_name, fields) else {
            return;
        };

        PipelineMetrics::tick_accepted(platform, TickKind::Update);
        self.persist(&raw_key(platform, rate_name), &cached).await;
        self.run_cycle().await;
    }

    async fn on_rate_status(&self, platform: &str, rate_name: &str, status: RateStatus) {
        if status.active {
            debug!(platform = %platform, rate = %rate_name, "Rate reported active");
            return;
        }

        let marked = self.cache.mark_key_non_active(platform, rate_name);
        if let Err(e) = self.store.mark_all_inactive(&raw_key(platform, rate_name)).await {
            warn!(platform = %platform, rate = %rate_name, error = %e, "Store deactivate failed");
            PipelineMetrics::store_error("mark_all_inactive");
        }
        info!(platform = %platform, rate = %rate_name, marked, "Rate reported inactive");
    }
}
