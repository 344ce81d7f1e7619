//! Routes parsed ticks to the listener

use common::Rate;
use observability::PipelineMetrics;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{ProviderError, ProviderResult};
use crate::markers::{Delivery, SentMarkers};
use crate::traits::ProviderListener;
use crate::wire::Tick;

/// Delivers ticks for one platform: first tick as `on_rate_available`,
/// later ones as `on_rate_update`, unsubscribed ones dropped
pub struct TickDispatcher {
    platform: String,
    listener: Arc<dyn ProviderListener>,
    markers: Arc<SentMarkers>,
}

impl TickDispatcher {
    pub fn new(platform: impl Into<String>, listener: Arc<dyn ProviderListener>, markers: Arc<SentMarkers>) -> Self {
        Self {
            platform: platform.into(),
            listener,
            markers,
        }
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn listener(&self) -> &Arc<dyn ProviderListener> {
        &self.listener
    }

    pub fn markers(&self) -> &SentMarkers {
        &self.markers
    }

    /// Reject calls naming another platform
    pub fn check_platform(&self, platform_name: &str) -> ProviderResult<()> {
        if platform_name == self.platform {
            Ok(())
        } else {
            Err(ProviderError::UnknownPlatform {
                expected: self.platform.clone(),
                got: platform_name.to_string(),
            })
        }
    }

    pub async fn dispatch(&self, tick: Tick) {
        match self.markers.classify(&tick.rate_name) {
            Delivery::Unsubscribed => {
                debug!(platform = %self.platform, rate = %tick.rate_name, "Tick for unsubscribed rate, dropping");
                PipelineMetrics::tick_dropped(&self.platform, "unsubscribed");
            }
            Delivery::First => {
                trace!(platform = %self.platform, rate = %tick.rate_name, "First tick");
                let rate = Rate::first(tick.rate_name.clone(), tick.fields);
                self.listener
                    .on_rate_available(&self.platform, &tick.rate_name, rate)
                    .await;
            }
            Delivery::Update => {
                self.listener
                    .on_rate_update(&self.platform, &tick.rate_name, tick.fields)
                    .await;
            }
        }
    }
}
