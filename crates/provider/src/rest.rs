//! Polling REST provider
//!
//! Every `poll_interval` the poller requests `GET {base_url}/{rate_name}` for
//! each subscribed instrument concurrently, then dispatches the results in
//! subscription order. A failed request only costs that instrument its tick.

use async_trait::async_trait;
use common::RateStatus;
use config::PlatformConfig;
use futures::future::join_all;
use observability::PipelineMetrics;
use parking_lot::Mutex;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::TickDispatcher;
use crate::error::{ProviderError, ProviderResult};
use crate::markers::SentMarkers;
use crate::traits::{ConnectParams, Provider, ProviderListener};
use crate::wire::{parse_rest_body, Tick};

/// `type` of a REST platform entry
pub const KIND: &str = "rest";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

struct Polling {
    token: CancellationToken,
    task: JoinHandle<()>,
}

pub struct RestProvider {
    dispatcher: Arc<TickDispatcher>,
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    poll_interval: Duration,
    polling: Mutex<Option<Polling>>,
}

impl RestProvider {
    pub fn new(platform: impl Into<String>, listener: Arc<dyn ProviderListener>) -> ProviderResult<Self> {
        Self::build(platform.into(), listener, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn from_config(config: &PlatformConfig, listener: Arc<dyn ProviderListener>) -> ProviderResult<Self> {
        let mut provider = Self::build(
            config.name.clone(),
            listener,
            Duration::from_millis(config.request_timeout_ms),
        )?;
        provider.base_url = config.base_url.clone();
        provider.api_key = config.api_key.clone();
        provider.poll_interval = Duration::from_millis(config.poll_interval_ms.max(1));
        Ok(provider)
    }

    fn build(platform: String, listener: Arc<dyn ProviderListener>, timeout: Duration) -> ProviderResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let markers = Arc::new(SentMarkers::new());
        Ok(Self {
            dispatcher: Arc::new(TickDispatcher::new(platform, listener, markers)),
            client,
            base_url: None,
            api_key: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            polling: Mutex::new(None),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn is_running(&self) -> bool {
        self.polling
            .lock()
            .as_ref()
            .is_some_and(|p| !p.task.is_finished())
    }
}

#[async_trait]
impl Provider for RestProvider {
    fn platform(&self) -> &str {
        self.dispatcher.platform()
    }

    async fn connect(&self, platform_name: &str, params: &ConnectParams) -> ProviderResult<()> {
        self.dispatcher.check_platform(platform_name)?;
        let base_url = params
            .get("base_url")
            .cloned()
            .or_else(|| self.base_url.clone())
            .ok_or_else(|| ProviderError::MissingSetting {
                platform: platform_name.to_string(),
                setting: "base_url",
            })?;

        if self.is_running() {
            warn!(platform = %platform_name, "Already connected, ignoring connect");
            return Ok(());
        }

        info!(platform = %platform_name, %base_url, "REST provider started");
        self.dispatcher
            .listener()
            .on_connect(platform_name, true)
            .await;

        let token = CancellationToken::new();
        let poller = Poller {
            dispatcher: self.dispatcher.clone(),
            client: self.client.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.clone(),
            interval: self.poll_interval,
            token: token.clone(),
        };
        let task = tokio::spawn(poller.run());
        *self.polling.lock() = Some(Polling { token, task });
        Ok(())
    }

    async fn dis_connect(&self, platform_name: &str, _params: &ConnectParams) -> ProviderResult<()> {
        self.dispatcher.check_platform(platform_name)?;

        let polling = self.polling.lock().take();
        if let Some(polling) = polling {
            polling.token.cancel();
            if let Err(e) = polling.task.await {
                warn!(platform = %platform_name, error = %e, "Poll task ended abnormally");
            }
        }

        self.dispatcher.markers().clear_sent();
        self.dispatcher
            .listener()
            .on_dis_connect(platform_name, true)
            .await;
        info!(platform = %platform_name, "REST provider disconnected");
        Ok(())
    }

    async fn subscribe(&self, platform_name: &str, rate_name: &str) -> ProviderResult<()> {
        self.dispatcher.check_platform(platform_name)?;
        if self.dispatcher.markers().subscribe(rate_name) {
            info!(platform = %platform_name, rate = %rate_name, "Subscribed");
        }
        Ok(())
    }

    async fn un_subscribe(&self, platform_name: &str, rate_name: &str) -> ProviderResult<()> {
        self.dispatcher.check_platform(platform_name)?;
        if !self.dispatcher.markers().unsubscribe(rate_name) {
            debug!(platform = %platform_name, rate = %rate_name, "Not subscribed");
            return Ok(());
        }
        self.dispatcher
            .listener()
            .on_rate_status(platform_name, rate_name, RateStatus::INACTIVE)
            .await;
        info!(platform = %platform_name, rate = %rate_name, "Unsubscribed");
        Ok(())
    }
}

struct Poller {
    dispatcher: Arc<TickDispatcher>,
    client: Client,
    base_url: String,
    api_key: Option<String>,
    interval: Duration,
    token: CancellationToken,
}

impl Poller {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.poll_once().await;
        }
        debug!(platform = %self.dispatcher.platform(), "Poller stopped");
    }

    async fn poll_once(&self) {
        let names = self.dispatcher.markers().subscriptions();
        let results = tokio::select! {
            // in-flight requests are dropped, nothing is dispatched
            _ = self.token.cancelled() => return,
            results = join_all(names.iter().map(|name| self.fetch(name))) => results,
        };

        let platform = self.dispatcher.platform();
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(tick) => self.dispatcher.dispatch(tick).await,
                Err(ProviderError::Wire(e)) => {
                    warn!(platform = %platform, rate = %name, error = %e, "Malformed response, dropping");
                    PipelineMetrics::tick_dropped(platform, "malformed");
                }
                Err(e) => {
                    warn!(platform = %platform, rate = %name, error = %e, "Fetch failed");
                    PipelineMetrics::tick_dropped(platform, "fetch_failed");
                }
            }
        }
    }

    async fn fetch(&self, rate_name: &str) -> ProviderResult<Tick> {
        let mut request = self.client.get(format!("{}/{}", self.base_url, rate_name));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let body = request.send().await?.error_for_status()?.text().await?;
        Ok(parse_rest_body(&body, rate_name)?)
    }
}
