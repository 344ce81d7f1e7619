//! Provider startup and teardown

use config::PlatformConfig;
use provider::{ConnectParams, Provider, ProviderListener, ProviderRegistry};
use std::sync::Arc;
use tracing::{error, info, warn};

/// The providers that started, in configuration order
pub struct ProviderSet {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderSet {
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn platforms(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.platform()).collect()
    }

    /// Disconnect every provider, logging failures
    pub async fn disconnect_all(&self) {
        let params = ConnectParams::new();
        for provider in &self.providers {
            if let Err(e) = provider.dis_connect(provider.platform(), &params).await {
                warn!(platform = %provider.platform(), error = %e, "Disconnect failed");
            }
        }
        info!(count = self.providers.len(), "Providers disconnected");
    }
}

/// Build, subscribe and connect every enabled platform.
///
/// A platform that cannot be built or connected is logged and left out; the
/// others still start.
pub async fn load_providers(
    listener: Arc<dyn ProviderListener>,
    platforms: &[PlatformConfig],
    registry: &ProviderRegistry,
) -> ProviderSet {
    let mut providers = Vec::new();
    let params = ConnectParams::new();

    for platform in platforms.iter().filter(|p| p.enabled) {
        let provider = match registry.build(platform, listener.clone()) {
            Ok(provider) => provider,
            Err(e) => {
                error!(platform = %platform.name, kind = %platform.kind, error = %e, "Provider could not be created");
                continue;
            }
        };

        for rate_name in &platform.subscriptions {
            if let Err(e) = provider.subscribe(&platform.name, rate_name).await {
                warn!(platform = %platform.name, rate = %rate_name, error = %e, "Subscribe failed");
            }
        }

        if let Err(e) = provider.connect(&platform.name, &params).await {
            error!(platform = %platform.name, error = %e, "Provider could not connect");
            continue;
        }

        info!(
            platform = %platform.name,
            kind = %platform.kind,
            subscriptions = platform.subscriptions.len(),
            "Provider loaded"
        );
        providers.push(provider);
    }

    ProviderSet { providers }
}
