//! Provider and listener contracts

use async_trait::async_trait;
use common::{Rate, RateFields, RateStatus};
use std::collections::HashMap;

use crate::error::ProviderResult;

/// Connection overrides passed to `connect` (`host`, `port`, `base_url`)
pub type ConnectParams = HashMap<String, String>;

/// Receives every event a provider produces.
///
/// Providers await each callback before reading their next record, so calls
/// for one platform arrive in feed order. Different platforms call concurrently.
#[async_trait]
pub trait ProviderListener: Send + Sync {
    async fn on_connect(&self, platform: &str, status: bool);

    /// `status` is `true` for a requested disconnect, `false` for a lost connection
    async fn on_dis_connect(&self, platform: &str, status: bool);

    /// First value of an instrument since it was subscribed
    async fn on_rate_available(&self, platform: &str, rate_name: &str, rate: Rate);

    async fn on_rate_update(&self, platform: &str, rate_name: &str, fields: RateFields);

    async fn on_rate_status(&self, platform: &str, rate_name: &str, status: RateStatus);
}

/// An upstream feed serving exactly one platform
#[async_trait]
pub trait Provider: Send + Sync {
    /// Platform this provider serves
    fn platform(&self) -> &str;

    async fn connect(&self, platform_name: &str, params: &ConnectParams) -> ProviderResult<()>;

    async fn dis_connect(&self, platform_name: &str, params: &ConnectParams) -> ProviderResult<()>;

    async fn subscribe(&self, platform_name: &str, rate_name: &str) -> ProviderResult<()>;

    async fn un_subscribe(&self, platform_name: &str, rate_name: &str) -> ProviderResult<()>;
}
