//! Test doubles shared by the provider tests

use async_trait::async_trait;
use common::{Rate, RateFields, RateStatus};
use parking_lot::Mutex;
use std::time::Duration;

use crate::traits::ProviderListener;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect(String, bool),
    DisConnect(String, bool),
    Available(String, String, Rate),
    Update(String, String, RateFields),
    Status(String, String, RateStatus),
}

#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<Event>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Poll until `done` holds for the recorded events, panicking after 5s
    pub async fn wait_until(&self, done: impl Fn(&[Event]) -> bool) -> Vec<Event> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let events = self.events();
            if done(&events) {
                return events;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out, events so far: {:?}",
                events
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn push(&self, event: Event) {
        self.events.lock().push(event);
    }
}

#[async_trait]
impl ProviderListener for RecordingListener {
    async fn on_connect(&self, platform: &str, status: bool) {
        self.push(Event::Connect(platform.to_string(), status));
    }

    async fn on_dis_connect(&self, platform: &str, status: bool) {
        self.push(Event::DisConnect(platform.to_string(), status));
    }

    async fn on_rate_available(&self, platform: &str, rate_name: &str, rate: Rate) {
        self.push(Event::Available(platform.to_string(), rate_name.to_string(), rate));
    }

    async fn on_rate_update(&self, platform: &str, rate_name: &str, fields: RateFields) {
        self.push(Event::Update(platform.to_string(), rate_name.to_string(), fields));
    }

    async fn on_rate_status(&self, platform: &str, rate_name: &str, status: RateStatus) {
        self.push(Event::Status(platform.to_string(), rate_name.to_string(), status));
    }
}
