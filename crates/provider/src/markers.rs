//! Subscriptions and first-tick markers

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashSet};

/// How a tick must be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Not subscribed; drop it
    Unsubscribed,
    /// First tick since subscribing
    First,
    Update,
}

#[derive(Default)]
struct State {
    subscribed: BTreeSet<String>,
    sent: HashSet<String>,
}

/// Per-instrument subscription flag and "already sent" marker.
///
/// Both live under one lock so an unsubscribe racing a tick can never leave a
/// marker behind.
#[derive(Default)]
pub struct SentMarkers {
    state: Mutex<State>,
}

impl SentMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if already subscribed
    pub fn subscribe(&self, rate_name: &str) -> bool {
        self.state.lock().subscribed.insert(rate_name.to_string())
    }

    /// Remove the subscription and its marker. Returns `false` if not subscribed.
    pub fn unsubscribe(&self, rate_name: &str) -> bool {
        let mut state = self.state.lock();
        state.sent.remove(rate_name);
        state.subscribed.remove(rate_name)
    }

    pub fn is_subscribed(&self, rate_name: &str) -> bool {
        self.state.lock().subscribed.contains(rate_name)
    }

    /// Subscribed instruments in name order
    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().subscribed.iter().cloned().collect()
    }

    /// Classify a tick and record that it was sent
    pub fn classify(&self, rate_name: &str) -> Delivery {
        let mut state = self.state.lock();
        if !state.subscribed.contains(rate_name) {
            Delivery::Unsubscribed
        } else if state.sent.insert(rate_name.to_string()) {
            Delivery::First
        } else {
            Delivery::Update
        }
    }

    /// Forget every marker; subscriptions are kept
    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_then_updates() {
        let markers = SentMarkers::new();
        assert!(markers.subscribe("PF1_USDTRY"));
        assert!(!markers.subscribe("PF1_USDTRY"));

        assert_eq!(markers.classify("PF1_USDTRY"), Delivery::First);
        assert_eq!(markers.classify("PF1_USDTRY"), Delivery::Update);
        assert_eq!(markers.classify("PF1_USDTRY"), Delivery::Update);
    }

    #[test]
    fn test_late_tick_after_unsubscribe_is_dropped() {
        let markers = SentMarkers::new();
        markers.subscribe("PF1_EURUSD");
        markers.classify("PF1_EURUSD");

        assert!(markers.unsubscribe("PF1_EURUSD"));
        assert_eq!(markers.classify("PF1_EURUSD"), Delivery::Unsubscribed);
        assert_eq!(markers.classify("PF1_EURUSD"), Delivery::Unsubscribed);

        // resubscribing starts over with a first tick
        markers.subscribe("PF1_EURUSD");
        assert_eq!(markers.classify("PF1_EURUSD"), Delivery::First);
    }

    #[test]
    fn test_clear_sent_keeps_subscriptions() {
        let markers = SentMarkers::new();
        markers.subscribe("PF1_USDTRY");
        markers.subscribe("PF1_GBPUSD");
        markers.classify("PF1_USDTRY");

        markers.clear_sent();
        assert_eq!(markers.subscriptions(), vec!["PF1_GBPUSD", "PF1_USDTRY"]);
        assert_eq!(markers.classify("PF1_USDTRY"), Delivery::First);
    }
}
