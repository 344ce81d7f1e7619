//! Filter trait and scope

use common::Rate;
use std::collections::{HashMap, HashSet};

use crate::Result;

/// The (platform, rate) pairs a filter applies to
#[derive(Debug, Clone, Default)]
pub struct FilterScope {
    pairs: Option<HashMap<String, HashSet<String>>>,
}

impl FilterScope {
    /// Applies to every pair
    pub fn everywhere() -> Self {
        Self { pairs: None }
    }

    /// Applies only to the listed platform -> rate names
    pub fn only(pairs: HashMap<String, Vec<String>>) -> Self {
        Self {
            pairs: Some(
                pairs
                    .into_iter()
                    .map(|(platform, rates)| (platform, rates.into_iter().collect()))
                    .collect(),
            ),
        }
    }

    pub fn from_config(scope: Option<&HashMap<String, Vec<String>>>) -> Self {
        match scope {
            Some(pairs) => Self::only(pairs.clone()),
            None => Self::everywhere(),
        }
    }

    pub fn applies_to(&self, platform: &str, rate_name: &str) -> bool {
        match &self.pairs {
            None => true,
            Some(pairs) => pairs
                .get(platform)
                .map_or(false, |rates| rates.contains(rate_name)),
        }
    }
}

/// A validator voting on one candidate tick
///
/// Implementations run while the cache holds the key's lock, so they must be
/// quick and must not block.
pub trait RateFilter: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &str;

    fn scope(&self) -> &FilterScope;

    /// `Ok(true)` accepts the candidate, `Ok(false)` rejects it.
    ///
    /// * `last` - last accepted value for the key, `None` on a first tick
    /// * `history` - retained history for the key, oldest first
    fn check(&self, last: Option<&Rate>, candidate: &Rate, history: &[Rate]) -> Result<bool>;
}
