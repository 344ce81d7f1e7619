//! Filter registry
//!
//! Maps the `type` of a filter configuration entry to a constructor.

use config::FilterConfig;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::FilterError;
use crate::traits::RateFilter;
use crate::{jump_threshold, moving_average, JumpThresholdFilter, MovingAverageFilter, Result};

/// Constructor for one filter kind
pub type FilterFactory = fn(&FilterConfig) -> Result<Arc<dyn RateFilter>>;

pub struct FilterRegistry {
    factories: HashMap<String, FilterFactory>,
}

impl FilterRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in filters
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(jump_threshold::KIND, build_jump_threshold);
        registry.register(moving_average::KIND, build_moving_average);
        registry
    }

    /// Register (or replace) the constructor for a kind
    pub fn register(&mut self, kind: &str, factory: FilterFactory) {
        self.factories.insert(kind.to_string(), factory);
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(&self, config: &FilterConfig) -> Result<Arc<dyn RateFilter>> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| FilterError::UnknownKind(config.kind.clone()))?;
        factory(config)
    }
}

fn build_jump_threshold(config: &FilterConfig) -> Result<Arc<dyn RateFilter>> {
    Ok(Arc::new(JumpThresholdFilter::from_config(config)?))
}

fn build_moving_average(config: &FilterConfig) -> Result<Arc<dyn RateFilter>> {
    Ok(Arc::new(MovingAverageFilter::from_config(config)?))
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
