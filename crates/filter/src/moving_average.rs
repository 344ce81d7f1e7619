//! Moving-average filter
//!
//! Rejects a candidate whose bid or ask deviates from the mean of the key's
//! retained history by more than `max_deviation_fraction`. Until the history
//! holds `min_history` entries every candidate is accepted.

use common::Rate;
use config::FilterConfig;
use tracing::{debug, warn};

use crate::error::FilterError;
use crate::traits::{FilterScope, RateFilter};
use crate::Result;

pub const KIND: &str = "moving_average";

const DEFAULT_MIN_HISTORY: usize = 1;

pub struct MovingAverageFilter {
    name: String,
    max_deviation_fraction: f64,
    min_history: usize,
    scope: FilterScope,
}

impl MovingAverageFilter {
    pub fn new(max_deviation_fraction: f64, min_history: usize) -> Result<Self> {
        if !max_deviation_fraction.is_finite() || max_deviation_fraction <= 0.0 {
            return Err(FilterError::InvalidParameter {
                filter: KIND.to_string(),
                param: "max_deviation_fraction".to_string(),
                message: format!("must be positive, got {}", max_deviation_fraction),
            });
        }
        Ok(Self {
            name: KIND.to_string(),
            max_deviation_fraction,
            min_history: min_history.max(1),
            scope: FilterScope::everywhere(),
        })
    }

    pub fn with_scope(mut self, scope: FilterScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let invalid = |param: &str, message: String| FilterError::InvalidParameter {
            filter: config.display_name().to_string(),
            param: param.to_string(),
            message,
        };

        let fraction = config
            .param("max_deviation_fraction")
            .ok_or_else(|| invalid("max_deviation_fraction", "missing".to_string()))?;

        let min_history = match config.param("min_history") {
            None => DEFAULT_MIN_HISTORY,
            Some(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => v as usize,
            Some(v) => {
                return Err(invalid(
                    "min_history",
                    format!("must be a non-negative integer, got {}", v),
                ))
            }
        };

        Ok(Self::new(fraction, min_history)?
            .with_name(config.display_name())
            .with_scope(FilterScope::from_config(config.scope.as_ref())))
    }
}

impl RateFilter for MovingAverageFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &FilterScope {
        &self.scope
    }

    fn check(&self, _last: Option<&Rate>, candidate: &Rate, history: &[Rate]) -> Result<bool> {
        if !candidate.fields.is_finite() {
            return Err(FilterError::NonFinite {
                filter: self.name.clone(),
                rate: candidate.name.clone(),
            });
        }

        if history.len() < self.min_history {
            debug!(
                filter = %self.name,
                rate = %candidate.name,
                history = history.len(),
                "Warming up, accepting"
            );
            return Ok(true);
        }

        let n = history.len() as f64;
        let (bid_sum, ask_sum) = history.iter().fold((0.0, 0.0), |(b, a), r| {
            (b + r.fields.bid, a + r.fields.ask)
        });
        let (bid_mean, ask_mean) = (bid_sum / n, ask_sum / n);

        if !bid_mean.is_finite() || !ask_mean.is_finite() {
            return Err(FilterError::NonFinite {
                filter: self.name.clone(),
                rate: candidate.name.clone(),
            });
        }

        if bid_mean == 0.0 || ask_mean == 0.0 {
            warn!(
                filter = %self.name,
                rate = %candidate.name,
                "History mean is zero, accepting without deviation check"
            );
            return Ok(true);
        }

        let bid_dev = (candidate.fields.bid - bid_mean).abs() / bid_mean.abs();
        let ask_dev = (candidate.fields.ask - ask_mean).abs() / ask_mean.abs();

        Ok(bid_dev <= self.max_deviation_fraction && ask_dev <= self.max_deviation_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::RateFields;
    use std::collections::HashMap;

    fn rate(bid: f64, ask: f64) -> Rate {
        Rate::updated("PF2_EURUSD", RateFields::new(bid, ask, 0))
    }

    #[test]
    fn test_deviation_from_history_mean() {
        let filter = MovingAverageFilter::new(0.02, 1).unwrap();
        let history = vec![rate(1.00, 1.01), rate(1.02, 1.03), rate(1.01, 1.02)];

        // mean bid 1.01, mean ask 1.02
        assert!(filter.check(None, &rate(1.02, 1.03), &history).unwrap());
        assert!(!filter.check(None, &rate(1.05, 1.03), &history).unwrap());
        assert!(!filter.check(None, &rate(1.01, 0.98), &history).unwrap());
    }

    #[test]
    fn test_warm_up_accepts() {
        let filter = MovingAverageFilter::new(0.01, 3).unwrap();
        let history = vec![rate(1.0, 1.0), rate(1.0, 1.0)];
        assert!(filter.check(None, &rate(5.0, 5.0), &history).unwrap());
    }

    #[test]
    fn test_from_config_defaults_min_history() {
        let config = FilterConfig {
            kind: KIND.to_string(),
            name: Some("ma".to_string()),
            enabled: true,
            params: HashMap::from([("max_deviation_fraction".to_string(), 0.1)]),
            scope: None,
        };
        let filter = MovingAverageFilter::from_config(&config).unwrap();
        assert_eq!(filter.name(), "ma");
        assert_eq!(filter.min_history, DEFAULT_MIN_HISTORY);
    }

    #[test]
    fn test_from_config_rejects_fractional_min_history() {
        let config = FilterConfig {
            kind: KIND.to_string(),
            name: None,
            enabled: true,
            params: HashMap::from([
                ("max_deviation_fraction".to_string(), 0.1),
                ("min_history".to_string(), 2.5),
            ]),
            scope: None,
        };
        assert!(MovingAverageFilter::from_config(&config).is_err());
    }
}
