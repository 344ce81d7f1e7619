//! Jump-threshold filter
//!
//! Rejects a candidate whose bid or ask moved more than `max_jump_fraction`
//! relative to the last accepted value.

use common::Rate;
use config::FilterConfig;
use tracing::warn;

use crate::error::FilterError;
use crate::traits::{FilterScope, RateFilter};
use crate::Result;

pub const KIND: &str = "jump_threshold";

pub struct JumpThresholdFilter {
    name: String,
    max_jump_fraction: f64,
    scope: FilterScope,
}

impl JumpThresholdFilter {
    pub fn new(max_jump_fraction: f64) -> Result<Self> {
        if !max_jump_fraction.is_finite() || max_jump_fraction <= 0.0 {
            return Err(FilterError::InvalidParameter {
                filter: KIND.to_string(),
                param: "max_jump_fraction".to_string(),
                message: format!("must be positive, got {}", max_jump_fraction),
            });
        }
        Ok(Self {
            name: KIND.to_string(),
            max_jump_fraction,
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
        let fraction = config
            .param("max_jump_fraction")
            .ok_or_else(|| FilterError::InvalidParameter {
                filter: config.display_name().to_string(),
                param: "max_jump_fraction".to_string(),
                message: "missing".to_string(),
            })?;

        Ok(Self::new(fraction)?
            .with_name(config.display_name())
            .with_scope(FilterScope::from_config(config.scope.as_ref())))
    }

    pub fn max_jump_fraction(&self) -> f64 {
        self.max_jump_fraction
    }
}

impl RateFilter for JumpThresholdFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn scope(&self) -> &FilterScope {
        &self.scope
    }

    fn check(&self, last: Option<&Rate>, candidate: &Rate, _history: &[Rate]) -> Result<bool> {
        let Some(last) = last else {
            return Ok(true);
        };

        if !candidate.fields.is_finite() || !last.fields.is_finite() {
            return Err(FilterError::NonFinite {
                filter: self.name.clone(),
                rate: candidate.name.clone(),
            });
        }

        // zero reference price: nothing meaningful to compare against
        if last.fields.bid == 0.0 || last.fields.ask == 0.0 {
            warn!(
                filter = %self.name,
                rate = %candidate.name,
                "Reference price is zero, accepting without jump check"
            );
            return Ok(true);
        }

        let bid_jump = (candidate.fields.bid - last.fields.bid).abs() / last.fields.bid.abs();
        let ask_jump = (candidate.fields.ask - last.fields.ask).abs() / last.fields.ask.abs();

        Ok(bid_jump <= self.max_jump_fraction && ask_jump <= self.max_jump_fraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use common::RateFields;

    fn rate(bid: f64, ask: f64) -> Rate {
        Rate::updated("PF1_USDTRY", RateFields::new(bid, ask, 0))
    }

    #[test]
    fn test_five_percent_gate() {
        let filter = JumpThresholdFilter::new(0.05).unwrap();
        let last = rate(100.0, 101.0);

        assert!(!filter.check(Some(&last), &rate(106.0, 101.0), &[]).unwrap());
        assert!(filter.check(Some(&last), &rate(104.0, 101.0), &[]).unwrap());
        assert!(!filter.check(Some(&last), &rate(100.0, 90.0), &[]).unwrap());
    }

    #[test]
    fn test_first_tick_accepted() {
        let filter = JumpThresholdFilter::new(0.01).unwrap();
        assert!(filter.check(None, &rate(1000.0, 1001.0), &[]).unwrap());
    }

    #[test]
    fn test_zero_reference_accepted() {
        let filter = JumpThresholdFilter::new(0.01).unwrap();
        let last = rate(0.0, 0.0);
        assert!(filter.check(Some(&last), &rate(5.0, 6.0), &[]).unwrap());
    }

    #[test]
    fn test_non_finite_candidate_is_error() {
        let filter = JumpThresholdFilter::new(0.01).unwrap();
        let last = rate(1.0, 1.0);
        assert_matches!(
            filter.check(Some(&last), &rate(f64::NAN, 1.0), &[]),
            Err(FilterError::NonFinite { .. })
        );
    }

    #[test]
    fn test_invalid_fraction() {
        assert!(JumpThresholdFilter::new(0.0).is_err());
        assert!(JumpThresholdFilter::new(-1.0).is_err());
        assert!(JumpThresholdFilter::new(f64::NAN).is_err());
    }
}
