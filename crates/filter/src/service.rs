//! Ordered filter chain

use common::Rate;
use config::FilterConfig;
use observability::PipelineMetrics;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::registry::FilterRegistry;
use crate::traits::RateFilter;
use crate::Result;

/// Runs filters in configuration order with AND semantics
#[derive(Clone, Default)]
pub struct FilterService {
    filters: Vec<Arc<dyn RateFilter>>,
}

impl FilterService {
    pub fn new(filters: Vec<Arc<dyn RateFilter>>) -> Self {
        Self { filters }
    }

    /// A chain that accepts everything
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the chain from configuration, skipping disabled entries
    pub fn from_config(configs: &[FilterConfig], registry: &FilterRegistry) -> Result<Self> {
        let mut filters = Vec::with_capacity(configs.len());
        for config in configs {
            if !config.enabled {
                debug!(filter = config.display_name(), "Filter disabled, skipping");
                continue;
            }
            let filter = registry.build(config)?;
            info!(filter = filter.name(), kind = %config.kind, "Filter loaded");
            filters.push(filter);
        }
        Ok(Self::new(filters))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// `true` if every in-scope filter accepts the candidate.
    ///
    /// Stops at the first rejection. A filter error counts as a rejection.
    pub fn apply_all_filters(
        &self,
        platform: &str,
        rate_name: &str,
        last: Option<&Rate>,
        candidate: &Rate,
        history: &[Rate],
    ) -> bool {
        for filter in &self.filters {
            if !filter.scope().applies_to(platform, rate_name) {
                continue;
            }

            match filter.check(last, candidate, history) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        filter = filter.name(),
                        platform,
                        rate = rate_name,
                        bid = candidate.fields.bid,
                        ask = candidate.fields.ask,
                        "Tick rejected by filter"
                    );
                    PipelineMetrics::filter_rejected(platform, filter.name());
                    return false;
                }
                Err(e) => {
                    error!(
                        filter = filter.name(),
                        platform,
                        rate = rate_name,
                        error = %e,
                        "Filter failed, rejecting tick"
                    );
                    PipelineMetrics::filter_rejected(platform, filter.name());
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilterError;
    use crate::traits::FilterScope;
    use crate::JumpThresholdFilter;
    use common::RateFields;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and returns a fixed verdict
    struct Fixed {
        verdict: Result<bool>,
        calls: AtomicUsize,
        scope: FilterScope,
    }

    impl Fixed {
        fn new(verdict: Result<bool>) -> Arc<Self> {
            Arc::new(Self {
                verdict,
                calls: AtomicUsize::new(0),
                scope: FilterScope::everywhere(),
            })
        }
    }

    impl RateFilter for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn scope(&self) -> &FilterScope {
            &self.scope
        }

        fn check(&self, _: Option<&Rate>, _: &Rate, _: &[Rate]) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }
    }

    fn rate(bid: f64, ask: f64) -> Rate {
        Rate::updated("PF1_USDTRY", RateFields::new(bid, ask, 0))
    }

    #[test]
    fn test_empty_chain_accepts() {
        let service = FilterService::empty();
        assert!(service.apply_all_filters("PF1", "PF1_USDTRY", None, &rate(1.0, 1.0), &[]));
    }

    #[test]
    fn test_short_circuits_on_first_rejection() {
        let reject = Fixed::new(Ok(false));
        let after = Fixed::new(Ok(true));
        let service = FilterService::new(vec![reject.clone(), after.clone()]);

        assert!(!service.apply_all_filters("PF1", "PF1_USDTRY", None, &rate(1.0, 1.0), &[]));
        assert_eq!(reject.calls.load(Ordering::SeqCst), 1);
        assert_eq!(after.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_filter_error_is_rejection() {
        let failing = Fixed::new(Err(FilterError::NonFinite {
            filter: "fixed".to_string(),
            rate: "PF1_USDTRY".to_string(),
        }));
        let service = FilterService::new(vec![failing]);

        assert!(!service.apply_all_filters("PF1", "PF1_USDTRY", None, &rate(1.0, 1.0), &[]));
    }

    #[test]
    fn test_out_of_scope_filter_accepts() {
        let scoped = JumpThresholdFilter::new(0.01)
            .unwrap()
            .with_scope(FilterScope::only(HashMap::from([(
                "PF2".to_string(),
                vec!["PF2_USDTRY".to_string()],
            )])));
        let service = FilterService::new(vec![Arc::new(scoped)]);
        let last = rate(100.0, 100.0);
        let jump = rate(150.0, 150.0);

        assert!(service.apply_all_filters("PF1", "PF1_USDTRY", Some(&last), &jump, &[]));
        assert!(!service.apply_all_filters("PF2", "PF2_USDTRY", Some(&last), &jump, &[]));
    }
}
