//! Cross-rate calculator
//!
//! Turns the newest rate of every platform into calculated rates, one
//! formula call per configured target. A target runs only when every input
//! it needs is both active and updated.

use common::{context_key, instrument_of, result_name, QuoteSide, Rate};
use config::CalculationConfig;
use observability::PipelineMetrics;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::CalculationError;
use crate::formula::DynamicFormulaService;

/// Rates grouped by platform, then by raw rate name
pub type GroupedRates = HashMap<String, HashMap<String, Rate>>;

/// A raw rate that fed at least one calculated result
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumedInput {
    pub platform: String,
    pub rate: Rate,
}

/// Why a target produced nothing this cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No platform supplies the base rate
    MissingBase,
    /// No platform supplies the target
    NoData,
    /// An input is not both active and updated
    Stale { platform: String, rate: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingBase => write!(f, "base rate missing"),
            SkipReason::NoData => write!(f, "no platform data"),
            SkipReason::Stale { platform, rate } => write!(f, "{} on {} is not fresh", rate, platform),
        }
    }
}

#[derive(Debug, Default)]
pub struct CalculationOutcome {
    /// Results keyed by result name (`USDTRY`, `EURTRY`, ...)
    pub rates: BTreeMap<String, Rate>,
    pub consumed: Vec<ConsumedInput>,
    pub failures: Vec<(String, CalculationError)>,
    pub skipped: Vec<(String, SkipReason)>,
}

impl CalculationOutcome {
    fn consume(&mut self, platform: &str, rate: &Rate) {
        let seen = self
            .consumed
            .iter()
            .any(|c| c.platform == platform && c.rate.same_tick(rate));
        if !seen {
            self.consumed.push(ConsumedInput {
                platform: platform.to_string(),
                rate: rate.clone(),
            });
        }
    }
}

pub struct RateCalculatorService {
    targets: Vec<String>,
    base_rate: String,
    formula: Arc<DynamicFormulaService>,
}

impl RateCalculatorService {
    pub fn new(config: &CalculationConfig, formula: Arc<DynamicFormulaService>) -> Self {
        Self::with_targets(config.targets.clone(), config.base_rate.clone(), formula)
    }

    pub fn with_targets(
        targets: Vec<String>,
        base_rate: impl Into<String>,
        formula: Arc<DynamicFormulaService>,
    ) -> Self {
        Self {
            targets,
            base_rate: base_rate.into(),
            formula,
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn base_rate(&self) -> &str {
        &self.base_rate
    }

    /// Calculate every configured target from `grouped`.
    ///
    /// Targets are independent: a skip or failure of one never stops the rest.
    pub fn calculate(&self, grouped: &GroupedRates) -> CalculationOutcome {
        let mut outcome = CalculationOutcome::default();
        let base_inputs = inputs_for(grouped, &self.base_rate);

        for target in &self.targets {
            let mut required = base_inputs.clone();
            if target != &self.base_rate {
                let target_inputs = inputs_for(grouped, target);
                if target_inputs.is_empty() {
                    debug!(target = %target, "No platform data, skipping target");
                    self.skip(&mut outcome, target, SkipReason::NoData);
                    continue;
                }
                required.extend(target_inputs);
            }

            if base_inputs.is_empty() {
                debug!(target = %target, base = %self.base_rate, "Base rate missing, skipping target");
                self.skip(&mut outcome, target, SkipReason::MissingBase);
                continue;
            }

            if let Some((platform, rate)) = required.iter().find(|(_, r)| !r.status.is_fresh()) {
                debug!(
                    target = %target,
                    platform = %platform,
                    rate = %rate.name,
                    active = rate.status.active,
                    updated = rate.status.updated,
                    "Input not fresh, skipping target"
                );
                let reason = SkipReason::Stale {
                    platform: platform.to_string(),
                    rate: rate.name.clone(),
                };
                self.skip(&mut outcome, target, reason);
                continue;
            }

            match self.evaluate(target, &required) {
                Ok(rate) => {
                    PipelineMetrics::calculation(target, "ok");
                    for (platform, input) in &required {
                        outcome.consume(platform, input);
                    }
                    outcome.rates.insert(rate.name.clone(), rate);
                }
                Err(e) => {
                    warn!(target = %target, error = %e, "Calculation failed");
                    PipelineMetrics::calculation(target, "failed");
                    outcome.failures.push((target.clone(), e));
                }
            }
        }

        outcome
    }

    fn skip(&self, outcome: &mut CalculationOutcome, target: &str, reason: SkipReason) {
        PipelineMetrics::calculation(target, "skipped");
        outcome.skipped.push((target.to_string(), reason));
    }

    fn evaluate(&self, target: &str, inputs: &[(&str, &Rate)]) -> Result<Rate, CalculationError> {
        let mut context = BTreeMap::new();
        for (platform, rate) in inputs {
            let unnamed = || CalculationError::UnnamedInput {
                platform: platform.to_string(),
                rate: rate.name.clone(),
            };
            let bid_key = context_key(&rate.name, QuoteSide::Bid).ok_or_else(unnamed)?;
            let ask_key = context_key(&rate.name, QuoteSide::Ask).ok_or_else(unnamed)?;
            context.insert(bid_key, rate.fields.bid);
            context.insert(ask_key, rate.fields.ask);
        }

        let [bid, ask] = self.formula.calculate(target, &context)?;
        let rate = Rate::calculated(result_name(target, &self.base_rate), bid, ask);
        debug!(target = %target, result = %rate, "Target calculated");
        Ok(rate)
    }
}

/// Every platform's rate for `instrument`, ordered by platform
fn inputs_for<'a>(grouped: &'a GroupedRates, instrument: &str) -> Vec<(&'a str, &'a Rate)> {
    let mut inputs: Vec<(&str, &Rate)> = grouped
        .iter()
        .flat_map(|(platform, rates)| {
            rates
                .iter()
                .filter(move |(name, _)| instrument_of(name) == instrument)
                .map(move |(_, rate)| (platform.as_str(), rate))
        })
        .collect();
    inputs.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.name.cmp(&b.1.name)));
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use common::{RateFields, RateStatus};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SHIPPED_FORMULA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../formulas/formula.rhai");

    fn calculator(path: &std::path::Path) -> RateCalculatorService {
        let formula = Arc::new(DynamicFormulaService::with_limits("rhai", path, 100_000));
        RateCalculatorService::with_targets(
            vec!["USDTRY".to_string(), "EURUSD".to_string(), "GBPUSD".to_string()],
            "USDTRY",
            formula,
        )
    }

    fn fresh(name: &str, bid: f64, ask: f64) -> Rate {
        Rate::updated(name, RateFields::new(bid, ask, 1))
    }

    fn grouped(rates: &[(&str, Rate)]) -> GroupedRates {
        let mut grouped = GroupedRates::new();
        for (platform, rate) in rates {
            grouped
                .entry(platform.to_string())
                .or_default()
                .insert(rate.name.clone(), rate.clone());
        }
        grouped
    }

    #[test]
    fn test_all_fresh_inputs_produce_results() {
        let calc = calculator(std::path::Path::new(SHIPPED_FORMULA));
        let input = grouped(&[
            ("PF1", fresh("PF1_USDTRY", 30.0, 31.0)),
            ("PF2", fresh("PF2_USDTRY", 32.0, 33.0)),
            ("PF1", fresh("PF1_EURUSD", 1.1, 1.2)),
        ]);

        let outcome = calc.calculate(&input);

        assert_eq!(outcome.rates.len(), 2);
        let usdtry = &outcome.rates["USDTRY"];
        assert!((usdtry.fields.bid - 31.0).abs() < 1e-9);
        assert!(usdtry.status.is_fresh());
        let eurtry = &outcome.rates["EURTRY"];
        assert!((eurtry.fields.ask - 32.0 * 1.2).abs() < 1e-9);
        assert_eq!(outcome.skipped, vec![("GBPUSD".to_string(), SkipReason::NoData)]);
        assert!(outcome.failures.is_empty());
        // base quotes are consumed once even though two targets used them
        assert_eq!(outcome.consumed.len(), 3);
    }

    #[test]
    fn test_not_updated_input_blocks_target() {
        let calc = calculator(std::path::Path::new(SHIPPED_FORMULA));
        let first = Rate::first("PF2_USDTRY", RateFields::new(32.0, 33.0, 1));
        let input = grouped(&[("PF1", fresh("PF1_USDTRY", 30.0, 31.0)), ("PF2", first)]);

        let outcome = calc.calculate(&input);

        assert!(outcome.rates.is_empty());
        assert!(outcome.consumed.is_empty());
        assert_eq!(
            outcome.skipped[0],
            (
                "USDTRY".to_string(),
                SkipReason::Stale {
                    platform: "PF2".to_string(),
                    rate: "PF2_USDTRY".to_string()
                }
            )
        );
    }

    #[test]
    fn test_inactive_input_blocks_target() {
        let calc = calculator(std::path::Path::new(SHIPPED_FORMULA));
        let mut eur = fresh("PF1_EURUSD", 1.1, 1.2);
        eur.status = RateStatus::new(false, true);
        let input = grouped(&[("PF1", fresh("PF1_USDTRY", 30.0, 31.0)), ("PF1", eur)]);

        let outcome = calc.calculate(&input);

        assert!(outcome.rates.contains_key("USDTRY"));
        assert!(!outcome.rates.contains_key("EURTRY"));
        assert_matches!(
            &outcome.skipped[..],
            [(e, SkipReason::Stale { .. }), (g, SkipReason::NoData)] if e == "EURUSD" && g == "GBPUSD"
        );
    }

    #[test]
    fn test_missing_base_skips_everything() {
        let calc = calculator(std::path::Path::new(SHIPPED_FORMULA));
        let input = grouped(&[("PF1", fresh("PF1_EURUSD", 1.1, 1.2))]);

        let outcome = calc.calculate(&input);

        assert!(outcome.rates.is_empty());
        assert_eq!(outcome.skipped.len(), 3);
        assert_eq!(outcome.skipped[0], ("USDTRY".to_string(), SkipReason::MissingBase));
        assert_eq!(outcome.skipped[1], ("EURUSD".to_string(), SkipReason::MissingBase));
    }

    #[test]
    fn test_failure_is_isolated_per_target() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"fn compute(ctx) {
                if ctx.calcName == "EURUSD" { throw "no euro today"; }
                [1.0, 2.0]
            }"#,
        )
        .unwrap();
        let calc = calculator(file.path());
        let input = grouped(&[
            ("PF1", fresh("PF1_USDTRY", 30.0, 31.0)),
            ("PF1", fresh("PF1_EURUSD", 1.1, 1.2)),
            ("PF1", fresh("PF1_GBPUSD", 1.3, 1.4)),
        ]);

        let outcome = calc.calculate(&input);

        assert_eq!(outcome.rates.keys().collect::<Vec<_>>(), vec!["GBPTRY", "USDTRY"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, "EURUSD");
        assert_matches!(outcome.failures[0].1, CalculationError::Formula(_));
        // the failed target's own input is not consumed
        assert!(!outcome.consumed.iter().any(|c| c.rate.name == "PF1_EURUSD"));
    }

    #[test]
    fn test_context_keys_cover_every_platform() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"fn compute(ctx) {
                [ctx.Pf1UsdTryBid + ctx.Pf2UsdTryBid, ctx.Pf1UsdTryAsk + ctx.Pf2UsdTryAsk]
            }"#,
        )
        .unwrap();
        let calc = RateCalculatorService::with_targets(
            vec!["USDTRY".to_string()],
            "USDTRY",
            Arc::new(DynamicFormulaService::with_limits("rhai", file.path(), 1000)),
        );
        let input = grouped(&[
            ("PF1", fresh("PF1_USDTRY", 1.0, 2.0)),
            ("PF2", fresh("PF2_USDTRY", 10.0, 20.0)),
        ]);

        let outcome = calc.calculate(&input);
        let usdtry = &outcome.rates["USDTRY"];
        assert_eq!((usdtry.fields.bid, usdtry.fields.ask), (11.0, 22.0));
    }
}
