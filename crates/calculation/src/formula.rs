//! Scripted formula evaluation
//!
//! The formula is a Rhai script exposing `fn compute(ctx)`. `ctx` maps context
//! keys (`Pf1UsdTryBid`, ...) to prices and carries the target under `calcName`
//! and `calcKey`. The script must return `[bid, ask]`.

use common::naming::camel_instrument;
use config::CalculationConfig;
use parking_lot::Mutex;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::FormulaError;

/// Name of the script function called per target
pub const ENTRY_POINT: &str = "compute";

/// The only supported `method`
pub const METHOD_RHAI: &str = "rhai";

const MAX_CALL_LEVELS: usize = 32;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_FUNCTION_EXPR_DEPTH: usize = 32;
const MAX_STRING_SIZE: usize = 4096;
const MAX_COLLECTION_SIZE: usize = 1024;

pub struct DynamicFormulaService {
    method: String,
    formula_path: PathBuf,
    engine: Engine,
    program: Mutex<Option<Arc<AST>>>,
}

impl DynamicFormulaService {
    pub fn new(config: &CalculationConfig) -> Self {
        Self::with_limits(&config.method, &config.formula_path, config.max_operations)
    }

    pub fn with_limits(method: &str, formula_path: impl AsRef<Path>, max_operations: u64) -> Self {
        Self {
            method: method.to_string(),
            formula_path: formula_path.as_ref().to_path_buf(),
            engine: sandboxed_engine(max_operations),
            program: Mutex::new(None),
        }
    }

    pub fn formula_path(&self) -> &Path {
        &self.formula_path
    }

    /// True once the script has compiled
    pub fn is_loaded(&self) -> bool {
        self.program.lock().is_some()
    }

    fn check_method(&self) -> Result<(), FormulaError> {
        if self.method.eq_ignore_ascii_case(METHOD_RHAI) {
            Ok(())
        } else {
            Err(FormulaError::UnsupportedMethod(self.method.clone()))
        }
    }

    /// Compiled program, loading it on first use.
    ///
    /// A failed load caches nothing, so the next call tries again.
    fn program(&self) -> Result<Arc<AST>, FormulaError> {
        let mut program = self.program.lock();
        if let Some(ast) = program.as_ref() {
            return Ok(ast.clone());
        }

        let source =
            std::fs::read_to_string(&self.formula_path).map_err(|source| FormulaError::Load {
                path: self.formula_path.clone(),
                source,
            })?;

        let ast = self
            .engine
            .compile(&source)
            .map_err(|e| FormulaError::Compile {
                path: self.formula_path.clone(),
                message: e.to_string(),
            })?;

        info!(path = %self.formula_path.display(), "Formula loaded");
        let ast = Arc::new(ast);
        *program = Some(ast.clone());
        Ok(ast)
    }

    /// Run the formula for one target and return `[bid, ask]`
    pub fn calculate(
        &self,
        target: &str,
        context: &BTreeMap<String, f64>,
    ) -> Result<[f64; 2], FormulaError> {
        self.check_method()?;
        let ast = self.program()?;

        let mut ctx = Map::new();
        for (key, value) in context {
            ctx.insert(key.as_str().into(), Dynamic::from(*value));
        }
        ctx.insert("calcName".into(), Dynamic::from(target.to_string()));
        ctx.insert("calcKey".into(), Dynamic::from(camel_instrument(target)));

        let result = self
            .engine
            .call_fn::<Dynamic>(&mut Scope::new(), &ast, ENTRY_POINT, (ctx,))
            .map_err(|e| FormulaError::Evaluation {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        let prices = bid_ask(target, result)?;
        debug!(target = %target, bid = prices[0], ask = prices[1], "Formula evaluated");
        Ok(prices)
    }
}

fn sandboxed_engine(max_operations: u64) -> Engine {
    let mut engine = Engine::new();
    engine
        .set_module_resolver(DummyModuleResolver::new())
        .set_max_operations(max_operations)
        .set_max_call_levels(MAX_CALL_LEVELS)
        .set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH)
        .set_max_string_size(MAX_STRING_SIZE)
        .set_max_array_size(MAX_COLLECTION_SIZE)
        .set_max_map_size(MAX_COLLECTION_SIZE);
    engine.disable_symbol("eval");
    engine
}

fn as_number(value: &Dynamic) -> Option<f64> {
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|i| i as f64))
}

fn bid_ask(target: &str, result: Dynamic) -> Result<[f64; 2], FormulaError> {
    let bad_shape = |message: String| FormulaError::BadReturnShape {
        target: target.to_string(),
        message,
    };

    let type_name = result.type_name();
    let values: Array = result
        .try_cast::<Array>()
        .ok_or_else(|| bad_shape(type_name.to_string()))?;

    if values.len() != 2 {
        return Err(bad_shape(format!("an array of {} values", values.len())));
    }

    let mut prices = [0.0; 2];
    for (slot, value) in prices.iter_mut().zip(values.iter()) {
        match as_number(value) {
            Some(n) if n.is_finite() => *slot = n,
            Some(n) => return Err(bad_shape(format!("non-finite value {}", n))),
            None => return Err(bad_shape(format!("a {} element", value.type_name()))),
        }
    }
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SHIPPED_FORMULA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../formulas/formula.rhai");

    fn script(body: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    fn ctx(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_shipped_formula_base_is_platform_average() {
        let service = DynamicFormulaService::with_limits("rhai", SHIPPED_FORMULA, 100_000);
        let context = ctx(&[
            ("Pf1UsdTryBid", 34.0),
            ("Pf1UsdTryAsk", 34.2),
            ("Pf2UsdTryBid", 34.2),
            ("Pf2UsdTryAsk", 34.4),
        ]);

        let [bid, ask] = service.calculate("USDTRY", &context).unwrap();
        assert!(approx(bid, 34.1));
        assert!(approx(ask, 34.3));
    }

    #[test]
    fn test_shipped_formula_cross_rate() {
        let service = DynamicFormulaService::with_limits("RHAI", SHIPPED_FORMULA, 100_000);
        let context = ctx(&[
            ("Pf1UsdTryBid", 30.0),
            ("Pf1UsdTryAsk", 31.0),
            ("Pf1EurUsdBid", 1.0),
            ("Pf1EurUsdAsk", 1.2),
            ("Pf2EurUsdBid", 1.2),
            ("Pf2EurUsdAsk", 1.2),
        ]);

        let [bid, ask] = service.calculate("EURUSD", &context).unwrap();
        assert!(approx(bid, 33.0));
        assert!(approx(ask, 37.2));
    }

    #[test]
    fn test_shipped_formula_missing_target_is_evaluation_error() {
        let service = DynamicFormulaService::with_limits("rhai", SHIPPED_FORMULA, 100_000);
        let context = ctx(&[("Pf1UsdTryBid", 30.0), ("Pf1UsdTryAsk", 31.0)]);

        assert_matches!(
            service.calculate("GBPUSD", &context),
            Err(FormulaError::Evaluation { target, .. }) if target == "GBPUSD"
        );
    }

    #[test]
    fn test_unsupported_method_every_call() {
        let file = script("fn compute(ctx) { [1.0, 2.0] }");
        let service = DynamicFormulaService::with_limits("javascript", file.path(), 1000);

        for _ in 0..2 {
            assert_matches!(
                service.calculate("USDTRY", &BTreeMap::new()),
                Err(FormulaError::UnsupportedMethod(m)) if m == "javascript"
            );
        }
        assert!(!service.is_loaded());
    }

    #[test]
    fn test_integer_results_accepted() {
        let file = script("fn compute(ctx) { [1, 2] }");
        let service = DynamicFormulaService::with_limits("rhai", file.path(), 1000);
        assert_eq!(service.calculate("USDTRY", &BTreeMap::new()).unwrap(), [1.0, 2.0]);
    }

    #[test]
    fn test_bad_return_shapes() {
        for body in [
            "fn compute(ctx) { [1.0] }",
            "fn compute(ctx) { [1.0, 2.0, 3.0] }",
            "fn compute(ctx) { 5.0 }",
            "fn compute(ctx) { [1.0, \"two\"] }",
        ] {
            let file = script(body);
            let service = DynamicFormulaService::with_limits("rhai", file.path(), 1000);
            assert_matches!(
                service.calculate("USDTRY", &BTreeMap::new()),
                Err(FormulaError::BadReturnShape { .. }),
                "{}",
                body
            );
        }
    }

    #[test]
    fn test_context_carries_target_names() {
        let file = script(
            r#"fn compute(ctx) {
                if ctx.calcName == "EURUSD" && ctx.calcKey == "EurUsd" { [ctx.Pf1EurUsdBid, 0.5] } else { throw "wrong target" }
            }"#,
        );
        let service = DynamicFormulaService::with_limits("rhai", file.path(), 1000);
        let context = ctx(&[("Pf1EurUsdBid", 1.25)]);
        assert_eq!(service.calculate("EURUSD", &context).unwrap(), [1.25, 0.5]);
    }

    #[test]
    fn test_runaway_script_is_bounded() {
        let file = script("fn compute(ctx) { loop { } }");
        let service = DynamicFormulaService::with_limits("rhai", file.path(), 1000);
        assert_matches!(
            service.calculate("USDTRY", &BTreeMap::new()),
            Err(FormulaError::Evaluation { .. })
        );
    }

    #[test]
    fn test_imports_are_unavailable() {
        let file = script("import \"helpers\" as h;\nfn compute(ctx) { [1.0, 2.0] }");
        let service = DynamicFormulaService::with_limits("rhai", file.path(), 1000);
        assert_matches!(
            service.calculate("USDTRY", &BTreeMap::new()),
            Err(FormulaError::Evaluation { .. })
        );
    }

    #[test]
    fn test_compile_error() {
        let file = script("fn compute(ctx) { [1.0, ");
        let service = DynamicFormulaService::with_limits("rhai", file.path(), 1000);
        assert_matches!(
            service.calculate("USDTRY", &BTreeMap::new()),
            Err(FormulaError::Compile { .. })
        );
        assert!(!service.is_loaded());
    }

    #[test]
    fn test_failed_load_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formula.rhai");
        let service = DynamicFormulaService::with_limits("rhai", &path, 1000);

        assert_matches!(
            service.calculate("USDTRY", &BTreeMap::new()),
            Err(FormulaError::Load { .. })
        );

        std::fs::write(&path, "fn compute(ctx) { [3.0, 4.0] }").unwrap();
        assert_eq!(service.calculate("USDTRY", &BTreeMap::new()).unwrap(), [3.0, 4.0]);
        assert!(service.is_loaded());
    }

    #[test]
    fn test_program_loaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formula.rhai");
        std::fs::write(&path, "fn compute(ctx) { [1.0, 2.0] }").unwrap();
        let service = DynamicFormulaService::with_limits("rhai", &path, 1000);

        assert_eq!(service.calculate("USDTRY", &BTreeMap::new()).unwrap(), [1.0, 2.0]);
        // later edits to the file are not picked up
        std::fs::write(&path, "fn compute(ctx) { [9.0, 9.0] }").unwrap();
        assert_eq!(service.calculate("USDTRY", &BTreeMap::new()).unwrap(), [1.0, 2.0]);
    }
}
