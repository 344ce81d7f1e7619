use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

const ENV_VAR_PATTERN: &str = r"\$\{(\w+)\}|\$(\w+)";

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(ENV_VAR_PATTERN)?;
    let mut missing_vars = Vec::new();

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let placeholder = caps[0].to_string();
        let Some(var_name) = caps.get(1).or_else(|| caps.get(2)) else {
            return placeholder;
        };

        match env::var(var_name.as_str()) {
            Ok(value) => {
                debug!(var = var_name.as_str(), "Substituting environment variable");
                value
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", var_name.as_str());
                missing_vars.push(var_name.as_str().to_string());
                // left in place, the validator reports it
                placeholder
            }
        }
    });

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result.into_owned())
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    Regex::new(ENV_VAR_PATTERN)
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_known_and_unknown_vars() {
        env::set_var("FXAGG_TEST_BROKER", "kafka:9092");

        let out = substitute_env_vars(
            "bootstrap: ${FXAGG_TEST_BROKER}\nkey: ${FXAGG_TEST_SURELY_UNSET_VAR}",
        )
        .unwrap();

        assert!(out.contains("bootstrap: kafka:9092"));
        assert!(out.contains("${FXAGG_TEST_SURELY_UNSET_VAR}"));
        assert!(has_unresolved_env_vars(&out));
        assert!(!has_unresolved_env_vars("bootstrap: kafka:9092"));
    }
}
