//! Provider registry
//!
//! Maps the `type` of a platform entry to a constructor, so new feed kinds
//! plug in without touching the coordinator.

use config::PlatformConfig;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::{Provider, ProviderListener};
use crate::{rest, tcp, RestProvider, TcpProvider};

/// Constructor for one provider kind
pub type ProviderFactory =
    fn(&PlatformConfig, Arc<dyn ProviderListener>) -> ProviderResult<Arc<dyn Provider>>;

pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the TCP and REST providers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(tcp::KIND, build_tcp);
        registry.register(rest::KIND, build_rest);
        registry
    }

    /// Register (or replace) the constructor for a kind
    pub fn register(&mut self, kind: &str, factory: ProviderFactory) {
        self.factories.insert(kind.to_string(), factory);
    }

    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn build(
        &self,
        config: &PlatformConfig,
        listener: Arc<dyn ProviderListener>,
    ) -> ProviderResult<Arc<dyn Provider>> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| ProviderError::UnknownKind(config.kind.clone()))?;
        factory(config, listener)
    }
}

fn build_tcp(config: &PlatformConfig, listener: Arc<dyn ProviderListener>) -> ProviderResult<Arc<dyn Provider>> {
    Ok(Arc::new(TcpProvider::from_config(config, listener)))
}

fn build_rest(config: &PlatformConfig, listener: Arc<dyn ProviderListener>) -> ProviderResult<Arc<dyn Provider>> {
    Ok(Arc::new(RestProvider::from_config(config, listener)?))
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingListener;
    use assert_matches::assert_matches;
    use config::generate_default_config;

    // `assert_matches!` formats the whole result on mismatch
    impl std::fmt::Debug for dyn Provider {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Provider").field("platform", &self.platform()).finish()
        }
    }

    #[test]
    fn test_default_kinds() {
        assert_eq!(ProviderRegistry::with_defaults().kinds(), vec!["rest", "tcp"]);
        assert!(ProviderRegistry::new().kinds().is_empty());
    }

    #[tokio::test]
    async fn test_build_from_config() {
        let registry = ProviderRegistry::default();
        let listener = Arc::new(RecordingListener::default());

        for platform in generate_default_config().platforms {
            let provider = registry.build(&platform, listener.clone()).unwrap();
            assert_eq!(provider.platform(), platform.name);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let mut platform = generate_default_config().platforms.remove(0);
        platform.kind = "fix".to_string();

        let listener = Arc::new(RecordingListener::default());
        assert_matches!(
            ProviderRegistry::with_defaults().build(&platform, listener),
            Err(ProviderError::UnknownKind(kind)) if kind == "fix"
        );
    }
}
