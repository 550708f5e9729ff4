//! Adapter registry.
//!
//! Maps a provider name to a constructor producing a fresh, uninitialized
//! adapter. The gateway asks the registry for an instance, initializes it while
//! it still owns it exclusively, and only then shares it.

use dashmap::DashMap;
use gateway_core::{AIModel, GatewayError, GatewayResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Constructor for one adapter variant
pub type AdapterConstructor = Arc<dyn Fn() -> Box<dyn AIModel> + Send + Sync>;

/// Registry of adapter constructors keyed by provider name
#[derive(Default)]
pub struct AdapterRegistry {
    constructors: DashMap<String, AdapterConstructor>,
}

impl AdapterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with every adapter compiled into this build
    #[must_use]
    pub fn with_builtin_adapters() -> Self {
        let registry = Self::new();

        #[cfg(feature = "openai")]
        registry.register("openai", || Box::new(crate::openai::OpenAIAdapter::new()));

        #[cfg(feature = "claude")]
        registry.register("claude", || Box::new(crate::claude::ClaudeAdapter::new()));

        #[cfg(feature = "gemini")]
        registry.register("gemini", || Box::new(crate::gemini::GeminiAdapter::new()));

        #[cfg(feature = "local-llama")]
        registry.register("local_llama", || {
            Box::new(crate::local_llama::LocalLlamaAdapter::new())
        });

        #[cfg(feature = "llama")]
        registry.register("llama", || Box::new(crate::llama::LlamaAdapter::new()));

        registry.register("example", || Box::new(crate::example::ExampleAdapter::new()));

        registry
    }

    /// Register a constructor; a later registration under the same name wins
    pub fn register<F>(&self, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> Box<dyn AIModel> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(adapter = %name, "Registering adapter");
        self.constructors.insert(name, Arc::new(constructor));
    }

    /// Construct a fresh, uninitialized adapter
    pub fn create(&self, name: &str) -> GatewayResult<Box<dyn AIModel>> {
        // Clone the constructor out so the shard lock is not held while it runs
        let constructor = self
            .constructors
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| GatewayError::unknown_provider(name))?;

        Ok(constructor())
    }

    /// Snapshot of the registered constructors
    #[must_use]
    pub fn list_available(&self) -> BTreeMap<String, AdapterConstructor> {
        self.constructors
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Whether a constructor is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .constructors
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Number of registered constructors
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("adapters", &self.names())
            .finish()
    }
}
