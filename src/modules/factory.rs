//! Module factories - turn a registry key into a fresh module instance

use std::collections::HashMap;
use std::sync::Arc;

use super::trait_def::Module;
use crate::application::errors::ModuleError;

/// Produces module instances by registry key.
///
/// Construction must stay cheap; heavy setup belongs in `Module::load`.
pub trait ModuleFactory: Send + Sync {
    fn create(&self, key: &str) -> Result<Box<dyn Module>, ModuleError>;

    /// Whether `create` knows this key
    fn provides(&self, key: &str) -> bool;
}

/// Constructor for a built-in module
pub type ModuleConstructor = Arc<dyn Fn() -> Result<Box<dyn Module>, ModuleError> + Send + Sync>;

/// Built-in module constructors, with an optional fallback factory
#[derive(Default)]
pub struct ModuleCatalog {
    builtins: HashMap<String, ModuleConstructor>,
    fallback: Option<Arc<dyn ModuleFactory>>,
}

impl ModuleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under a registry key
    pub fn register<F>(&mut self, key: impl Into<String>, constructor: F)
    where
        F: Fn() -> Result<Box<dyn Module>, ModuleError> + Send + Sync + 'static,
    {
        let key = key.into();
        tracing::debug!("Registering built-in module: {}", key);
        self.builtins.insert(key, Arc::new(constructor));
    }

    pub fn with<F>(mut self, key: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Module>, ModuleError> + Send + Sync + 'static,
    {
        self.register(key, constructor);
        self
    }

    /// Factory consulted for keys with no built-in constructor
    pub fn with_fallback(mut self, fallback: Arc<dyn ModuleFactory>) -> Self {
        self.fallback = Some(fallback);
        self
    }
}

impl ModuleFactory for ModuleCatalog {
    fn create(&self, key: &str) -> Result<Box<dyn Module>, ModuleError> {
        if let Some(constructor) = self.builtins.get(key) {
            return constructor();
        }
        match &self.fallback {
            Some(fallback) => fallback.create(key),
            None => Err(ModuleError::NotFound(key.to_string())),
        }
    }

    fn provides(&self, key: &str) -> bool {
        self.builtins.contains_key(key)
            || self.fallback.as_ref().map(|f| f.provides(key)).unwrap_or(false)
    }
}
