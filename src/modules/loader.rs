//! Module loader - load, unload and reload modules with their dependencies

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use super::context::ModuleContext;
use super::dispatcher::ModuleDispatcher;
use super::factory::ModuleFactory;
use super::registry::{ModuleRegistry, RegistryEntry};
use super::resolver::DependencyResolver;
use super::trait_def::Module;
use crate::application::errors::ModuleError;

struct LoaderInner {
    registry: Arc<ModuleRegistry>,
    factory: Arc<dyn ModuleFactory>,
    /// Keys with a load or unload in progress
    in_flight: Mutex<HashSet<String>>,
    started_at: DateTime<Utc>,
}

/// Loads and unloads modules against a registry.
///
/// Cheap to clone; clones share the same registry and in-flight set.
#[derive(Clone)]
pub struct ModuleLoader {
    inner: Arc<LoaderInner>,
}

/// Removes its key from the in-flight set when dropped
struct InFlightGuard {
    inner: Arc<LoaderInner>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.inner.in_flight.lock() {
            in_flight.remove(&self.key);
        }
    }
}

impl ModuleLoader {
    pub fn new(registry: Arc<ModuleRegistry>, factory: Arc<dyn ModuleFactory>) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                registry,
                factory,
                in_flight: Mutex::new(HashSet::new()),
                started_at: Utc::now(),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.inner.registry
    }

    pub fn dispatcher(&self) -> ModuleDispatcher {
        ModuleDispatcher::new(Arc::clone(&self.inner.registry))
    }

    /// When this loader was created
    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    /// Whether the factory can construct this key
    pub fn provides(&self, key: &str) -> bool {
        self.inner.factory.provides(key)
    }

    fn begin(&self, key: &str) -> Result<InFlightGuard, ModuleError> {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .map_err(|_| ModuleError::Internal("Lock poisoned".to_string()))?;

        if !in_flight.insert(key.to_string()) {
            return Err(ModuleError::Busy(key.to_string()));
        }
        Ok(InFlightGuard {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
        })
    }

    /// Load a module and, first, everything it depends on.
    ///
    /// On failure the key is left at `Failure` and the error is returned.
    pub fn load_module<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), ModuleError>> {
        self.load_chained(key, Vec::new())
    }

    /// Load `key` as a dependency of the keys in `chain`, outermost first
    pub(crate) fn load_chained<'a>(
        &'a self,
        key: &'a str,
        chain: Vec<String>,
    ) -> BoxFuture<'a, Result<(), ModuleError>> {
        async move {
            if self.inner.registry.is_loaded(key) {
                return Err(ModuleError::AlreadyLoaded(key.to_string()));
            }
            let _guard = self.begin(key)?;
            self.inner.registry.set_entry(key, RegistryEntry::Loading)?;
            info!("Loading module: {}", key);

            match self.instantiate(key, chain).await {
                Ok(instance) => {
                    let instance: Arc<dyn Module> = Arc::from(instance);
                    info!(
                        "Loaded module: {} ({} v{} by {})",
                        key,
                        instance.name(),
                        instance.version(),
                        instance.author()
                    );
                    self.inner
                        .registry
                        .set_entry(key, RegistryEntry::Loaded(instance))?;
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to load module {}: {}", key, e);
                    self.inner.registry.set_entry(key, RegistryEntry::Failure)?;
                    Err(e)
                }
            }
        }
        .boxed()
    }

    /// Construct, resolve dependencies, run the load hook
    async fn instantiate(
        &self,
        key: &str,
        mut chain: Vec<String>,
    ) -> Result<Box<dyn Module>, ModuleError> {
        let mut instance = self.inner.factory.create(key)?;

        if let Err(e) = validate(key, &*instance) {
            discard(key, &*instance);
            return Err(e);
        }

        chain.push(key.to_string());
        let resolved = DependencyResolver::new(self)
            .resolve(key, instance.dependencies(), &chain)
            .await;
        if let Err(e) = resolved {
            discard(key, &*instance);
            return Err(e);
        }

        let ctx = ModuleContext::new(key, self.clone());
        if let Err(e) = instance.load(&ctx).await {
            warn!("Module {} failed in its load hook, rolling back: {}", key, e);
            if let Err(unload_err) = instance.unload().await {
                warn!("Rollback unload of {} failed: {}", key, unload_err);
            }
            discard(key, &*instance);
            return Err(e);
        }

        Ok(instance)
    }

    /// Keys of every loaded module that declares a dependency on `key`,
    /// in registry order.
    pub fn get_all_dependents(&self, key: &str) -> Vec<String> {
        self.inner
            .registry
            .loaded()
            .into_iter()
            .filter(|(_, module)| module.dependencies().contains_key(key))
            .map(|(name, _)| name)
            .collect()
    }

    /// Unload a module after unloading everything that depends on it.
    ///
    /// Returns the requested key followed by every dependent unloaded along
    /// the way. A key that is not loaded yields an empty list.
    pub fn unload_module<'a>(
        &'a self,
        key: &'a str,
    ) -> BoxFuture<'a, Result<Vec<String>, ModuleError>> {
        async move {
            let Some(instance) = self.inner.registry.instance(key) else {
                return Ok(Vec::new());
            };
            let _guard = self.begin(key)?;
            info!("Unloading module: {}", key);

            let mut unloaded = vec![key.to_string()];
            for dependent in self.get_all_dependents(key) {
                if !self.inner.registry.is_loaded(&dependent) {
                    continue;
                }
                debug!("{} depends on {}, unloading it first", dependent, key);
                for removed in self.unload_module(&dependent).await? {
                    if !unloaded.contains(&removed) {
                        unloaded.push(removed);
                    }
                }
            }

            instance.ensure_alive()?;
            instance.unload().await?;
            instance.dispose()?;
            self.inner.registry.set_entry(key, RegistryEntry::Unloaded)?;
            info!("Unloaded module: {}", key);

            Ok(unloaded)
        }
        .boxed()
    }

    /// Unload a module (with its dependents) and load them all again.
    ///
    /// A key that was not loaded is simply loaded.
    pub async fn reload_module(&self, key: &str) -> Result<Vec<String>, ModuleError> {
        let unloaded = self.unload_module(key).await?;
        if unloaded.is_empty() {
            self.load_module(key).await?;
            return Ok(vec![key.to_string()]);
        }

        for name in &unloaded {
            // Dependents may already be back as a dependency of an earlier key
            if self.inner.registry.is_loaded(name) {
                continue;
            }
            self.load_module(name).await?;
        }
        info!("Reloaded modules: {}", unloaded.join(", "));
        Ok(unloaded)
    }

    /// Unload every loaded module, most recent first. Failures are logged and
    /// skipped.
    pub async fn unload_all(&self) -> Vec<String> {
        let keys: Vec<String> = self
            .inner
            .registry
            .loaded()
            .into_iter()
            .map(|(key, _)| key)
            .rev()
            .collect();

        let mut unloaded = Vec::new();
        for key in keys {
            match self.unload_module(&key).await {
                Ok(removed) => unloaded.extend(removed),
                Err(e) => error!("Failed to unload module {}: {}", key, e),
            }
        }
        unloaded
    }
}

fn validate(key: &str, module: &(dyn Module + 'static)) -> Result<(), ModuleError> {
    if module.name().trim().is_empty() {
        return Err(ModuleError::InvalidModuleDefinition {
            key: key.to_string(),
            reason: "module name is empty".to_string(),
        });
    }
    if module.dependencies().contains_key(key) {
        return Err(ModuleError::InvalidModuleDefinition {
            key: key.to_string(),
            reason: "module depends on itself".to_string(),
        });
    }
    module.ensure_alive()
}

fn discard(key: &str, module: &(dyn Module + 'static)) {
    if let Err(e) = module.dispose() {
        warn!("Failed to dispose of {}: {}", key, e);
    }
}
