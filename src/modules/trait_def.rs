//! Module trait definitions

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::context::ModuleContext;
use super::logger::ModuleLogger;
use crate::application::errors::ModuleError;
use crate::domain::entities::Version;

/// Registry keys of required modules and the minimum version of each
pub type Dependencies = BTreeMap<String, Version>;

/// Result of an exported module function
pub type FunctionResult = Result<Value, ModuleError>;

/// An exported function. State is bound into the closure at registration.
pub type ModuleFunction =
    Arc<dyn Fn(Vec<Value>) -> BoxFuture<'static, FunctionResult> + Send + Sync>;

/// Functions a module exposes to other modules
#[derive(Default)]
pub struct FunctionTable {
    functions: RwLock<BTreeMap<String, ModuleFunction>>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an exported function
    pub fn register<F, Fut>(&self, name: impl Into<String>, function: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        let function: ModuleFunction = Arc::new(move |args| function(args).boxed());
        if let Ok(mut functions) = self.functions.write() {
            functions.insert(name.into(), function);
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.functions
            .write()
            .map(|mut f| f.remove(name).is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<ModuleFunction> {
        self.functions.read().ok()?.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions
            .read()
            .map(|f| f.contains_key(name))
            .unwrap_or(false)
    }

    pub fn names(&self) -> Vec<String> {
        self.functions
            .read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut functions) = self.functions.write() {
            functions.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.functions.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// State every module carries, owned by the library rather than the module
pub struct ModuleCore {
    instance_id: Uuid,
    created_at: DateTime<Utc>,
    logger: ModuleLogger,
    functions: FunctionTable,
    destroyed: AtomicBool,
}

impl ModuleCore {
    /// `source` names the module in log output
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            created_at: Utc::now(),
            logger: ModuleLogger::new(source),
            functions: FunctionTable::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Unique per constructed instance; a reload gets a new one
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn logger(&self) -> &ModuleLogger {
        &self.logger
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

/// Core module trait that all modules must implement
#[async_trait]
pub trait Module: Send + Sync {
    /// Human-readable name (not the registry key)
    fn name(&self) -> &str;

    fn author(&self) -> &str;

    fn version(&self) -> &Version;

    /// Modules that must be loaded before this one, fixed at construction
    fn dependencies(&self) -> &Dependencies;

    /// Library-owned state; implementors return their embedded `ModuleCore`
    fn core(&self) -> &ModuleCore;

    fn functions(&self) -> &FunctionTable {
        self.core().functions()
    }

    fn logger(&self) -> &ModuleLogger {
        self.core().logger()
    }

    /// Perform all setup. Called once, after dependencies are loaded.
    async fn load(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError>;

    /// Tear down module-specific resources
    async fn unload(&self) -> Result<(), ModuleError>;
}

impl dyn Module {
    pub fn is_destroyed(&self) -> bool {
        self.core().is_destroyed()
    }

    /// Fails with `Destroyed` once the module has been disposed
    pub fn ensure_alive(&self) -> Result<(), ModuleError> {
        if self.is_destroyed() {
            return Err(ModuleError::Destroyed(self.name().to_string()));
        }
        Ok(())
    }

    /// Final step of a module's life: releases its logger and marks it
    /// destroyed. Not part of the trait, so modules cannot override it.
    pub fn dispose(&self) -> Result<(), ModuleError> {
        self.ensure_alive()?;
        let core = self.core();
        core.logger().debug("Module destroyed.");
        core.logger().release();
        core.destroyed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_function_table_register_and_call() {
        let table = FunctionTable::new();
        table.register("Add", |args: Vec<Value>| async move {
            let sum: i64 = args.iter().filter_map(|v| v.as_i64()).sum();
            Ok(json!(sum))
        });

        assert!(table.contains("Add"));
        assert_eq!(table.names(), vec!["Add".to_string()]);

        let add = table.get("Add").unwrap();
        let result = add(vec![json!(2), json!(3)]).await.unwrap();
        assert_eq!(result, json!(5));

        assert!(table.unregister("Add"));
        assert!(!table.unregister("Add"));
        assert!(table.is_empty());
    }

    #[test]
    fn test_core_starts_alive() {
        let core = ModuleCore::new("Test");
        assert!(!core.is_destroyed());
        assert!(!core.logger().is_released());
        assert_ne!(core.instance_id(), ModuleCore::new("Test").instance_id());
    }
}
