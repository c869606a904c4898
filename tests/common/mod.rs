//! Test modules shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sans_bot::application::errors::ModuleError;
use sans_bot::domain::entities::Version;
use sans_bot::modules::{
    Dependencies, Module, ModuleContext, ModuleCore, ModuleFactory, ModuleLoader, ModuleRegistry,
};

/// Ordered record of lifecycle events, e.g. `load:A`, `unload:B`
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// How a test module behaves
#[derive(Clone)]
pub struct TestSpec {
    pub key: String,
    pub version: Version,
    pub dependencies: Dependencies,
    pub fail_load: Option<String>,
    pub fail_unload: Option<String>,
    pub load_delay: Option<Duration>,
    /// Set when the module instance is dropped
    pub dropped: Option<Arc<AtomicBool>>,
}

impl TestSpec {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            version: Version::new(1, 0, 0),
            dependencies: Dependencies::new(),
            fail_load: None,
            fail_unload: None,
            load_delay: None,
            dropped: None,
        }
    }

    pub fn version(mut self, major: u64, minor: u64, patch: u64) -> Self {
        self.version = Version::new(major, minor, patch);
        self
    }

    pub fn depends_on(mut self, key: &str, major: u64, minor: u64, patch: u64) -> Self {
        self.dependencies
            .insert(key.to_string(), Version::new(major, minor, patch));
        self
    }

    pub fn failing_load(mut self, message: &str) -> Self {
        self.fail_load = Some(message.to_string());
        self
    }

    pub fn failing_unload(mut self, message: &str) -> Self {
        self.fail_unload = Some(message.to_string());
        self
    }

    pub fn slow_load(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    pub fn tracking_drop(mut self, dropped: Arc<AtomicBool>) -> Self {
        self.dropped = Some(dropped);
        self
    }
}

pub struct TestModule {
    core: ModuleCore,
    spec: TestSpec,
    name: String,
    journal: Journal,
}

impl TestModule {
    pub fn new(spec: TestSpec, journal: Journal) -> Self {
        Self {
            core: ModuleCore::new(spec.key.clone()),
            name: format!("{} Module", spec.key),
            spec,
            journal,
        }
    }
}

impl Drop for TestModule {
    fn drop(&mut self) {
        if let Some(dropped) = &self.spec.dropped {
            dropped.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Module for TestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn author(&self) -> &str {
        "tests"
    }

    fn version(&self) -> &Version {
        &self.spec.version
    }

    fn dependencies(&self) -> &Dependencies {
        &self.spec.dependencies
    }

    fn core(&self) -> &ModuleCore {
        &self.core
    }

    async fn load(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.journal.push(format!("load:{}", self.spec.key));
        if let Some(delay) = self.spec.load_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.spec.fail_load {
            return Err(ModuleError::failed(message.clone()));
        }

        let key = self.spec.key.clone();
        self.core.functions().register("Echo", |args: Vec<Value>| async move {
            Ok(Value::Array(args))
        });
        self.core.functions().register("Whoami", move |_args| {
            let key = key.clone();
            async move { Ok(json!(key)) }
        });
        self.core.functions().register("Fail", |_args| async move {
            Err(ModuleError::failed("function failed on purpose"))
        });

        // Sleep for args[0] milliseconds, then report whether the module was dropped
        let dropped = self.spec.dropped.clone();
        self.core.functions().register("Slow", move |args: Vec<Value>| {
            let dropped = dropped.clone();
            async move {
                let millis = args.first().and_then(Value::as_u64).unwrap_or(200);
                tokio::time::sleep(Duration::from_millis(millis)).await;
                Ok(json!(dropped.map(|d| d.load(Ordering::SeqCst)).unwrap_or(false)))
            }
        });

        // Forward a call to another module: Relay(module, function, args...)
        let dispatcher = ctx.dispatcher();
        self.core.functions().register("Relay", move |args: Vec<Value>| {
            let dispatcher = dispatcher.clone();
            async move {
                let module = args.first().and_then(Value::as_str).unwrap_or_default().to_string();
                let function = args.get(1).and_then(Value::as_str).unwrap_or_default().to_string();
                let rest = args.into_iter().skip(2).collect();
                dispatcher.call(&module, &function, rest).await
            }
        });
        Ok(())
    }

    async fn unload(&self) -> Result<(), ModuleError> {
        self.journal.push(format!("unload:{}", self.spec.key));
        if let Some(message) = &self.spec.fail_unload {
            return Err(ModuleError::failed(message.clone()));
        }
        Ok(())
    }
}

/// Factory over a fixed set of test specs, counting constructions per key
pub struct TestFactory {
    specs: HashMap<String, TestSpec>,
    journal: Journal,
    created: Mutex<HashMap<String, usize>>,
}

impl TestFactory {
    pub fn created(&self, key: &str) -> usize {
        self.created.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

impl ModuleFactory for TestFactory {
    fn create(&self, key: &str) -> Result<Box<dyn Module>, ModuleError> {
        let spec = self
            .specs
            .get(key)
            .cloned()
            .ok_or_else(|| ModuleError::NotFound(key.to_string()))?;
        *self.created.lock().unwrap().entry(key.to_string()).or_default() += 1;
        Ok(Box::new(TestModule::new(spec, self.journal.clone())))
    }

    fn provides(&self, key: &str) -> bool {
        self.specs.contains_key(key)
    }
}

/// A loader over test modules, with its journal and factory
pub struct TestHost {
    pub loader: ModuleLoader,
    pub journal: Journal,
    pub factory: Arc<TestFactory>,
}

impl TestHost {
    pub fn new(specs: Vec<TestSpec>) -> Self {
        let journal = Journal::default();
        let factory = Arc::new(TestFactory {
            specs: specs.into_iter().map(|s| (s.key.clone(), s)).collect(),
            journal: journal.clone(),
            created: Mutex::new(HashMap::new()),
        });
        let loader = ModuleLoader::new(Arc::new(ModuleRegistry::new()), factory.clone());
        Self {
            loader,
            journal,
            factory,
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        self.loader.registry()
    }
}
