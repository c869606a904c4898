//! System module - host configuration and module management for operators
//! and other modules

use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::args::{bool_arg, list_arg, map_arg, optional_string_arg, string_arg};
use super::context::ModuleContext;
use super::loader::ModuleLoader;
use super::trait_def::{Dependencies, FunctionResult, Module, ModuleCore};
use crate::application::errors::ModuleError;
use crate::domain::entities::Version;
use crate::domain::traits::{ConfigData, ConfigStore};
use crate::infrastructure::config::StoreConfig;
use crate::infrastructure::storage::open_store;

/// Registry key of the System module
pub const SYSTEM_MODULE: &str = "System";

/// Store key holding the comma-separated startup list
pub const STARTUP_LIST_KEY: &str = "System.Modules";

pub struct SystemModule {
    core: ModuleCore,
    version: Version,
    dependencies: Dependencies,
    store_config: StoreConfig,
    autoload: Vec<String>,
}

impl SystemModule {
    pub fn new(store_config: StoreConfig, autoload: Vec<String>) -> Self {
        Self {
            core: ModuleCore::new(SYSTEM_MODULE),
            version: super::api_version().clone(),
            dependencies: Dependencies::new(),
            store_config,
            autoload,
        }
    }
}

struct SystemState {
    loader: ModuleLoader,
    store: Arc<dyn ConfigStore>,
    startup: Mutex<Vec<String>>,
}

fn parse_startup_list(raw: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in raw.split(',').map(str::trim).filter(|k| !k.is_empty()) {
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

pub fn format_uptime(secs: u64) -> String {
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn refuse_system(key: &str, action: &str) -> Result<(), ModuleError> {
    if key == SYSTEM_MODULE {
        return Err(ModuleError::InvalidArguments(format!(
            "the {} module cannot be {}",
            SYSTEM_MODULE, action
        )));
    }
    Ok(())
}

impl SystemState {
    async fn save_startup(&self, startup: &[String]) -> Result<(), ModuleError> {
        self.store
            .set_value(STARTUP_LIST_KEY, &startup.join(","))
            .await?;
        Ok(())
    }

    async fn start_modules(self: Arc<Self>, _args: Vec<Value>) -> FunctionResult {
        let startup = self.startup.lock().await.clone();
        let mut loaded = Vec::new();
        let mut failed = Vec::new();

        for key in startup {
            if self.loader.registry().is_loaded(&key) {
                loaded.push(key);
                continue;
            }
            match self.loader.load_module(&key).await {
                Ok(()) => loaded.push(key),
                Err(e) => {
                    tracing::error!("Startup module {} failed to load: {}", key, e);
                    failed.push(json!({ "key": key, "error": e.to_string() }));
                }
            }
        }

        Ok(json!({ "loaded": loaded, "failed": failed }))
    }

    async fn load_module(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let key = string_arg(&args, 0, "key")?;
        self.loader.load_module(&key).await?;

        let mut startup = self.startup.lock().await;
        if !startup.contains(&key) {
            startup.push(key);
            self.save_startup(&startup).await?;
        }
        Ok(json!(true))
    }

    async fn unload_module(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let key = string_arg(&args, 0, "key")?;
        refuse_system(&key, "unloaded")?;
        let unloaded = self.loader.unload_module(&key).await?;

        let mut startup = self.startup.lock().await;
        if startup.contains(&key) {
            startup.retain(|k| k != &key);
            self.save_startup(&startup).await?;
        }
        Ok(json!(unloaded))
    }

    async fn reload_module(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let key = string_arg(&args, 0, "key")?;
        refuse_system(&key, "reloaded")?;
        Ok(json!(self.loader.reload_module(&key).await?))
    }

    async fn list_modules(self: Arc<Self>, _args: Vec<Value>) -> FunctionResult {
        let modules: Vec<Value> = self
            .loader
            .registry()
            .entries()
            .into_iter()
            .map(|(key, entry)| match entry.instance() {
                Some(module) => json!({
                    "key": key,
                    "name": module.name(),
                    "author": module.author(),
                    "version": module.version().to_string(),
                    "status": entry.status().as_str(),
                }),
                None => json!({
                    "key": key,
                    "name": Value::Null,
                    "author": Value::Null,
                    "version": Value::Null,
                    "status": entry.status().as_str(),
                }),
            })
            .collect();
        Ok(Value::Array(modules))
    }

    async fn uptime(self: Arc<Self>, _args: Vec<Value>) -> FunctionResult {
        let secs = (chrono::Utc::now() - self.loader.started_at())
            .num_seconds()
            .max(0) as u64;
        Ok(json!({ "seconds": secs, "human": format_uptime(secs) }))
    }

    async fn get_value(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let key = string_arg(&args, 0, "key")?;
        let value = self.store.get_value(&key).await?;
        Ok(match value.or_else(|| optional_string_arg(&args, 1)) {
            Some(value) => Value::String(value),
            None => Value::Null,
        })
    }

    async fn get_values(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let data = map_arg(&args, 0, "data")?;
        Ok(json!(self.store.get_values(&data).await?))
    }

    async fn set_value(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let key = string_arg(&args, 0, "key")?;
        let value = string_arg(&args, 1, "value")?;
        self.store.set_value(&key, &value).await?;
        if key == STARTUP_LIST_KEY {
            *self.startup.lock().await = parse_startup_list(&value);
        }
        Ok(json!(true))
    }

    async fn set_values(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let data = map_arg(&args, 0, "data")?;
        let written = self.store.set_values(&data).await?;
        if let Some(value) = data.get(STARTUP_LIST_KEY) {
            *self.startup.lock().await = parse_startup_list(value);
        }
        Ok(json!(written))
    }

    async fn defaults(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let data = map_arg(&args, 0, "data")?;
        let reset = bool_arg(&args, 1);
        self.store.defaults(&data, reset).await?;
        Ok(json!(true))
    }

    async fn delete_value(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let key = string_arg(&args, 0, "key")?;
        self.store.delete_value(&key).await?;
        Ok(json!(true))
    }

    async fn delete_values(self: Arc<Self>, args: Vec<Value>) -> FunctionResult {
        let keys = list_arg(&args, 0, "keys")?;
        Ok(json!(self.store.delete_values(&keys).await?))
    }

    async fn keys(self: Arc<Self>, _args: Vec<Value>) -> FunctionResult {
        Ok(json!(self.store.keys().await?))
    }
}

impl SystemModule {
    /// Export a `SystemState` method under `name`
    fn export<F, Fut>(&self, state: &Arc<SystemState>, name: &str, method: F)
    where
        F: Fn(Arc<SystemState>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FunctionResult> + Send + 'static,
    {
        let state = Arc::clone(state);
        self.core
            .functions()
            .register(name, move |args| method(Arc::clone(&state), args));
    }
}

#[async_trait]
impl Module for SystemModule {
    fn name(&self) -> &str {
        "System Module"
    }

    fn author(&self) -> &str {
        "sans-bot"
    }

    fn version(&self) -> &Version {
        &self.version
    }

    fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    fn core(&self) -> &ModuleCore {
        &self.core
    }

    async fn load(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        let logger = self.core.logger();
        logger.debug("Opening configuration store...");
        let store = open_store(&self.store_config)?;
        store.ready().await?;

        let mut defaults = ConfigData::new();
        defaults.insert(STARTUP_LIST_KEY.to_string(), self.autoload.join(","));
        store.defaults(&defaults, false).await?;

        let startup = store
            .get_value(STARTUP_LIST_KEY)
            .await?
            .map(|raw| parse_startup_list(&raw))
            .unwrap_or_default();
        logger.info(&format!("Startup modules: {}", startup.join(", ")));

        let state = Arc::new(SystemState {
            loader: ctx.loader().clone(),
            store,
            startup: Mutex::new(startup),
        });

        self.export(&state, "StartModules", SystemState::start_modules);
        self.export(&state, "LoadModule", SystemState::load_module);
        self.export(&state, "UnloadModule", SystemState::unload_module);
        self.export(&state, "ReloadModule", SystemState::reload_module);
        self.export(&state, "ListModules", SystemState::list_modules);
        self.export(&state, "Uptime", SystemState::uptime);
        self.export(&state, "GetValue", SystemState::get_value);
        self.export(&state, "GetValues", SystemState::get_values);
        self.export(&state, "SetValue", SystemState::set_value);
        self.export(&state, "SetValues", SystemState::set_values);
        self.export(&state, "Defaults", SystemState::defaults);
        self.export(&state, "DeleteValue", SystemState::delete_value);
        self.export(&state, "DeleteValues", SystemState::delete_values);
        self.export(&state, "Keys", SystemState::keys);

        let version = self.version.to_string();
        self.core.functions().register("ApiVersion", move |_args| {
            let version = version.clone();
            async move { Ok(json!(version)) }
        });

        Ok(())
    }

    async fn unload(&self) -> Result<(), ModuleError> {
        // The exported closures hold the loader, which holds the registry
        self.core.functions().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::StoreDriver;
    use crate::modules::factory::ModuleCatalog;
    use crate::modules::registry::ModuleRegistry;
    use std::path::PathBuf;

    fn memory_store() -> StoreConfig {
        StoreConfig {
            driver: StoreDriver::Memory,
            path: PathBuf::new(),
            table: "config".to_string(),
        }
    }

    fn loader(autoload: Vec<String>) -> ModuleLoader {
        let catalog = ModuleCatalog::new().with(SYSTEM_MODULE, move || {
            Ok(Box::new(SystemModule::new(memory_store(), autoload.clone())) as Box<dyn Module>)
        });
        ModuleLoader::new(Arc::new(ModuleRegistry::new()), Arc::new(catalog))
    }

    #[test]
    fn test_parse_startup_list() {
        assert_eq!(parse_startup_list(" A, B,,A ,C"), vec!["A", "B", "C"]);
        assert!(parse_startup_list("").is_empty());
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(5), "5s");
        assert_eq!(format_uptime(65), "1m 5s");
        assert_eq!(format_uptime(3_725), "1h 2m 5s");
        assert_eq!(format_uptime(90_061), "1d 1h 1m 1s");
    }

    #[tokio::test]
    async fn test_config_functions() {
        let loader = loader(Vec::new());
        loader.load_module(SYSTEM_MODULE).await.unwrap();
        let dispatcher = loader.dispatcher();

        let set = dispatcher
            .call(SYSTEM_MODULE, "SetValue", vec![json!("Prefix"), json!("s!")])
            .await
            .unwrap();
        assert_eq!(set, json!(true));

        let value = dispatcher
            .call(SYSTEM_MODULE, "GetValue", vec![json!("Prefix")])
            .await
            .unwrap();
        assert_eq!(value, json!("s!"));

        let fallback = dispatcher
            .call(SYSTEM_MODULE, "GetValue", vec![json!("Missing"), json!("dflt")])
            .await
            .unwrap();
        assert_eq!(fallback, json!("dflt"));

        let keys = dispatcher.call(SYSTEM_MODULE, "Keys", vec![]).await.unwrap();
        assert_eq!(keys, json!(["Prefix", STARTUP_LIST_KEY]));

        let deleted = dispatcher
            .call(SYSTEM_MODULE, "DeleteValues", vec![json!(["Prefix", "Nope"])])
            .await
            .unwrap();
        assert_eq!(deleted, json!([true, false]));

        assert!(matches!(
            dispatcher.call(SYSTEM_MODULE, "GetValue", vec![]).await,
            Err(ModuleError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn test_start_modules_reports_failures() {
        let loader = loader(vec!["Ghost".to_string()]);
        loader.load_module(SYSTEM_MODULE).await.unwrap();

        let report = loader
            .dispatcher()
            .call(SYSTEM_MODULE, "StartModules", vec![])
            .await
            .unwrap();
        assert_eq!(report["loaded"], json!([]));
        assert_eq!(report["failed"][0]["key"], json!("Ghost"));
    }

    #[tokio::test]
    async fn test_refuses_to_unload_itself() {
        let loader = loader(Vec::new());
        loader.load_module(SYSTEM_MODULE).await.unwrap();

        let result = loader
            .dispatcher()
            .call(SYSTEM_MODULE, "UnloadModule", vec![json!(SYSTEM_MODULE)])
            .await;
        assert!(matches!(result, Err(ModuleError::InvalidArguments(_))));
        assert!(loader.registry().is_loaded(SYSTEM_MODULE));
    }

    #[tokio::test]
    async fn test_unload_clears_functions() {
        let loader = loader(Vec::new());
        loader.load_module(SYSTEM_MODULE).await.unwrap();
        let instance = loader.registry().instance(SYSTEM_MODULE).unwrap();
        assert!(instance.functions().contains("ApiVersion"));

        loader.unload_module(SYSTEM_MODULE).await.unwrap();
        assert!(instance.functions().is_empty());
        assert!(instance.is_destroyed());
    }
}
