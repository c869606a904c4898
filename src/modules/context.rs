//! Context handed to a module's load hook

use serde_json::Value;

use super::dispatcher::ModuleDispatcher;
use super::loader::ModuleLoader;
use crate::application::errors::ModuleError;

/// What a loading module can reach: the host's loader and dispatcher
#[derive(Clone)]
pub struct ModuleContext {
    key: String,
    loader: ModuleLoader,
}

impl ModuleContext {
    pub fn new(key: impl Into<String>, loader: ModuleLoader) -> Self {
        Self {
            key: key.into(),
            loader,
        }
    }

    /// Registry key the module is being loaded under
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn dispatcher(&self) -> ModuleDispatcher {
        self.loader.dispatcher()
    }

    /// Call a function exported by another loaded module
    pub async fn call(
        &self,
        module: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, ModuleError> {
        self.dispatcher().call(module, function, args).await
    }
}
