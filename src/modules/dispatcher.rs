//! Invocation dispatcher - cross-module function calls

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::registry::ModuleRegistry;
use crate::application::errors::ModuleError;

/// Routes `(module, function, args)` to the target module's function table
#[derive(Clone)]
pub struct ModuleDispatcher {
    registry: Arc<ModuleRegistry>,
}

impl ModuleDispatcher {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    /// Call a function exported by a loaded module.
    ///
    /// The function's own result or error is returned unchanged.
    pub async fn call(
        &self,
        module: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, ModuleError> {
        let Some(instance) = self.registry.instance(module) else {
            warn!("Call to {}::{} but module is not loaded", module, function);
            return Err(ModuleError::ModuleNotLoaded {
                module: module.to_string(),
                function: function.to_string(),
            });
        };
        instance.ensure_alive()?;

        let Some(target) = instance.functions().get(function) else {
            warn!("Call to {}::{} but function is not exported", module, function);
            return Err(ModuleError::FunctionNotFound {
                module: module.to_string(),
                function: function.to_string(),
            });
        };

        debug!("Calling {}::{} with {} argument(s)", module, function, args.len());
        target(args).await
    }

    /// Whether `module` is loaded and exports `function`
    pub fn provides(&self, module: &str, function: &str) -> bool {
        self.registry
            .instance(module)
            .map(|m| m.functions().contains(function))
            .unwrap_or(false)
    }
}
