//! Module host - registry, loader, dispatcher and the built-in System module

pub mod args;
pub mod context;
pub mod dispatcher;
pub mod factory;
pub mod loader;
pub mod logger;
pub mod registry;
pub mod resolver;
pub mod system;
pub mod trait_def;

use once_cell::sync::Lazy;

use crate::domain::entities::Version;

pub use context::ModuleContext;
pub use dispatcher::ModuleDispatcher;
pub use factory::{ModuleCatalog, ModuleConstructor, ModuleFactory};
pub use loader::ModuleLoader;
pub use logger::ModuleLogger;
pub use registry::{ModuleRegistry, RegistryEntry};
pub use system::{SystemModule, SYSTEM_MODULE};
pub use trait_def::{Dependencies, FunctionResult, FunctionTable, Module, ModuleCore, ModuleFunction};

/// Version of the module API this host implements. Native modules declare
/// the API version they were built against.
pub static API_VERSION: Lazy<Version> = Lazy::new(|| {
    Version::new(1, 0, 0)
        .with_prerelease("alpha")
        .with_buildtag(option_env!("SANS_BUILD_META").unwrap_or(""))
});

pub fn api_version() -> &'static Version {
    &API_VERSION
}
