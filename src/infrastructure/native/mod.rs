//! Native modules for sans-bot
//!
//! Native modules are shared libraries in the module directory, one
//! directory per registry key, each with a `module.yaml` manifest. The library
//! exports `sans_module_create`, which returns a boxed `Module`.

pub mod loader;
pub mod manifest;

pub use loader::{ModuleCreateFn, NativeCatalog, NativeModule, CREATE_SYMBOL};
pub use manifest::ModuleManifest;
