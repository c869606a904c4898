//! Native module loader - builds modules from shared libraries

use async_trait::async_trait;
use libloading::{Library, Symbol};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

use super::manifest::ModuleManifest;
use crate::application::errors::ModuleError;
use crate::domain::entities::Version;
use crate::modules::{api_version, Dependencies, Module, ModuleContext, ModuleCore, ModuleFactory};

/// Symbol every native module library exports. It returns a boxed module
/// allocated by the library, or null on failure.
pub const CREATE_SYMBOL: &[u8] = b"sans_module_create";

/// Signature of [`CREATE_SYMBOL`]. Libraries must be built with the same
/// compiler as the host.
pub type ModuleCreateFn = unsafe extern "C" fn() -> *mut Box<dyn Module>;

static MODULE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_-]*$").expect("valid module key regex"));

/// A module from a shared library. The library is closed only after the
/// module itself is dropped.
pub struct NativeModule {
    // Field order matters: `module` must drop before `library`
    module: Box<dyn Module>,
    _library: Library,
}

#[async_trait]
impl Module for NativeModule {
    fn name(&self) -> &str {
        self.module.name()
    }

    fn author(&self) -> &str {
        self.module.author()
    }

    fn version(&self) -> &Version {
        self.module.version()
    }

    fn dependencies(&self) -> &Dependencies {
        self.module.dependencies()
    }

    fn core(&self) -> &ModuleCore {
        self.module.core()
    }

    async fn load(&mut self, ctx: &ModuleContext) -> Result<(), ModuleError> {
        self.module.load(ctx).await
    }

    async fn unload(&self) -> Result<(), ModuleError> {
        self.module.unload().await
    }
}

/// Factory for native modules laid out as `<dir>/<key>/module.yaml`
pub struct NativeCatalog {
    module_dir: PathBuf,
}

impl NativeCatalog {
    pub fn new(module_dir: impl Into<PathBuf>) -> Self {
        Self {
            module_dir: module_dir.into(),
        }
    }

    pub fn module_dir(&self) -> &Path {
        &self.module_dir
    }

    /// Directory of a module, refusing keys that would escape `module_dir`
    fn module_path(&self, key: &str) -> Result<PathBuf, ModuleError> {
        if !MODULE_KEY.is_match(key) {
            return Err(ModuleError::InvalidModuleDefinition {
                key: key.to_string(),
                reason: "module key must be a plain directory name".to_string(),
            });
        }
        Ok(self.module_dir.join(key))
    }

    /// Read and check a module's manifest
    pub fn manifest(&self, key: &str) -> Result<ModuleManifest, ModuleError> {
        let manifest_path = self.module_path(key)?.join("module.yaml");
        if !manifest_path.exists() {
            return Err(ModuleError::NotFound(key.to_string()));
        }

        let manifest = ModuleManifest::from_file(&manifest_path)?;
        // The host API is the requirement the library's API must satisfy
        if !api_version().is_compatible(&manifest.api_version) {
            return Err(ModuleError::InvalidModuleDefinition {
                key: key.to_string(),
                reason: format!(
                    "built for module API {}, host provides {}",
                    manifest.api_version,
                    api_version()
                ),
            });
        }
        Ok(manifest)
    }

    /// Keys of every module directory holding a manifest, sorted
    pub fn available(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.module_dir) else {
            tracing::warn!("Module directory does not exist: {}", self.module_dir.display());
            return Vec::new();
        };

        let mut keys: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join("module.yaml").is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| !name.starts_with('.'))
            .collect();
        keys.sort();
        keys
    }

    fn open(&self, key: &str) -> Result<NativeModule, ModuleError> {
        let manifest = self.manifest(key)?;
        let library_path = manifest.library_path(&self.module_path(key)?, key)?;
        if !library_path.exists() {
            return Err(ModuleError::failed(format!(
                "Library not found: {}",
                library_path.display()
            )));
        }

        // SAFETY: loading runs the library's initialisers; module libraries
        // are trusted code placed in the module directory by the operator.
        let library = unsafe {
            Library::new(&library_path)
                .map_err(|e| ModuleError::failed(format!("Failed to load library: {}", e)))?
        };

        let module = unsafe {
            let create: Symbol<ModuleCreateFn> = library.get(CREATE_SYMBOL).map_err(|e| {
                ModuleError::failed(format!("Failed to find module constructor: {}", e))
            })?;
            let raw = create();
            if raw.is_null() {
                return Err(ModuleError::failed("Module constructor returned null"));
            }
            *Box::from_raw(raw)
        };

        tracing::info!(
            "Opened native module {} ({} v{}) from {}",
            key,
            manifest.name,
            manifest.version,
            library_path.display()
        );

        Ok(NativeModule {
            module,
            _library: library,
        })
    }
}

impl ModuleFactory for NativeCatalog {
    fn create(&self, key: &str) -> Result<Box<dyn Module>, ModuleError> {
        Ok(Box::new(self.open(key)?))
    }

    fn provides(&self, key: &str) -> bool {
        self.module_path(key)
            .map(|dir| dir.join("module.yaml").is_file())
            .unwrap_or(false)
    }
}
