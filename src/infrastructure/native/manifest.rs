//! Native module manifest (`module.yaml`)

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::application::errors::ModuleError;
use crate::domain::entities::Version;

/// Native module metadata
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleManifest {
    /// Display name (required)
    pub name: String,

    /// Module version (required)
    pub version: Version,

    pub description: Option<String>,

    pub author: Option<String>,

    /// Shared library, relative to the module directory. Defaults to the
    /// platform library name for the registry key.
    pub library: Option<PathBuf>,

    /// Module API version the library was built against
    pub api_version: Version,
}

impl ModuleManifest {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ModuleError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModuleError::failed(format!("Failed to read manifest {}: {}", path.display(), e))
        })?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ModuleError> {
        serde_yaml::from_str(content)
            .map_err(|e| ModuleError::failed(format!("Failed to parse manifest: {}", e)))
    }

    /// Library path for `key` inside `dir`. A `library` entry must stay
    /// inside the module directory.
    pub fn library_path(&self, dir: &Path, key: &str) -> Result<PathBuf, ModuleError> {
        let Some(lib) = &self.library else {
            return Ok(dir.join(libloading::library_filename(key)));
        };

        let inside = !lib.as_os_str().is_empty()
            && lib.components().all(|c| matches!(c, Component::Normal(_)));
        if !inside {
            return Err(ModuleError::InvalidModuleDefinition {
                key: key.to_string(),
                reason: format!(
                    "library {} must be a relative path inside the module directory",
                    lib.display()
                ),
            });
        }
        Ok(dir.join(lib))
    }
}
