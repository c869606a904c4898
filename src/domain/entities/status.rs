use serde::{Deserialize, Serialize};
use std::fmt;

/// Load status of a module registry entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleStatus {
    /// A load is in progress
    Loading,
    /// Loaded and callable
    Loaded,
    /// Was loaded, has since been unloaded
    Unloaded,
    /// The last load attempt failed
    Failure,
}

impl ModuleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ModuleStatus::Loading => "loading",
            ModuleStatus::Loaded => "loaded",
            ModuleStatus::Unloaded => "unloaded",
            ModuleStatus::Failure => "failure",
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
