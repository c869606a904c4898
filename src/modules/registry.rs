//! Module registry - what is loaded, and what state every known key is in

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::trait_def::Module;
use crate::application::errors::ModuleError;
use crate::domain::entities::ModuleStatus;

/// State of one registry key. Only `Loaded` carries an instance.
#[derive(Clone)]
pub enum RegistryEntry {
    Loading,
    Loaded(Arc<dyn Module>),
    Unloaded,
    Failure,
}

impl RegistryEntry {
    pub fn status(&self) -> ModuleStatus {
        match self {
            RegistryEntry::Loading => ModuleStatus::Loading,
            RegistryEntry::Loaded(_) => ModuleStatus::Loaded,
            RegistryEntry::Unloaded => ModuleStatus::Unloaded,
            RegistryEntry::Failure => ModuleStatus::Failure,
        }
    }

    pub fn instance(&self) -> Option<&Arc<dyn Module>> {
        match self {
            RegistryEntry::Loaded(module) => Some(module),
            _ => None,
        }
    }
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryEntry::Loaded(module) => f
                .debug_tuple("Loaded")
                .field(&format_args!("{} v{}", module.name(), module.version()))
                .finish(),
            other => write!(f, "{:?}", other.status()),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    /// Keys in order of their first load attempt
    order: Vec<String>,
    entries: HashMap<String, RegistryEntry>,
}

/// Registry of every module key the host has tried to load.
///
/// Entries are never removed, only transitioned. The lock is never held
/// across an await point.
pub struct ModuleRegistry {
    state: RwLock<RegistryState>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Get the entry for a key
    pub fn get(&self, key: &str) -> Option<RegistryEntry> {
        self.state.read().ok()?.entries.get(key).cloned()
    }

    /// Replace the entry for a key, creating it on first use
    pub fn set_entry(&self, key: &str, entry: RegistryEntry) -> Result<(), ModuleError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| ModuleError::Internal("Lock poisoned".to_string()))?;

        tracing::debug!("Registry: {} -> {}", key, entry.status());
        if !state.entries.contains_key(key) {
            state.order.push(key.to_string());
        }
        state.entries.insert(key.to_string(), entry);
        Ok(())
    }

    pub fn status(&self, key: &str) -> Option<ModuleStatus> {
        self.get(key).map(|e| e.status())
    }

    /// The loaded instance for a key, if any
    pub fn instance(&self, key: &str) -> Option<Arc<dyn Module>> {
        match self.get(key)? {
            RegistryEntry::Loaded(module) => Some(module),
            _ => None,
        }
    }

    pub fn is_loaded(&self, key: &str) -> bool {
        self.status(key) == Some(ModuleStatus::Loaded)
    }

    /// All known keys in insertion order
    pub fn keys(&self) -> Vec<String> {
        self.state
            .read()
            .map(|s| s.order.clone())
            .unwrap_or_default()
    }

    /// Every key with its current entry, in insertion order
    pub fn entries(&self) -> Vec<(String, RegistryEntry)> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        state
            .order
            .iter()
            .filter_map(|key| state.entries.get(key).map(|e| (key.clone(), e.clone())))
            .collect()
    }

    /// Loaded instances in insertion order
    pub fn loaded(&self) -> Vec<(String, Arc<dyn Module>)> {
        self.entries()
            .into_iter()
            .filter_map(|(key, entry)| match entry {
                RegistryEntry::Loaded(module) => Some((key, module)),
                _ => None,
            })
            .collect()
    }

    /// Number of known keys
    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.order.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_keep_first_insertion_order() {
        let registry = ModuleRegistry::new();
        registry.set_entry("B", RegistryEntry::Loading).unwrap();
        registry.set_entry("A", RegistryEntry::Loading).unwrap();
        registry.set_entry("B", RegistryEntry::Failure).unwrap();

        assert_eq!(registry.keys(), vec!["B".to_string(), "A".to_string()]);
        assert_eq!(registry.status("B"), Some(ModuleStatus::Failure));
        assert_eq!(registry.status("A"), Some(ModuleStatus::Loading));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_key_has_no_entry() {
        let registry = ModuleRegistry::new();
        assert!(registry.get("Missing").is_none());
        assert!(registry.instance("Missing").is_none());
        assert!(!registry.is_loaded("Missing"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_non_loaded_entries_have_no_instance() {
        for entry in [RegistryEntry::Loading, RegistryEntry::Unloaded, RegistryEntry::Failure] {
            assert!(entry.instance().is_none());
            assert_ne!(entry.status(), ModuleStatus::Loaded);
        }
    }
}
