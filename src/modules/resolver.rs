//! Dependency resolution
//!
//! Runs after a module has been constructed and before its load hook:
//! every declared dependency must end up loaded at a compatible version.

use tracing::debug;

use super::loader::ModuleLoader;
use super::registry::RegistryEntry;
use super::trait_def::Dependencies;
use crate::application::errors::ModuleError;
use crate::domain::entities::Version;

/// Dependency resolver, borrowing the loader it recurses through
pub struct DependencyResolver<'a> {
    loader: &'a ModuleLoader,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(loader: &'a ModuleLoader) -> Self {
        Self { loader }
    }

    /// Make sure every dependency of `dependent` is loaded and compatible,
    /// loading missing ones in map order.
    ///
    /// `chain` holds the keys currently being loaded on this path, ending
    /// with `dependent`. A dependency found in it is a cycle; one that is
    /// loading elsewhere is `Busy`.
    pub async fn resolve(
        &self,
        dependent: &str,
        dependencies: &Dependencies,
        chain: &[String],
    ) -> Result<(), ModuleError> {
        let registry = self.loader.registry();

        for (key, required) in dependencies {
            match registry.get(key) {
                Some(RegistryEntry::Loaded(instance)) => {
                    check_compatible(key, required, instance.version())?;
                    continue;
                }
                Some(RegistryEntry::Loading) if chain.contains(key) => {
                    return Err(ModuleError::CircularDependency {
                        dependent: dependent.to_string(),
                        dependency: key.clone(),
                    });
                }
                Some(RegistryEntry::Loading) => {
                    debug!("{} requires {}, which is loading elsewhere", dependent, key);
                    return Err(ModuleError::Busy(key.clone()));
                }
                _ => {}
            }

            debug!("{} requires {} >= {}, loading it", dependent, key, required);
            if let Err(e) = self.loader.load_chained(key, chain.to_vec()).await {
                return Err(ModuleError::DependencyLoadFailure {
                    key: key.clone(),
                    required: required.clone(),
                    source: Box::new(e),
                });
            }

            let Some(instance) = registry.instance(key) else {
                return Err(ModuleError::DependencyLoadFailure {
                    key: key.clone(),
                    required: required.clone(),
                    source: Box::new(ModuleError::failed("Unknown module load error")),
                });
            };
            check_compatible(key, required, instance.version())?;
        }

        Ok(())
    }
}

fn check_compatible(key: &str, required: &Version, actual: &Version) -> Result<(), ModuleError> {
    if required.is_compatible(actual) {
        return Ok(());
    }
    Err(ModuleError::DependencyVersionMismatch {
        key: key.to_string(),
        required: required.clone(),
        actual: actual.clone(),
    })
}
