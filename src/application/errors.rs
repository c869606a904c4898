//! Application layer errors

use thiserror::Error;

use crate::domain::entities::Version;

/// Top-level host errors
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Module lifecycle and invocation errors
#[derive(Error, Debug)]
pub enum ModuleError {
    #[error("Dependency load failure: expected {key} >= version {required}, got version {actual}")]
    DependencyVersionMismatch {
        key: String,
        required: Version,
        actual: Version,
    },

    #[error("Dependency load failure: expected {key} >= version {required}, got failed module load: {source}")]
    DependencyLoadFailure {
        key: String,
        required: Version,
        #[source]
        source: Box<ModuleError>,
    },

    #[error("Attempted to call {function} from {module} but module is not loaded")]
    ModuleNotLoaded { module: String, function: String },

    #[error("Attempted to call {function} from {module} but {module} does not provide said function")]
    FunctionNotFound { module: String, function: String },

    #[error("{key} is not a valid module: {reason}")]
    InvalidModuleDefinition { key: String, reason: String },

    #[error("Module not found: {0}")]
    NotFound(String),

    #[error("Circular dependency: {dependent} requires {dependency}, which is still loading")]
    CircularDependency { dependent: String, dependency: String },

    #[error("Module {0} has a load or unload in progress")]
    Busy(String),

    #[error("Module {0} is already loaded")]
    AlreadyLoaded(String),

    #[error("Module {0} has been destroyed")]
    Destroyed(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{0}")]
    Failed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ModuleError {
    /// Shorthand for an unstructured hook failure
    pub fn failed(msg: impl Into<String>) -> Self {
        ModuleError::Failed(msg.into())
    }

    /// Walk the `source` chain down to the innermost error
    pub fn root_cause(&self) -> &ModuleError {
        match self {
            ModuleError::DependencyLoadFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Operator command errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Command not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// Configuration store errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store not ready")]
    NotReady,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Host configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_failure_chains_inner_message() {
        let inner = ModuleError::failed("token missing");
        let err = ModuleError::DependencyLoadFailure {
            key: "Discord".to_string(),
            required: Version::new(1, 0, 0),
            source: Box::new(inner),
        };

        let msg = err.to_string();
        assert!(msg.contains("Discord"));
        assert!(msg.contains("1.0.0"));
        assert!(msg.contains("token missing"));
        assert!(matches!(err.root_cause(), ModuleError::Failed(_)));
    }

    #[test]
    fn test_mismatch_names_both_versions() {
        let err = ModuleError::DependencyVersionMismatch {
            key: "Query".to_string(),
            required: Version::new(2, 0, 0),
            actual: Version::new(1, 4, 0),
        };
        assert_eq!(
            err.to_string(),
            "Dependency load failure: expected Query >= version 2.0.0, got version 1.4.0"
        );
    }
}
