//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Host configuration loading
//! - Storage: Configuration stores (memory, YAML file)
//! - Database: SQLite configuration store
//! - Native: Modules loaded from shared libraries
//! - Adapters: Operator console

pub mod adapters;
pub mod config;
pub mod database;
pub mod native;
pub mod storage;
