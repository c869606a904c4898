//! Domain layer - Core types with no external dependencies
//!
//! This layer contains:
//! - Entities: Version, module status, operator commands
//! - Traits: Abstractions for infrastructure (ConfigStore)

pub mod entities;
pub mod traits;
