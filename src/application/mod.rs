//! Application layer - Use cases and business logic
//!
//! This layer contains:
//! - Services: Operator command handling
//! - Errors: Host, module, command, storage and config errors

pub mod errors;
pub mod services;
