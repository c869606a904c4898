//! sans-bot - a modular bot host
//!
//! Modules are loaded by registry key, have their dependencies loaded first,
//! call each other's exported functions through a dispatcher, and are
//! unloaded together with everything that depends on them.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod modules;
