//! Domain entities - Core value types with no infrastructure dependencies

pub mod command;
pub mod status;
pub mod version;

pub use command::{Command, CommandRegistry};
pub use status::ModuleStatus;
pub use version::Version;
