//! Operator-facing adapters

pub mod console;

pub use console::ConsoleAdapter;
