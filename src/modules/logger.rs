//! Per-module logger
//!
//! Each module owns one `ModuleLogger`, created with the module and released
//! when the module is disposed. Events are emitted through `tracing` inside a
//! `module` span carrying the module's source name.

use std::sync::Mutex;
use tracing::Span;

pub struct ModuleLogger {
    source: String,
    span: Mutex<Option<Span>>,
}

impl ModuleLogger {
    pub fn new(source: impl Into<String>) -> Self {
        let source = source.into();
        let span = tracing::info_span!("module", source = %source);
        Self {
            source,
            span: Mutex::new(Some(span)),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `release` has been called
    pub fn is_released(&self) -> bool {
        self.span.lock().map(|s| s.is_none()).unwrap_or(true)
    }

    /// Close the span. Later messages are dropped.
    pub fn release(&self) {
        let span = match self.span.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(span) = span {
            span.in_scope(|| tracing::trace!(source = %self.source, "Logger released"));
        }
    }

    fn with_span(&self, f: impl FnOnce()) {
        let span = match self.span.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        if let Some(span) = span {
            span.in_scope(f);
        }
    }

    pub fn trace(&self, message: &str) {
        self.with_span(|| tracing::trace!(source = %self.source, "{}", message));
    }

    pub fn debug(&self, message: &str) {
        self.with_span(|| tracing::debug!(source = %self.source, "{}", message));
    }

    pub fn info(&self, message: &str) {
        self.with_span(|| tracing::info!(source = %self.source, "{}", message));
    }

    pub fn warn(&self, message: &str) {
        self.with_span(|| tracing::warn!(source = %self.source, "{}", message));
    }

    pub fn error(&self, message: &str) {
        self.with_span(|| tracing::error!(source = %self.source, "{}", message));
    }
}

impl std::fmt::Debug for ModuleLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLogger")
            .field("source", &self.source)
            .field("released", &self.is_released())
            .finish()
    }
}
