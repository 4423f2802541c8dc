//! Audit events.
//!
//! The client reports security-relevant outcomes (authentication
//! failures, fail-open degradation, partial writes) to an [`AuditSink`].
//! Sinks are fire-and-forget: they return nothing and cannot change the
//! outcome of the operation that produced the event.

use std::fmt;

use crate::error::DirectoryError;

/// Severity of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Diagnostic detail.
    Debug,
    /// Normal operation.
    Info,
    /// Degraded but continuing.
    Warning,
    /// Operation failed.
    Error,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    /// Human-readable description. Never contains passwords.
    pub message: String,
    /// Stable machine-readable code.
    pub code: &'static str,
    /// Severity.
    pub severity: Severity,
    /// Subsystem, e.g. `authentication` or `update`.
    pub category: &'static str,
}

impl AuditEvent {
    /// Creates an event.
    #[must_use]
    pub fn new(
        message: impl Into<String>,
        code: &'static str,
        severity: Severity,
        category: &'static str,
    ) -> Self {
        Self {
            message: message.into(),
            code,
            severity,
            category,
        }
    }

    /// Creates an error-severity event from a directory error.
    #[must_use]
    pub fn from_error(error: &DirectoryError, category: &'static str) -> Self {
        Self::new(error.to_string(), error.code(), Severity::Error, category)
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}", self.category, self.code, self.message)
    }
}

/// Receiver of audit events.
pub trait AuditSink: Send + Sync {
    /// Records an event.
    fn record(&self, event: &AuditEvent);
}

/// Forwards events to `tracing` at the matching level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        match event.severity {
            Severity::Debug => tracing::debug!(
                category = event.category,
                code = event.code,
                "{}",
                event.message
            ),
            Severity::Info => tracing::info!(
                category = event.category,
                code = event.code,
                "{}",
                event.message
            ),
            Severity::Warning => tracing::warn!(
                category = event.category,
                code = event.code,
                "{}",
                event.message
            ),
            Severity::Error => tracing::error!(
                category = event.category,
                code = event.code,
                "{}",
                event.message
            ),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}
