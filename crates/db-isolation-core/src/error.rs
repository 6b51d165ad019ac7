// crates/db-isolation-core/src/error.rs
// ============================================================================
// Module: Isolation Errors
// Description: Typed failures surfaced by the isolation lifecycle.
// Purpose: Let the test framework decide what aborts one test or the run.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`IsolationError`] is returned to callers. [`CleanupError`] is never
//! returned: cleanup runs after a test's verdict is known, so those failures
//! are routed to a diagnostics sink instead.

use serde::Serialize;
use thiserror::Error;

use crate::deadline::DeadlineError;
use crate::interfaces::DriverError;

/// Errors surfaced to callers of the isolation manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IsolationError {
    /// The server failed to launch or its address could not be resolved.
    #[error("server startup failed: {0}")]
    Startup(String),
    /// The server did not become ready before the startup deadline.
    #[error("server startup timed out: {0}")]
    StartupTimeout(String),
    /// Create-database or grant failed; the test must not run.
    #[error("namespace provisioning failed: {0}")]
    Provisioning(String),
    /// A scoped connection could not be established.
    #[error("connection failed: {0}")]
    Connection(DriverError),
    /// The operation is not valid in the manager's current state.
    #[error("invalid state: {0}")]
    State(String),
    /// The deadline elapsed or the caller cancelled.
    #[error("operation timed out: {0}")]
    Timeout(String),
}

impl IsolationError {
    /// Maps a deadline failure during `operation` to a timeout error.
    pub(crate) fn deadline(operation: &str, err: DeadlineError) -> Self {
        Self::Timeout(format!("{operation}: {err}"))
    }
}

/// Best-effort cleanup failures; logged, never escalated.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CleanupError {
    /// Dropping a namespace failed; the namespace may be stale on the server.
    #[error("failed to drop namespace {namespace}: {reason}")]
    DropNamespace {
        /// Namespace that could not be dropped.
        namespace: String,
        /// Failure description.
        reason: String,
    },
    /// Terminating the server failed.
    #[error("failed to terminate server: {0}")]
    Terminate(String),
    /// Closing an administrative connection failed.
    #[error("failed to close {purpose} connection: {reason}")]
    CloseConnection {
        /// Operation the connection was opened for.
        purpose: String,
        /// Failure description.
        reason: String,
    },
    /// Rolling back a failed unit of work failed.
    #[error("failed to roll back {purpose}: {reason}")]
    Rollback {
        /// Operation whose unit of work was being rolled back.
        purpose: String,
        /// Failure description.
        reason: String,
    },
}
