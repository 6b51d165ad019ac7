// crates/db-isolation-core/src/diagnostics.rs
// ============================================================================
// Module: Isolation Diagnostics
// Description: Structured lifecycle events and cleanup failure reporting.
// Purpose: Emit operational diagnostics without hard logging dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Lifecycle events and [`CleanupError`] values flow into an injectable
//! [`DiagnosticsSink`]. Deployments route them to stderr or a file as JSON
//! lines; tests install a [`MemoryDiagnosticsSink`] and assert on what was
//! recorded. Events never carry passwords.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::error::CleanupError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome label attached to lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Operation succeeded.
    Ok,
    /// Operation failed.
    Error,
}

/// Lifecycle event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Namespace the event concerns, when any.
    pub namespace: Option<String>,
    /// Event outcome.
    pub outcome: EventOutcome,
    /// Free-form detail (addresses, error text); never secrets.
    pub detail: Option<String>,
}

impl LifecycleEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event: &'static str, outcome: EventOutcome) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event,
            timestamp_ms,
            namespace: None,
            outcome,
            detail: None,
        }
    }

    /// Attaches a namespace name.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Attaches detail text.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// JSON-line wrapper for cleanup failures.
#[derive(Serialize)]
struct CleanupRecord<'a> {
    /// Event identifier.
    event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    timestamp_ms: u128,
    /// Failure payload.
    error: &'a CleanupError,
}

impl<'a> CleanupRecord<'a> {
    /// Wraps a cleanup failure with a timestamp.
    fn new(error: &'a CleanupError) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "cleanup_failed",
            timestamp_ms,
            error,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for isolation diagnostics.
pub trait DiagnosticsSink: Send + Sync {
    /// Record a lifecycle event.
    fn record(&self, event: &LifecycleEvent);

    /// Record a swallowed cleanup failure.
    fn record_cleanup(&self, error: &CleanupError);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Sink that logs JSON lines to stderr.
pub struct StderrDiagnosticsSink;

impl DiagnosticsSink for StderrDiagnosticsSink {
    fn record(&self, event: &LifecycleEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_cleanup(&self, error: &CleanupError) {
        if let Ok(payload) = serde_json::to_string(&CleanupRecord::new(error)) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Sink that appends JSON lines to a file.
pub struct FileDiagnosticsSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileDiagnosticsSink {
    /// Opens the diagnostics file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Writes one line and flushes.
    fn write_line(&self, payload: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl DiagnosticsSink for FileDiagnosticsSink {
    fn record(&self, event: &LifecycleEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            self.write_line(&payload);
        }
    }

    fn record_cleanup(&self, error: &CleanupError) {
        if let Ok(payload) = serde_json::to_string(&CleanupRecord::new(error)) {
            self.write_line(&payload);
        }
    }
}

/// No-op sink.
pub struct NoopDiagnosticsSink;

impl DiagnosticsSink for NoopDiagnosticsSink {
    fn record(&self, _event: &LifecycleEvent) {}

    fn record_cleanup(&self, _error: &CleanupError) {}
}

/// Sink that keeps everything in memory for assertions.
#[derive(Default)]
pub struct MemoryDiagnosticsSink {
    /// Recorded lifecycle events.
    events: Mutex<Vec<LifecycleEvent>>,
    /// Recorded cleanup failures.
    cleanup: Mutex<Vec<CleanupError>>,
}

impl MemoryDiagnosticsSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded lifecycle events.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the identifiers of recorded lifecycle events, in order.
    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(|event| event.event).collect()
    }

    /// Returns a copy of the recorded cleanup failures.
    #[must_use]
    pub fn cleanup_failures(&self) -> Vec<CleanupError> {
        self.cleanup.lock().map(|errors| errors.clone()).unwrap_or_default()
    }
}

impl DiagnosticsSink for MemoryDiagnosticsSink {
    fn record(&self, event: &LifecycleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn record_cleanup(&self, error: &CleanupError) {
        if let Ok(mut errors) = self.cleanup.lock() {
            errors.push(error.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
