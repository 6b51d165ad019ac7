// crates/db-isolation-core/src/options.rs
// ============================================================================
// Module: Isolation Options
// Description: Timeout policy, namespace policy, and manager wiring.
// Purpose: Make every policy value configurable with sane defaults.
// Dependencies: crate::{diagnostics, interfaces}
// ============================================================================

//! ## Overview
//! Timeouts are policy, not physics: defaults follow common CI expectations
//! (five minutes to pull and boot a server image, one minute per namespace
//! operation, twenty seconds to shut down) and every value can be overridden.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::diagnostics::DiagnosticsSink;
use crate::diagnostics::StderrDiagnosticsSink;
use crate::interfaces::SqlDriver;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bound on server startup.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Default bound on namespace creation.
pub const DEFAULT_PROVISION_TIMEOUT: Duration = Duration::from_secs(60);
/// Default bound on namespace removal.
pub const DEFAULT_REMOVE_TIMEOUT: Duration = Duration::from_secs(60);
/// Default bound on server shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(20);
/// Default bound on opening a scoped connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default character set for new namespaces.
pub const DEFAULT_CHARSET: &str = "utf8mb4";
/// Default collation for new namespaces.
pub const DEFAULT_COLLATION: &str = "utf8mb4_unicode_ci";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Per-operation time bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    /// Server launch and readiness.
    pub startup: Duration,
    /// Namespace creation and grant.
    pub provision: Duration,
    /// Namespace removal.
    pub remove: Duration,
    /// Server termination.
    pub shutdown: Duration,
    /// Scoped connection establishment.
    pub connect: Duration,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self {
            startup: DEFAULT_STARTUP_TIMEOUT,
            provision: DEFAULT_PROVISION_TIMEOUT,
            remove: DEFAULT_REMOVE_TIMEOUT,
            shutdown: DEFAULT_SHUTDOWN_TIMEOUT,
            connect: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// How namespaces are named and created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceOptions {
    /// Prefix prepended to generated names.
    pub prefix: String,
    /// Character set applied at creation.
    pub charset: String,
    /// Collation applied at creation.
    pub collation: String,
}

impl Default for NamespaceOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            charset: DEFAULT_CHARSET.to_string(),
            collation: DEFAULT_COLLATION.to_string(),
        }
    }
}

/// Collaborators and policy shared by every manager of a campaign.
#[derive(Clone)]
pub struct ManagerOptions {
    /// Driver used for admin and scoped connections.
    pub driver: Arc<dyn SqlDriver>,
    /// Destination for lifecycle events and cleanup failures.
    pub diagnostics: Arc<dyn DiagnosticsSink>,
    /// Operation time bounds.
    pub timeouts: TimeoutPolicy,
    /// Namespace naming and creation policy.
    pub namespace: NamespaceOptions,
}

impl ManagerOptions {
    /// Builds options with default policy and stderr diagnostics.
    #[must_use]
    pub fn new(driver: Arc<dyn SqlDriver>) -> Self {
        Self {
            driver,
            diagnostics: Arc::new(StderrDiagnosticsSink),
            timeouts: TimeoutPolicy::default(),
            namespace: NamespaceOptions::default(),
        }
    }

    /// Replaces the diagnostics sink.
    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Replaces the timeout policy.
    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Replaces the namespace policy.
    #[must_use]
    pub fn with_namespace(mut self, namespace: NamespaceOptions) -> Self {
        self.namespace = namespace;
        self
    }
}
