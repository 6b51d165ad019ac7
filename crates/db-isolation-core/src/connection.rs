// crates/db-isolation-core/src/connection.rs
// ============================================================================
// Module: Connection Factory
// Description: Administrative and namespace-scoped client connections.
// Purpose: Bind each connection to the right account and default database.
// Dependencies: crate::{dsn, interfaces, diagnostics}
// ============================================================================

//! ## Overview
//! Administrative connections authenticate as the server's admin account in
//! server-global scope and are used only for provisioning. Scoped
//! connections authenticate as the campaign's non-administrative account with
//! one namespace selected as the default database. [`AdminSession`] wraps an
//! administrative connection so it is closed on every exit path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::deadline::Deadline;
use crate::diagnostics::DiagnosticsSink;
use crate::dsn::Dsn;
use crate::error::CleanupError;
use crate::interfaces::Connection;
use crate::interfaces::DriverError;
use crate::interfaces::SqlDriver;
use crate::namespace::Namespace;
use crate::server::ServerConfig;

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Builds admin and scoped connections through a [`SqlDriver`].
#[derive(Clone)]
pub struct ConnectionFactory {
    /// Underlying client driver.
    driver: Arc<dyn SqlDriver>,
}

impl ConnectionFactory {
    /// Creates a factory around `driver`.
    #[must_use]
    pub fn new(driver: Arc<dyn SqlDriver>) -> Self {
        Self {
            driver,
        }
    }

    /// Returns the administrative connection string (no default database).
    #[must_use]
    pub fn admin_dsn(server: &ServerConfig) -> Dsn {
        Dsn::new(server.admin().clone(), server.address(), server.port(), None)
    }

    /// Returns the scoped connection string for `namespace`.
    #[must_use]
    pub fn scoped_dsn(server: &ServerConfig, namespace: &Namespace) -> Dsn {
        Dsn::new(
            server.user().clone(),
            server.address(),
            server.port(),
            Some(namespace.as_str().to_string()),
        )
    }

    /// Opens an administrative connection.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the driver cannot connect.
    pub fn admin_connection(
        &self,
        server: &ServerConfig,
        deadline: &Deadline,
    ) -> Result<Connection, DriverError> {
        self.driver.connect(&Self::admin_dsn(server), deadline)
    }

    /// Opens a connection scoped to `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when authentication fails or the namespace is
    /// missing or not granted.
    pub fn scoped_connection(
        &self,
        server: &ServerConfig,
        namespace: &Namespace,
        deadline: &Deadline,
    ) -> Result<Connection, DriverError> {
        self.driver.connect(&Self::scoped_dsn(server, namespace), deadline)
    }
}

// ============================================================================
// SECTION: Admin Session
// ============================================================================

/// Administrative connection that is always closed, even on early return.
pub(crate) struct AdminSession {
    /// Open connection; `None` once closed.
    conn: Option<Connection>,
    /// Operation label used in close diagnostics.
    purpose: &'static str,
    /// Receives close failures.
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl AdminSession {
    /// Opens an administrative connection for `purpose`.
    pub(crate) fn open(
        factory: &ConnectionFactory,
        server: &ServerConfig,
        deadline: &Deadline,
        purpose: &'static str,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Result<Self, DriverError> {
        let conn = factory.admin_connection(server, deadline)?;
        Ok(Self {
            conn: Some(conn),
            purpose,
            diagnostics,
        })
    }

    /// Returns the live connection.
    fn live(&mut self) -> Result<&mut Connection, DriverError> {
        self.conn.as_mut().ok_or_else(|| DriverError::Close("connection already closed".to_string()))
    }

    /// Executes one statement.
    pub(crate) fn execute(&mut self, statement: &str) -> Result<(), DriverError> {
        self.live()?.execute(statement)
    }

    /// Opens a unit of work.
    pub(crate) fn begin(&mut self) -> Result<(), DriverError> {
        self.live()?.begin()
    }

    /// Commits the unit of work.
    pub(crate) fn commit(&mut self) -> Result<(), DriverError> {
        self.live()?.commit()
    }

    /// Rolls back the unit of work, reporting rollback failures to diagnostics.
    ///
    /// The caller is already failing, so the rollback outcome never replaces
    /// its error.
    pub(crate) fn rollback_reporting(&mut self) {
        let Ok(conn) = self.live() else {
            return;
        };
        if let Err(err) = conn.rollback() {
            self.diagnostics.record_cleanup(&CleanupError::Rollback {
                purpose: self.purpose.to_string(),
                reason: err.to_string(),
            });
        }
    }

    /// Closes the connection now, reporting close failures to diagnostics.
    pub(crate) fn close(mut self) {
        self.release();
    }

    /// Shared close path for explicit close and drop.
    fn release(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err(err) = conn.close()
        {
            self.diagnostics.record_cleanup(&CleanupError::CloseConnection {
                purpose: self.purpose.to_string(),
                reason: err.to_string(),
            });
        }
    }
}

impl Drop for AdminSession {
    fn drop(&mut self) {
        self.release();
    }
}
