// crates/db-isolation-core/src/provisioner.rs
// ============================================================================
// Module: Namespace Provisioner
// Description: Create, grant, and drop per-test logical databases.
// Purpose: Provision namespaces atomically and reclaim them best-effort.
// Dependencies: crate::{connection, diagnostics, error, options}
// ============================================================================

//! ## Overview
//! Creation runs `CREATE DATABASE` and `GRANT` inside one unit of work on a
//! short-lived administrative connection. A grant failure after a successful
//! create is reported as provisioning failure so the caller never runs a
//! test against a half-provisioned namespace. Dropping is cleanup: failures
//! come back as [`CleanupError`] for the caller to log.
//!
//! Callers guarantee name uniqueness by construction; nothing here checks
//! for an existing database first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::connection::AdminSession;
use crate::connection::ConnectionFactory;
use crate::deadline::Deadline;
use crate::diagnostics::DiagnosticsSink;
use crate::error::CleanupError;
use crate::error::IsolationError;
use crate::namespace::Namespace;
use crate::options::NamespaceOptions;
use crate::server::ServerConfig;

// ============================================================================
// SECTION: Statements
// ============================================================================

/// Quotes an identifier with backticks, doubling embedded backticks.
#[must_use]
pub fn quote_identifier(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}

/// Builds the create-database statement.
#[must_use]
pub fn create_database_sql(namespace: &Namespace, charset: &str, collation: &str) -> String {
    format!(
        "CREATE DATABASE {} CHARACTER SET {charset} COLLATE {collation}",
        quote_identifier(namespace.as_str())
    )
}

/// Builds the grant statement authorizing `username` from any host.
#[must_use]
pub fn grant_sql(namespace: &Namespace, username: &str) -> String {
    format!(
        "GRANT ALL PRIVILEGES ON {}.* TO {}@'%'",
        quote_identifier(namespace.as_str()),
        quote_identifier(username)
    )
}

/// Builds the drop-database statement.
#[must_use]
pub fn drop_database_sql(namespace: &Namespace) -> String {
    format!("DROP DATABASE {}", quote_identifier(namespace.as_str()))
}

// ============================================================================
// SECTION: Provisioner
// ============================================================================

/// Failed creation plus whether the namespace may exist on the server.
#[derive(Debug)]
pub(crate) struct CreateFailure {
    /// Error surfaced to the caller.
    pub(crate) error: IsolationError,
    /// True once `CREATE DATABASE` has succeeded.
    pub(crate) may_exist: bool,
}

impl CreateFailure {
    /// Failure before anything reached the server catalog.
    const fn clean(error: IsolationError) -> Self {
        Self {
            error,
            may_exist: false,
        }
    }

    /// Failure after the namespace was created.
    const fn dirty(error: IsolationError) -> Self {
        Self {
            error,
            may_exist: true,
        }
    }
}

/// Creates and drops namespaces over administrative connections.
#[derive(Clone)]
pub struct NamespaceProvisioner {
    /// Source of administrative connections.
    factory: ConnectionFactory,
    /// Character set and collation policy.
    options: NamespaceOptions,
    /// Receives connection close failures.
    diagnostics: Arc<dyn DiagnosticsSink>,
}

impl NamespaceProvisioner {
    /// Creates a provisioner.
    #[must_use]
    pub fn new(
        factory: ConnectionFactory,
        options: NamespaceOptions,
        diagnostics: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            factory,
            options,
            diagnostics,
        }
    }

    /// Creates `namespace` and grants the scoped user all privileges on it.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::Provisioning`] when connecting, creating, or
    /// granting fails, and [`IsolationError::Timeout`] when the deadline
    /// elapses between steps.
    pub fn create_namespace(
        &self,
        server: &ServerConfig,
        namespace: &Namespace,
        deadline: &Deadline,
    ) -> Result<(), IsolationError> {
        self.create_tracked(server, namespace, deadline).map_err(|failure| failure.error)
    }

    /// Creates `namespace`, reporting whether a failed attempt may have left it behind.
    pub(crate) fn create_tracked(
        &self,
        server: &ServerConfig,
        namespace: &Namespace,
        deadline: &Deadline,
    ) -> Result<(), CreateFailure> {
        deadline
            .check()
            .map_err(|err| CreateFailure::clean(IsolationError::deadline("create namespace", err)))?;
        let mut session = AdminSession::open(
            &self.factory,
            server,
            deadline,
            "create namespace",
            Arc::clone(&self.diagnostics),
        )
        .map_err(|err| {
            CreateFailure::clean(IsolationError::Provisioning(format!(
                "admin connection for {namespace}: {err}"
            )))
        })?;

        session.begin().map_err(|err| {
            CreateFailure::clean(IsolationError::Provisioning(format!(
                "begin unit of work for {namespace}: {err}"
            )))
        })?;
        let create = create_database_sql(namespace, &self.options.charset, &self.options.collation);
        if let Err(err) = session.execute(&create) {
            session.rollback_reporting();
            return Err(CreateFailure::clean(IsolationError::Provisioning(format!(
                "create {namespace}: {err}"
            ))));
        }
        // DDL is not transactional on every server: from here on the database may exist.
        if let Err(err) = deadline.check() {
            session.rollback_reporting();
            return Err(CreateFailure::dirty(IsolationError::deadline("create namespace", err)));
        }
        if let Err(err) = session.execute(&grant_sql(namespace, server.user().username())) {
            session.rollback_reporting();
            return Err(CreateFailure::dirty(IsolationError::Provisioning(format!(
                "grant on {namespace} to {} failed after create; namespace exists but is not \
                 usable: {err}",
                server.user().username()
            ))));
        }
        session.commit().map_err(|err| {
            CreateFailure::dirty(IsolationError::Provisioning(format!("commit {namespace}: {err}")))
        })?;
        session.close();
        Ok(())
    }

    /// Drops `namespace`; best effort.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::DropNamespace`] when the namespace could not be
    /// dropped. Callers log it and carry on.
    pub fn drop_namespace(
        &self,
        server: &ServerConfig,
        namespace: &Namespace,
        deadline: &Deadline,
    ) -> Result<(), CleanupError> {
        let failed = |reason: String| CleanupError::DropNamespace {
            namespace: namespace.as_str().to_string(),
            reason,
        };
        deadline.check().map_err(|err| failed(err.to_string()))?;
        let mut session = AdminSession::open(
            &self.factory,
            server,
            deadline,
            "drop namespace",
            Arc::clone(&self.diagnostics),
        )
        .map_err(|err| failed(err.to_string()))?;
        session.execute(&drop_database_sql(namespace)).map_err(|err| failed(err.to_string()))?;
        session.close();
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
