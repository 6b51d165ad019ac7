// crates/db-isolation-core/src/interfaces.rs
// ============================================================================
// Module: Collaborator Interfaces
// Description: Server launcher and SQL driver contracts.
// Purpose: Keep container runtimes and client drivers outside the core.
// Dependencies: crate::{deadline, dsn}
// ============================================================================

//! ## Overview
//! The isolation core never starts processes or speaks a wire protocol
//! itself. A [`ServerLauncher`] produces a running server behind a
//! [`ServerHandle`]; a [`SqlDriver`] opens [`SqlConnection`]s from a
//! [`Dsn`]. Launch observers are the only channel through which generated
//! server credentials become visible.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::deadline::Deadline;
use crate::dsn::Dsn;

// ============================================================================
// SECTION: Server Launcher
// ============================================================================

/// Container image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    /// Image repository name.
    pub name: String,
    /// Image tag.
    pub tag: String,
}

impl ImageSpec {
    /// Builds an image reference.
    #[must_use]
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Environment keys carrying the accounts a launcher generates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialKeys {
    /// Administrative username; fixed by the server image rather than generated.
    pub admin_username: String,
    /// Environment key holding the administrative password.
    pub admin_password_env: String,
    /// Environment key holding the non-administrative username.
    pub user_env: String,
    /// Environment key holding the non-administrative password.
    pub user_password_env: String,
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self {
            admin_username: "root".to_string(),
            admin_password_env: "MARIADB_ROOT_PASSWORD".to_string(),
            user_env: "MARIADB_USER".to_string(),
            user_password_env: "MARIADB_PASSWORD".to_string(),
        }
    }
}

/// Caller-provided launch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Server image.
    pub image: ImageSpec,
    /// Container-side protocol port to expose.
    pub protocol_port: u16,
    /// Environment overrides applied on top of launcher defaults.
    pub env: BTreeMap<String, String>,
    /// Where the generated accounts appear in the launch environment.
    pub credential_keys: CredentialKeys,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            image: ImageSpec::new("mariadb", "11.4"),
            protocol_port: 3306,
            env: BTreeMap::new(),
            credential_keys: CredentialKeys::default(),
        }
    }
}

/// Fully resolved request a launcher is about to create.
#[derive(Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Server image.
    pub image: ImageSpec,
    /// Container-side protocol port.
    pub protocol_port: u16,
    /// Final environment, including generated credentials.
    pub env: BTreeMap<String, String>,
}

impl fmt::Debug for LaunchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchRequest")
            .field("image", &self.image)
            .field("protocol_port", &self.protocol_port)
            .field("env_keys", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Launcher errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// The server could not be created or started.
    #[error("launch failed: {0}")]
    Launch(String),
    /// Host or port of a started server could not be resolved.
    #[error("address resolution failed: {0}")]
    Resolve(String),
    /// A launch observer rejected the request.
    #[error("launch observer failed: {0}")]
    Observer(String),
    /// Termination failed.
    #[error("terminate failed: {0}")]
    Terminate(String),
    /// The deadline elapsed or the caller cancelled.
    #[error("launcher timed out: {0}")]
    Timeout(String),
}

/// Observer notified during server startup.
pub trait LaunchObserver: Send + Sync {
    /// Called with the final request before the server is created.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] to abort the launch.
    fn on_pre_create(&self, request: &LaunchRequest) -> Result<(), LaunchError>;
}

/// Running database server.
pub trait ServerHandle: Send + Sync {
    /// Returns the externally reachable host.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Resolve`] when the host cannot be determined.
    fn host(&self) -> Result<String, LaunchError>;

    /// Returns the host port mapped to `protocol_port`.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Resolve`] when the port is not mapped.
    fn mapped_port(&self, protocol_port: u16) -> Result<u16, LaunchError>;

    /// Terminates the server.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when termination fails or exceeds the deadline.
    fn terminate(&self, deadline: &Deadline) -> Result<(), LaunchError>;
}

/// Starts database servers.
pub trait ServerLauncher: Send + Sync {
    /// Launches a server, notifying `observers` before creation.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the server cannot be started in time.
    fn launch(
        &self,
        options: &LaunchOptions,
        observers: &[&dyn LaunchObserver],
        deadline: &Deadline,
    ) -> Result<Box<dyn ServerHandle>, LaunchError>;
}

// ============================================================================
// SECTION: SQL Driver
// ============================================================================

/// Result row with text-rendered cells; `None` is SQL NULL.
pub type Row = Vec<Option<String>>;

/// Driver errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Network or protocol failure while connecting.
    #[error("connect failed: {0}")]
    Connect(String),
    /// Authentication or authorization was refused.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// The requested default database does not exist.
    #[error("unknown database: {0}")]
    UnknownDatabase(String),
    /// A statement failed.
    #[error("statement failed: {0}")]
    Statement(String),
    /// Closing the connection failed.
    #[error("close failed: {0}")]
    Close(String),
}

/// Open client connection.
pub trait SqlConnection: Send {
    /// Executes a statement, discarding any result set.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] when the server rejects the statement.
    fn execute(&mut self, statement: &str) -> Result<(), DriverError>;

    /// Executes a query and returns its rows.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Statement`] when the server rejects the query.
    fn query(&mut self, statement: &str) -> Result<Vec<Row>, DriverError>;

    /// Opens a unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the transaction cannot start.
    fn begin(&mut self) -> Result<(), DriverError>;

    /// Commits the open unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the commit fails.
    fn commit(&mut self) -> Result<(), DriverError>;

    /// Rolls back the open unit of work.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the rollback fails.
    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Closes the connection.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Close`] when the server did not acknowledge the close.
    fn close(self: Box<Self>) -> Result<(), DriverError>;
}

/// Owned connection handed to callers.
pub type Connection = Box<dyn SqlConnection>;

/// Opens client connections.
pub trait SqlDriver: Send + Sync {
    /// Connects using `dsn`, bounded by `deadline`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError`] when the connection cannot be established.
    fn connect(&self, dsn: &Dsn, deadline: &Deadline) -> Result<Connection, DriverError>;
}
