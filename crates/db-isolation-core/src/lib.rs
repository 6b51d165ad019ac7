// crates/db-isolation-core/src/lib.rs
// ============================================================================
// Module: DB Isolation Core Library
// Description: Public API surface for per-test database isolation.
// Purpose: Expose the manager, provisioner, and collaborator interfaces.
// Dependencies: crate::{manager, provisioner, connection, interfaces}
// ============================================================================

//! ## Overview
//! One database server is shared by a whole test campaign; each test gets a
//! freshly named logical database (a namespace) and connections that can
//! only see that namespace. The core owns naming, provisioning, scoping, and
//! cleanup. Container runtimes and wire drivers plug in through
//! [`ServerLauncher`] and [`SqlDriver`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod capture;
pub mod connection;
pub mod deadline;
pub mod diagnostics;
pub mod dsn;
pub mod error;
pub mod interfaces;
pub mod manager;
pub mod namespace;
pub mod options;
pub mod provisioner;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use capture::CapturedAccounts;
pub use capture::CredentialCapture;
pub use connection::ConnectionFactory;
pub use deadline::CancelToken;
pub use deadline::Deadline;
pub use deadline::DeadlineError;
pub use diagnostics::DiagnosticsSink;
pub use diagnostics::EventOutcome;
pub use diagnostics::FileDiagnosticsSink;
pub use diagnostics::LifecycleEvent;
pub use diagnostics::MemoryDiagnosticsSink;
pub use diagnostics::NoopDiagnosticsSink;
pub use diagnostics::StderrDiagnosticsSink;
pub use dsn::Dsn;
pub use dsn::DsnError;
pub use error::CleanupError;
pub use error::IsolationError;
pub use interfaces::Connection;
pub use interfaces::CredentialKeys;
pub use interfaces::DriverError;
pub use interfaces::ImageSpec;
pub use interfaces::LaunchError;
pub use interfaces::LaunchObserver;
pub use interfaces::LaunchOptions;
pub use interfaces::LaunchRequest;
pub use interfaces::Row;
pub use interfaces::ServerHandle;
pub use interfaces::ServerLauncher;
pub use interfaces::SqlConnection;
pub use interfaces::SqlDriver;
pub use manager::IsolationManager;
pub use manager::NamespaceState;
pub use namespace::Namespace;
pub use namespace::NamespaceNameError;
pub use options::ManagerOptions;
pub use options::NamespaceOptions;
pub use options::TimeoutPolicy;
pub use provisioner::NamespaceProvisioner;
pub use server::Credentials;
pub use server::ServerConfig;
