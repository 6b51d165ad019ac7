// crates/db-isolation-core/src/manager.rs
// ============================================================================
// Module: Isolation Manager
// Description: Campaign-wide server ownership and per-test namespace slots.
// Purpose: Hand each test a fresh namespace and a guaranteed cleanup path.
// Dependencies: crate::{capture, connection, provisioner, diagnostics}
// ============================================================================

//! ## Overview
//! A campaign starts one server and shares its [`ServerConfig`] read-only.
//! Each test drives its own [`IsolationManager`] (see
//! [`IsolationManager::sibling`]) through the slot state machine:
//!
//! ```text
//! Empty --create_database--> Provisioned --remove_database--> Empty
//! Empty --create fails after CREATE was sent--> Failed --remove_database--> Empty
//! ```
//!
//! `connect` is only valid while provisioned. Creating while a namespace is
//! still recorded is rejected rather than silently replacing it. Cleanup
//! failures are reported to the diagnostics sink and never returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use crate::capture::CredentialCapture;
use crate::connection::ConnectionFactory;
use crate::deadline::Deadline;
use crate::diagnostics::DiagnosticsSink;
use crate::diagnostics::EventOutcome;
use crate::diagnostics::LifecycleEvent;
use crate::error::CleanupError;
use crate::error::IsolationError;
use crate::interfaces::Connection;
use crate::interfaces::DriverError;
use crate::interfaces::LaunchError;
use crate::interfaces::LaunchObserver;
use crate::interfaces::LaunchOptions;
use crate::interfaces::ServerHandle;
use crate::interfaces::ServerLauncher;
use crate::namespace::Namespace;
use crate::options::ManagerOptions;
use crate::options::TimeoutPolicy;
use crate::provisioner::NamespaceProvisioner;
use crate::server::ServerConfig;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Pause between readiness probes while the server boots.
const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(250);

// ============================================================================
// SECTION: Types
// ============================================================================

/// Public view of a manager's namespace slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceState {
    /// No namespace recorded.
    Empty,
    /// A fully provisioned namespace is recorded.
    Provisioned,
    /// Provisioning failed after the namespace may have been created.
    Failed,
}

/// Namespace slot owned by one manager.
#[derive(Debug)]
enum Slot {
    /// No namespace recorded.
    Empty,
    /// Namespace created and granted.
    Provisioned(Namespace),
    /// Namespace possibly created but not usable.
    Failed(Namespace),
}

/// State shared by every manager multiplexing onto one server.
struct Campaign {
    /// Address and accounts of the shared server.
    server: ServerConfig,
    /// Launcher handle; `None` when attached or already stopped.
    handle: Mutex<Option<Box<dyn ServerHandle>>>,
    /// Source of scoped connections.
    factory: ConnectionFactory,
    /// Creates and drops namespaces.
    provisioner: NamespaceProvisioner,
    /// Destination for events and cleanup failures.
    diagnostics: Arc<dyn DiagnosticsSink>,
    /// Operation time bounds.
    timeouts: TimeoutPolicy,
    /// Prefix for generated namespace names.
    prefix: String,
}

impl Campaign {
    /// Terminates the server if this campaign still owns it.
    fn terminate(&self, deadline: &Deadline) {
        let handle = match self.handle.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(handle) = handle else {
            return;
        };
        let deadline = deadline.tighten(self.timeouts.shutdown);
        match handle.terminate(&deadline) {
            Ok(()) => self.diagnostics.record(
                &LifecycleEvent::new("server_stopped", EventOutcome::Ok)
                    .with_detail(self.server.address()),
            ),
            Err(err) => {
                self.diagnostics.record_cleanup(&CleanupError::Terminate(err.to_string()));
                self.diagnostics.record(
                    &LifecycleEvent::new("server_stopped", EventOutcome::Error)
                        .with_detail(err.to_string()),
                );
            }
        }
    }
}

impl Drop for Campaign {
    fn drop(&mut self) {
        self.terminate(&Deadline::none());
    }
}

/// Per-test orchestrator over a shared database server.
///
/// # Invariants
/// - At most one namespace is recorded at a time.
/// - Only the manager that created a namespace removes it.
pub struct IsolationManager {
    /// Shared server and collaborators.
    campaign: Arc<Campaign>,
    /// This manager's namespace slot.
    slot: Slot,
}

// ============================================================================
// SECTION: Campaign Lifecycle
// ============================================================================

impl IsolationManager {
    /// Launches the shared server and returns the first manager of the campaign.
    ///
    /// Credentials are captured from the launcher's pre-create notification,
    /// the host and mapped port are resolved, and the call returns once an
    /// administrative connection succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::Startup`] when launch, credential capture, or
    /// address resolution fails and [`IsolationError::StartupTimeout`] when
    /// the server is not ready within the startup timeout. A launched server
    /// is terminated before either error is returned.
    pub fn start(
        launcher: &dyn ServerLauncher,
        launch: &LaunchOptions,
        options: ManagerOptions,
        deadline: &Deadline,
    ) -> Result<Self, IsolationError> {
        let deadline = deadline.tighten(options.timeouts.startup);
        let capture = CredentialCapture::new(launch.credential_keys.clone());
        let observers: [&dyn LaunchObserver; 1] = [&capture];
        let handle = launcher.launch(launch, &observers, &deadline).map_err(startup_error)?;

        let factory = ConnectionFactory::new(Arc::clone(&options.driver));
        let ready = resolve_server(handle.as_ref(), &capture, launch.protocol_port).and_then(
            |server| {
                wait_until_ready(&factory, &server, &deadline, options.diagnostics.as_ref())
                    .map(|()| server)
            },
        );
        let server = match ready {
            Ok(server) => server,
            Err(err) => {
                if let Err(term) = handle.terminate(&Deadline::after(options.timeouts.shutdown)) {
                    options.diagnostics.record_cleanup(&CleanupError::Terminate(term.to_string()));
                }
                return Err(err);
            }
        };
        options.diagnostics.record(
            &LifecycleEvent::new("server_started", EventOutcome::Ok)
                .with_detail(format!("{}:{} ({})", server.address(), server.port(), launch.image)),
        );
        Ok(Self::assemble(server, Some(handle), options))
    }

    /// Multiplexes onto an already running server that this campaign does not own.
    ///
    /// [`IsolationManager::stop`] is a no-op for attached campaigns.
    #[must_use]
    pub fn attach(server: ServerConfig, options: ManagerOptions) -> Self {
        Self::assemble(server, None, options)
    }

    /// Builds the campaign and its first manager.
    fn assemble(
        server: ServerConfig,
        handle: Option<Box<dyn ServerHandle>>,
        options: ManagerOptions,
    ) -> Self {
        let factory = ConnectionFactory::new(options.driver);
        let provisioner = NamespaceProvisioner::new(
            factory.clone(),
            options.namespace.clone(),
            Arc::clone(&options.diagnostics),
        );
        let campaign = Campaign {
            server,
            handle: Mutex::new(handle),
            factory,
            provisioner,
            diagnostics: options.diagnostics,
            timeouts: options.timeouts,
            prefix: options.namespace.prefix,
        };
        Self {
            campaign: Arc::new(campaign),
            slot: Slot::Empty,
        }
    }

    /// Returns a new manager with an empty slot on the same server.
    #[must_use]
    pub fn sibling(&self) -> Self {
        Self {
            campaign: Arc::clone(&self.campaign),
            slot: Slot::Empty,
        }
    }

    /// Terminates the shared server, bounded by the shutdown timeout.
    ///
    /// Failures are reported to diagnostics. Later calls are no-ops.
    pub fn stop(&self, deadline: &Deadline) {
        self.campaign.terminate(deadline);
    }

    /// Returns the shared server configuration.
    #[must_use]
    pub fn server(&self) -> &ServerConfig {
        &self.campaign.server
    }

    /// Returns the provisioned namespace, if any.
    #[must_use]
    pub const fn namespace(&self) -> Option<&Namespace> {
        match &self.slot {
            Slot::Provisioned(namespace) => Some(namespace),
            Slot::Empty | Slot::Failed(_) => None,
        }
    }

    /// Returns the slot state.
    #[must_use]
    pub const fn state(&self) -> NamespaceState {
        match self.slot {
            Slot::Empty => NamespaceState::Empty,
            Slot::Provisioned(_) => NamespaceState::Provisioned,
            Slot::Failed(_) => NamespaceState::Failed,
        }
    }
}

// ============================================================================
// SECTION: Namespace Lifecycle
// ============================================================================

impl IsolationManager {
    /// Mints, creates, and grants a fresh namespace for this test.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::State`] unless the slot is empty,
    /// [`IsolationError::Provisioning`] when creation or grant fails, and
    /// [`IsolationError::Timeout`] when the provisioning timeout elapses.
    pub fn create_database(&mut self, deadline: &Deadline) -> Result<Namespace, IsolationError> {
        match &self.slot {
            Slot::Empty => {}
            Slot::Provisioned(namespace) => {
                return Err(IsolationError::State(format!(
                    "namespace {namespace} is still provisioned; remove it before creating another"
                )));
            }
            Slot::Failed(namespace) => {
                return Err(IsolationError::State(format!(
                    "namespace {namespace} failed provisioning; remove it before creating another"
                )));
            }
        }
        let campaign = &self.campaign;
        let deadline = deadline.tighten(campaign.timeouts.provision);
        let namespace = Namespace::generate(&campaign.prefix)
            .map_err(|err| IsolationError::Provisioning(err.to_string()))?;

        match campaign.provisioner.create_tracked(&campaign.server, &namespace, &deadline) {
            Ok(()) => {
                campaign.diagnostics.record(
                    &LifecycleEvent::new("namespace_created", EventOutcome::Ok)
                        .with_namespace(namespace.as_str()),
                );
                self.slot = Slot::Provisioned(namespace.clone());
                Ok(namespace)
            }
            Err(failure) => {
                campaign.diagnostics.record(
                    &LifecycleEvent::new("namespace_create_failed", EventOutcome::Error)
                        .with_namespace(namespace.as_str())
                        .with_detail(failure.error.to_string()),
                );
                if failure.may_exist {
                    self.slot = Slot::Failed(namespace);
                }
                Err(failure.error)
            }
        }
    }

    /// Drops the recorded namespace; no-op when the slot is empty.
    ///
    /// Failures are reported to diagnostics and the slot is cleared either way.
    pub fn remove_database(&mut self, deadline: &Deadline) {
        let namespace = match std::mem::replace(&mut self.slot, Slot::Empty) {
            Slot::Empty => return,
            Slot::Provisioned(namespace) | Slot::Failed(namespace) => namespace,
        };
        let campaign = &self.campaign;
        let deadline = deadline.tighten(campaign.timeouts.remove);
        match campaign.provisioner.drop_namespace(&campaign.server, &namespace, &deadline) {
            Ok(()) => campaign.diagnostics.record(
                &LifecycleEvent::new("namespace_removed", EventOutcome::Ok)
                    .with_namespace(namespace.as_str()),
            ),
            Err(err) => {
                campaign.diagnostics.record_cleanup(&err);
                campaign.diagnostics.record(
                    &LifecycleEvent::new("namespace_removed", EventOutcome::Error)
                        .with_namespace(namespace.as_str())
                        .with_detail(err.to_string()),
                );
            }
        }
    }

    /// Opens a connection scoped to the provisioned namespace.
    ///
    /// # Errors
    ///
    /// Returns [`IsolationError::State`] unless a namespace is provisioned,
    /// [`IsolationError::Timeout`] when the deadline has passed, and
    /// [`IsolationError::Connection`] when the driver refuses the connection.
    pub fn connect(&self, deadline: &Deadline) -> Result<Connection, IsolationError> {
        let Slot::Provisioned(namespace) = &self.slot else {
            return Err(IsolationError::State(
                "connect requires a provisioned namespace; call create_database first".to_string(),
            ));
        };
        let campaign = &self.campaign;
        let deadline = deadline.tighten(campaign.timeouts.connect);
        deadline.check().map_err(|err| IsolationError::deadline("connect", err))?;
        campaign
            .factory
            .scoped_connection(&campaign.server, namespace, &deadline)
            .map_err(IsolationError::Connection)
    }
}

impl Drop for IsolationManager {
    fn drop(&mut self) {
        self.remove_database(&Deadline::none());
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps launcher failures onto startup errors.
fn startup_error(err: LaunchError) -> IsolationError {
    match err {
        LaunchError::Timeout(reason) => IsolationError::StartupTimeout(reason),
        other => IsolationError::Startup(other.to_string()),
    }
}

/// Builds the server configuration from captured accounts and the handle.
fn resolve_server(
    handle: &dyn ServerHandle,
    capture: &CredentialCapture,
    protocol_port: u16,
) -> Result<ServerConfig, IsolationError> {
    let accounts = capture.take().map_err(startup_error)?;
    let host = handle.host().map_err(startup_error)?;
    let port = handle.mapped_port(protocol_port).map_err(startup_error)?;
    Ok(ServerConfig::new(host, port, accounts.admin, accounts.user))
}

/// Polls with administrative connections until the server accepts one.
fn wait_until_ready(
    factory: &ConnectionFactory,
    server: &ServerConfig,
    deadline: &Deadline,
    diagnostics: &dyn DiagnosticsSink,
) -> Result<(), IsolationError> {
    let mut last_error = "no connection attempted".to_string();
    loop {
        if let Err(err) = deadline.check() {
            return Err(IsolationError::StartupTimeout(format!(
                "server not ready ({err}): {last_error}"
            )));
        }
        match factory.admin_connection(server, deadline) {
            Ok(conn) => {
                if let Err(err) = conn.close() {
                    diagnostics.record_cleanup(&CleanupError::CloseConnection {
                        purpose: "readiness probe".to_string(),
                        reason: err.to_string(),
                    });
                }
                return Ok(());
            }
            Err(DriverError::AccessDenied(reason)) => {
                return Err(IsolationError::Startup(format!(
                    "captured admin credentials rejected: {reason}"
                )));
            }
            Err(err) => last_error = err.to_string(),
        }
        let pause = deadline.remaining().map_or(READINESS_POLL_INTERVAL, |left| {
            left.min(READINESS_POLL_INTERVAL)
        });
        std::thread::sleep(pause);
    }
}
