// crates/db-isolation-mariadb/src/launcher.rs
// ============================================================================
// Module: MariaDB Container Launcher
// Description: testcontainers-backed server launcher.
// Purpose: Boot one MariaDB container per campaign and expose its address.
// Dependencies: db-isolation-core, rand, testcontainers
// ============================================================================

//! ## Overview
//! The launcher generates the account password itself, assembles the full
//! container environment, and hands it to every launch observer before the
//! container is created. The image's `root` account receives the same
//! password as the non-administrative account unless the caller overrides it.
//!
//! Termination stops and removes the container on a worker thread so a
//! wedged container runtime cannot hold the caller past its deadline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;

use db_isolation_core::Deadline;
use db_isolation_core::LaunchError;
use db_isolation_core::LaunchObserver;
use db_isolation_core::LaunchOptions;
use db_isolation_core::LaunchRequest;
use db_isolation_core::ServerHandle;
use db_isolation_core::ServerLauncher;
use rand::Rng;
use rand::distributions::Alphanumeric;
use testcontainers::Container;
use testcontainers::ContainerRequest;
use testcontainers::GenericImage;
use testcontainers::ImageExt;
use testcontainers::core::IntoContainerPort;
use testcontainers::core::WaitFor;
use testcontainers::runners::SyncRunner;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Non-administrative account created at boot unless overridden.
pub const DEFAULT_USER: &str = "test";
/// Database created at boot unless overridden.
pub const DEFAULT_DATABASE: &str = "test";
/// Environment key naming the boot-time database.
pub const DATABASE_ENV: &str = "MARIADB_DATABASE";
/// Length of generated passwords.
const PASSWORD_LENGTH: usize = 24;
/// Log lines the server prints once it accepts network connections.
const READY_MESSAGES: [&str; 2] = ["mariadbd: ready for connections.", "port: 3306"];

// ============================================================================
// SECTION: Launcher
// ============================================================================

/// Starts MariaDB servers as containers.
#[derive(Debug, Clone)]
pub struct ContainerLauncher {
    /// Stderr lines awaited before the container counts as started.
    ready_messages: Vec<String>,
}

impl Default for ContainerLauncher {
    fn default() -> Self {
        Self {
            ready_messages: READY_MESSAGES.iter().map(ToString::to_string).collect(),
        }
    }
}

impl ContainerLauncher {
    /// Creates a launcher waiting for the stock MariaDB readiness lines.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the awaited readiness lines, for images that log differently.
    #[must_use]
    pub fn with_ready_messages(mut self, messages: Vec<String>) -> Self {
        self.ready_messages = messages;
        self
    }
}

impl ServerLauncher for ContainerLauncher {
    fn launch(
        &self,
        options: &LaunchOptions,
        observers: &[&dyn LaunchObserver],
        deadline: &Deadline,
    ) -> Result<Box<dyn ServerHandle>, LaunchError> {
        deadline.check().map_err(|err| LaunchError::Timeout(err.to_string()))?;
        let request = build_request(options, &generate_password());
        for observer in observers {
            observer.on_pre_create(&request)?;
        }

        let mut image = GenericImage::new(request.image.name.clone(), request.image.tag.clone())
            .with_exposed_port(request.protocol_port.tcp());
        for message in &self.ready_messages {
            image = image.with_wait_for(WaitFor::message_on_stderr(message.clone()));
        }
        let mut container: ContainerRequest<GenericImage> = image.into();
        for (key, value) in &request.env {
            container = container.with_env_var(key.clone(), value.clone());
        }
        if let Some(remaining) = deadline.remaining() {
            container = container.with_startup_timeout(remaining);
        }
        let started = container.start().map_err(|err| {
            if deadline.check().is_err() {
                LaunchError::Timeout(format!("{} did not start in time: {err}", request.image))
            } else {
                LaunchError::Launch(format!("failed to start {}: {err}", request.image))
            }
        })?;
        Ok(Box::new(ContainerHandle {
            container: Mutex::new(Some(started)),
        }))
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Running MariaDB container.
pub struct ContainerHandle {
    /// Container; `None` once terminated.
    container: Mutex<Option<Container<GenericImage>>>,
}

impl ContainerHandle {
    /// Runs `read` against the live container.
    fn with_container<T>(
        &self,
        read: impl FnOnce(&Container<GenericImage>) -> Result<T, LaunchError>,
    ) -> Result<T, LaunchError> {
        let guard = self
            .container
            .lock()
            .map_err(|_| LaunchError::Resolve("container handle poisoned".to_string()))?;
        let container = guard
            .as_ref()
            .ok_or_else(|| LaunchError::Resolve("container already terminated".to_string()))?;
        read(container)
    }
}

impl ServerHandle for ContainerHandle {
    fn host(&self) -> Result<String, LaunchError> {
        self.with_container(|container| {
            container
                .get_host()
                .map(|host| host.to_string())
                .map_err(|err| LaunchError::Resolve(format!("failed to resolve host: {err}")))
        })
    }

    fn mapped_port(&self, protocol_port: u16) -> Result<u16, LaunchError> {
        self.with_container(|container| {
            container.get_host_port_ipv4(protocol_port.tcp()).map_err(|err| {
                LaunchError::Resolve(format!("failed to resolve port {protocol_port}: {err}"))
            })
        })
    }

    fn terminate(&self, deadline: &Deadline) -> Result<(), LaunchError> {
        let container = self
            .container
            .lock()
            .map_err(|_| LaunchError::Terminate("container handle poisoned".to_string()))?
            .take();
        let Some(container) = container else {
            return Ok(());
        };
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stopped = container.stop().map_err(|err| err.to_string());
            let removed = container.rm().map_err(|err| err.to_string());
            let _ = tx.send(stopped.and(removed));
        });
        let outcome = match deadline.remaining() {
            Some(remaining) => rx.recv_timeout(remaining).map_err(|_| {
                LaunchError::Timeout("container did not stop before the deadline".to_string())
            })?,
            None => rx
                .recv()
                .map_err(|_| LaunchError::Terminate("termination worker vanished".to_string()))?,
        };
        outcome.map_err(LaunchError::Terminate)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Generates a random alphanumeric password.
pub(crate) fn generate_password() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(PASSWORD_LENGTH).map(char::from).collect()
}

/// Assembles the container environment the observers will see.
pub(crate) fn build_request(options: &LaunchOptions, password: &str) -> LaunchRequest {
    let keys = &options.credential_keys;
    let mut env = BTreeMap::from([
        (keys.user_env.clone(), DEFAULT_USER.to_string()),
        (keys.user_password_env.clone(), password.to_string()),
        (DATABASE_ENV.to_string(), DEFAULT_DATABASE.to_string()),
    ]);
    env.extend(options.env.clone());
    let user_password = env.get(&keys.user_password_env).cloned().unwrap_or_default();
    env.entry(keys.admin_password_env.clone()).or_insert(user_password);
    LaunchRequest {
        image: options.image.clone(),
        protocol_port: options.protocol_port,
        env,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
