// crates/db-isolation-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Utilities
// Description: In-memory server, driver, and launcher fakes.
// Purpose: Exercise the isolation lifecycle without a container runtime.
// Dependencies: db-isolation-core
// ============================================================================

//! ## Overview
//! [`FakeServer`] models just enough of a MariaDB server for lifecycle tests:
//! databases holding tables of text rows, per-user grants, open-connection
//! counters, and injectable faults. [`FakeDriver`] authenticates against it
//! with the same rules the real server applies to scoped users, and
//! [`FakeLauncher`] hands out a handle while reporting the generated accounts
//! through launch observers.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only helpers; not every test binary uses every helper."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use db_isolation_core::Connection;
use db_isolation_core::Credentials;
use db_isolation_core::Deadline;
use db_isolation_core::DriverError;
use db_isolation_core::Dsn;
use db_isolation_core::LaunchError;
use db_isolation_core::LaunchObserver;
use db_isolation_core::LaunchOptions;
use db_isolation_core::LaunchRequest;
use db_isolation_core::ManagerOptions;
use db_isolation_core::MemoryDiagnosticsSink;
use db_isolation_core::Row;
use db_isolation_core::ServerConfig;
use db_isolation_core::ServerHandle;
use db_isolation_core::ServerLauncher;
use db_isolation_core::SqlConnection;
use db_isolation_core::SqlDriver;
use db_isolation_core::TimeoutPolicy;

// ============================================================================
// SECTION: Accounts
// ============================================================================

/// Administrative username.
pub const ADMIN_USER: &str = "root";
/// Administrative password.
pub const ADMIN_PASSWORD: &str = "root-secret";
/// Scoped username.
pub const APP_USER: &str = "test";
/// Scoped password.
pub const APP_PASSWORD: &str = "user-secret";
/// Host reported by fake handles.
pub const FAKE_HOST: &str = "127.0.0.1";
/// Mapped port reported by fake handles.
pub const FAKE_PORT: u16 = 49_153;

/// Server configuration matching the fake accounts.
pub fn fake_server_config() -> ServerConfig {
    ServerConfig::new(
        FAKE_HOST,
        FAKE_PORT,
        Credentials::new(ADMIN_USER, ADMIN_PASSWORD),
        Credentials::new(APP_USER, APP_PASSWORD),
    )
}

// ============================================================================
// SECTION: Fake Server
// ============================================================================

/// Faults injected into the fake server.
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// Refuse this many connection attempts before accepting.
    pub refuse_connects: usize,
    /// Fail every `CREATE DATABASE`.
    pub fail_create: bool,
    /// Fail every `GRANT`.
    pub fail_grant: bool,
    /// Fail every `DROP DATABASE`.
    pub fail_drop: bool,
    /// Fail every connection close.
    pub fail_close: bool,
    /// Fail every rollback.
    pub fail_rollback: bool,
}

/// Mutable server contents.
#[derive(Debug, Default)]
struct ServerState {
    /// Database name to table name to rows.
    databases: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// `(database, user)` grants; kept across drops like the real server.
    grants: BTreeSet<(String, String)>,
    /// Open administrative connections.
    open_admin: usize,
    /// Open scoped connections.
    open_scoped: usize,
    /// Every statement received, in order.
    statements: Vec<String>,
    /// Active faults.
    faults: Faults,
}

/// In-memory stand-in for a database server.
#[derive(Debug, Default)]
pub struct FakeServer {
    /// Server contents.
    state: Mutex<ServerState>,
}

impl FakeServer {
    /// Creates an empty server.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Locks the server state.
    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("fake server state")
    }

    /// Adjusts injected faults.
    pub fn inject(&self, apply: impl FnOnce(&mut Faults)) {
        apply(&mut self.state().faults);
    }

    /// Returns true when `name` exists.
    pub fn has_database(&self, name: &str) -> bool {
        self.state().databases.contains_key(name)
    }

    /// Returns true when `user` holds a grant on `database`.
    pub fn is_granted(&self, database: &str, user: &str) -> bool {
        self.state().grants.contains(&(database.to_string(), user.to_string()))
    }

    /// Returns the number of databases.
    pub fn database_count(&self) -> usize {
        self.state().databases.len()
    }

    /// Returns the number of open administrative connections.
    pub fn open_admin_connections(&self) -> usize {
        self.state().open_admin
    }

    /// Returns the number of open scoped connections.
    pub fn open_scoped_connections(&self) -> usize {
        self.state().open_scoped
    }

    /// Returns every statement received so far.
    pub fn statements(&self) -> Vec<String> {
        self.state().statements.clone()
    }

    /// Authenticates a connection request.
    fn connect(self: &Arc<Self>, dsn: &Dsn) -> Result<FakeConnection, DriverError> {
        let mut state = self.state();
        if state.faults.refuse_connects > 0 {
            state.faults.refuse_connects -= 1;
            return Err(DriverError::Connect("connection refused".to_string()));
        }
        let username = dsn.credentials.username();
        let password = dsn.credentials.password();
        let admin = match (username, password) {
            (ADMIN_USER, ADMIN_PASSWORD) => true,
            (APP_USER, APP_PASSWORD) => false,
            _ => {
                return Err(DriverError::AccessDenied(format!(
                    "Access denied for user '{username}'@'%'"
                )));
            }
        };
        if let Some(database) = &dsn.database {
            if !admin && !state.grants.contains(&(database.clone(), username.to_string())) {
                return Err(DriverError::AccessDenied(format!(
                    "Access denied for user '{username}'@'%' to database '{database}'"
                )));
            }
            if !state.databases.contains_key(database) {
                return Err(DriverError::UnknownDatabase(format!(
                    "Unknown database '{database}'"
                )));
            }
        }
        if admin {
            state.open_admin += 1;
        } else {
            state.open_scoped += 1;
        }
        Ok(FakeConnection {
            server: Arc::clone(self),
            admin,
            database: dsn.database.clone(),
        })
    }

    /// Applies one statement.
    fn execute(
        &self,
        admin: bool,
        database: Option<&str>,
        statement: &str,
    ) -> Result<(), DriverError> {
        let mut state = self.state();
        state.statements.push(statement.to_string());
        if let Some(rest) = statement.strip_prefix("CREATE DATABASE ") {
            require_admin(admin)?;
            if state.faults.fail_create {
                return Err(DriverError::Statement("injected create failure".to_string()));
            }
            let name = unquote(rest.split_whitespace().next().unwrap_or_default());
            if state.databases.contains_key(&name) {
                return Err(DriverError::Statement(format!("database {name} exists")));
            }
            state.databases.insert(name, BTreeMap::new());
            return Ok(());
        }
        if let Some(rest) = statement.strip_prefix("GRANT ALL PRIVILEGES ON ") {
            require_admin(admin)?;
            if state.faults.fail_grant {
                return Err(DriverError::Statement("injected grant failure".to_string()));
            }
            let (target, grantee) = rest
                .split_once(" TO ")
                .ok_or_else(|| DriverError::Statement("malformed grant".to_string()))?;
            let database = unquote(target.trim_end_matches(".*"));
            let user = unquote(grantee.split('@').next().unwrap_or_default());
            state.grants.insert((database, user));
            return Ok(());
        }
        if let Some(rest) = statement.strip_prefix("DROP DATABASE ") {
            require_admin(admin)?;
            if state.faults.fail_drop {
                return Err(DriverError::Statement("injected drop failure".to_string()));
            }
            let name = unquote(rest.trim());
            if state.databases.remove(&name).is_none() {
                return Err(DriverError::Statement(format!(
                    "Can't drop database '{name}'; database doesn't exist"
                )));
            }
            return Ok(());
        }
        let database =
            database.ok_or_else(|| DriverError::Statement("No database selected".to_string()))?;
        let tables = state
            .databases
            .get_mut(database)
            .ok_or_else(|| DriverError::UnknownDatabase(database.to_string()))?;
        if let Some(rest) = statement.strip_prefix("CREATE TABLE ") {
            let name = rest.split(['(', ' ']).next().unwrap_or_default().to_string();
            tables.insert(name, Vec::new());
            return Ok(());
        }
        if let Some(rest) = statement.strip_prefix("INSERT INTO ") {
            let name = rest.split_whitespace().next().unwrap_or_default();
            let value = rest
                .split_once('(')
                .and_then(|(_, tail)| tail.rsplit_once(')'))
                .map(|(value, _)| value.trim().trim_matches('\'').to_string())
                .ok_or_else(|| DriverError::Statement("malformed insert".to_string()))?;
            tables
                .get_mut(name)
                .ok_or_else(|| DriverError::Statement(format!("Table '{name}' doesn't exist")))?
                .push(value);
            return Ok(());
        }
        Err(DriverError::Statement(format!("unsupported statement: {statement}")))
    }

    /// Answers one query.
    fn query(&self, database: Option<&str>, statement: &str) -> Result<Vec<Row>, DriverError> {
        let mut state = self.state();
        state.statements.push(statement.to_string());
        if statement == "SELECT 1" {
            return Ok(vec![vec![Some("1".to_string())]]);
        }
        let Some(name) = statement.strip_prefix("SELECT * FROM ") else {
            return Err(DriverError::Statement(format!("unsupported query: {statement}")));
        };
        let database =
            database.ok_or_else(|| DriverError::Statement("No database selected".to_string()))?;
        let rows = state
            .databases
            .get(database)
            .and_then(|tables| tables.get(name.trim()))
            .ok_or_else(|| DriverError::Statement(format!("Table '{name}' doesn't exist")))?;
        Ok(rows.iter().map(|value| vec![Some(value.clone())]).collect())
    }

    /// Logs a transaction control statement.
    fn log(&self, statement: &str) {
        self.state().statements.push(statement.to_string());
    }
}

/// Rejects administrative statements from scoped users.
fn require_admin(admin: bool) -> Result<(), DriverError> {
    if admin {
        Ok(())
    } else {
        Err(DriverError::AccessDenied("administrative statement from scoped user".to_string()))
    }
}

/// Strips backtick quoting.
fn unquote(value: &str) -> String {
    value.trim().trim_matches('`').replace("``", "`")
}

// ============================================================================
// SECTION: Fake Driver
// ============================================================================

/// Connection to the fake server.
pub struct FakeConnection {
    /// Owning server.
    server: Arc<FakeServer>,
    /// True for administrative sessions.
    admin: bool,
    /// Default database.
    database: Option<String>,
}

impl SqlConnection for FakeConnection {
    fn execute(&mut self, statement: &str) -> Result<(), DriverError> {
        self.server.execute(self.admin, self.database.as_deref(), statement)
    }

    fn query(&mut self, statement: &str) -> Result<Vec<Row>, DriverError> {
        self.server.query(self.database.as_deref(), statement)
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.server.log("START TRANSACTION");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.server.log("COMMIT");
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.server.log("ROLLBACK");
        if self.server.state().faults.fail_rollback {
            return Err(DriverError::Statement("injected rollback failure".to_string()));
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        let fail = self.server.state().faults.fail_close;
        if fail {
            return Err(DriverError::Close("injected close failure".to_string()));
        }
        Ok(())
    }
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        let mut state = self.server.state();
        if self.admin {
            state.open_admin -= 1;
        } else {
            state.open_scoped -= 1;
        }
    }
}

/// Driver connecting to a [`FakeServer`].
pub struct FakeDriver {
    /// Target server.
    server: Arc<FakeServer>,
}

impl FakeDriver {
    /// Creates a driver for `server`.
    pub fn new(server: &Arc<FakeServer>) -> Arc<Self> {
        Arc::new(Self {
            server: Arc::clone(server),
        })
    }
}

impl SqlDriver for FakeDriver {
    fn connect(&self, dsn: &Dsn, deadline: &Deadline) -> Result<Connection, DriverError> {
        deadline.check().map_err(|err| DriverError::Connect(err.to_string()))?;
        Ok(Box::new(self.server.connect(dsn)?))
    }
}

// ============================================================================
// SECTION: Fake Launcher
// ============================================================================

/// Launcher behavior switches.
#[derive(Debug, Default, Clone)]
pub struct LaunchBehavior {
    /// Fail before notifying observers.
    pub fail_launch: bool,
    /// Report a launch timeout instead of starting.
    pub time_out: bool,
    /// Skip observer notification.
    pub skip_observers: bool,
    /// Fail termination.
    pub fail_terminate: bool,
}

/// Launcher returning [`FakeHandle`]s.
#[derive(Default)]
pub struct FakeLauncher {
    /// Behavior switches.
    pub behavior: LaunchBehavior,
    /// Number of launches performed.
    pub launches: AtomicUsize,
    /// Number of terminations across every handle.
    pub terminations: Arc<AtomicUsize>,
}

impl FakeLauncher {
    /// Creates a launcher with `behavior`.
    pub fn with_behavior(behavior: LaunchBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Returns how many handles were terminated.
    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }
}

impl ServerLauncher for FakeLauncher {
    fn launch(
        &self,
        options: &LaunchOptions,
        observers: &[&dyn LaunchObserver],
        deadline: &Deadline,
    ) -> Result<Box<dyn ServerHandle>, LaunchError> {
        deadline.check().map_err(|err| LaunchError::Timeout(err.to_string()))?;
        if self.behavior.time_out {
            return Err(LaunchError::Timeout("container never became healthy".to_string()));
        }
        if self.behavior.fail_launch {
            return Err(LaunchError::Launch("image pull failed".to_string()));
        }
        let keys = &options.credential_keys;
        let mut env = BTreeMap::from([
            (keys.user_env.clone(), APP_USER.to_string()),
            (keys.user_password_env.clone(), APP_PASSWORD.to_string()),
            (keys.admin_password_env.clone(), ADMIN_PASSWORD.to_string()),
        ]);
        env.extend(options.env.clone());
        let request = LaunchRequest {
            image: options.image.clone(),
            protocol_port: options.protocol_port,
            env,
        };
        if !self.behavior.skip_observers {
            for observer in observers {
                observer.on_pre_create(&request)?;
            }
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeHandle {
            fail_terminate: self.behavior.fail_terminate,
            terminations: Arc::clone(&self.terminations),
        }))
    }
}

/// Handle to a fake running server.
pub struct FakeHandle {
    /// Fail termination.
    fail_terminate: bool,
    /// Shared termination counter.
    terminations: Arc<AtomicUsize>,
}

impl ServerHandle for FakeHandle {
    fn host(&self) -> Result<String, LaunchError> {
        Ok(FAKE_HOST.to_string())
    }

    fn mapped_port(&self, _protocol_port: u16) -> Result<u16, LaunchError> {
        Ok(FAKE_PORT)
    }

    fn terminate(&self, _deadline: &Deadline) -> Result<(), LaunchError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        if self.fail_terminate {
            return Err(LaunchError::Terminate("container stuck".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Manager Helpers
// ============================================================================

/// Short timeouts keeping failure tests fast.
pub fn quick_timeouts() -> TimeoutPolicy {
    TimeoutPolicy {
        startup: Duration::from_secs(5),
        provision: Duration::from_secs(5),
        remove: Duration::from_secs(5),
        shutdown: Duration::from_secs(5),
        connect: Duration::from_secs(5),
    }
}

/// Manager options wired to `server` with an in-memory diagnostics sink.
pub fn fake_options(server: &Arc<FakeServer>) -> (ManagerOptions, Arc<MemoryDiagnosticsSink>) {
    let sink = Arc::new(MemoryDiagnosticsSink::new());
    let options = ManagerOptions::new(FakeDriver::new(server))
        .with_diagnostics(Arc::clone(&sink) as Arc<dyn db_isolation_core::DiagnosticsSink>)
        .with_timeouts(quick_timeouts());
    (options, sink)
}
