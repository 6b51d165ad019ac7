// system-tests/tests/helpers/campaign.rs
// ============================================================================
// Module: Campaign Fixture
// Description: Starts or attaches to the MariaDB server a suite runs against.
// Purpose: Give every scenario a manager plus the diagnostics it produced.
// Dependencies: db-isolation-config, db-isolation-core, db-isolation-mariadb
// ============================================================================

//! ## Overview
//! A container is launched per fixture unless the isolation config named by
//! `DB_ISOLATION_SYSTEM_TEST_CONFIG` carries an `[external]` server. Docker
//! availability is checked up front so a missing daemon fails with a clear
//! message instead of a launcher timeout.

use std::sync::Arc;

use db_isolation_config::IsolationConfig;
use db_isolation_core::ConnectionFactory;
use db_isolation_core::Credentials;
use db_isolation_core::Deadline;
use db_isolation_core::IsolationManager;
use db_isolation_core::ManagerOptions;
use db_isolation_core::MemoryDiagnosticsSink;
use db_isolation_core::Row;
use db_isolation_core::ServerConfig;
use db_isolation_mariadb::ContainerLauncher;
use db_isolation_mariadb::MysqlDriver;
use system_tests::config::SystemTestConfig;

/// Manager plus the recording sink wired into its campaign.
pub struct CampaignFixture {
    /// First manager of the campaign.
    pub manager: IsolationManager,
    /// Events recorded by every manager built from this fixture.
    pub diagnostics: Arc<MemoryDiagnosticsSink>,
    /// Options the campaign was built with.
    options: ManagerOptions,
}

impl CampaignFixture {
    /// Launches a container, or attaches to the configured external server.
    pub fn start() -> Result<Self, String> {
        let env = SystemTestConfig::load()?;
        let config = IsolationConfig::load_or_default(env.config_path.as_deref())
            .map_err(|err| err.to_string())?;
        let diagnostics = Arc::new(MemoryDiagnosticsSink::new());
        let mut options = config
            .manager_options(Arc::new(MysqlDriver::new()))
            .map_err(|err| err.to_string())?
            .with_diagnostics(diagnostics.clone());
        if let Some(timeout) = env.timeout {
            options.timeouts.startup = timeout;
        }

        let manager = match &config.external {
            Some(external) => {
                let server = external.server_config().map_err(|err| err.to_string())?;
                IsolationManager::attach(server, options.clone())
            }
            None => {
                ensure_docker_available()?;
                IsolationManager::start(
                    &ContainerLauncher::new(),
                    &config.server.launch_options(),
                    options.clone(),
                    &Deadline::none(),
                )
                .map_err(|err| err.to_string())?
            }
        };
        Ok(Self {
            manager,
            diagnostics,
            options,
        })
    }

    /// Attaches a second campaign whose non-administrative account never existed.
    pub fn with_unknown_user(&self, username: &str) -> IsolationManager {
        let server = self.manager.server();
        let ghost = ServerConfig::new(
            server.address(),
            server.port(),
            server.admin().clone(),
            Credentials::new(username, "never-created"),
        );
        IsolationManager::attach(ghost, self.options.clone())
    }

    /// Connection factory sharing the campaign's driver.
    pub fn factory(&self) -> ConnectionFactory {
        ConnectionFactory::new(Arc::clone(&self.options.driver))
    }

    /// Runs `statement` on a fresh administrative connection.
    pub fn admin_query(&self, statement: &str) -> Result<Vec<Row>, String> {
        let mut conn = self
            .factory()
            .admin_connection(self.manager.server(), &Deadline::none())
            .map_err(|err| err.to_string())?;
        let rows = conn.query(statement).map_err(|err| err.to_string())?;
        conn.close().map_err(|err| err.to_string())?;
        Ok(rows)
    }

    /// Returns whether the server lists `database`.
    pub fn database_exists(&self, database: &str) -> Result<bool, String> {
        let rows = self.admin_query(&format!(
            "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = '{database}'"
        ))?;
        Ok(!rows.is_empty())
    }

    /// Counts sessions the administrative account holds, excluding the probe itself.
    pub fn admin_sessions(&self) -> Result<usize, String> {
        let user = self.manager.server().admin().username().to_string();
        let rows = self.admin_query(&format!(
            "SELECT COUNT(*) FROM information_schema.PROCESSLIST WHERE USER = '{user}' AND ID <> \
             CONNECTION_ID()"
        ))?;
        let count = rows
            .first()
            .and_then(|row| row.first())
            .and_then(Clone::clone)
            .ok_or("PROCESSLIST count missing")?;
        count.parse().map_err(|err| format!("bad session count {count}: {err}"))
    }
}

impl Drop for CampaignFixture {
    fn drop(&mut self) {
        self.manager.stop(&Deadline::none());
    }
}

/// Fails fast when the container runtime is unreachable.
fn ensure_docker_available() -> Result<(), String> {
    let output = std::process::Command::new("docker")
        .arg("info")
        .output()
        .map_err(|err| format!("docker info failed: {err}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("docker info failed: {stderr}"));
    }
    Ok(())
}

