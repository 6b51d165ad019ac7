// crates/db-isolation-config/src/config.rs
// ============================================================================
// Module: Isolation Configuration
// Description: Configuration loading and validation for isolation campaigns.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: db-isolation-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional; an absent section takes the defaults the core
//! uses. Invalid values fail the load rather than being clamped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use db_isolation_core::CredentialKeys;
use db_isolation_core::Credentials;
use db_isolation_core::DiagnosticsSink;
use db_isolation_core::Dsn;
use db_isolation_core::FileDiagnosticsSink;
use db_isolation_core::ImageSpec;
use db_isolation_core::LaunchOptions;
use db_isolation_core::ManagerOptions;
use db_isolation_core::NamespaceOptions;
use db_isolation_core::NoopDiagnosticsSink;
use db_isolation_core::ServerConfig;
use db_isolation_core::SqlDriver;
use db_isolation_core::StderrDiagnosticsSink;
use db_isolation_core::TimeoutPolicy;
use db_isolation_core::namespace::MAX_NAMESPACE_LEN;
use db_isolation_core::namespace::validate_identifier;
use db_isolation_core::options;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "db-isolation.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "DB_ISOLATION_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Length of a hyphenated UUID, the generated part of every namespace name.
const GENERATED_NAME_LENGTH: usize = 36;
/// Longest prefix that still leaves room for the generated part.
pub const MAX_NAMESPACE_PREFIX_LENGTH: usize = MAX_NAMESPACE_LEN - GENERATED_NAME_LENGTH;
/// Upper bound for any configured timeout (one hour).
pub(crate) const MAX_TIMEOUT_MS: u64 = 60 * 60 * 1000;
/// Maximum number of environment overrides for the server image.
pub(crate) const MAX_ENV_OVERRIDES: usize = 64;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Top-level isolation configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IsolationConfig {
    /// Server image and account settings.
    #[serde(default)]
    pub server: ServerSection,
    /// Per-operation time bounds.
    #[serde(default)]
    pub timeouts: TimeoutsSection,
    /// Namespace naming and creation policy.
    #[serde(default)]
    pub namespace: NamespaceSection,
    /// Diagnostics sink selection.
    #[serde(default)]
    pub diagnostics: DiagnosticsSection,
    /// Optional already-running server to attach to instead of launching one.
    #[serde(default)]
    pub external: Option<ExternalSection>,
}

impl IsolationConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from `path`, then [`CONFIG_ENV_VAR`], then
    /// `db-isolation.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        Self::load_resolved(&resolved)
    }

    /// Loads configuration, falling back to defaults when no file was asked for.
    ///
    /// An explicit `path` or [`CONFIG_ENV_VAR`] must name a readable file;
    /// only the implicit default filename may be absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path.is_some() || env::var_os(CONFIG_ENV_VAR).is_some();
        let resolved = resolve_path(path)?;
        if !explicit && !resolved.exists() {
            let mut config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        Self::load_resolved(&resolved)
    }

    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses an already resolved path.
    fn load_resolved(resolved: &Path) -> Result<Self, ConfigError> {
        validate_path(resolved)?;
        let bytes = fs::read(resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.timeouts.validate()?;
        self.namespace.validate()?;
        self.diagnostics.validate()?;
        if let Some(external) = &self.external {
            external.validate()?;
        }
        Ok(())
    }

    /// Builds manager options around `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the diagnostics file cannot be opened.
    pub fn manager_options(&self, driver: Arc<dyn SqlDriver>) -> Result<ManagerOptions, ConfigError> {
        Ok(ManagerOptions::new(driver)
            .with_diagnostics(self.diagnostics.build_sink()?)
            .with_timeouts(self.timeouts.policy())
            .with_namespace(self.namespace.options()))
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// Server image and account settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Image repository.
    #[serde(default = "default_image")]
    pub image: String,
    /// Image tag.
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Container-side protocol port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Non-administrative account created at boot.
    #[serde(default = "default_user")]
    pub user: String,
    /// Optional database created at boot.
    #[serde(default)]
    pub database: Option<String>,
    /// Extra environment variables for the server.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            image: default_image(),
            tag: default_tag(),
            port: default_port(),
            user: default_user(),
            database: None,
            env: BTreeMap::new(),
        }
    }
}

impl ServerSection {
    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.image.trim().is_empty() || self.tag.trim().is_empty() {
            return Err(ConfigError::Invalid("server.image and server.tag must be set".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("server.port must be greater than zero".to_string()));
        }
        validate_identifier(&self.user)
            .map_err(|reason| ConfigError::Invalid(format!("server.user: {reason}")))?;
        if let Some(database) = &self.database {
            validate_identifier(database)
                .map_err(|reason| ConfigError::Invalid(format!("server.database: {reason}")))?;
        }
        if self.env.len() > MAX_ENV_OVERRIDES {
            return Err(ConfigError::Invalid(format!(
                "server.env exceeds {MAX_ENV_OVERRIDES} entries"
            )));
        }
        if let Some(key) = self.env.keys().find(|key| key.is_empty() || key.contains('=')) {
            return Err(ConfigError::Invalid(format!("server.env key is not a valid name: {key}")));
        }
        Ok(())
    }

    /// Builds launch options for this server.
    ///
    /// Account settings land in the environment under the image's keys;
    /// explicit `env` entries win. The administrative account is always the
    /// image's superuser (`root`).
    #[must_use]
    pub fn launch_options(&self) -> LaunchOptions {
        let keys = CredentialKeys::default();
        let mut env = BTreeMap::from([(keys.user_env.clone(), self.user.clone())]);
        if let Some(database) = &self.database {
            env.insert("MARIADB_DATABASE".to_string(), database.clone());
        }
        env.extend(self.env.clone());
        LaunchOptions {
            image: ImageSpec::new(self.image.clone(), self.tag.clone()),
            protocol_port: self.port,
            env,
            credential_keys: keys,
        }
    }
}

// ============================================================================
// SECTION: Timeouts
// ============================================================================

/// Per-operation time bounds in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsSection {
    /// Server launch and readiness.
    #[serde(default = "default_startup_ms")]
    pub startup_ms: u64,
    /// Namespace creation.
    #[serde(default = "default_provision_ms")]
    pub provision_ms: u64,
    /// Namespace removal.
    #[serde(default = "default_remove_ms")]
    pub remove_ms: u64,
    /// Server termination.
    #[serde(default = "default_shutdown_ms")]
    pub shutdown_ms: u64,
    /// Scoped connection establishment.
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            startup_ms: default_startup_ms(),
            provision_ms: default_provision_ms(),
            remove_ms: default_remove_ms(),
            shutdown_ms: default_shutdown_ms(),
            connect_ms: default_connect_ms(),
        }
    }
}

impl TimeoutsSection {
    /// Validates timeout bounds.
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("timeouts.startup_ms", self.startup_ms),
            ("timeouts.provision_ms", self.provision_ms),
            ("timeouts.remove_ms", self.remove_ms),
            ("timeouts.shutdown_ms", self.shutdown_ms),
            ("timeouts.connect_ms", self.connect_ms),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{field} must be greater than zero")));
            }
            if value > MAX_TIMEOUT_MS {
                return Err(ConfigError::Invalid(format!(
                    "{field} exceeds {MAX_TIMEOUT_MS} milliseconds"
                )));
            }
        }
        Ok(())
    }

    /// Converts to the core timeout policy.
    #[must_use]
    pub const fn policy(&self) -> TimeoutPolicy {
        TimeoutPolicy {
            startup: Duration::from_millis(self.startup_ms),
            provision: Duration::from_millis(self.provision_ms),
            remove: Duration::from_millis(self.remove_ms),
            shutdown: Duration::from_millis(self.shutdown_ms),
            connect: Duration::from_millis(self.connect_ms),
        }
    }
}

// ============================================================================
// SECTION: Namespace
// ============================================================================

/// Namespace naming and creation policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceSection {
    /// Prefix for generated names.
    #[serde(default)]
    pub prefix: String,
    /// Character set applied at creation.
    #[serde(default = "default_charset")]
    pub charset: String,
    /// Collation applied at creation.
    #[serde(default = "default_collation")]
    pub collation: String,
}

impl Default for NamespaceSection {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            charset: default_charset(),
            collation: default_collation(),
        }
    }
}

impl NamespaceSection {
    /// Validates namespace policy.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.prefix.is_empty() {
            if self.prefix.len() > MAX_NAMESPACE_PREFIX_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "namespace.prefix exceeds {MAX_NAMESPACE_PREFIX_LENGTH} characters"
                )));
            }
            validate_identifier(&self.prefix)
                .map_err(|reason| ConfigError::Invalid(format!("namespace.prefix: {reason}")))?;
        }
        validate_identifier(&self.charset)
            .map_err(|reason| ConfigError::Invalid(format!("namespace.charset: {reason}")))?;
        validate_identifier(&self.collation)
            .map_err(|reason| ConfigError::Invalid(format!("namespace.collation: {reason}")))?;
        Ok(())
    }

    /// Converts to the core namespace options.
    #[must_use]
    pub fn options(&self) -> NamespaceOptions {
        NamespaceOptions {
            prefix: self.prefix.clone(),
            charset: self.charset.clone(),
            collation: self.collation.clone(),
        }
    }
}

// ============================================================================
// SECTION: Diagnostics
// ============================================================================

/// Diagnostics sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticsSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `diagnostics.path`.
    File,
    /// Discard everything.
    None,
}

/// Diagnostics configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsSection {
    /// Sink kind.
    #[serde(default)]
    pub sink: DiagnosticsSinkKind,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl DiagnosticsSection {
    /// Validates sink settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (&self.sink, &self.path) {
            (DiagnosticsSinkKind::File, None) => Err(ConfigError::Invalid(
                "diagnostics.path is required when diagnostics.sink = \"file\"".to_string(),
            )),
            (DiagnosticsSinkKind::File, Some(path)) => validate_path_string("diagnostics.path", path),
            (_, Some(_)) => Err(ConfigError::Invalid(
                "diagnostics.path is only valid with diagnostics.sink = \"file\"".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the diagnostics file cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn DiagnosticsSink>, ConfigError> {
        let sink: Arc<dyn DiagnosticsSink> = match self.sink {
            DiagnosticsSinkKind::Stderr => Arc::new(StderrDiagnosticsSink),
            DiagnosticsSinkKind::None => Arc::new(NoopDiagnosticsSink),
            DiagnosticsSinkKind::File => {
                let path = self.path.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("diagnostics.path is required".to_string())
                })?;
                let sink = FileDiagnosticsSink::new(Path::new(path))
                    .map_err(|err| ConfigError::Io(format!("diagnostics.path: {err}")))?;
                Arc::new(sink)
            }
        };
        Ok(sink)
    }
}

// ============================================================================
// SECTION: External Server
// ============================================================================

/// Already running server to attach to.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExternalSection {
    /// Administrative connection string.
    pub admin_dsn: String,
    /// Non-administrative account for scoped connections.
    pub user: String,
    /// Password of the non-administrative account.
    pub password: String,
}

impl std::fmt::Debug for ExternalSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = self
            .admin_dsn
            .parse::<Dsn>()
            .map_or_else(|_| "<invalid>".to_string(), |dsn| dsn.redacted());
        f.debug_struct("ExternalSection")
            .field("admin_dsn", &redacted)
            .field("user", &self.user)
            .field("password", &"****")
            .finish()
    }
}

impl ExternalSection {
    /// Validates the external server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.server_config().map(|_| ())
    }

    /// Builds the server configuration for attaching.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the connection string is
    /// malformed or selects a database.
    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let dsn: Dsn = self
            .admin_dsn
            .parse()
            .map_err(|err| ConfigError::Invalid(format!("external.admin_dsn: {err}")))?;
        if dsn.database.is_some() {
            return Err(ConfigError::Invalid(
                "external.admin_dsn must not select a database".to_string(),
            ));
        }
        validate_identifier(&self.user)
            .map_err(|reason| ConfigError::Invalid(format!("external.user: {reason}")))?;
        Ok(ServerConfig::new(
            dsn.host,
            dsn.port,
            dsn.credentials,
            Credentials::new(self.user.clone(), self.password.clone()),
        ))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the argument or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Converts a duration to whole milliseconds, saturating.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Default image repository.
fn default_image() -> String {
    "mariadb".to_string()
}

/// Default image tag.
fn default_tag() -> String {
    "11.4".to_string()
}

/// Default protocol port.
const fn default_port() -> u16 {
    3306
}

/// Default non-administrative account.
fn default_user() -> String {
    "test".to_string()
}

/// Default startup timeout.
fn default_startup_ms() -> u64 {
    millis(options::DEFAULT_STARTUP_TIMEOUT)
}

/// Default provisioning timeout.
fn default_provision_ms() -> u64 {
    millis(options::DEFAULT_PROVISION_TIMEOUT)
}

/// Default removal timeout.
fn default_remove_ms() -> u64 {
    millis(options::DEFAULT_REMOVE_TIMEOUT)
}

/// Default shutdown timeout.
fn default_shutdown_ms() -> u64 {
    millis(options::DEFAULT_SHUTDOWN_TIMEOUT)
}

/// Default connect timeout.
fn default_connect_ms() -> u64 {
    millis(options::DEFAULT_CONNECT_TIMEOUT)
}

/// Default character set.
fn default_charset() -> String {
    options::DEFAULT_CHARSET.to_string()
}

/// Default collation.
fn default_collation() -> String {
    options::DEFAULT_COLLATION.to_string()
}
