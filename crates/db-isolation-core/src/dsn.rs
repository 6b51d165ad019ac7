// crates/db-isolation-core/src/dsn.rs
// ============================================================================
// Module: Connection Strings
// Description: Stable client connection string for admin and scoped access.
// Purpose: Render and parse `user:password@tcp(host:port)/db?params` strings.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`Dsn`] is the connection descriptor handed to the SQL driver. Its
//! `Display` form is the widely understood
//! `user:password@tcp(host:port)/[database]?parseTime=true&multiStatements=true`
//! layout, so any standard client can consume it unchanged. The database
//! segment is empty for administrative connections.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::server::Credentials;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Connection string parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid connection string: {0}")]
pub struct DsnError(pub String);

/// Client connection descriptor.
#[derive(Clone, PartialEq, Eq)]
pub struct Dsn {
    /// Account credentials.
    pub credentials: Credentials,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Default database; `None` for server-global scope.
    pub database: Option<String>,
    /// Whether temporal columns are decoded into time values.
    pub parse_time: bool,
    /// Whether one call may carry several statements.
    pub multi_statements: bool,
    /// Additional parameters preserved verbatim, in order.
    pub extra_params: Vec<(String, String)>,
}

impl Dsn {
    /// Builds a descriptor with the parameters every isolation connection uses.
    #[must_use]
    pub fn new(
        credentials: Credentials,
        host: impl Into<String>,
        port: u16,
        database: Option<String>,
    ) -> Self {
        Self {
            credentials,
            host: host.into(),
            port,
            database,
            parse_time: true,
            multi_statements: true,
            extra_params: Vec::new(),
        }
    }

    /// Renders the connection string with the password masked.
    #[must_use]
    pub fn redacted(&self) -> String {
        self.render("****")
    }

    /// Renders the connection string with the given password text.
    fn render(&self, password: &str) -> String {
        let mut out = format!(
            "{}:{}@tcp({}:{})/{}",
            self.credentials.username(),
            password,
            self.host,
            self.port,
            self.database.as_deref().unwrap_or_default()
        );
        let mut params = vec![
            ("parseTime".to_string(), self.parse_time.to_string()),
            ("multiStatements".to_string(), self.multi_statements.to_string()),
        ];
        params.extend(self.extra_params.iter().cloned());
        for (idx, (key, value)) in params.iter().enumerate() {
            out.push(if idx == 0 { '?' } else { '&' });
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(self.credentials.password()))
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl FromStr for Dsn {
    type Err = DsnError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (userinfo, rest) = value
            .rsplit_once("@tcp(")
            .ok_or_else(|| DsnError("missing @tcp(host:port) segment".to_string()))?;
        let (username, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));
        if username.is_empty() {
            return Err(DsnError("missing username".to_string()));
        }
        let (address, rest) =
            rest.split_once(')').ok_or_else(|| DsnError("unterminated tcp(...)".to_string()))?;
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| DsnError("address must be host:port".to_string()))?;
        if host.is_empty() {
            return Err(DsnError("missing host".to_string()));
        }
        let port = port.parse::<u16>().map_err(|_| DsnError(format!("invalid port: {port}")))?;
        let rest =
            rest.strip_prefix('/').ok_or_else(|| DsnError("missing '/' after address".to_string()))?;
        let (database, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut dsn = Self::new(
            Credentials::new(username, password),
            host,
            port,
            (!database.is_empty()).then(|| database.to_string()),
        );
        dsn.parse_time = false;
        dsn.multi_statements = false;
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| DsnError(format!("parameter without value: {pair}")))?;
            match key {
                "parseTime" => dsn.parse_time = parse_flag(key, value)?,
                "multiStatements" => dsn.multi_statements = parse_flag(key, value)?,
                _ => dsn.extra_params.push((key.to_string(), value.to_string())),
            }
        }
        Ok(dsn)
    }
}

/// Parses a boolean connection parameter.
fn parse_flag(key: &str, value: &str) -> Result<bool, DsnError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(DsnError(format!("{key} must be a boolean, got {other}"))),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
