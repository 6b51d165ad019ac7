// crates/db-isolation-mariadb/src/driver.rs
// ============================================================================
// Module: MySQL Driver
// Description: Synchronous MySQL-protocol client behind the core driver trait.
// Purpose: Open admin and scoped connections from a connection string.
// Dependencies: db-isolation-core, mysql
// ============================================================================

//! ## Overview
//! Opening a connection is bounded by the caller's deadline: the remaining
//! time becomes the TCP connect timeout. The deadline bounds the call only, so
//! the returned connection carries no read or write timeout and long-running
//! statements are not cut off. Server error codes that
//! callers branch on (access denied, unknown database) are classified;
//! everything else keeps the server message.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use db_isolation_core::Connection;
use db_isolation_core::Deadline;
use db_isolation_core::DriverError;
use db_isolation_core::Dsn;
use db_isolation_core::Row;
use db_isolation_core::SqlConnection;
use db_isolation_core::SqlDriver;
use mysql::Conn;
use mysql::Opts;
use mysql::OptsBuilder;
use mysql::Value;
use mysql::prelude::Queryable;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Server error: access denied to a database.
const ER_DBACCESS_DENIED: u16 = 1044;
/// Server error: access denied for the account.
const ER_ACCESS_DENIED: u16 = 1045;
/// Server error: unknown database.
const ER_BAD_DB: u16 = 1049;

// ============================================================================
// SECTION: Driver
// ============================================================================

/// [`SqlDriver`] backed by the `mysql` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDriver;

impl MysqlDriver {
    /// Creates the driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SqlDriver for MysqlDriver {
    fn connect(&self, dsn: &Dsn, deadline: &Deadline) -> Result<Connection, DriverError> {
        deadline.check().map_err(|err| DriverError::Connect(err.to_string()))?;
        let opts = build_opts(dsn, connect_budget(deadline.remaining())?);
        let conn = Conn::new(opts).map_err(|err| classify(&err, DriverError::Connect))?;
        Ok(Box::new(MysqlConnection {
            conn,
        }))
    }
}

/// Converts the deadline's remaining time into a connect timeout.
///
/// A zero budget means the deadline passed after it was checked; the socket
/// layer rejects a zero timeout, so it is reported as expiry here.
pub(crate) fn connect_budget(remaining: Option<Duration>) -> Result<Option<Duration>, DriverError> {
    match remaining {
        Some(left) if left.is_zero() => {
            Err(DriverError::Connect("deadline expired before connecting".to_string()))
        }
        other => Ok(other),
    }
}

/// Maps a connection string onto client options.
///
/// `connect_timeout` bounds the TCP connect only; read and write timeouts stay
/// unset for the life of the connection.
pub(crate) fn build_opts(dsn: &Dsn, connect_timeout: Option<Duration>) -> Opts {
    OptsBuilder::new()
        .ip_or_hostname(Some(dsn.host.clone()))
        .tcp_port(dsn.port)
        .user(Some(dsn.credentials.username()))
        .pass(Some(dsn.credentials.password()))
        .db_name(dsn.database.clone())
        .tcp_connect_timeout(connect_timeout)
        .read_timeout(None)
        .write_timeout(None)
        .into()
}

// ============================================================================
// SECTION: Connection
// ============================================================================

/// Open MySQL-protocol session.
pub struct MysqlConnection {
    /// Underlying client connection.
    conn: Conn,
}

impl SqlConnection for MysqlConnection {
    fn execute(&mut self, statement: &str) -> Result<(), DriverError> {
        self.conn.query_drop(statement).map_err(|err| classify(&err, DriverError::Statement))
    }

    fn query(&mut self, statement: &str) -> Result<Vec<Row>, DriverError> {
        let rows: Vec<mysql::Row> =
            self.conn.query(statement).map_err(|err| classify(&err, DriverError::Statement))?;
        Ok(rows.into_iter().map(|row| row.unwrap().into_iter().map(cell_text).collect()).collect())
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.execute("START TRANSACTION")
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.execute("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.execute("ROLLBACK")
    }

    fn close(self: Box<Self>) -> Result<(), DriverError> {
        // Dropping the client sends COM_QUIT and shuts the socket.
        drop(self.conn);
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Classifies a client error, falling back to `otherwise`.
fn classify(err: &mysql::Error, otherwise: fn(String) -> DriverError) -> DriverError {
    if let mysql::Error::MySqlError(server) = err
        && let Some(classified) = classify_code(server.code, err.to_string())
    {
        return classified;
    }
    otherwise(err.to_string())
}

/// Maps server error codes callers branch on.
pub(crate) fn classify_code(code: u16, message: String) -> Option<DriverError> {
    match code {
        ER_DBACCESS_DENIED | ER_ACCESS_DENIED => Some(DriverError::AccessDenied(message)),
        ER_BAD_DB => Some(DriverError::UnknownDatabase(message)),
        _ => None,
    }
}

/// Renders one result cell as text; SQL `NULL` becomes `None`.
pub(crate) fn cell_text(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Value::Int(value) => Some(value.to_string()),
        Value::UInt(value) => Some(value.to_string()),
        Value::Float(value) => Some(value.to_string()),
        Value::Double(value) => Some(value.to_string()),
        Value::Date(year, month, day, hour, minute, second, micros) => Some(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
        )),
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            let hours = u64::from(days) * 24 + u64::from(hours);
            Some(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"))
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
