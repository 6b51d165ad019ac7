// crates/db-isolation-core/src/server.rs
// ============================================================================
// Module: Server Configuration
// Description: Address and credentials of the shared database server.
// Purpose: Capture launcher output once and share it read-only.
// Dependencies: std
// ============================================================================

//! ## Overview
//! [`ServerConfig`] is produced exactly once per campaign, after the launcher
//! reports a running server, and is then shared read-only by every
//! isolation manager multiplexing onto that server. Passwords never appear in
//! `Debug` output.

use std::fmt;

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Username and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    username: String,
    /// Account password.
    password: String,
}

impl Credentials {
    /// Builds a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the account name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// SECTION: Server Config
// ============================================================================

/// Network address and accounts of a running database server.
///
/// # Invariants
/// - Immutable after construction; no setters are exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Externally reachable host.
    address: String,
    /// Externally reachable port.
    port: u16,
    /// Administrative account used for provisioning.
    admin: Credentials,
    /// Non-administrative account granted access to each namespace.
    user: Credentials,
}

impl ServerConfig {
    /// Builds a server configuration.
    #[must_use]
    pub fn new(address: impl Into<String>, port: u16, admin: Credentials, user: Credentials) -> Self {
        Self {
            address: address.into(),
            port,
            admin,
            user,
        }
    }

    /// Returns the server host.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Returns the server port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the administrative account.
    #[must_use]
    pub const fn admin(&self) -> &Credentials {
        &self.admin
    }

    /// Returns the scoped, non-administrative account.
    #[must_use]
    pub const fn user(&self) -> &Credentials {
        &self.user
    }
}
