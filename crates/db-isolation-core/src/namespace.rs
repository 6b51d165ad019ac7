// crates/db-isolation-core/src/namespace.rs
// ============================================================================
// Module: Namespaces
// Description: Uniquely named logical databases minted per test.
// Purpose: Provide collision-free, identifier-safe database names.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! A [`Namespace`] names one isolated logical database on the shared server.
//! Generated names derive from a random UUID so concurrently running tests,
//! and repeated campaigns against the same server, never collide. Names are
//! restricted to a conservative identifier alphabet because they are spliced
//! into DDL statements.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum identifier length accepted by the server for database names.
pub const MAX_NAMESPACE_LEN: usize = 64;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Invalid namespace name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid namespace name: {0}")]
pub struct NamespaceNameError(pub String);

/// Isolated logical database identifier.
///
/// # Invariants
/// - 1..=64 characters from `[A-Za-z0-9_-]`.
/// - Generated names are never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Mints a fresh namespace name, optionally prefixed.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceNameError`] when the prefix makes the name unsafe or too long.
    pub fn generate(prefix: &str) -> Result<Self, NamespaceNameError> {
        Self::parse(format!("{prefix}{}", Uuid::new_v4()))
    }

    /// Validates an externally supplied namespace name.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceNameError`] when the name is empty, too long, or
    /// contains characters outside `[A-Za-z0-9_-]`.
    pub fn parse(name: impl Into<String>) -> Result<Self, NamespaceNameError> {
        let name = name.into();
        validate_identifier(&name).map_err(NamespaceNameError)?;
        Ok(Self(name))
    }

    /// Returns the namespace name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Checks that `value` is usable as a bare SQL identifier fragment.
///
/// # Errors
///
/// Returns a human-readable reason when the value is rejected.
pub fn validate_identifier(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("identifier must not be empty".to_string());
    }
    if value.len() > MAX_NAMESPACE_LEN {
        return Err(format!("identifier exceeds {MAX_NAMESPACE_LEN} characters: {value}"));
    }
    if let Some(bad) = value.chars().find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '_' || *ch == '-'))
    {
        return Err(format!("identifier contains unsupported character '{bad}': {value}"));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
