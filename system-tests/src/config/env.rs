// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed configuration for system tests.
// Purpose: Locate the isolation config and the startup timeout override.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Both variables are optional. A variable that is set must be UTF-8 and
//! non-blank; anything else fails the run instead of falling back to defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Variables the system tests read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional isolation config file (may carry an `[external]` server).
    ConfigPath,
    /// Optional per-campaign startup timeout in seconds (positive integer).
    TimeoutSeconds,
}

impl SystemTestEnv {
    /// Returns the variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigPath => "DB_ISOLATION_SYSTEM_TEST_CONFIG",
            Self::TimeoutSeconds => "DB_ISOLATION_SYSTEM_TEST_TIMEOUT_SEC",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Parsed system-test environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemTestConfig {
    /// Optional isolation config file.
    pub config_path: Option<PathBuf>,
    /// Optional startup timeout override.
    pub timeout: Option<Duration>,
}

impl SystemTestConfig {
    /// Reads the system-test environment.
    ///
    /// # Errors
    ///
    /// Returns a message naming the offending variable when a value is not
    /// UTF-8, is blank, or does not parse.
    pub fn load() -> Result<Self, String> {
        let config_path = env_value(SystemTestEnv::ConfigPath)?.map(PathBuf::from);
        let timeout = match env_value(SystemTestEnv::TimeoutSeconds)? {
            Some(raw) => Some(parse_timeout_seconds(SystemTestEnv::TimeoutSeconds.as_str(), &raw)?),
            None => None,
        };
        Ok(Self {
            config_path,
            timeout,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the variable's value; unset is `None`, blank or non-UTF-8 is an error.
fn env_value(key: SystemTestEnv) -> Result<Option<String>, String> {
    let name = key.as_str();
    let Some(raw) = std::env::var_os(name) else {
        return Ok(None);
    };
    let value = raw.into_string().map_err(|_| format!("{name} is not valid UTF-8"))?;
    if value.trim().is_empty() {
        return Err(format!("{name} is set but blank"));
    }
    Ok(Some(value))
}

/// Parses a whole number of seconds greater than zero.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, String> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(format!("{name} must be at least one second")),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(err) => Err(format!("{name} must be whole seconds: {err}")),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
