// system-tests/src/config/mod.rs
// ============================================================================
// Module: System Test Config
// Description: Environment-backed configuration entry points.
// Purpose: Re-export the typed system-test configuration.
// Dependencies: crate::config::env
// ============================================================================

//! ## Overview
//! Typed configuration for system tests, read from environment variables.

pub mod env;

pub use env::SystemTestConfig;
pub use env::SystemTestEnv;
