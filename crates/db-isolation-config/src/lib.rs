// crates/db-isolation-config/src/lib.rs
// ============================================================================
// Module: DB Isolation Config Library
// Description: Canonical configuration model for isolation campaigns.
// Purpose: Single source of truth for db-isolation.toml semantics.
// Dependencies: db-isolation-core, serde, toml
// ============================================================================

//! ## Overview
//! `db-isolation-config` loads and validates `db-isolation.toml` and turns it
//! into the option types the isolation core consumes: timeout policy,
//! namespace policy, launch options, a diagnostics sink, and optionally the
//! address of an already running server to attach to.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
