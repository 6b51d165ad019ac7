// system-tests/src/lib.rs
// ============================================================================
// Module: DB Isolation System Tests Library
// Description: Shared configuration for system test scenarios.
// Purpose: Provide common utilities for the system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration used by the system-test binaries in
//! `system-tests/tests`. Tests launch a MariaDB container by default, or
//! attach to an already running server when the environment names one.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
