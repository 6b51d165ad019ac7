// crates/db-isolation-mariadb/src/lib.rs
// ============================================================================
// Module: DB Isolation MariaDB Library
// Description: MariaDB launcher and driver adapters.
// Purpose: Plug a containerized MariaDB server into the isolation core.
// Dependencies: db-isolation-core, mysql, testcontainers
// ============================================================================

//! ## Overview
//! [`ContainerLauncher`] boots a MariaDB image through `testcontainers` and
//! reports the generated accounts to launch observers before the container
//! is created. [`MysqlDriver`] speaks the MySQL wire protocol with the
//! synchronous `mysql` client.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod driver;
pub mod launcher;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use driver::MysqlConnection;
pub use driver::MysqlDriver;
pub use launcher::ContainerHandle;
pub use launcher::ContainerLauncher;
