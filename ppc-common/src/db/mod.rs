//! Database utilities
//!
//! Connection pool initialization and the coordination schema.

pub mod init;

pub use init::init_database;
