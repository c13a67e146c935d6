//! Database module - MySQL implementations using SQLx
//!
//! This module provides:
//! - Connection pool management
//! - The MySQL-backed member directory

pub mod connection;
pub mod mysql_directory;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use connection::DatabasePool;
pub use mysql_directory::MySqlDirectory;
