//! I/O helpers for quade commands.

pub mod config;
pub mod init;
pub mod scenario_config;
