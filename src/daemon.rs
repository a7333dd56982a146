//! Daemon management constants and submodule re-exports.

pub mod control;
pub mod pid;

pub const PID_FILE: &str = "/run/platmond/platmond.pid";
pub const LOG_DIR: &str = "/var/log/platmond";
