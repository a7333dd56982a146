//! PID file management and process liveness checks.

use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::daemon::{LOG_DIR, PID_FILE};

pub(crate) fn ensure_directories() -> Result<()> {
    if let Some(run_dir) = Path::new(PID_FILE).parent() {
        fs::create_dir_all(run_dir)?;
    }
    fs::create_dir_all(LOG_DIR)?;
    Ok(())
}

pub fn get_pid() -> Result<Option<u32>> {
    let path = Path::new(PID_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let pid = fs::read_to_string(path)?.trim().parse::<u32>()?;
    Ok(Some(pid))
}

/// Signal 0 probes liveness without delivering anything.
fn process_alive(pid: u32) -> bool {
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

/// Whether the daemon recorded in the PID file is still running. A PID file
/// left behind by a dead process is removed on the way out.
pub fn is_running() -> bool {
    let pid = match get_pid() {
        Ok(Some(pid)) => pid,
        _ => return false,
    };
    if process_alive(pid) {
        return true;
    }
    if let Err(e) = remove_pid_file() {
        eprintln!("Warning: Could not remove stale PID file: {}", e);
    }
    false
}

/// Record the daemon PID, creating the runtime directories if needed.
pub fn save_pid(pid: u32) -> Result<()> {
    ensure_directories()?;
    fs::write(PID_FILE, pid.to_string())?;
    Ok(())
}

pub fn remove_pid_file() -> Result<()> {
    if Path::new(PID_FILE).exists() {
        fs::remove_file(PID_FILE)?;
    }
    Ok(())
}
