//! Daemon start/stop/restart/status process control.

use std::fs;
use std::process;

use anyhow::Result;

use crate::config::persistence::load_config;
use crate::daemon::pid::{get_pid, is_running, remove_pid_file, save_pid};
use crate::daemon::LOG_DIR;

pub fn start_daemon_with_log_level(log_level: Option<String>) -> Result<()> {
    if is_running() {
        eprintln!("ERROR: platmond is already running (PID: {:?})", get_pid()?);
        process::exit(1);
    }

    println!(
        "Starting platmond v{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    );

    // Prepare log file
    crate::daemon::pid::ensure_directories()?;
    let log_path = format!("{}/platmond.log", LOG_DIR);
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Spawn new process in daemon mode using --daemon-child (internal flag)
    let exe_path = std::env::current_exe()?;
    let mut cmd = process::Command::new(&exe_path);
    cmd.arg("--daemon-child");

    if let Some(level) = log_level {
        cmd.arg("--log-level").arg(level);
    }

    let child = cmd
        .current_dir(std::env::current_dir()?)
        .stdin(process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    let pid = child.id();
    save_pid(pid)?;

    println!("platmond started successfully (PID: {})", pid);
    println!("Logs: tail -f {}/platmond.log", LOG_DIR);

    Ok(())
}

pub fn stop_daemon() -> Result<()> {
    if !is_running() {
        eprintln!("WARNING: platmond is not running");
        process::exit(1);
    }

    if let Some(pid) = get_pid()? {
        println!("Stopping platmond (PID: {})...", pid);

        // SIGTERM first, give the runtime time to wind down
        unsafe { libc::kill(pid as i32, libc::SIGTERM) };

        for _ in 0..10 {
            if !is_running() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_secs(1));
        }

        if is_running() {
            println!("WARNING: Force killing platmond...");
            unsafe { libc::kill(pid as i32, libc::SIGKILL) };
        }

        remove_pid_file()?;
        println!("platmond stopped");
    }

    Ok(())
}

pub fn restart_daemon_with_log_level(log_level: Option<String>) -> Result<()> {
    println!(
        "Restarting platmond v{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    );

    if is_running() {
        stop_daemon()?;
        std::thread::sleep(std::time::Duration::from_secs(1));
    } else {
        println!("platmond not running, starting it...");
    }

    start_daemon_with_log_level(log_level)
}

pub async fn show_status() -> Result<()> {
    println!("platmond v{} ({})", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);

    if is_running() {
        println!("Status:  running (PID: {:?})", get_pid()?.unwrap_or(0));
    } else {
        println!("Status:  stopped");
    }

    match load_config(None).await {
        Ok(config) => {
            println!("Backend: {}", config.transport.backend);
            println!(
                "Polling: every {} ms, {} sensor(s) per cycle",
                config.polling.poll_interval_ms, config.polling.poll_batch_size
            );
            println!("Logs:    {}/platmond.log", LOG_DIR);
        }
        Err(e) => println!("Config:  unavailable ({})", e),
    }

    Ok(())
}
