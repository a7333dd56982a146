//! Platmond entry point: CLI dispatch, signal handlers, async runtime.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use platmond::app::cli::{Args, HELP_TEXT};
use platmond::app::logging::{filter_for_level, init_tracing, RELOAD_HANDLE};
use platmond::config::persistence::load_config;
use platmond::config::types::DaemonConfig;
use platmond::daemon::control::{
    restart_daemon_with_log_level, show_status, start_daemon_with_log_level, stop_daemon,
};
use platmond::daemon::pid::{get_pid, remove_pid_file, save_pid};
use platmond::platform::Manager;
use platmond::transport::sim::SimChannel;
use platmond::transport::CommandChannel;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments with custom error handling
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if err.kind() == clap::error::ErrorKind::DisplayHelp {
                print!("{}", HELP_TEXT);
                std::process::exit(0);
            }
            if err.kind() == clap::error::ErrorKind::DisplayVersion {
                println!(
                    "platmond {} ({})",
                    env!("CARGO_PKG_VERSION"),
                    std::env::consts::ARCH
                );
                std::process::exit(0);
            }

            eprintln!("{}", err);
            eprintln!();
            print!("{}", HELP_TEXT);
            eprintln!("\nFor more information, try '--help'.");
            std::process::exit(1);
        }
    };

    // Handle management commands first (before async setup)
    if args.start {
        return start_daemon_with_log_level(args.log_level); // Spawns new process and exits
    }
    if args.stop {
        return stop_daemon();
    }
    if args.restart {
        return restart_daemon_with_log_level(args.log_level);
    }
    if args.status {
        return show_status().await;
    }

    if let Some(lines) = args.log_show {
        let log_path = format!("{}/platmond.log", platmond::daemon::LOG_DIR);

        let mut cmd = std::process::Command::new("tail");
        match lines {
            Some(n) => {
                println!("Showing last {} log entries...", n);
                cmd.arg("-n").arg(n.to_string());
            }
            None => {
                println!("Showing live daemon logs (Ctrl+C to exit)...");
                cmd.arg("-f");
            }
        }

        cmd.arg(&log_path);
        let status = cmd.status()?;
        std::process::exit(status.code().unwrap_or(1));
    }

    // If no command was provided at all, show help
    if !args.daemon_child && !args.test && !args.config && !args.foreground {
        eprintln!("ERROR: No command specified. You must specify a command.");
        eprintln!();
        Args::command().print_help().ok();
        eprintln!();
        eprintln!("Common commands:");
        eprintln!("  ./platmond --start       Start the daemon");
        eprintln!("  ./platmond --stop        Stop the daemon");
        eprintln!("  ./platmond -i            Show status");
        std::process::exit(1);
    }

    // Setup logging (daemon child or foreground mode)
    // Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. config file, 4. default (info)
    let explicit_level = args
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok());
    init_tracing(filter_for_level(explicit_level.as_deref().unwrap_or("info")));

    if args.daemon_child {
        save_pid(std::process::id())?;
    }

    // Show config if requested
    if args.config {
        let config = load_config(None).await?;
        println!("\n{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!(
        "Platmond v{} starting ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    );

    let config = load_config(None).await?;

    // No explicit level: apply the configured one now that config is loaded
    if explicit_level.is_none() {
        if let Some(handle) = RELOAD_HANDLE.get() {
            let filter = filter_for_level(&config.daemon.log_level);
            if let Err(e) = handle.reload(EnvFilter::new(filter)) {
                error!("Failed to apply configured log level: {}", e);
            }
        }
    }

    let manager = build_manager(&config).await?;

    // Test mode: discovery plus one polling sweep, then exit
    if args.test {
        return run_test_sweep(&manager, &config).await;
    }

    // SIGHUP reloads the log level from config
    #[cfg(unix)]
    if args.daemon_child {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sighup = signal(SignalKind::hangup())?;

        tokio::spawn(async move {
            loop {
                sighup.recv().await;
                info!("SIGHUP received, reloading log level configuration");
                match load_config(None).await {
                    Ok(new_config) => {
                        if let Some(handle) = RELOAD_HANDLE.get() {
                            let filter = filter_for_level(&new_config.daemon.log_level);
                            match handle.reload(EnvFilter::new(filter)) {
                                Ok(_) => info!(
                                    "Log level reloaded: {}",
                                    new_config.daemon.log_level.to_uppercase()
                                ),
                                Err(e) => error!("Failed to reload log level: {}", e),
                            }
                        }
                    }
                    Err(e) => error!("Failed to reload config: {}", e),
                }
            }
        });
    }

    // Periodic summary of polling health
    let summary_manager = Arc::clone(&manager);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let tids = summary_manager.tids().await;
            for tid in &tids {
                let outcome = summary_manager.sensor_manager().last_poll_outcome(*tid).await;
                debug!("TID {} last poll outcome: {:?}", tid, outcome);
            }
            info!("Monitoring {} termini", tids.len());
        }
    });

    wait_for_shutdown().await;

    for tid in manager.tids().await {
        manager.stop_sensor_polling(tid).await;
    }

    // Clean up PID file after shutdown
    if let Ok(Some(pid)) = get_pid() {
        if pid == std::process::id() {
            let _ = remove_pid_file();
            info!("PID file cleaned up");
        }
    }

    info!("Platmond shutdown complete");
    Ok(())
}

/// Build the transport selected by config and wire the manager on top of it,
/// registering whatever endpoints the transport already knows about.
async fn build_manager(config: &DaemonConfig) -> Result<Arc<Manager>> {
    let poll_interval = Duration::from_millis(config.polling.poll_interval_ms);

    match config.transport.backend.as_str() {
        "sim" => {
            let sim = Arc::new(SimChannel::new(&config.transport));
            let endpoints = sim.endpoints();
            let channel: Arc<dyn CommandChannel> = sim;
            let manager = Arc::new(Manager::new(
                channel,
                poll_interval,
                config.polling.poll_batch_size,
            ));
            manager.handle_mctp_endpoints(&endpoints).await;
            info!(
                "Simulated transport up: {} termini, polling every {} ms",
                endpoints.len(),
                config.polling.poll_interval_ms
            );
            Ok(manager)
        }
        other => Err(anyhow::anyhow!(
            "Unknown transport backend '{}' (supported: sim)",
            other
        )),
    }
}

/// Let every terminus complete at least one full round-robin sweep, then
/// print what the scheduler read.
async fn run_test_sweep(manager: &Arc<Manager>, config: &DaemonConfig) -> Result<()> {
    info!("Running in test mode");

    let mut max_sensors = 0;
    for tid in manager.tids().await {
        if let Some(terminus) = manager.terminus(tid).await {
            max_sensors = max_sensors.max(terminus.sensors.len());
        }
    }

    let cycles = (max_sensors / config.polling.poll_batch_size.max(1)) + 2;
    let wait = Duration::from_millis(config.polling.poll_interval_ms) * cycles as u32;
    tokio::time::sleep(wait).await;

    for tid in manager.tids().await {
        let terminus = match manager.terminus(tid).await {
            Some(t) => t,
            None => continue,
        };
        println!("TID {} '{}' (EID {}):", tid, terminus.name, terminus.eid);
        for sensor in &terminus.sensors {
            match sensor.reading().await {
                Some(value) => println!("  {:24} {:>8.1} {}", sensor.name, value, sensor.unit),
                None => println!("  {:24} {:>8} {}", sensor.name, "n/a", sensor.unit),
            }
        }
        manager.stop_sensor_polling(tid).await;
    }

    Ok(())
}

async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                tokio::signal::ctrl_c().await.ok();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Shutdown signal received (Ctrl+C)"),
            _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown signal received (Ctrl+C)");
    }
}
