//! Command-line argument definitions (clap) and help text.

use clap::Parser;

pub const HELP_TEXT: &str = "
Platmond Platform Monitoring Daemon
Usage: platmond [OPTIONS]

Options:
  -h, --help                    Print help
  -V, --version                 Print version
Daemon Control:
  -s, --start                   Start the daemon in background
  -x, --stop                    Stop the daemon
  -r, --restart                 Restart the daemon
  -f, --foreground              Run in the foreground (no daemonization)
Status & Logs:
  -i, --status                  Show daemon status
  -l, --log-show [<LOG_SHOW>]   Show daemon logs (tail -f by default, or tail -n <lines> if provided)
      --log-level <LOG_LEVEL>   Set log level (TRACE, DEBUG, INFO, WARN, ERROR). Use with --start/--restart
Config & Debug:
  -c, --config                  Show current configuration
      --test                    Test mode (discovery plus one polling sweep)
";

#[derive(Parser, Debug)]
#[command(name = "platmond")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Platmond Platform Monitoring Daemon", long_about = None)]
#[command(after_help = "")]
#[command(disable_help_flag = false)]
pub struct Args {
    // === Daemon Control ===
    /// Start the daemon in background
    #[arg(short = 's', long, help_heading = "Daemon Control")]
    pub start: bool,

    /// Stop the daemon
    #[arg(short = 'x', long, help_heading = "Daemon Control")]
    pub stop: bool,

    /// Restart the daemon
    #[arg(short = 'r', long, help_heading = "Daemon Control")]
    pub restart: bool,

    /// Run in the foreground (no daemonization)
    #[arg(short = 'f', long, help_heading = "Daemon Control")]
    pub foreground: bool,

    // === Status & Logs ===
    /// Show daemon status
    #[arg(short = 'i', long = "status", help_heading = "Status & Logs")]
    pub status: bool,

    /// Show daemon logs (tail -f by default, or tail -n <lines> if provided)
    #[arg(short = 'l', long = "log-show", help_heading = "Status & Logs")]
    pub log_show: Option<Option<usize>>,

    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR). Use with --start/--restart
    #[arg(long = "log-level", help_heading = "Status & Logs")]
    pub log_level: Option<String>,

    // === Config & Debug ===
    /// Show current configuration
    #[arg(short = 'c', long, help_heading = "Config & Debug")]
    pub config: bool,

    /// Test mode (discovery plus one polling sweep)
    #[arg(long, help_heading = "Config & Debug")]
    pub test: bool,

    /// Internal flag for daemon child process (do not use directly)
    #[arg(long, hide = true)]
    pub daemon_child: bool,
}
