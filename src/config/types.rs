//! Daemon configuration structs and defaults.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub daemon: DaemonSettings,
    pub polling: PollingSettings,
    pub transport: TransportSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Sensor polling interval in milliseconds, process-wide for all termini.
    pub poll_interval_ms: u64,
    /// Sensors read per poll cycle. 1 bounds a cycle to one command
    /// round-trip; larger batches trade tick latency for sweep speed.
    #[serde(default = "default_poll_batch_size")]
    pub poll_batch_size: usize,
}

pub fn default_poll_batch_size() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Transport backend; "sim" serves simulated termini for bring-up.
    pub backend: String,
    pub sim_termini: u8,
    pub sim_sensors_per_terminus: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub enable_file_logging: bool,
    pub log_file: String,
    pub max_log_size_mb: u32,
    pub log_retention_days: u32,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            daemon: DaemonSettings {
                name: "platmond".to_string(),
                log_level: "INFO".to_string(),
            },
            polling: PollingSettings {
                poll_interval_ms: 250,
                poll_batch_size: 1,
            },
            transport: TransportSettings {
                backend: "sim".to_string(),
                sim_termini: 2,
                sim_sensors_per_terminus: 3,
            },
            logging: LoggingSettings {
                enable_file_logging: true,
                log_file: "/var/log/platmond/platmond.log".to_string(),
                max_log_size_mb: 10,
                log_retention_days: 7,
            },
        }
    }
}
