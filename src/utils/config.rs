use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the durable JSON collections
    pub state_dir: PathBuf,

    /// Port for the run API server
    pub port: u16,

    /// Run browsers headless
    pub headless: bool,

    /// Default timeout for verify steps (ms)
    pub default_timeout_ms: u64,

    /// Interval between liveness sweeps of the running-test registry (s)
    pub sweep_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".stepflow"),
            port: 9333,
            headless: false,
            default_timeout_ms: 5000,
            sweep_interval_secs: 30,
        }
    }
}
