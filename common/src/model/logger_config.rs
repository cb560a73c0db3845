use serde::{Deserialize, Serialize};

/// Logger section of the config file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoggerConfig {
    /// Filter directive, e.g. `info` or `info,engine=debug`
    #[serde(default = "default_level")]
    pub level: String,
    /// Optional log file path; rotated daily
    pub file_path: Option<String>,
    /// Log to the console (default: true)
    #[serde(default = "default_console")]
    pub console: bool,
    /// Emit JSON lines instead of the compact text format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_path: None,
            console: default_console(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_console() -> bool {
    true
}
