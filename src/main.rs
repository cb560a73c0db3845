use log::{error, info};
use oprelay::prelude::*;
use std::env;
use std::path::Path;
use std::process::ExitCode;

const CONFIG_ENV: &str = "OPRELAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn load_config() -> Result<Config> {
    let path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    if Path::new(&path).exists() {
        Config::load(&path)
    } else {
        eprintln!("Config file {path} not found, using defaults");
        Ok(Config::default())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    let logger = match &config.logger {
        Some(settings) => LoggerConfig::from_settings(settings),
        None => LoggerConfig::for_app(&config.name),
    };
    if let Err(e) = logger.init() {
        eprintln!("Failed to initialize logger: {e}");
    }
    info!("Starting {} with config {:?}", config.name, config);

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start: {e}");
            return ExitCode::FAILURE;
        }
    };

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server exited with error: {e}");
            ExitCode::FAILURE
        }
    }
}
