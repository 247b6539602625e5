use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use wattwise_core::config::{EngineConfig, LoadOptions, LogFormat};

fn init_logging(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    // Commands report config errors themselves; logging falls back to defaults.
    let config = EngineConfig::load(LoadOptions::default()).unwrap_or_default();
    init_logging(&config);

    wattwise_cli::run()
}
