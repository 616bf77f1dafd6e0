use super::config::LoggingConfig;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` wins over the configured level
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| format!("Invalid log level '{}': {}", config.level, e).into())
}

/// Install the global subscriber, writing to stderr or the configured file
///
/// Calling this twice is harmless; the first subscriber stays installed.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    let installed = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create log directory: {}", e))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file '{}': {}", path.display(), e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("global subscriber already installed");
    }
    Ok(())
}
