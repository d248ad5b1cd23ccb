//! Logging system configuration and initialization
//!
//! - Console output and/or a non-blocking file writer
//! - Optional JSON formatting for the file layer
//! - `RUST_LOG` overrides the configured filter entirely
//!
//! Verbose dependencies (sqlx statements, CDP traffic) are held at `warn`
//! unless the configured level is `trace`.

#![allow(clippy::uninlined_format_args)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use lazy_static::lazy_static;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

// Keeps the file writer alive for the lifetime of the process
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> =
        Mutex::new(Vec::new());
}

/// Log directory next to the executable
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Builds the filter used when `RUST_LOG` is not set.
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.to_lowercase().contains("trace") {
        for (module, level) in &config.module_filters {
            let directive = format!("{}={}", module, level)
                .parse()
                .map_err(|e| anyhow!("Invalid module filter {}={}: {}", module, level, e))?;
            filter = filter.add_directive(directive);
        }
    }

    Ok(filter)
}

/// Initialize logging with custom configuration
///
/// ```bash
/// # Show every SQL statement regardless of the configured level
/// RUST_LOG="debug,sqlx::query=debug" jobs-harvester
/// ```
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_env_filter(config)?,
    };
    let registry = Registry::default().with(env_filter);

    let log_dir = config
        .log_directory
        .clone()
        .unwrap_or_else(get_log_directory);

    let file_writer = if config.file_output {
        std::fs::create_dir_all(&log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        let file_appender = rolling::never(&log_dir, &config.file_name);
        let (writer, guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(guard);
        Some(writer)
    } else {
        None
    };

    match (file_writer, config.json_format) {
        (Some(writer), true) => {
            let file_layer = fmt::Layer::new()
                .json()
                .with_writer(writer)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false);
            registry
                .with(file_layer)
                .with(console_layer(config.console_output))
                .try_init()?;
        }
        (Some(writer), false) => {
            let file_layer = fmt::Layer::new()
                .with_writer(writer)
                .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
                .with_target(false)
                .with_ansi(false);
            registry
                .with(file_layer)
                .with(console_layer(config.console_output))
                .try_init()?;
        }
        (None, _) if config.console_output => {
            registry.with(console_layer(true)).try_init()?;
        }
        (None, _) => return Err(anyhow!("No logging output configured")),
    }

    info!("Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", log_dir.join(&config.file_name));
    }
    Ok(())
}

fn console_layer<S>(enabled: bool) -> Option<Box<dyn Layer<S> + Send + Sync + 'static>>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    enabled.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(ChronoLocal::new(TIME_FORMAT.to_string()))
            .with_target(false)
            .boxed()
    })
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Jobs Harvester System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);
    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }
    info!("=========================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
        assert_eq!(config.module_filters.get("sqlx").map(String::as_str), Some("warn"));
    }

    #[test]
    fn test_log_directory_creation() {
        let log_dir = get_log_directory();
        assert!(log_dir.to_string_lossy().ends_with("logs"));
    }

    #[test]
    fn test_filter_accepts_module_directives() {
        let config = LoggingConfig::default();
        let filter = build_env_filter(&config).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("sqlx=warn"));
        assert!(rendered.contains("info"));
    }

    #[test]
    fn test_trace_level_skips_module_suppression() {
        let config = LoggingConfig {
            level: "trace".to_string(),
            ..LoggingConfig::default()
        };
        let filter = build_env_filter(&config).unwrap();
        assert!(!filter.to_string().contains("sqlx=warn"));
    }

    #[test]
    fn test_invalid_level_is_an_error() {
        let config = LoggingConfig {
            level: "sqlx=[".to_string(),
            ..LoggingConfig::default()
        };
        assert!(build_env_filter(&config).is_err());
    }

    #[test]
    fn test_no_output_is_rejected() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config).is_err());
    }
}
