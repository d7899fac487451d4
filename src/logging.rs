//! Tracing setup.
//!
//! `helpdesk serve` writes to a timestamped file under the state directory
//! when `logging.to_file` is set. One-shot commands always log to stderr so
//! stdout stays clean for `--json` output.

use anyhow::Result;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Keeps the file writer alive; drop it only at exit
pub struct LoggingHandle {
    pub _guard: Option<WorkerGuard>,

    /// Set when logs go to a file
    pub log_file_path: Option<PathBuf>,
}

/// Configured level, or `debug` under `--debug`
pub fn effective_level(config: &Config, debug_override: bool) -> String {
    if debug_override {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    }
}

/// `helpdesk-20240506T070809Z.log`
pub fn log_file_name(started: chrono::DateTime<chrono::Utc>) -> String {
    format!("helpdesk-{}.log", started.format("%Y%m%dT%H%M%SZ"))
}

/// Directory for file logs, if this run should write any
pub fn log_dir(config: &Config, is_server_mode: bool) -> Option<PathBuf> {
    (is_server_mode && config.logging.to_file).then(|| config.logs_path())
}

/// `RUST_LOG` wins over the configured level
fn env_filter(level: String) -> EnvFilter {
    EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(level))
}

pub fn init_logging(
    config: &Config,
    is_server_mode: bool,
    debug_override: bool,
) -> Result<LoggingHandle> {
    let filter = env_filter(effective_level(config, debug_override));

    let Some(dir) = log_dir(config, is_server_mode) else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
        return Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        });
    };

    std::fs::create_dir_all(&dir)?;
    let file_name = log_file_name(chrono::Utc::now());
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, &file_name));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();

    Ok(LoggingHandle {
        _guard: Some(guard),
        log_file_path: Some(dir.join(file_name)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_server_logs_go_under_state_dir() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        config.logging.to_file = true;

        let dir = log_dir(&config, true).unwrap();
        assert!(dir.ends_with("logs"));
        assert!(dir.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_cli_and_disabled_file_logging_use_stderr() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        config.logging.to_file = true;
        assert!(log_dir(&config, false).is_none());

        config.logging.to_file = false;
        assert!(log_dir(&config, true).is_none());
    }

    #[test]
    fn test_log_file_name_format() {
        let started = chrono::Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        assert_eq!(log_file_name(started), "helpdesk-20240506T070809Z.log");
    }

    #[test]
    fn test_debug_flag_overrides_configured_level() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        config.logging.level = "warn".to_string();

        assert_eq!(effective_level(&config, false), "warn");
        assert_eq!(effective_level(&config, true), "debug");
    }
}
