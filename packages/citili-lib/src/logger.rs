use std::{fmt::Display, fs::File, str::FromStr, sync::Mutex};

use anyhow::Context;
use chrono::Local;
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt::writer::MakeWriterExt};

use crate::config::LoggerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_string(&self) -> ColoredString {
        match self {
            LogLevel::Debug => "DBG".bright_cyan(),
            LogLevel::Info => "INF".bright_green(),
            LogLevel::Warn => "WAR".yellow(),
            LogLevel::Error => "ERR".bright_red(),
        }
    }

    /// The directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "info" | "inf" => Ok(LogLevel::Info),
            "warn" | "warning" | "war" => Ok(LogLevel::Warn),
            "error" | "err" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "Debug"),
            LogLevel::Info => write!(f, "Info"),
            LogLevel::Warn => write!(f, "Warn"),
            LogLevel::Error => write!(f, "Error"),
        }
    }
}

/// Installs the global `tracing` subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level. When file logging
/// is enabled, every line is also written without colors to
/// `./logs/citili_run_<timestamp>.txt`, and the path of that file is
/// returned.
pub fn init_tracing(config: &LoggerConfig) -> anyhow::Result<Option<String>> {
    if !*config.get_enabled() {
        return Ok(None);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.get_log_level().as_filter_directive()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if *config.get_log_file() {
        let log_file_path = format!(
            "./logs/citili_run_{}.txt",
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        );
        std::fs::create_dir_all("./logs").context("failed to create ./logs")?;
        let file = File::create(&log_file_path)
            .with_context(|| format!("failed to create log file: {}", log_file_path))?;

        builder
            .with_ansi(false)
            .with_writer(std::io::stderr.and(Mutex::new(file)))
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

        Ok(Some(log_file_path))
    } else {
        builder
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

        Ok(None)
    }
}

#[test]
fn test_log_level_from_str() {
    assert_eq!("dbg".parse::<LogLevel>(), Ok(LogLevel::Debug));
    assert_eq!("Warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
    assert!("loud".parse::<LogLevel>().is_err());
}
