//! Global tracing subscriber setup.
//!
//! See [`setup_logging()`].

use std::{
    backtrace::{Backtrace, BacktraceStatus},
    error::Error,
    panic::PanicInfo,
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
};

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::{FromEnvError, ParseError},
    layer::SubscriberExt,
    EnvFilter, Registry,
};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Minimum level of the events that are logged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// How often to start a new log file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum LogFileRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<LogFileRotation> for Rotation {
    fn from(value: LogFileRotation) -> Self {
        match value {
            LogFileRotation::Minutely => Rotation::MINUTELY,
            LogFileRotation::Hourly => Rotation::HOURLY,
            LogFileRotation::Daily => Rotation::DAILY,
            LogFileRotation::Never => Rotation::NEVER,
        }
    }
}

/// Settings to write logs to files as well as the console.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogFileConfig {
    /// Directory the log files are written to.
    pub directory: PathBuf,
    /// Beginning of the file names, e.g. `game.log`. A timestamp is appended when rotating.
    pub file_name_prefix: String,
    /// How often to rotate files.
    #[serde(default)]
    pub rotation: LogFileRotation,
    /// Delete the oldest matching files beyond this count.
    #[serde(default)]
    pub max_log_files: Option<usize>,
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogSettings {
    /// Extra directives in the [`EnvFilter`] format, e.g. `cro_render=debug`.
    ///
    /// Ignored when the `RUST_LOG` environment variable is set.
    pub filter: String,
    /// Filters out events below this level.
    pub level: LogLevel,
    /// Also write logs to files.
    pub log_file: Option<LogFileConfig>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: String::new(),
            level: LogLevel::Info,
            log_file: None,
        }
    }
}

impl LogSettings {
    /// The filter directives used when `RUST_LOG` is not set.
    pub fn directives(&self) -> String {
        let level = Level::from(self.level);
        if self.filter.is_empty() {
            level.to_string()
        } else {
            format!("{level},{}", self.filter)
        }
    }
}

/// Keeps the file logging thread alive. Logs stop being written to files when it is dropped.
pub struct LogFileGuard(tracing_appender::non_blocking::WorkerGuard);

impl Drop for LogFileGuard {
    fn drop(&mut self) {
        tracing::warn!("LogFileGuard dropped, no further logs will be written to file");
    }
}

/// Install the global tracing subscriber and a panic hook that logs panics.
///
/// Only the first call has an effect. If file logging is configured and could be set up, the
/// returned guard must be kept alive for as long as logs should be written.
#[must_use]
pub fn setup_logging(settings: &LogSettings) -> Option<LogFileGuard> {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        return None;
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        tracing_panic_hook(panic_info);
        prev_hook(panic_info);
    }));

    let directives = settings.directives();
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|from_env_error| {
            if let Some(parse_err) = from_env_error
                .source()
                .and_then(|source| source.downcast_ref::<ParseError>())
            {
                // The subscriber is not installed yet.
                eprintln!("setup_logging() failed to parse filter from env: {parse_err}");
            }
            Ok::<EnvFilter, FromEnvError>(EnvFilter::builder().parse_lossy(&directives))
        })
        .unwrap_or_else(|_| EnvFilter::new(&directives));

    let (file_layer, guard) = match &settings.log_file {
        Some(config) => {
            let appender = RollingFileAppender::builder()
                .filename_prefix(&config.file_name_prefix)
                .rotation(config.rotation.into());
            let appender = match config.max_log_files {
                Some(max) => appender.max_log_files(max),
                None => appender,
            };
            match appender.build(&config.directory) {
                Ok(appender) => {
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    let layer = tracing_subscriber::fmt::Layer::default()
                        .with_ansi(false)
                        .with_writer(writer);
                    (Some(layer), Some(LogFileGuard(guard)))
                }
                Err(err) => {
                    eprintln!("Failed to set up logging to {:?}: {err}", config.directory);
                    (None, None)
                }
            }
        }
        None => (None, None),
    };

    let subscriber = Registry::default()
        .with(filter_layer)
        .with(file_layer)
        .with(tracing_subscriber::fmt::Layer::default());

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        tracing::error!("{err} - a global subscriber was installed before `setup_logging`");
    }

    guard
}

/// Panic hook that sends the panic payload and location to [`tracing::error!`], with a
/// backtrace if enabled.
pub fn tracing_panic_hook(panic_info: &PanicInfo) {
    let payload = panic_info.payload();
    let payload = if let Some(s) = payload.downcast_ref::<&str>() {
        Some(*s)
    } else {
        payload.downcast_ref::<String>().map(|s| s.as_str())
    };

    let location = panic_info.location().map(|l| l.to_string());
    let backtrace = Backtrace::capture();
    let note = (backtrace.status() == BacktraceStatus::Disabled)
        .then_some("run with RUST_BACKTRACE=1 environment variable to display a backtrace");

    tracing::error!(
        panic.payload = payload,
        panic.location = location,
        panic.backtrace = %backtrace,
        panic.note = note,
        "A panic occurred",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_combine_level_and_filter() {
        assert_eq!(LogSettings::default().directives(), "INFO");
        let settings = LogSettings {
            filter: "cro_render=trace".into(),
            level: LogLevel::Warn,
            log_file: None,
        };
        assert_eq!(settings.directives(), "WARN,cro_render=trace");
    }

    #[test]
    fn second_setup_is_a_no_op() {
        let _first = setup_logging(&LogSettings::default());
        assert!(INITIALIZED.load(Ordering::Acquire));
        assert!(setup_logging(&LogSettings::default()).is_none());
    }
}
