//! Tracing subscriber configuration.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Full format with timestamp, level, target and spans.
    #[default]
    Full,
    /// Compact format with minimal metadata.
    Compact,
    /// JSON format for log aggregation.
    Json,
}

/// Stdout logging configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdoutLogConfig {
    /// Output format.
    pub format: LogFormat,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Level applied when `RUST_LOG` is not set.
    pub global_level: LevelFilter,
    /// Stdout logging, `None` to disable.
    pub stdout_logs: Option<StdoutLogConfig>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            global_level: LevelFilter::INFO,
            stdout_logs: Some(StdoutLogConfig { format: LogFormat::Full }),
        }
    }
}

impl LogConfig {
    /// Installs the global tracing subscriber.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber is already installed.
    pub fn init_tracing_subscriber(&self) -> eyre::Result<()> {
        let filter = EnvFilter::builder()
            .with_default_directive(self.global_level.into())
            .from_env_lossy();

        let stdout = self.stdout_logs.map(|cfg| {
            let layer = tracing_subscriber::fmt::layer();
            match cfg.format {
                LogFormat::Full => layer.boxed(),
                LogFormat::Compact => layer.compact().boxed(),
                LogFormat::Json => layer.json().boxed(),
            }
        });

        tracing_subscriber::registry().with(stdout).with(filter).try_init()?;
        Ok(())
    }
}

/// Maps a verbosity count to a level filter.
///
/// 0 disables logging, 1=ERROR, 2=WARN, 3=INFO, 4=DEBUG, 5+ TRACE.
pub const fn verbosity_to_level_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::ERROR,
        2 => LevelFilter::WARN,
        3 => LevelFilter::INFO,
        4 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(verbosity_to_level_filter(0), LevelFilter::OFF);
        assert_eq!(verbosity_to_level_filter(1), LevelFilter::ERROR);
        assert_eq!(verbosity_to_level_filter(3), LevelFilter::INFO);
        assert_eq!(verbosity_to_level_filter(5), LevelFilter::TRACE);
        assert_eq!(verbosity_to_level_filter(42), LevelFilter::TRACE);
    }

    #[test]
    fn test_default_config_logs_to_stdout() {
        let config = LogConfig::default();
        assert_eq!(config.global_level, LevelFilter::INFO);
        assert_eq!(config.stdout_logs, Some(StdoutLogConfig { format: LogFormat::Full }));
    }
}
