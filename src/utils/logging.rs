//! Logging Module
//!
//! Provides structured logging utilities using the `tracing` crate,
//! plus a small stage logger used by the pipeline.

use std::str::FromStr;
use std::time::Instant;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Create a verbose logging config for debugging
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            ansi_colors: true,
        }
    }

    /// Create a quiet logging config (errors only)
    pub fn quiet() -> Self {
        Self {
            level: LogLevel::Error,
            include_target: false,
            ansi_colors: true,
        }
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Initialize logging with the given configuration
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level.to_tracing_level())
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Timing logger for the sequential pipeline stages
pub struct StageLogger {
    /// Number of stages in the run
    total_stages: usize,
    /// Index of the current stage (1-based once started)
    current: usize,
    /// Stage start time
    stage_start: Instant,
    /// Run start time
    run_start: Instant,
}

impl StageLogger {
    /// Create a new stage logger
    pub fn new(total_stages: usize) -> Self {
        Self {
            total_stages,
            current: 0,
            stage_start: Instant::now(),
            run_start: Instant::now(),
        }
    }

    /// Log the start of the next stage
    pub fn start_stage(&mut self, name: &str) {
        self.current += 1;
        self.stage_start = Instant::now();

        tracing::info!("Stage {}/{} started: {}", self.current, self.total_stages, name);
    }

    /// Log the end of the current stage
    pub fn end_stage(&self, summary: &str) {
        tracing::info!(
            "Stage {}/{} finished in {:.1}s | {}",
            self.current,
            self.total_stages,
            self.stage_start.elapsed().as_secs_f64(),
            summary
        );
    }

    /// Log a stage that halted the run
    pub fn log_halt(&self, reason: &str) {
        tracing::warn!(
            "Pipeline halted at stage {}/{}: {}",
            self.current,
            self.total_stages,
            reason
        );
    }

    /// Seconds since the logger was created
    pub fn elapsed_secs(&self) -> f64 {
        self.run_start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("debug".parse::<LogLevel>(), Ok(LogLevel::Debug));
        assert_eq!("INFO".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("Warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("unknown".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_log_config_presets() {
        assert_eq!(LogConfig::default().level, LogLevel::Info);
        assert_eq!(LogConfig::verbose().level, LogLevel::Debug);
        assert_eq!(LogConfig::quiet().level, LogLevel::Error);
    }

    #[test]
    fn test_stage_logger_counts_stages() {
        let mut logger = StageLogger::new(4);
        logger.start_stage("download");
        logger.end_stage("10 images");
        logger.start_stage("process");
        assert_eq!(logger.current, 2);
        assert!(logger.elapsed_secs() >= 0.0);
    }
}
