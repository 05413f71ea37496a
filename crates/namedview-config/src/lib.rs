//! Shared configuration for the named view server.
//!
//! The query protocol owns stdin and stdout, so the only settings exposed
//! here are ambient ones: how diagnostics are logged to stderr and how
//! recoverable user-function failures are reported back to the driver.
//! Values come from command-line flags, then the environment variables
//! [`LOG_FILTER_ENV`], [`LOG_FORMAT_ENV`] and [`REPORT_STYLE_ENV`], then the
//! built-in defaults such as [`DEFAULT_LOG_FILTER`].

mod defaults;
mod logging;
mod report;

use std::ffi::OsString;

use clap::Parser;
use thiserror::Error;

pub use self::defaults::{
    DEFAULT_LOG_FILTER, LOG_FILTER_ENV, LOG_FORMAT_ENV, REPORT_STYLE_ENV, default_log_filter,
    default_log_format, default_report_style,
};
pub use self::logging::LogFormat;
pub use self::report::ReportStyle;

/// Runtime configuration for the view server binary.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(
    name = "namedview",
    version,
    about = "Query server that evaluates named design-document functions"
)]
pub struct Config {
    /// Tracing filter expression applied to stderr diagnostics.
    #[arg(long, env = LOG_FILTER_ENV, default_value = DEFAULT_LOG_FILTER)]
    log_filter: String,
    /// Format of stderr diagnostics (`json` or `compact`).
    #[arg(long, env = LOG_FORMAT_ENV, default_value_t = LogFormat::Json)]
    log_format: LogFormat,
    /// How map and reduce runtime failures are reported (`log` or `frame`).
    #[arg(long, env = REPORT_STYLE_ENV, default_value_t = ReportStyle::Log)]
    error_report: ReportStyle,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter().to_owned(),
            log_format: default_log_format(),
            error_report: default_report_style(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The command line could not be parsed.
    #[error("invalid command line: {0}")]
    CommandLine(#[from] clap::Error),
}

impl Config {
    /// Parses configuration from the process arguments, exiting with usage
    /// information when they are invalid.
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }

    /// Parses configuration from an explicit argument list.
    ///
    /// The first item is treated as the program name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CommandLine`] when the arguments are invalid,
    /// including `--help` and `--version` requests.
    pub fn load_from<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Ok(Self::try_parse_from(args)?)
    }

    /// Tracing filter expression for stderr diagnostics.
    #[must_use]
    pub const fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Output format for stderr diagnostics.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Reporting shape for recoverable map and reduce failures.
    #[must_use]
    pub const fn report_style(&self) -> ReportStyle {
        self.error_report
    }
}
