use crate::logging::LogFormat;
use crate::report::ReportStyle;

/// Environment variable consulted for the log filter.
pub const LOG_FILTER_ENV: &str = "NAMEDVIEW_LOG_FILTER";

/// Environment variable consulted for the log format.
pub const LOG_FORMAT_ENV: &str = "NAMEDVIEW_LOG_FORMAT";

/// Environment variable consulted for the non-fatal report style.
pub const REPORT_STYLE_ENV: &str = "NAMEDVIEW_ERROR_REPORT";

/// Default log filter expression used by the binary.
///
/// Stdout carries the query protocol, so diagnostics stay quiet unless asked.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default log filter expression used by the binary.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Default logging format for the binary.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Default reporting shape for recoverable map and reduce failures.
#[must_use]
pub const fn default_report_style() -> ReportStyle {
    ReportStyle::Log
}
