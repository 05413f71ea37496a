//! How recoverable user-function failures are surfaced to the driver.

use strum::{Display, EnumString};

/// Wire shape used for non-fatal map and reduce failures.
///
/// Either shape leaves the failing slot neutral (`[]` for map, `null` for
/// reduce) and lets the batch continue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReportStyle {
    /// `["log", "Ignored error, <where>, <info>"]`.
    #[default]
    Log,
    /// `["error", <where>, <info>]` without terminating the session.
    Frame,
}
