use strum::{Display, EnumString};

/// Shape of the diagnostics written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// One terse human-readable line per event.
    Compact,
}
