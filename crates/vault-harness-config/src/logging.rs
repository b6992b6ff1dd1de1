use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Output formats understood by the harness telemetry subscriber.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// One JSON object per event, for CI log collectors.
    Json,
    /// Single-line human output; the default because the harness mostly runs
    /// under `cargo test` and interactive shells.
    #[default]
    Compact,
}

impl LogFormat {
    /// Returns `true` when events should be rendered as JSON.
    #[must_use]
    pub const fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

/// Errors encountered while parsing a [`LogFormat`] from text.
pub type LogFormatParseError = strum::ParseError;
