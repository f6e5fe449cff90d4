//! Config sections: marker spelling, input selection, batch runs, logging.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Placement of a marker sharing a tick with original events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TieBreakPolicy {
    /// After every original event on that tick.
    Stable,
    /// Right before the first note-on on that tick.
    #[default]
    BeforeNoteOn,
}

impl TieBreakPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            TieBreakPolicy::Stable => "stable",
            TieBreakPolicy::BeforeNoteOn => "before-note-on",
        }
    }
}

impl fmt::Display for TieBreakPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TieBreakPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(TieBreakPolicy::Stable),
            "before-note-on" => Ok(TieBreakPolicy::BeforeNoteOn),
            other => Err(format!(
                "unknown tie_break {other:?} (expected \"stable\" or \"before-note-on\")"
            )),
        }
    }
}

/// How marker text is spelled and placed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkersConfig {
    /// Prefix for chord markers, e.g. "Chord" gives "Chord_C_major".
    #[serde(default)]
    pub chord_prefix: Option<String>,

    /// Prefix for the key marker.
    #[serde(default)]
    pub key_prefix: Option<String>,

    #[serde(default)]
    pub tie_break: TieBreakPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Track to annotate. Unset: first track with notes.
    #[serde(default)]
    pub track: Option<usize>,
}

/// Batch conversion of a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Concurrent conversions.
    /// Default: available parallelism
    #[serde(default = "BatchConfig::default_jobs")]
    pub jobs: usize,

    /// Re-annotate files whose output already exists.
    /// Unset means no; a later config can set it back to false.
    #[serde(default)]
    pub overwrite: Option<bool>,

    /// Failure list written into the output directory.
    /// Default: failed.txt
    #[serde(default = "BatchConfig::default_failed_list")]
    pub failed_list: String,
}

impl BatchConfig {
    pub(crate) fn default_jobs() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    pub(crate) fn default_failed_list() -> String {
        "failed.txt".to_string()
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite.unwrap_or(false)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            jobs: Self::default_jobs(),
            overwrite: None,
            failed_list: Self::default_failed_list(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive.
    /// Default: info
    #[serde(default = "LoggingConfig::default_log_level")]
    pub log_level: String,
}

impl LoggingConfig {
    pub(crate) fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}
