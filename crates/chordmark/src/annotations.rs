//! Score annotations: the chord figures and key handed over by the score decoder.
//!
//! On disk these live in a JSON sidecar next to the MIDI file
//! (`song.mid` → `song.chords.json`):
//!
//! ```json
//! { "key": "E-", "chords": [ { "figure": "Cmaj7", "offset": 0.0 } ] }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix replacing `.mid` for the sidecar file.
pub const SIDECAR_SUFFIX: &str = "chords.json";

/// A raw chord figure at an offset in quarter-note beats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordAnnotation {
    pub figure: String,
    pub offset: f64,
}

impl ChordAnnotation {
    pub fn new(figure: impl Into<String>, offset: f64) -> Self {
        Self {
            figure: figure.into(),
            offset,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub chords: Vec<ChordAnnotation>,
}

impl ScoreAnnotations {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::Annotations(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Where the sidecar for a MIDI file is expected.
    pub fn sidecar_path(midi: &Path) -> PathBuf {
        midi.with_extension(SIDECAR_SUFFIX)
    }
}
