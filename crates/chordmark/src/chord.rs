//! Chord-symbol normalization.
//!
//! Reduces a raw chord figure such as `"E-7"`, `"C#maj7/G"` or
//! `"Bbm7 add 11"` to a canonical `(root, quality)` pair. Bass notes and
//! space-separated alterations are discarded; unrecognized quality text
//! rejects the figure rather than defaulting to major.

use crate::pitch::{normalize_flats, PitchClass, ACCIDENTALS, NATURALS};
use crate::quality::Quality;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Figures the score decoder emits for "no chord here".
pub const NON_CHORD_SENTINELS: &[&str] = &[
    "N.C.",
    "N.C",
    "NC",
    "Chord Symbol Cannot Be Identified",
];

/// Separator between root and quality (and any prefix) in marker text.
pub const SEPARATOR: char = '_';

/// A normalized chord: canonical root spelling plus quality tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chord {
    pub root: PitchClass,
    pub quality: Quality,
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.root, SEPARATOR, self.quality)
    }
}

/// Candidate tokens ordered longest first, so a scan returns the longest match.
struct Lexicon<T: 'static> {
    entries: Vec<(&'static str, T)>,
}

impl<T: Copy + 'static> Lexicon<T> {
    fn new(table: &'static [(&'static str, T)]) -> Self {
        let mut entries = table.to_vec();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    /// Longest token that prefixes `text`, with the remaining suffix.
    fn longest_prefix<'t>(&self, text: &'t str) -> Option<(T, &'t str)> {
        self.entries
            .iter()
            .find_map(|(token, value)| text.strip_prefix(token).map(|rest| (*value, rest)))
    }
}

fn letters() -> &'static Lexicon<u8> {
    static LETTERS: OnceLock<Lexicon<u8>> = OnceLock::new();
    LETTERS.get_or_init(|| Lexicon::new(NATURALS))
}

fn accidentals() -> &'static Lexicon<i8> {
    static ACC: OnceLock<Lexicon<i8>> = OnceLock::new();
    ACC.get_or_init(|| Lexicon::new(ACCIDENTALS))
}

/// Normalize a chord figure, or `None` for non-chords and unknown qualities.
pub fn normalize(raw: &str) -> Option<Chord> {
    let text = normalize_flats(raw.trim());

    if text.is_empty() || NON_CHORD_SENTINELS.contains(&text.as_str()) {
        return None;
    }
    if !text.starts_with(|c: char| matches!(c, 'A'..='G')) {
        return None;
    }

    let figure = text.split(' ').next().unwrap_or_default();
    let figure = figure.split('/').next().unwrap_or_default();

    let (natural, rest) = letters().longest_prefix(figure)?;
    let (offset, quality_text) = accidentals()
        .longest_prefix(rest)
        .unwrap_or((0, rest));

    let quality = Quality::from_alias(quality_text)?;
    let root = PitchClass::new(i32::from(natural) + i32::from(offset));

    Some(Chord { root, quality })
}
