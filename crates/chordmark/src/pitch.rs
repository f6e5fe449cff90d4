use serde::{Deserialize, Serialize};
use std::fmt;

/// One canonical spelling per pitch class. Sharps only for F#.
const CANONICAL_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Natural note letters and their pitch classes.
pub(crate) static NATURALS: &[(&str, u8)] = &[
    ("C", 0),
    ("D", 2),
    ("E", 4),
    ("F", 5),
    ("G", 7),
    ("A", 9),
    ("B", 11),
];

/// Accidental glyphs and their semitone offsets. Double sharp has two spellings.
pub(crate) static ACCIDENTALS: &[(&str, i8)] = &[
    ("b", -1),
    ("#", 1),
    ("bb", -2),
    ("##", 2),
    ("x", 2),
];

/// The flat glyph used in every marker text.
pub const FLAT: char = 'b';

/// A pitch class 0–11 (C=0, Db=1, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PitchClass(u8);

impl PitchClass {
    /// Reduce any semitone count into a pitch class.
    pub fn new(semitones: i32) -> Self {
        Self(semitones.rem_euclid(12) as u8)
    }

    /// Canonical spelling: "Db" for class 1, "F#" for class 6.
    pub fn name(self) -> &'static str {
        CANONICAL_NAMES[self.0 as usize]
    }

    /// Look up a canonical spelling. Only the twelve canonical names are accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        CANONICAL_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| Self(i as u8))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<PitchClass> for String {
    fn from(pc: PitchClass) -> Self {
        pc.name().to_string()
    }
}

impl TryFrom<String> for PitchClass {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_name(&value).ok_or_else(|| format!("not a canonical pitch name: {value}"))
    }
}

/// Rewrite hyphens used as flat signs into the canonical flat glyph.
///
/// A run of hyphens right after the leading letter is a run of flats
/// (`B-7` → `Bb7`, `B--` → `Bbb`). A hyphen right after an explicit
/// accidental in that position is a separator and is dropped
/// (`Db-7` → `Db7`). Every other hyphen is a flat (`Bm7-5` → `Bm7b5`).
pub fn normalize_flats(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    let Some(first) = chars.next() else {
        return out;
    };
    out.push(first);

    if chars.peek() == Some(&'-') {
        while chars.next_if_eq(&'-').is_some() {
            out.push(FLAT);
        }
    } else {
        let mut saw_accidental = false;
        while let Some(c) = chars.next_if(|c| matches!(c, 'b' | '#' | 'x')) {
            out.push(c);
            saw_accidental = true;
        }
        if saw_accidental {
            while chars.next_if_eq(&'-').is_some() {}
        }
    }

    out.extend(chars.map(|c| if c == '-' { FLAT } else { c }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_spellings() {
        assert_eq!(PitchClass::new(1).name(), "Db");
        assert_eq!(PitchClass::new(6).name(), "F#");
        assert_eq!(PitchClass::new(-1).name(), "B");
        assert_eq!(PitchClass::new(13).name(), "Db");
    }

    #[test]
    fn from_name_only_accepts_canonical() {
        assert_eq!(PitchClass::from_name("Eb"), Some(PitchClass::new(3)));
        assert_eq!(PitchClass::from_name("D#"), None);
    }

    #[test]
    fn hyphens_after_letter_are_flats() {
        assert_eq!(normalize_flats("B-7"), "Bb7");
        assert_eq!(normalize_flats("B--"), "Bbb");
        assert_eq!(normalize_flats("e-"), "eb");
    }

    #[test]
    fn hyphen_after_accidental_is_separator() {
        assert_eq!(normalize_flats("Db-7"), "Db7");
        assert_eq!(normalize_flats("F#-m"), "F#m");
    }

    #[test]
    fn other_hyphens_are_flats() {
        assert_eq!(normalize_flats("Bm7-5"), "Bm7b5");
        assert_eq!(normalize_flats("C"), "C");
        assert_eq!(normalize_flats(""), "");
    }
}
