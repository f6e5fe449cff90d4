use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Canonical chord quality tags.
///
/// Extension numerals (9, 11, 13) are folded into the seventh family of
/// their base chord; they never produce a tag of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Quality {
    Major,
    Minor,
    Diminished,
    Augmented,
    Suspended,
    MajorSeventh,
    DominantSeventh,
    MinorMajorSeventh,
    MinorSeventh,
    DiminishedSeventh,
    HalfDiminishedSeventh,
    AugmentedSeventh,
}

/// Quality family → accepted spellings. Case-sensitive: `M` is major, `m` is minor.
static ALIASES: &[(Quality, &[&str])] = &[
    (Quality::Major, &["", "M", "maj", "major", "6"]),
    (Quality::Minor, &["m", "min", "minor", "m6"]),
    (Quality::Diminished, &["dim", "o", "°"]),
    (Quality::Augmented, &["aug", "+"]),
    (Quality::Suspended, &["sus", "sus4", "sus2", "7sus", "7sus4"]),
    (
        Quality::MajorSeventh,
        &[
            "M7", "maj7", "Maj7", "Δ", "Δ7", "M9", "maj9", "M11", "maj11", "M13", "maj13",
        ],
    ),
    (
        Quality::DominantSeventh,
        &["7", "dom7", "Mm7", "9", "dom9", "11", "13"],
    ),
    (
        Quality::MinorMajorSeventh,
        &["mM7", "m(M7)", "mmaj7", "m(maj7)", "minmaj7", "m#7"],
    ),
    (
        Quality::MinorSeventh,
        &["m7", "min7", "m9", "min9", "m11", "m13"],
    ),
    (Quality::DiminishedSeventh, &["dim7", "o7", "°7"]),
    (Quality::HalfDiminishedSeventh, &["ø", "ø7", "m7b5"]),
    (Quality::AugmentedSeventh, &["7+", "+7", "aug7", "7#5"]),
];

fn alias_index() -> &'static HashMap<&'static str, Quality> {
    static INDEX: OnceLock<HashMap<&'static str, Quality>> = OnceLock::new();
    INDEX.get_or_init(|| {
        ALIASES
            .iter()
            .flat_map(|(quality, spellings)| spellings.iter().map(move |s| (*s, *quality)))
            .collect()
    })
}

impl Quality {
    pub const ALL: [Quality; 12] = [
        Quality::Major,
        Quality::Minor,
        Quality::Diminished,
        Quality::Augmented,
        Quality::Suspended,
        Quality::MajorSeventh,
        Quality::DominantSeventh,
        Quality::MinorMajorSeventh,
        Quality::MinorSeventh,
        Quality::DiminishedSeventh,
        Quality::HalfDiminishedSeventh,
        Quality::AugmentedSeventh,
    ];

    /// Tag written into marker text.
    pub fn tag(&self) -> &'static str {
        match self {
            Quality::Major => "major",
            Quality::Minor => "minor",
            Quality::Diminished => "diminished",
            Quality::Augmented => "augmented",
            Quality::Suspended => "suspended",
            Quality::MajorSeventh => "major-seventh",
            Quality::DominantSeventh => "dominant-seventh",
            Quality::MinorMajorSeventh => "minor-major-seventh",
            Quality::MinorSeventh => "minor-seventh",
            Quality::DiminishedSeventh => "diminished-seventh",
            Quality::HalfDiminishedSeventh => "half-diminished-seventh",
            Quality::AugmentedSeventh => "augmented-seventh",
        }
    }

    /// Every spelling that resolves to this quality.
    pub fn aliases(&self) -> &'static [&'static str] {
        ALIASES
            .iter()
            .find(|(q, _)| q == self)
            .map(|(_, spellings)| *spellings)
            .unwrap_or(&[])
    }

    /// Resolve quality text (the part of a figure after root and accidental).
    pub fn from_alias(text: &str) -> Option<Quality> {
        alias_index().get(text).copied()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_quality_has_aliases() {
        for q in Quality::ALL {
            assert!(!q.aliases().is_empty(), "{q} has no spellings");
        }
    }

    #[test]
    fn aliases_are_unambiguous() {
        let mut seen = HashSet::new();
        for (_, spellings) in ALIASES {
            for s in *spellings {
                assert!(seen.insert(*s), "spelling {s:?} listed twice");
            }
        }
    }

    #[test]
    fn alias_lookup_is_case_sensitive() {
        assert_eq!(Quality::from_alias("M"), Some(Quality::Major));
        assert_eq!(Quality::from_alias("m"), Some(Quality::Minor));
        assert_eq!(Quality::from_alias("M7"), Some(Quality::MajorSeventh));
        assert_eq!(Quality::from_alias("Mm7"), Some(Quality::DominantSeventh));
        assert_eq!(Quality::from_alias("mM7"), Some(Quality::MinorMajorSeventh));
        assert_eq!(Quality::from_alias("MAJ7"), None);
    }

    #[test]
    fn empty_text_is_major() {
        assert_eq!(Quality::from_alias(""), Some(Quality::Major));
    }

    #[test]
    fn serde_uses_tags() {
        let json = serde_json::to_string(&Quality::HalfDiminishedSeventh).unwrap();
        assert_eq!(json, "\"half-diminished-seventh\"");
    }
}
