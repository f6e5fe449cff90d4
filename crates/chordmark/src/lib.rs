//! Chord-marker annotation for MIDI files.
//!
//! Raw chord figures from a score decoder (`"E-7"`, `"Cmaj7/G"`, `"N.C."`)
//! are normalized to a canonical root and quality, then merged into a MIDI
//! track as marker meta events at the right tick.
//!
//! # Example
//!
//! ```no_run
//! use chordmark::{add_markers, AnnotateOptions, ScoreAnnotations};
//! use std::path::Path;
//!
//! let midi = Path::new("song.mid");
//! let annotations = ScoreAnnotations::load(&ScoreAnnotations::sidecar_path(midi))?;
//! let report = add_markers(midi, &annotations, &AnnotateOptions::default())?;
//! println!("placed {} markers", report.placed);
//! # Ok::<(), chordmark::Error>(())
//! ```

pub mod annotations;
pub mod chord;
pub mod interleave;
pub mod pitch;
pub mod quality;
pub mod smf;
pub mod timeline;

pub use annotations::{ChordAnnotation, ScoreAnnotations};
pub use chord::{normalize, Chord};
pub use interleave::{
    interleave, plan_markers, Annotatable, InterleaveOptions, MarkerFormat, MarkerPlan, TieBreak,
};
pub use pitch::PitchClass;
pub use quality::Quality;
pub use smf::{annotate_smf, AnnotateOptions, AnnotatedSmf, AnnotationReport};
pub use timeline::{AbsoluteEvent, TimedEvent};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ticks per beat must be positive, got {0}")]
    InvalidResolution(u16),

    #[error("chord offset must be a finite, non-negative beat count, got {0}")]
    InvalidOffset(f64),

    #[error("event {index} at tick {tick} precedes previous tick {previous}")]
    UnorderedTimeline { index: usize, tick: u64, previous: u64 },

    #[error("delta of {delta} ticks does not fit in a track event")]
    DeltaOverflow { delta: u64 },

    #[error("failed to parse MIDI: {0}")]
    MidiParse(String),

    #[error("failed to write MIDI: {0}")]
    MidiWrite(String),

    #[error("unsupported MIDI timing: {0}")]
    UnsupportedTiming(String),

    #[error("track {index} out of range ({count} tracks)")]
    TrackOutOfRange { index: usize, count: usize },

    #[error("invalid chord annotations: {0}")]
    Annotations(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Annotate a MIDI file in place.
pub fn add_markers(
    path: &Path,
    annotations: &ScoreAnnotations,
    options: &AnnotateOptions,
) -> Result<AnnotationReport> {
    add_markers_to(path, path, annotations, options)
}

/// Read `src`, annotate it, and write the result to `dest`.
///
/// `dest` is only written once annotation has succeeded.
pub fn add_markers_to(
    src: &Path,
    dest: &Path,
    annotations: &ScoreAnnotations,
    options: &AnnotateOptions,
) -> Result<AnnotationReport> {
    let bytes = std::fs::read(src).map_err(|source| Error::Io {
        path: src.to_path_buf(),
        source,
    })?;

    let annotated = annotate_smf(&bytes, annotations, options)?;

    std::fs::write(dest, &annotated.bytes).map_err(|source| Error::Io {
        path: dest.to_path_buf(),
        source,
    })?;

    info!(
        src = %src.display(),
        dest = %dest.display(),
        track = annotated.report.track,
        placed = annotated.report.placed,
        dropped = annotated.report.dropped.len(),
        "added chord markers"
    );

    Ok(annotated.report)
}
