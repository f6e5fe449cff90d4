//! Multi-file conversion.
//!
//! Each MIDI file with a chord sidecar is annotated into the output
//! directory on tokio's blocking pool. Output is written to a staging file
//! and renamed into place, so a failed file never disturbs an existing
//! output. Failures are listed in the failure file; the rest of the batch
//! goes on.
//! A failure file can be fed back in with [`read_list`] to retry.

use anyhow::{Context, Result};
use chordmark::{AnnotateOptions, ScoreAnnotations};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub options: AnnotateOptions,
    pub jobs: usize,
    pub overwrite: bool,
    pub failed_list: PathBuf,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

enum Outcome {
    Annotated(PathBuf),
    Failed(PathBuf, String),
}

/// MIDI files directly inside `dir`, sorted by name.
pub fn midi_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        let is_midi = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"));
        if is_midi && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Paths from a failure list, one per line. Blank lines are ignored.
pub fn read_list(path: &Path) -> Result<Vec<PathBuf>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Staging path for `dest`, next to it so the final rename stays on one filesystem.
fn staging_path(dest: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(dest.file_name().unwrap_or_default());
    name.push(".partial");
    dest.with_file_name(name)
}

/// Annotate `src` into `dest`. On failure only the staging file is removed.
fn convert(src: &Path, dest: &Path, options: &AnnotateOptions) -> chordmark::Result<()> {
    let staging = staging_path(dest);
    let result = ScoreAnnotations::load(&ScoreAnnotations::sidecar_path(src))
        .and_then(|annotations| chordmark::add_markers_to(src, &staging, &annotations, options))
        .and_then(|_| {
            std::fs::rename(&staging, dest).map_err(|source| chordmark::Error::Io {
                path: dest.to_path_buf(),
                source,
            })
        });

    if result.is_err() && staging.exists() {
        if let Err(e) = std::fs::remove_file(&staging) {
            warn!(file = %staging.display(), error = %e, "failed to remove partial output");
        }
    }
    result
}

pub async fn run(job: BatchJob) -> Result<BatchSummary> {
    std::fs::create_dir_all(&job.output_dir)
        .with_context(|| format!("Failed to create {}", job.output_dir.display()))?;

    let mut summary = BatchSummary::default();
    let semaphore = Arc::new(Semaphore::new(job.jobs.max(1)));
    let options = Arc::new(job.options.clone());
    let mut tasks = JoinSet::new();

    for src in job.inputs.iter().cloned() {
        let Some(name) = src.file_name() else {
            summary
                .failed
                .push((src.clone(), "input path has no file name".to_string()));
            continue;
        };

        if !ScoreAnnotations::sidecar_path(&src).exists() {
            debug!(file = %src.display(), "no chord sidecar, skipping");
            summary.skipped.push(src);
            continue;
        }

        let dest = job.output_dir.join(name);
        if dest.exists() && !job.overwrite {
            debug!(file = %dest.display(), "output exists, skipping");
            summary.skipped.push(src);
            continue;
        }

        let permit = semaphore.clone().acquire_owned().await?;
        let options = options.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            match convert(&src, &dest, &options) {
                Ok(()) => Outcome::Annotated(src),
                Err(e) => Outcome::Failed(src, e.to_string()),
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined.context("Conversion task panicked")? {
            Outcome::Annotated(src) => summary.succeeded.push(src),
            Outcome::Failed(src, error) => {
                warn!(file = %src.display(), error = %error, "conversion failed");
                summary.failed.push((src, error));
            }
        }
    }

    summary.succeeded.sort();
    summary.failed.sort();

    let listing: String = summary
        .failed
        .iter()
        .map(|(path, _)| format!("{}\n", path.display()))
        .collect();
    std::fs::write(&job.failed_list, listing)
        .with_context(|| format!("Failed to write {}", job.failed_list.display()))?;

    info!(
        succeeded = summary.succeeded.len(),
        skipped = summary.skipped.len(),
        failed = summary.failed.len(),
        "batch complete"
    );

    Ok(summary)
}
