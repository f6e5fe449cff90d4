//! chordmark - chord and key markers for MIDI files

mod batch;

use anyhow::{Context, Result};
use chordconf::{ChordmarkConfig, TieBreakPolicy};
use chordmark::{AnnotateOptions, InterleaveOptions, MarkerFormat, ScoreAnnotations, TieBreak};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Normalize chord symbols and write them into MIDI files as marker events
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file, used in place of ./chordmark.toml
    #[arg(long, global = true, env = "CHORDMARK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add markers to one MIDI file
    Annotate {
        /// MIDI file to annotate
        midi: PathBuf,

        /// Chord annotations (default: <MIDI>.chords.json)
        #[arg(long)]
        annotations: Option<PathBuf>,

        /// Key text, replacing the key from the annotations
        #[arg(long)]
        key: Option<String>,

        /// Write here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        markers: MarkerArgs,
    },

    /// Annotate every MIDI file with a sidecar in a directory
    Batch {
        input_dir: PathBuf,
        output_dir: PathBuf,

        /// Concurrent conversions
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Replace outputs that already exist
        #[arg(long)]
        overwrite: bool,

        #[command(flatten)]
        markers: MarkerArgs,
    },

    /// Re-run the files listed in a failure list, replacing their outputs
    Retry {
        failed_list: PathBuf,
        output_dir: PathBuf,

        /// Concurrent conversions
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        markers: MarkerArgs,
    },

    /// Print the normalized form of chord figures
    Normalize {
        #[arg(required = true)]
        figures: Vec<String>,

        /// Also list every spelling of the resolved quality
        #[arg(long)]
        aliases: bool,
    },

    /// List every event in a MIDI file
    Dump { midi: PathBuf },

    /// Print the effective configuration as TOML
    Config,
}

/// Marker settings that override the config file.
#[derive(Args, Debug, Default)]
struct MarkerArgs {
    /// Track to annotate (default: first track with notes)
    #[arg(long)]
    track: Option<usize>,

    /// Same-tick marker placement: stable or before-note-on
    #[arg(long)]
    tie_break: Option<TieBreakPolicy>,

    /// Prefix for chord markers, e.g. "Chord"
    #[arg(long)]
    chord_prefix: Option<String>,

    /// Prefix for the key marker
    #[arg(long)]
    key_prefix: Option<String>,
}

impl MarkerArgs {
    fn resolve(&self, config: &ChordmarkConfig) -> AnnotateOptions {
        let tie_break = match self.tie_break.unwrap_or(config.markers.tie_break) {
            TieBreakPolicy::Stable => TieBreak::Stable,
            TieBreakPolicy::BeforeNoteOn => TieBreak::BeforeNoteOn,
        };

        AnnotateOptions {
            interleave: InterleaveOptions {
                format: MarkerFormat {
                    chord_prefix: self
                        .chord_prefix
                        .clone()
                        .or_else(|| config.markers.chord_prefix.clone()),
                    key_prefix: self
                        .key_prefix
                        .clone()
                        .or_else(|| config.markers.key_prefix.clone()),
                },
                tie_break,
            },
            track: self.track.or(config.input.track),
        }
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Quality spellings for display; the empty spelling shows as `""`.
fn spellings(quality: chordmark::Quality) -> String {
    quality
        .aliases()
        .iter()
        .map(|&s| if s.is_empty() { "\"\"" } else { s })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Failure list location: relative names land in the output directory.
fn failed_list_path(config: &ChordmarkConfig, output_dir: &Path) -> PathBuf {
    output_dir.join(chordconf::loader::expand_path(&config.batch.failed_list))
}

async fn run_batch(job: batch::BatchJob) -> Result<()> {
    let summary = batch::run(job).await?;
    println!(
        "{} annotated, {} skipped, {} failed",
        summary.succeeded.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    if !summary.failed.is_empty() {
        anyhow::bail!("{} conversions failed", summary.failed.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = ChordmarkConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config.logging.log_level);
    debug!(
        files = ?sources.files,
        env = ?sources.env_overrides,
        "configuration loaded"
    );

    match cli.command {
        Command::Annotate {
            midi,
            annotations,
            key,
            output,
            json,
            markers,
        } => {
            let sidecar = annotations.unwrap_or_else(|| ScoreAnnotations::sidecar_path(&midi));
            let mut score = ScoreAnnotations::load(&sidecar)
                .with_context(|| format!("Failed to load annotations for {}", midi.display()))?;
            if key.is_some() {
                score.key = key;
            }

            let dest = output.unwrap_or_else(|| midi.clone());
            let report = chordmark::add_markers_to(&midi, &dest, &score, &markers.resolve(&config))
                .with_context(|| format!("Failed to annotate {}", midi.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{}: {} markers on track {} ({} dropped)",
                    dest.display(),
                    report.placed,
                    report.track,
                    report.dropped.len()
                );
            }
        }

        Command::Batch {
            input_dir,
            output_dir,
            jobs,
            overwrite,
            markers,
        } => {
            let job = batch::BatchJob {
                inputs: batch::midi_files(&input_dir)?,
                options: markers.resolve(&config),
                jobs: jobs.unwrap_or(config.batch.jobs).max(1),
                overwrite: overwrite || config.batch.overwrite(),
                failed_list: failed_list_path(&config, &output_dir),
                output_dir,
            };
            run_batch(job).await?;
        }

        Command::Retry {
            failed_list,
            output_dir,
            jobs,
            markers,
        } => {
            let inputs = batch::read_list(&failed_list)?;
            info!(count = inputs.len(), list = %failed_list.display(), "retrying failed files");
            let job = batch::BatchJob {
                inputs,
                options: markers.resolve(&config),
                jobs: jobs.unwrap_or(config.batch.jobs).max(1),
                overwrite: true,
                failed_list: failed_list_path(&config, &output_dir),
                output_dir,
            };
            run_batch(job).await?;
        }

        Command::Normalize { figures, aliases } => {
            for figure in figures {
                match chordmark::normalize(&figure) {
                    Some(chord) if aliases => println!(
                        "{figure} -> {chord} (also written as: {})",
                        spellings(chord.quality)
                    ),
                    Some(chord) => println!("{figure} -> {chord}"),
                    None => println!("{figure} -> no chord"),
                }
            }
        }

        Command::Dump { midi } => {
            let bytes = std::fs::read(&midi)
                .with_context(|| format!("Failed to read {}", midi.display()))?;
            for line in chordmark::smf::dump(&bytes)? {
                println!("{line}");
            }
        }

        Command::Config => {
            for file in &sources.files {
                info!(file = %file.display(), "config file");
            }
            print!("{}", config.to_toml());
        }
    }

    Ok(())
}
