//! Config file discovery, loading, and environment variable overlay.

use crate::sections::{BatchConfig, LoggingConfig, TieBreakPolicy};
use crate::{ChordmarkConfig, ConfigError};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/chordmark/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("chordmark/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("chordmark.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<ChordmarkConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

/// Parse config from a TOML string. Missing keys keep their defaults.
pub(crate) fn parse_toml(contents: &str, path: &Path) -> Result<ChordmarkConfig, ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let invalid = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let mut config = ChordmarkConfig::default();

    if let Some(markers) = table.get("markers").and_then(|v| v.as_table()) {
        if let Some(v) = markers.get("chord_prefix").and_then(|v| v.as_str()) {
            config.markers.chord_prefix = non_empty(v);
        }
        if let Some(v) = markers.get("key_prefix").and_then(|v| v.as_str()) {
            config.markers.key_prefix = non_empty(v);
        }
        if let Some(v) = markers.get("tie_break").and_then(|v| v.as_str()) {
            config.markers.tie_break = v.parse().map_err(invalid)?;
        }
    }

    if let Some(input) = table.get("input").and_then(|v| v.as_table()) {
        if let Some(v) = input.get("track").and_then(|v| v.as_integer()) {
            let track = usize::try_from(v)
                .map_err(|_| invalid(format!("input.track must be >= 0, got {v}")))?;
            config.input.track = Some(track);
        }
    }

    if let Some(batch) = table.get("batch").and_then(|v| v.as_table()) {
        if let Some(v) = batch.get("jobs").and_then(|v| v.as_integer()) {
            config.batch.jobs = usize::try_from(v)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| invalid(format!("batch.jobs must be >= 1, got {v}")))?;
        }
        if let Some(v) = batch.get("overwrite").and_then(|v| v.as_bool()) {
            config.batch.overwrite = Some(v);
        }
        if let Some(v) = batch.get("failed_list").and_then(|v| v.as_str()) {
            config.batch.failed_list = v.to_string();
        }
    }

    if let Some(logging) = table.get("logging").and_then(|v| v.as_table()) {
        if let Some(v) = logging.get("log_level").and_then(|v| v.as_str()) {
            config.logging.log_level = v.to_string();
        }
    }

    Ok(config)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// Merge two configs, with `overlay` taking precedence.
///
/// An overlay value equal to the compiled default is treated as unset.
pub fn merge_configs(base: ChordmarkConfig, overlay: ChordmarkConfig) -> ChordmarkConfig {
    fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
        if overlay != default {
            overlay
        } else {
            base
        }
    }

    ChordmarkConfig {
        markers: crate::MarkersConfig {
            chord_prefix: overlay.markers.chord_prefix.or(base.markers.chord_prefix),
            key_prefix: overlay.markers.key_prefix.or(base.markers.key_prefix),
            tie_break: pick(
                base.markers.tie_break,
                overlay.markers.tie_break,
                TieBreakPolicy::default(),
            ),
        },
        input: crate::InputConfig {
            track: overlay.input.track.or(base.input.track),
        },
        batch: BatchConfig {
            jobs: pick(base.batch.jobs, overlay.batch.jobs, BatchConfig::default_jobs()),
            overwrite: overlay.batch.overwrite.or(base.batch.overwrite),
            failed_list: pick(
                base.batch.failed_list,
                overlay.batch.failed_list,
                BatchConfig::default_failed_list(),
            ),
        },
        logging: LoggingConfig {
            log_level: pick(
                base.logging.log_level,
                overlay.logging.log_level,
                LoggingConfig::default_log_level(),
            ),
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut ChordmarkConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |name| env::var(name).ok());
}

/// Apply overrides from any variable lookup. Unparseable values are ignored.
pub fn apply_overrides_from<F>(config: &mut ChordmarkConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut take = |name: &str| {
        let value = lookup(name)?;
        sources.env_overrides.push(name.to_string());
        Some(value)
    };

    if let Some(v) = take("CHORDMARK_CHORD_PREFIX") {
        config.markers.chord_prefix = non_empty(&v);
    }
    if let Some(v) = take("CHORDMARK_KEY_PREFIX") {
        config.markers.key_prefix = non_empty(&v);
    }
    if let Some(policy) = take("CHORDMARK_TIE_BREAK").and_then(|v| v.parse().ok()) {
        config.markers.tie_break = policy;
    }

    // "auto" clears a track pinned by a config file
    if let Some(v) = take("CHORDMARK_TRACK") {
        if v.eq_ignore_ascii_case("auto") {
            config.input.track = None;
        } else if let Ok(track) = v.parse() {
            config.input.track = Some(track);
        }
    }

    if let Some(jobs) = take("CHORDMARK_JOBS").and_then(|v| v.parse::<usize>().ok()) {
        if jobs > 0 {
            config.batch.jobs = jobs;
        }
    }
    if let Some(v) = take("CHORDMARK_FAILED_LIST") {
        config.batch.failed_list = v;
    }

    if let Some(v) = take("CHORDMARK_LOG_LEVEL") {
        config.logging.log_level = v;
    }
    // RUST_LOG wins over CHORDMARK_LOG_LEVEL
    if let Some(v) = take("RUST_LOG") {
        config.logging.log_level = v;
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        directories::BaseDirs::new()
            .map(|d| d.home_dir().join(stripped))
            .unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        match stripped.split_once('/') {
            Some((var_name, rest)) => env::var(var_name)
                .map(|value| PathBuf::from(value).join(rest))
                .unwrap_or_else(|_| PathBuf::from(path)),
            None => env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path)),
        }
    } else {
        PathBuf::from(path)
    }
}
