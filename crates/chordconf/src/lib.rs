//! Configuration loading for chordmark.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/chordmark/config.toml` (system)
//! 2. `~/.config/chordmark/config.toml` (user)
//! 3. `./chordmark.toml` (local override, replaced by `--config`)
//! 4. Environment variables (`CHORDMARK_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [markers]
//! chord_prefix = "Chord"
//! key_prefix = "Key"
//! tie_break = "before-note-on"
//!
//! [input]
//! track = 1
//!
//! [batch]
//! jobs = 8
//! overwrite = false
//! failed_list = "failed.txt"
//!
//! [logging]
//! log_level = "info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{BatchConfig, InputConfig, LoggingConfig, MarkersConfig, TieBreakPolicy};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordmarkConfig {
    #[serde(default)]
    pub markers: MarkersConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ChordmarkConfig {
    /// Load configuration, letting `config_path` replace `./chordmark.toml`.
    ///
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = ChordmarkConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so unset options show up as comments
        let mut output = String::new();

        output.push_str("# chordmark configuration\n\n");

        output.push_str("[markers]\n");
        push_optional(&mut output, "chord_prefix", self.markers.chord_prefix.as_deref());
        push_optional(&mut output, "key_prefix", self.markers.key_prefix.as_deref());
        output.push_str(&format!("tie_break = \"{}\"\n", self.markers.tie_break));

        output.push_str("\n[input]\n");
        match self.input.track {
            Some(track) => output.push_str(&format!("track = {}\n", track)),
            None => output.push_str("# track = 0\n"),
        }

        output.push_str("\n[batch]\n");
        output.push_str(&format!("jobs = {}\n", self.batch.jobs));
        match self.batch.overwrite {
            Some(overwrite) => output.push_str(&format!("overwrite = {}\n", overwrite)),
            None => output.push_str("# overwrite = false\n"),
        }
        output.push_str(&format!(
            "failed_list = {}\n",
            toml::Value::from(self.batch.failed_list.as_str())
        ));

        output.push_str("\n[logging]\n");
        output.push_str(&format!(
            "log_level = {}\n",
            toml::Value::from(self.logging.log_level.as_str())
        ));

        output
    }
}

fn push_optional(output: &mut String, key: &str, value: Option<&str>) {
    match value {
        Some(v) => output.push_str(&format!("{} = {}\n", key, toml::Value::from(v))),
        None => output.push_str(&format!("# {} = \"\"\n", key)),
    }
}
