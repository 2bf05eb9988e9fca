//! TOML configuration file loading
//!
//! Supports `~/.config/tally/config.toml` as a persistent config source.
//! All fields are optional - the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct TallyConfigFile {
    /// API key for the live model service
    #[serde(default)]
    pub api_key: Option<String>,

    /// Live model identifier
    #[serde(default)]
    pub model: Option<String>,

    /// User to attribute captured transactions to
    #[serde(default)]
    pub user: Option<String>,

    /// System instruction override
    #[serde(default)]
    pub system_instruction: Option<String>,

    /// Data directory override
    #[serde(default)]
    pub data_dir: Option<String>,

    /// Audio capture configuration
    #[serde(default)]
    pub audio: AudioFileConfig,
}

/// Audio-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Capture chunk duration in milliseconds
    pub chunk_ms: Option<u64>,

    /// Inbound queue capacity
    pub inbound_queue_capacity: Option<usize>,
}

/// Load the TOML config file from the standard path
///
/// Returns `TallyConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> TallyConfigFile {
    let Some(path) = config_file_path() else {
        return TallyConfigFile::default();
    };

    if !path.exists() {
        return TallyConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                TallyConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            TallyConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/tally/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("tally").join("config.toml"))
}
