//! Configuration management for the Tally gateway
//!
//! The session driver is built from an explicit `Config` value; there is no
//! module-level client or key state. Values come from the TOML config file
//! overlaid with environment variables.

pub mod file;

use std::path::PathBuf;

use secrecy::SecretString;

use crate::audio::transport::DEFAULT_INBOUND_CAPACITY;
use crate::{Error, Result};

/// Default live model identifier
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// Default system instruction supplied once at connect time
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a budget manager, and your job is to record when and what the user spent money on.";

/// User transactions are attributed to when none is configured
pub const DEFAULT_USER: &str = "local";

/// Tally gateway configuration
#[derive(Debug)]
pub struct Config {
    /// API key for the live model service (absent until configured)
    pub api_key: Option<SecretString>,

    /// Live model identifier
    pub model_id: String,

    /// System instruction sent in the setup frame
    pub system_instruction: String,

    /// User to attribute captured transactions to
    pub user_id: String,

    /// Path to data directory (database, cache, etc)
    pub data_dir: PathBuf,

    /// Audio capture and queue tunables
    pub audio: AudioSettings,
}

/// Audio capture and transport queue settings
#[derive(Debug, Clone)]
pub struct AudioSettings {
    /// Capture chunk duration in milliseconds
    pub chunk_ms: u64,

    /// Inbound queue capacity before the capture side is suspended
    pub inbound_queue_capacity: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            chunk_ms: 100,
            inbound_queue_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

impl Config {
    /// Load configuration from the TOML config file with env-var overrides
    /// (`TALLY_API_KEY`, `TALLY_MODEL`, `TALLY_USER`)
    ///
    /// # Errors
    ///
    /// Returns error if the data directory cannot be created
    pub fn load() -> Result<Self> {
        let file = file::load_config_file();

        let api_key = std::env::var("TALLY_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or(file.api_key)
            .map(SecretString::from);

        let model_id = std::env::var("TALLY_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let user_id = std::env::var("TALLY_USER")
            .ok()
            .filter(|u| !u.is_empty())
            .or(file.user)
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        let system_instruction = file
            .system_instruction
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string());

        let data_dir = file.data_dir.map_or_else(default_data_dir, PathBuf::from);
        std::fs::create_dir_all(&data_dir)?;

        let defaults = AudioSettings::default();
        let audio = AudioSettings {
            chunk_ms: file.audio.chunk_ms.unwrap_or(defaults.chunk_ms),
            inbound_queue_capacity: file
                .audio
                .inbound_queue_capacity
                .unwrap_or(defaults.inbound_queue_capacity),
        };

        Ok(Self {
            api_key,
            model_id,
            system_instruction,
            user_id,
            data_dir,
            audio,
        })
    }

    /// The configured API key, required for opening a live session
    ///
    /// # Errors
    ///
    /// Returns error if no key has been configured
    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.api_key.as_ref().ok_or_else(|| {
            Error::Config(
                "no API key configured; set TALLY_API_KEY or run `tally setup`".to_string(),
            )
        })
    }

    /// Path to the transaction database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("tally.db")
    }
}

/// Default data directory: `~/.local/share/tally` (platform equivalent)
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".tally"),
        |d| d.data_dir().join("tally"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_settings_defaults() {
        let settings = AudioSettings::default();
        assert_eq!(settings.chunk_ms, 100);
        assert_eq!(settings.inbound_queue_capacity, DEFAULT_INBOUND_CAPACITY);
    }

    #[test]
    fn require_api_key_reports_missing() {
        let config = Config {
            api_key: None,
            model_id: DEFAULT_MODEL.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            user_id: DEFAULT_USER.to_string(),
            data_dir: PathBuf::from("."),
            audio: AudioSettings::default(),
        };
        assert!(config.require_api_key().is_err());
    }
}
