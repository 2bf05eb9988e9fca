//! Interactive first-run setup wizard (`tally setup`)

use std::path::PathBuf;

use dialoguer::Input;

use crate::config::file::{TallyConfigFile, load_config_file};
use crate::config::{DEFAULT_MODEL, DEFAULT_USER};

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("Tally Setup\n");

    let existing = load_config_file();
    let config_path = crate::config::file::config_file_path()
        .unwrap_or_else(|| PathBuf::from("~/.config/tally/config.toml"));

    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    let api_key: String = Input::new()
        .with_prompt("API key for the live model service")
        .with_initial_text(existing.api_key.clone().unwrap_or_default())
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Live model")
        .default(existing.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()))
        .interact_text()?;

    let user: String = Input::new()
        .with_prompt("User to attribute transactions to")
        .default(existing.user.clone().unwrap_or_else(|| DEFAULT_USER.to_string()))
        .interact_text()?;

    let config_file = TallyConfigFile {
        api_key: Some(api_key).filter(|k| !k.is_empty()),
        model: Some(model).filter(|m| !m.is_empty()),
        user: Some(user).filter(|u| !u.is_empty()),
        system_instruction: existing.system_instruction,
        data_dir: existing.data_dir,
        audio: existing.audio,
    };

    write_config(&config_path, &config_file)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `tally -v` to start a live session.");

    Ok(())
}

/// Serialize and write the config file
fn write_config(path: &PathBuf, config: &TallyConfigFile) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, serialize_config(config))?;

    Ok(())
}

/// Serialize config to a readable TOML string
fn serialize_config(config: &TallyConfigFile) -> String {
    let mut out = String::new();

    for (key, val) in [
        ("api_key", &config.api_key),
        ("model", &config.model),
        ("user", &config.user),
        ("system_instruction", &config.system_instruction),
        ("data_dir", &config.data_dir),
    ] {
        if let Some(v) = val {
            out.push_str(&format!("{key} = \"{v}\"\n"));
        }
    }

    if config.audio.chunk_ms.is_some() || config.audio.inbound_queue_capacity.is_some() {
        out.push_str("\n[audio]\n");
        if let Some(ms) = config.audio.chunk_ms {
            out.push_str(&format!("chunk_ms = {ms}\n"));
        }
        if let Some(cap) = config.audio.inbound_queue_capacity {
            out.push_str(&format!("inbound_queue_capacity = {cap}\n"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_config_round_trips() {
        let config = TallyConfigFile {
            api_key: Some("test-key".to_string()),
            model: Some("some-model".to_string()),
            user: Some("brian".to_string()),
            system_instruction: None,
            data_dir: None,
            audio: crate::config::file::AudioFileConfig {
                chunk_ms: Some(50),
                inbound_queue_capacity: None,
            },
        };

        let toml = serialize_config(&config);
        let parsed: TallyConfigFile = toml::from_str(&toml).unwrap();

        assert_eq!(parsed.api_key.as_deref(), Some("test-key"));
        assert_eq!(parsed.model.as_deref(), Some("some-model"));
        assert_eq!(parsed.user.as_deref(), Some("brian"));
        assert_eq!(parsed.audio.chunk_ms, Some(50));
    }
}
