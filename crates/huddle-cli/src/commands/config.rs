//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use huddle_core::Config;

use crate::output::{Output, OutputFormat};

const KEYS: &str =
    "data_dir, user_id, display_name, email, default_channel_name, presence_timeout_secs, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "user_id": config.user_id,
                    "display_name": config.display_name,
                    "email": config.email,
                    "default_channel_name": config.default_channel_name,
                    "presence_timeout_secs": config.presence_timeout_secs,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:              {}", config.data_dir.display());
            println!("  user_id:               {}", or_unset(config.user_id.as_deref()));
            println!("  display_name:          {}", or_unset(config.display_name.as_deref()));
            println!("  email:                 {}", or_unset(config.email.as_deref()));
            println!("  default_channel_name:  {}", config.default_channel_name);
            println!("  presence_timeout_secs: {}", config.presence_timeout_secs);
            println!(
                "  log_file:              {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "user_id" => {
            config.user_id = optional(value);
        }
        "display_name" => {
            config.display_name = optional(value);
        }
        "email" => {
            config.email = optional(value);
        }
        "default_channel_name" => {
            if value.trim().is_empty() {
                bail!("default_channel_name cannot be empty");
            }
            config.default_channel_name = value.trim().to_string();
        }
        "presence_timeout_secs" => {
            config.presence_timeout_secs = value
                .parse()
                .context("Invalid value for presence_timeout_secs. Use a number of seconds.")?;
        }
        "log_file" => {
            config.log_file = optional(value).map(PathBuf::from);
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                KEYS
            );
        }
    }
    Ok(())
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

fn or_unset(value: Option<&str>) -> &str {
    value.unwrap_or("(not set)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "user_id", "u1").unwrap();
        apply(&mut config, "presence_timeout_secs", "90").unwrap();
        apply(&mut config, "default_channel_name", " lobby ").unwrap();
        apply(&mut config, "log_file", "/tmp/huddle.log").unwrap();

        assert_eq!(config.user_id.as_deref(), Some("u1"));
        assert_eq!(config.presence_timeout_secs, 90);
        assert_eq!(config.default_channel_name, "lobby");
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/huddle.log")));

        // "none" clears optional values
        apply(&mut config, "user_id", "none").unwrap();
        assert!(config.user_id.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();

        let err = apply(&mut config, "colour", "blue").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));

        assert!(apply(&mut config, "presence_timeout_secs", "soon").is_err());
        assert!(apply(&mut config, "default_channel_name", "   ").is_err());
    }

    #[test]
    fn test_set_writes_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            format!("data_dir = {:?}\n", temp.path().join("data").display().to_string()),
        )
        .unwrap();
        let output = Output::new(OutputFormat::Quiet);

        set("display_name".to_string(), "Ada".to_string(), Some(&path), &output).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains("display_name = \"Ada\""));
    }
}
