use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::models::GenerationSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub gemini_api_key: Option<String>,

    #[serde(default = "default_model")]
    pub gemini_model: String,

    /// Watchdog for a whole processing run, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub processing_timeout_secs: u64,

    /// Stable local identity used to stamp ownership on generated records.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default)]
    pub settings: GenerationSettings,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sermon-scribe");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("library.db").to_string_lossy().to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_user_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            gemini_api_key: None,
            gemini_model: default_model(),
            processing_timeout_secs: default_timeout_secs(),
            user_id: default_user_id(),
            settings: GenerationSettings::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sermon-scribe")
            .join("config.toml")
    }
}
