//! Runtime settings for the service client and the pipeline limits.
//!
//! Resolution order:
//! 1. Environment variables (`CODEMORPH_*`, plus `OPENAI_API_KEY` for the key)
//! 2. `config.json` in the config directory (defaults to ~/.codemorph)
//! 3. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/";
pub const DEFAULT_COMPLETION_MODEL: &str = "text-davinci-003";
pub const DEFAULT_EDIT_MODEL: &str = "text-davinci-edit-001";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Upper bound on files a snapshot may contain before planning is refused.
pub const MAX_INPUT_FILES: usize = 100;

/// Per-file character ceiling; keeps edit prompts inside the service's limits.
pub const MAX_FILE_LENGTH_CHARACTERS: usize = 10_000;

const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub completion_model: String,
    pub edit_model: String,
    pub chat_model: String,
    pub plan_max_tokens: u32,
    pub plan_temperature: f32,
    pub edit_temperature: Option<f32>,
    pub max_input_files: usize,
    pub max_file_length_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            request_timeout_secs: 120,
            completion_model: DEFAULT_COMPLETION_MODEL.to_string(),
            edit_model: DEFAULT_EDIT_MODEL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            plan_max_tokens: 200,
            plan_temperature: 0.0,
            edit_temperature: None,
            max_input_files: MAX_INPUT_FILES,
            max_file_length_chars: MAX_FILE_LENGTH_CHARACTERS,
        }
    }
}

impl Settings {
    /// Load settings from the config directory and the process environment.
    ///
    /// # Arguments
    /// * `config_dir` - Optional custom config directory. Defaults to ~/.codemorph
    pub fn load(config_dir: Option<String>) -> Result<Self> {
        let base_dir = match config_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".codemorph"),
        };

        let mut settings = Self::from_file(&base_dir.join(CONFIG_FILE_NAME))?;
        settings.apply_env(|name| std::env::var(name).ok());

        if settings.api_key.is_none() {
            warn!("No API key configured; requests to the model service will fail");
        }

        Ok(settings)
    }

    /// Read a config file, falling back to defaults when it does not exist.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Overlay environment variables, looked up through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("CODEMORPH_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = non_empty("CODEMORPH_API_URL") {
            self.api_url = url;
        }
        if let Some(model) = non_empty("CODEMORPH_COMPLETION_MODEL") {
            self.completion_model = model;
        }
        if let Some(model) = non_empty("CODEMORPH_EDIT_MODEL") {
            self.edit_model = model;
        }
        if let Some(model) = non_empty("CODEMORPH_CHAT_MODEL") {
            self.chat_model = model;
        }
        if let Some(raw) = non_empty("CODEMORPH_MAX_INPUT_FILES") {
            match raw.parse() {
                Ok(max) => self.max_input_files = max,
                Err(_) => warn!("Ignoring invalid CODEMORPH_MAX_INPUT_FILES: {}", raw),
            }
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("completion_model", &self.completion_model)
            .field("edit_model", &self.edit_model)
            .field("chat_model", &self.chat_model)
            .field("max_input_files", &self.max_input_files)
            .field("max_file_length_chars", &self.max_file_length_chars)
            .finish()
    }
}
