//! Configuration loading and parsing.
//!
//! Scope: parse `loom.toml` (or an override path provided by the binary) into
//! [`Settings`]: the generation model and its sampling parameters, editing
//! policy, and per-provider credentials. Every field has a default so a
//! missing file, a missing section, or a partially written file all yield a
//! usable configuration. Unknown fields are ignored (TOML deserialization
//! tolerance) to allow forward evolution without immediate warnings.
//!
//! The same [`Settings`] value is persisted alongside document state, and the
//! host can change single fields at runtime through [`Settings::set`] using the
//! dotted key names listed in [`SETTING_KEYS`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Model selection and sampling parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Provider family name (`openai`, `openai-chat`, `azure`, `azure-chat`,
    /// `openai-compat`, `openrouter`, `anthropic`, `cohere`, `textsynth`).
    pub provider: String,
    pub name: String,
    /// Context window of the model in tokens.
    pub context_length: usize,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Completions requested per generation.
    pub n: usize,
    /// Sentinel prepended to every prompt.
    pub prepend: String,
    pub request_timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            name: "davinci-002".to_string(),
            context_length: 16384,
            max_tokens: 60,
            temperature: 1.0,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            n: 5,
            prepend: "<|endoftext|>".to_string(),
            request_timeout_secs: 60,
        }
    }
}

/// Buffer reconciliation and host escaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditingSettings {
    /// Fork a branch instead of rewriting shared history on ancestor edits.
    pub clone_on_edit: bool,
    /// Characters the host buffer stores escaped with a backslash.
    pub escaped_chars: String,
}

impl Default for EditingSettings {
    fn default() -> Self {
        Self {
            clone_on_edit: false,
            escaped_chars: "<".to_string(),
        }
    }
}

/// Provider credentials and endpoints. Empty strings mean "unset"; API keys
/// fall back to the provider's conventional environment variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub openai_api_key: String,
    pub openai_organization: String,
    pub azure_api_key: String,
    pub azure_endpoint: String,
    pub azure_api_version: String,
    pub openai_compat_url: String,
    pub openai_compat_api_key: String,
    pub openrouter_api_key: String,
    pub anthropic_api_key: String,
    pub cohere_api_key: String,
    pub textsynth_api_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: ModelSettings,
    pub editing: EditingSettings,
    pub providers: ProviderSettings,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// File the settings were read from; `None` when defaults are in use.
    pub path: Option<PathBuf>,
    pub settings: Settings,
}

/// Failure to apply a runtime setting change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Dotted names accepted by [`Settings::set`].
pub const SETTING_KEYS: &[&str] = &[
    "model.provider",
    "model.name",
    "model.context_length",
    "model.max_tokens",
    "model.temperature",
    "model.top_p",
    "model.frequency_penalty",
    "model.presence_penalty",
    "model.n",
    "model.prepend",
    "model.request_timeout_secs",
    "editing.clone_on_edit",
    "editing.escaped_chars",
    "providers.openai_api_key",
    "providers.openai_organization",
    "providers.azure_api_key",
    "providers.azure_endpoint",
    "providers.azure_api_version",
    "providers.openai_compat_url",
    "providers.openai_compat_api_key",
    "providers.openrouter_api_key",
    "providers.anthropic_api_key",
    "providers.cohere_api_key",
    "providers.textsynth_api_key",
];

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| SettingError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

fn invalid(key: &str, value: &str, reason: &str) -> SettingError {
    SettingError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

impl Settings {
    /// Update one field from its string form. The settings are unchanged on error.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingError> {
        let m = &mut self.model;
        let p = &mut self.providers;
        match key {
            "model.provider" => m.provider = value.trim().to_string(),
            "model.name" => m.name = value.trim().to_string(),
            "model.context_length" => {
                let v: usize = parse_value(key, value)?;
                if v <= m.max_tokens {
                    return Err(invalid(key, value, "must exceed model.max_tokens"));
                }
                m.context_length = v;
            }
            "model.max_tokens" => {
                let v: usize = parse_value(key, value)?;
                if v == 0 || v >= m.context_length {
                    return Err(invalid(key, value, "must be in 1..context_length"));
                }
                m.max_tokens = v;
            }
            "model.temperature" => {
                let v: f32 = parse_value(key, value)?;
                if !(0.0..=2.0).contains(&v) {
                    return Err(invalid(key, value, "must be within 0..=2"));
                }
                m.temperature = v;
            }
            "model.top_p" => {
                let v: f32 = parse_value(key, value)?;
                if !(0.0..=1.0).contains(&v) {
                    return Err(invalid(key, value, "must be within 0..=1"));
                }
                m.top_p = v;
            }
            "model.frequency_penalty" => m.frequency_penalty = parse_value(key, value)?,
            "model.presence_penalty" => m.presence_penalty = parse_value(key, value)?,
            "model.n" => {
                let v: usize = parse_value(key, value)?;
                if v == 0 {
                    return Err(invalid(key, value, "must be at least 1"));
                }
                m.n = v;
            }
            "model.prepend" => m.prepend = value.to_string(),
            "model.request_timeout_secs" => m.request_timeout_secs = parse_value(key, value)?,
            "editing.clone_on_edit" => self.editing.clone_on_edit = parse_value(key, value)?,
            "editing.escaped_chars" => self.editing.escaped_chars = value.trim().to_string(),
            "providers.openai_api_key" => p.openai_api_key = value.trim().to_string(),
            "providers.openai_organization" => p.openai_organization = value.trim().to_string(),
            "providers.azure_api_key" => p.azure_api_key = value.trim().to_string(),
            "providers.azure_endpoint" => p.azure_endpoint = value.trim().to_string(),
            "providers.azure_api_version" => p.azure_api_version = value.trim().to_string(),
            "providers.openai_compat_url" => p.openai_compat_url = value.trim().to_string(),
            "providers.openai_compat_api_key" => p.openai_compat_api_key = value.trim().to_string(),
            "providers.openrouter_api_key" => p.openrouter_api_key = value.trim().to_string(),
            "providers.anthropic_api_key" => p.anthropic_api_key = value.trim().to_string(),
            "providers.cohere_api_key" => p.cohere_api_key = value.trim().to_string(),
            "providers.textsynth_api_key" => p.textsynth_api_key = value.trim().to_string(),
            _ => return Err(SettingError::UnknownKey(key.to_string())),
        }
        info!(target: "config", key, "setting_changed");
        Ok(())
    }

    /// Prompt token budget: context window minus the completion allowance.
    pub fn prompt_budget(&self) -> usize {
        self.model
            .context_length
            .saturating_sub(self.model.max_tokens)
    }
}

/// Best-effort config path following platform conventions (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    // Prefer a local working-directory `loom.toml` before the platform config dir.
    let local = PathBuf::from("loom.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("loom").join("loom.toml");
    }
    PathBuf::from("loom.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        info!(target: "config", path = %path.display(), "config_missing_using_defaults");
        return Ok(Config::default());
    };
    match toml::from_str::<Settings>(&content) {
        Ok(settings) => {
            info!(target: "config", path = %path.display(), provider = settings.model.provider.as_str(), "config_loaded");
            Ok(Config {
                path: Some(path),
                settings,
            })
        }
        Err(e) => {
            // On parse error fall back to defaults rather than refusing to start.
            warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed");
            Ok(Config::default())
        }
    }
}
