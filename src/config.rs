/// Application paths and user settings
///
/// Everything lives under `~/.modeshell` unless `MODESHELL_HOME` points
/// somewhere else. Settings are a flat JSON file that is created with
/// defaults on first start.

use crate::error::{Result, ShellError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Overrides the application directory
pub const HOME_ENV: &str = "MODESHELL_HOME";

const APP_DIR: &str = ".modeshell";
const SETTINGS_FILE: &str = "settings.json";
const DATABASE_FILE: &str = "modeshell.db";

pub const DEFAULT_PROVIDER: &str = "Anthropic";
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

const MODELS_BY_PROVIDER: &[(&str, &[&str])] = &[
    (
        "Anthropic",
        &[
            "claude-3-5-sonnet-20240620",
            "claude-3-opus-20240229",
            "claude-3-sonnet-20240229",
            "claude-3-haiku-20240307",
        ],
    ),
    ("OpenAI", &["gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"]),
    (
        "Google",
        &["gemini-2.5-pro", "gemini-2.5-flash", "gemini-2.0-flash"],
    ),
];

/// Known provider names
pub fn supported_providers() -> impl Iterator<Item = &'static str> {
    MODELS_BY_PROVIDER.iter().map(|(provider, _)| *provider)
}

/// Model ids offered for `provider`, empty when the provider is unknown
pub fn supported_models(provider: &str) -> &'static [&'static str] {
    match MODELS_BY_PROVIDER.iter().find(|(name, _)| *name == provider) {
        Some((_, models)) => *models,
        None => &[],
    }
}

/// Canonical spelling of a provider name, matched case-insensitively
pub fn canonical_provider(name: &str) -> Option<&'static str> {
    supported_providers().find(|p| p.eq_ignore_ascii_case(name.trim()))
}

/// Where modeshell keeps its files
#[derive(Debug, Clone)]
pub struct AppPaths {
    root: PathBuf,
}

impl AppPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$MODESHELL_HOME`, or `~/.modeshell`
    pub fn from_env() -> Result<Self> {
        if let Some(root) = std::env::var_os(HOME_ENV) {
            return Ok(Self::new(root));
        }

        let home = dirs::home_dir().ok_or_else(|| {
            ShellError::Config(format!(
                "Could not find home directory. Set {} instead.",
                HOME_ENV
            ))
        })?;
        Ok(Self::new(home.join(APP_DIR)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn database_file(&self) -> PathBuf {
        self.root.join("data").join(DATABASE_FILE)
    }
}

/// LLM settings as stored in `settings.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub provider: String,
    pub model: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
        }
    }
}

impl Settings {
    /// Whether `model` is offered by `provider`
    pub fn is_valid_provider_model(&self) -> bool {
        supported_models(&self.provider).contains(&self.model.as_str())
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// API key with only its ends visible
    pub fn masked_key(&self) -> String {
        let chars: Vec<char> = self.api_key.trim().chars().collect();
        match chars.len() {
            0 => "(not set)".to_string(),
            1..=8 => "*".repeat(chars.len()),
            n => {
                let head: String = chars[..4].iter().collect();
                let tail: String = chars[n - 4..].iter().collect();
                format!("{}…{}", head, tail)
            }
        }
    }
}

/// Read settings, creating the file with defaults when it does not exist
///
/// An unreadable or corrupt file is logged and replaced by defaults in
/// memory; the file itself is left alone.
pub fn load_settings(path: &Path) -> Settings {
    if !path.exists() {
        let defaults = Settings::default();
        if let Err(e) = save_settings(path, &defaults) {
            tracing::warn!(path = %path.display(), error = %e, "failed to create settings file");
        }
        return defaults;
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(ShellError::from)
        .and_then(|content| serde_json::from_str::<Settings>(&content).map_err(ShellError::from));

    match parsed {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load settings, using defaults");
            Settings::default()
        }
    }
}

/// Write settings as pretty JSON
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;
    Ok(())
}
