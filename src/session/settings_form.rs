/// Settings mode
///
/// A line-based form over `Settings`. Changes go to a draft and only reach
/// disk on `save`.

use crate::config::{self, Settings};
use std::path::PathBuf;

const HELP: &str =
    "Commands: provider <name>, model <id>, key <api-key>, show, save, cancel";

/// Result of one settings command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    /// Feedback to show; the form stays open
    Message(String),
    /// Written to disk; the session should rebuild the agent
    Saved(Settings),
    /// Draft discarded
    Cancelled,
}

pub struct SettingsForm {
    path: PathBuf,
    saved: Settings,
    draft: Settings,
}

impl SettingsForm {
    pub fn new(path: PathBuf, settings: Settings) -> Self {
        Self {
            path,
            draft: settings.clone(),
            saved: settings,
        }
    }

    /// Settings as last saved
    pub fn settings(&self) -> &Settings {
        &self.saved
    }

    pub fn draft(&self) -> &Settings {
        &self.draft
    }

    /// Start editing from the saved settings
    pub fn reset(&mut self) {
        self.draft = self.saved.clone();
    }

    pub fn summary(&self) -> String {
        format!(
            "Provider: {}\nModel: {}\nAPI key: {}",
            self.draft.provider,
            self.draft.model,
            self.draft.masked_key()
        )
    }

    pub fn handle(&mut self, line: &str) -> FormOutcome {
        let line = line.trim();
        let (command, argument) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command.to_lowercase().as_str() {
            "provider" => self.set_provider(argument),
            "model" => self.set_model(argument),
            "key" => {
                if argument.is_empty() {
                    return FormOutcome::Message(
                        "Error: Missing key argument. Usage: key <api-key>".to_string(),
                    );
                }
                self.draft.api_key = argument.to_string();
                FormOutcome::Message("API key updated".to_string())
            }
            "show" => FormOutcome::Message(self.summary()),
            "save" => self.save(),
            "cancel" => {
                self.reset();
                FormOutcome::Cancelled
            }
            _ => FormOutcome::Message(format!("Unknown setting. {}", HELP)),
        }
    }

    fn set_provider(&mut self, name: &str) -> FormOutcome {
        let Some(provider) = config::canonical_provider(name) else {
            let available: Vec<_> = config::supported_providers().collect();
            return FormOutcome::Message(format!(
                "Error: Unknown provider: {}. Available: {}",
                name,
                available.join(", ")
            ));
        };

        self.draft.provider = provider.to_string();
        if !self.draft.is_valid_provider_model() {
            if let Some(model) = config::supported_models(provider).first() {
                self.draft.model = model.to_string();
            }
        }

        FormOutcome::Message(format!(
            "Provider set to {} (model: {})",
            self.draft.provider, self.draft.model
        ))
    }

    fn set_model(&mut self, model: &str) -> FormOutcome {
        let models = config::supported_models(&self.draft.provider);
        if !models.contains(&model) {
            return FormOutcome::Message(format!(
                "Error: Unknown model for {}: {}. Available: {}",
                self.draft.provider,
                model,
                models.join(", ")
            ));
        }

        self.draft.model = model.to_string();
        FormOutcome::Message(format!("Model set to {}", model))
    }

    fn save(&mut self) -> FormOutcome {
        match config::save_settings(&self.path, &self.draft) {
            Ok(()) => {
                tracing::info!(provider = %self.draft.provider, model = %self.draft.model, "settings saved");
                self.saved = self.draft.clone();
                FormOutcome::Saved(self.saved.clone())
            }
            Err(e) => FormOutcome::Message(format!("Error: Could not save settings: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_form(dir: &TempDir) -> SettingsForm {
        SettingsForm::new(dir.path().join("settings.json"), Settings::default())
    }

    #[test]
    fn test_provider_switch_picks_valid_model() {
        let dir = TempDir::new().unwrap();
        let mut form = create_form(&dir);

        let outcome = form.handle("provider openai");
        assert_eq!(
            outcome,
            FormOutcome::Message("Provider set to OpenAI (model: gpt-4o)".to_string())
        );
        assert!(form.draft().is_valid_provider_model());

        assert!(matches!(form.handle("provider nope"), FormOutcome::Message(m) if m.starts_with("Error: Unknown provider")));
    }

    #[test]
    fn test_model_validation() {
        let dir = TempDir::new().unwrap();
        let mut form = create_form(&dir);

        assert!(matches!(form.handle("model gpt-4o"), FormOutcome::Message(m) if m.starts_with("Error: Unknown model")));
        form.handle("model claude-3-opus-20240229");
        assert_eq!(form.draft().model, "claude-3-opus-20240229");
    }

    #[test]
    fn test_show_masks_key() {
        let dir = TempDir::new().unwrap();
        let mut form = create_form(&dir);

        form.handle("key sk-ant-secret-value-1234");
        let FormOutcome::Message(summary) = form.handle("show") else {
            panic!("expected message");
        };
        assert!(summary.contains("API key: sk-a…1234"));
        assert!(!summary.contains("secret"));
    }

    #[test]
    fn test_save_persists_and_cancel_discards() {
        let dir = TempDir::new().unwrap();
        let mut form = create_form(&dir);

        form.handle("key sk-one");
        let FormOutcome::Saved(saved) = form.handle("save") else {
            panic!("expected save");
        };
        assert_eq!(saved.api_key, "sk-one");
        assert_eq!(config::load_settings(&dir.path().join("settings.json")), saved);

        form.handle("key sk-two");
        assert_eq!(form.handle("cancel"), FormOutcome::Cancelled);
        assert_eq!(form.draft().api_key, "sk-one");
        assert_eq!(form.settings().api_key, "sk-one");
    }

    #[test]
    fn test_unknown_command() {
        let dir = TempDir::new().unwrap();
        let mut form = create_form(&dir);

        let FormOutcome::Message(message) = form.handle("colour blue") else {
            panic!("expected message");
        };
        assert!(message.contains("provider <name>"));
        assert!(matches!(form.handle("key"), FormOutcome::Message(m) if m.starts_with("Error: Missing key")));
    }
}
