/// Slash directive handling
///
/// Input starting with `/` is never handed to the shell. Known directives
/// switch modes, change the working directory or manage aliases; anything
/// else is swallowed so a typo like `/lss` cannot run as a command.

use crate::core::executor::ProcessExecutor;
use crate::core::transcript::TranscriptEntry;
use crate::db::{AliasKind, HistoryStore};
use crate::error::{Result, ShellError};
use crate::session::Mode;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// First character of every directive
pub const DIRECTIVE_PREFIX: char = '/';

/// What the session should do after a directive ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    SwitchMode(Mode),
    /// Terminate the process with exit code 0
    Quit,
    /// Both the executor and the session now use this directory
    ChangedDirectory(PathBuf),
    /// Fully handled here, usually with transcript output
    Handled,
    /// Not a known directive; swallowed
    Unrecognized,
}

/// A directive as offered by autocomplete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Mode this directive switches to, if any
    pub target: Option<Mode>,
}

const DIRECTIVES: &[DirectiveInfo] = &[
    DirectiveInfo { name: "/settings", description: "Open settings", target: Some(Mode::Settings) },
    DirectiveInfo { name: "/quit", description: "Exit application", target: None },
    DirectiveInfo { name: "/cwd", description: "Change working directory", target: None },
    DirectiveInfo { name: "/clear", description: "Clear the command transcript", target: None },
    DirectiveInfo { name: "/alias", description: "List or add folder aliases", target: None },
    DirectiveInfo { name: "/unalias", description: "Remove a folder alias", target: None },
    DirectiveInfo { name: "/cli", description: "Switch to CLI mode", target: Some(Mode::Command) },
    DirectiveInfo { name: "/chat", description: "Switch to chat mode", target: Some(Mode::Chat) },
    DirectiveInfo { name: "/agent", description: "Switch to agent mode", target: Some(Mode::Agent) },
    DirectiveInfo { name: "/search", description: "Switch to search mode", target: Some(Mode::Search) },
];

pub fn is_directive(input: &str) -> bool {
    input.starts_with(DIRECTIVE_PREFIX)
}

/// Directives whose name starts with `prefix`
///
/// A switch to the mode that is already active is never offered.
pub fn suggestions(prefix: &str, mode: Mode) -> Vec<&'static DirectiveInfo> {
    let prefix = prefix.trim_start().to_lowercase();
    DIRECTIVES
        .iter()
        .filter(|d| d.target != Some(mode))
        .filter(|d| d.name.starts_with(&prefix))
        .collect()
}

/// Resolve user input to an absolute path
///
/// `~` expands to the home directory, relative paths are joined onto
/// `base`, and `.`/`..` are folded lexically. Nothing is read from disk.
pub fn resolve_path(base: &Path, input: &str) -> PathBuf {
    let expanded = expand_home(input);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    normalize(&joined)
}

/// Like `resolve_path`, but the result must be an existing directory
pub fn resolve_directory(base: &Path, input: &str) -> Result<PathBuf> {
    let resolved = resolve_path(base, input);
    if resolved.is_dir() {
        Ok(resolved)
    } else {
        Err(ShellError::InvalidDirectory(resolved.display().to_string()))
    }
}

fn expand_home(input: &str) -> PathBuf {
    if let Some(home) = dirs::home_dir() {
        if input == "~" {
            return home;
        }
        if let Some(rest) = input.strip_prefix("~/").or_else(|| input.strip_prefix("~\\")) {
            return home.join(rest);
        }
    }
    PathBuf::from(input)
}

fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // Popping past the root leaves the root
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Executes slash directives for one session
pub struct CommandDispatcher {
    executor: Arc<ProcessExecutor>,
    store: Arc<HistoryStore>,
}

impl CommandDispatcher {
    pub fn new(executor: Arc<ProcessExecutor>, store: Arc<HistoryStore>) -> Self {
        Self { executor, store }
    }

    /// Run one directive line such as `/cwd ../src`
    pub async fn dispatch(&self, input: &str) -> Directive {
        let typed = input.trim();
        let (name, argument) = match typed.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (typed, ""),
        };
        let name = name.to_lowercase();

        if let Some(target) = DIRECTIVES
            .iter()
            .find(|d| d.name == name)
            .and_then(|d| d.target)
        {
            return Directive::SwitchMode(target);
        }

        match name.as_str() {
            "/quit" => Directive::Quit,
            "/cwd" => self.change_directory(typed, argument),
            "/clear" => {
                self.executor.clear_transcript();
                Directive::Handled
            }
            "/alias" => self.alias(typed, argument).await,
            "/unalias" => self.unalias(typed, argument).await,
            _ => {
                tracing::debug!(directive = %name, "ignoring unknown directive");
                Directive::Unrecognized
            }
        }
    }

    /// Echo the directive and its result into the command transcript
    fn report(&self, typed: &str, message: impl Into<String>) {
        self.executor.push_entry(TranscriptEntry::command(typed));
        self.executor.push_entry(TranscriptEntry::output(message));
    }

    fn change_directory(&self, typed: &str, argument: &str) -> Directive {
        if argument.is_empty() {
            self.report(typed, "Error: Missing folder argument. Usage: /cwd <folder>");
            return Directive::Handled;
        }

        let current = self.executor.working_directory();
        match resolve_directory(&current, argument) {
            Ok(resolved) => {
                self.executor.set_working_directory(&resolved);
                tracing::info!(cwd = %resolved.display(), "working directory changed");
                self.report(typed, format!("Changed directory to: {}", resolved.display()));
                Directive::ChangedDirectory(resolved)
            }
            Err(e) => {
                self.report(typed, format!("Error: {}", e));
                Directive::Handled
            }
        }
    }

    async fn alias(&self, typed: &str, argument: &str) -> Directive {
        let mut words = argument.split_whitespace();
        let Some(name) = words.next() else {
            let listing = self.list_aliases().await;
            self.report(typed, listing);
            return Directive::Handled;
        };

        let Some(target) = words.next() else {
            self.report(
                typed,
                "Error: Missing path argument. Usage: /alias <name> <path> [description]",
            );
            return Directive::Handled;
        };
        let description = words.collect::<Vec<_>>().join(" ");

        if name.contains('@') {
            self.report(typed, format!("Error: Invalid alias name: {}", name));
            return Directive::Handled;
        }

        let resolved = resolve_path(&self.executor.working_directory(), target);
        let kind = if resolved.is_dir() {
            AliasKind::Folder
        } else if resolved.is_file() {
            AliasKind::File
        } else {
            self.report(typed, format!("Error: Path not found: {}", resolved.display()));
            return Directive::Handled;
        };

        let path = resolved.to_string_lossy();
        let description = (!description.is_empty()).then_some(description.as_str());
        if self.store.add_alias(name, &path, description, kind).await {
            self.report(typed, format!("Alias saved: {} -> {}", name, path));
        } else {
            self.report(typed, format!("Error: Could not save alias: {}", name));
        }
        Directive::Handled
    }

    async fn list_aliases(&self) -> String {
        let aliases = match self.store.list_aliases().await {
            Ok(aliases) => aliases,
            Err(e) => {
                tracing::warn!(error = %e, "failed to list aliases");
                return "Error: Could not read aliases".to_string();
            }
        };

        if aliases.is_empty() {
            return "No aliases defined".to_string();
        }

        aliases
            .iter()
            .map(|alias| {
                if alias.description.is_empty() {
                    format!("{}@ -> {}", alias.name, alias.path)
                } else {
                    format!("{}@ -> {} ({})", alias.name, alias.path, alias.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn unalias(&self, typed: &str, argument: &str) -> Directive {
        if argument.is_empty() {
            self.report(typed, "Error: Missing alias argument. Usage: /unalias <name>");
            return Directive::Handled;
        }

        let message = match self.store.delete_alias(argument).await {
            Ok(true) => format!("Removed alias: {}", argument),
            Ok(false) => format!("Error: Alias not found: {}", argument),
            Err(e) => {
                tracing::warn!(alias = argument, error = %e, "failed to delete alias");
                format!("Error: Could not remove alias: {}", argument)
            }
        };
        self.report(typed, message);
        Directive::Handled
    }
}
