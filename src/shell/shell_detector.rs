/// Shell detection logic
///
/// Picks the interpreter that raw command lines are handed to. Command lines
/// are never split into argv here: the whole string goes to the shell, so
/// pipes, globs and chaining behave exactly as at a prompt.

use crate::error::{Result, ShellError};
use std::env;

/// Supported shells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Sh,
    Bash,
    Zsh,
    Fish,
    /// Windows PowerShell (`powershell.exe`)
    PowerShell,
    /// PowerShell 7+, the only PowerShell off Windows
    Pwsh,
    Cmd,
}

impl Shell {
    /// Get the shell name as a string
    pub fn name(&self) -> &str {
        match self {
            Shell::Sh => "sh",
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
            Shell::PowerShell => "powershell",
            Shell::Pwsh => "pwsh",
            Shell::Cmd => "cmd",
        }
    }

    /// Executable to spawn
    pub fn program(&self) -> &str {
        match self {
            Shell::Sh => "/bin/sh",
            Shell::Cmd => "cmd.exe",
            other => other.name(),
        }
    }

    /// Flag that makes the interpreter run one command string
    pub fn command_flag(&self) -> &str {
        match self {
            Shell::Cmd => "/C",
            Shell::PowerShell | Shell::Pwsh => "-Command",
            _ => "-c",
        }
    }

    /// Build a process that runs `command_line` through this shell
    pub fn command(&self, command_line: &str) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(self.program());
        command.arg(self.command_flag()).arg(command_line);
        command
    }

    /// Parse a shell name or path such as `/usr/bin/zsh`
    pub fn from_name(name: &str) -> Result<Shell> {
        let shell_name = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or("")
            .trim_end_matches(".exe")
            .to_lowercase();

        match shell_name.as_str() {
            "sh" | "dash" => Ok(Shell::Sh),
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            "fish" => Ok(Shell::Fish),
            "powershell" => Ok(Shell::PowerShell),
            "pwsh" => Ok(Shell::Pwsh),
            "cmd" => Ok(Shell::Cmd),
            _ => Err(ShellError::Config(format!(
                "Unsupported shell: {}",
                shell_name
            ))),
        }
    }

    /// Platform interpreter used when nothing better is known
    pub fn platform_default() -> Shell {
        if cfg!(windows) {
            Shell::Cmd
        } else {
            Shell::Sh
        }
    }
}

impl std::fmt::Display for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Shell detector
pub struct ShellDetector;

impl ShellDetector {
    /// Detect the user's shell
    ///
    /// Attempts to detect the shell from environment variables.
    ///
    /// # Returns
    /// * `Ok(Shell)` - The detected shell
    /// * `Err(ShellError)` - If the shell cannot be detected
    pub fn detect() -> Result<Shell> {
        if let Ok(shell_path) = env::var("SHELL") {
            return Shell::from_name(&shell_path);
        }

        if env::var("PSModulePath").is_ok() && !cfg!(windows) {
            return Ok(Shell::Pwsh);
        }

        if cfg!(windows) {
            if let Ok(comspec) = env::var("ComSpec") {
                return Shell::from_name(&comspec);
            }
        }

        Err(ShellError::Config(
            "Could not detect shell. Please set $SHELL environment variable.".to_string(),
        ))
    }

    /// Detected shell, or the platform default when detection fails
    pub fn detect_or_default() -> Shell {
        match Self::detect() {
            Ok(shell) => shell,
            Err(e) => {
                tracing::debug!(error = %e, "falling back to platform shell");
                Shell::platform_default()
            }
        }
    }
}
