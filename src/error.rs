/// Error types for modeshell
///
/// Most failures end up as text in a transcript or conversation rather than
/// aborting the session; `user_message` is the wording used there.

use thiserror::Error;

/// Main error type for modeshell operations
#[derive(Error, Debug)]
pub enum ShellError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O errors (file operations, process spawning, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error talking to an agent backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The agent collaborator failed to produce an answer
    #[error("{0}")]
    Agent(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path does not resolve to an existing directory
    #[error("Directory not found: {0}")]
    InvalidDirectory(String),
}

/// Result type alias for modeshell operations
pub type Result<T> = std::result::Result<T, ShellError>;

/// Convert ShellError to a user-friendly error message
impl ShellError {
    pub fn user_message(&self) -> String {
        match self {
            ShellError::Database(e) => {
                format!("Database error occurred. Please try again. Details: {}", e)
            }
            ShellError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            ShellError::Serialization(e) => {
                format!("Data format error: {}", e)
            }
            ShellError::Http(e) => {
                format!("Could not reach the agent service. Details: {}", e)
            }
            ShellError::Agent(msg) => msg.clone(),
            ShellError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
            ShellError::InvalidDirectory(path) => {
                format!("Directory not found: {}", path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_user_messages() {
        let err = ShellError::InvalidDirectory("/nope".to_string());
        assert!(err.user_message().contains("/nope"));

        let err = ShellError::Agent("rate limited".to_string());
        assert_eq!(err.user_message(), "rate limited");
    }

    #[test]
    fn test_error_display() {
        let err = ShellError::Config("missing api key".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Configuration error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ShellError = io.into();
        assert!(matches!(err, ShellError::Io(_)));
    }
}
