/// modeshell library
///
/// A multi-mode terminal shell: run commands, chat with an assistant, ask an
/// agent for command advice and search your command history.

pub mod agent;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod session;
pub mod shell;

// Re-exports for convenience
pub use db::HistoryStore;
pub use error::{Result, ShellError};
