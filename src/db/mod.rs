/// Database module for modeshell
///
/// Handles all persistence using SQLite and sqlx: session transcripts,
/// conversations, command statistics and path aliases.

pub mod connection;
pub mod models;
pub mod queries;

pub use connection::{HistoryStore, StoreStats};
pub use models::*;
