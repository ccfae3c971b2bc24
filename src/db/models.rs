/// Data models for database entities
///
/// All models map to database tables and use sqlx for type-safe queries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A finished command and its full output, as persisted
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TranscriptRecord {
    pub id: i64,
    pub mode: String,
    pub input: String,
    pub output: Option<String>,
    pub timestamp: String, // SQLite CURRENT_TIMESTAMP
}

/// One chat/agent exchange, kept for audit only
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ConversationRecord {
    pub id: i64,
    pub mode: String,
    pub user_message: String,
    pub ai_response: String,
    pub timestamp: String, // SQLite CURRENT_TIMESTAMP
}

/// Usage statistics for one distinct command string
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CommandStat {
    pub id: i64,
    pub command: String,
    pub last_used: i64, // microseconds since the unix epoch
    pub exec_count: i64,
}

impl CommandStat {
    /// `last_used` as a timestamp
    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.last_used)
    }
}

/// Column a command statistics listing is ordered by (always descending)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    LastUsed,
    ExecCount,
    Command,
}

impl SortField {
    /// Parse a sort field name. Anything unrecognized means `LastUsed`.
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "last_used" | "lastUsed" | "last_time_used" => SortField::LastUsed,
            "exec_count" | "execCount" | "no_of_time_executed" => SortField::ExecCount,
            "command" => SortField::Command,
            _ => SortField::LastUsed,
        }
    }

    /// The ORDER BY clause for this field
    pub(crate) fn order_clause(&self) -> &'static str {
        match self {
            SortField::LastUsed => "last_used DESC, id DESC",
            SortField::ExecCount => "exec_count DESC, last_used DESC",
            SortField::Command => "command DESC",
        }
    }
}

/// What an alias points at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AliasKind {
    #[default]
    Auto,
    File,
    Folder,
}

impl AliasKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasKind::Auto => "auto",
            AliasKind::File => "file",
            AliasKind::Folder => "folder",
        }
    }

    /// Unknown strings read back from the store are treated as `Auto`
    pub fn from_name(name: &str) -> Self {
        match name {
            "file" => AliasKind::File,
            "folder" => AliasKind::Folder,
            _ => AliasKind::Auto,
        }
    }
}

impl std::fmt::Display for AliasKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Named shortcut for a filesystem path, resolved by typing `name@`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Alias {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub description: String,
    pub kind: String,
    pub created_at: String, // SQLite CURRENT_TIMESTAMP
}

impl Alias {
    pub fn kind(&self) -> AliasKind {
        AliasKind::from_name(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field_fallback() {
        assert_eq!(SortField::from_name("exec_count"), SortField::ExecCount);
        assert_eq!(SortField::from_name("execCount"), SortField::ExecCount);
        assert_eq!(SortField::from_name("command"), SortField::Command);
        assert_eq!(SortField::from_name("lastUsed"), SortField::LastUsed);

        // Malformed input never reaches the query
        assert_eq!(
            SortField::from_name("command; DROP TABLE cmd_history"),
            SortField::LastUsed
        );
        assert_eq!(SortField::from_name(""), SortField::LastUsed);
    }

    #[test]
    fn test_alias_kind_round_trip() {
        assert_eq!(AliasKind::from_name("folder"), AliasKind::Folder);
        assert_eq!(AliasKind::from_name("file"), AliasKind::File);
        assert_eq!(AliasKind::from_name("bogus"), AliasKind::Auto);
        assert_eq!(AliasKind::Folder.to_string(), "folder");
    }

    #[test]
    fn test_last_used_at() {
        let stat = CommandStat {
            id: 1,
            command: "ls".to_string(),
            last_used: 1_700_000_000_000_000,
            exec_count: 1,
        };

        let at = stat.last_used_at().unwrap();
        assert_eq!(at.timestamp(), 1_700_000_000);
    }
}
