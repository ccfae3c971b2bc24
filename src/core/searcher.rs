/// Command history search
///
/// Read-only projection over the command statistics table, used by search
/// mode to rank previously executed commands.

use crate::db::{CommandStat, HistoryStore, SortField};
use std::sync::Arc;

/// Reserved term that lists every known command
pub const LIST_ALL: &str = "**";

const LIST_ALL_LIMIT: i64 = 100;
const SEARCH_LIMIT: i64 = 20;

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub command: String,
    pub exec_count: i64,
    pub last_used: i64,
}

impl SearchHit {
    /// Display label, e.g. `git status (3×)`
    pub fn label(&self) -> String {
        format!("{} ({}×)", self.command, self.exec_count)
    }
}

impl From<CommandStat> for SearchHit {
    fn from(stat: CommandStat) -> Self {
        Self {
            command: stat.command,
            exec_count: stat.exec_count,
            last_used: stat.last_used,
        }
    }
}

/// Searches executed commands by substring
#[derive(Clone)]
pub struct SearchIndex {
    store: Arc<HistoryStore>,
}

impl SearchIndex {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }

    /// Rank commands matching `term`
    ///
    /// `**` lists the most recently used commands. Blank input yields no
    /// results at all: it never means "show everything". Store failures
    /// are logged and produce an empty list.
    pub async fn search(&self, term: &str) -> Vec<SearchHit> {
        let term = term.trim();

        let result = if term == LIST_ALL {
            self.store
                .list_command_stats(LIST_ALL_LIMIT, SortField::LastUsed)
                .await
        } else if term.is_empty() {
            return Vec::new();
        } else {
            self.store.search_command_stats(term, SEARCH_LIMIT).await
        };

        match result {
            Ok(stats) => stats.into_iter().map(SearchHit::from).collect(),
            Err(e) => {
                tracing::warn!(term, error = %e, "command search failed");
                Vec::new()
            }
        }
    }

    /// Forget a command. Returns whether anything was removed.
    pub async fn delete(&self, command: &str) -> bool {
        match self.store.delete_command_stat(command).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(command, error = %e, "failed to delete command");
                false
            }
        }
    }

    /// Number of distinct commands known
    pub async fn count(&self) -> i64 {
        self.store.count_command_stats().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to count commands");
            0
        })
    }
}
