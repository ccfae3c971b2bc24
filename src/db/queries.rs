/// SQL query functions for store operations
///
/// All queries are bound with sqlx; the only dynamic SQL is the ORDER BY
/// clause, which comes from `SortField` and never from caller text.

use crate::db::models::*;
use crate::db::HistoryStore;
use crate::error::Result;
use chrono::Utc;
use std::path::Path;

/// Folder aliases created on first start: (name, sub-directory of home, description)
const DEFAULT_ALIASES: &[(&str, &str, &str)] = &[
    ("home", "", "User home directory"),
    ("desktop", "Desktop", "Desktop folder"),
    ("documents", "Documents", "Documents folder"),
    ("downloads", "Downloads", "Downloads folder"),
];

/// Escape LIKE metacharacters so the term matches literally
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

impl HistoryStore {
    /// Persist one finished interaction of a mode
    pub async fn append_transcript(&self, mode: &str, input: &str, output: &str) -> Result<i64> {
        let result = sqlx::query("INSERT INTO history (mode, input, output) VALUES (?, ?, ?)")
            .bind(mode)
            .bind(input)
            .bind(output)
            .execute(self.pool())
            .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent transcript records, newest first
    pub async fn recent_transcripts(&self, limit: i64) -> Result<Vec<TranscriptRecord>> {
        let records = sqlx::query_as::<_, TranscriptRecord>(
            "SELECT * FROM history ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(records)
    }

    /// Record a chat or agent exchange
    pub async fn append_conversation(
        &self,
        mode: &str,
        user_message: &str,
        ai_response: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO conversations (mode, user_message, ai_response) VALUES (?, ?, ?)",
        )
        .bind(mode)
        .bind(user_message)
        .bind(ai_response)
        .execute(self.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent conversation records, newest first
    pub async fn recent_conversations(&self, limit: i64) -> Result<Vec<ConversationRecord>> {
        let records = sqlx::query_as::<_, ConversationRecord>(
            "SELECT * FROM conversations ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(records)
    }

    /// Insert a command with a count of one, or bump an existing one
    ///
    /// `last_used` always moves forward, even when two executions land in
    /// the same microsecond.
    ///
    /// # Returns
    /// * `Ok(i64)` - The execution count after the upsert
    pub async fn upsert_command_stat(&self, command: &str) -> Result<i64> {
        let now = Utc::now().timestamp_micros();

        let exec_count: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO cmd_history (command, last_used, exec_count)
            VALUES (?, ?, 1)
            ON CONFLICT(command) DO UPDATE SET
                exec_count = cmd_history.exec_count + 1,
                last_used = MAX(excluded.last_used, cmd_history.last_used + 1)
            RETURNING exec_count
            "#,
        )
        .bind(command)
        .bind(now)
        .fetch_one(self.pool())
        .await?;

        Ok(exec_count.0)
    }

    /// Look up the statistics of one exact command string
    pub async fn get_command_stat(&self, command: &str) -> Result<Option<CommandStat>> {
        let stat = sqlx::query_as::<_, CommandStat>("SELECT * FROM cmd_history WHERE command = ?")
            .bind(command)
            .fetch_optional(self.pool())
            .await?;

        Ok(stat)
    }

    /// Up to `limit` command statistics, descending by `sort`
    pub async fn list_command_stats(&self, limit: i64, sort: SortField) -> Result<Vec<CommandStat>> {
        let sql = format!(
            "SELECT * FROM cmd_history ORDER BY {} LIMIT ?",
            sort.order_clause()
        );

        let stats = sqlx::query_as::<_, CommandStat>(&sql)
            .bind(limit)
            .fetch_all(self.pool())
            .await?;

        Ok(stats)
    }

    /// Substring search over command text (ASCII case-insensitive)
    ///
    /// An empty term or the `**` wildcard lists everything exactly like
    /// `list_command_stats` with the default sort.
    pub async fn search_command_stats(&self, term: &str, limit: i64) -> Result<Vec<CommandStat>> {
        let term = term.trim();
        if term.is_empty() || term == "**" {
            return self.list_command_stats(limit, SortField::default()).await;
        }

        let stats = sqlx::query_as::<_, CommandStat>(
            r"SELECT * FROM cmd_history
              WHERE command LIKE ? ESCAPE '\'
              ORDER BY exec_count DESC, last_used DESC
              LIMIT ?",
        )
        .bind(like_pattern(term))
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(stats)
    }

    /// Delete the statistics of one exact command string
    ///
    /// # Returns
    /// * `Ok(true)` - A row was removed
    /// * `Ok(false)` - No such command
    pub async fn delete_command_stat(&self, command: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cmd_history WHERE command = ?")
            .bind(command)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of distinct commands with statistics
    pub async fn count_command_stats(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cmd_history")
            .fetch_one(self.pool())
            .await?;

        Ok(count.0)
    }

    /// Create or replace an alias
    ///
    /// Store failures are logged and reported as `false`.
    pub async fn add_alias(
        &self,
        name: &str,
        path: &str,
        description: Option<&str>,
        kind: AliasKind,
    ) -> bool {
        let result = sqlx::query(
            r#"
            INSERT INTO f_aliases (name, path, description, kind)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                path = excluded.path,
                description = excluded.description,
                kind = excluded.kind
            "#,
        )
        .bind(name)
        .bind(path)
        .bind(description.unwrap_or(""))
        .bind(kind.as_str())
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(alias = name, error = %e, "failed to store alias");
                false
            }
        }
    }

    /// Get alias by exact name
    pub async fn get_alias(&self, name: &str) -> Result<Option<Alias>> {
        let alias = sqlx::query_as::<_, Alias>("SELECT * FROM f_aliases WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;

        Ok(alias)
    }

    /// All aliases, ordered by name
    pub async fn list_aliases(&self) -> Result<Vec<Alias>> {
        let aliases = sqlx::query_as::<_, Alias>("SELECT * FROM f_aliases ORDER BY name")
            .fetch_all(self.pool())
            .await?;

        Ok(aliases)
    }

    /// Delete an alias. Returns whether one existed.
    pub async fn delete_alias(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM f_aliases WHERE name = ?")
            .bind(name)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert the well-known folder aliases that are missing
    ///
    /// Existing aliases with the same names are left untouched.
    ///
    /// # Returns
    /// * `Ok(usize)` - How many aliases were inserted
    pub async fn bootstrap_default_aliases(&self, home_dir: &Path) -> Result<usize> {
        let mut inserted = 0;

        for (name, sub_dir, description) in DEFAULT_ALIASES {
            let path = if sub_dir.is_empty() {
                home_dir.to_path_buf()
            } else {
                home_dir.join(sub_dir)
            };

            let result = sqlx::query(
                r#"
                INSERT INTO f_aliases (name, path, description, kind)
                VALUES (?, ?, ?, 'folder')
                ON CONFLICT(name) DO NOTHING
                "#,
            )
            .bind(*name)
            .bind(path.to_string_lossy().into_owned())
            .bind(*description)
            .execute(self.pool())
            .await?;

            inserted += result.rows_affected() as usize;
        }

        Ok(inserted)
    }
}
