/// Database connection management
///
/// The history store is a single shared SQLite connection. The pool is capped
/// at one connection so every statement is serialized, which is what keeps
/// the upsert and bootstrap paths race-free without explicit locking.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// One connection: access to the store is serialized.
const MAX_CONNECTIONS: u32 = 1;

/// Durable store for transcripts, conversations, command stats and aliases
#[derive(Clone)]
pub struct HistoryStore {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl HistoryStore {
    /// Open (or create) the store at `db_path`
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    ///
    /// # Returns
    /// * `Ok(HistoryStore)` - Store with schema initialized
    /// * `Err(ShellError)` - If the file cannot be opened
    ///
    /// # Examples
    /// ```no_run
    /// use modeshell_lib::db::HistoryStore;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let store = HistoryStore::new("/tmp/modeshell/modeshell.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self {
            pool: Arc::new(pool),
            db_path,
        };

        store.initialize_schema().await?;

        Ok(store)
    }

    /// Create a test store in memory
    ///
    /// The connection is never recycled, otherwise the in-memory database
    /// would vanish with it.
    #[cfg(test)]
    pub async fn new_test() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self {
            pool: Arc::new(pool),
            db_path: PathBuf::from(":memory:"),
        };

        store.initialize_schema().await?;

        Ok(store)
    }

    /// Create all tables and indexes if they don't exist
    async fn initialize_schema(&self) -> Result<()> {
        let schema = include_str!("../../database/schema.sql");

        // sqlx runs one statement per query here
        for statement in schema.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed).execute(self.pool.as_ref()).await?;
            }
        }

        Ok(())
    }

    /// Connection pool used by the query functions
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Close the connection. Called on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Row counts per table
    pub async fn stats(&self) -> Result<StoreStats> {
        let transcripts: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM history")
            .fetch_one(self.pool.as_ref())
            .await?;

        let conversations: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(self.pool.as_ref())
            .await?;

        let commands: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cmd_history")
            .fetch_one(self.pool.as_ref())
            .await?;

        let aliases: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM f_aliases")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(StoreStats {
            total_transcripts: transcripts.0,
            total_conversations: conversations.0,
            total_commands: commands.0,
            total_aliases: aliases.0,
        })
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub total_transcripts: i64,
    pub total_conversations: i64,
    pub total_commands: i64,
    pub total_aliases: i64,
}
