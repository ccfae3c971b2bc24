// Records finished interactions to the history store
//
// Store failures never reach the session: they are logged and the write is
// dropped.

use crate::db::HistoryStore;
use std::sync::Arc;

/// Mode name written for shell commands
pub const COMMAND_MODE: &str = "command";

#[derive(Clone)]
pub struct Recorder {
    store: Arc<HistoryStore>,
}

impl Recorder {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self { store }
    }

    // Save the command with everything it printed, then bump its usage stats.
    // The command text is stored as typed, no trimming.
    pub async fn record_execution(&self, command: &str, output: &str) {
        if let Err(e) = self
            .store
            .append_transcript(COMMAND_MODE, command, output)
            .await
        {
            tracing::warn!(command, error = %e, "failed to store command transcript");
        }

        match self.store.upsert_command_stat(command).await {
            Ok(count) => tracing::debug!(command, count, "command stats updated"),
            Err(e) => tracing::warn!(command, error = %e, "failed to update command stats"),
        }
    }

    /// Audit one chat/agent exchange, including failed ones
    pub async fn record_exchange(&self, mode: &str, user_message: &str, ai_response: &str) {
        if let Err(e) = self
            .store
            .append_conversation(mode, user_message, ai_response)
            .await
        {
            tracing::warn!(mode, error = %e, "failed to store conversation");
        }
    }
}
