/// Shell command execution
///
/// Runs one command line at a time through the detected shell, streams every
/// stdout/stderr chunk into the command transcript in arrival order, and
/// publishes an immutable snapshot to every subscriber after each change.

use crate::core::recorder::Recorder;
use crate::core::transcript::TranscriptEntry;
use crate::db::HistoryStore;
use crate::shell::Shell;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Bytes read from a pipe per chunk
const READ_CHUNK: usize = 8 * 1024;

pub type SubscriberId = u64;

/// State published to subscribers
#[derive(Debug, Clone)]
pub struct ExecutorSnapshot {
    pub transcript: Arc<Vec<TranscriptEntry>>,
    pub is_processing: bool,
}

/// How a call to `execute` ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The child ran and exited. `None` when it was killed by a signal.
    Completed { exit_code: Option<i32> },
    /// The OS refused to start the shell
    SpawnFailed,
    /// Another command was still running; nothing was started
    Busy,
}

/// Receiving end of an executor subscription
pub struct Subscription {
    id: SubscriberId,
    receiver: UnboundedReceiver<ExecutorSnapshot>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next snapshot. `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<ExecutorSnapshot> {
        self.receiver.recv().await
    }

    /// Next already-delivered snapshot, if any
    pub fn try_recv(&mut self) -> Option<ExecutorSnapshot> {
        self.receiver.try_recv().ok()
    }
}

struct ExecutorState {
    transcript: Arc<Vec<TranscriptEntry>>,
    running: Option<String>,
    working_directory: PathBuf,
    subscribers: Vec<(SubscriberId, UnboundedSender<ExecutorSnapshot>)>,
    next_subscriber: SubscriberId,
}

impl ExecutorState {
    fn snapshot(&self) -> ExecutorSnapshot {
        ExecutorSnapshot {
            transcript: Arc::clone(&self.transcript),
            is_processing: self.running.is_some(),
        }
    }

    fn push(&mut self, entry: TranscriptEntry) {
        Arc::make_mut(&mut self.transcript).push(entry);
    }

    // Sent while the lock is held, so every subscriber sees changes in order.
    // Subscribers whose receiver is gone are dropped here.
    fn notify(&mut self) {
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|(_, sender)| sender.send(snapshot.clone()).is_ok());
    }
}

/// Executes shell commands for one session
pub struct ProcessExecutor {
    state: Mutex<ExecutorState>,
    recorder: Recorder,
    shell: Shell,
}

impl ProcessExecutor {
    pub fn new(store: Arc<HistoryStore>, shell: Shell, working_directory: PathBuf) -> Self {
        Self {
            state: Mutex::new(ExecutorState {
                transcript: Arc::new(Vec::new()),
                running: None,
                working_directory,
                subscribers: Vec::new(),
                next_subscriber: 0,
            }),
            recorder: Recorder::new(store),
            shell,
        }
    }

    // The lock is never held across an await, so a poisoned lock only means
    // a panic elsewhere mid-push; the data is still consistent.
    fn state(&self) -> MutexGuard<'_, ExecutorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an observer. The current state is delivered immediately.
    pub fn subscribe(&self) -> Subscription {
        let mut state = self.state();
        let id = state.next_subscriber;
        state.next_subscriber += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is alive right here
        let _ = sender.send(state.snapshot());
        state.subscribers.push((id, sender));

        Subscription { id, receiver }
    }

    /// Remove an observer. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut state = self.state();
        let before = state.subscribers.len();
        state.subscribers.retain(|(sub_id, _)| *sub_id != id);
        state.subscribers.len() != before
    }

    pub fn snapshot(&self) -> ExecutorSnapshot {
        self.state().snapshot()
    }

    pub fn transcript(&self) -> Arc<Vec<TranscriptEntry>> {
        Arc::clone(&self.state().transcript)
    }

    pub fn is_processing(&self) -> bool {
        self.state().running.is_some()
    }

    pub fn working_directory(&self) -> PathBuf {
        self.state().working_directory.clone()
    }

    /// Callers validate the directory; this only stores it.
    pub fn set_working_directory(&self, path: impl AsRef<Path>) {
        self.state().working_directory = path.as_ref().to_path_buf();
    }

    /// Append an entry produced outside of a running command
    pub fn push_entry(&self, entry: TranscriptEntry) {
        let mut state = self.state();
        state.push(entry);
        state.notify();
    }

    pub fn clear_transcript(&self) {
        let mut state = self.state();
        state.transcript = Arc::new(Vec::new());
        state.notify();
    }

    /// Run `command_line` through the shell in the current working directory
    ///
    /// Output is appended chunk by chunk as it arrives. Once the child exits
    /// the full output and the usage statistics are written to the store.
    /// Spawn failures end up in the transcript, never in the return value.
    pub async fn execute(&self, command_line: &str) -> ExecutionOutcome {
        let working_directory = {
            let mut state = self.state();
            if let Some(running) = state.running.clone() {
                state.push(TranscriptEntry::output(format!(
                    "Busy: '{}' is still running, '{}' was not started",
                    running, command_line
                )));
                state.notify();
                return ExecutionOutcome::Busy;
            }

            state.push(TranscriptEntry::command(command_line));
            state.running = Some(command_line.to_string());
            state.notify();
            state.working_directory.clone()
        };

        tracing::debug!(
            command = command_line,
            cwd = %working_directory.display(),
            shell = %self.shell,
            "spawning command"
        );

        let spawned = self
            .shell
            .command(command_line)
            .current_dir(&working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(command = command_line, error = %e, "spawn failed");
                self.finish(Some(TranscriptEntry::output(format!(
                    "Error executing command: {}",
                    e
                ))));
                return ExecutionOutcome::SpawnFailed;
            }
        };

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let mut out_buf = vec![0u8; READ_CHUNK];
        let mut err_buf = vec![0u8; READ_CHUNK];
        let mut out_text = Utf8Stream::default();
        let mut err_text = Utf8Stream::default();
        let mut output = String::new();

        while stdout.is_some() || stderr.is_some() {
            tokio::select! {
                read = read_chunk(&mut stdout, &mut out_buf), if stdout.is_some() => match read {
                    Ok(n) if n > 0 => self.push_output(&mut output, &out_text.decode(&out_buf[..n])),
                    _ => {
                        stdout = None;
                        self.push_output(&mut output, &out_text.finish());
                    }
                },
                read = read_chunk(&mut stderr, &mut err_buf), if stderr.is_some() => match read {
                    Ok(n) if n > 0 => self.push_output(&mut output, &err_text.decode(&err_buf[..n])),
                    _ => {
                        stderr = None;
                        self.push_output(&mut output, &err_text.finish());
                    }
                },
            }
        }

        let exit_code = match child.wait().await {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::warn!(command = command_line, error = %e, "failed to wait for child");
                None
            }
        };

        if output.is_empty() {
            let code = exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
            output = format!("Command executed with exit code {}", code);
            self.push_entry(TranscriptEntry::output(output.clone()));
        }

        self.recorder.record_execution(command_line, &output).await;

        tracing::debug!(command = command_line, ?exit_code, "command finished");
        self.finish(None);

        ExecutionOutcome::Completed { exit_code }
    }

    fn push_output(&self, output: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        output.push_str(text);
        self.push_entry(TranscriptEntry::output(text.trim_end()));
    }

    fn finish(&self, entry: Option<TranscriptEntry>) {
        let mut state = self.state();
        if let Some(entry) = entry {
            state.push(entry);
        }
        state.running = None;
        state.notify();
    }
}

/// Decodes one pipe as UTF-8 across reads
///
/// A character split between two reads is held back until the rest of it
/// arrives. Bytes that can never form valid UTF-8 become U+FFFD.
#[derive(Default)]
struct Utf8Stream {
    pending: Vec<u8>,
}

impl Utf8Stream {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let complete = self.pending.len() - incomplete_tail(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..complete]).into_owned();
        self.pending.drain(..complete);
        text
    }

    /// Whatever is left once the pipe closed
    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a truncated multi-byte sequence at the end of `bytes`
fn incomplete_tail(bytes: &[u8]) -> usize {
    let len = bytes.len();
    for back in 1..=len.min(3) {
        let byte = bytes[len - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match reader {
        Some(reader) => reader.read(buf).await,
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::EntryKind;
    use std::time::Duration;
    use tempfile::TempDir;

    async fn setup() -> (Arc<ProcessExecutor>, Arc<HistoryStore>) {
        let store = Arc::new(HistoryStore::new_test().await.unwrap());
        let cwd = std::env::current_dir().unwrap();
        let executor = Arc::new(ProcessExecutor::new(Arc::clone(&store), Shell::Sh, cwd));
        (executor, store)
    }

    fn drain(subscription: &mut Subscription) -> Vec<ExecutorSnapshot> {
        let mut snapshots = Vec::new();
        while let Some(snapshot) = subscription.try_recv() {
            snapshots.push(snapshot);
        }
        snapshots
    }

    #[tokio::test]
    async fn test_echo_hello() {
        let (executor, _store) = setup().await;
        let mut subscription = executor.subscribe();

        let outcome = executor.execute("echo hello").await;
        assert_eq!(outcome, ExecutionOutcome::Completed { exit_code: Some(0) });

        let transcript = executor.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].kind, EntryKind::Command);
        assert_eq!(transcript[0].text, "echo hello");
        assert_eq!(transcript[1].kind, EntryKind::Output);
        assert_eq!(transcript[1].text, "hello");

        let snapshots = drain(&mut subscription);
        // Immediate state on subscribe
        assert!(snapshots[0].transcript.is_empty());
        assert!(!snapshots[0].is_processing);
        assert!(snapshots.iter().any(|s| s.is_processing));

        let last = snapshots.last().unwrap();
        assert!(!last.is_processing);
        assert_eq!(last.transcript.len(), 2);
        assert!(!executor.is_processing());
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let (executor, _store) = setup().await;

        executor.execute("echo oops 1>&2").await;

        let transcript = executor.transcript();
        assert_eq!(transcript[1].text, "oops");
    }

    #[tokio::test]
    async fn test_silent_command_reports_exit_code() {
        let (executor, store) = setup().await;

        executor.execute("true").await;
        let outcome = executor.execute("exit 3").await;
        assert_eq!(outcome, ExecutionOutcome::Completed { exit_code: Some(3) });

        let transcript = executor.transcript();
        assert_eq!(transcript[1].text, "Command executed with exit code 0");
        assert_eq!(transcript[3].text, "Command executed with exit code 3");

        // The synthesized line is what gets persisted as output
        let records = store.recent_transcripts(1).await.unwrap();
        assert_eq!(
            records[0].output.as_deref(),
            Some("Command executed with exit code 3")
        );
    }

    #[tokio::test]
    async fn test_full_output_and_stats_persisted() {
        let (executor, store) = setup().await;

        executor.execute("printf 'a\\nb\\n'").await;
        executor.execute("printf 'a\\nb\\n'").await;

        let records = store.recent_transcripts(1).await.unwrap();
        assert_eq!(records[0].input, "printf 'a\\nb\\n'");
        assert_eq!(records[0].output.as_deref(), Some("a\nb\n"));

        let stat = store
            .get_command_stat("printf 'a\\nb\\n'")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stat.exec_count, 2);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_local() {
        let (executor, store) = setup().await;
        executor.set_working_directory("/definitely/not/a/real/dir");

        let outcome = executor.execute("echo never").await;
        assert_eq!(outcome, ExecutionOutcome::SpawnFailed);

        let transcript = executor.transcript();
        assert_eq!(transcript.len(), 2);
        assert!(transcript[1].text.starts_with("Error executing command: "));
        assert!(!executor.is_processing());

        // Nothing persisted for a command that never ran
        assert_eq!(store.count_command_stats().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_working_directory_is_used() {
        let (executor, _store) = setup().await;
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

        executor.set_working_directory(dir.path());
        assert_eq!(executor.working_directory(), dir.path());

        executor.execute("ls").await;
        let transcript = executor.transcript();
        assert!(transcript[1].text.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_second_command_is_rejected_while_busy() {
        let (executor, store) = setup().await;

        let running = Arc::clone(&executor);
        let handle = tokio::spawn(async move { running.execute("sleep 1").await });

        while !executor.is_processing() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let outcome = executor.execute("echo late").await;
        assert_eq!(outcome, ExecutionOutcome::Busy);

        let first = handle.await.unwrap();
        assert_eq!(first, ExecutionOutcome::Completed { exit_code: Some(0) });

        let transcript = executor.transcript();
        assert!(transcript.iter().any(|e| e.text.starts_with("Busy: 'sleep 1'")));
        assert!(!transcript.iter().any(|e| e.text == "echo late" && e.is_command()));
        assert!(store.get_command_stat("echo late").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_notifications() {
        let (executor, _store) = setup().await;
        let mut subscription = executor.subscribe();
        let other = executor.subscribe();

        assert!(executor.unsubscribe(subscription.id()));
        assert!(!executor.unsubscribe(subscription.id()));

        executor.push_entry(TranscriptEntry::output("after"));

        // Only the initial snapshot was delivered, then the channel closed
        assert_eq!(drain(&mut subscription).len(), 1);
        assert!(subscription.recv().await.is_none());

        drop(other);
        executor.push_entry(TranscriptEntry::output("pruned"));
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_change_in_order() {
        let (executor, _store) = setup().await;
        let mut first = executor.subscribe();
        let mut second = executor.subscribe();

        executor.execute("echo hello").await;

        let first = drain(&mut first);
        let second = drain(&mut second);
        assert_eq!(first.len(), second.len());
        // initial, command pushed, output chunk, finished
        assert!(first.len() >= 4);

        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.transcript, b.transcript);
            assert_eq!(a.is_processing, b.is_processing);
        }

        let lengths: Vec<_> = first.iter().map(|s| s.transcript.len()).collect();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        assert!(first[1].is_processing);

        let last = first.last().unwrap();
        assert!(!last.is_processing);
        assert_eq!(last.transcript.len(), 2);
        assert_eq!(last.transcript[1].text, "hello");
    }

    #[tokio::test]
    async fn test_character_split_across_reads() {
        let (executor, store) = setup().await;
        let dir = TempDir::new().unwrap();
        let content = format!("{}é", "a".repeat(READ_CHUNK - 1));
        std::fs::write(dir.path().join("wide.txt"), &content).unwrap();
        executor.set_working_directory(dir.path());

        executor.execute("cat wide.txt").await;

        let shown: String = executor
            .transcript()
            .iter()
            .skip(1)
            .map(|e| e.text.as_str())
            .collect();
        assert!(!shown.contains('\u{FFFD}'));
        assert!(shown.ends_with('é'));

        let records = store.recent_transcripts(1).await.unwrap();
        assert_eq!(records[0].output.as_deref(), Some(content.as_str()));
    }

    #[test]
    fn test_utf8_stream_holds_back_partial_characters() {
        let mut stream = Utf8Stream::default();
        let bytes = "né€😀".as_bytes();

        let mut text = String::new();
        for byte in bytes {
            text.push_str(&stream.decode(std::slice::from_ref(byte)));
        }
        text.push_str(&stream.finish());
        assert_eq!(text, "né€😀");

        // A dangling lead byte at the end is flushed as a replacement
        assert_eq!(stream.decode(&[b'x', 0xE2]), "x");
        assert_eq!(stream.finish(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn test_clear_transcript() {
        let (executor, _store) = setup().await;
        executor.execute("echo one").await;

        let mut subscription = executor.subscribe();
        executor.clear_transcript();

        assert!(executor.transcript().is_empty());
        let snapshots = drain(&mut subscription);
        assert!(snapshots.last().unwrap().transcript.is_empty());
    }
}
