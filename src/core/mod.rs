/// Core functionality modules
///
/// Contains command execution and recording, history search, slash
/// directives and `@` path completion.

pub mod browser;
pub mod dispatcher;
pub mod executor;
pub mod recorder;
pub mod searcher;
pub mod transcript;

pub use browser::{BrowserEntry, FileSystemBrowser};
pub use dispatcher::{CommandDispatcher, Directive};
pub use executor::{ExecutionOutcome, ExecutorSnapshot, ProcessExecutor, Subscription};
pub use recorder::Recorder;
pub use searcher::{SearchHit, SearchIndex};
pub use transcript::{EntryKind, TranscriptEntry};
