/// Session state machine
///
/// Owns the active mode, the input line and every picker (file browser,
/// search results, advisory pages), and routes keys and submissions
/// between them. Commands and agent requests run on background tasks so
/// the session keeps reacting while they are in flight.

use crate::agent::{self, Agent, AgentMode};
use crate::core::browser::{self, FileSystemBrowser};
use crate::core::dispatcher::{self, CommandDispatcher, Directive, DirectiveInfo};
use crate::core::{ExecutionOutcome, ProcessExecutor, Recorder, SearchHit, SearchIndex};
use crate::db::HistoryStore;
use crate::error::Result;
use crate::session::advisory::{AdvisoryParser, CommandAdvisory};
use crate::session::conversation::{Conversation, TurnId};
use crate::session::keys::Key;
use crate::session::mode::{CycleDirection, Mode};
use crate::session::settings_form::{FormOutcome, SettingsForm};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Answer given in chat/agent mode when no agent is configured
pub const AGENT_UNAVAILABLE: &str = "Error: No agent configured. Please check settings.";

/// Result of a background agent request
#[derive(Debug)]
pub struct AgentReply {
    pub mode: Mode,
    pub turn: TurnId,
    pub input: String,
    pub result: Result<String>,
}

/// What a submission did
#[derive(Debug)]
pub enum Submission {
    Ignored,
    /// Running in the background
    Command(JoinHandle<ExecutionOutcome>),
    Directive(Directive),
    /// Waiting for an agent reply to resolve `turn`
    Question { mode: Mode, turn: TurnId },
    /// Answered immediately with `AGENT_UNAVAILABLE`
    Unavailable,
    Settings(FormOutcome),
}

pub struct SessionController {
    mode: Mode,
    input: String,
    pending_selection: Option<String>,
    executor: Arc<ProcessExecutor>,
    dispatcher: CommandDispatcher,
    search: SearchIndex,
    search_results: Vec<SearchHit>,
    search_selected: usize,
    browser: FileSystemBrowser,
    chat: Conversation,
    agent_conversation: Conversation,
    parser: AdvisoryParser,
    advisories: Vec<CommandAdvisory>,
    advisory_page: usize,
    agent: Option<Arc<dyn Agent>>,
    recorder: Recorder,
    settings: SettingsForm,
    replies_tx: mpsc::UnboundedSender<AgentReply>,
    replies_rx: mpsc::UnboundedReceiver<AgentReply>,
    notice: Option<String>,
    command_count: i64,
    quit_requested: bool,
}

impl SessionController {
    pub fn new(
        executor: Arc<ProcessExecutor>,
        store: Arc<HistoryStore>,
        agent: Option<Arc<dyn Agent>>,
        settings: SettingsForm,
    ) -> Self {
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();

        Self {
            mode: Mode::Command,
            input: String::new(),
            pending_selection: None,
            dispatcher: CommandDispatcher::new(Arc::clone(&executor), Arc::clone(&store)),
            executor,
            search: SearchIndex::new(Arc::clone(&store)),
            search_results: Vec::new(),
            search_selected: 0,
            browser: FileSystemBrowser::new(Arc::clone(&store)),
            chat: Conversation::new(),
            agent_conversation: Conversation::new(),
            parser: AdvisoryParser::new(),
            advisories: Vec::new(),
            advisory_page: 0,
            agent,
            recorder: Recorder::new(store),
            settings,
            replies_tx,
            replies_rx,
            notice: None,
            command_count: 0,
            quit_requested: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Command chosen from search results or advisory pages, waiting for Enter
    pub fn pending_selection(&self) -> Option<&str> {
        self.pending_selection.as_deref()
    }

    pub fn executor(&self) -> &Arc<ProcessExecutor> {
        &self.executor
    }

    /// Always the executor's directory, so the two cannot drift apart
    pub fn working_directory(&self) -> PathBuf {
        self.executor.working_directory()
    }

    /// Transcript of chat or agent mode
    pub fn conversation(&self, mode: Mode) -> Option<&Conversation> {
        match mode {
            Mode::Chat => Some(&self.chat),
            Mode::Agent => Some(&self.agent_conversation),
            _ => None,
        }
    }

    fn conversation_mut(&mut self, mode: Mode) -> &mut Conversation {
        if mode == Mode::Agent {
            &mut self.agent_conversation
        } else {
            &mut self.chat
        }
    }

    pub fn search_results(&self) -> &[SearchHit] {
        &self.search_results
    }

    pub fn search_selected(&self) -> usize {
        self.search_selected
    }

    pub fn browser(&self) -> &FileSystemBrowser {
        &self.browser
    }

    pub fn advisories(&self) -> &[CommandAdvisory] {
        &self.advisories
    }

    pub fn advisory_page(&self) -> usize {
        self.advisory_page
    }

    pub fn current_advisory(&self) -> Option<&CommandAdvisory> {
        self.advisories.get(self.advisory_page)
    }

    pub fn settings_form(&self) -> &SettingsForm {
        &self.settings
    }

    pub fn is_agent_available(&self) -> bool {
        self.agent.is_some()
    }

    /// Feedback from settings mode, taken once
    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Set by `/quit`
    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Directives matching a partially typed `/name`
    pub fn directive_suggestions(&self) -> Vec<&'static DirectiveInfo> {
        if !dispatcher::is_directive(&self.input) || self.input.contains(char::is_whitespace) {
            return Vec::new();
        }
        dispatcher::suggestions(&self.input, self.mode)
    }

    /// Whether a list is waiting for the user to pick from it
    pub fn has_open_picker(&self) -> bool {
        self.browser.is_visible()
            || (self.mode == Mode::Search && !self.search_results.is_empty())
            || (self.mode == Mode::Agent && !self.advisories.is_empty())
    }

    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }

        if self.mode == Mode::Agent {
            self.clear_advisories();
        }
        if mode == Mode::Search {
            self.clear_search();
        }
        if mode == Mode::Settings {
            self.settings.reset();
            self.notice = Some(self.settings.summary());
        }

        tracing::debug!(from = %self.mode, to = %mode, "mode changed");
        self.mode = mode;
    }

    fn cycle(&mut self, direction: CycleDirection) -> bool {
        if self.mode == Mode::Settings {
            return false;
        }
        self.set_mode(self.mode.cycle(direction));
        true
    }

    fn clear_search(&mut self) {
        self.search_results.clear();
        self.search_selected = 0;
    }

    fn clear_advisories(&mut self) {
        self.advisories.clear();
        self.advisory_page = 0;
    }

    /// Replace the input line, as if the user typed it
    pub async fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();

        if self
            .pending_selection
            .as_deref()
            .is_some_and(|selected| selected != self.input)
        {
            self.pending_selection = None;
        }

        if self.mode != Mode::Settings && self.input.contains(browser::TRIGGER) {
            let cwd = self.executor.working_directory();
            self.browser.update(&self.input, &cwd).await;
            self.clear_search();
            return;
        }
        self.browser.close();

        if dispatcher::is_directive(&self.input) {
            self.clear_search();
            return;
        }

        if self.mode == Mode::Search {
            self.run_search().await;
        }
    }

    async fn run_search(&mut self) {
        self.search_results = self.search.search(&self.input).await;
        self.search_selected = 0;
    }

    /// React to a navigation key. Returns false when nothing used it.
    ///
    /// Open pickers get the key first: file browser, then search results,
    /// then advisory pages. The cycle chord comes last.
    pub async fn handle_key(&mut self, key: Key) -> bool {
        if self.browser.is_visible() {
            match key {
                Key::Up => {
                    self.browser.move_up();
                    return true;
                }
                Key::Down => {
                    self.browser.move_down();
                    return true;
                }
                Key::Enter => {
                    if let Some(line) = self.browser.select_current(&self.input) {
                        self.input = line;
                    }
                    return true;
                }
                Key::Space => {
                    if let Some(line) = self.browser.accept_current(&self.input) {
                        self.input = line;
                    }
                    return true;
                }
                Key::Escape => {
                    self.browser.close();
                    return true;
                }
                _ => {}
            }
        }

        if self.mode == Mode::Search && !self.search_results.is_empty() {
            let count = self.search_results.len();
            match key {
                Key::Up => {
                    self.search_selected = (self.search_selected + count - 1) % count;
                    return true;
                }
                Key::Down => {
                    self.search_selected = (self.search_selected + 1) % count;
                    return true;
                }
                Key::Enter => {
                    if let Some(hit) = self.search_results.get(self.search_selected) {
                        let command = hit.command.clone();
                        self.select(command);
                    }
                    self.clear_search();
                    return true;
                }
                Key::Escape => {
                    self.clear_search();
                    self.input.clear();
                    self.pending_selection = None;
                    return true;
                }
                Key::Delete => {
                    self.delete_search_result().await;
                    return true;
                }
                _ => {}
            }
        }

        if self.mode == Mode::Agent && !self.advisories.is_empty() {
            let count = self.advisories.len();
            match key {
                Key::PagePrev => {
                    self.advisory_page = (self.advisory_page + count - 1) % count;
                    return true;
                }
                Key::PageNext => {
                    self.advisory_page = (self.advisory_page + 1) % count;
                    return true;
                }
                Key::Enter => {
                    if let Some(advisory) = self.current_advisory() {
                        let command = advisory.command.clone();
                        self.select(command);
                    }
                    self.clear_advisories();
                    return true;
                }
                Key::Escape => {
                    self.clear_advisories();
                    self.input.clear();
                    self.pending_selection = None;
                    return true;
                }
                _ => {}
            }
        }

        match key {
            Key::CycleForward => self.cycle(CycleDirection::Forward),
            Key::CycleBackward => self.cycle(CycleDirection::Backward),
            Key::Escape if self.mode == Mode::Settings => {
                self.settings.reset();
                self.set_mode(Mode::Command);
                true
            }
            _ => false,
        }
    }

    /// Distinct commands in the history, as of the last refresh
    pub fn command_count(&self) -> i64 {
        self.command_count
    }

    /// Re-read the command count, e.g. after a command finished
    pub async fn refresh_command_count(&mut self) {
        self.command_count = self.search.count().await;
    }

    fn select(&mut self, command: String) {
        self.input = command.clone();
        self.pending_selection = Some(command);
    }

    async fn delete_search_result(&mut self) {
        let Some(hit) = self.search_results.get(self.search_selected) else {
            return;
        };
        let command = hit.command.clone();

        if self.search.delete(&command).await {
            let keep = self.search_selected;
            self.run_search().await;
            if keep < self.search_results.len() {
                self.search_selected = keep;
            }
        }
    }

    fn take_input(&mut self) -> String {
        self.pending_selection = None;
        self.browser.close();
        std::mem::take(&mut self.input)
    }

    /// Route the input line (Enter when no picker used the key)
    pub async fn submit(&mut self) -> Submission {
        if self.input.trim().is_empty() {
            return Submission::Ignored;
        }

        if self.pending_selection.as_deref() == Some(self.input.as_str()) {
            let command = self.take_input();
            self.set_mode(Mode::Command);
            return Submission::Command(self.spawn_command(command));
        }

        if dispatcher::is_directive(&self.input) {
            let line = self.take_input();
            let directive = self.dispatcher.dispatch(&line).await;
            match &directive {
                Directive::SwitchMode(mode) => self.set_mode(*mode),
                Directive::Quit => self.quit_requested = true,
                _ => {}
            }
            return Submission::Directive(directive);
        }

        match self.mode {
            // Pick from the list first
            Mode::Search if !self.search_results.is_empty() => Submission::Ignored,
            Mode::Search => {
                let command = self.take_input();
                self.set_mode(Mode::Command);
                Submission::Command(self.spawn_command(command))
            }
            Mode::Command => {
                let command = self.take_input();
                Submission::Command(self.spawn_command(command))
            }
            Mode::Chat | Mode::Agent => {
                let question = self.take_input();
                self.ask(question)
            }
            Mode::Settings => {
                let line = self.take_input();
                self.handle_settings(&line)
            }
        }
    }

    fn spawn_command(&self, command: String) -> JoinHandle<ExecutionOutcome> {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move { executor.execute(&command).await })
    }

    fn ask(&mut self, question: String) -> Submission {
        let mode = self.mode;
        let agent_mode = if mode == Mode::Agent {
            AgentMode::Agent
        } else {
            AgentMode::Chat
        };

        let Some(agent) = self.agent.clone() else {
            let conversation = self.conversation_mut(mode);
            conversation.ask(question);
            conversation.answer(AGENT_UNAVAILABLE);
            return Submission::Unavailable;
        };

        let conversation = self.conversation_mut(mode);
        let history = conversation.history();
        conversation.ask(question.as_str());
        let turn = conversation.begin_answer();

        let replies = self.replies_tx.clone();
        tokio::spawn(async move {
            let result = agent.process_request(&question, agent_mode, &history).await;
            // Only fails once the controller is gone
            let _ = replies.send(AgentReply {
                mode,
                turn,
                input: question,
                result,
            });
        });

        Submission::Question { mode, turn }
    }

    /// Wait for the next finished agent request
    pub async fn next_agent_reply(&mut self) -> Option<AgentReply> {
        self.replies_rx.recv().await
    }

    /// Resolve the pending answer a reply belongs to and record the exchange
    ///
    /// Advisory pages are only shown when the user is still in agent mode.
    pub async fn apply_agent_reply(&mut self, reply: AgentReply) {
        let AgentReply {
            mode,
            turn,
            input,
            result,
        } = reply;

        let answer = match result {
            Ok(text) if mode == Mode::Agent => {
                let parsed = self.parser.parse(&text);
                if self.mode == Mode::Agent {
                    self.advisories = parsed.advisories().to_vec();
                    self.advisory_page = 0;
                }
                parsed.text().to_string()
            }
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(mode = %mode, error = %e, "agent request failed");
                format!("Error: {}", e.user_message())
            }
        };

        if !self.conversation_mut(mode).resolve(turn, answer.as_str()) {
            tracing::warn!(mode = %mode, turn, "reply for unknown turn");
        }

        self.recorder
            .record_exchange(mode.as_str(), &input, &answer)
            .await;
    }

    fn handle_settings(&mut self, line: &str) -> Submission {
        let outcome = self.settings.handle(line);

        match &outcome {
            FormOutcome::Message(message) => self.notice = Some(message.clone()),
            FormOutcome::Saved(settings) => {
                self.agent = agent::from_settings(settings);
                self.notice = Some(if self.agent.is_some() {
                    "Settings saved".to_string()
                } else {
                    "Settings saved. No agent configured.".to_string()
                });
                self.set_mode(Mode::Command);
            }
            FormOutcome::Cancelled => {
                self.notice = None;
                self.set_mode(Mode::Command);
            }
        }

        Submission::Settings(outcome)
    }
}
