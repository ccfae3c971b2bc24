// modeshell - one prompt for running commands, chatting, asking for
// commands and searching what you already ran
//
// This is the main entry point. Sets up logging, storage and settings, then
// drives the session controller from raw terminal key events.

use anyhow::Context;
use crossterm::{
    cursor,
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::Print,
    terminal::{self, ClearType},
};
use futures::StreamExt;
use modeshell_lib::{
    agent,
    config::{self, AppPaths},
    core::{EntryKind, ExecutorSnapshot, ProcessExecutor},
    session::{Key, Mode, SessionController, SettingsForm, Submission},
    shell::ShellDetector,
    HistoryStore,
};
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Stdout, Write};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Log filter, e.g. `MODESHELL_LOG=modeshell_lib=debug`
const LOG_ENV: &str = "MODESHELL_LOG";

/// Lines of a list shown below the prompt at once
const LIST_HEIGHT: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        None => {}
        Some("version" | "-v" | "--version") => {
            println!("modeshell v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Some("help" | "-h" | "--help") => {
            print_usage();
            return Ok(());
        }
        Some("status" | "--status") => {
            init_logging(None);
            return handle_status().await;
        }
        Some(other) => {
            eprintln!("Unknown argument: {}", other);
            print_usage();
            return Ok(());
        }
    }

    let paths = AppPaths::from_env()?;
    init_logging(open_log(&paths));
    run(paths).await
}

/// Logs go to stderr, or to `log` while the terminal is in raw mode
fn init_logging(log: Option<File>) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log {
        Some(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        None => builder.with_writer(io::stderr).init(),
    }
}

fn open_log(paths: &AppPaths) -> Option<File> {
    let dir = paths.root().join("logs");
    std::fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("modeshell.log"))
        .ok()
}

async fn open_store(paths: &AppPaths) -> anyhow::Result<Arc<HistoryStore>> {
    let db_path = paths.database_file();
    let store = HistoryStore::new(&db_path)
        .await
        .with_context(|| format!("Failed to open history database at {}", db_path.display()))?;
    Ok(Arc::new(store))
}

async fn run(paths: AppPaths) -> anyhow::Result<()> {
    let settings = config::load_settings(&paths.settings_file());
    let store = open_store(&paths).await?;

    if let Some(home) = dirs::home_dir() {
        if let Err(e) = store.bootstrap_default_aliases(&home).await {
            tracing::warn!(error = %e, "failed to create default aliases");
        }
    }

    let shell = ShellDetector::detect_or_default();
    let cwd = env::current_dir().context("Failed to read the current directory")?;
    let executor = Arc::new(ProcessExecutor::new(Arc::clone(&store), shell, cwd));
    tracing::info!(shell = %shell, "session started");

    let agent = agent::from_settings(&settings);
    let form = SettingsForm::new(paths.settings_file(), settings);
    let mut controller =
        SessionController::new(Arc::clone(&executor), Arc::clone(&store), agent, form);
    controller.refresh_command_count().await;

    let mut screen = Screen::enter().context("Failed to put the terminal into raw mode")?;
    let result = event_loop(&mut screen, &mut controller, &executor).await;
    drop(screen);

    store.close().await;
    result
}

async fn event_loop(
    screen: &mut Screen,
    controller: &mut SessionController,
    executor: &ProcessExecutor,
) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    let mut subscription = executor.subscribe();
    let mut printed = 0;
    let mut was_processing = false;

    screen.print(&banner(controller))?;
    screen.draw(controller)?;

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    break;
                };
                let Event::Key(key) = event.context("Failed to read terminal input")? else {
                    screen.draw(controller)?;
                    continue;
                };
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if is_interrupt(&key) {
                    break;
                }

                handle_key_event(screen, controller, key).await?;
                if controller.quit_requested() {
                    break;
                }
                screen.draw(controller)?;
            }
            Some(mut snapshot) = subscription.recv() => {
                // Each snapshot carries the whole transcript
                let mut ran = was_processing || snapshot.is_processing;
                while let Some(next) = subscription.try_recv() {
                    ran |= next.is_processing;
                    snapshot = next;
                }
                printed = print_transcript(screen, &snapshot, printed)?;
                if ran && !snapshot.is_processing {
                    controller.refresh_command_count().await;
                }
                was_processing = snapshot.is_processing;
                screen.draw(controller)?;
            }
            Some(reply) = controller.next_agent_reply() => {
                let (mode, turn) = (reply.mode, reply.turn);
                controller.apply_agent_reply(reply).await;
                if let Some(answer) = controller
                    .conversation(mode)
                    .and_then(|c| c.turns().iter().find(|t| t.id == turn))
                {
                    if mode == controller.mode() {
                        screen.print(&answer.text)?;
                    } else {
                        screen.print(&format!("[{}] {}", mode, answer.text))?;
                    }
                }
                screen.draw(controller)?;
            }
        }
    }

    executor.unsubscribe(subscription.id());
    Ok(())
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
}

async fn handle_key_event(
    screen: &mut Screen,
    controller: &mut SessionController,
    key: KeyEvent,
) -> anyhow::Result<()> {
    if let Some(key) = Key::from_event(&key) {
        if controller.handle_key(key).await {
            return Ok(());
        }

        match key {
            Key::Enter => {
                let mode = controller.mode();
                let line = controller.input().to_string();
                let submission = controller.submit().await;
                report(screen, controller, mode, &line, submission)?;
            }
            Key::Space => {
                let line = format!("{} ", controller.input());
                controller.set_input(line).await;
            }
            _ => {}
        }
        return Ok(());
    }

    match key.code {
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let mut line = controller.input().to_string();
            line.push(c);
            controller.set_input(line).await;
        }
        KeyCode::Backspace => {
            let mut line = controller.input().to_string();
            if line.pop().is_some() {
                controller.set_input(line).await;
            }
        }
        // Complete a partially typed directive
        KeyCode::Tab => {
            let first = controller.directive_suggestions().first().map(|d| d.name);
            if let Some(name) = first {
                controller.set_input(name).await;
            }
        }
        _ => {}
    }
    Ok(())
}

fn report(
    screen: &mut Screen,
    controller: &mut SessionController,
    mode: Mode,
    line: &str,
    submission: Submission,
) -> io::Result<()> {
    match submission {
        // The executor and the dispatcher write to the transcript
        Submission::Ignored | Submission::Command(_) | Submission::Directive(_) => {}
        Submission::Question { .. } => screen.print(&format!("{}> {}", mode, line))?,
        Submission::Unavailable => {
            screen.print(&format!("{}> {}", mode, line))?;
            if let Some(answer) = controller.conversation(mode).and_then(|c| c.turns().last()) {
                screen.print(&answer.text)?;
            }
        }
        // Never echoed: the line may carry an API key
        Submission::Settings(_) => {}
    }

    if let Some(notice) = controller.take_notice() {
        screen.print(&notice)?;
    }
    Ok(())
}

/// Print transcript entries added since `printed`; returns the new count
fn print_transcript(
    screen: &mut Screen,
    snapshot: &ExecutorSnapshot,
    printed: usize,
) -> io::Result<usize> {
    // Cleared with /clear
    let start = if snapshot.transcript.len() < printed {
        0
    } else {
        printed
    };

    for entry in &snapshot.transcript[start..] {
        match entry.kind {
            EntryKind::Command => screen.print(&format!("$ {}", entry.text))?,
            EntryKind::Output => screen.print(&entry.text)?,
        }
    }
    Ok(snapshot.transcript.len())
}

fn banner(controller: &SessionController) -> String {
    let mut text = format!("modeshell v{}", env!("CARGO_PKG_VERSION"));
    if !controller.is_agent_available() {
        text.push_str("\nNo agent configured. Use /settings to add an API key.");
    }
    text.push_str("\nCtrl+Up/Down switches mode, /quit or Ctrl+C leaves.");
    text
}

fn prompt(controller: &SessionController) -> String {
    let running = if controller.executor().is_processing() {
        " · running"
    } else {
        ""
    };

    let location = match controller.mode() {
        Mode::Settings => {
            let draft = controller.settings_form().draft();
            format!("{}/{}", draft.provider, draft.model)
        }
        _ => controller.working_directory().display().to_string(),
    };

    format!(
        "[{} · {} cmds{}] {} > ",
        controller.mode(),
        controller.command_count(),
        running,
        location
    )
}

/// Lines shown under the prompt: open lists and hints
fn below_prompt(controller: &SessionController) -> Vec<String> {
    let mut lines = Vec::new();

    let browser = controller.browser();
    if browser.is_visible() {
        if let Some(path) = browser.current_path() {
            lines.push(format!("  {}", path.display()));
        }
        if browser.entries().is_empty() {
            lines.push("  (empty, Space takes this directory)".to_string());
        }
        let labels: Vec<_> = browser.entries().iter().map(|e| e.label()).collect();
        lines.extend(list_window(&labels, browser.selected_index()));
        return lines;
    }

    if controller.mode() == Mode::Search && controller.has_open_picker() {
        let labels: Vec<_> = controller.search_results().iter().map(|h| h.label()).collect();
        lines.extend(list_window(&labels, controller.search_selected()));
        lines.push("  Enter picks, Del forgets, Esc clears".to_string());
    }

    if let Some(advisory) = controller.current_advisory() {
        lines.push(format!(
            "  [{}/{}] {}",
            controller.advisory_page() + 1,
            controller.advisories().len(),
            advisory.command
        ));
        lines.push(format!("    {}", advisory.description));
        if let Some(options) = &advisory.options {
            lines.push(format!("    Options: {}", options));
        }
        if let Some(examples) = &advisory.examples {
            lines.push(format!("    Examples: {}", examples));
        }
        lines.push("  Ctrl+Left/Right pages, Enter picks, Esc clears".to_string());
    }

    for directive in controller.directive_suggestions() {
        lines.push(format!("  {:<10} {}", directive.name, directive.description));
    }

    if controller.pending_selection().is_some() {
        lines.push("  Enter runs this command".to_string());
    }

    lines
}

/// At most `LIST_HEIGHT` items around the selected one
fn list_window(labels: &[String], selected: usize) -> Vec<String> {
    let start = selected.saturating_sub(LIST_HEIGHT - 1);
    labels
        .iter()
        .enumerate()
        .skip(start)
        .take(LIST_HEIGHT)
        .map(|(i, label)| {
            let marker = if i == selected { '>' } else { ' ' };
            format!("{} {}", marker, label)
        })
        .collect()
}

/// Raw-mode terminal with output scrolling above an editable prompt
struct Screen {
    out: Stdout,
}

impl Screen {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;

        // Leave raw mode before a panic message is printed
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = terminal::disable_raw_mode();
            previous(info);
        }));

        Ok(Self { out: io::stdout() })
    }

    /// Print text above the prompt
    fn print(&mut self, text: &str) -> io::Result<()> {
        queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::FromCursorDown)
        )?;
        for line in text.lines() {
            queue!(self.out, Print(line), Print("\r\n"))?;
        }
        Ok(())
    }

    /// Redraw the prompt line and everything below it
    fn draw(&mut self, controller: &SessionController) -> io::Result<()> {
        let prompt = prompt(controller);
        let below = below_prompt(controller);

        queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::FromCursorDown),
            Print(&prompt),
            Print(controller.input())
        )?;
        for line in &below {
            queue!(self.out, Print("\r\n"), Print(line))?;
        }
        if !below.is_empty() {
            queue!(self.out, cursor::MoveUp(below.len() as u16))?;
        }

        let column = prompt.chars().count() + controller.input().chars().count();
        queue!(
            self.out,
            cursor::MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX))
        )?;
        self.out.flush()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = queue!(
            self.out,
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::FromCursorDown)
        );
        let _ = self.out.flush();
        let _ = terminal::disable_raw_mode();
    }
}

async fn handle_status() -> anyhow::Result<()> {
    let paths = AppPaths::from_env()?;
    let settings = config::load_settings(&paths.settings_file());
    let store = open_store(&paths).await?;
    let stats = store.stats().await?;

    println!("\nmodeshell Status");
    println!("{}", "=".repeat(60));

    println!("\nSettings ({}):", paths.settings_file().display());
    println!("  Provider:    {}", settings.provider);
    println!("  Model:       {}", settings.model);
    println!("  API key:     {}", settings.masked_key());

    println!("\nDatabase ({}):", store.path().display());
    println!("  Transcript:    {}", stats.total_transcripts);
    println!("  Conversations: {}", stats.total_conversations);
    println!("  Commands:      {}", stats.total_commands);
    println!("  Aliases:       {}", stats.total_aliases);

    println!("\nShell:");
    match ShellDetector::detect() {
        Ok(shell) => println!("  {}", shell),
        Err(_) => println!("  Unknown (using {})", ShellDetector::detect_or_default()),
    }

    println!("{}", "=".repeat(60));

    store.close().await;
    Ok(())
}

fn print_usage() {
    println!(
        r#"modeshell v{} - one prompt, four modes

USAGE:
    modeshell [COMMAND]

COMMANDS:
    (none)                 Start an interactive session
    status                 Show settings and database statistics
    version                Show version
    help                   Show this help

SESSION:
    Ctrl+Up / Ctrl+Down         Cycle command, chat, agent and search mode
    /cli /chat /agent /search   Switch mode directly
    Up / Down, Enter, Esc       Move in, pick from, close a list
    Ctrl+Left / Ctrl+Right      Page through agent suggestions
    Delete                      Forget the highlighted search result
    /cwd <dir>                  Change working directory
    /alias [name path [desc]]   List or add a folder alias
    /unalias <name>             Remove an alias
    /clear                      Clear the command transcript
    /settings                   Configure provider, model and API key
    /quit, Ctrl+C               Leave
    name@                       Browse an alias; a bare @ lists the current directory,
                                Space takes the highlighted entry

ENVIRONMENT:
    {}          Data directory (default: ~/.modeshell)
    {}           Log filter (default: warn), written to <data>/logs
"#,
        env!("CARGO_PKG_VERSION"),
        config::HOME_ENV,
        LOG_ENV,
    );
}
