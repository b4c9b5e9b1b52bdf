//! Sandchat CLI - terminal client for a remote code-interpreter sandbox
//!
//! Establishes the durable session identity, fires the one-shot sandbox
//! initialization, and then drives the streaming chat through a TUI. File
//! uploads run either inline (`/upload` in the chat) or via the `upload`
//! subcommand with a plain progress bar.

mod tui;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use tokio::sync::mpsc;

use sandchat_core::chat::{ChatClient, ChatEvent, Role};
use sandchat_core::config::{Config, ConfigManager};
use sandchat_core::output::{ExecutionOutput, Representation};
use sandchat_core::session::{
    FileSessionStore, HttpSandboxApi, Session, SessionController,
};
use sandchat_core::tools::{self, InvocationOutcome, ToolDisplay};
use sandchat_core::upload::{UploadManager, UploadState};

// TUI imports
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use tui::{App, AppState, Event, EventHandler, KeyAction, handle_key_normal, handle_key_streaming};

/// Where the unsent input draft is persisted between runs
const DRAFT_FILE: &str = "input_draft";

#[derive(Parser)]
#[command(name = "sandchat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat with an assistant that runs code in a per-session sandbox", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Backend base URL (overrides the config file)
    #[arg(short, long)]
    base_url: Option<String>,

    /// Verbose logging (written to the log file, never the screen)
    #[arg(short, long)]
    verbose: bool,

    /// Execute a single prompt and exit (non-interactive mode)
    #[arg(long)]
    one_shot: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat mode
    Chat,

    /// Upload a file into the session's sandbox
    Upload {
        /// File to upload
        file: PathBuf,
    },

    /// Show the active session and configuration
    Info,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to a file so they never corrupt the TUI surface
    let _log_guard = init_logging(cli.verbose)?;

    let mut config_manager = ConfigManager::new()?;
    if let Some(base_url) = cli.base_url.clone() {
        config_manager.config_mut().api_base_url = base_url;
    }
    config_manager
        .config()
        .validate()
        .context("backend base URL is not usable")?;
    let config = Arc::new(config_manager.config().clone());

    let store = Arc::new(FileSessionStore::new());
    let api = Arc::new(HttpSandboxApi::new(config.clone())?);
    let controller = Arc::new(SessionController::new(store, api));
    let session = controller
        .ensure_session()
        .context("could not establish a session identity")?;
    tracing::info!("session {} against {}", session.id, config.api_base_url);

    if let Some(prompt) = cli.one_shot {
        return run_one_shot(config, controller, session.id, &prompt).await;
    }

    match cli.command {
        Some(Commands::Upload { file }) => run_upload(config, &session.id, &file).await,
        Some(Commands::Info) => {
            show_info(&config_manager, &session);
            Ok(())
        }
        Some(Commands::Chat) | None => run_chat(config, controller, session.id).await,
    }
}

fn init_logging(verbose: bool) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = ConfigManager::default_data_dir().join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let appender = tracing_appender::rolling::daily(log_dir, "sandchat.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(if verbose {
            "info,sandchat_core=debug"
        } else {
            "warn"
        })
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}

fn draft_path() -> PathBuf {
    ConfigManager::default_data_dir().join(DRAFT_FILE)
}

fn load_draft() -> String {
    std::fs::read_to_string(draft_path()).unwrap_or_default()
}

fn save_draft(draft: &str) {
    let path = draft_path();
    if draft.is_empty() {
        let _ = std::fs::remove_file(path);
        return;
    }
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, draft);
}

fn show_info(config_manager: &ConfigManager, session: &Session) {
    println!("{} {}", style("Session:").bold(), session.id);
    println!(
        "{} {}",
        style("Backend:").bold(),
        config_manager.config().api_base_url
    );
    println!(
        "{} {}",
        style("Config:").bold(),
        config_manager.config_path().display()
    );
    println!(
        "{} {}",
        style("State dir:").bold(),
        ConfigManager::default_data_dir().display()
    );
}

/// Run a single prompt non-interactively (for scripting)
async fn run_one_shot(
    config: Arc<Config>,
    controller: Arc<SessionController>,
    session_id: String,
    prompt: &str,
) -> anyhow::Result<()> {
    let (events_tx, mut events_rx) = mpsc::channel(256);
    let chat = ChatClient::new(config, session_id.clone(), events_tx)?;

    // Sandbox initialization is fire-and-forget; chat does not wait for it
    let init_controller = controller.clone();
    tokio::spawn(async move {
        init_controller.initialize_sandbox(&session_id).await;
    });

    chat.submit(prompt);

    while let Some(event) = events_rx.recv().await {
        match event {
            ChatEvent::Updated => {}
            ChatEvent::TurnEnded | ChatEvent::Cancelled => break,
            ChatEvent::RateLimited => {
                eprintln!(
                    "{}",
                    style("You are sending too many messages. Please try again later.").yellow()
                );
                break;
            }
            ChatEvent::Error(message) => {
                eprintln!("{}", style(format!("Error: {}", message)).red());
                break;
            }
        }
    }

    let transcript = chat.transcript();
    let transcript = transcript.lock();
    for message in transcript.messages() {
        match message.role {
            Role::User => {
                println!("{} {}", style("You:").bold().cyan(), message.text);
            }
            Role::Assistant => {
                if !message.text.is_empty() {
                    println!("{} {}", style("Assistant:").bold().green(), message.text);
                }
                for invocation in &message.tool_invocations {
                    print_invocation_plain(invocation);
                }
            }
        }
    }

    Ok(())
}

/// Plain (non-TUI) rendering of a finished tool invocation
fn print_invocation_plain(invocation: &sandchat_core::chat::ToolInvocation) {
    match tools::display(invocation) {
        ToolDisplay::Placeholder(kind) => {
            println!("  {} {}", style("▶").blue(), style(kind.activity_label()).dim());
        }
        display => {
            match tools::outcome(invocation) {
                InvocationOutcome::Completed => {
                    println!("  {} {}", style("✓").green(), style("Execution completed").dim());
                }
                InvocationOutcome::Error => {
                    println!("  {} {}", style("✗").red(), style("Execution failed").dim());
                }
            }
            match display {
                ToolDisplay::CodeCell { code, outputs } => {
                    for line in code.lines() {
                        println!("    {}", style(line).dim());
                    }
                    for output in &outputs {
                        print_output_plain(output);
                    }
                }
                ToolDisplay::Weather(payload) | ToolDisplay::Generic(payload) => {
                    println!(
                        "    {}",
                        serde_json::to_string_pretty(&payload).unwrap_or_default()
                    );
                }
                ToolDisplay::Placeholder(_) => {}
            }
        }
    }
}

fn print_output_plain(output: &ExecutionOutput) {
    match output {
        ExecutionOutput::Stream { text, .. } => {
            for line in text.lines() {
                println!("    {}", line);
            }
        }
        ExecutionOutput::ExecuteResult { data } | ExecutionOutput::DisplayData { data } => {
            match data.preferred() {
                Representation::Png(b64) => {
                    println!("    [image/png, {} bytes base64]", b64.len());
                }
                Representation::Jpeg(b64) => {
                    println!("    [image/jpeg, {} bytes base64]", b64.len());
                }
                Representation::Html(text)
                | Representation::Plain(text)
                | Representation::Raw(text) => {
                    for line in text.lines() {
                        println!("    {}", line);
                    }
                }
            }
        }
        ExecutionOutput::Error { name, message, .. } => {
            println!("    {}", style(format!("{}: {}", name, message)).red());
            if let Some(traceback) = output.traceback_text() {
                for line in traceback.lines() {
                    println!("    {}", style(line).red().dim());
                }
            }
        }
        ExecutionOutput::Unknown(raw) => {
            println!("    {}", serde_json::to_string_pretty(raw).unwrap_or_default());
        }
    }
}

/// Upload a file in plain mode with a progress bar
async fn run_upload(config: Arc<Config>, session_id: &str, file: &Path) -> anyhow::Result<()> {
    let path = dunce::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
    let (manager, mut status_rx) = UploadManager::new(config)?;

    let bar = indicatif::ProgressBar::new(100);
    bar.set_style(indicatif::ProgressStyle::with_template(
        "{bar:40.cyan/blue} {pos:>3}% {msg}",
    )?);
    bar.set_message(path.display().to_string());

    let bar_updates = bar.clone();
    let watcher = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = status_rx.borrow_and_update().clone();
            bar_updates.set_position((status.progress * 100.0).round() as u64);
            if status.state != UploadState::InFlight {
                break;
            }
        }
    });

    let result = manager.upload(&path, session_id).await;
    watcher.abort();

    match result {
        Ok(receipt) => {
            bar.finish_with_message("done");
            println!(
                "{}",
                style(format!(
                    "File \"{}\" uploaded successfully!",
                    receipt.filename
                ))
                .green()
            );
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            Err(e.into())
        }
    }
}

/// Interactive chat: wire the clients together and run the TUI
async fn run_chat(
    config: Arc<Config>,
    controller: Arc<SessionController>,
    session_id: String,
) -> anyhow::Result<()> {
    let (chat_tx, chat_rx) = mpsc::channel(256);
    let chat = ChatClient::new(config.clone(), session_id.clone(), chat_tx)?;
    let (upload_manager, upload_rx) = UploadManager::new(config)?;
    let upload_manager = Arc::new(upload_manager);

    // Fire-and-forget: the chat channel is never blocked on the sandbox
    let init_controller = controller.clone();
    let init_id = session_id.clone();
    tokio::spawn(async move {
        init_controller.initialize_sandbox(&init_id).await;
    });

    let mut events = EventHandler::new(chat_rx, upload_rx);
    let mut app = App::new(chat.transcript(), &session_id, load_draft());

    run_chat_tui(&mut app, &mut events, &chat, &upload_manager, &controller, &session_id).await
}

/// Terminal setup/teardown around the event loop
async fn run_chat_tui(
    app: &mut App,
    events: &mut EventHandler,
    chat: &ChatClient,
    upload_manager: &Arc<UploadManager>,
    controller: &Arc<SessionController>,
    session_id: &str,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(
        &mut terminal,
        app,
        events,
        chat,
        upload_manager,
        controller,
        session_id,
    )
    .await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    save_draft(app.input.value());

    result
}

/// Main event loop for the TUI
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut App,
    events: &mut EventHandler,
    chat: &ChatClient,
    upload_manager: &Arc<UploadManager>,
    controller: &Arc<SessionController>,
    session_id: &str,
) -> anyhow::Result<()> {
    loop {
        terminal.draw(|frame| tui::draw(frame, app))?;

        let Some(event) = events.next().await else {
            break;
        };

        match event {
            Event::Terminal(crossterm::event::Event::Key(key)) => {
                if key.kind != crossterm::event::KeyEventKind::Press {
                    continue;
                }
                let action = match app.state {
                    AppState::Normal => handle_key_normal(key, &mut app.input),
                    AppState::Streaming => handle_key_streaming(key, &mut app.input),
                };

                match action {
                    KeyAction::Quit => {
                        app.should_quit = true;
                        break;
                    }
                    KeyAction::Submit(input) => {
                        handle_user_input(app, chat, upload_manager, events, session_id, &input);
                    }
                    KeyAction::Cancel => {
                        if app.state == AppState::Streaming {
                            chat.cancel();
                            app.status = "Cancelling...".to_string();
                        } else if app.upload.state == UploadState::InFlight {
                            upload_manager.cancel();
                        } else {
                            app.dismiss_notices();
                        }
                    }
                    KeyAction::ScrollUp => app.scroll_up(),
                    KeyAction::ScrollDown => app.scroll_down(),
                    KeyAction::HistoryPrev => app.history_prev(),
                    KeyAction::HistoryNext => app.history_next(),
                    KeyAction::None => {}
                }
            }
            Event::Terminal(_) => {}
            Event::Chat(chat_event) => app.handle_chat_event(chat_event),
            Event::Upload(status) => {
                let cancelled = status.state == UploadState::Cancelled;
                app.handle_upload_status(status);
                if cancelled {
                    // The slot stays blocked until dismissed; free it once
                    // the banner window has passed.
                    let manager = upload_manager.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(7)).await;
                        manager.dismiss();
                    });
                }
            }
            Event::Notice(text) => app.warn(text),
            Event::Tick => {
                app.tick();
                app.sandbox = controller.sandbox_state();
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Dispatch a submitted line: slash command or chat turn
fn handle_user_input(
    app: &mut App,
    chat: &ChatClient,
    upload_manager: &Arc<UploadManager>,
    events: &EventHandler,
    session_id: &str,
    input: &str,
) {
    let text = input.trim();
    if text.is_empty() {
        return;
    }

    if text == "/quit" || text == "/exit" {
        app.should_quit = true;
        return;
    }

    if let Some(raw_path) = text.strip_prefix("/upload ") {
        let path = dunce::canonicalize(raw_path.trim())
            .unwrap_or_else(|_| PathBuf::from(raw_path.trim()));
        app.push_history(text.to_string());

        let manager = upload_manager.clone();
        let session_id = session_id.to_string();
        let notices = events.sender();
        tokio::spawn(async move {
            if let Err(e) = manager.upload(&path, &session_id).await {
                // Validation failures never reach the status channel, so
                // they surface here; transfer failures already did.
                if matches!(e, sandchat_core::Error::UploadValidation(_)) {
                    let _ = notices.send(Event::Notice(e.to_string()));
                }
            }
        });
        return;
    }

    // The submit gate: input is ignored while a turn is streaming
    if chat.is_busy() {
        return;
    }

    app.push_history(text.to_string());
    save_draft("");
    app.state = AppState::Streaming;
    app.status = "Thinking...".to_string();
    app.scroll_to_bottom();
    chat.submit(text);
}
