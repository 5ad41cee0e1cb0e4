//! Parlor application binary - composition root.
//!
//! 1. Load configuration from TOML (flags override file values)
//! 2. Build the chat orchestrator and its clock driver
//! 3. Print chat events as they are published
//! 4. Read commands and messages from stdin until /quit or Ctrl-C

mod cli;
mod commands;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use parlor_chat::{ChatOrchestrator, ClockDriver, IncomingFile};
use parlor_core::config::ParlorConfig;
use parlor_core::events::ChatEvent;
use parlor_core::types::{ConnectionStatus, FileOrigin, Sender};

use cli::CliArgs;
use commands::{guess_mime, parse_command, Command, HELP};

fn short(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Print events for the human at the prompt, or as JSON lines with --events.
async fn event_printer(orchestrator: Arc<ChatOrchestrator>, json: bool) {
    let mut rx = orchestrator.subscribe();
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer lagged");
                continue;
            }
            Err(RecvError::Closed) => return,
        };

        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
            }
            continue;
        }

        match event {
            ChatEvent::MessageAppended {
                message_id,
                sender: Sender::Ai,
                ..
            } => {
                let content = orchestrator
                    .messages()
                    .ok()
                    .and_then(|msgs| msgs.into_iter().find(|m| m.id == message_id))
                    .map(|m| m.content);
                if let Some(content) = content {
                    println!("assistant> {}", content);
                }
            }
            ChatEvent::MessageStatusChanged { message_id, to, .. } => {
                println!("  [{}] {}", short(message_id), to);
            }
            ChatEvent::AiTypingChanged { typing: true, .. } => {
                println!("  (assistant is typing...)");
            }
            ChatEvent::UploadProgressed {
                attachment_id,
                percent,
                ..
            } if percent % 50 == 0 => {
                println!("  upload {} {}%", short(attachment_id), percent);
            }
            ChatEvent::UploadFailed { reason, .. } => println!("  upload failed: {}", reason),
            ChatEvent::ContextItemAdded { url, item_type, .. } => {
                println!("  + context {} {}", item_type, url);
            }
            ChatEvent::SessionCreated { name, .. } => println!("== {} ==", name),
            ChatEvent::ConnectionStatusChanged { to, .. } => println!("  connection: {}", to),
            ChatEvent::Notice { level, text } => println!("! [{:?}] {}", level, text),
            _ => {}
        }
    }
}

/// Resolve a session by 1-based list position or id prefix.
///
/// Anything unresolvable maps to the nil id, which the orchestrator reports
/// as an unknown session.
fn resolve_session(orchestrator: &ChatOrchestrator, target: &str) -> Uuid {
    let sessions = orchestrator.available_sessions().unwrap_or_default();
    if let Ok(n) = target.parse::<usize>() {
        if let Some(session) = n.checked_sub(1).and_then(|i| sessions.get(i)) {
            return session.id;
        }
    }
    sessions
        .iter()
        .find(|s| s.id.to_string().starts_with(target))
        .map(|s| s.id)
        .unwrap_or_else(|| Uuid::parse_str(target).unwrap_or(Uuid::nil()))
}

async fn stage_file(path: &Path, origin: FileOrigin, staged: &mut Vec<IncomingFile>) {
    match tokio::fs::read(path).await {
        Ok(data) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            println!("  staged {} ({} bytes)", name, data.len());
            staged.push(IncomingFile::new(name, guess_mime(path), data).with_origin(origin));
        }
        Err(e) => println!("  cannot read {}: {}", path.display(), e),
    }
}

/// Handle one input line. Returns false when the user asked to quit.
async fn handle_line(
    orchestrator: &ChatOrchestrator,
    line: &str,
    staged: &mut Vec<IncomingFile>,
) -> bool {
    let result = match parse_command(line) {
        Command::Empty => Ok(()),
        Command::Quit => return false,
        Command::Help => {
            println!("{}", HELP);
            Ok(())
        }
        Command::Send(text) => orchestrator
            .send_message(&text, std::mem::take(staged))
            .map(|_| ()),
        Command::New(extension) => orchestrator.create_new_chat(extension.as_deref()).map(|_| ()),
        Command::Switch(target) => orchestrator
            .switch_session(resolve_session(orchestrator, &target))
            .map(|s| println!("== {} ==", s.name)),
        Command::Close(target) => orchestrator
            .close_session(resolve_session(orchestrator, &target))
            .map(|s| println!("  closed {}", s.name)),
        Command::Sessions => orchestrator.available_sessions().and_then(|sessions| {
            let active = orchestrator.active_session()?.id;
            for (i, s) in sessions.iter().enumerate() {
                let marker = if s.id == active { "*" } else { " " };
                println!("{} {}. {} [{}] {}", marker, i + 1, s.name, short(s.id), s.model);
            }
            Ok(())
        }),
        Command::Attach(path) => {
            stage_file(&path, FileOrigin::Picker, staged).await;
            Ok(())
        }
        Command::Paste(path) => {
            stage_file(&path, FileOrigin::Clipboard, staged).await;
            Ok(())
        }
        Command::Context => orchestrator.context_items().map(|items| {
            if items.is_empty() {
                println!("  (no context items)");
            }
            for (i, item) in items.iter().enumerate() {
                println!("  {}. {} ({}) {}", i + 1, item.name, item.item_type, item.url);
            }
        }),
        Command::Forget(n) => orchestrator.context_items().and_then(|items| match items.get(n - 1) {
            Some(item) => orchestrator.remove_context_item(item.id).map(|_| ()),
            None => {
                println!("  no context item {}", n);
                Ok(())
            }
        }),
        Command::ForgetAll => orchestrator
            .clear_context()
            .map(|n| println!("  removed {} context item(s)", n)),
        Command::Offline => orchestrator.set_connection_status(ConnectionStatus::Disconnected),
        Command::Online => orchestrator.set_connection_status(ConnectionStatus::Connected),
        Command::Seen => orchestrator
            .mark_messages_seen()
            .map(|n| println!("  {} new message(s) acknowledged", n)),
        Command::Invalid(reason) => {
            println!("  {}", reason);
            Ok(())
        }
    };

    if let Err(e) = result {
        println!("  error: {}", e);
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first so its log level can seed the subscriber.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match ParlorConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (ParlorConfig::default(), Some(e)),
    };
    args.apply_overrides(&mut config);

    // Tracing.
    let level = config.general.log_level.clone();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Parlor v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    // Orchestrator.
    let orchestrator = Arc::new(ChatOrchestrator::new(config.chat.clone()));
    if let Some(ref ext) = args.extension {
        let initial = orchestrator.active_session()?.id;
        orchestrator.create_new_chat(Some(ext.as_str()))?;
        orchestrator.close_session(initial)?;
    }
    if args.offline {
        orchestrator.set_connection_status(ConnectionStatus::Disconnected)?;
    }

    // === Background tasks ===

    let driver = Arc::new(ClockDriver::new(
        Arc::clone(&orchestrator),
        Duration::from_millis(config.general.clock_resolution_ms),
    ));
    let driver_task = tokio::spawn({
        let driver = Arc::clone(&driver);
        async move { driver.run().await }
    });

    let printer_task = tokio::spawn(event_printer(Arc::clone(&orchestrator), args.events));

    // Show the opening greeting.
    let active = orchestrator.active_session()?;
    println!("== {} ==", active.name);
    if let Some(welcome) = orchestrator.messages()?.first() {
        println!("assistant> {}", welcome.content);
    }
    println!("Type /help for commands.");

    // === Prompt loop ===

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut staged: Vec<IncomingFile> = Vec::new();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        if !handle_line(&orchestrator, &line, &mut staged).await {
            break;
        }
    }

    tracing::info!("Shutting down");
    driver.shutdown();
    let _ = driver_task.await;
    printer_task.abort();
    Ok(())
}
