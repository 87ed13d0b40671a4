use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::auth::Identity;
use crate::chat::render::prompt_preview;
use crate::chat::{ChatSession, EntryRole, StatusKind, TranscriptEntry, TranscriptEvent};
use crate::core::db::ready_db;
use crate::core::{AppConfig, init_tracing};
use crate::history::SqliteSessionStore;
use crate::openai::OpenAiClient;

const HELP: &str = r#"Commands:
  /key <secret>        use an OpenAI API key for this session
  /clearkey            forget the API key
  /verify              check the API key against OpenAI
  /login <id> [name]   sign in
  /logout              sign out
  /history             list saved prompts
  /replay <n>          show saved prompt number n again
  /quit                exit
Anything else is sent as a prompt."#;

#[derive(Debug, PartialEq)]
enum Input<'a> {
    Prompt(&'a str),
    SetKey(&'a str),
    ClearKey,
    Verify,
    Login(&'a str, Option<&'a str>),
    Logout,
    History,
    Replay(usize),
    Help,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    let Some(command) = trimmed.strip_prefix('/') else {
        return Input::Prompt(line);
    };
    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "key" => Input::SetKey(rest),
        "clearkey" => Input::ClearKey,
        "verify" => Input::Verify,
        "login" if !rest.is_empty() => {
            let (id, display_name) = rest
                .split_once(char::is_whitespace)
                .map(|(id, name)| (id, Some(name.trim())))
                .unwrap_or((rest, None));
            Input::Login(id, display_name)
        }
        "logout" => Input::Logout,
        "history" => Input::History,
        "replay" => rest
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Input::Replay)
            .unwrap_or(Input::Unknown(trimmed)),
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        _ => Input::Unknown(trimmed),
    }
}

fn render_entry(entry: &TranscriptEntry) -> Option<String> {
    match (entry.role, entry.status) {
        // Already on screen as typed
        (EntryRole::User, _) => None,
        (EntryRole::Assistant, _) => Some(entry.text.clone()),
        (EntryRole::Status, Some(StatusKind::Pending)) => Some(format!("... {}", entry.text)),
        (EntryRole::Status, Some(StatusKind::Success)) => Some(format!("[ok] {}", entry.text)),
        (EntryRole::Status, _) => Some(format!("[!] {}", entry.text)),
    }
}

/// Terminal rendering for one transcript event, if it has one.
fn render_event(event: &TranscriptEvent) -> Option<String> {
    match event {
        TranscriptEvent::Appended(entry) | TranscriptEvent::Updated(entry) => render_entry(entry),
        TranscriptEvent::Cleared => Some("--- conversation cleared ---".to_string()),
        TranscriptEvent::SavedLoaded(records) => Some(format!("{} saved prompt(s)", records.len())),
        TranscriptEvent::SavedFailed(message) => Some(format!("[!] {}", message)),
        TranscriptEvent::Removed(_) | TranscriptEvent::InputCleared => None,
    }
}

fn key_line(masked: Option<String>) -> String {
    match masked {
        Some(masked) => format!("Using API key {}", masked),
        None => "No API key set".to_string(),
    }
}

fn print_key(session: &ChatSession) {
    println!("{}", key_line(session.keys().masked()));
}

fn sign_in(session: &ChatSession, identity: Identity) {
    println!("Signed in as {}", identity.label());
    session.auth().sign_in(identity);
}

fn print_saved(session: &ChatSession) {
    let saved = session.saved();
    if saved.is_empty() {
        println!("No saved prompts yet");
        return;
    }
    for (i, record) in saved.iter().enumerate() {
        println!("{:>3}. {}", i + 1, prompt_preview(&record.prompt));
    }
}

pub async fn run(config: AppConfig, user: Option<String>, name: Option<String>) -> Result<()> {
    init_tracing(&format!("{}=warn", env!("CARGO_CRATE_NAME")));

    let mut rl = DefaultEditor::new()?;
    let db = ready_db(&config.db_path).await?;
    let store = Arc::new(SqliteSessionStore::new(db));
    let completer = Arc::new(OpenAiClient::new(&config.openai_api_hostname));

    let (tx, mut rx) = mpsc::unbounded_channel::<TranscriptEvent>();
    let session = Arc::new(
        ChatSession::builder(completer, store)
            .options(config.completion_options())
            .history_limit(config.history_limit)
            .status_ttl(Duration::from_secs(config.status_ttl_secs))
            .events(tx)
            .build(),
    );

    if let Some(key) = &config.openai_api_key {
        match session.keys().set(key) {
            Ok(()) => print_key(&session),
            Err(err) => tracing::warn!("Ignoring OPENAI_API_KEY: {}", err),
        }
    }

    let _auth_listener = session.follow_auth();
    if let Some(id) = &user {
        sign_in(&session, Identity::new(id, name.as_deref(), None));
    }

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = render_event(&event) {
                println!("{}", line);
            }
        }
    });

    println!("{}", HELP);

    loop {
        // Submissions keep resolving on the other workers while this
        // one waits for input
        let readline = tokio::task::block_in_place(|| rl.readline(">>> "));
        match readline {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = rl.add_history_entry(line.as_str());
                }
                match parse_input(&line) {
                    Input::Prompt(prompt) => {
                        let session = Arc::clone(&session);
                        let prompt = prompt.to_string();
                        tokio::spawn(async move {
                            // Rejections and failures are already in the transcript
                            let _ = session.submit(&prompt).await;
                        });
                    }
                    Input::SetKey(key) => {
                        if session.set_api_key(key).is_ok() {
                            print_key(&session);
                        }
                    }
                    Input::ClearKey => session.clear_api_key(),
                    Input::Verify => {
                        if !session.keys().is_set() {
                            println!("No API key set, use /key <secret>");
                        } else if session.verify_api_key().await {
                            println!("API key is valid");
                        } else {
                            println!("API key was rejected");
                        }
                    }
                    Input::Login(id, display_name) => {
                        sign_in(&session, Identity::new(id, display_name, None));
                    }
                    Input::Logout => session.auth().sign_out(),
                    Input::History => print_saved(&session),
                    Input::Replay(n) => {
                        let record_id = session.saved().get(n - 1).map(|r| r.id.clone());
                        if !record_id.is_some_and(|id| session.replay(&id)) {
                            println!("No saved prompt {}", n);
                        }
                    }
                    Input::Help => println!("{}", HELP),
                    Input::Quit => break,
                    Input::Unknown(command) => println!("Unknown command {}", command),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
