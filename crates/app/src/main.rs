use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use fincoach::config::{CONFIG_FILE_NAME, SESSION_FILE_NAME};
use fincoach::{AppConfig, ChatService, Command, ServiceOptions, UiEvent};
use fincoach_chat::Speaker;
use fincoach_remote::HttpBackend;
use fincoach_session::FileSessionStore;

/// Application entry point.
///
/// Boots the coordinator headless and drives it from stdin: plain lines are
/// chat messages, `/`-prefixed lines are sidebar and session commands. This
/// driver is the thinnest possible render surface; a real one subscribes to
/// the same [`UiEvent`] channel.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let data_dir = AppConfig::default_data_dir();
    let config = AppConfig::load_or_default(&data_dir.join(CONFIG_FILE_NAME));

    let backend = match HttpBackend::new(config.to_backend_config()) {
        Ok(backend) => Arc::new(backend),
        Err(error) => {
            tracing::error!(%error, "failed to initialize the backend client");
            return;
        }
    };

    let session_store = Arc::new(FileSessionStore::new(data_dir.join(SESSION_FILE_NAME)));

    let options = ServiceOptions {
        reveal_cadence: config.reveal_cadence(),
        greeting: config.greeting.clone(),
    };
    let (service, events) = ChatService::new(backend, session_store, options);

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let service_task = tokio::spawn(service.run(command_rx));
    let render_task = tokio::spawn(render_events(events));

    read_commands(command_tx).await;

    let _ = service_task.await;
    render_task.abort();
}

/// Reads stdin until EOF or `/quit`, forwarding parsed commands.
async fn read_commands(command_tx: mpsc::UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(command) = parse_command(&line) else {
            continue;
        };

        let is_shutdown = command == Command::Shutdown;
        if command_tx.send(command).is_err() || is_shutdown {
            break;
        }
    }
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Submit(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    match parts.next()? {
        "new" => Some(Command::NewConversation),
        "switch" => parts.next()?.parse().ok().map(Command::Switch),
        "delete" => parts.next()?.parse().ok().map(Command::Delete),
        "rename" => {
            let index = parts.next()?.parse().ok()?;
            let title = parts.collect::<Vec<_>>().join(" ");
            Some(Command::Rename { index, title })
        }
        "login" => Some(Command::Login {
            uid: parts.next()?.to_string(),
            pass: parts.next()?.to_string(),
        }),
        "signup" => Some(Command::Signup {
            uid: parts.next()?.to_string(),
            pass: parts.next()?.to_string(),
        }),
        "logout" => Some(Command::Logout),
        "quit" => Some(Command::Shutdown),
        other => {
            eprintln!("unknown command: /{other}");
            None
        }
    }
}

/// Prints state snapshots as they arrive; assistant turns redraw in place
/// while a reveal stream is running.
async fn render_events(mut events: mpsc::UnboundedReceiver<UiEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            UiEvent::ConversationListChanged { titles, active } => {
                let list = titles
                    .iter()
                    .enumerate()
                    .map(|(index, title)| {
                        if active == Some(index) {
                            format!("[{index}] {title} *")
                        } else {
                            format!("[{index}] {title}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("  ");
                println!("conversations: {list}");
            }
            UiEvent::ActiveTurnsChanged { turns } => {
                let Some(turn) = turns.last() else {
                    continue;
                };
                if turn.speaker == Speaker::User {
                    continue;
                }

                if turn.video_revealed {
                    println!("\rcoach: {}", turn.text);
                    if let Some(video_link) = &turn.video_link {
                        println!("video: {video_link}");
                    }
                } else {
                    print!("\rcoach: {}", turn.text);
                    let _ = std::io::stdout().flush();
                }
            }
            UiEvent::TypingChanged { typing, .. } => {
                if typing {
                    println!("coach is typing...");
                }
            }
            UiEvent::SessionChanged { user_id } => match user_id {
                Some(user_id) => println!("signed in as {user_id}"),
                None => println!("signed out"),
            },
            UiEvent::Notice { message } => println!("notice: {message}"),
        }
    }
}
