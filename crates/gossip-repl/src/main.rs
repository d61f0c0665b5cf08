mod config;

use anyhow::{Context, Result, bail};
use chrono::SecondsFormat;
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{debug, info, warn};

use gossip_client::{ApiClient, ChatConfig, ChatError, ChatRoom, ConnectionState};
use gossip_types::api::SignInInput;
use gossip_types::events::ChatMessage;

use crate::config::Config;

/// Terminal client for gossip chat rooms
#[derive(Parser)]
#[command(name = "gossip-repl")]
#[command(about = "Watch or post to a gossip chat room from the terminal")]
struct Cli {
    /// Print the room's messages, or post lines typed on stdin
    #[arg(short, long, value_enum, default_value_t = Mode::Display)]
    mode: Mode,

    /// Room to join
    #[arg(short, long)]
    room: String,

    /// Log at debug level
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Display,
    Input,
}

const QUIT: &str = "q";

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let fallback = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .init();

    let config = Config::load()?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let username = prompt(&mut stdin, "username: ").await?;
    let password = prompt(&mut stdin, "password: ").await?;

    let api = ApiClient::new(config.api_url.as_str())?;
    let grant = api
        .create_session(&SignInInput {
            username: username.clone(),
            password,
        })
        .await
        .context("sign-in failed")?;
    let me = api
        .with_session(grant.session_id)
        .get_me()
        .await
        .context("could not resolve signed-in user")?;
    info!(user_id = %me.id, username = %me.username, "signed in");

    let chat = ChatConfig::new(config.ws_url.as_str());
    let room = ChatRoom::join(chat, cli.room.as_str(), me.username.as_str()).await?;

    match cli.mode {
        Mode::Display => display(room).await,
        Mode::Input => input(room, &mut stdin).await,
    }
}

async fn prompt(stdin: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;

    let Some(line) = stdin.next_line().await? else {
        bail!("stdin closed before {}", label.trim_end_matches([':', ' ']));
    };
    Ok(line.trim().to_string())
}

async fn display(mut room: ChatRoom) -> Result<()> {
    loop {
        tokio::select! {
            message = room.recv() => match message {
                Some(message) => println!("{}", format_line(&message)),
                None => {
                    info!("connection closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    room.close().await;
    Ok(())
}

async fn input(mut room: ChatRoom, stdin: &mut Lines<BufReader<Stdin>>) -> Result<()> {
    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line == QUIT {
                    break;
                }
                if let Err(e) = post_line(&room, line) {
                    room.close().await;
                    return Err(e.into());
                }
            }
            // Echoes of our own posts; input mode only drains them.
            message = room.recv() => match message {
                Some(message) => debug!(body = %message.body, "received"),
                None => {
                    info!("connection closed");
                    break;
                }
            },
        }
    }

    room.close().await;
    Ok(())
}

/// Send one typed line. Lines typed while the socket is reconnecting are
/// dropped; the room is only given up once its connection task has closed.
fn post_line(room: &ChatRoom, line: &str) -> Result<(), ChatError> {
    tolerate_send(room.send(line).map(|_| ()), room.state())
}

fn tolerate_send(result: Result<(), ChatError>, state: ConnectionState) -> Result<(), ChatError> {
    match result {
        Ok(()) | Err(ChatError::EmptyBody) => Ok(()),
        Err(ChatError::NotConnected) if state != ConnectionState::Closed => {
            warn!(?state, "not connected, message dropped");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn format_line(message: &ChatMessage) -> String {
    format!(
        "{} [{}] ({}): {}",
        message.user_id.as_deref().unwrap_or_else(|| message.author()),
        message.room_id,
        message.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        message.body
    )
}
