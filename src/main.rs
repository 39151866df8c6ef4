mod api;
mod common;
mod config;
mod error;
mod network;
mod storage;
mod ui;

use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};

use common::{ChatCommand, ChatEvent, UserProfile};
use config::AppConfig;
use error::{ChatError, Result};
use network::SessionHandle;
use storage::CredentialStore;
use ui::ChatApp;
use ui::state::ChatState;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(
    name = "shop_support_chat",
    version,
    about = "Customer support chat client for the storefront"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Subcommand)]
enum Mode {
    /// Store credentials obtained from the storefront sign-in
    Login {
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: Option<String>,
        /// Cached user profile as JSON
        #[arg(long, value_name = "JSON")]
        profile: Option<String>,
    },
    /// Forget stored credentials
    Logout,
    /// Run the chat session without UI; stdin lines are sent as messages
    Headless,
    /// Write the effective configuration to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        log::debug!("TLS crypto provider already installed");
    }

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config);

    let result = match cli.mode {
        Some(Mode::Login {
            access_token,
            refresh_token,
            profile,
        }) => login(&app_config, &access_token, refresh_token.as_deref(), profile.as_deref()),
        Some(Mode::Logout) => logout(&app_config),
        Some(Mode::Headless) => run_headless(&app_config).await,
        Some(Mode::InitConfig) => config::save_config(&cli.config, &app_config)
            .map(|()| log::info!("Wrote configuration to {}", cli.config))
            .map_err(ChatError::from),
        None => run_gui(&app_config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn login(
    config: &AppConfig,
    access_token: &str,
    refresh_token: Option<&str>,
    profile: Option<&str>,
) -> Result<()> {
    if access_token.trim().is_empty() {
        return Err(ChatError::Config("access token must not be blank".into()));
    }
    let profile = profile
        .map(serde_json::from_str::<UserProfile>)
        .transpose()?;

    let store = CredentialStore::open(&config.storage_path)?;
    store.save_tokens(access_token.trim(), refresh_token)?;
    if let Some(profile) = profile {
        store.save_profile(&profile)?;
    }
    log::info!("Credentials stored in {}", config.storage_path);
    Ok(())
}

fn logout(config: &AppConfig) -> Result<()> {
    CredentialStore::open(&config.storage_path)?.clear()?;
    log::info!("Local credentials cleared");
    Ok(())
}

async fn run_gui(config: &AppConfig) -> Result<()> {
    let SessionHandle {
        commands,
        events,
        task,
    } = network::start_session(config)?;

    let options = eframe::NativeOptions::default();
    let mut events = Some(events);
    let ui_commands = commands.clone();

    let outcome = eframe::run_native(
        "Shop Support Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = events
                .take()
                .ok_or("ChatApp should only be initialized once")?;
            Ok(Box::new(ChatApp::new(cc, ui_commands.clone(), event_receiver)))
        }),
    );

    shutdown(commands, task).await;
    outcome.map_err(|err| ChatError::Ui(err.to_string()))
}

async fn run_headless(config: &AppConfig) -> Result<()> {
    if CredentialStore::open(&config.storage_path)?
        .access_token()?
        .is_none()
    {
        return Err(ChatError::NotSignedIn);
    }

    let SessionHandle {
        commands,
        mut events,
        task,
    } = network::start_session(config)?;
    let mut state = ChatState::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                log_event(&event);
                state.apply_event(event);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if let Some(command) = headless_command(&mut state, &line) {
                    if commands.send(command).await.is_err() {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
        }
    }

    drop(events);
    shutdown(commands, task).await;
    Ok(())
}

/// `/open ROOM` opens a staff room or the customer widget, `/logout`
/// signs out; anything else is sent to the current room.
fn headless_command(state: &mut ChatState, line: &str) -> Option<ChatCommand> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    match words.next() {
        Some("/open") => {
            return match words.next() {
                Some(room_id) => state.open_room(room_id),
                None => state.open_widget(),
            };
        }
        Some("/logout") => return Some(ChatCommand::Logout),
        _ => {}
    }

    state.input_text = line.to_string();
    let command = state.compose_outbound();
    if command.is_none() && !line.is_empty() {
        log::warn!("Not sent ({}): {line}", state.connection);
    }
    command
}

fn log_event(event: &ChatEvent) {
    match event {
        ChatEvent::MessageReceived(message) => log::info!(
            "[{}] {}: {}",
            message.room_id,
            message.sender_display_name,
            message.content
        ),
        ChatEvent::SessionLoaded(session) => log::info!(
            "Session loaded as {:?} ({} messages, {} rooms)",
            session.role,
            session.messages.len(),
            session.rooms.len()
        ),
        other => log::debug!("{other:?}"),
    }
}

async fn shutdown(commands: tokio::sync::mpsc::Sender<ChatCommand>, task: tokio::task::JoinHandle<Result<()>>) {
    // The receiver is gone if the task already stopped.
    let _ = commands.send(ChatCommand::Shutdown).await;
    match tokio::time::timeout(SHUTDOWN_GRACE, task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => log::error!("Chat session ended with error: {err}"),
        Ok(Err(err)) => log::error!("Chat session task panicked: {err}"),
        Err(_) => log::warn!("Chat session did not stop within {SHUTDOWN_GRACE:?}"),
    }
}
