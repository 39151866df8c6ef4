pub mod client;
pub mod reconnect;
pub mod sender;
pub mod stomp;
pub mod transport;

#[cfg(test)]
pub mod testing;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use client::ChatClient;

use crate::api::RestChatApi;
use crate::common::{ChatCommand, ChatEvent};
use crate::config::AppConfig;
use crate::error::Result;
use crate::storage::CredentialStore;
use transport::WsConnector;

/// Channels and task handle of a running chat session.
pub struct SessionHandle {
    pub commands: mpsc::Sender<ChatCommand>,
    pub events: mpsc::Receiver<ChatEvent>,
    pub task: JoinHandle<Result<()>>,
}

/// Spawns the chat session manager against the configured backend.
pub fn start_session(config: &AppConfig) -> Result<SessionHandle> {
    let store = CredentialStore::open(&config.storage_path)?;
    let api = RestChatApi::new(&config.api_base_url)?;
    let connector = WsConnector::new(
        &config.ws_url,
        &config.subscribe_destination,
        Duration::from_millis(config.connect_timeout_ms),
    );

    // UI -> network
    let (cmd_tx, cmd_rx) = mpsc::channel(100);
    // network -> UI
    let (event_tx, event_rx) = mpsc::channel(100);

    let client = ChatClient::new(
        event_tx,
        cmd_rx,
        connector,
        api,
        store,
        &config.send_destination,
        config.reconnect.clone(),
    );
    let task = tokio::spawn(async move {
        let result = client.run().await;
        if let Err(err) = &result {
            log::error!("Chat session terminated: {err}");
        }
        result
    });

    Ok(SessionHandle {
        commands: cmd_tx,
        events: event_rx,
        task,
    })
}
