use std::collections::VecDeque;
use std::future::{self, Future};

use tokio::sync::mpsc;

use crate::api::ChatApi;
use crate::common::{ChatCommand, ChatEvent, ChatMessage};
use crate::error::Result;
use crate::storage::CredentialStore;

use super::reconnect::{ReconnectPolicy, Reconnector, Schedule};
use super::sender::publish_outbound;
use super::transport::{Connector, Link};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Chat session manager: owns the broker link, the reconnect timer and the
/// REST collaborators, and talks to the view through channels.
pub struct ChatClient<C: Connector, A: ChatApi> {
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    connector: C,
    api: A,
    store: CredentialStore,
    send_destination: String,
    reconnector: Reconnector,
    link: Option<C::Link>,
    state: ConnectionState,
    /// Commands that arrived while a connect or REST call was in flight.
    deferred: VecDeque<ChatCommand>,
    stopping: bool,
}

impl<C: Connector, A: ChatApi> ChatClient<C, A> {
    pub fn new(
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
        connector: C,
        api: A,
        store: CredentialStore,
        send_destination: &str,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            event_sender,
            command_receiver,
            connector,
            api,
            store,
            send_destination: send_destination.to_string(),
            reconnector: Reconnector::new(policy),
            link: None,
            state: ConnectionState::Disconnected,
            deferred: VecDeque::new(),
            stopping: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub async fn run(mut self) -> Result<()> {
        log::info!("Chat session manager started");

        if self.access_token().is_some() {
            self.bootstrap().await;
            self.connect().await;
        } else {
            log::warn!("No access token in local storage; sign in with `login` first");
            self.emit(ChatEvent::BootstrapFailed("not signed in".into()))
                .await;
        }

        while !self.stopping {
            if let Some(command) = self.deferred.pop_front() {
                self.handle_command(command).await;
                continue;
            }
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(ChatCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
                inbound = next_inbound(&mut self.link) => {
                    self.handle_inbound(inbound).await;
                }
                _ = self.reconnector.fired() => {
                    self.connect().await;
                }
            }
        }

        self.teardown().await;
        log::info!("Chat session manager stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::Bootstrap => {
                self.bootstrap().await;
                if self.link.is_none() && !self.reconnector.is_pending() {
                    self.connect().await;
                }
            }
            ChatCommand::SendMessage { room_id, content } => {
                self.send_message(&room_id, &content).await;
            }
            ChatCommand::OpenRoom { room_id } => {
                self.load_room(&room_id).await;
                self.mark_read(&room_id).await;
            }
            ChatCommand::MarkRead { room_id } => self.mark_read(&room_id).await,
            ChatCommand::Logout => {
                self.teardown().await;
                if let Err(err) = self.store.clear() {
                    log::warn!("Failed to clear local storage: {err}");
                }
                self.emit(ChatEvent::LoggedOut).await;
            }
            ChatCommand::Shutdown => {
                self.stopping = true;
                self.teardown().await;
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: Result<ChatMessage>) {
        match inbound {
            Ok(message) => {
                log::debug!("Message {} for room {}", message.id, message.room_id);
                self.emit(ChatEvent::MessageReceived(message)).await;
            }
            Err(err) => {
                log::warn!("Chat transport failed: {err}");
                self.on_transport_failure(err.to_string()).await;
            }
        }
    }

    async fn bootstrap(&mut self) {
        let Some(token) = self.access_token() else {
            self.emit(ChatEvent::BootstrapFailed("not signed in".into()))
                .await;
            return;
        };
        let Some(result) = unless_stopped(
            self.api.bootstrap(&token),
            &mut self.command_receiver,
            &mut self.deferred,
        )
        .await
        else {
            log::info!("Bootstrap abandoned: session is shutting down");
            self.stopping = true;
            return;
        };
        match result {
            Ok(session) => {
                log::info!(
                    "Chat session loaded as {:?} ({} rooms, {} messages)",
                    session.role,
                    session.rooms.len(),
                    session.messages.len()
                );
                if let Ok(Some(profile)) = self.store.profile() {
                    if profile.role.is_some_and(|role| role != session.role) {
                        log::warn!(
                            "Stored profile for {} says {:?}, backend says {:?}",
                            profile.email,
                            profile.role,
                            session.role
                        );
                    }
                }
                self.emit(ChatEvent::SessionLoaded(session)).await;
            }
            Err(err) => {
                log::warn!("Chat bootstrap failed: {err}");
                self.emit(ChatEvent::BootstrapFailed(err.to_string())).await;
            }
        }
    }

    async fn connect(&mut self) {
        if self.stopping || self.link.as_ref().is_some_and(|link| link.is_connected()) {
            return;
        }
        let Some(token) = self.access_token() else {
            log::warn!("Not connecting: no access token in local storage");
            self.state = ConnectionState::Disconnected;
            self.emit(ChatEvent::Disconnected {
                reason: "not signed in".into(),
            })
            .await;
            return;
        };

        self.state = ConnectionState::Connecting;
        let attempt = self.reconnector.attempts() + 1;
        self.emit(ChatEvent::Connecting { attempt }).await;

        let Some(result) = unless_stopped(
            self.connector.connect(&token),
            &mut self.command_receiver,
            &mut self.deferred,
        )
        .await
        else {
            log::info!("Connect abandoned: session is shutting down");
            self.stopping = true;
            return;
        };
        match result {
            Ok(link) => {
                self.link = Some(link);
                self.reconnector.reset();
                self.state = ConnectionState::Connected;
                log::info!("Chat transport connected");
                self.emit(ChatEvent::Connected).await;
            }
            Err(err) => {
                log::warn!("Chat transport connect failed: {err}");
                self.on_transport_failure(err.to_string()).await;
            }
        }
    }

    async fn on_transport_failure(&mut self, reason: String) {
        if let Some(mut link) = self.link.take() {
            if let Err(err) = link.close().await {
                log::debug!("Closing failed link: {err}");
            }
        }
        self.state = ConnectionState::Disconnected;
        self.emit(ChatEvent::Disconnected { reason }).await;
        self.schedule_reconnect().await;
    }

    async fn schedule_reconnect(&mut self) {
        match self.reconnector.schedule() {
            Schedule::Armed { delay, attempt } => {
                log::info!("Reconnecting in {delay:?} (attempt {attempt})");
                self.emit(ChatEvent::ReconnectScheduled { delay, attempt })
                    .await;
            }
            Schedule::AlreadyPending => log::debug!("Reconnect already pending"),
            Schedule::Exhausted { attempts } => {
                log::error!("Giving up on chat transport after {attempts} attempts");
                self.emit(ChatEvent::ReconnectExhausted { attempts }).await;
            }
        }
    }

    async fn send_message(&mut self, room_id: &str, content: &str) {
        let token = self.access_token();
        let result = publish_outbound(
            self.link.as_mut(),
            Some(room_id),
            content,
            token.as_deref(),
            &self.send_destination,
        )
        .await;
        match result {
            Ok(true) => log::debug!("Message published to room {room_id}"),
            Ok(false) => {}
            Err(err) => {
                log::warn!("Publish to room {room_id} failed: {err}");
                self.on_transport_failure(err.to_string()).await;
            }
        }
    }

    async fn load_room(&mut self, room_id: &str) {
        if self.stopping {
            return;
        }
        let Some(token) = self.access_token() else {
            return;
        };
        let Some(result) = unless_stopped(
            self.api.room_messages(&token, room_id),
            &mut self.command_receiver,
            &mut self.deferred,
        )
        .await
        else {
            self.stopping = true;
            return;
        };
        match result {
            Ok(messages) => {
                self.emit(ChatEvent::RoomHistoryLoaded {
                    room_id: room_id.to_string(),
                    messages,
                })
                .await;
            }
            Err(err) => {
                log::warn!("Loading room {room_id} failed: {err}");
                self.emit(ChatEvent::RequestFailed(format!(
                    "could not load conversation: {err}"
                )))
                .await;
            }
        }
    }

    async fn mark_read(&mut self, room_id: &str) {
        if self.stopping {
            return;
        }
        let Some(token) = self.access_token() else {
            return;
        };
        let Some(result) = unless_stopped(
            self.api.mark_read(&token, room_id),
            &mut self.command_receiver,
            &mut self.deferred,
        )
        .await
        else {
            self.stopping = true;
            return;
        };
        match result {
            Ok(()) => {
                self.emit(ChatEvent::RoomMarkedRead(room_id.to_string()))
                    .await;
            }
            Err(err) => log::warn!("Marking room {room_id} read failed: {err}"),
        }
    }

    /// Cancels any pending reconnect and closes the link if one was opened.
    async fn teardown(&mut self) {
        if self.reconnector.cancel() {
            log::debug!("Cancelled pending reconnect");
        }
        if let Some(mut link) = self.link.take() {
            if let Err(err) = link.close().await {
                log::warn!("Closing chat transport failed: {err}");
            }
        }
        if self.state != ConnectionState::Disconnected {
            self.state = ConnectionState::Disconnected;
            self.emit(ChatEvent::Disconnected {
                reason: "session closed".into(),
            })
            .await;
        }
    }

    // Read on every use; a token rotated mid-connection only applies to the
    // next connect or send.
    fn access_token(&self) -> Option<String> {
        match self.store.access_token() {
            Ok(token) => token,
            Err(err) => {
                log::warn!("Failed to read access token: {err}");
                None
            }
        }
    }

    async fn emit(&mut self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::debug!("View is gone, dropping event: {err}");
        }
    }
}

/// Awaits `work` unless the view asks to stop first, in which case `work` is
/// dropped and `None` returned. Other commands received meanwhile are queued.
async fn unless_stopped<F: Future>(
    work: F,
    commands: &mut mpsc::Receiver<ChatCommand>,
    deferred: &mut VecDeque<ChatCommand>,
) -> Option<F::Output> {
    tokio::select! {
        output = work => Some(output),
        () = stop_requested(commands, deferred) => None,
    }
}

async fn stop_requested(
    commands: &mut mpsc::Receiver<ChatCommand>,
    deferred: &mut VecDeque<ChatCommand>,
) {
    loop {
        match commands.recv().await {
            Some(ChatCommand::Shutdown) | None => return,
            Some(command) => deferred.push_back(command),
        }
    }
}

async fn next_inbound<L: Link>(link: &mut Option<L>) -> Result<ChatMessage> {
    match link.as_mut() {
        Some(link) if link.is_connected() => link.next_message().await,
        _ => future::pending().await,
    }
}
