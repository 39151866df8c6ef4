//! In-memory fakes for the broker link and the REST backend.

use std::collections::{HashMap, VecDeque};
use std::future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::mpsc;

use crate::api::ChatApi;
use crate::common::{ChatMessage, Role, SessionDescriptor};
use crate::error::{ChatError, Result};

use super::stomp::Frame;
use super::transport::{Connector, Link};

pub fn message(id: i64, room_id: &str, sender_role: Role) -> ChatMessage {
    let created_at = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|date| date.and_hms_opt(9, 0, 0))
        .map(|at| at + chrono::Duration::seconds(id))
        .unwrap();
    ChatMessage {
        id,
        room_id: room_id.to_string(),
        sender_role,
        sender_display_name: match sender_role {
            Role::Customer => "Lan Nguyen".into(),
            Role::Employee => "Support".into(),
        },
        sender_email: match sender_role {
            Role::Customer => "lan@example.com".into(),
            Role::Employee => "support@example.com".into(),
        },
        content: format!("message {id}"),
        created_at,
        is_read: false,
    }
}

#[derive(Default)]
struct LinkState {
    connected: bool,
    published: Vec<Frame>,
    close_calls: u32,
}

pub struct FakeLink {
    state: Arc<Mutex<LinkState>>,
    inbound: mpsc::UnboundedReceiver<Result<ChatMessage>>,
}

/// Test-side handle to a [`FakeLink`] owned by the code under test.
#[derive(Clone)]
pub struct LinkProbe {
    state: Arc<Mutex<LinkState>>,
    inbound: mpsc::UnboundedSender<Result<ChatMessage>>,
}

impl FakeLink {
    pub fn pair(connected: bool) -> (FakeLink, LinkProbe) {
        let state = Arc::new(Mutex::new(LinkState {
            connected,
            ..LinkState::default()
        }));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            FakeLink {
                state: state.clone(),
                inbound: rx,
            },
            LinkProbe { state, inbound: tx },
        )
    }

    pub fn connected() -> FakeLink {
        Self::pair(true).0
    }

    pub fn disconnected() -> FakeLink {
        Self::pair(false).0
    }

    pub fn published(&self) -> Vec<Frame> {
        self.state.lock().unwrap().published.clone()
    }
}

#[async_trait]
impl Link for FakeLink {
    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn publish(&mut self, frame: Frame) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(ChatError::Transport("link is not connected".into()));
        }
        state.published.push(frame);
        Ok(())
    }

    async fn next_message(&mut self) -> Result<ChatMessage> {
        match self.inbound.recv().await {
            Some(Err(err)) => {
                self.state.lock().unwrap().connected = false;
                Err(err)
            }
            Some(Ok(message)) => Ok(message),
            None => future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.close_calls += 1;
        state.connected = false;
        Ok(())
    }
}

impl LinkProbe {
    pub fn deliver(&self, message: ChatMessage) {
        let _ = self.inbound.send(Ok(message));
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.inbound.send(Err(ChatError::Transport(reason.to_string())));
    }

    pub fn published(&self) -> Vec<Frame> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn close_calls(&self) -> u32 {
        self.state.lock().unwrap().close_calls
    }
}

#[derive(Default)]
struct ConnectorState {
    failures_left: u32,
    stall: bool,
    attempts: Vec<String>,
    links: Vec<LinkProbe>,
}

pub struct FakeConnector {
    state: Arc<Mutex<ConnectorState>>,
}

#[derive(Clone)]
pub struct ConnectorProbe {
    state: Arc<Mutex<ConnectorState>>,
}

impl FakeConnector {
    pub fn new() -> (FakeConnector, ConnectorProbe) {
        let state = Arc::new(Mutex::new(ConnectorState::default()));
        (
            FakeConnector {
                state: state.clone(),
            },
            ConnectorProbe { state },
        )
    }
}

#[async_trait]
impl Connector for FakeConnector {
    type Link = FakeLink;

    async fn connect(&mut self, token: &str) -> Result<FakeLink> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.attempts.push(token.to_string());
            if state.stall {
                None
            } else if state.failures_left > 0 {
                state.failures_left -= 1;
                Some(Err(ChatError::Transport("connection refused".into())))
            } else {
                let (link, probe) = FakeLink::pair(true);
                state.links.push(probe);
                Some(Ok(link))
            }
        };
        match outcome {
            Some(result) => result,
            None => future::pending().await,
        }
    }
}

impl ConnectorProbe {
    /// Every later connect attempt hangs until it is dropped.
    pub fn stall(&self) {
        self.state.lock().unwrap().stall = true;
    }

    pub fn fail_next(&self, count: u32) {
        self.state.lock().unwrap().failures_left = count;
    }

    /// Tokens presented on each connect attempt, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().attempts.clone()
    }

    pub fn links_opened(&self) -> usize {
        self.state.lock().unwrap().links.len()
    }

    pub fn link(&self, index: usize) -> LinkProbe {
        self.state.lock().unwrap().links[index].clone()
    }
}

#[derive(Default)]
struct ApiState {
    session: Option<SessionDescriptor>,
    histories: HashMap<String, Vec<ChatMessage>>,
    fail_mark_read: bool,
    stall_bootstrap: bool,
    calls: VecDeque<String>,
}

#[derive(Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<ApiState>>,
}

impl FakeApi {
    pub fn set_session(&self, session: SessionDescriptor) {
        self.state.lock().unwrap().session = Some(session);
    }

    pub fn set_history(&self, room_id: &str, messages: Vec<ChatMessage>) {
        self.state
            .lock()
            .unwrap()
            .histories
            .insert(room_id.to_string(), messages);
    }

    pub fn stall_bootstrap(&self) {
        self.state.lock().unwrap().stall_bootstrap = true;
    }

    pub fn fail_mark_read(&self) {
        self.state.lock().unwrap().fail_mark_read = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.iter().cloned().collect()
    }
}

#[async_trait]
impl ChatApi for FakeApi {
    async fn bootstrap(&self, _token: &str) -> Result<SessionDescriptor> {
        let outcome = {
            let mut state = self.state.lock().unwrap();
            state.calls.push_back("bootstrap".into());
            (!state.stall_bootstrap).then(|| {
                state.session.clone().ok_or(ChatError::Api {
                    code: 1001,
                    message: "no chat session".into(),
                })
            })
        };
        match outcome {
            Some(result) => result,
            None => future::pending().await,
        }
    }

    async fn room_messages(&self, _token: &str, room_id: &str) -> Result<Vec<ChatMessage>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push_back(format!("messages:{room_id}"));
        Ok(state.histories.get(room_id).cloned().unwrap_or_default())
    }

    async fn mark_read(&self, _token: &str, room_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push_back(format!("read:{room_id}"));
        if state.fail_mark_read {
            return Err(ChatError::Api {
                code: 1002,
                message: "room not found".into(),
            });
        }
        Ok(())
    }
}
