use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::common::{ChatCommand, ChatEvent, ChatMessage, Role, RoomSummary, SessionDescriptor};

const MAX_DEBUG_EVENTS: usize = 100;

/// Status line shown by both views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
    Reconnecting { delay: Duration, attempt: u32 },
    GaveUp { attempts: u32 },
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
            ConnectionStatus::Connecting { attempt: 1 } => f.write_str("Connecting…"),
            ConnectionStatus::Connecting { attempt } => write!(f, "Connecting… (attempt {attempt})"),
            ConnectionStatus::Connected => f.write_str("Connected"),
            ConnectionStatus::Reconnecting { delay, .. } => {
                write!(f, "Reconnecting in {}s", delay.as_secs_f32().ceil() as u64)
            }
            ConnectionStatus::GaveUp { attempts } => {
                write!(f, "Offline (gave up after {attempts} attempts)")
            }
        }
    }
}

/// Customer widget: a single conversation with support.
#[derive(Debug, Default)]
pub struct CustomerView {
    pub room_id: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub unread: u32,
    pub open: bool,
}

/// Staff console: every customer room plus the one currently open.
#[derive(Debug, Default)]
pub struct StaffView {
    /// Most recently active first.
    pub rooms: Vec<RoomSummary>,
    pub open_room: Option<String>,
    pub backlog: Vec<ChatMessage>,
    seen: HashSet<i64>,
}

#[derive(Debug, Default)]
pub enum View {
    #[default]
    Loading,
    Customer(CustomerView),
    Staff(StaffView),
}

#[derive(Debug, Clone)]
pub struct DebugEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub message: String,
}

/// Client-side chat state, fed by [`ChatEvent`]s.
pub struct ChatState {
    pub view: View,
    pub input_text: String,
    pub connection: ConnectionStatus,
    pub last_error: Option<String>,
    pub debug_events: Vec<DebugEvent>,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            view: View::Loading,
            input_text: String::new(),
            connection: ConnectionStatus::Disconnected,
            last_error: None,
            debug_events: Vec::new(),
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self.view {
            View::Loading => None,
            View::Customer(_) => Some(Role::Customer),
            View::Staff(_) => Some(Role::Employee),
        }
    }

    pub fn apply_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::SessionLoaded(session) => {
                self.last_error = None;
                self.apply_session(session);
            }
            ChatEvent::BootstrapFailed(reason) => {
                self.add_debug_event("BOOTSTRAP_FAILED", reason.clone());
                self.last_error = Some(format!("Could not start chat: {reason}"));
            }
            ChatEvent::Connecting { attempt } => {
                self.connection = ConnectionStatus::Connecting { attempt };
            }
            ChatEvent::Connected => {
                self.connection = ConnectionStatus::Connected;
                self.add_debug_event("CONNECTED", "Chat transport connected".into());
            }
            ChatEvent::Disconnected { reason } => {
                self.connection = ConnectionStatus::Disconnected;
                self.add_debug_event("DISCONNECTED", reason);
            }
            ChatEvent::ReconnectScheduled { delay, attempt } => {
                self.connection = ConnectionStatus::Reconnecting { delay, attempt };
                self.add_debug_event(
                    "RECONNECT_SCHEDULED",
                    format!("Retry {attempt} in {delay:?}"),
                );
            }
            ChatEvent::ReconnectExhausted { attempts } => {
                self.connection = ConnectionStatus::GaveUp { attempts };
                self.last_error = Some("Chat is offline. Try again later.".into());
            }
            ChatEvent::MessageReceived(message) => {
                self.dispatch_message(message);
            }
            ChatEvent::RoomHistoryLoaded { room_id, messages } => {
                self.load_room_history(&room_id, messages);
            }
            ChatEvent::RoomMarkedRead(room_id) => self.mark_room_read(&room_id),
            ChatEvent::RequestFailed(reason) => {
                self.add_debug_event("REQUEST_FAILED", reason.clone());
                self.last_error = Some(reason);
            }
            ChatEvent::LoggedOut => {
                self.view = View::Loading;
                self.input_text.clear();
                self.connection = ConnectionStatus::Disconnected;
                self.last_error = Some("Signed out. Sign in again to continue chatting.".into());
                self.add_debug_event("LOGGED_OUT", "Session discarded".into());
            }
        }
    }

    pub fn apply_session(&mut self, session: SessionDescriptor) {
        self.view = match session.role {
            Role::Customer => {
                let mut view = CustomerView {
                    room_id: session.room_id,
                    ..CustomerView::default()
                };
                for message in session.messages {
                    insert_unique(&mut view.messages, message);
                }
                View::Customer(view)
            }
            Role::Employee => {
                let mut rooms = session.rooms;
                // Stable: rooms without activity keep server order at the end.
                rooms.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
                View::Staff(StaffView {
                    rooms,
                    ..StaffView::default()
                })
            }
        };
    }

    /// Routes an inbound message by role. Returns `false` for duplicates and
    /// for messages that arrive before a session exists.
    pub fn dispatch_message(&mut self, message: ChatMessage) -> bool {
        match &mut self.view {
            View::Loading => {
                log::debug!("Dropping message {} received before bootstrap", message.id);
                false
            }
            View::Customer(view) => {
                let counts_unread = !view.open && message.sender_role == Role::Employee;
                let inserted = insert_unique(&mut view.messages, message);
                if inserted && counts_unread {
                    view.unread += 1;
                }
                inserted
            }
            View::Staff(view) => view.dispatch(message),
        }
    }

    pub fn load_room_history(&mut self, room_id: &str, messages: Vec<ChatMessage>) {
        let View::Staff(view) = &mut self.view else {
            return;
        };
        if view.open_room.as_deref() != Some(room_id) {
            log::debug!("Ignoring history for room {room_id}; it is no longer open");
            return;
        }
        // Live messages may already have landed while the backlog loaded.
        let live = std::mem::take(&mut view.backlog);
        for message in messages.into_iter().chain(live) {
            view.seen.insert(message.id);
            insert_unique(&mut view.backlog, message);
        }
    }

    /// Zeroes the unread counter of a room regardless of its prior value.
    pub fn mark_room_read(&mut self, room_id: &str) {
        match &mut self.view {
            View::Loading => {}
            View::Customer(view) => {
                if view.room_id.as_deref() == Some(room_id) {
                    view.unread = 0;
                }
            }
            View::Staff(view) => {
                if let Some(room) = view.rooms.iter_mut().find(|room| room.room_id == room_id) {
                    room.unread_count = 0;
                }
            }
        }
    }

    /// Staff selects a room. Returns the command that loads and reads it.
    pub fn open_room(&mut self, room_id: &str) -> Option<ChatCommand> {
        let View::Staff(view) = &mut self.view else {
            return None;
        };
        if view.open_room.as_deref() != Some(room_id) {
            view.open_room = Some(room_id.to_string());
            view.backlog.clear();
        }
        Some(ChatCommand::OpenRoom {
            room_id: room_id.to_string(),
        })
    }

    /// Customer opens the widget. Returns the mark-read command if the room
    /// is known.
    pub fn open_widget(&mut self) -> Option<ChatCommand> {
        let View::Customer(view) = &mut self.view else {
            return None;
        };
        view.open = true;
        view.room_id.clone().map(|room_id| ChatCommand::MarkRead { room_id })
    }

    pub fn close_widget(&mut self) {
        if let View::Customer(view) = &mut self.view {
            view.open = false;
        }
    }

    pub fn current_room_id(&self) -> Option<&str> {
        match &self.view {
            View::Loading => None,
            View::Customer(view) => view.room_id.as_deref(),
            View::Staff(view) => view.open_room.as_deref(),
        }
    }

    /// Messages of the conversation on screen.
    pub fn visible_messages(&self) -> &[ChatMessage] {
        match &self.view {
            View::Loading => &[],
            View::Customer(view) => &view.messages,
            View::Staff(view) => &view.backlog,
        }
    }

    pub fn unread_total(&self) -> u32 {
        match &self.view {
            View::Loading => 0,
            View::Customer(view) => view.unread,
            View::Staff(view) => view.rooms.iter().map(|room| room.unread_count).sum(),
        }
    }

    /// Turns the input box into a send command and clears it. Leaves the
    /// input untouched when the text is blank, the transport is not
    /// connected, or no room is known.
    pub fn compose_outbound(&mut self) -> Option<ChatCommand> {
        let content = self.input_text.trim();
        if content.is_empty() || self.connection != ConnectionStatus::Connected {
            return None;
        }
        let room_id = self.current_room_id()?.to_string();
        let command = ChatCommand::SendMessage {
            room_id,
            content: content.to_string(),
        };
        self.input_text.clear();
        Some(command)
    }

    pub fn add_debug_event(&mut self, event_type: &str, message: String) {
        self.debug_events.push(DebugEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            message,
        });

        if self.debug_events.len() > MAX_DEBUG_EVENTS {
            self.debug_events.remove(0);
        }
    }
}

impl StaffView {
    fn dispatch(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }

        let is_open = self.open_room.as_deref() == Some(message.room_id.as_str());
        let mut summary = match self
            .rooms
            .iter()
            .position(|room| room.room_id == message.room_id)
        {
            Some(index) => self.rooms.remove(index),
            None => RoomSummary::from_message(&message),
        };

        summary.last_message = Some(message.content.clone());
        summary.last_message_time = Some(message.created_at);
        if message.sender_role == Role::Customer && !is_open {
            summary.unread_count += 1;
        }
        self.rooms.insert(0, summary);

        if is_open {
            insert_unique(&mut self.backlog, message);
        }
        true
    }
}

/// Appends unless a message with the same id is already present.
fn insert_unique(messages: &mut Vec<ChatMessage>, message: ChatMessage) -> bool {
    if messages.iter().any(|existing| existing.id == message.id) {
        return false;
    }
    messages.push(message);
    true
}
