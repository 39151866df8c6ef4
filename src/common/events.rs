use std::time::Duration;

use super::types::{ChatMessage, SessionDescriptor};

/// Events emitted by the chat network task for the view.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    SessionLoaded(SessionDescriptor),
    BootstrapFailed(String),
    Connecting { attempt: u32 },
    Connected,
    Disconnected { reason: String },
    ReconnectScheduled { delay: Duration, attempt: u32 },
    /// The configured attempt ceiling was reached; no timer is pending.
    ReconnectExhausted { attempts: u32 },
    MessageReceived(ChatMessage),
    RoomHistoryLoaded {
        room_id: String,
        messages: Vec<ChatMessage>,
    },
    RoomMarkedRead(String),
    RequestFailed(String),
    LoggedOut,
}
