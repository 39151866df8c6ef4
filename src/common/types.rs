use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Role of the signed-in user in a support conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Customer,
    Employee,
}

/// A chat message as stamped by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub room_id: String,
    pub sender_role: Role,
    #[serde(default)]
    pub sender_display_name: String,
    #[serde(default)]
    pub sender_email: String,
    pub content: String,
    pub created_at: NaiveDateTime,
    #[serde(default)]
    pub is_read: bool,
}

/// Per-room entry in the staff console's room list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    #[serde(default)]
    pub counterparty_name: String,
    #[serde(default)]
    pub counterparty_email: String,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub unread_count: u32,
}

impl RoomSummary {
    /// Summary for a room first seen through an inbound message.
    pub fn from_message(message: &ChatMessage) -> Self {
        let (name, email) = match message.sender_role {
            Role::Customer => (
                message.sender_display_name.clone(),
                message.sender_email.clone(),
            ),
            Role::Employee => (String::new(), String::new()),
        };
        Self {
            room_id: message.room_id.clone(),
            counterparty_name: name,
            counterparty_email: email,
            last_message: None,
            last_message_time: None,
            unread_count: 0,
        }
    }
}

/// Initial session returned by the bootstrap endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
    pub role: Role,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub rooms: Vec<RoomSummary>,
}

/// Publish payload; the server fills in sender, id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub content: String,
    pub room_id: String,
}

/// Last-known user profile kept next to the tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}
