//! REST collaborators of the chat session: bootstrap, room backlog and
//! read-state marking.

pub mod client;
pub mod envelope;

use async_trait::async_trait;

use crate::common::{ChatMessage, SessionDescriptor};
use crate::error::Result;

pub use client::RestChatApi;

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Initial chat descriptor for the signed-in user.
    async fn bootstrap(&self, token: &str) -> Result<SessionDescriptor>;

    /// Backlog of one room, oldest first.
    async fn room_messages(&self, token: &str, room_id: &str) -> Result<Vec<ChatMessage>>;

    async fn mark_read(&self, token: &str, room_id: &str) -> Result<()>;
}
