use crate::common::OutboundMessage;
use crate::error::Result;

use super::stomp::Frame;
use super::transport::Link;

/// Publishes one composed message to `destination`.
///
/// Returns `Ok(false)` without touching the link when the text is blank,
/// there is no link, the link is not connected, or no room is known.
pub async fn publish_outbound<L: Link + ?Sized>(
    link: Option<&mut L>,
    room_id: Option<&str>,
    content: &str,
    token: Option<&str>,
    destination: &str,
) -> Result<bool> {
    let content = content.trim();
    if content.is_empty() {
        log::debug!("Send skipped: empty message");
        return Ok(false);
    }
    let Some(link) = link else {
        log::debug!("Send skipped: no transport");
        return Ok(false);
    };
    if !link.is_connected() {
        log::debug!("Send skipped: transport not connected");
        return Ok(false);
    }
    let Some(room_id) = room_id.filter(|room| !room.is_empty()) else {
        log::debug!("Send skipped: no room selected");
        return Ok(false);
    };

    let payload = OutboundMessage {
        content: content.to_string(),
        room_id: room_id.to_string(),
    };
    let frame = Frame::send(destination, token, serde_json::to_string(&payload)?);
    link.publish(frame).await?;
    Ok(true)
}
