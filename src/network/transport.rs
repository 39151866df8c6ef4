use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use uuid::Uuid;

use crate::common::ChatMessage;
use crate::error::{ChatError, Result};

use super::stomp::{Command, Frame};

/// An open, subscribed broker session.
#[async_trait]
pub trait Link: Send {
    fn is_connected(&self) -> bool;

    async fn publish(&mut self, frame: Frame) -> Result<()>;

    /// Next chat message from the subscription. An error means the link is
    /// gone and must be replaced. Must be cancel-safe.
    async fn next_message(&mut self) -> Result<ChatMessage>;

    /// Closes the session. Calling it again is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Opens links; one call per connect attempt.
#[async_trait]
pub trait Connector: Send {
    type Link: Link;

    async fn connect(&mut self, token: &str) -> Result<Self::Link>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsConnector {
    ws_url: String,
    subscribe_destination: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(ws_url: &str, subscribe_destination: &str, connect_timeout: Duration) -> Self {
        Self {
            ws_url: ws_url.to_string(),
            subscribe_destination: subscribe_destination.to_string(),
            connect_timeout,
        }
    }

    fn host(&self) -> String {
        reqwest::Url::parse(&self.ws_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }

    async fn handshake(&self, token: &str) -> Result<WsLink> {
        let (mut stream, _response) = connect_async(self.ws_url.as_str()).await?;
        log::debug!("Websocket open to {}", self.ws_url);

        let connect = Frame::connect(&self.host(), Some(token));
        stream.send(Message::Text(connect.encode())).await?;

        let connected = await_connected(&mut stream).await?;
        log::info!(
            "Broker session established (version {}, server {})",
            connected.get("version").unwrap_or("?"),
            connected.get("server").unwrap_or("?")
        );

        let subscription_id = format!("sub-{}", Uuid::new_v4());
        let subscribe = Frame::subscribe(&subscription_id, &self.subscribe_destination);
        stream.send(Message::Text(subscribe.encode())).await?;
        log::info!(
            "Subscribed to {} as {subscription_id}",
            self.subscribe_destination
        );

        Ok(WsLink {
            stream,
            connected: true,
            closed: false,
        })
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Link = WsLink;

    async fn connect(&mut self, token: &str) -> Result<WsLink> {
        match tokio::time::timeout(self.connect_timeout, self.handshake(token)).await {
            Ok(result) => result,
            Err(_) => Err(ChatError::Transport(format!(
                "connect to {} timed out after {:?}",
                self.ws_url, self.connect_timeout
            ))),
        }
    }
}

pub struct WsLink {
    stream: WsStream,
    connected: bool,
    closed: bool,
}

#[async_trait]
impl Link for WsLink {
    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn publish(&mut self, frame: Frame) -> Result<()> {
        if !self.connected {
            return Err(ChatError::Transport("link is not connected".into()));
        }
        if let Err(err) = self.stream.send(Message::Text(frame.encode())).await {
            self.connected = false;
            return Err(err.into());
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Result<ChatMessage> {
        loop {
            let Some(incoming) = self.stream.next().await else {
                self.connected = false;
                return Err(ChatError::Transport("broker closed the connection".into()));
            };
            let text = match incoming {
                Ok(Message::Close(close)) => {
                    self.connected = false;
                    return Err(ChatError::Transport(format!(
                        "broker closed the connection: {close:?}"
                    )));
                }
                Ok(message) => match frame_text(message) {
                    Some(text) => text,
                    None => continue,
                },
                Err(err) => {
                    self.connected = false;
                    return Err(err.into());
                }
            };

            let frame = match Frame::decode(&text) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("Dropping undecodable broker frame: {err}");
                    continue;
                }
            };

            match frame.command {
                Command::Message => match serde_json::from_str::<ChatMessage>(&frame.body) {
                    Ok(message) => return Ok(message),
                    Err(err) => log::warn!("Dropping malformed chat message: {err}"),
                },
                Command::Error => {
                    self.connected = false;
                    return Err(ChatError::Protocol(broker_error(&frame)));
                }
                other => log::debug!("Ignoring {other} frame"),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.connected {
            self.connected = false;
            if let Err(err) = self
                .stream
                .send(Message::Text(Frame::disconnect().encode()))
                .await
            {
                log::debug!("DISCONNECT not delivered: {err}");
            }
        }
        if let Err(err) = self.stream.close(None).await {
            log::debug!("Websocket close failed: {err}");
        }
        Ok(())
    }
}

async fn await_connected(stream: &mut WsStream) -> Result<Frame> {
    while let Some(incoming) = stream.next().await {
        let Some(text) = frame_text(incoming?) else {
            continue;
        };
        match Frame::decode(&text)? {
            Some(frame) if frame.command == Command::Connected => return Ok(frame),
            Some(frame) if frame.command == Command::Error => {
                return Err(ChatError::Protocol(broker_error(&frame)));
            }
            Some(frame) => log::debug!("Ignoring {} frame before CONNECTED", frame.command),
            None => {}
        }
    }
    Err(ChatError::Transport(
        "connection closed during broker handshake".into(),
    ))
}

fn frame_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text),
        Message::Binary(bytes) => String::from_utf8(bytes).ok(),
        _ => None,
    }
}

fn broker_error(frame: &Frame) -> String {
    let summary = frame.get("message").unwrap_or("broker error");
    if frame.body.trim().is_empty() {
        summary.to_string()
    } else {
        format!("{summary}: {}", frame.body.trim())
    }
}
