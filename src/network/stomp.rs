//! STOMP 1.2 frames as exchanged with the chat broker over the websocket.

use std::fmt;

use crate::error::{ChatError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        let command = match raw {
            "CONNECT" | "STOMP" => Command::Connect,
            "CONNECTED" => Command::Connected,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            _ => return None,
        };
        Some(command)
    }

    // CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header; repeated headers keep the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn connect(host: &str, token: Option<&str>) -> Self {
        let frame = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0");
        match token {
            Some(token) => frame.header("Authorization", bearer(token)),
            None => frame,
        }
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn send(destination: &str, token: Option<&str>, json_body: String) -> Self {
        let frame = Frame::new(Command::Send)
            .header("destination", destination)
            .header("content-type", "application/json");
        let frame = match token {
            Some(token) => frame.header("Authorization", bearer(token)),
            None => frame,
        };
        frame.body(json_body)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decodes one frame. Heart-beat payloads (bare EOLs) yield `None`.
    pub fn decode(raw: &str) -> Result<Option<Frame>> {
        let trimmed = raw.trim_start_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Ok(None);
        }

        let (head, rest) = split_head(trimmed)
            .ok_or_else(|| ChatError::Protocol("frame has no end of headers".into()))?;
        let mut lines = head
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line));

        let command_line = lines.next().unwrap_or_default();
        let command = Command::parse(command_line)
            .ok_or_else(|| ChatError::Protocol(format!("unknown command `{command_line}`")))?;

        let mut headers = Vec::new();
        for line in lines.filter(|line| !line.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ChatError::Protocol(format!("malformed header `{line}`")))?;
            if command.escapes_headers() {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let frame = Frame {
            command,
            headers,
            body: String::new(),
        };
        let body = match frame.get("content-length") {
            Some(len) => {
                let len: usize = len
                    .trim()
                    .parse()
                    .map_err(|_| ChatError::Protocol(format!("bad content-length `{len}`")))?;
                rest.get(..len)
                    .ok_or_else(|| ChatError::Protocol("body shorter than content-length".into()))?
            }
            None => {
                let end = rest
                    .find('\0')
                    .ok_or_else(|| ChatError::Protocol("frame is not NUL terminated".into()))?;
                &rest[..end]
            }
        };

        Ok(Some(Frame {
            body: body.to_string(),
            ..frame
        }))
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

fn split_head(frame: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in frame.split_inclusive('\n') {
        if offset > 0 && line.ends_with('\n') && line.trim_end_matches(['\r', '\n']).is_empty() {
            return Some((&frame[..offset], &frame[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ChatError::Protocol(format!(
                    "invalid header escape `\\{}`",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}
