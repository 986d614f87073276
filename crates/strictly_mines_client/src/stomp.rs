//! Minimal STOMP 1.2 frame codec for text WebSocket messages.
//!
//! Only what a subscribing client needs: encode outgoing frames, parse
//! incoming ones, and recognize bare heart-beats.

use derive_more::Display;
use std::str::FromStr;

/// STOMP frame commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Client opens a session.
    Connect,
    /// Client opens a session (1.2 spelling).
    Stomp,
    /// Server accepted the session.
    Connected,
    /// Client subscribes to a destination.
    Subscribe,
    /// Client drops a subscription.
    Unsubscribe,
    /// Client ends the session.
    Disconnect,
    /// Client sends to a destination.
    Send,
    /// Server delivers a message for a subscription.
    Message,
    /// Server acknowledges a receipt request.
    Receipt,
    /// Server reports a failure; the session is closed afterwards.
    Error,
}

/// Frame parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum StompError {
    /// The command line is not a known command.
    #[display("Unknown STOMP command: {_0}")]
    UnknownCommand(String),
    /// A header line has no colon.
    #[display("Malformed STOMP header: {_0}")]
    MalformedHeader(String),
    /// The frame ends before the blank line after the headers.
    #[display("Truncated STOMP frame")]
    Truncated,
}

impl std::error::Error for StompError {}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    command: Command,
    headers: Vec<(String, String)>,
    body: String,
}

impl Frame {
    /// Creates a frame with no headers and an empty body.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Appends a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// The frame's command.
    pub fn command(&self) -> Command {
        self.command
    }

    /// First value of header `name`. Repeated headers keep the first value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The frame body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Consumes the frame, returning its body.
    pub fn into_body(self) -> String {
        self.body
    }

    /// Serializes the frame, NUL terminator included.
    pub fn encode(&self) -> String {
        let escape = escapes_headers(self.command);
        let mut out = format!("{}\n", self.command);
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
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parses one frame from a text message.
    ///
    /// Returns `Ok(None)` for a heart-beat, i.e. a message holding only
    /// end-of-line characters.
    pub fn parse(text: &str) -> Result<Option<Self>, StompError> {
        let text = text.trim_start_matches(['\r', '\n']);
        if text.is_empty() || text == "\0" {
            return Ok(None);
        }

        let (head, rest) = split_head(text).ok_or(StompError::Truncated)?;
        let mut lines = head.lines().map(|l| l.strip_suffix('\r').unwrap_or(l));
        let command_line = lines.next().ok_or(StompError::Truncated)?;
        let command = Command::from_str(command_line)
            .map_err(|_| StompError::UnknownCommand(command_line.to_string()))?;

        let unescape = escapes_headers(command);
        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
            if unescape {
                headers.push((unescape_header(name), unescape_header(value)));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let frame = Self {
            command,
            headers,
            body: String::new(),
        };
        let body = match frame.get("content-length").and_then(|l| l.parse::<usize>().ok()) {
            Some(len) if len <= rest.len() && rest.is_char_boundary(len) => &rest[..len],
            _ => rest.split('\0').next().unwrap_or_default(),
        };
        Ok(Some(frame.with_body(body)))
    }
}

/// CONNECT and CONNECTED frames carry headers verbatim.
fn escapes_headers(command: Command) -> bool {
    !matches!(command, Command::Connect | Command::Connected)
}

fn split_head(text: &str) -> Option<(&str, &str)> {
    let lf = text.find("\n\n").map(|i| (i, 2));
    let crlf = text.find("\r\n\r\n").map(|i| (i, 4));
    let (index, width) = match (lf, crlf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b)?,
    };
    Some((&text[..index], &text[index + width..]))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
