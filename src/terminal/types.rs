//! Terminal service data types and structures

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default server base URL when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8888/";

/// Default HTTP request timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Result type for terminal operations
pub type Result<T> = std::result::Result<T, TerminalError>;

/// Server model for a running terminal session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalModel {
    pub name: String,
}

impl TerminalModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Valid message types for the terminal protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Stdout,
    Disconnect,
    SetSize,
    Stdin,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Stdout => "stdout",
            MessageType::Disconnect => "disconnect",
            MessageType::SetSize => "set_size",
            MessageType::Stdin => "stdin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stdout" => Some(MessageType::Stdout),
            "disconnect" => Some(MessageType::Disconnect),
            "set_size" => Some(MessageType::SetSize),
            "stdin" => Some(MessageType::Stdin),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message exchanged with a terminal session.
///
/// `content` is positional and holds JSON primitives only.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalMessage {
    pub kind: MessageType,
    pub content: Vec<serde_json::Value>,
}

impl TerminalMessage {
    pub fn new(kind: MessageType, content: Vec<serde_json::Value>) -> Self {
        Self { kind, content }
    }

    /// Keyboard input for the remote process
    pub fn stdin(text: impl Into<String>) -> Self {
        Self::new(MessageType::Stdin, vec![serde_json::Value::String(text.into())])
    }

    pub fn stdout(text: impl Into<String>) -> Self {
        Self::new(MessageType::Stdout, vec![serde_json::Value::String(text.into())])
    }

    /// Resize request; terminado expects rows before columns
    pub fn set_size(rows: u16, cols: u16) -> Self {
        Self::new(MessageType::SetSize, vec![rows.into(), cols.into()])
    }

    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect, Vec::new())
    }

    /// Concatenate the string parts of the content
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|value| value.as_str())
            .collect()
    }
}

/// Request settings applied to every server request and to the channel handshake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSettings {
    /// Server token, sent as `Authorization: token <value>`
    #[serde(default)]
    pub token: Option<String>,

    /// Extra headers sent verbatim
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Per-request timeout in seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl RequestSettings {
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    /// All headers to send, including the authorization header
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            pairs.push(("Authorization".to_string(), format!("token {}", token)));
        }
        pairs
    }
}

/// Options for creating or connecting to a terminal session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Name of an existing terminal; the server assigns one when absent
    pub name: Option<String>,
    pub base_url: Option<String>,
    pub ws_url: Option<String>,
    pub settings: Option<RequestSettings>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = Some(ws_url.into());
        self
    }

    pub fn with_settings(mut self, settings: RequestSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// The supplied name, treating an empty string as absent
    pub fn requested_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Lifecycle state of a terminal session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Unconnected,
    NamePending,
    ChannelOpening,
    Connected,
    /// The channel closed without `dispose()`
    Closed(String),
    /// The connect attempt failed
    Failed(TerminalError),
    Disposed,
}

impl SessionState {
    /// Whether a connect attempt has reached its outcome
    pub fn is_settled(&self) -> bool {
        !matches!(
            self,
            SessionState::Unconnected | SessionState::NamePending | SessionState::ChannelOpening
        )
    }
}

/// Error types for terminal operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TerminalError {
    #[error("Invalid response: {0}")]
    HttpStatus(u16),
    #[error("HTTP request error: {0}")]
    HttpRequest(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Channel error: {0}")]
    Channel(String),
    #[error("Usage error: {0}")]
    Usage(String),
    #[error("Session disposed before connection completed")]
    Disposed,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TerminalError {
    /// Whether the error came from a stateless request
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            TerminalError::HttpStatus(_) | TerminalError::HttpRequest(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            TerminalError::HttpStatus(status) => Some(*status),
            _ => None,
        }
    }
}
