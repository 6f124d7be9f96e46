//! Wire format and endpoint layout of the terminal service

use reqwest::Url;
use serde_json::Value;

use super::types::{MessageType, Result, TerminalError, TerminalMessage};

/// Collection path of the terminal REST service
pub const TERMINAL_SERVICE_PATH: &str = "api/terminals";

/// Path of the terminal WebSocket endpoint, relative to the ws url
pub const TERMINAL_WEBSOCKET_PATH: &str = "terminals/websocket";

impl TerminalMessage {
    /// Encode as a `[type, ...content]` text frame
    pub fn to_frame(&self) -> Result<String> {
        let mut frame = Vec::with_capacity(self.content.len() + 1);
        frame.push(Value::String(self.kind.as_str().to_string()));
        for value in &self.content {
            if !is_primitive(value) {
                return Err(TerminalError::Usage(format!(
                    "message content must be JSON primitives, got {}",
                    value
                )));
            }
            frame.push(value.clone());
        }
        Ok(Value::Array(frame).to_string())
    }

    /// Decode a `[type, ...content]` text frame
    pub fn from_frame(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| TerminalError::Protocol(format!("Failed to parse JSON: {}", e)))?;

        let Value::Array(mut items) = value else {
            return Err(TerminalError::Protocol(
                "terminal frame is not a JSON array".to_string(),
            ));
        };
        if items.is_empty() {
            return Err(TerminalError::Protocol("terminal frame is empty".to_string()));
        }

        let kind = match items.remove(0) {
            Value::String(kind) => MessageType::parse(&kind).ok_or_else(|| {
                TerminalError::Protocol(format!("unknown message type: {}", kind))
            })?,
            other => {
                return Err(TerminalError::Protocol(format!(
                    "message type must be a string, got {}",
                    other
                )));
            }
        };

        if let Some(bad) = items.iter().find(|value| !is_primitive(value)) {
            return Err(TerminalError::Protocol(format!(
                "non-primitive content in {} message: {}",
                kind, bad
            )));
        }

        Ok(Self {
            kind,
            content: items,
        })
    }
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Join `route` onto a base URL, then append `name` as one encoded segment.
///
/// Terminal names are opaque: `/`, `?`, `#` and spaces in a name are
/// percent-encoded rather than read as URL structure.
pub fn url_path_join(base: &str, route: &str, name: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| TerminalError::InvalidUrl(format!("{}: {}", base, e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| TerminalError::InvalidUrl(format!("{} cannot be a base", base)))?;
        path.pop_if_empty();
        path.extend(route.split('/').filter(|part| !part.is_empty()));
        if let Some(name) = name {
            path.push(name);
        }
    }
    Ok(url)
}

/// Ensure a base URL ends with a slash
pub fn normalize_base_url(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

/// Derive the WebSocket base URL from an HTTP base URL
pub fn ws_url_from_base(base_url: &str) -> String {
    let base = normalize_base_url(base_url);
    if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base
    }
}

/// WebSocket URL of a named terminal
pub fn channel_url(ws_url: &str, name: &str) -> Result<String> {
    let url = url_path_join(&normalize_base_url(ws_url), TERMINAL_WEBSOCKET_PATH, Some(name))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_stdin() {
        let frame = TerminalMessage::stdin("ls\n").to_frame().unwrap();
        assert_eq!(frame, r#"["stdin","ls\n"]"#);
    }

    #[test]
    fn test_encode_set_size() {
        let frame = TerminalMessage::set_size(24, 80).to_frame().unwrap();
        assert_eq!(frame, r#"["set_size",24,80]"#);
    }

    #[test]
    fn test_encode_rejects_nested_content() {
        let message = TerminalMessage::new(MessageType::Stdin, vec![json!({"a": 1})]);
        assert!(matches!(
            message.to_frame(),
            Err(TerminalError::Usage(_))
        ));
    }

    #[test]
    fn test_decode_stdout() {
        let message = TerminalMessage::from_frame(r#"["stdout","hello\n"]"#).unwrap();
        assert_eq!(message.kind, MessageType::Stdout);
        assert_eq!(message.content, vec![json!("hello\n")]);
        assert_eq!(message.text(), "hello\n");
    }

    #[test]
    fn test_decode_keeps_positional_primitives() {
        let message = TerminalMessage::from_frame(r#"["set_size",24,80,true,null]"#).unwrap();
        assert_eq!(message.kind, MessageType::SetSize);
        assert_eq!(
            message.content,
            vec![json!(24), json!(80), json!(true), Value::Null]
        );
    }

    #[test]
    fn test_decode_disconnect_without_content() {
        let message = TerminalMessage::from_frame(r#"["disconnect"]"#).unwrap();
        assert_eq!(message, TerminalMessage::disconnect());
    }

    #[test]
    fn test_decode_errors() {
        for frame in [
            "not json",
            r#"{"type":"stdout"}"#,
            "[]",
            r#"[1,"x"]"#,
            r#"["setup",{}]"#,
            r#"["stdout",["nested"]]"#,
        ] {
            assert!(
                matches!(
                    TerminalMessage::from_frame(frame),
                    Err(TerminalError::Protocol(_))
                ),
                "frame {} should be rejected",
                frame
            );
        }
    }

    #[test]
    fn test_url_path_join() {
        let url = url_path_join("http://localhost:8888/", TERMINAL_SERVICE_PATH, None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8888/api/terminals");

        let url = url_path_join("http://host/lab", TERMINAL_SERVICE_PATH, Some("1")).unwrap();
        assert_eq!(url.as_str(), "http://host/lab/api/terminals/1");

        let url = url_path_join("http://host/", TERMINAL_SERVICE_PATH, Some("a b")).unwrap();
        assert_eq!(url.as_str(), "http://host/api/terminals/a%20b");

        assert!(matches!(
            url_path_join("not a url", TERMINAL_SERVICE_PATH, None),
            Err(TerminalError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_name_is_a_single_segment() {
        let url = url_path_join("http://host/", TERMINAL_SERVICE_PATH, Some("a/b")).unwrap();
        assert_eq!(url.as_str(), "http://host/api/terminals/a%2Fb");

        let url = url_path_join("http://host/", TERMINAL_SERVICE_PATH, Some("q?x#y")).unwrap();
        assert_eq!(url.as_str(), "http://host/api/terminals/q%3Fx%23y");
    }

    #[test]
    fn test_ws_urls() {
        assert_eq!(ws_url_from_base("http://localhost:8888"), "ws://localhost:8888/");
        assert_eq!(ws_url_from_base("https://hub.example/user/"), "wss://hub.example/user/");
        assert_eq!(
            channel_url("ws://localhost:8888/", "3").unwrap(),
            "ws://localhost:8888/terminals/websocket/3"
        );
        assert_eq!(
            channel_url("wss://hub.example/user/a", "3").unwrap(),
            "wss://hub.example/user/a/terminals/websocket/3"
        );
        assert_eq!(
            channel_url("ws://localhost:8888/", "my term").unwrap(),
            "ws://localhost:8888/terminals/websocket/my%20term"
        );
        assert_eq!(
            channel_url("ws://localhost:8888/", "a/b").unwrap(),
            "ws://localhost:8888/terminals/websocket/a%2Fb"
        );
        assert!(matches!(
            channel_url("localhost", "3"),
            Err(TerminalError::InvalidUrl(_))
        ));
    }
}
