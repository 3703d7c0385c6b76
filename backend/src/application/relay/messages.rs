use serde_json::{json, Value};

use crate::application::connections::CloseReason;

/// Frame received from the relay client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// Frame to deliver to the relay client. `Close` is always the last one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerFrame {
    Text(String),
    Binary(Vec<u8>),
    Close(CloseReason),
}

/// How the pipeline treats a client text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Attempt to replace the relay-authored session configuration.
    SessionOverride,
    /// A user message item; carries its text parts.
    UserContent(String),
    /// Plain `response.create` asking the model to answer.
    GenerationTrigger,
    Other,
}

impl ClientMessage {
    pub fn classify(text: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return ClientMessage::Other;
        };
        match value.get("type").and_then(Value::as_str) {
            Some("session.update") => ClientMessage::SessionOverride,
            Some("conversation.item.create") => classify_item(value.get("item")),
            Some("response.create") => {
                let overrides = value
                    .get("response")
                    .and_then(Value::as_object)
                    .map(|r| ["instructions", "modalities", "tools", "tool_choice"].iter().any(|k| r.contains_key(*k)))
                    .unwrap_or(false);
                if overrides {
                    ClientMessage::SessionOverride
                } else {
                    ClientMessage::GenerationTrigger
                }
            }
            _ => ClientMessage::Other,
        }
    }
}

fn classify_item(item: Option<&Value>) -> ClientMessage {
    let Some(item) = item else {
        return ClientMessage::Other;
    };
    match item.get("role").and_then(Value::as_str) {
        Some("system") => ClientMessage::SessionOverride,
        Some("user") if item.get("type").and_then(Value::as_str).unwrap_or("message") == "message" => {
            ClientMessage::UserContent(user_text(item))
        }
        _ => ClientMessage::Other,
    }
}

fn user_text(item: &Value) -> String {
    let Some(parts) = item.get("content").and_then(Value::as_array) else {
        return String::new();
    };
    parts
        .iter()
        .filter(|p| matches!(p.get("type").and_then(Value::as_str), Some("input_text") | Some("text")))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The authoritative `session.update` sent upstream once connected.
pub fn session_directive(scope: Option<&str>, context: Option<&str>) -> String {
    let mut instructions = String::from(
        "You are an assistant taking part in a moderated discussion. \
Only discuss the topic below and politely decline anything else. Answer in text.",
    );
    if let Some(scope) = scope {
        instructions.push_str(&format!("\nTopic: {}", scope));
    }
    if let Some(context) = context {
        instructions.push_str(&format!("\nBackground: {}", context));
    }
    json!({
        "type": "session.update",
        "session": {
            "modalities": ["text"],
            "instructions": instructions,
            "tools": [],
            "tool_choice": "none",
        }
    })
    .to_string()
}
