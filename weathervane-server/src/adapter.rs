//! Request body types for `POST /api/chat` and their conversion into agent
//! input items.

use serde::Deserialize;
use weathervane_core::{AgentInputItem, InputRole};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

impl From<ChatRole> for InputRole {
    fn from(role: ChatRole) -> Self {
        match role {
            ChatRole::User => InputRole::User,
            ChatRole::Assistant => InputRole::Assistant,
            ChatRole::System => InputRole::System,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

/// Clients send either a bare string or a list of typed parts.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    /// Tool-call, tool-result, image and other parts carried in history.
    /// They contribute no text.
    #[serde(other)]
    Other,
}

impl MessageContent {
    /// Concatenation of all text parts, in order, with no separator.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Other => None,
                })
                .collect(),
        }
    }
}

impl From<&ChatMessage> for AgentInputItem {
    fn from(message: &ChatMessage) -> Self {
        AgentInputItem::completed_text(message.role.into(), message.content.text())
    }
}

/// One completed input item per message, order preserved.
pub fn to_input_items(messages: &[ChatMessage]) -> Vec<AgentInputItem> {
    messages.iter().map(AgentInputItem::from).collect()
}
