use serde::{Deserialize, Serialize};

use crate::{Message, Role};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    System,
    User,
    Assistant,
}

impl From<InputRole> for Role {
    fn from(role: InputRole) -> Self {
        match role {
            InputRole::System => Role::System,
            InputRole::User => Role::User,
            InputRole::Assistant => Role::Assistant,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Completed,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputContent {
    InputText { text: String },
}

impl InputContent {
    pub fn text(&self) -> &str {
        match self {
            Self::InputText { text } => text,
        }
    }
}

/// One conversation item handed to the agent runner.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AgentInputItem {
    pub role: InputRole,
    pub status: ItemStatus,
    pub content: Vec<InputContent>,
}

impl AgentInputItem {
    pub fn completed_text(role: InputRole, text: impl Into<String>) -> Self {
        Self {
            role,
            status: ItemStatus::Completed,
            content: vec![InputContent::InputText { text: text.into() }],
        }
    }

    pub fn text(&self) -> String {
        self.content.iter().map(InputContent::text).collect()
    }
}

impl From<&AgentInputItem> for Message {
    fn from(item: &AgentInputItem) -> Self {
        Message::new(item.role.into(), item.text())
    }
}
