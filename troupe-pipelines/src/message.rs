use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

/// One entry of a conversation or of a pipeline's log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Which agent produced the message, for assistant entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            name: None,
            content: content.into(),
        }
    }

    pub fn assistant(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            name: Some(name.into()),
            content: content.into(),
        }
    }
}

/// Renders a transcript as `role: content` lines for prompts.
pub fn transcript(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|message| {
            let speaker = match (&message.role, &message.name) {
                (Role::User, _) => "user",
                (Role::Assistant, Some(name)) => name.as_str(),
                (Role::Assistant, None) => "assistant",
            };
            format!("{speaker}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
