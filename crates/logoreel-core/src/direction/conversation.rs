use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::parser::ChoiceOption;
use crate::CoreError;

/// Most messages a single creative-direction conversation may hold.
pub const MAX_CONVERSATION_MESSAGES: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ChoiceOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_clarification: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            options: None,
            is_clarification: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            options: None,
            is_clarification: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn with_options(mut self, options: Option<Vec<ChoiceOption>>) -> Self {
        self.options = options;
        self
    }

    pub fn with_clarification(mut self, is_clarification: bool) -> Self {
        self.is_clarification = Some(is_clarification);
        self
    }
}

/// Ordered, append-only message history capped at
/// [`MAX_CONVERSATION_MESSAGES`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a conversation from stored history, enforcing the cap.
    pub fn from_messages(messages: impl IntoIterator<Item = Message>) -> Result<Self, CoreError> {
        let mut conversation = Self::new();
        for message in messages {
            conversation.push(message)?;
        }
        Ok(conversation)
    }

    pub fn push(&mut self, message: Message) -> Result<(), CoreError> {
        if self.messages.len() >= MAX_CONVERSATION_MESSAGES {
            return Err(CoreError::ConversationFull {
                capacity: MAX_CONVERSATION_MESSAGES,
            });
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn remaining_capacity(&self) -> usize {
        MAX_CONVERSATION_MESSAGES - self.messages.len()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }
}
