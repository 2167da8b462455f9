use logoreel_core::direction::ChoiceOption;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::{DirectionMessageRecord, DirectionSessionRecord};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateDirectionSessionRequest {
    #[validate(length(min = 1, max = 100, message = "brand_name must be 1 to 100 characters"))]
    pub brand_name: String,
    #[validate(length(max = 1000, message = "brand_description must be at most 1000 characters"))]
    pub brand_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 2000, message = "content must be 1 to 2000 characters"))]
    pub content: String,
    /// Skip the remaining questions and go straight to the final direction.
    #[serde(default)]
    pub generate_now: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OptionResponse {
    pub letter: String,
    pub label: String,
    pub free_text: bool,
}

impl From<&ChoiceOption> for OptionResponse {
    fn from(option: &ChoiceOption) -> Self {
        Self {
            letter: option.letter.to_string(),
            label: option.label.clone(),
            free_text: option.free_text,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DirectionSessionResponse {
    pub id: String,
    pub brand_name: String,
    pub brand_description: Option<String>,
    pub phase: u8,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DirectionMessageResponse {
    pub seq: i64,
    pub role: String,
    pub content: String,
    pub options: Option<Vec<OptionResponse>>,
    pub is_clarification: Option<bool>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DirectionSessionDetail {
    #[serde(flatten)]
    pub session: DirectionSessionResponse,
    pub messages: Vec<DirectionMessageResponse>,
}

/// Payload of the final `done` event on the message stream.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TurnCompleted {
    pub question: String,
    pub options: Option<Vec<OptionResponse>>,
    /// Phase the session is in after this turn.
    pub phase: u8,
    pub status: String,
}

impl DirectionSessionRecord {
    pub fn to_response(&self) -> DirectionSessionResponse {
        DirectionSessionResponse {
            id: self.id.clone(),
            brand_name: self.brand_name.clone(),
            brand_description: self.brand_description.clone(),
            phase: self.phase,
            status: self.status.to_string(),
            created_at: self.created_at.to_rfc3339(),
            updated_at: self.updated_at.to_rfc3339(),
        }
    }
}

impl DirectionMessageRecord {
    pub fn to_response(&self) -> DirectionMessageResponse {
        let message = self.to_message();
        DirectionMessageResponse {
            seq: self.seq,
            role: self.role.clone(),
            content: self.content.clone(),
            options: message.options.as_ref().map(|o| o.iter().map(OptionResponse::from).collect()),
            is_clarification: self.is_clarification,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
