//! The guided, five-phase creative-direction conversation.

pub mod conversation;
pub mod parser;
pub mod phase;
pub mod prompt;

pub use conversation::{Conversation, MAX_CONVERSATION_MESSAGES, Message, Role};
pub use parser::{ChoiceOption, ParsedResponse, parse_response};
pub use phase::{ModelSelection, Phase, PhaseKind, PhaseSettings};
pub use prompt::{BrandBrief, system_prompt};
