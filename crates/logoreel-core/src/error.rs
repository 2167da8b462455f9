use thiserror::Error;

/// Errors produced by the domain layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Phase numbers are limited to `1..=5`.
    #[error("invalid phase {0}: must be between 1 and 5")]
    InvalidPhase(u8),

    /// The conversation flow only moves forward.
    #[error("cannot move from phase {from} back to phase {to}")]
    PhaseRegression { from: u8, to: u8 },

    /// The conversation already holds its maximum number of messages.
    #[error("conversation is full ({capacity} messages)")]
    ConversationFull { capacity: usize },

    /// Input rejected before any external call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A debit would take the balance below zero.
    #[error("insufficient credits: requested {requested}, available {available}")]
    InsufficientCredits { requested: i64, available: i64 },

    /// Unknown plan name or price id.
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
}
