//! Chat-model seam used by the creative-direction flow.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use logoreel_core::direction::{Message, PhaseSettings};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    /// No API key was configured; fails before any request is made.
    #[error("chat model is not configured")]
    NotConfigured,

    #[error("network error talking to the model API: {0}")]
    Network(String),

    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("model stream error: {0}")]
    Stream(String),
}

/// One streamed generation request.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub settings: PhaseSettings,
    pub system_prompt: String,
    pub messages: Vec<Message>,
}

/// Text deltas in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Start a streamed generation. Errors returned here happen before any
    /// output; errors inside the stream happen mid-response.
    async fn stream(&self, request: ModelRequest) -> Result<TextStream, ModelError>;
}
