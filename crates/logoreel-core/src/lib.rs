//! Domain rules for logoreel.
//!
//! Everything here is free of HTTP and database concerns so the server crate
//! can wire it to whichever hosted services it is configured with:
//!
//! - [`direction`] – the phased creative-direction conversation: response
//!   parsing, phase → model parameters, conversation history and prompts.
//! - [`ratelimit`] – fixed-window per-user limiter over a pluggable
//!   [`ratelimit::CounterStore`].
//! - [`billing`] – credit balance arithmetic, admin adjustment validation and
//!   the subscription plan catalog.

pub mod billing;
pub mod direction;
pub mod ratelimit;

mod error;

pub use error::CoreError;
