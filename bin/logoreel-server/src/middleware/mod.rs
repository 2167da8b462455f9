//! HTTP middleware stack: per-request trace id, CORS, user authentication.

pub mod auth;
pub mod cors;
pub mod trace;
