pub mod account;
pub mod billing;
pub mod credits;
pub mod direction;
pub mod videos;
