pub mod admin;
pub mod v1;
