use chrono::{DateTime, Utc};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// A row in the `profiles` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileRecord {
    pub id: String,
    pub email: Option<String>,
    pub role: String,
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}
