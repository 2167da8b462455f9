use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::ProfileRecord;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub email: Option<String>,
    pub role: String,
    pub created_at: String,
}

impl ProfileRecord {
    pub fn to_response(&self) -> MeResponse {
        MeResponse {
            id: self.id.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
