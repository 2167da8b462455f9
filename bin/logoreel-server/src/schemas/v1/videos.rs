use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::VideoRecord;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateVideoRequest {
    /// A completed creative-direction session.
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoResponse {
    pub id: String,
    pub session_id: String,
    pub status: String,
    pub from_subscription: i64,
    pub from_overage: i64,
    pub created_at: String,
}

impl VideoRecord {
    pub fn to_response(&self) -> VideoResponse {
        VideoResponse {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            status: self.status.clone(),
            from_subscription: self.from_subscription,
            from_overage: self.from_overage,
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
