use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use utoipa::OpenApi;

use crate::clients::auth::AuthUser;
use crate::entities::{ChargeOutcome, SessionStatus, VideoStore};
use crate::error::ServerError;
use crate::routes::v1::direction::load_owned_session;
use crate::schemas::v1::videos::{CreateVideoRequest, VideoResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(create_video, list_videos), components(schemas(CreateVideoRequest, VideoResponse)))]
pub struct VideosApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/videos", post(create_video).get(list_videos))
}

/// Queue a render for a finished direction session, spending one credit.
#[utoipa::path(
    post,
    path = "/v1/videos",
    tag = "videos",
    security(("bearer" = [])),
    request_body = CreateVideoRequest,
    responses(
        (status = 200, description = "Video queued", body = VideoResponse),
        (status = 400, description = "Direction session not complete"),
        (status = 402, description = "Not enough credits"),
        (status = 404, description = "No such session for this user"),
    )
)]
pub async fn create_video(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateVideoRequest>,
) -> Result<Json<VideoResponse>, ServerError> {
    let session = load_owned_session(&state, &user, &req.session_id).await?;
    if session.status != SessionStatus::Complete {
        return Err(ServerError::BadRequest(
            "finish the creative direction before requesting a video".into(),
        ));
    }
    match state.store.create_video_with_charge(&user.id, &session.id).await? {
        ChargeOutcome::Charged(video) => Ok(Json(video.to_response())),
        ChargeOutcome::Insufficient { available } => Err(ServerError::PaymentRequired(format!(
            "a video costs 1 credit but {available} are available"
        ))),
    }
}

#[utoipa::path(
    get,
    path = "/v1/videos",
    tag = "videos",
    security(("bearer" = [])),
    responses((status = 200, description = "Caller's videos, newest first", body = Vec<VideoResponse>))
)]
pub async fn list_videos(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<VideoResponse>>, ServerError> {
    let videos = state.store.list_videos(&user.id).await?;
    Ok(Json(videos.iter().map(|v| v.to_response()).collect()))
}

#[cfg(test)]
mod test {
    use crate::entities::{CreditStore, DirectionSessionRecord, DirectionStore, ProfileStore, SessionStatus};
    use crate::test_support::{OTHER_TOKEN, TestApp, USER_ID, USER_TOKEN};
    use axum::http::{Method, StatusCode};
    use chrono::Utc;
    use serde_json::json;

    async fn seed_session(app: &TestApp, status: SessionStatus) {
        app.store.ensure_profile(USER_ID, None).await.unwrap();
        let now = Utc::now();
        app.store
            .create_direction_session(&DirectionSessionRecord {
                id: "session-1".into(),
                user_id: USER_ID.into(),
                brand_name: "Acme".into(),
                brand_description: None,
                phase: 5,
                status,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn render_spends_a_credit() {
        let app = TestApp::new().await;
        seed_session(&app, SessionStatus::Complete).await;
        app.store.add_overage_credits(USER_ID, 2, "seed").await.unwrap();

        let (status, body) = app
            .call_json(Method::POST, "/v1/videos", Some(USER_TOKEN), Some(json!({"session_id": "session-1"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        assert_eq!(body["from_overage"], 1);

        let (_, credits) = app.call_json(Method::GET, "/v1/credits", Some(USER_TOKEN), None).await;
        assert_eq!(credits["total"], 1);
        let (_, videos) = app.call_json(Method::GET, "/v1/videos", Some(USER_TOKEN), None).await;
        assert_eq!(videos.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_balance_is_payment_required() {
        let app = TestApp::new().await;
        seed_session(&app, SessionStatus::Complete).await;
        let (status, _) = app
            .call(Method::POST, "/v1/videos", Some(USER_TOKEN), Some(json!({"session_id": "session-1"})))
            .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn unfinished_or_foreign_sessions_are_refused() {
        let app = TestApp::new().await;
        seed_session(&app, SessionStatus::Active).await;
        let (status, _) = app
            .call(Method::POST, "/v1/videos", Some(USER_TOKEN), Some(json!({"session_id": "session-1"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(Method::POST, "/v1/videos", Some(OTHER_TOKEN), Some(json!({"session_id": "session-1"})))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
