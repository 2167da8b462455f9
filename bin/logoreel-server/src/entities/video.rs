use std::future::Future;

use chrono::Utc;
use logoreel_core::billing::CREDITS_PER_VIDEO;
use tracing::info;
use uuid::Uuid;

use crate::entities::credits::{load_balance, record_transaction, store_balance};
use crate::entities::dao::credits::TransactionKind;
use crate::entities::dao::video::VIDEO_QUEUED;
use crate::entities::dao::{VideoRecord, parse_timestamp};
use crate::entities::AnyStore;

#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    Charged(VideoRecord),
    Insufficient { available: i64 },
}

pub trait VideoStore: Send + Sync + 'static {
    /// Draw the render cost and record the queued video in one transaction.
    fn create_video_with_charge(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> impl Future<Output = Result<ChargeOutcome, sqlx::Error>> + Send;
    fn list_videos(&self, user_id: &str) -> impl Future<Output = Result<Vec<VideoRecord>, sqlx::Error>> + Send;
}

impl VideoStore for AnyStore {
    async fn create_video_with_charge(&self, user_id: &str, session_id: &str) -> Result<ChargeOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let current = load_balance(&mut tx, user_id).await?.unwrap_or_default();
        let Ok((next, draw)) = current.draw(CREDITS_PER_VIDEO) else {
            tx.rollback().await?;
            return Ok(ChargeOutcome::Insufficient {
                available: current.total(),
            });
        };
        store_balance(&mut tx, user_id, current, next).await?;

        let video = VideoRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            session_id: session_id.to_owned(),
            status: VIDEO_QUEUED.to_owned(),
            from_subscription: draw.from_subscription,
            from_overage: draw.from_overage,
            created_at: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO videos (id, user_id, session_id, status, from_subscription, from_overage, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&video.id)
        .bind(&video.user_id)
        .bind(&video.session_id)
        .bind(&video.status)
        .bind(video.from_subscription)
        .bind(video.from_overage)
        .bind(video.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
        record_transaction(
            &mut tx,
            user_id,
            None,
            TransactionKind::VideoRender,
            -CREDITS_PER_VIDEO,
            &format!("video {}", video.id),
        )
        .await?;
        tx.commit().await?;

        info!(user_id, video_id = %video.id, total = next.total(), "video queued");
        Ok(ChargeOutcome::Charged(video))
    }

    async fn list_videos(&self, user_id: &str) -> Result<Vec<VideoRecord>, sqlx::Error> {
        let rows: Vec<(String, String, String, String, i64, i64, String)> = sqlx::query_as(
            "SELECT id, user_id, session_id, status, from_subscription, from_overage, created_at \
                 FROM videos WHERE user_id = ?1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(
                |(id, user_id, session_id, status, from_subscription, from_overage, created_at)| VideoRecord {
                    id,
                    user_id,
                    session_id,
                    status,
                    from_subscription,
                    from_overage,
                    created_at: parse_timestamp(&created_at),
                },
            )
            .collect())
    }
}
