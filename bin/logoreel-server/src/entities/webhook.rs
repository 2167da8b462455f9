use std::future::Future;

use chrono::Utc;

use crate::entities::AnyStore;

/// Processed-event ledger for payments webhooks.
///
/// An event is claimed before it is applied; a failed application releases
/// the claim so the provider's redelivery is processed again.
pub trait WebhookStore: Send + Sync + 'static {
    /// Returns `false` if the event was already claimed.
    fn claim_webhook_event(&self, id: &str, event_type: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn release_webhook_event(&self, id: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

impl WebhookStore for AnyStore {
    async fn claim_webhook_event(&self, id: &str, event_type: &str) -> Result<bool, sqlx::Error> {
        let inserted = sqlx::query(
            "INSERT INTO webhook_events (id, event_type, received_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(event_type)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted == 1)
    }

    async fn release_webhook_event(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM webhook_events WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
