use std::future::Future;

use chrono::Utc;
use logoreel_core::billing::{CreditAdjustment, CreditBalance};
use sqlx::AnyConnection;
use tracing::info;
use uuid::Uuid;

use crate::entities::dao::credits::TransactionKind;
use crate::entities::dao::{CreditTransaction, parse_timestamp};
use crate::entities::AnyStore;

/// Result of an admin adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustmentOutcome {
    Applied(CreditBalance),
    UnknownUser,
    /// The delta would take the total below zero; nothing was written.
    InsufficientBalance { available: i64 },
}

pub trait CreditStore: Send + Sync + 'static {
    fn get_balance(&self, user_id: &str) -> impl Future<Output = Result<Option<CreditBalance>, sqlx::Error>> + Send;

    /// Apply `adjustment` and write its audit row in one transaction.
    fn adjust_credits(
        &self,
        admin_id: &str,
        adjustment: &CreditAdjustment,
    ) -> impl Future<Output = Result<AdjustmentOutcome, sqlx::Error>> + Send;

    /// Reset the subscription bucket to `amount` (a new period or plan).
    fn set_subscription_credits(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
    ) -> impl Future<Output = Result<Option<CreditBalance>, sqlx::Error>> + Send;

    /// Add purchased credits to the overage bucket.
    fn add_overage_credits(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
    ) -> impl Future<Output = Result<Option<CreditBalance>, sqlx::Error>> + Send;

    fn list_transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<CreditTransaction>, sqlx::Error>> + Send;
}

// ── transaction helpers shared with the video store ──────────────────────────

pub(crate) async fn load_balance(
    conn: &mut AnyConnection,
    user_id: &str,
) -> Result<Option<CreditBalance>, sqlx::Error> {
    let row: Option<(i64, i64)> = sqlx::query_as(
        "SELECT subscription_credits, overage_credits FROM credits WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row.map(|(subscription, overage)| CreditBalance::new(subscription, overage)))
}

/// Write `next` only if the row still holds `previous`.
pub(crate) async fn store_balance(
    conn: &mut AnyConnection,
    user_id: &str,
    previous: CreditBalance,
    next: CreditBalance,
) -> Result<(), sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE credits SET subscription_credits = ?1, overage_credits = ?2, updated_at = ?3 \
         WHERE user_id = ?4 AND subscription_credits = ?5 AND overage_credits = ?6",
    )
    .bind(next.subscription_credits)
    .bind(next.overage_credits)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id)
    .bind(previous.subscription_credits)
    .bind(previous.overage_credits)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if updated != 1 {
        return Err(sqlx::Error::Protocol(format!(
            "credit balance for {user_id} changed concurrently"
        )));
    }
    Ok(())
}

pub(crate) async fn record_transaction(
    conn: &mut AnyConnection,
    user_id: &str,
    admin_id: Option<&str>,
    kind: TransactionKind,
    delta: i64,
    reason: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO credit_transactions (id, user_id, admin_id, kind, delta, reason, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(admin_id)
    .bind(kind.to_string())
    .bind(delta)
    .bind(reason)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl CreditStore for AnyStore {
    async fn get_balance(&self, user_id: &str) -> Result<Option<CreditBalance>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        load_balance(&mut conn, user_id).await
    }

    async fn adjust_credits(
        &self,
        admin_id: &str,
        adjustment: &CreditAdjustment,
    ) -> Result<AdjustmentOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = load_balance(&mut tx, &adjustment.user_id).await? else {
            tx.rollback().await?;
            return Ok(AdjustmentOutcome::UnknownUser);
        };
        let Ok(next) = current.apply_adjustment(adjustment.delta) else {
            tx.rollback().await?;
            return Ok(AdjustmentOutcome::InsufficientBalance {
                available: current.total(),
            });
        };

        store_balance(&mut tx, &adjustment.user_id, current, next).await?;
        record_transaction(
            &mut tx,
            &adjustment.user_id,
            Some(admin_id),
            TransactionKind::AdminAdjustment,
            adjustment.delta,
            &adjustment.reason,
        )
        .await?;
        tx.commit().await?;

        info!(
            admin_id,
            user_id = %adjustment.user_id,
            delta = adjustment.delta,
            total = next.total(),
            "credits adjusted"
        );
        Ok(AdjustmentOutcome::Applied(next))
    }

    async fn set_subscription_credits(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
    ) -> Result<Option<CreditBalance>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = load_balance(&mut tx, user_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        let next = CreditBalance::new(amount.max(0), current.overage_credits);
        store_balance(&mut tx, user_id, current, next).await?;
        let delta = next.subscription_credits - current.subscription_credits;
        if delta != 0 {
            record_transaction(&mut tx, user_id, None, TransactionKind::SubscriptionGrant, delta, reason).await?;
        }
        tx.commit().await?;
        Ok(Some(next))
    }

    async fn add_overage_credits(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
    ) -> Result<Option<CreditBalance>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let Some(current) = load_balance(&mut tx, user_id).await? else {
            tx.rollback().await?;
            return Ok(None);
        };
        let next = CreditBalance::new(current.subscription_credits, current.overage_credits + amount);
        store_balance(&mut tx, user_id, current, next).await?;
        record_transaction(&mut tx, user_id, None, TransactionKind::PackPurchase, amount, reason).await?;
        tx.commit().await?;
        Ok(Some(next))
    }

    async fn list_transactions(&self, user_id: &str, limit: i64) -> Result<Vec<CreditTransaction>, sqlx::Error> {
        let rows: Vec<(String, String, Option<String>, String, i64, String, String)> = sqlx::query_as(
            "SELECT id, user_id, admin_id, kind, delta, reason, created_at \
                 FROM credit_transactions WHERE user_id = ?1 \
                 ORDER BY created_at DESC LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, user_id, admin_id, kind, delta, reason, created_at)| CreditTransaction {
                id,
                user_id,
                admin_id,
                kind,
                delta,
                reason,
                created_at: parse_timestamp(&created_at),
            })
            .collect())
    }
}
