use std::future::Future;

use crate::entities::dao::{SubscriptionRecord, parse_timestamp};
use crate::entities::AnyStore;

pub trait SubscriptionStore: Send + Sync + 'static {
    /// Insert or refresh a subscription keyed by its provider id.
    fn upsert_subscription(&self, record: &SubscriptionRecord) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn get_subscription_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> impl Future<Output = Result<Option<SubscriptionRecord>, sqlx::Error>> + Send;
    /// The user's live subscription if any, otherwise the most recent one.
    fn current_subscription(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<SubscriptionRecord>, sqlx::Error>> + Send;
}

type SubscriptionRow = (
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    i64,
    String,
    String,
);

const COLUMNS: &str = "id, user_id, stripe_subscription_id, stripe_customer_id, plan, status, \
                       current_period_end, cancel_at_period_end, created_at, updated_at";

fn from_row(row: SubscriptionRow) -> SubscriptionRecord {
    let (
        id,
        user_id,
        stripe_subscription_id,
        stripe_customer_id,
        plan,
        status,
        current_period_end,
        cancel_at_period_end,
        created_at,
        updated_at,
    ) = row;
    SubscriptionRecord {
        id,
        user_id,
        stripe_subscription_id,
        stripe_customer_id,
        plan,
        status,
        current_period_end: current_period_end.as_deref().map(parse_timestamp),
        cancel_at_period_end: cancel_at_period_end != 0,
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    }
}

impl SubscriptionStore for AnyStore {
    async fn upsert_subscription(&self, record: &SubscriptionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO subscriptions (id, user_id, stripe_subscription_id, stripe_customer_id, plan, status, \
                                        current_period_end, cancel_at_period_end, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT (stripe_subscription_id) DO UPDATE SET \
                 stripe_customer_id = excluded.stripe_customer_id, \
                 plan = excluded.plan, \
                 status = excluded.status, \
                 current_period_end = excluded.current_period_end, \
                 cancel_at_period_end = excluded.cancel_at_period_end, \
                 updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.stripe_subscription_id)
        .bind(record.stripe_customer_id.as_deref())
        .bind(&record.plan)
        .bind(&record.status)
        .bind(record.current_period_end.map(|t| t.to_rfc3339()))
        .bind(i64::from(record.cancel_at_period_end))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_subscription_by_stripe_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<SubscriptionRecord>, sqlx::Error> {
        let row: Option<SubscriptionRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM subscriptions WHERE stripe_subscription_id = ?1"))
                .bind(stripe_subscription_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(from_row))
    }

    async fn current_subscription(&self, user_id: &str) -> Result<Option<SubscriptionRecord>, sqlx::Error> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM subscriptions WHERE user_id = ?1 \
             ORDER BY CASE WHEN status IN ('active', 'trialing', 'past_due') THEN 0 ELSE 1 END, \
                      updated_at DESC \
             LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }
}
