use std::future::Future;

use chrono::Utc;

use crate::entities::dao::{ProfileRecord, parse_timestamp};
use crate::entities::AnyStore;

pub trait ProfileStore: Send + Sync + 'static {
    /// Create the profile and its zero balance on first sight of a user.
    ///
    /// Returns `true` when the profile was created by this call.
    fn ensure_profile(&self, id: &str, email: Option<&str>) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn get_profile(&self, id: &str) -> impl Future<Output = Result<Option<ProfileRecord>, sqlx::Error>> + Send;
    fn find_profile_by_customer(
        &self,
        customer_id: &str,
    ) -> impl Future<Output = Result<Option<ProfileRecord>, sqlx::Error>> + Send;
    fn set_stripe_customer(&self, id: &str, customer_id: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn set_role(&self, id: &str, role: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
}

type ProfileRow = (String, Option<String>, String, Option<String>, String);

fn from_row((id, email, role, stripe_customer_id, created_at): ProfileRow) -> ProfileRecord {
    ProfileRecord {
        id,
        email,
        role,
        stripe_customer_id,
        created_at: parse_timestamp(&created_at),
    }
}

impl ProfileStore for AnyStore {
    async fn ensure_profile(&self, id: &str, email: Option<&str>) -> Result<bool, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query(
            "INSERT INTO profiles (id, email, role, created_at) VALUES (?1, ?2, 'user', ?3) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(id)
        .bind(email)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;
        sqlx::query(
            "INSERT INTO credits (user_id, subscription_credits, overage_credits, updated_at) \
             VALUES (?1, 0, 0, ?2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_profile(&self, id: &str) -> Result<Option<ProfileRecord>, sqlx::Error> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT id, email, role, stripe_customer_id, created_at FROM profiles WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn find_profile_by_customer(&self, customer_id: &str) -> Result<Option<ProfileRecord>, sqlx::Error> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT id, email, role, stripe_customer_id, created_at \
                 FROM profiles WHERE stripe_customer_id = ?1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn set_stripe_customer(&self, id: &str, customer_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET stripe_customer_id = ?1 WHERE id = ?2")
            .bind(customer_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_role(&self, id: &str, role: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE profiles SET role = ?1 WHERE id = ?2")
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
