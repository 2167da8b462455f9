use std::future::Future;

use chrono::Utc;
use logoreel_core::direction::{ChoiceOption, Message, Phase, Role};
use uuid::Uuid;

use crate::entities::dao::{DirectionMessageRecord, DirectionSessionRecord, SessionStatus, parse_timestamp};
use crate::entities::AnyStore;

pub trait DirectionStore: Send + Sync + 'static {
    fn create_direction_session(
        &self,
        session: &DirectionSessionRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn get_direction_session(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<DirectionSessionRecord>, sqlx::Error>> + Send;
    fn list_direction_sessions(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<DirectionSessionRecord>, sqlx::Error>> + Send;
    fn list_direction_messages(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Vec<DirectionMessageRecord>, sqlx::Error>> + Send;

    /// Append a completed turn and move the session forward, atomically.
    ///
    /// The write only applies while the session is still active at
    /// `started_from`, the phase the turn was generated against. Returns
    /// `false` when another turn got there first.
    fn record_direction_turn(
        &self,
        session_id: &str,
        started_from: Phase,
        messages: &[Message],
        phase: Phase,
        status: SessionStatus,
    ) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
}

impl DirectionMessageRecord {
    pub fn to_message(&self) -> Message {
        let options = self
            .options_json
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<ChoiceOption>>(raw).ok());
        Message {
            role: self.role.parse().unwrap_or(Role::Assistant),
            content: self.content.clone(),
            options,
            is_clarification: self.is_clarification,
            timestamp: Some(self.created_at),
        }
    }
}

type SessionRow = (String, String, String, Option<String>, i64, String, String, String);

const SESSION_COLUMNS: &str =
    "id, user_id, brand_name, brand_description, phase, status, created_at, updated_at";

fn session_from_row(row: SessionRow) -> DirectionSessionRecord {
    let (id, user_id, brand_name, brand_description, phase, status, created_at, updated_at) = row;
    DirectionSessionRecord {
        id,
        user_id,
        brand_name,
        brand_description,
        phase: u8::try_from(phase).unwrap_or(1),
        status: status.parse().unwrap_or(SessionStatus::Active),
        created_at: parse_timestamp(&created_at),
        updated_at: parse_timestamp(&updated_at),
    }
}

impl DirectionStore for AnyStore {
    async fn create_direction_session(&self, session: &DirectionSessionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO direction_sessions (id, user_id, brand_name, brand_description, phase, status, \
                                             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(&session.brand_name)
        .bind(session.brand_description.as_deref())
        .bind(i64::from(session.phase))
        .bind(session.status.to_string())
        .bind(session.created_at.to_rfc3339())
        .bind(session.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_direction_session(&self, id: &str) -> Result<Option<DirectionSessionRecord>, sqlx::Error> {
        let row: Option<SessionRow> =
            sqlx::query_as(&format!("SELECT {SESSION_COLUMNS} FROM direction_sessions WHERE id = ?1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(session_from_row))
    }

    async fn list_direction_sessions(&self, user_id: &str) -> Result<Vec<DirectionSessionRecord>, sqlx::Error> {
        let rows: Vec<SessionRow> = sqlx::query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM direction_sessions WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(session_from_row).collect())
    }

    async fn list_direction_messages(&self, session_id: &str) -> Result<Vec<DirectionMessageRecord>, sqlx::Error> {
        let rows: Vec<(String, String, i64, String, String, Option<String>, Option<i64>, String)> =
            sqlx::query_as(
                "SELECT id, session_id, seq, role, content, options_json, is_clarification, created_at \
                     FROM direction_messages WHERE session_id = ?1 ORDER BY seq",
            )
            .bind(session_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(
                |(id, session_id, seq, role, content, options_json, is_clarification, created_at)| {
                    DirectionMessageRecord {
                        id,
                        session_id,
                        seq,
                        role,
                        content,
                        options_json,
                        is_clarification: is_clarification.map(|v| v != 0),
                        created_at: parse_timestamp(&created_at),
                    }
                },
            )
            .collect())
    }

    async fn record_direction_turn(
        &self,
        session_id: &str,
        started_from: Phase,
        messages: &[Message],
        phase: Phase,
        status: SessionStatus,
    ) -> Result<bool, sqlx::Error> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            "UPDATE direction_sessions SET phase = ?1, status = ?2, updated_at = ?3 \
             WHERE id = ?4 AND phase = ?5 AND status = ?6",
        )
        .bind(i64::from(phase.number()))
        .bind(status.to_string())
        .bind(now.to_rfc3339())
        .bind(session_id)
        .bind(i64::from(started_from.number()))
        .bind(SessionStatus::Active.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;
        if !moved {
            tx.rollback().await?;
            return Ok(false);
        }

        let (last_seq,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(seq), 0) FROM direction_messages WHERE session_id = ?1")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await?;

        for (offset, message) in messages.iter().enumerate() {
            let options_json = message
                .options
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
            sqlx::query(
                "INSERT INTO direction_messages (id, session_id, seq, role, content, options_json, \
                                                 is_clarification, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(session_id)
            .bind(last_seq + 1 + offset as i64)
            .bind(message.role.to_string())
            .bind(&message.content)
            .bind(options_json)
            .bind(message.is_clarification.map(i64::from))
            .bind(message.timestamp.unwrap_or(now).to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{ProfileStore, memory_store};

    fn session(id: &str) -> DirectionSessionRecord {
        let now = Utc::now();
        DirectionSessionRecord {
            id: id.into(),
            user_id: "u1".into(),
            brand_name: "Acme".into(),
            brand_description: Some("rockets".into()),
            phase: 1,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    async fn store_with_session() -> AnyStore {
        let store = memory_store().await;
        store.ensure_profile("u1", None).await.unwrap();
        store.create_direction_session(&session("s1")).await.unwrap();
        store
    }

    fn phase(n: u8) -> Phase {
        Phase::new(n).unwrap()
    }

    #[tokio::test]
    async fn turns_append_in_order_and_advance_phase() {
        let store = store_with_session().await;
        let options = Some(vec![ChoiceOption::new('A', "Bold"), ChoiceOption::new('B', "Something else")]);
        let turn = [
            Message::user("Let's start"),
            Message::assistant("What mood?").with_options(options.clone()).with_clarification(true),
        ];
        assert!(store.record_direction_turn("s1", phase(1), &turn, phase(2), SessionStatus::Active).await.unwrap());
        let turn = [Message::user("A"), Message::assistant("Which motion?")];
        assert!(store.record_direction_turn("s1", phase(2), &turn, phase(3), SessionStatus::Active).await.unwrap());

        let messages = store.list_direction_messages("s1").await.unwrap();
        assert_eq!(messages.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        let restored = messages[1].to_message();
        assert_eq!(restored.role, Role::Assistant);
        assert_eq!(restored.options, options);
        assert_eq!(restored.is_clarification, Some(true));

        let stored = store.get_direction_session("s1").await.unwrap().unwrap();
        assert_eq!(stored.phase, 3);
    }

    #[tokio::test]
    async fn turn_that_would_regress_is_not_written() {
        let store = store_with_session().await;
        let turn = [Message::user("go"), Message::assistant("done")];
        assert!(store.record_direction_turn("s1", phase(1), &turn, Phase::GENERATION, SessionStatus::Complete).await.unwrap());
        assert!(!store.record_direction_turn("s1", phase(1), &turn, phase(2), SessionStatus::Active).await.unwrap());

        assert_eq!(store.list_direction_messages("s1").await.unwrap().len(), 2);
        let stored = store.get_direction_session("s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Complete);
    }

    #[tokio::test]
    async fn late_turn_cannot_reopen_completed_session() {
        let store = store_with_session().await;
        let turn = [Message::user("a"), Message::assistant("b")];
        for n in 1..4 {
            store.record_direction_turn("s1", phase(n), &turn, phase(n + 1), SessionStatus::Active).await.unwrap();
        }
        // A generate-now turn started from phase 4 finishes first.
        assert!(store.record_direction_turn("s1", phase(4), &turn, Phase::GENERATION, SessionStatus::Complete).await.unwrap());
        // The ordinary phase-4 turn lands afterwards.
        assert!(!store.record_direction_turn("s1", phase(4), &turn, Phase::GENERATION, SessionStatus::Active).await.unwrap());

        let stored = store.get_direction_session("s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Complete);
        assert_eq!(stored.phase, 5);
        assert_eq!(store.list_direction_messages("s1").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn second_turn_from_same_phase_is_dropped() {
        let store = store_with_session().await;
        let first = [Message::user("first"), Message::assistant("What mood?")];
        let second = [Message::user("second"), Message::assistant("What mood?")];
        assert!(store.record_direction_turn("s1", phase(1), &first, phase(2), SessionStatus::Active).await.unwrap());
        assert!(!store.record_direction_turn("s1", phase(1), &second, phase(2), SessionStatus::Active).await.unwrap());

        let messages = store.list_direction_messages("s1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "first");
    }

    #[tokio::test]
    async fn sessions_are_listed_per_user() {
        let store = store_with_session().await;
        store.ensure_profile("u2", None).await.unwrap();
        let mut other = session("s2");
        other.user_id = "u2".into();
        store.create_direction_session(&other).await.unwrap();
        let listed = store.list_direction_sessions("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "s1");
    }
}
