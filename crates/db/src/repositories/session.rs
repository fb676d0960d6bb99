use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;

use innkeep_core::domain::room::RoomId;
use innkeep_core::domain::session::{ConversationId, Session, SessionState, Slots, StayDate};

use super::{RepositoryError, SessionStore};
use crate::DbPool;

pub struct SqlSessionStore {
    pool: DbPool,
}

impl SqlSessionStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str =
    "SELECT conversation_id, state, check_in, check_out, guests, room_type, created_at FROM session";

const UPSERT: &str = "INSERT INTO session (conversation_id, state, check_in, check_out, guests,
                                           room_type, created_at, updated_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, ?)
     ON CONFLICT(conversation_id) DO UPDATE SET
         state = excluded.state,
         check_in = excluded.check_in,
         check_out = excluded.check_out,
         guests = excluded.guests,
         room_type = excluded.room_type,
         updated_at = excluded.updated_at";

fn decode_err(error: impl ToString) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| decode_err(format!("invalid timestamp `{value}`: {error}")))
}

fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> Result<Session, RepositoryError> {
    let conversation_id: String = row.try_get("conversation_id").map_err(decode_err)?;
    let state_str: String = row.try_get("state").map_err(decode_err)?;
    let check_in: Option<String> = row.try_get("check_in").map_err(decode_err)?;
    let check_out: Option<String> = row.try_get("check_out").map_err(decode_err)?;
    let guests: Option<i64> = row.try_get("guests").map_err(decode_err)?;
    let room_type: Option<String> = row.try_get("room_type").map_err(decode_err)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_err)?;

    let state = SessionState::parse(&state_str)
        .ok_or_else(|| decode_err(format!("unknown session state `{state_str}`")))?;
    let guests = guests
        .map(|value| {
            u32::try_from(value).map_err(|_| decode_err(format!("invalid guest count {value}")))
        })
        .transpose()?;

    Ok(Session {
        conversation_id: ConversationId(conversation_id),
        state,
        slots: Slots {
            check_in: check_in.as_deref().map(StayDate::from_text),
            check_out: check_out.as_deref().map(StayDate::from_text),
            guests,
            room_type: room_type.map(RoomId),
        },
        created_at: parse_timestamp(&created_at_str)?,
    })
}

async fn upsert<'e, E>(executor: E, session: &Session) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(UPSERT)
        .bind(&session.conversation_id.0)
        .bind(session.state.as_str())
        .bind(session.slots.check_in.as_ref().map(ToString::to_string))
        .bind(session.slots.check_out.as_ref().map(ToString::to_string))
        .bind(session.slots.guests.map(i64::from))
        .bind(session.slots.room_type.as_ref().map(|room| room.0.clone()))
        .bind(session.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait::async_trait]
impl SessionStore for SqlSessionStore {
    async fn load_all(&self) -> Result<HashMap<ConversationId, Session>, RepositoryError> {
        let rows = sqlx::query(SELECT_COLUMNS).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row_to_session(row).map(|session| (session.conversation_id.clone(), session)))
            .collect()
    }

    async fn save_all(
        &self,
        sessions: &HashMap<ConversationId, Session>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM session").execute(&mut *tx).await?;
        for session in sessions.values() {
            upsert(&mut *tx, session).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: &ConversationId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE conversation_id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_session(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        upsert(&self.pool, session).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;

    use innkeep_core::domain::room::RoomId;
    use innkeep_core::domain::session::{ConversationId, Session, SessionState, StayDate};

    use super::SqlSessionStore;
    use crate::repositories::SessionStore;
    use crate::{connect_with_settings, migrations};

    async fn store() -> SqlSessionStore {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlSessionStore::new(pool)
    }

    fn quoted_session(phone: &str) -> Session {
        let mut session = Session::new(ConversationId(phone.to_string()), Utc::now());
        session.state = SessionState::QuoteReady;
        session.slots.check_in = Some(StayDate::from_text("2024-01-10"));
        session.slots.check_out = Some(StayDate::from_text("next friday"));
        session.slots.guests = Some(2);
        session.slots.room_type = Some(RoomId("deluxe".to_string()));
        session
    }

    #[tokio::test]
    async fn save_and_find_round_trip_preserves_slots() {
        let store = store().await;
        let session = quoted_session("+4915100000");

        store.save(&session).await.expect("save");
        let found = store.find(&session.conversation_id).await.expect("find");

        assert_eq!(found, Some(session));
    }

    #[tokio::test]
    async fn save_updates_existing_record_in_place() {
        let store = store().await;
        let mut session = Session::new(ConversationId("+4915100001".to_string()), Utc::now());
        store.save(&session).await.expect("first save");

        session.state = SessionState::CollectingCheckout;
        session.slots.check_in = Some(StayDate::from_text("2024-03-01"));
        store.save(&session).await.expect("second save");

        let all = store.load_all().await.expect("load all");
        assert_eq!(all.len(), 1);
        assert_eq!(all.get(&session.conversation_id), Some(&session));
    }

    #[tokio::test]
    async fn save_all_then_load_all_yields_identical_set() {
        let store = store().await;
        store.save(&quoted_session("+stale")).await.expect("seed");

        let mut sessions = HashMap::new();
        for phone in ["+4915100002", "+4915100003"] {
            let session = quoted_session(phone);
            sessions.insert(session.conversation_id.clone(), session);
        }
        store.save_all(&sessions).await.expect("save all");

        assert_eq!(store.load_all().await.expect("load all"), sessions);
    }

    #[tokio::test]
    async fn missing_session_is_none() {
        let store = store().await;
        let found = store.find(&ConversationId("+nobody".to_string())).await.expect("find");
        assert_eq!(found, None);
    }
}
