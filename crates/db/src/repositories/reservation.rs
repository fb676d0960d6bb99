use std::collections::HashMap;

use sqlx::Row;

use innkeep_core::domain::reservation::{PaymentStatus, Reservation, ReservationId, UpsellLine};
use innkeep_core::domain::room::RoomId;
use innkeep_core::domain::session::{ConversationId, StayDate};

use super::session::parse_timestamp;
use super::{RepositoryError, ReservationStore};
use crate::DbPool;

pub struct SqlReservationStore {
    pool: DbPool,
}

impl SqlReservationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_COLUMNS: &str = "SELECT id, phone, room_type, check_in, check_out, nights, price_cents,
            total_cents, upsells_json, payment_status, payment_session_id, created_at
     FROM reservation";

fn decode_err(error: impl ToString) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

fn row_to_reservation(row: &sqlx::sqlite::SqliteRow) -> Result<Reservation, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode_err)?;
    let phone: String = row.try_get("phone").map_err(decode_err)?;
    let room_type: String = row.try_get("room_type").map_err(decode_err)?;
    let check_in: String = row.try_get("check_in").map_err(decode_err)?;
    let check_out: String = row.try_get("check_out").map_err(decode_err)?;
    let nights: i64 = row.try_get("nights").map_err(decode_err)?;
    let price_cents: i64 = row.try_get("price_cents").map_err(decode_err)?;
    let total_cents: i64 = row.try_get("total_cents").map_err(decode_err)?;
    let upsells_json: String = row.try_get("upsells_json").map_err(decode_err)?;
    let status_str: String = row.try_get("payment_status").map_err(decode_err)?;
    let payment_session_id: Option<String> =
        row.try_get("payment_session_id").map_err(decode_err)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode_err)?;

    let payment_status = PaymentStatus::parse(&status_str)
        .ok_or_else(|| decode_err(format!("unknown payment status `{status_str}`")))?;
    let upsells: Vec<UpsellLine> = serde_json::from_str(&upsells_json)
        .map_err(|error| decode_err(format!("invalid upsells for reservation `{id}`: {error}")))?;
    let nights =
        u32::try_from(nights).map_err(|_| decode_err(format!("invalid night count {nights}")))?;

    Ok(Reservation {
        id: ReservationId(id),
        phone: ConversationId(phone),
        room_type: RoomId(room_type),
        check_in: StayDate::from_text(&check_in),
        check_out: StayDate::from_text(&check_out),
        nights,
        price_cents,
        total_cents,
        upsells,
        payment_status,
        payment_session_id,
        created_at: parse_timestamp(&created_at_str)?,
    })
}

async fn upsert<'e, E>(executor: E, reservation: &Reservation) -> Result<(), RepositoryError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let upsells_json = serde_json::to_string(&reservation.upsells)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    sqlx::query(
        "INSERT INTO reservation (id, phone, room_type, check_in, check_out, nights, price_cents,
                                  total_cents, upsells_json, payment_status, payment_session_id,
                                  created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
             nights = excluded.nights,
             price_cents = excluded.price_cents,
             total_cents = excluded.total_cents,
             upsells_json = excluded.upsells_json,
             payment_status = excluded.payment_status,
             payment_session_id = excluded.payment_session_id",
    )
    .bind(&reservation.id.0)
    .bind(&reservation.phone.0)
    .bind(&reservation.room_type.0)
    .bind(reservation.check_in.to_string())
    .bind(reservation.check_out.to_string())
    .bind(i64::from(reservation.nights))
    .bind(reservation.price_cents)
    .bind(reservation.total_cents)
    .bind(upsells_json)
    .bind(reservation.payment_status.as_str())
    .bind(&reservation.payment_session_id)
    .bind(reservation.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

#[async_trait::async_trait]
impl ReservationStore for SqlReservationStore {
    async fn load_all(&self) -> Result<HashMap<ReservationId, Reservation>, RepositoryError> {
        let rows = sqlx::query(SELECT_COLUMNS).fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row_to_reservation(row).map(|reservation| (reservation.id.clone(), reservation)))
            .collect()
    }

    async fn save_all(
        &self,
        reservations: &HashMap<ReservationId, Reservation>,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM reservation").execute(&mut *tx).await?;
        for reservation in reservations.values() {
            upsert(&mut *tx, reservation).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, id: &ReservationId) -> Result<Option<Reservation>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_reservation(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, reservation: &Reservation) -> Result<(), RepositoryError> {
        upsert(&self.pool, reservation).await
    }
}
