use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{db::now_millis, AppResult};

use super::{AttemptState, PaymentError};

/// One push-payment try for a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    pub id: String,
    pub booking_id: String,
    pub reference: Option<String>,
    pub phone: String,
    pub amount: i64,
    pub state: AttemptState,
    pub message: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(FromRow)]
struct AttemptRow {
    id: String,
    booking_id: String,
    reference: Option<String>,
    phone: String,
    amount: i64,
    state: String,
    message: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<AttemptRow> for PaymentAttempt {
    type Error = PaymentError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(PaymentAttempt {
            state: row.state.parse()?,
            id: row.id,
            booking_id: row.booking_id,
            reference: row.reference,
            phone: row.phone,
            amount: row.amount,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn insert(db_pool: &SqlitePool, booking_id: &str, phone: &str, amount: i64) -> AppResult<PaymentAttempt> {
    let now = now_millis();
    let attempt = PaymentAttempt {
        id: Uuid::now_v7().to_string(),
        booking_id: booking_id.to_owned(),
        reference: None,
        phone: phone.to_owned(),
        amount,
        state: AttemptState::Initiated,
        message: AttemptState::Initiated.user_message().to_owned(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query("INSERT INTO payment_attempts (id,booking_id,reference,phone,amount,state,message,created_at,updated_at) VALUES (?,?,?,?,?,?,?,?,?)")
        .bind(&attempt.id)
        .bind(&attempt.booking_id)
        .bind(&attempt.reference)
        .bind(&attempt.phone)
        .bind(attempt.amount)
        .bind(attempt.state.as_str())
        .bind(&attempt.message)
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .execute(db_pool)
        .await?;

    Ok(attempt)
}

pub async fn set_reference(db_pool: &SqlitePool, id: &str, reference: &str) -> AppResult<()> {
    sqlx::query("UPDATE payment_attempts SET reference=?, updated_at=? WHERE id=?")
        .bind(reference)
        .bind(now_millis())
        .bind(id)
        .execute(db_pool)
        .await?;
    Ok(())
}

pub async fn finish(db_pool: &SqlitePool, id: &str, state: AttemptState) -> AppResult<()> {
    sqlx::query("UPDATE payment_attempts SET state=?, message=?, updated_at=? WHERE id=?")
        .bind(state.as_str())
        .bind(state.user_message())
        .bind(now_millis())
        .bind(id)
        .execute(db_pool)
        .await?;
    Ok(())
}

pub async fn latest(db_pool: &SqlitePool, booking_id: &str) -> AppResult<Option<PaymentAttempt>> {
    let row: Option<AttemptRow> = sqlx::query_as(
        "SELECT id,booking_id,reference,phone,amount,state,message,created_at,updated_at
         FROM payment_attempts WHERE booking_id=? ORDER BY created_at DESC, id DESC LIMIT 1",
    )
    .bind(booking_id)
    .fetch_optional(db_pool)
    .await?;

    Ok(row.map(PaymentAttempt::try_from).transpose()?)
}
