use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{db::now_millis, AppResult};

use super::{status, Actor, BookingError, BookingStatus, PaymentMethod};

/// How many times a transition re-reads and retries after losing a version race.
const WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub customer_id: String,
    pub provider_id: String,
    pub service_id: String,
    pub service_name: String,
    pub category: String,
    pub amount: i64,
    pub address: String,
    pub city: String,
    pub delivery_date: String,
    pub payment_method: PaymentMethod,
    pub paid: bool,
    pub status: BookingStatus,
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(FromRow)]
struct BookingRow {
    id: String,
    customer_id: String,
    provider_id: String,
    service_id: String,
    service_name: String,
    category: String,
    amount: i64,
    address: String,
    city: String,
    delivery_date: String,
    payment_method: String,
    paid: bool,
    status: String,
    version: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            payment_method: row.payment_method.parse()?,
            status: row.status.parse()?,
            id: row.id,
            customer_id: row.customer_id,
            provider_id: row.provider_id,
            service_id: row.service_id,
            service_name: row.service_name,
            category: row.category,
            amount: row.amount,
            address: row.address,
            city: row.city,
            delivery_date: row.delivery_date,
            paid: row.paid,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const COLUMNS: &str = "id,customer_id,provider_id,service_id,service_name,category,amount,address,city,delivery_date,payment_method,paid,status,version,created_at,updated_at";

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub customer_id: String,
    pub provider_id: String,
    pub service_id: String,
    pub service_name: String,
    pub category: String,
    pub amount: i64,
    pub address: String,
    pub city: String,
    pub delivery_date: String,
    pub payment_method: PaymentMethod,
}

/// A provider's takings: settled work and money held for work not yet done.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Earnings {
    pub completed_jobs: i64,
    pub completed_total: i64,
    pub pending_payout: i64,
}

pub async fn insert(db_pool: &SqlitePool, new: NewBooking) -> AppResult<Booking> {
    let now = now_millis();
    let booking = Booking {
        id: Uuid::now_v7().to_string(),
        customer_id: new.customer_id,
        provider_id: new.provider_id,
        service_id: new.service_id,
        service_name: new.service_name,
        category: new.category,
        amount: new.amount,
        address: new.address,
        city: new.city,
        delivery_date: new.delivery_date,
        payment_method: new.payment_method,
        paid: false,
        status: BookingStatus::Pending,
        version: 0,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(&format!("INSERT INTO bookings ({COLUMNS}) VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)"))
        .bind(&booking.id)
        .bind(&booking.customer_id)
        .bind(&booking.provider_id)
        .bind(&booking.service_id)
        .bind(&booking.service_name)
        .bind(&booking.category)
        .bind(booking.amount)
        .bind(&booking.address)
        .bind(&booking.city)
        .bind(&booking.delivery_date)
        .bind(booking.payment_method.as_str())
        .bind(booking.paid)
        .bind(booking.status.as_str())
        .bind(booking.version)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(db_pool)
        .await?;

    tracing::info!(booking_id = %booking.id, method = %booking.payment_method, amount = booking.amount, "booking created");
    Ok(booking)
}

pub async fn get(db_pool: &SqlitePool, id: &str) -> AppResult<Option<Booking>> {
    let row: Option<BookingRow> = sqlx::query_as(&format!("SELECT {COLUMNS} FROM bookings WHERE id=?"))
        .bind(id)
        .fetch_optional(db_pool)
        .await?;

    Ok(row.map(Booking::try_from).transpose()?)
}

pub async fn fetch(db_pool: &SqlitePool, id: &str) -> AppResult<Booking> {
    get(db_pool, id)
        .await?
        .ok_or_else(|| BookingError::NotFound(format!("booking {id}")).into())
}

pub async fn list_for_customer(db_pool: &SqlitePool, customer_id: &str) -> AppResult<Vec<Booking>> {
    list_where(db_pool, "customer_id", customer_id).await
}

pub async fn list_for_provider(db_pool: &SqlitePool, provider_id: &str) -> AppResult<Vec<Booking>> {
    list_where(db_pool, "provider_id", provider_id).await
}

async fn list_where(db_pool: &SqlitePool, column: &'static str, value: &str) -> AppResult<Vec<Booking>> {
    let rows: Vec<BookingRow> =
        sqlx::query_as(&format!("SELECT {COLUMNS} FROM bookings WHERE {column}=? ORDER BY created_at DESC"))
            .bind(value)
            .fetch_all(db_pool)
            .await?;

    Ok(rows.into_iter().map(Booking::try_from).collect::<Result<Vec<_>, BookingError>>()?)
}

/// Moves a booking to `next` on behalf of `actor`.
///
/// The write is guarded by the row version, so a payment confirmation and a
/// provider edit racing on the same booking are serialized: the loser re-reads
/// the row and is validated again against the new state before it may commit.
pub async fn transition(
    db_pool: &SqlitePool,
    id: &str,
    actor: Actor,
    next: BookingStatus,
) -> AppResult<Booking> {
    for _ in 0..WRITE_ATTEMPTS {
        let mut booking = fetch(db_pool, id).await?;
        let planned = status::plan(booking.payment_method, booking.status, booking.paid, actor, next)?;
        let now = now_millis();

        let updated = sqlx::query(
            "UPDATE bookings SET status=?, paid=?, version=version+1, updated_at=? WHERE id=? AND version=?",
        )
        .bind(planned.status.as_str())
        .bind(planned.paid)
        .bind(now)
        .bind(id)
        .bind(booking.version)
        .execute(db_pool)
        .await?
        .rows_affected();

        if updated == 1 {
            tracing::info!(
                booking_id = %id, %actor, from = %booking.status, to = %planned.status, paid = planned.paid,
                "booking status changed"
            );
            booking.status = planned.status;
            booking.paid = planned.paid;
            booking.version += 1;
            booking.updated_at = now;
            return Ok(booking);
        }

        tracing::warn!(booking_id = %id, %actor, version = booking.version, "lost a booking write race, retrying");
    }

    Err(BookingError::Conflict(id.to_owned()))?
}

pub async fn earnings(db_pool: &SqlitePool, provider_id: &str) -> AppResult<Earnings> {
    Ok(
        sqlx::query_as(
            "SELECT
                COALESCE(SUM(CASE WHEN status=?2 THEN 1 ELSE 0 END), 0) AS completed_jobs,
                COALESCE(SUM(CASE WHEN status=?2 AND paid THEN amount ELSE 0 END), 0) AS completed_total,
                COALESCE(SUM(CASE WHEN status<>?2 AND paid THEN amount ELSE 0 END), 0) AS pending_payout
             FROM bookings WHERE provider_id=?1",
        )
        .bind(provider_id)
        .bind(BookingStatus::Completed.as_str())
        .fetch_one(db_pool)
        .await?
    )
}
