use axum::{debug_handler, extract::{Path, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{chat::Hub, notifications, payments::Confirmations, AppResult};

use super::{store, Actor, Booking, BookingError, BookingStatus};

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdate {
    actor: Actor,
    actor_id: String,
    status: BookingStatus,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_status(
    State(db_pool): State<SqlitePool>,
    State(hub): State<Hub>,
    State(confirmations): State<Confirmations>,
    Path(id): Path<String>,
    Json(StatusUpdate { actor, actor_id, status }): Json<StatusUpdate>,
) -> AppResult<Json<Booking>> {
    let booking = store::fetch(&db_pool, &id).await?;

    let (party, other) = match actor {
        Actor::Provider => (&booking.provider_id, &booking.customer_id),
        Actor::Customer => (&booking.customer_id, &booking.provider_id),
        // only the confirmation poller settles payments
        Actor::Payment => {
            return Err(BookingError::NotAllowed { actor, from: booking.status, to: status })?;
        }
    };
    if *party != actor_id {
        return Err(BookingError::NotAllowed { actor, from: booking.status, to: status })?;
    }
    let other = other.clone();

    let refund_due = booking.paid && status == BookingStatus::Cancelled;
    let updated = store::transition(&db_pool, &id, actor, status).await?;
    if updated.status.is_terminal() && confirmations.cancel(&id).await {
        tracing::debug!(booking_id = %id, status = %updated.status, "confirmation loop stopped");
    }

    let mut body = format!("Booking for {} is now {}", updated.service_name, updated.status);
    if refund_due {
        body.push_str(&format!("; a refund of {} is due", updated.amount));
    }
    notifications::notify(&db_pool, &hub, &other, "booking_status", &body).await;

    Ok(Json(updated))
}
