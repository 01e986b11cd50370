use std::{collections::HashMap, sync::Arc};

use tokio::sync::{watch, Mutex};

use crate::{
    bookings::{self, Actor, Booking},
    chat::ServerEvent,
    notifications,
};

use super::{poll_until_settled, store, AttemptState, PaymentContext, PollOutcome};

/// Confirmation loops currently running, keyed by booking id. At most one per booking.
#[derive(Clone, Default)]
pub struct Confirmations {
    active: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl Confirmations {
    /// Reserves the booking for a new loop; `None` if one is already running.
    pub async fn claim(&self, booking_id: &str) -> Option<watch::Receiver<bool>> {
        let mut active = self.active.lock().await;
        if active.contains_key(booking_id) {
            return None;
        }
        let (tx, rx) = watch::channel(false);
        active.insert(booking_id.to_owned(), tx);
        Some(rx)
    }

    pub async fn release(&self, booking_id: &str) {
        self.active.lock().await.remove(booking_id);
    }

    /// Stops scheduling further polls for the booking. Returns whether a loop was running.
    pub async fn cancel(&self, booking_id: &str) -> bool {
        match self.active.lock().await.get(booking_id) {
            Some(tx) => {
                tx.send_replace(true);
                true
            }
            None => false,
        }
    }

    pub async fn is_active(&self, booking_id: &str) -> bool {
        self.active.lock().await.contains_key(booking_id)
    }
}

/// Polls the gateway for `reference` and drives `booking` to its payment outcome.
///
/// Declines and timeouts both fail the booking but are recorded and reported
/// differently. A transport error or a cancellation leaves the booking as it is.
/// Returns the state the attempt was recorded with.
pub async fn confirm(
    ctx: PaymentContext,
    booking: Booking,
    attempt_id: String,
    reference: String,
    mut cancel: watch::Receiver<bool>,
) -> AttemptState {
    let outcome = match poll_until_settled(ctx.gateway.as_ref(), &reference, &ctx.policy, &mut cancel).await {
        Ok(PollOutcome::Confirmed) => AttemptState::Confirmed,
        Ok(PollOutcome::Declined) => AttemptState::Declined,
        Ok(PollOutcome::TimedOut) => AttemptState::TimedOut,
        Ok(PollOutcome::Cancelled) => AttemptState::Cancelled,
        Err(e) => {
            tracing::warn!(booking_id = %booking.id, %reference, error = %e, "booking left untouched");
            AttemptState::Error
        }
    };

    let state = settle(&ctx, &booking, &attempt_id, outcome).await;
    ctx.confirmations.release(&booking.id).await;
    state
}

/// Applies a payment outcome to the booking, the attempt record and the customer's view.
///
/// Money that arrives for a booking that has meanwhile been closed is recorded
/// as [`AttemptState::RefundDue`] and both parties are told.
pub(crate) async fn settle(ctx: &PaymentContext, booking: &Booking, attempt_id: &str, outcome: AttemptState) -> AttemptState {
    let mut state = outcome;
    if let Some(next) = outcome.booking_status() {
        if let Err(e) = bookings::store::transition(&ctx.db_pool, &booking.id, Actor::Payment, next).await {
            tracing::warn!(
                booking_id = %booking.id, %outcome, error = %e,
                "payment outcome could not be applied to the booking"
            );
            if outcome == AttemptState::Confirmed {
                state = AttemptState::RefundDue;
            }
        }
    }

    if let Err(e) = store::finish(&ctx.db_pool, attempt_id, state).await {
        tracing::warn!(booking_id = %booking.id, %attempt_id, error = %e, "could not record payment outcome");
    }

    let message = state.user_message();
    ctx.hub.to_user(&booking.customer_id, ServerEvent::PaymentStatus {
        booking_id: booking.id.clone(),
        state,
        message: message.to_owned(),
    });

    match state {
        AttemptState::Cancelled | AttemptState::Initiated => {}
        AttemptState::Confirmed => {
            notifications::notify(&ctx.db_pool, &ctx.hub, &booking.customer_id, "payment", message).await;
            let body = format!("New paid booking for {} on {}", booking.service_name, booking.delivery_date);
            notifications::notify(&ctx.db_pool, &ctx.hub, &booking.provider_id, "booking", &body).await;
        }
        AttemptState::RefundDue => {
            let body = format!(
                "Payment of {} for {} arrived after the booking was closed; a refund is due",
                booking.amount, booking.service_name,
            );
            notifications::notify(&ctx.db_pool, &ctx.hub, &booking.customer_id, "refund", &body).await;
            notifications::notify(&ctx.db_pool, &ctx.hub, &booking.provider_id, "refund", &body).await;
        }
        AttemptState::Declined | AttemptState::TimedOut | AttemptState::Error => {
            notifications::notify(&ctx.db_pool, &ctx.hub, &booking.customer_id, "payment", message).await;
        }
    }
    state
}
