use axum::{debug_handler, extract::{Path, State}, Json};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    bookings::{self, Actor, Booking, BookingError, BookingStatus, NewBooking, PaymentMethod},
    notifications, services, AppResult,
};

use super::{settle, store, AttemptState, PaymentAttempt, PaymentContext, PaymentError, PushRequest};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub service_id: String,
    pub amount: i64,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: String,
    pub city: String,
    pub delivery_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub booking: Booking,
    pub reference: Option<String>,
    pub message: String,
}

/// A submitted checkout. For mobile money `confirmation` resolves once the
/// payment settles; dropping it leaves the loop running.
pub struct Checkout {
    pub booking: Booking,
    pub reference: Option<String>,
    pub confirmation: Option<JoinHandle<AttemptState>>,
}

/// Normalizes a Kenyan mobile number to the `2547XXXXXXXX` form the gateway expects.
pub fn normalize_phone(raw: &str) -> Result<String, PaymentError> {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    let digits = digits.strip_prefix('+').unwrap_or(&digits);

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentError::Validation(format!("invalid phone number {raw:?}")));
    }

    let local = if let Some(rest) = digits.strip_prefix("254") {
        rest
    } else if let Some(rest) = digits.strip_prefix('0') {
        rest
    } else {
        digits
    };

    if local.len() != 9 || !(local.starts_with('7') || local.starts_with('1')) {
        return Err(PaymentError::Validation(format!("invalid phone number {raw:?}")));
    }
    Ok(format!("254{local}"))
}

fn required(field: &str, value: &str) -> Result<(), BookingError> {
    if value.trim().is_empty() {
        return Err(BookingError::Validation(format!("{field} is required")));
    }
    Ok(())
}

/// Places a booking and, for mobile money, starts the push payment.
///
/// Every local check (required fields, amount against the service price, phone
/// number) runs before the booking is written or the gateway is called.
pub async fn checkout(ctx: &PaymentContext, request: CheckoutRequest) -> AppResult<Checkout> {
    required("customer_id", &request.customer_id)?;
    required("address", &request.address)?;
    required("city", &request.city)?;
    required("delivery_date", &request.delivery_date)?;

    let service = services::store::fetch(&ctx.db_pool, &request.service_id).await?;
    if service.provider_id == request.customer_id {
        return Err(BookingError::Validation("providers cannot book their own service".to_owned()))?;
    }
    if request.amount != service.price {
        return Err(PaymentError::AmountMismatch { expected: service.price, got: request.amount })?;
    }
    let phone = match request.payment_method {
        PaymentMethod::MobileMoney => Some(normalize_phone(request.phone.as_deref().unwrap_or_default())?),
        PaymentMethod::Cash => None,
    };

    let booking = bookings::store::insert(&ctx.db_pool, NewBooking {
        customer_id: request.customer_id,
        provider_id: service.provider_id.clone(),
        service_id: service.id.clone(),
        service_name: service.name.clone(),
        category: service.category.clone(),
        amount: service.price,
        address: request.address,
        city: request.city,
        delivery_date: request.delivery_date,
        payment_method: request.payment_method,
    }).await?;

    let Some(phone) = phone else {
        let body = format!("New cash booking for {} on {}", booking.service_name, booking.delivery_date);
        notifications::notify(&ctx.db_pool, &ctx.hub, &booking.provider_id, "booking", &body).await;
        return Ok(Checkout { booking, reference: None, confirmation: None });
    };

    let Some(cancel) = ctx.confirmations.claim(&booking.id).await else {
        return Err(PaymentError::AlreadyPolling(booking.id))?;
    };
    start_push(ctx, booking, &phone, cancel).await
}

/// Picks up the payment of a `Pending` mobile-money booking whose confirmation
/// loop is no longer running.
///
/// A push the gateway already accepted is polled again under its reference.
/// A push that never got a reference is sent again to the same phone.
pub async fn resume(ctx: &PaymentContext, booking_id: &str) -> AppResult<Checkout> {
    let booking = bookings::store::fetch(&ctx.db_pool, booking_id).await?;
    if booking.payment_method != PaymentMethod::MobileMoney || booking.status != BookingStatus::Pending {
        return Err(PaymentError::Validation(format!(
            "booking {booking_id} is a {} booking in {} and has no payment to resume",
            booking.payment_method, booking.status,
        )))?;
    }

    let Some(cancel) = ctx.confirmations.claim(&booking.id).await else {
        return Err(PaymentError::AlreadyPolling(booking.id))?;
    };
    let previous = match store::latest(&ctx.db_pool, &booking.id).await {
        Ok(Some(previous)) => previous,
        Ok(None) => {
            ctx.confirmations.release(&booking.id).await;
            return Err(PaymentError::Validation(format!("no payment was started for booking {booking_id}")))?;
        }
        Err(e) => {
            ctx.confirmations.release(&booking.id).await;
            return Err(e);
        }
    };

    let Some(reference) = previous.reference else {
        tracing::info!(booking_id = %booking.id, "push payment sent again");
        return start_push(ctx, booking, &previous.phone, cancel).await;
    };
    let attempt_id = match repoll(ctx, &booking, &previous.phone, &reference).await {
        Ok(attempt_id) => attempt_id,
        Err(e) => {
            ctx.confirmations.release(&booking.id).await;
            return Err(e);
        }
    };
    tracing::info!(booking_id = %booking.id, %reference, "payment confirmation resumed");
    Ok(follow(ctx, booking, attempt_id, reference, cancel))
}

/// Records a new attempt that polls an existing gateway reference.
async fn repoll(ctx: &PaymentContext, booking: &Booking, phone: &str, reference: &str) -> AppResult<String> {
    let attempt = store::insert(&ctx.db_pool, &booking.id, phone, booking.amount).await?;
    store::set_reference(&ctx.db_pool, &attempt.id, reference).await?;
    Ok(attempt.id)
}

/// Sends the push request and starts the confirmation loop. The booking's claim
/// is released when no loop gets started.
async fn start_push(ctx: &PaymentContext, booking: Booking, phone: &str, cancel: watch::Receiver<bool>) -> AppResult<Checkout> {
    match push(ctx, &booking, phone).await {
        Ok((attempt_id, reference)) => Ok(follow(ctx, booking, attempt_id, reference, cancel)),
        Err(e) => {
            ctx.confirmations.release(&booking.id).await;
            Err(e)
        }
    }
}

async fn push(ctx: &PaymentContext, booking: &Booking, phone: &str) -> AppResult<(String, String)> {
    let attempt = store::insert(&ctx.db_pool, &booking.id, phone, booking.amount).await?;

    let request = PushRequest {
        amount: booking.amount,
        phone: phone.to_owned(),
        reference: booking.id.clone(),
        description: booking.service_name.clone(),
    };
    let reference = match ctx.gateway.initiate(&request).await {
        Ok(Some(reference)) => reference,
        failed => {
            let err = match failed {
                Err(e) => PaymentError::Gateway(e),
                Ok(_) => PaymentError::MissingReference,
            };
            tracing::warn!(booking_id = %booking.id, error = %err, "push payment was not started");

            if let Err(e) = bookings::store::transition(&ctx.db_pool, &booking.id, Actor::Payment, BookingStatus::PaymentFailed).await {
                tracing::error!(booking_id = %booking.id, error = %e, "could not fail booking");
            }
            store::finish(&ctx.db_pool, &attempt.id, AttemptState::Error).await?;
            return Err(err)?;
        }
    };
    store::set_reference(&ctx.db_pool, &attempt.id, &reference).await?;
    tracing::info!(booking_id = %booking.id, %reference, "push payment started");
    Ok((attempt.id, reference))
}

fn follow(ctx: &PaymentContext, booking: Booking, attempt_id: String, reference: String, cancel: watch::Receiver<bool>) -> Checkout {
    let confirmation = tokio::spawn(settle::confirm(
        ctx.clone(),
        booking.clone(),
        attempt_id,
        reference.clone(),
        cancel,
    ));
    Checkout { booking, reference: Some(reference), confirmation: Some(confirmation) }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn start(
    State(ctx): State<PaymentContext>,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    let Checkout { booking, reference, .. } = checkout(&ctx, request).await?;

    let message = match reference {
        Some(_) => AttemptState::Initiated.user_message(),
        None => "Booking placed. Pay the provider in cash when the work is done.",
    };
    Ok(Json(CheckoutResponse { booking, reference, message: message.to_owned() }))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn latest(
    State(ctx): State<PaymentContext>,
    Path(booking_id): Path<String>,
) -> AppResult<Json<PaymentAttempt>> {
    store::latest(&ctx.db_pool, &booking_id)
        .await?
        .map(Json)
        .ok_or_else(|| BookingError::NotFound(format!("payment for booking {booking_id}")).into())
}

/// Restarts payment confirmation for a booking, e.g. after the server restarted mid-poll.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn restart(
    State(ctx): State<PaymentContext>,
    Path(booking_id): Path<String>,
) -> AppResult<Json<CheckoutResponse>> {
    let Checkout { booking, reference, .. } = resume(&ctx, &booking_id).await?;
    let message = AttemptState::Initiated.user_message().to_owned();
    Ok(Json(CheckoutResponse { booking, reference, message }))
}

#[derive(Debug, Serialize)]
pub(crate) struct Stopped {
    stopped: bool,
}

/// Stops scheduling status polls for a booking, e.g. when the customer leaves the page.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn stop(
    State(ctx): State<PaymentContext>,
    Path(booking_id): Path<String>,
) -> AppResult<Json<Stopped>> {
    let stopped = ctx.confirmations.cancel(&booking_id).await;
    tracing::debug!(%booking_id, stopped, "payment polling stop requested");
    Ok(Json(Stopped { stopped }))
}
