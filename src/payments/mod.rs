mod checkout;
pub mod gateway;
pub mod poller;
pub mod settle;
pub mod store;

use std::{fmt, str::FromStr};

use axum::{extract::FromRef, http::StatusCode, routing::{delete, get, post}, Router};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::{bookings::BookingStatus, chat::Hub, AppState};

pub use checkout::{checkout, normalize_phone, resume, Checkout, CheckoutRequest, CheckoutResponse};
pub use gateway::{GatewayError, GatewayStatus, HttpGateway, PaymentGateway, PushRequest, SharedGateway};
pub use poller::{poll_until_settled, PollOutcome, RetryPolicy, TransportErrorPolicy};
pub use settle::{confirm, Confirmations};
pub use store::PaymentAttempt;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount {got} does not match the service price {expected}")]
    AmountMismatch { expected: i64, got: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("payment gateway did not return a transaction reference")]
    MissingReference,

    #[error("a payment confirmation is already running for booking {0}")]
    AlreadyPolling(String),

    #[error("error checking payment status: {0}")]
    Transport(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl PaymentError {
    pub fn status(&self) -> StatusCode {
        use PaymentError::*;
        match self {
            AmountMismatch { .. } | Validation(_) => StatusCode::BAD_REQUEST,
            AlreadyPolling(_) => StatusCode::CONFLICT,
            MissingReference | Transport(_) | Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Where a push payment stands, as recorded and as reported to the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Initiated,
    Confirmed,
    Declined,
    TimedOut,
    Error,
    Cancelled,
    /// Confirmed by the gateway after the booking was already closed.
    RefundDue,
}

impl AttemptState {
    const ALL: [AttemptState; 7] = [
        AttemptState::Initiated,
        AttemptState::Confirmed,
        AttemptState::Declined,
        AttemptState::TimedOut,
        AttemptState::Error,
        AttemptState::Cancelled,
        AttemptState::RefundDue,
    ];

    pub fn as_str(&self) -> &'static str {
        use AttemptState::*;
        match self {
            Initiated => "initiated",
            Confirmed => "confirmed",
            Declined => "declined",
            TimedOut => "timed_out",
            Error => "error",
            Cancelled => "cancelled",
            RefundDue => "refund_due",
        }
    }

    /// The notice shown to the customer. A timeout is advisory, not a decline.
    pub fn user_message(&self) -> &'static str {
        use AttemptState::*;
        match self {
            Initiated => "Check your phone and enter your PIN to complete the payment.",
            Confirmed => "Payment received. Your booking is confirmed.",
            Declined => "The payment was not completed.",
            TimedOut => "We have not received a payment confirmation yet. Check your phone or try again.",
            Error => "Error checking payment status.",
            Cancelled => "Stopped waiting for the payment confirmation.",
            RefundDue => "Payment received after the booking was closed. A refund is due.",
        }
    }

    /// The booking status this outcome settles to; `None` leaves the booking untouched.
    pub fn booking_status(&self) -> Option<BookingStatus> {
        use AttemptState::*;
        match self {
            Confirmed => Some(BookingStatus::WaitingForWork),
            Declined | TimedOut => Some(BookingStatus::PaymentFailed),
            Initiated | Error | Cancelled | RefundDue => None,
        }
    }
}

impl fmt::Display for AttemptState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptState {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttemptState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| PaymentError::Validation(format!("unknown payment state {s:?}")))
    }
}

/// Everything the checkout and the confirmation loop need.
#[derive(Clone)]
pub struct PaymentContext {
    pub db_pool: SqlitePool,
    pub hub: Hub,
    pub gateway: SharedGateway,
    pub policy: RetryPolicy,
    pub confirmations: Confirmations,
}

impl FromRef<AppState> for PaymentContext {
    fn from_ref(state: &AppState) -> Self {
        PaymentContext {
            db_pool: state.db_pool.clone(),
            hub: state.hub.clone(),
            gateway: state.gateway.clone(),
            policy: state.policy,
            confirmations: state.confirmations.clone(),
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payments/checkout", post(checkout::start))
        .route("/payments/{booking_id}", get(checkout::latest))
        .route("/payments/{booking_id}/poll", delete(checkout::stop))
        .route("/payments/{booking_id}/resume", post(checkout::restart))
}
