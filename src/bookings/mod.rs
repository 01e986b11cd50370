mod edit;
mod list;
pub mod status;
pub mod store;

use axum::{http::StatusCode, routing::{get, patch}, Router};
use thiserror::Error;

use crate::AppState;

pub use status::{Actor, BookingStatus, PaymentMethod, Transition};
pub use store::{Booking, Earnings, NewBooking};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("cannot move a booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("{actor} may not move a booking from {from} to {to}")]
    NotAllowed { actor: Actor, from: BookingStatus, to: BookingStatus },

    #[error("inconsistent booking state: {0}")]
    Invariant(String),

    #[error("booking {0} was modified concurrently, reload and retry")]
    Conflict(String),
}

impl BookingError {
    pub fn status(&self) -> StatusCode {
        use BookingError::*;
        match self {
            NotFound(_) => StatusCode::NOT_FOUND,
            Validation(_) => StatusCode::BAD_REQUEST,
            InvalidTransition { .. } | Invariant(_) | Conflict(_) => StatusCode::CONFLICT,
            NotAllowed { .. } => StatusCode::FORBIDDEN,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list::list))
        .route("/bookings/{id}", get(list::get))
        .route("/bookings/{id}/status", patch(edit::update_status))
        .route("/bookings/earnings/{provider_id}", get(list::earnings))
}
