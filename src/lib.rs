pub mod bookings;
pub mod chat;
pub mod client;
pub mod config;
pub mod db;
pub mod notifications;
pub mod payments;
pub mod services;

use std::fmt;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}, routing::get, Json, Router};
use serde_json::json;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use bookings::BookingError;
use chat::{ChatError, Hub};
use notifications::NotificationError;
use payments::{Confirmations, GatewayError, PaymentError, RetryPolicy, SharedGateway};
use services::ServiceError;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub hub: Hub,
    pub gateway: SharedGateway,
    pub policy: RetryPolicy,
    pub confirmations: Confirmations,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, hub: Hub, gateway: SharedGateway, policy: RetryPolicy) -> Self {
        AppState {
            db_pool,
            hub,
            gateway,
            policy,
            confirmations: Confirmations::default(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))

        .merge(services::router())
        .merge(bookings::router())
        .merge(payments::router())
        .merge(chat::router())
        .merge(notifications::router())

        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}


pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.0.downcast_ref::<E>()
    }

    pub fn status(&self) -> StatusCode {
        if let Some(err) = self.downcast_ref::<BookingError>() {
            return err.status();
        }
        if let Some(err) = self.downcast_ref::<PaymentError>() {
            return err.status();
        }
        if let Some(err) = self.downcast_ref::<ChatError>() {
            return err.status();
        }
        if let Some(err) = self.downcast_ref::<ServiceError>() {
            return err.status();
        }
        if let Some(err) = self.downcast_ref::<NotificationError>() {
            return err.status();
        }
        if self.downcast_ref::<GatewayError>().is_some() {
            return StatusCode::BAD_GATEWAY;
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, backtrace = %self.0.backtrace(), "request failed");
        } else {
            tracing::debug!(error = %self.0, %status, "request rejected");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self(anyhow::Error::from(err))
            }
        }
    };
}

apperr_impl!(anyhow::Error);
apperr_impl!(serde_json::Error);
apperr_impl!(sqlx::Error);
apperr_impl!(axum::Error);
apperr_impl!(reqwest::Error);
apperr_impl!(BookingError);
apperr_impl!(PaymentError);
apperr_impl!(ChatError);
apperr_impl!(ServiceError);
apperr_impl!(NotificationError);
apperr_impl!(GatewayError);
