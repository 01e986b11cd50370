mod listing;
pub mod store;

use axum::{http::StatusCode, routing::get, Router};
use thiserror::Error;

use crate::AppState;

pub use store::{NewService, Service};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service {0} not found")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/services", get(listing::list).post(listing::create))
        .route("/services/{id}", get(listing::get))
}
