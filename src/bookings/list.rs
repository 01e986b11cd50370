use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::AppResult;

use super::{store, Booking, BookingError, Earnings};

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    customer_id: Option<String>,
    provider_id: Option<String>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn get(
    State(db_pool): State<SqlitePool>,
    Path(id): Path<String>,
) -> AppResult<Json<Booking>> {
    Ok(Json(store::fetch(&db_pool, &id).await?))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn list(
    State(db_pool): State<SqlitePool>,
    Query(ListQuery { customer_id, provider_id }): Query<ListQuery>,
) -> AppResult<Json<Vec<Booking>>> {
    let bookings = match (customer_id, provider_id) {
        (Some(customer_id), None) => store::list_for_customer(&db_pool, &customer_id).await?,
        (None, Some(provider_id)) => store::list_for_provider(&db_pool, &provider_id).await?,
        _ => return Err(BookingError::Validation("pass exactly one of customer_id or provider_id".to_owned()))?,
    };
    Ok(Json(bookings))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn earnings(
    State(db_pool): State<SqlitePool>,
    Path(provider_id): Path<String>,
) -> AppResult<Json<Earnings>> {
    Ok(Json(store::earnings(&db_pool, &provider_id).await?))
}
