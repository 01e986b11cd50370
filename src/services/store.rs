use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{db::now_millis, AppResult};

use super::ServiceError;

/// A provider's listing. `price` is fixed and is what a checkout amount must match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub id: String,
    pub provider_id: String,
    pub name: String,
    pub category: String,
    pub price: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewService {
    pub provider_id: String,
    pub name: String,
    pub category: String,
    pub price: i64,
}

pub async fn create(db_pool: &SqlitePool, new: NewService) -> AppResult<Service> {
    let NewService { provider_id, name, category, price } = new;
    if provider_id.trim().is_empty() || name.trim().is_empty() || category.trim().is_empty() {
        return Err(ServiceError::Validation("provider, name and category are required".to_owned()))?;
    }
    if price <= 0 {
        return Err(ServiceError::Validation(format!("price must be positive, got {price}")))?;
    }

    let service = Service {
        id: Uuid::now_v7().to_string(),
        provider_id,
        name: name.trim().to_owned(),
        category: category.trim().to_owned(),
        price,
        created_at: now_millis(),
    };

    sqlx::query("INSERT INTO services (id,provider_id,name,category,price,created_at) VALUES (?,?,?,?,?,?)")
        .bind(&service.id)
        .bind(&service.provider_id)
        .bind(&service.name)
        .bind(&service.category)
        .bind(service.price)
        .bind(service.created_at)
        .execute(db_pool)
        .await?;

    tracing::info!(service_id = %service.id, provider_id = %service.provider_id, price = service.price, "service listed");
    Ok(service)
}

pub async fn get(db_pool: &SqlitePool, id: &str) -> AppResult<Option<Service>> {
    Ok(
        sqlx::query_as("SELECT id,provider_id,name,category,price,created_at FROM services WHERE id=?")
            .bind(id)
            .fetch_optional(db_pool)
            .await?
    )
}

pub async fn fetch(db_pool: &SqlitePool, id: &str) -> AppResult<Service> {
    get(db_pool, id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(id.to_owned()).into())
}

pub async fn list(db_pool: &SqlitePool, category: Option<&str>, provider_id: Option<&str>) -> AppResult<Vec<Service>> {
    Ok(
        sqlx::query_as(
            "SELECT id,provider_id,name,category,price,created_at FROM services
             WHERE (?1 IS NULL OR category=?1) AND (?2 IS NULL OR provider_id=?2)
             ORDER BY created_at DESC",
        )
        .bind(category)
        .bind(provider_id)
        .fetch_all(db_pool)
        .await?
    )
}
