#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use servicehub::{
    chat::Hub,
    payments::{GatewayError, GatewayStatus, PaymentGateway, PushRequest, RetryPolicy, TransportErrorPolicy},
    services::{self, NewService, Service},
    AppState,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// One in-memory database per test. A single connection that never expires,
/// since every connection to `sqlite::memory:` is its own database.
pub async fn pool() -> SqlitePool {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .acquire_timeout(Duration::from_secs(60))
        .connect("sqlite::memory:")
        .await
        .unwrap();
    servicehub::db::init_schema(&db_pool).await.unwrap();
    db_pool
}

pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        interval: Duration::from_millis(2),
        max_attempts,
        on_transport_error: TransportErrorPolicy::Abort,
    }
}

pub async fn state(gateway: Arc<ScriptedGateway>, policy: RetryPolicy) -> AppState {
    AppState::new(pool().await, Hub::new(64), gateway, policy)
}

pub async fn service(db_pool: &SqlitePool, provider_id: &str, price: i64) -> Service {
    services::store::create(db_pool, NewService {
        provider_id: provider_id.to_owned(),
        name: "House cleaning".to_owned(),
        category: "cleaning".to_owned(),
        price,
    })
    .await
    .unwrap()
}

#[derive(Debug, Clone)]
pub enum Reply {
    Status(GatewayStatus),
    Unreachable,
}

/// A payment gateway that answers from a script and counts its calls.
/// Once the script runs out every status request answers `Pending`.
pub struct ScriptedGateway {
    reference: Option<String>,
    refuse_push: bool,
    replies: Mutex<VecDeque<Reply>>,
    pub pushes: AtomicUsize,
    pub status_calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(reference: Option<&str>, replies: impl IntoIterator<Item = Reply>) -> Arc<Self> {
        Arc::new(ScriptedGateway {
            reference: reference.map(str::to_owned),
            refuse_push: false,
            replies: Mutex::new(replies.into_iter().collect()),
            pushes: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        })
    }

    pub fn statuses(reference: &str, statuses: impl IntoIterator<Item = GatewayStatus>) -> Arc<Self> {
        Self::new(Some(reference), statuses.into_iter().map(Reply::Status))
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(ScriptedGateway {
            reference: None,
            refuse_push: true,
            replies: Mutex::default(),
            pushes: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        })
    }

    pub fn pushes(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate(&self, _request: &PushRequest) -> Result<Option<String>, GatewayError> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        if self.refuse_push {
            return Err(GatewayError::Rejected { status: 400, body: "invalid phone".to_owned() });
        }
        Ok(self.reference.clone())
    }

    async fn status(&self, _reference: &str) -> Result<GatewayStatus, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Status(status)) => Ok(status),
            Some(Reply::Unreachable) => Err(GatewayError::Rejected { status: 503, body: "unavailable".to_owned() }),
            None => Ok(GatewayStatus::Pending),
        }
    }
}
