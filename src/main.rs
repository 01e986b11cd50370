use std::sync::Arc;

use servicehub::{chat::Hub, config::Config, db, payments::HttpGateway, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,servicehub=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let db_pool = db::connect(&config.database_url, config.db_max_connections).await?;
    db::init_schema(&db_pool).await?;

    let gateway = Arc::new(HttpGateway::new(&config.gateway_url, config.gateway_api_key.clone())?);
    let state = AppState::new(db_pool, Hub::new(config.event_channel_capacity), gateway, config.poll_policy);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, servicehub::app(state)).await?;

    Ok(())
}
