use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::OffsetDateTime;

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS services (
        id TEXT PRIMARY KEY,
        provider_id TEXT NOT NULL,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        price INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS bookings (
        id TEXT PRIMARY KEY,
        customer_id TEXT NOT NULL,
        provider_id TEXT NOT NULL,
        service_id TEXT NOT NULL,
        service_name TEXT NOT NULL,
        category TEXT NOT NULL,
        amount INTEGER NOT NULL,
        address TEXT NOT NULL,
        city TEXT NOT NULL,
        delivery_date TEXT NOT NULL,
        payment_method TEXT NOT NULL,
        paid BOOLEAN NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS bookings_customer ON bookings (customer_id)",
    "CREATE INDEX IF NOT EXISTS bookings_provider ON bookings (provider_id)",
    r#"CREATE TABLE IF NOT EXISTS payment_attempts (
        id TEXT PRIMARY KEY,
        booking_id TEXT NOT NULL,
        reference TEXT,
        phone TEXT NOT NULL,
        amount INTEGER NOT NULL,
        state TEXT NOT NULL,
        message TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS payment_attempts_booking ON payment_attempts (booking_id)",
    r#"CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY,
        sender_id TEXT NOT NULL,
        receiver_id TEXT NOT NULL,
        room_id TEXT NOT NULL,
        text TEXT NOT NULL,
        image_url TEXT,
        created_at INTEGER NOT NULL,
        read BOOLEAN NOT NULL DEFAULT 0
    )"#,
    "CREATE INDEX IF NOT EXISTS messages_room ON messages (room_id, created_at)",
    "CREATE INDEX IF NOT EXISTS messages_unread ON messages (receiver_id, read)",
    r#"CREATE TABLE IF NOT EXISTS notifications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        body TEXT NOT NULL,
        read BOOLEAN NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS notifications_user ON notifications (user_id, created_at)",
];

pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Creates every table the app needs. Safe to run on each start.
pub async fn init_schema(db_pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(db_pool).await?;
    }
    Ok(())
}

/// Unix time in milliseconds, the timestamp format of every table.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
