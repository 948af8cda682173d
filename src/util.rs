use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ShopResult;

pub const MAX_DB_CONNECTIONS: u32 = 5;

pub fn current_time() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

pub async fn connect_to_db(database_url: &str) -> ShopResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_DB_CONNECTIONS)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// A fresh id for a new row.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// 40 random hex characters for a password reset link.
pub fn generate_reset_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        &Uuid::new_v4().simple().to_string()[..8]
    )
}
