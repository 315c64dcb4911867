use std::env;
use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

pub async fn create_pool() -> Result<SqlitePool> {
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:../data/riskrouter.db".to_string());

    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(&database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await
}

/// Creates the two durable tables the ledger owns (§6). Called once at
/// startup, sharing the main pool.
pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ledger_pnl (
            match_id TEXT PRIMARY KEY,
            home REAL NOT NULL DEFAULT 0,
            draw REAL NOT NULL DEFAULT 0,
            away REAL NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS order_book (
            ticket_id TEXT PRIMARY KEY,
            ticket_type TEXT NOT NULL,
            stake REAL NOT NULL,
            action TEXT NOT NULL,
            retained_liability REAL NOT NULL,
            hedge_stake REAL NOT NULL,
            danger_match_id TEXT NOT NULL,
            danger_selection TEXT,
            timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_order_book_timestamp ON order_book(timestamp)")
        .execute(pool)
        .await?;

    tracing::info!("database initialized");
    Ok(())
}

pub async fn clear_all_data(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM order_book").execute(pool).await?;
    sqlx::query("DELETE FROM ledger_pnl").execute(pool).await?;
    tracing::info!("ledger and order book cleared");
    Ok(())
}
