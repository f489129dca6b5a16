//! SQLite database access for the local table backend

use sqlx::SqlitePool;
use std::path::Path;

use flagdesk_common::Result;

/// Initialize database connection pool
///
/// Creates the parent directory and the database file if missing.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the manifest table storage if it doesn't exist
///
/// The table is stored generically (headers + JSON cell arrays) so it keeps
/// whatever columns were written, like a spreadsheet would.
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS manifest_headers (
            position INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS manifest_rows (
            row_index INTEGER PRIMARY KEY,
            cells TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS table_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO table_meta (key, value) VALUES ('version', '0')")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (manifest_headers, manifest_rows, table_meta)");

    Ok(())
}
