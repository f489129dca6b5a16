//! SQLite-backed record table
//!
//! Versioned: every write bumps `table_meta.version` inside the same
//! transaction that replaces the rows, so a write carrying a stale version
//! is rejected without touching the data.

use async_trait::async_trait;
use sqlx::SqlitePool;

use flagdesk_common::table::{RecordTable, TableSnapshot, TableVersion};
use flagdesk_common::{Error, Result};

pub struct SqliteTable {
    pool: SqlitePool,
}

impl SqliteTable {
    /// Wrap a pool whose tables were created by [`crate::db::init_tables`]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordTable for SqliteTable {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn supports_versioning(&self) -> bool {
        true
    }

    async fn read(&self) -> Result<TableSnapshot> {
        let headers: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM manifest_headers ORDER BY position")
                .fetch_all(&self.pool)
                .await?;

        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT cells FROM manifest_rows ORDER BY row_index")
                .fetch_all(&self.pool)
                .await?;

        let (version,): (String,) =
            sqlx::query_as("SELECT value FROM table_meta WHERE key = 'version'")
                .fetch_one(&self.pool)
                .await?;

        let rows = rows
            .into_iter()
            .map(|(cells,)| {
                serde_json::from_str::<Vec<String>>(&cells)
                    .map_err(|e| Error::Store(format!("Corrupt stored row: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TableSnapshot {
            headers: headers.into_iter().map(|(name,)| name).collect(),
            rows,
            version: Some(TableVersion(version)),
        })
    }

    async fn write(&self, snapshot: TableSnapshot, expected: Option<&TableVersion>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let (current,): (String,) =
            sqlx::query_as("SELECT value FROM table_meta WHERE key = 'version'")
                .fetch_one(&mut *tx)
                .await?;

        if let Some(expected) = expected {
            if expected.0 != current {
                return Err(Error::VersionConflict {
                    expected: expected.0.clone(),
                    found: current,
                });
            }
        }

        sqlx::query("DELETE FROM manifest_headers").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM manifest_rows").execute(&mut *tx).await?;

        for (position, name) in snapshot.headers.iter().enumerate() {
            sqlx::query("INSERT INTO manifest_headers (position, name) VALUES (?, ?)")
                .bind(position as i64)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        for (row_index, cells) in snapshot.rows.iter().enumerate() {
            let encoded = serde_json::to_string(cells)
                .map_err(|e| Error::Internal(format!("Encode row failed: {}", e)))?;
            sqlx::query("INSERT INTO manifest_rows (row_index, cells) VALUES (?, ?)")
                .bind(row_index as i64)
                .bind(encoded)
                .execute(&mut *tx)
                .await?;
        }

        let next = current
            .parse::<u64>()
            .map_err(|e| Error::Store(format!("Corrupt table version {:?}: {}", current, e)))?
            + 1;
        sqlx::query("UPDATE table_meta SET value = ? WHERE key = 'version'")
            .bind(next.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            rows = snapshot.rows.len(),
            version = next,
            "SQLite table rewritten"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flagdesk_common::OrderRecord;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_table() -> SqliteTable {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        SqliteTable::new(pool)
    }

    #[tokio::test]
    async fn test_fresh_table_is_empty() {
        let table = setup_test_table().await;
        let snapshot = table.read().await.unwrap();
        assert!(snapshot.headers.is_empty());
        assert!(snapshot.rows.is_empty());
        assert_eq!(snapshot.version, Some(TableVersion("0".to_string())));
    }

    #[tokio::test]
    async fn test_write_then_read_preserves_rows_and_order() {
        let table = setup_test_table().await;
        let records = vec![
            OrderRecord::new("998877660351", "7", "IN-1", "Red"),
            OrderRecord::new("112233445566", "8", "IN-2", "Blue"),
        ];

        table
            .write(TableSnapshot::from_records(&records, false), None)
            .await
            .unwrap();

        let snapshot = table.read().await.unwrap();
        assert_eq!(snapshot.headers, vec!["FullOrder", "FlagNumber", "TruckID", "Color"]);
        assert_eq!(snapshot.to_records(), records);
        assert_eq!(snapshot.version, Some(TableVersion("1".to_string())));
    }

    #[tokio::test]
    async fn test_stale_version_rejected_and_data_untouched() {
        let table = setup_test_table().await;
        let stale = table.read().await.unwrap().version;

        let first = vec![OrderRecord::new("111111", "1", "T", "Red")];
        table
            .write(TableSnapshot::from_records(&first, false), stale.as_ref())
            .await
            .unwrap();

        let second = vec![OrderRecord::new("222222", "2", "T", "Blue")];
        let result = table
            .write(TableSnapshot::from_records(&second, false), stale.as_ref())
            .await;
        assert!(matches!(result, Err(Error::VersionConflict { .. })));

        assert_eq!(table.read().await.unwrap().to_records(), first);
    }

    #[tokio::test]
    async fn test_clear_keeps_headers() {
        let table = setup_test_table().await;
        table
            .write(
                TableSnapshot::from_records(&[OrderRecord::new("1", "1", "T", "Red")], false),
                None,
            )
            .await
            .unwrap();
        table.write(TableSnapshot::empty_with_headers(), None).await.unwrap();

        let snapshot = table.read().await.unwrap();
        assert!(snapshot.rows.is_empty());
        assert!(snapshot.has_canonical_headers());
    }
}
