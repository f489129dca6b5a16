//! Reconciliation store adapter
//!
//! Owns the load-all / transform / store-all cycle against the external
//! table. Every `merge_incoming` is exactly one read and one write, every
//! `clear` exactly one write. Nothing is cached and nothing is retried:
//! store failures go back to the caller.

pub mod sheets_table;
pub mod sqlite_table;

use serde::Serialize;
use std::sync::Arc;

use flagdesk_common::reconcile::{cleared, merge};
use flagdesk_common::table::{RecordTable, TableSnapshot, TableVersion};
use flagdesk_common::{Error, OrderRecord, Result};

use crate::config::{StoreOptions, StoreTarget};

pub use sheets_table::SheetsTable;
pub use sqlite_table::SqliteTable;

/// Records decoded from one live read
#[derive(Debug, Clone)]
pub struct RecordSet {
    pub records: Vec<OrderRecord>,
    /// False for a table that was never initialized (no header row)
    pub has_headers: bool,
    pub version: Option<TableVersion>,
}

/// Counts from one merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub records_before: usize,
    pub records_submitted: usize,
    pub records_after: usize,
}

#[derive(Clone)]
pub struct StoreAdapter {
    table: Arc<dyn RecordTable>,
    options: StoreOptions,
}

impl StoreAdapter {
    /// Fails when compare-and-swap is requested on an unversioned backend
    pub fn new(table: Arc<dyn RecordTable>, options: StoreOptions) -> Result<Self> {
        if options.optimistic_concurrency && !table.supports_versioning() {
            return Err(Error::Config(format!(
                "Optimistic concurrency requested but the {} backend is not versioned",
                table.name()
            )));
        }
        Ok(Self { table, options })
    }

    pub fn backend_name(&self) -> &str {
        self.table.name()
    }

    /// One live read, normalized into records
    pub async fn read(&self) -> Result<RecordSet> {
        let snapshot = self.table.read().await?;
        let records = snapshot.to_records();

        tracing::debug!(
            backend = self.table.name(),
            rows = snapshot.row_count(),
            records = records.len(),
            "Store read"
        );

        Ok(RecordSet {
            has_headers: !snapshot.headers.is_empty(),
            records,
            version: snapshot.version,
        })
    }

    /// Read, merge with last-write-wins, write back
    pub async fn merge_incoming(&self, incoming: Vec<OrderRecord>) -> Result<MergeOutcome> {
        let current = self.read().await?;
        let records_before = current.records.len();
        let records_submitted = incoming.len();

        let merged = merge(current.records, incoming);
        let records_after = merged.len();

        let expected = if self.options.optimistic_concurrency {
            current.version
        } else {
            None
        };

        self.table
            .write(
                TableSnapshot::from_records(&merged, self.options.persist_order_number),
                expected.as_ref(),
            )
            .await?;

        tracing::info!(
            backend = self.table.name(),
            records_before,
            records_submitted,
            records_after,
            "Merged incoming records into store"
        );

        Ok(MergeOutcome {
            records_before,
            records_submitted,
            records_after,
        })
    }

    /// Replace the whole store with an empty table carrying the headers
    pub async fn clear(&self) -> Result<()> {
        let snapshot = TableSnapshot::from_records(&cleared(), self.options.persist_order_number);
        self.table.write(snapshot, None).await?;

        tracing::warn!(backend = self.table.name(), "Record store cleared");
        Ok(())
    }
}

/// Open the configured table backend
pub async fn open_table(target: &StoreTarget) -> Result<Arc<dyn RecordTable>> {
    match target {
        StoreTarget::Sqlite { path } => {
            tracing::info!("Record table: SQLite at {}", path.display());
            let pool = crate::db::init_database_pool(path).await?;
            Ok(Arc::new(SqliteTable::new(pool)))
        }
        StoreTarget::Sheets {
            spreadsheet_id,
            worksheet,
            access_token,
        } => {
            tracing::info!(spreadsheet = %spreadsheet_id, worksheet = %worksheet, "Record table: Google Sheets");
            Ok(Arc::new(SheetsTable::new(
                spreadsheet_id.clone(),
                worksheet.clone(),
                access_token.clone(),
            )?))
        }
    }
}
