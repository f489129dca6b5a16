//! External record table contract
//!
//! The persistent store is a plain table read and written in full: no row
//! level API, no partial update, no caching. Backends implement
//! [`RecordTable`]; the SQLite and Google Sheets backends live in the
//! service crate, [`MemoryTable`] here serves tests and local runs.
//!
//! **Optimistic concurrency:** a backend may return a version token from
//! `read()` and reject a `write()` whose expected token no longer matches.
//! Callers opt in by passing the token; `None` writes unconditionally.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::alias::normalize_row;
use crate::record::{
    canonical_headers, is_order_number_header, CanonicalField, OrderRecord, RawExtractedRow,
    ORDER_NUMBER_HEADER,
};
use crate::validate::to_candidate;
use crate::{Error, Result};

/// Opaque table version token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableVersion(pub String);

impl std::fmt::Display for TableVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full table contents as text cells
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub version: Option<TableVersion>,
}

impl TableSnapshot {
    /// Empty table carrying the canonical headers
    pub fn empty_with_headers() -> Self {
        Self {
            headers: canonical_headers(),
            rows: Vec::new(),
            version: None,
        }
    }

    /// Encode records under the canonical headers
    ///
    /// `include_order_number` appends the derived `OrderNumber` column for
    /// deployments that want it visible in the sheet.
    pub fn from_records(records: &[OrderRecord], include_order_number: bool) -> Self {
        let mut headers = canonical_headers();
        if include_order_number {
            headers.push(ORDER_NUMBER_HEADER.to_string());
        }

        let rows = records
            .iter()
            .map(|record| {
                let mut row: Vec<String> = CanonicalField::ALL
                    .iter()
                    .map(|field| record.get(*field).to_string())
                    .collect();
                if include_order_number {
                    row.push(record.order_number.clone());
                }
                row
            })
            .collect();

        Self {
            headers,
            rows,
            version: None,
        }
    }

    /// Decode rows into records
    ///
    /// Headers go through the same normalizer as extracted rows, cells are
    /// cleaned, the order number is always re-derived (a stored order-number
    /// column is ignored under any spelling) and rows without a `FullOrder`
    /// are skipped. Short rows are padded with empty cells.
    pub fn to_records(&self) -> Vec<OrderRecord> {
        let mut records = Vec::with_capacity(self.rows.len());

        for (index, cells) in self.rows.iter().enumerate() {
            let raw: RawExtractedRow = self
                .headers
                .iter()
                .enumerate()
                .filter(|(_, header)| !is_order_number_header(header))
                .map(|(col, header)| {
                    let cell = cells.get(col).map(String::as_str).unwrap_or("");
                    (header.as_str(), cell)
                })
                .collect();

            match to_candidate(&normalize_row(&raw)) {
                Some(record) => records.push(record),
                None => tracing::debug!(row = index + 1, "Skipping stored row without FullOrder"),
            }
        }

        records
    }

    /// True when every canonical header is present (case-insensitively)
    pub fn has_canonical_headers(&self) -> bool {
        CanonicalField::ALL.iter().all(|field| {
            self.headers
                .iter()
                .any(|header| CanonicalField::from_header(header) == Some(*field))
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Full-table read/write contract of the persistent store
#[async_trait]
pub trait RecordTable: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Whether `read()` returns version tokens that `write()` enforces
    fn supports_versioning(&self) -> bool {
        false
    }

    /// Live snapshot of the whole table
    async fn read(&self) -> Result<TableSnapshot>;

    /// Replace the whole table
    ///
    /// With `expected` set, a versioned backend fails with
    /// [`Error::VersionConflict`] if the table changed since that read.
    async fn write(&self, snapshot: TableSnapshot, expected: Option<&TableVersion>) -> Result<()>;
}

/// In-process table, versioned by a write counter
#[derive(Debug, Default)]
pub struct MemoryTable {
    state: RwLock<MemoryState>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    failing: AtomicBool,
}

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: TableSnapshot,
    version: u64,
}

impl MemoryTable {
    /// Empty table, no headers (a store that was never initialized)
    pub fn new() -> Self {
        Self::default()
    }

    /// Table pre-populated with `snapshot`
    pub fn with_snapshot(snapshot: TableSnapshot) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                snapshot: TableSnapshot {
                    version: None,
                    ..snapshot
                },
                version: 0,
            }),
            ..Self::default()
        }
    }

    /// Make every subsequent read and write fail with a store error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Store("memory table unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordTable for MemoryTable {
    fn name(&self) -> &str {
        "memory"
    }

    fn supports_versioning(&self) -> bool {
        true
    }

    async fn read(&self) -> Result<TableSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;

        let state = self.state.read().await;
        Ok(TableSnapshot {
            version: Some(TableVersion(state.version.to_string())),
            ..state.snapshot.clone()
        })
    }

    async fn write(&self, snapshot: TableSnapshot, expected: Option<&TableVersion>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;

        let mut state = self.state.write().await;
        if let Some(expected) = expected {
            let current = state.version.to_string();
            if expected.0 != current {
                return Err(Error::VersionConflict {
                    expected: expected.0.clone(),
                    found: current,
                });
            }
        }

        state.snapshot = TableSnapshot {
            version: None,
            ..snapshot
        };
        state.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_with_headers() {
        let snapshot = TableSnapshot::empty_with_headers();
        assert_eq!(snapshot.headers, vec!["FullOrder", "FlagNumber", "TruckID", "Color"]);
        assert!(snapshot.rows.is_empty());
        assert!(snapshot.has_canonical_headers());
    }

    #[test]
    fn test_to_records_cleans_numeric_cells() {
        let snapshot = TableSnapshot {
            headers: canonical_headers(),
            rows: vec![vec![
                "998877660351.0".to_string(),
                "351.0".to_string(),
                " IN-4 ".to_string(),
                "Red".to_string(),
            ]],
            version: None,
        };
        let records = snapshot.to_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].full_order, "998877660351");
        assert_eq!(records[0].order_number, "0351");
        assert_eq!(records[0].flag_number, "351");
        assert_eq!(records[0].truck_id, "IN-4");
    }

    #[test]
    fn test_to_records_ignores_stored_order_number_and_pads_short_rows() {
        let snapshot = TableSnapshot {
            headers: vec![
                "OrderNumber".to_string(),
                "Order #".to_string(),
                "Colour".to_string(),
            ],
            rows: vec![
                vec!["XXXX".to_string(), "123456789".to_string()],
                vec!["".to_string(), "".to_string(), "Blue".to_string()],
            ],
            version: None,
        };
        let records = snapshot.to_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].order_number, "6789");
        assert_eq!(records[0].color, "");
    }

    #[test]
    fn test_to_records_hand_edited_order_number_column() {
        let snapshot = TableSnapshot {
            headers: vec![
                "Order Number".to_string(),
                "Full Order".to_string(),
                "Flag".to_string(),
            ],
            rows: vec![vec![
                "0351".to_string(),
                "998877660351".to_string(),
                "7".to_string(),
            ]],
            version: None,
        };
        let records = snapshot.to_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].full_order, "998877660351");
        assert_eq!(records[0].order_number, "0351");
        assert_eq!(records[0].flag_number, "7");
    }

    #[test]
    fn test_from_records_optional_order_number_column() {
        let records = vec![OrderRecord::new("998877660351", "7", "IN-1", "Red")];
        let plain = TableSnapshot::from_records(&records, false);
        assert_eq!(plain.headers.len(), 4);
        assert_eq!(plain.rows[0], vec!["998877660351", "7", "IN-1", "Red"]);

        let with_key = TableSnapshot::from_records(&records, true);
        assert_eq!(with_key.headers.last().map(String::as_str), Some("OrderNumber"));
        assert_eq!(with_key.rows[0].last().map(String::as_str), Some("0351"));
        assert_eq!(with_key.to_records(), records);
    }

    #[tokio::test]
    async fn test_memory_table_rejects_stale_version() {
        let table = MemoryTable::new();
        let first = table.read().await.unwrap();
        let second = table.read().await.unwrap();

        table
            .write(TableSnapshot::empty_with_headers(), first.version.as_ref())
            .await
            .unwrap();

        let result = table
            .write(TableSnapshot::empty_with_headers(), second.version.as_ref())
            .await;
        assert!(matches!(result, Err(Error::VersionConflict { .. })));

        // Unconditional writes always land
        table.write(TableSnapshot::empty_with_headers(), None).await.unwrap();
        assert_eq!(table.write_count(), 3);
    }

    #[tokio::test]
    async fn test_memory_table_failure_injection() {
        let table = MemoryTable::new();
        table.set_failing(true);
        assert!(matches!(table.read().await, Err(Error::Store(_))));
        table.set_failing(false);
        assert!(table.read().await.is_ok());
    }
}
