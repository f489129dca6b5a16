//! End-to-end properties of the reconciliation and lookup core
//!
//! Exercises normalize → validate → merge → encode → decode → lookup the
//! way the service does it, against an in-memory table.

use flagdesk_common::alias::{normalize_row, ALIASES};
use flagdesk_common::lookup::{lookup, LookupIndex, LookupQuery, QueryError};
use flagdesk_common::reconcile::merge;
use flagdesk_common::table::{MemoryTable, RecordTable, TableSnapshot};
use flagdesk_common::validate::to_candidate;
use flagdesk_common::{OrderRecord, RawExtractedRow};

fn row(pairs: &[(&str, &str)]) -> RawExtractedRow {
    pairs.iter().copied().collect()
}

fn candidates(rows: &[RawExtractedRow]) -> Vec<OrderRecord> {
    rows.iter()
        .filter_map(|raw| to_candidate(&normalize_row(raw)))
        .collect()
}

#[test]
fn test_alias_coverage() {
    // Every alias survives normalization under its canonical header
    for &(alias, field) in ALIASES {
        let normalized = normalize_row(&row(&[(alias, "x")]));
        assert_eq!(normalized.get(field.header()), Some("x"));
    }
}

#[test]
fn test_heterogeneous_extraction_runs_converge() {
    let run_one = vec![
        row(&[("Order #", "998877660351"), ("Flag", "7"), ("Truck", "IN-1"), ("Colour", "Red")]),
        row(&[("notes", "smudged row")]),
    ];
    let run_two = vec![row(&[
        ("Number Order", "998877660351"),
        ("flag_number", "9"),
        ("delivery code", "IN-9"),
        ("color", "Blue"),
    ])];

    let stored = merge(Vec::new(), candidates(&run_one));
    assert_eq!(stored.len(), 1);

    let stored = merge(stored, candidates(&run_two));
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].color, "Blue");
    assert_eq!(stored[0].flag_number, "9");
    assert_eq!(stored[0].order_number, "0351");
}

#[tokio::test]
async fn test_clear_then_read_keeps_headers() {
    let table = MemoryTable::with_snapshot(TableSnapshot::from_records(
        &[OrderRecord::new("998877660351", "7", "IN-1", "Red")],
        false,
    ));

    table
        .write(TableSnapshot::empty_with_headers(), None)
        .await
        .unwrap();

    let snapshot = table.read().await.unwrap();
    assert_eq!(snapshot.row_count(), 0);
    assert!(snapshot.has_canonical_headers());
    assert!(snapshot.to_records().is_empty());
}

#[tokio::test]
async fn test_numeric_cells_read_back_as_text() {
    let table = MemoryTable::with_snapshot(TableSnapshot {
        headers: vec!["FullOrder".into(), "FlagNumber".into(), "TruckID".into(), "Color".into()],
        rows: vec![vec!["998877660351.0".into(), "351.0".into(), "12.0".into(), "red".into()]],
        version: None,
    });

    let records = table.read().await.unwrap().to_records();
    assert_eq!(records[0].flag_number, "351");
    assert_eq!(records[0].truck_id, "12");

    let query = LookupQuery::parse("0351").unwrap();
    assert_eq!(lookup(&records, &query).len(), 1);
}

#[test]
fn test_lookup_distinguishes_invalid_query_from_no_match() {
    let index = LookupIndex::new(vec![OrderRecord::new("998877660351", "7", "IN-1", "Red")]);
    let search = |raw: &str| LookupQuery::parse(raw).map(|query| index.find(&query).len());

    assert_eq!(search("0351"), Ok(1));
    assert_eq!(search("9999"), Ok(0));
    assert_eq!(search("660351"), Ok(1));
    assert_eq!(search("   "), Err(QueryError::NoDigits));
    assert_eq!(search("--"), Err(QueryError::NoDigits));
}
