//! Merge and clear policy for the record store
//!
//! The store is rewritten in full on every change, so both operations here
//! are pure transformations of an in-memory record sequence. Reading and
//! writing the external table is the store adapter's job.

use std::collections::HashSet;

use crate::record::OrderRecord;

/// Merge newly ingested records into the existing set
///
/// **Policy:** concatenate `existing` then `incoming`, keep the last
/// occurrence of each `full_order` (at the position of that occurrence),
/// then re-derive `order_number` for every survivor.
pub fn merge(existing: Vec<OrderRecord>, incoming: Vec<OrderRecord>) -> Vec<OrderRecord> {
    let combined: Vec<OrderRecord> = existing.into_iter().chain(incoming).collect();
    let mut seen = HashSet::with_capacity(combined.len());

    let mut survivors: Vec<OrderRecord> = combined
        .into_iter()
        .rev()
        .filter(|record| seen.insert(record.full_order.clone()))
        .collect();
    survivors.reverse();

    for record in &mut survivors {
        record.rederive_order_number();
    }

    survivors
}

/// Contents of a freshly cleared store: no records
///
/// Kept as an explicit operation so callers never clear by passing an empty
/// merge result around.
pub fn cleared() -> Vec<OrderRecord> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(full_order: &str, color: &str) -> OrderRecord {
        OrderRecord::new(full_order, "1", "T1", color)
    }

    #[test]
    fn test_incoming_record_supersedes_existing() {
        let merged = merge(vec![record("A", "Red")], vec![record("A", "Blue")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].color, "Blue");
    }

    #[test]
    fn test_later_row_in_batch_wins() {
        let merged = merge(
            vec![],
            vec![record("100001", "Red"), record("100002", "Green"), record("100001", "Pink")],
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].full_order, "100002");
        assert_eq!(merged[1].full_order, "100001");
        assert_eq!(merged[1].color, "Pink");
    }

    #[test]
    fn test_disjoint_records_keep_order() {
        let merged = merge(
            vec![record("1", "Red"), record("2", "Blue")],
            vec![record("3", "Green")],
        );
        let keys: Vec<&str> = merged.iter().map(|r| r.full_order.as_str()).collect();
        assert_eq!(keys, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_order_number_rederived_after_merge() {
        let mut stale = record("998877660351", "Red");
        stale.order_number = "9999".to_string();
        let mut incoming = record("123456789", "Blue");
        incoming.order_number.clear();

        let merged = merge(vec![stale], vec![incoming]);
        for survivor in &merged {
            let chars: Vec<char> = survivor.full_order.chars().collect();
            let expected: String = chars[chars.len().saturating_sub(4)..].iter().collect();
            assert_eq!(survivor.order_number, expected);
        }
    }

    #[test]
    fn test_cleared_is_empty() {
        assert!(cleared().is_empty());
    }
}
