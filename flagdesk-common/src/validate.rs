//! Candidate validation for normalized rows
//!
//! Extraction over noisy table photos produces partial and garbage rows.
//! A row without an order identifier contributes nothing; it is never an
//! error for the batch.

use crate::record::{clean_cell, CanonicalField, OrderRecord, RawExtractedRow};

/// True when the normalized row carries a non-empty `FullOrder`
pub fn is_viable(row: &RawExtractedRow) -> bool {
    row.get(CanonicalField::FullOrder.header())
        .map(|value| !clean_cell(value).is_empty())
        .unwrap_or(false)
}

/// Convert a normalized row into a record, or `None` if it is not viable
///
/// Missing optional fields become empty text.
pub fn to_candidate(row: &RawExtractedRow) -> Option<OrderRecord> {
    if !is_viable(row) {
        return None;
    }

    let value = |field: CanonicalField| row.get(field.header()).unwrap_or("");

    Some(OrderRecord::new(
        value(CanonicalField::FullOrder),
        value(CanonicalField::FlagNumber),
        value(CanonicalField::TruckId),
        value(CanonicalField::Color),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::normalize_row;

    fn row(pairs: &[(&str, &str)]) -> RawExtractedRow {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_row_without_full_order_is_rejected() {
        assert!(!is_viable(&row(&[("FlagNumber", "3"), ("Color", "Red")])));
        assert!(to_candidate(&row(&[("Color", "Red")])).is_none());
    }

    #[test]
    fn test_blank_full_order_is_rejected() {
        assert!(!is_viable(&row(&[("FullOrder", "   ")])));
    }

    #[test]
    fn test_unnormalized_row_is_rejected() {
        // Returned unchanged by the normalizer, still has no FullOrder
        let raw = row(&[("mystery", "998877660351")]);
        assert!(to_candidate(&normalize_row(&raw)).is_none());
    }

    #[test]
    fn test_candidate_fills_missing_fields_and_derives_key() {
        let record = to_candidate(&row(&[("FullOrder", "998877660351.0"), ("Color", "Blue")]))
            .expect("viable row");
        assert_eq!(record.full_order, "998877660351");
        assert_eq!(record.order_number, "0351");
        assert_eq!(record.flag_number, "");
        assert_eq!(record.truck_id, "");
        assert_eq!(record.color, "Blue");
    }
}
