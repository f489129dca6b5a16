//! Alias table and schema normalization
//!
//! Extraction runs name the same column in many ways ("Order #",
//! "order_id", "Number Order"). Keys are matched after lower-casing and
//! trimming; an exact canonical name wins, then the alias table, otherwise
//! the pair is dropped.
//!
//! Extending coverage means adding an entry to `ALIASES`.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::record::{is_order_number_header, CanonicalField, RawExtractedRow};

/// Synonym (lower-cased, trimmed) → canonical field
pub const ALIASES: &[(&str, CanonicalField)] = &[
    // FullOrder
    ("full order", CanonicalField::FullOrder),
    ("full_order", CanonicalField::FullOrder),
    ("full-order", CanonicalField::FullOrder),
    ("full order number", CanonicalField::FullOrder),
    ("order", CanonicalField::FullOrder),
    ("order #", CanonicalField::FullOrder),
    ("order#", CanonicalField::FullOrder),
    ("order no", CanonicalField::FullOrder),
    ("order no.", CanonicalField::FullOrder),
    ("order_no", CanonicalField::FullOrder),
    ("order num", CanonicalField::FullOrder),
    ("order id", CanonicalField::FullOrder),
    ("order_id", CanonicalField::FullOrder),
    ("orderid", CanonicalField::FullOrder),
    ("order code", CanonicalField::FullOrder),
    ("number order", CanonicalField::FullOrder),
    ("po", CanonicalField::FullOrder),
    ("po #", CanonicalField::FullOrder),
    ("po number", CanonicalField::FullOrder),
    // FlagNumber
    ("flag", CanonicalField::FlagNumber),
    ("flag #", CanonicalField::FlagNumber),
    ("flag#", CanonicalField::FlagNumber),
    ("flag no", CanonicalField::FlagNumber),
    ("flag no.", CanonicalField::FlagNumber),
    ("flag_no", CanonicalField::FlagNumber),
    ("flag num", CanonicalField::FlagNumber),
    ("flag number", CanonicalField::FlagNumber),
    ("flag_number", CanonicalField::FlagNumber),
    ("flag id", CanonicalField::FlagNumber),
    ("number flag", CanonicalField::FlagNumber),
    // TruckID
    ("truck", CanonicalField::TruckId),
    ("truck id", CanonicalField::TruckId),
    ("truck_id", CanonicalField::TruckId),
    ("truck-id", CanonicalField::TruckId),
    ("truck #", CanonicalField::TruckId),
    ("truck#", CanonicalField::TruckId),
    ("truck no", CanonicalField::TruckId),
    ("truck number", CanonicalField::TruckId),
    ("inbound", CanonicalField::TruckId),
    ("inbound code", CanonicalField::TruckId),
    ("inbound id", CanonicalField::TruckId),
    ("delivery", CanonicalField::TruckId),
    ("delivery code", CanonicalField::TruckId),
    ("trailer", CanonicalField::TruckId),
    // Color
    ("colour", CanonicalField::Color),
    ("color name", CanonicalField::Color),
    ("colour name", CanonicalField::Color),
    ("flag color", CanonicalField::Color),
    ("flag colour", CanonicalField::Color),
];

static ALIAS_TABLE: Lazy<HashMap<&'static str, CanonicalField>> =
    Lazy::new(|| ALIASES.iter().copied().collect());

/// Resolve a free-form key to a canonical field
///
/// Any spelling of the derived order-number column resolves to nothing.
pub fn resolve_key(key: &str) -> Option<CanonicalField> {
    if is_order_number_header(key) {
        return None;
    }
    let lowered = key.trim().to_lowercase();
    CanonicalField::from_header(&lowered).or_else(|| ALIAS_TABLE.get(lowered.as_str()).copied())
}

/// Map a raw row onto canonical field names
///
/// Returns the original row unchanged when none of its keys resolve, so a
/// row with unfamiliar headers is left for validation to reject. When two
/// keys resolve to the same field the first non-empty value is kept.
pub fn normalize_row(row: &RawExtractedRow) -> RawExtractedRow {
    let mut resolved: Vec<(CanonicalField, String)> = Vec::new();

    for (key, value) in &row.fields {
        let Some(field) = resolve_key(key) else {
            tracing::trace!(key = %key, "Dropping unrecognized column");
            continue;
        };

        match resolved.iter_mut().find(|(existing, _)| *existing == field) {
            Some((_, current)) => {
                if current.trim().is_empty() && !value.trim().is_empty() {
                    *current = value.clone();
                }
            }
            None => resolved.push((field, value.clone())),
        }
    }

    if resolved.is_empty() {
        return row.clone();
    }

    resolved
        .into_iter()
        .map(|(field, value)| (field.header(), value))
        .collect()
}
