//! Canonical order record model
//!
//! Every value that reaches the store is text. Tabular exports hand us
//! numeric cells as floats, so `clean_cell` is applied on every read and on
//! every candidate built from an extracted row.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Derived search-key column. Never produced by normalization.
pub const ORDER_NUMBER_HEADER: &str = "OrderNumber";

/// Number of trailing characters of `FullOrder` forming the order number
pub const ORDER_NUMBER_LEN: usize = 4;

/// One of the four recognized output fields of normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalField {
    FullOrder,
    FlagNumber,
    #[serde(rename = "TruckID")]
    TruckId,
    Color,
}

impl CanonicalField {
    /// All canonical fields in persisted column order
    pub const ALL: [CanonicalField; 4] = [
        CanonicalField::FullOrder,
        CanonicalField::FlagNumber,
        CanonicalField::TruckId,
        CanonicalField::Color,
    ];

    /// Column header as persisted in the external table
    pub fn header(self) -> &'static str {
        match self {
            CanonicalField::FullOrder => "FullOrder",
            CanonicalField::FlagNumber => "FlagNumber",
            CanonicalField::TruckId => "TruckID",
            CanonicalField::Color => "Color",
        }
    }

    /// Case-insensitive match against the canonical header
    pub fn from_header(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.header().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Canonical column headers written when the store is created or cleared
pub fn canonical_headers() -> Vec<String> {
    CanonicalField::ALL
        .iter()
        .map(|field| field.header().to_string())
        .collect()
}

/// Trim a cell and strip the `.0` float artifact from numeric-looking text
///
/// `"351.0"` → `"351"`, `" -12.0 "` → `"-12"`, `"A1.0"` and `"1.05"` are
/// left as they are (after trimming).
pub fn clean_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(head) = trimmed.strip_suffix(".0") {
        let digits = head.strip_prefix('-').unwrap_or(head);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return head.to_string();
        }
    }
    trimmed.to_string()
}

/// Text form of a numeric cell
///
/// Whole floats print without a fractional part so identifiers stored as
/// numbers keep their digits (`998877660351`, not `998877660351.0`).
pub fn float_cell_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

/// True for any spelling of the derived order-number column
///
/// `OrderNumber`, `Order Number`, `order_number` and `order-number` all name
/// the search key, never the full identifier.
pub fn is_order_number_header(name: &str) -> bool {
    let squashed: String = name
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect();
    squashed.eq_ignore_ascii_case(ORDER_NUMBER_HEADER)
}

/// Last four characters of `full_order` (the whole value when shorter)
pub fn derive_order_number(full_order: &str) -> String {
    let count = full_order.chars().count();
    full_order
        .chars()
        .skip(count.saturating_sub(ORDER_NUMBER_LEN))
        .collect()
}

/// Canonical unit of persisted data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Long order identifier, the natural unique key
    pub full_order: String,
    /// Last four characters of `full_order`
    pub order_number: String,
    /// Flag token, kept as text
    pub flag_number: String,
    /// Inbound / delivery code
    pub truck_id: String,
    /// Color name, used verbatim as a display styling key
    pub color: String,
}

impl OrderRecord {
    /// Build a record from raw cell text; all fields are cleaned and the
    /// order number is derived.
    pub fn new(full_order: &str, flag_number: &str, truck_id: &str, color: &str) -> Self {
        let full_order = clean_cell(full_order);
        Self {
            order_number: derive_order_number(&full_order),
            full_order,
            flag_number: clean_cell(flag_number),
            truck_id: clean_cell(truck_id),
            color: clean_cell(color),
        }
    }

    /// Value of a canonical field
    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::FullOrder => &self.full_order,
            CanonicalField::FlagNumber => &self.flag_number,
            CanonicalField::TruckId => &self.truck_id,
            CanonicalField::Color => &self.color,
        }
    }

    /// Recompute `order_number` from `full_order`
    pub fn rederive_order_number(&mut self) {
        self.order_number = derive_order_number(&self.full_order);
    }
}

/// Untrusted key/value row produced by the AI extractor or a spreadsheet
///
/// Keys are free-form; pair order is the order the source produced them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExtractedRow {
    pub fields: Vec<(String, String)>,
}

impl RawExtractedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.push((key.into(), value.into()));
    }

    /// First value stored under exactly `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<K, V> FromIterator<(K, V)> for RawExtractedRow
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
