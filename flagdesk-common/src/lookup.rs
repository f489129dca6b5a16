//! Digit-fragment lookup over the record set
//!
//! **Matching policy:**
//! - Exactly 4 digits: `full_order` must end with the query (the order
//!   number fast path).
//! - Any other length: `full_order` must contain the query anywhere.
//!
//! All matches are returned in store order; choosing among them is the
//! presenting layer's concern.

use serde::Serialize;
use thiserror::Error;

use crate::record::{clean_cell, OrderRecord, ORDER_NUMBER_LEN};

/// Query validation failure, distinct from a well-formed query with no hits
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("enter at least one digit")]
    NoDigits,
}

/// How a cleaned query is matched against `full_order`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Suffix,
    Contains,
}

/// Cleaned, validated lookup query (digits only, non-empty)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupQuery {
    digits: String,
}

impl LookupQuery {
    /// Strip everything but ASCII digits from operator input
    pub fn parse(raw: &str) -> Result<Self, QueryError> {
        let digits: String = raw.trim().chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(QueryError::NoDigits);
        }
        Ok(Self { digits })
    }

    pub fn digits(&self) -> &str {
        &self.digits
    }

    pub fn mode(&self) -> MatchMode {
        if self.digits.len() == ORDER_NUMBER_LEN {
            MatchMode::Suffix
        } else {
            MatchMode::Contains
        }
    }

    /// Match against the cleaned text form of a `full_order` value
    pub fn matches(&self, full_order: &str) -> bool {
        let full_order = clean_cell(full_order);
        match self.mode() {
            MatchMode::Suffix => full_order.ends_with(&self.digits),
            MatchMode::Contains => full_order.contains(&self.digits),
        }
    }
}

/// All records matching `query`, in store order
pub fn lookup(records: &[OrderRecord], query: &LookupQuery) -> Vec<OrderRecord> {
    records
        .iter()
        .filter(|record| query.matches(&record.full_order))
        .cloned()
        .collect()
}

/// Record set loaded for one request, queried one or more times
#[derive(Debug, Clone, Default)]
pub struct LookupIndex {
    records: Vec<OrderRecord>,
}

impl LookupIndex {
    pub fn new(records: Vec<OrderRecord>) -> Self {
        Self { records }
    }

    /// Candidate set for an already validated query, in store order
    pub fn find(&self, query: &LookupQuery) -> Vec<OrderRecord> {
        lookup(&self.records, query)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
