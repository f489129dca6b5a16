//! # Flagdesk Common Library
//!
//! Shared code for the flagdesk service and its operational tools:
//! - Canonical order record model and cell cleaning
//! - Alias table and schema normalization of extracted rows
//! - Candidate validation
//! - Merge (last-write-wins) and clear policy
//! - Digit-fragment lookup
//! - Table snapshot contract for the external record store
//! - Configuration loading

pub mod alias;
pub mod config;
pub mod error;
pub mod lookup;
pub mod reconcile;
pub mod record;
pub mod table;
pub mod validate;

pub use error::{Error, Result};
pub use record::{CanonicalField, OrderRecord, RawExtractedRow};
