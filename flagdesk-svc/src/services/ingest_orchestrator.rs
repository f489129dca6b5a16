//! Ingestion orchestrator
//!
//! Runs one extraction batch: every source in the order given, every row in
//! its natural order, through the normalizer and validator, then a single
//! merge into the store. Source order matters because the merge keeps the
//! last occurrence of each order.
//!
//! # Failure handling
//! - Unsupported or unreadable source: the batch fails, nothing is written
//! - Extraction failure on one page: counted on that file, then either the
//!   next page is tried (`skip`) or the batch stops early (`abort`); rows
//!   collected before an abort are still merged
//! - Store failure: propagated as [`IngestError::Store`]
//!
//! Extractor calls are sequential and paced; pages are never submitted
//! concurrently.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use flagdesk_common::alias::normalize_row;
use flagdesk_common::config::ExtractionFailurePolicy;
use flagdesk_common::validate::to_candidate;
use flagdesk_common::{OrderRecord, RawExtractedRow};

use crate::config::IngestSettings;
use crate::services::gemini_extractor::{RowExtractor, EXTRACTION_INSTRUCTION};
use crate::services::page_images::{self, PageImage, SourceKind};
use crate::services::spreadsheet;
use crate::store::StoreAdapter;

/// One uploaded file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Every page was attempted
    Completed,
    /// The batch aborted while this file was being processed
    Aborted,
    /// Never reached because the batch aborted earlier
    Skipped,
}

/// Per-file outcome counts
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub name: String,
    pub status: FileStatus,
    pub pages: usize,
    pub rows_seen: usize,
    pub viable_rows: usize,
    pub extraction_failures: usize,
}

impl FileOutcome {
    fn new(name: &str, status: FileStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
            pages: 0,
            rows_seen: 0,
            viable_rows: 0,
            extraction_failures: 0,
        }
    }
}

/// Outcome of one batch
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
    pub rows_seen: usize,
    pub records_submitted: usize,
    /// Store size after the merge; `None` when nothing was written
    pub records_stored: Option<usize>,
    pub extraction_failures: usize,
    pub aborted: bool,
}

/// Batch-level failure; nothing was written to the store
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported source '{0}'")]
    UnsupportedSource(String),

    #[error("Unreadable source '{name}': {reason}")]
    Unreadable { name: String, reason: String },

    #[error("Store error: {0}")]
    Store(flagdesk_common::Error),

    #[error("Internal ingest error: {0}")]
    Internal(String),
}

impl IngestError {
    fn unreadable(name: &str, reason: impl ToString) -> Self {
        IngestError::Unreadable {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Extraction result for one file
enum FileRows {
    Done(Vec<RawExtractedRow>),
    /// Abort policy fired; rows collected before the failure
    Aborted(Vec<RawExtractedRow>),
}

pub struct IngestOrchestrator {
    extractor: Arc<dyn RowExtractor>,
    store: StoreAdapter,
    settings: IngestSettings,
    pacer: Option<DefaultDirectRateLimiter>,
}

impl IngestOrchestrator {
    pub fn new(
        extractor: Arc<dyn RowExtractor>,
        store: StoreAdapter,
        settings: &IngestSettings,
    ) -> Self {
        // Zero pacing disables throttling
        let pacer = Quota::with_period(settings.pacing).map(RateLimiter::direct);

        Self {
            extractor,
            store,
            settings: settings.clone(),
            pacer,
        }
    }

    /// Process `sources` in order and merge the viable rows
    pub async fn run_batch(&self, sources: Vec<SourceFile>) -> Result<IngestReport, IngestError> {
        // Classify everything up front so an unsupported file fails the
        // batch before any extractor call is spent
        let mut classified = Vec::with_capacity(sources.len());
        for source in sources {
            let kind = SourceKind::detect(&source.name, &source.bytes)
                .ok_or_else(|| IngestError::UnsupportedSource(source.name.clone()))?;
            classified.push((source, kind));
        }

        info!(
            files = classified.len(),
            extractor = self.extractor.name(),
            "Starting ingestion batch"
        );

        let mut files = Vec::with_capacity(classified.len());
        let mut candidates: Vec<OrderRecord> = Vec::new();
        let mut aborted = false;

        for (source, kind) in classified {
            if aborted {
                files.push(FileOutcome::new(&source.name, FileStatus::Skipped));
                continue;
            }

            let mut outcome = FileOutcome::new(&source.name, FileStatus::Completed);
            let rows = match self.rows_for(source, kind, &mut outcome).await? {
                FileRows::Done(rows) => rows,
                FileRows::Aborted(rows) => {
                    aborted = true;
                    outcome.status = FileStatus::Aborted;
                    rows
                }
            };

            outcome.rows_seen = rows.len();
            for row in &rows {
                if let Some(record) = to_candidate(&normalize_row(row)) {
                    candidates.push(record);
                    outcome.viable_rows += 1;
                }
            }

            debug!(
                file = %outcome.name,
                rows_seen = outcome.rows_seen,
                viable_rows = outcome.viable_rows,
                extraction_failures = outcome.extraction_failures,
                "Source processed"
            );
            files.push(outcome);
        }

        let rows_seen = files.iter().map(|f| f.rows_seen).sum();
        let extraction_failures = files.iter().map(|f| f.extraction_failures).sum();
        let records_submitted = candidates.len();

        let records_stored = if candidates.is_empty() {
            info!("No viable records in batch; store left untouched");
            None
        } else {
            let merged = self
                .store
                .merge_incoming(candidates)
                .await
                .map_err(IngestError::Store)?;
            Some(merged.records_after)
        };

        info!(
            rows_seen,
            records_submitted,
            extraction_failures,
            aborted,
            "Ingestion batch finished"
        );

        Ok(IngestReport {
            files,
            rows_seen,
            records_submitted,
            records_stored,
            extraction_failures,
            aborted,
        })
    }

    async fn rows_for(
        &self,
        source: SourceFile,
        kind: SourceKind,
        outcome: &mut FileOutcome,
    ) -> Result<FileRows, IngestError> {
        let name = source.name;
        let max_dim = self.settings.max_image_dim;

        let pages = match kind {
            SourceKind::Csv => {
                outcome.pages = 1;
                let rows = spreadsheet::parse_csv(&source.bytes)
                    .map_err(|e| IngestError::unreadable(&name, e))?;
                return Ok(FileRows::Done(rows));
            }
            SourceKind::Workbook => {
                outcome.pages = 1;
                let rows = spreadsheet::parse_workbook(source.bytes)
                    .map_err(|e| IngestError::unreadable(&name, e))?;
                return Ok(FileRows::Done(rows));
            }
            SourceKind::Image(mime) => {
                let bytes = source.bytes;
                let page = tokio::task::spawn_blocking(move || {
                    page_images::prepare_image(mime, bytes, max_dim)
                })
                .await
                .map_err(|e| IngestError::Internal(e.to_string()))?
                .map_err(|e| IngestError::unreadable(&name, e))?;
                vec![page]
            }
            SourceKind::Pdf => {
                let bytes = source.bytes;
                tokio::task::spawn_blocking(move || page_images::render_pdf(&bytes, max_dim))
                    .await
                    .map_err(|e| IngestError::Internal(e.to_string()))?
                    .map_err(|e| IngestError::unreadable(&name, e))?
            }
        };

        outcome.pages = pages.len();
        Ok(self.extract_pages(&name, &pages, outcome).await)
    }

    async fn extract_pages(
        &self,
        name: &str,
        pages: &[PageImage],
        outcome: &mut FileOutcome,
    ) -> FileRows {
        let mut rows = Vec::new();

        for (index, page) in pages.iter().enumerate() {
            if let Some(pacer) = &self.pacer {
                pacer.until_ready().await;
            }

            match self.extractor.extract(page, EXTRACTION_INSTRUCTION).await {
                Ok(page_rows) => {
                    debug!(file = %name, page = index + 1, rows = page_rows.len(), "Page extracted");
                    rows.extend(page_rows);
                }
                Err(e) => {
                    outcome.extraction_failures += 1;
                    warn!(file = %name, page = index + 1, error = %e, "Page extraction failed");

                    if self.settings.on_extraction_failure == ExtractionFailurePolicy::Abort {
                        warn!(file = %name, "Aborting batch after extraction failure");
                        return FileRows::Aborted(rows);
                    }
                }
            }
        }

        FileRows::Done(rows)
    }
}
