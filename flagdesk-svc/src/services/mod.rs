//! Ingestion services
//!
//! Source decoding (spreadsheets, images, PDF pages), the AI row extractor
//! and the orchestrator that sequences them into the store.

pub mod gemini_extractor;
pub mod ingest_orchestrator;
pub mod page_images;
pub mod spreadsheet;

pub use gemini_extractor::{
    DisabledExtractor, ExtractError, GeminiExtractor, RowExtractor, EXTRACTION_INSTRUCTION,
};
pub use ingest_orchestrator::{
    FileOutcome, IngestError, IngestOrchestrator, IngestReport, SourceFile,
};
pub use page_images::{PageImage, SourceKind};
