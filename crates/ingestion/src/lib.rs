//! Spendboard Ingestion
//!
//! Turns exported extraction records into normalized rows:
//! - `extraction`: tolerant readers for wrapped values, dates and numbers
//! - `mapper`: one record to a `NormalizedDocument`
//! - `engine`: per-document transactional writes and batch reporting

pub mod engine;
pub mod errors;
pub mod extraction;
pub mod mapper;

pub use engine::{BatchReport, DocumentFailure, DocumentOutcome, IngestionEngine, ProgressObserver};
pub use errors::{IngestionError, IngestionFatalError, MappingError};
pub use mapper::{map_document, NormalizedDocument};
