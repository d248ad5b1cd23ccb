//! # Crawling
//!
//! The retry state machines of a crawl pass:
//! - `pagination`: bounded "load more" expansion
//! - `extraction`: per-listing field and detail reads with retry
//! - `orchestrator`: sequences both and feeds the store

pub mod extraction;
pub mod orchestrator;
pub mod pagination;

pub use extraction::{ExtractionError, ListingExtractor};
pub use orchestrator::{CrawlError, CrawlOrchestrator, CrawlSummary};
pub use pagination::{ExpansionSignal, PaginationController, PaginationState};
