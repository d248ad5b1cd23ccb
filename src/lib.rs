//! Jobs Harvester - incremental job listing crawler
//!
//! Expands a dynamically rendered search result page, extracts every listing
//! through a browser session and stores it in SQLite, skipping listings that
//! were stored by earlier runs.

// Module declarations
pub mod crawling;
pub mod domain;
pub mod infrastructure;
pub mod test_utils;

pub use crawling::{CrawlError, CrawlOrchestrator, CrawlSummary};
pub use domain::{ListingRecord, SearchQuery};
pub use infrastructure::{HarvesterConfig, RenderingSession};
