//! # Crawl Orchestrator
//!
//! One strictly sequential crawl pass: expand the result list, enumerate the
//! cards, extract each one and hand it to the store. Individual listing
//! failures are counted and skipped; only a search page that never loads
//! ends the pass early.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::crawling::extraction::ListingExtractor;
use crate::crawling::pagination::PaginationController;
use crate::domain::{ListingRecord, SearchQuery, build_search_url};
use crate::infrastructure::config::{DetailStrategy, HarvesterConfig};
use crate::infrastructure::listing_repository::{ListingStore, PersistOutcome};
use crate::infrastructure::rendering::{RenderingError, RenderingSession};

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Invalid search URL {base_url}: {source}")]
    InvalidSearchUrl {
        base_url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to open search page: {0}")]
    Navigation(#[source] RenderingError),

    #[error("Search page never showed results: {0}")]
    NoResults(#[source] RenderingError),
}

/// Counters for one crawl pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSummary {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub pages_loaded: u32,
    pub processed: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub extraction_failed: usize,
    pub persistence_failed: usize,
}

impl CrawlSummary {
    fn start() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            pages_loaded: 0,
            processed: 0,
            inserted: 0,
            duplicates: 0,
            extraction_failed: 0,
            persistence_failed: 0,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.inserted + self.duplicates
    }

    pub fn failed(&self) -> usize {
        self.extraction_failed + self.persistence_failed
    }

    pub fn duration(&self) -> Option<Duration> {
        self.finished_at
            .and_then(|finished| (finished - self.started_at).to_std().ok())
    }

    fn log(&self) {
        info!(
            session_id = %self.session_id,
            pages = self.pages_loaded,
            processed = self.processed,
            inserted = self.inserted,
            duplicates = self.duplicates,
            extraction_failed = self.extraction_failed,
            persistence_failed = self.persistence_failed,
            "🏁 Crawl finished: {} succeeded, {} failed",
            self.succeeded(),
            self.failed()
        );
    }
}

pub struct CrawlOrchestrator<S: RenderingSession, R: ListingStore> {
    session: S,
    store: R,
    pagination: PaginationController,
    extractor: ListingExtractor,
    listing_selector: String,
    search_base_url: String,
    wait_timeout: Duration,
    detail_strategy: DetailStrategy,
}

impl<S: RenderingSession, R: ListingStore> CrawlOrchestrator<S, R> {
    pub fn new(session: S, store: R, config: &HarvesterConfig) -> Self {
        Self {
            session,
            store,
            pagination: PaginationController::from_settings(&config.selectors.load_more, &config.crawling),
            extractor: ListingExtractor::new(config.selectors.clone(), &config.crawling),
            listing_selector: config.selectors.listing.clone(),
            search_base_url: config.search.base_url.clone(),
            wait_timeout: config.crawling.wait_timeout(),
            detail_strategy: config.crawling.detail_strategy,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn into_parts(self) -> (S, R) {
        (self.session, self.store)
    }

    /// Opens the search page for `query`, waits for the first result and
    /// harvests everything it can load.
    pub async fn run(&mut self, query: &SearchQuery) -> Result<CrawlSummary, CrawlError> {
        let url = build_search_url(&self.search_base_url, query).map_err(|source| {
            CrawlError::InvalidSearchUrl {
                base_url: self.search_base_url.clone(),
                source,
            }
        })?;

        info!(url = %url, "🔍 Opening search page");
        self.session
            .navigate(url.as_str())
            .await
            .map_err(CrawlError::Navigation)?;
        self.session
            .wait_for(&self.listing_selector, self.wait_timeout)
            .await
            .map_err(CrawlError::NoResults)?;

        Ok(self.harvest().await)
    }

    /// Crawls the page the session is currently on.
    pub async fn harvest(&mut self) -> CrawlSummary {
        let mut summary = CrawlSummary::start();
        info!(session_id = %summary.session_id, strategy = ?self.detail_strategy, "🚀 Starting harvest");

        self.pagination.reset();
        summary.pages_loaded = self.pagination.expand_all(&mut self.session).await;

        let elements = match self.session.find_all(&self.listing_selector).await {
            Ok(elements) => elements,
            Err(e) => {
                error!("Failed to enumerate listings: {}", e);
                Vec::new()
            }
        };
        info!(count = elements.len(), pages = summary.pages_loaded, "Enumerated listings");

        match self.detail_strategy {
            DetailStrategy::Inline => self.harvest_inline(&elements, &mut summary).await,
            DetailStrategy::Navigate => self.harvest_by_navigation(&elements, &mut summary).await,
        }

        summary.finished_at = Some(Utc::now());
        summary.log();
        summary
    }

    async fn harvest_inline(&mut self, elements: &[S::Element], summary: &mut CrawlSummary) {
        for (index, element) in elements.iter().enumerate() {
            summary.processed += 1;
            match self.extractor.extract(&mut self.session, element).await {
                Ok(record) => self.store_record(&record, summary).await,
                Err(e) => {
                    summary.extraction_failed += 1;
                    warn!(index, "Skipping listing: {}", e);
                }
            }
        }
    }

    /// Reads every card first; opening detail pages leaves the result list.
    async fn harvest_by_navigation(&mut self, elements: &[S::Element], summary: &mut CrawlSummary) {
        let mut summaries = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            summary.processed += 1;
            match self.extractor.extract_summary(&mut self.session, element).await {
                Ok(listing) => summaries.push(listing),
                Err(e) => {
                    summary.extraction_failed += 1;
                    warn!(index, "Skipping listing: {}", e);
                }
            }
        }

        for listing in summaries {
            let detail_url = listing.detail_url.clone();
            match self.extractor.describe(&mut self.session, listing).await {
                Ok(record) => self.store_record(&record, summary).await,
                Err(e) => {
                    summary.extraction_failed += 1;
                    warn!(detail_url = %detail_url, "Skipping listing: {}", e);
                }
            }
        }
    }

    async fn store_record(&self, record: &ListingRecord, summary: &mut CrawlSummary) {
        match self.store.persist(record).await {
            Ok(PersistOutcome::Inserted { job_id, .. }) => {
                summary.inserted += 1;
                info!(job_id, title = %record.title, company = %record.company_name, "✅ Stored listing");
            }
            Ok(PersistOutcome::AlreadyPresent { job_id, .. }) => {
                summary.duplicates += 1;
                info!(job_id, title = %record.title, "Listing already stored");
            }
            Err(e) => {
                summary.persistence_failed += 1;
                error!(title = %record.title, "Failed to store listing: {}", e);
            }
        }
    }
}
