//! # Listing Extraction
//!
//! Turns one result card into a `ListingRecord`. Cards are read from a live
//! page, so lookups fail transiently (stale handles, late rendering); every
//! operation here runs inside a bounded retry loop and either returns a
//! complete value or `ExtractionError::Exhausted`.

use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::domain::{ListingRecord, ListingSummary};
use crate::infrastructure::config::{CrawlingSettings, SelectorSettings};
use crate::infrastructure::rendering::{RenderingError, RenderingResult, RenderingSession};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Lookup of '{field}' failed: {source}")]
    Lookup {
        field: &'static str,
        #[source]
        source: RenderingError,
    },

    #[error("Required field '{field}' is empty")]
    EmptyField { field: &'static str },

    #[error("Detail fetch failed: {0}")]
    Detail(#[source] RenderingError),

    #[error("Gave up after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        last_error: Box<ExtractionError>,
    },
}

impl ExtractionError {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

fn lookup(field: &'static str) -> impl FnOnce(RenderingError) -> ExtractionError {
    move |source| ExtractionError::Lookup { field, source }
}

/// Attempt counter shared by the three retrying operations.
struct RetryBudget {
    attempt: u32,
    max_tries: u32,
    backoff: Duration,
}

impl RetryBudget {
    /// Records a failed attempt. Sleeps the backoff and returns `Ok` while
    /// attempts remain, otherwise returns the terminal error without sleeping.
    async fn fail(&mut self, target: &str, error: ExtractionError) -> Result<(), ExtractionError> {
        if self.attempt >= self.max_tries {
            return Err(ExtractionError::Exhausted {
                attempts: self.attempt,
                last_error: Box::new(error),
            });
        }

        warn!(
            attempt = self.attempt,
            max_tries = self.max_tries,
            "Extraction of {} failed, retrying: {}",
            target,
            error
        );
        if !self.backoff.is_zero() {
            sleep(self.backoff).await;
        }
        self.attempt += 1;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ListingExtractor {
    selectors: SelectorSettings,
    max_tries: u32,
    backoff: Duration,
    wait_timeout: Duration,
}

impl ListingExtractor {
    pub fn new(selectors: SelectorSettings, settings: &CrawlingSettings) -> Self {
        Self {
            selectors,
            max_tries: settings.extraction_max_tries.max(1),
            backoff: settings.extraction_backoff(),
            wait_timeout: settings.wait_timeout(),
        }
    }

    #[must_use]
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries.max(1);
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    fn budget(&self) -> RetryBudget {
        RetryBudget {
            attempt: 1,
            max_tries: self.max_tries,
            backoff: self.backoff,
        }
    }

    /// Card fields plus the inline detail panel text.
    pub async fn extract<S: RenderingSession>(
        &self,
        session: &mut S,
        element: &S::Element,
    ) -> Result<ListingRecord, ExtractionError> {
        let mut budget = self.budget();
        loop {
            match self.try_extract(session, element).await {
                Ok(record) => return Ok(record),
                Err(e) => budget.fail("listing", e).await?,
            }
        }
    }

    /// Card fields only; the page is left untouched.
    pub async fn extract_summary<S: RenderingSession>(
        &self,
        session: &mut S,
        element: &S::Element,
    ) -> Result<ListingSummary, ExtractionError> {
        let mut budget = self.budget();
        loop {
            match self.read_summary(session, element).await {
                Ok(summary) => return Ok(summary),
                Err(e) => budget.fail("listing summary", e).await?,
            }
        }
    }

    /// Completes `summary` by opening its detail URL.
    pub async fn describe<S: RenderingSession>(
        &self,
        session: &mut S,
        summary: ListingSummary,
    ) -> Result<ListingRecord, ExtractionError> {
        let mut budget = self.budget();
        loop {
            match self.fetch_detail_by_navigation(session, &summary.detail_url).await {
                Ok(description) => return Ok(summary.with_description(description)),
                Err(e) => budget.fail("detail page", ExtractionError::Detail(e)).await?,
            }
        }
    }

    /// Clicks the card and reads the detail panel it opens.
    ///
    /// The panel is looked up by a page-level selector, so a slow render may
    /// still show the previously clicked listing.
    pub async fn fetch_inline_description<S: RenderingSession>(
        &self,
        session: &mut S,
        element: &S::Element,
    ) -> RenderingResult<String> {
        session.click(element).await?;
        self.read_description(session).await
    }

    pub async fn fetch_detail_by_navigation<S: RenderingSession>(
        &self,
        session: &mut S,
        detail_url: &str,
    ) -> RenderingResult<String> {
        session.navigate(detail_url).await?;
        self.read_description(session).await
    }

    async fn read_description<S: RenderingSession>(&self, session: &mut S) -> RenderingResult<String> {
        let panel = session
            .wait_for(&self.selectors.description, self.wait_timeout)
            .await?;
        let text = session.read_text(&panel).await?;
        Ok(text.trim().to_string())
    }

    async fn try_extract<S: RenderingSession>(
        &self,
        session: &mut S,
        element: &S::Element,
    ) -> Result<ListingRecord, ExtractionError> {
        let summary = self.read_summary(session, element).await?;
        let description = self
            .fetch_inline_description(session, element)
            .await
            .map_err(ExtractionError::Detail)?;
        Ok(summary.with_description(description))
    }

    async fn read_summary<S: RenderingSession>(
        &self,
        session: &mut S,
        element: &S::Element,
    ) -> Result<ListingSummary, ExtractionError> {
        let company_name = self
            .read_field(session, element, "company_name", &self.selectors.company_name)
            .await?;
        let location = self
            .read_field(session, element, "location", &self.selectors.location)
            .await?;

        let title_link = session
            .find_within(element, &self.selectors.title_link)
            .await
            .map_err(lookup("title"))?;
        let title = session
            .read_text(&title_link)
            .await
            .map_err(lookup("title"))?
            .trim()
            .to_string();
        let detail_url = session
            .read_attribute(&title_link, "href")
            .await
            .map_err(lookup("detail_url"))?
            .trim()
            .to_string();

        let posted_date = self
            .read_field(session, element, "posted_date", &self.selectors.posted_date)
            .await?;

        if company_name.is_empty() {
            return Err(ExtractionError::EmptyField { field: "company_name" });
        }
        if title.is_empty() {
            return Err(ExtractionError::EmptyField { field: "title" });
        }

        debug!(company = %company_name, title = %title, "Read listing card");
        Ok(ListingSummary {
            company_name,
            location,
            title,
            posted_date,
            detail_url,
        })
    }

    async fn read_field<S: RenderingSession>(
        &self,
        session: &mut S,
        element: &S::Element,
        field: &'static str,
        selector: &str,
    ) -> Result<String, ExtractionError> {
        let node = session
            .find_within(element, selector)
            .await
            .map_err(lookup(field))?;
        let text = session.read_text(&node).await.map_err(lookup(field))?;
        Ok(text.trim().to_string())
    }
}
