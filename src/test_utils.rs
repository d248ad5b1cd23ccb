//! Test utilities for the harvester
//!
//! - `TestDatabase`: isolated in-memory SQLite store with the schema applied
//! - `FakeSession`: scripted `RenderingSession` over a list of fake result cards
//!
//! Public (not `cfg(test)`) so the integration tests under `tests/` can use them.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::ListingRecord;
use crate::infrastructure::config::{HarvesterConfig, SelectorSettings};
use crate::infrastructure::database_connection::DatabaseConnection;
use crate::infrastructure::listing_repository::SqliteListingRepository;
use crate::infrastructure::rendering::{RenderingError, RenderingResult, RenderingSession};

/// Test database configuration
pub struct TestDatabase {
    connection: DatabaseConnection,
}

impl TestDatabase {
    /// Fresh, migrated in-memory database; every call is isolated.
    pub async fn new() -> Result<Self> {
        let connection = DatabaseConnection::new("sqlite::memory:").await?;
        connection.migrate().await?;
        Ok(Self { connection })
    }

    pub fn pool(&self) -> &SqlitePool {
        self.connection.pool()
    }

    pub fn repository(&self) -> SqliteListingRepository {
        SqliteListingRepository::new(self.pool().clone())
    }
}

/// Default configuration without backoff pauses.
pub fn test_config() -> HarvesterConfig {
    let mut config = HarvesterConfig::default();
    config.crawling.extraction_backoff_ms = 0;
    config.crawling.settle_delay_ms = 0;
    config.logging.file_output = false;
    config
}

/// One scripted result card.
#[derive(Debug, Clone)]
pub struct FakeListing {
    pub company_name: String,
    pub location: String,
    pub title: String,
    pub posted_date: String,
    pub detail_url: String,
    pub description: String,
    /// Company lookups that fail before the card reads cleanly
    pub lookup_failures: u32,
    /// Navigations to `detail_url` that fail before the page opens
    pub detail_failures: u32,
}

impl FakeListing {
    pub fn new(company_name: &str, title: &str, description: &str) -> Self {
        let slug: String = format!("{}-{}", company_name.trim(), title.trim())
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        Self {
            company_name: company_name.to_string(),
            location: "New York, NY".to_string(),
            title: title.to_string(),
            posted_date: "Posted today".to_string(),
            detail_url: format!("https://jobs.example.com/view/{slug}"),
            description: description.to_string(),
            lookup_failures: 0,
            detail_failures: 0,
        }
    }

    #[must_use]
    pub fn failing(mut self, lookup_failures: u32) -> Self {
        self.lookup_failures = lookup_failures;
        self
    }

    #[must_use]
    pub fn failing_detail(mut self, detail_failures: u32) -> Self {
        self.detail_failures = detail_failures;
        self
    }

    /// The record a successful extraction of this card yields.
    pub fn expected_record(&self) -> ListingRecord {
        ListingRecord {
            company_name: self.company_name.trim().to_string(),
            location: self.location.trim().to_string(),
            title: self.title.trim().to_string(),
            posted_date: self.posted_date.trim().to_string(),
            detail_url: self.detail_url.trim().to_string(),
            description: self.description.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeField {
    CompanyName,
    Location,
    TitleLink,
    PostedDate,
}

/// Opaque handle returned by `FakeSession`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeElement {
    Listing(usize),
    Field { listing: usize, field: FakeField },
    LoadMore,
    DetailPanel(usize),
}

/// Per-operation call counters
#[derive(Debug, Clone, Default)]
pub struct FakeCalls {
    pub navigate: usize,
    pub find_all: usize,
    pub find_within: usize,
    pub wait_for: usize,
    pub click: usize,
    pub read_text: usize,
    pub read_attribute: usize,
}

enum LoadMore {
    /// Present while unloaded pages remain
    UntilLastPage,
    /// Presence per lookup; absent once the script runs out
    Scripted(VecDeque<bool>),
    Endless,
}

/// Scripted rendering session.
///
/// Listings are grouped into pages; the first page is visible up front and
/// each "load more" click reveals the next. Clicking a card (or navigating to
/// its detail URL) makes its description the content of the detail panel.
pub struct FakeSession {
    selectors: SelectorSettings,
    listings: Vec<FakeListing>,
    hidden_pages: VecDeque<usize>,
    visible: usize,
    load_more: LoadMore,
    panel: Option<usize>,
    fail_enumeration: bool,
    fail_navigation: bool,
    pub visited: Vec<String>,
    pub calls: FakeCalls,
}

impl FakeSession {
    pub fn with_listings(listings: Vec<FakeListing>) -> Self {
        Self::with_pages(vec![listings])
    }

    pub fn with_pages(pages: Vec<Vec<FakeListing>>) -> Self {
        let mut hidden_pages: VecDeque<usize> = pages.iter().map(Vec::len).collect();
        let visible = hidden_pages.pop_front().unwrap_or(0);
        Self {
            selectors: SelectorSettings::default(),
            listings: pages.into_iter().flatten().collect(),
            hidden_pages,
            visible,
            load_more: LoadMore::UntilLastPage,
            panel: None,
            fail_enumeration: false,
            fail_navigation: false,
            visited: Vec::new(),
            calls: FakeCalls::default(),
        }
    }

    #[must_use]
    pub fn with_selectors(mut self, selectors: SelectorSettings) -> Self {
        self.selectors = selectors;
        self
    }

    #[must_use]
    pub fn with_load_more_script(mut self, script: impl IntoIterator<Item = bool>) -> Self {
        self.load_more = LoadMore::Scripted(script.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_endless_load_more(mut self) -> Self {
        self.load_more = LoadMore::Endless;
        self
    }

    #[must_use]
    pub fn with_failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    #[must_use]
    pub fn with_failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn visible_listings(&self) -> usize {
        self.visible
    }

    fn load_more_present(&mut self) -> bool {
        match &mut self.load_more {
            LoadMore::UntilLastPage => !self.hidden_pages.is_empty(),
            LoadMore::Scripted(script) => script.pop_front().unwrap_or(false),
            LoadMore::Endless => true,
        }
    }

    fn field_for(&self, selector: &str) -> Option<FakeField> {
        if selector == self.selectors.company_name {
            Some(FakeField::CompanyName)
        } else if selector == self.selectors.location {
            Some(FakeField::Location)
        } else if selector == self.selectors.title_link {
            Some(FakeField::TitleLink)
        } else if selector == self.selectors.posted_date {
            Some(FakeField::PostedDate)
        } else {
            None
        }
    }

    fn listing(&self, index: usize) -> RenderingResult<&FakeListing> {
        self.listings
            .get(index)
            .ok_or_else(|| RenderingError::StaleElement(format!("listing {index}")))
    }
}

#[async_trait]
impl RenderingSession for FakeSession {
    type Element = FakeElement;

    async fn navigate(&mut self, url: &str) -> RenderingResult<()> {
        self.calls.navigate += 1;
        self.visited.push(url.to_string());

        let navigation_error = || RenderingError::Navigation {
            url: url.to_string(),
            reason: "scripted failure".to_string(),
        };
        if self.fail_navigation {
            return Err(navigation_error());
        }

        self.panel = None;
        if let Some(index) = self.listings.iter().position(|l| l.detail_url == url) {
            let listing = &mut self.listings[index];
            if listing.detail_failures > 0 {
                listing.detail_failures -= 1;
                return Err(navigation_error());
            }
            self.panel = Some(index);
        }
        Ok(())
    }

    async fn find_all(&mut self, selector: &str) -> RenderingResult<Vec<FakeElement>> {
        self.calls.find_all += 1;
        if self.fail_enumeration {
            return Err(RenderingError::Backend("scripted enumeration failure".to_string()));
        }
        if selector == self.selectors.listing {
            Ok((0..self.visible).map(FakeElement::Listing).collect())
        } else {
            Ok(Vec::new())
        }
    }

    async fn find_within(&mut self, parent: &FakeElement, selector: &str) -> RenderingResult<FakeElement> {
        self.calls.find_within += 1;
        let FakeElement::Listing(index) = *parent else {
            return Err(RenderingError::not_found(selector));
        };
        let field = self
            .field_for(selector)
            .ok_or_else(|| RenderingError::not_found(selector))?;

        if field == FakeField::CompanyName {
            let listing = self
                .listings
                .get_mut(index)
                .ok_or_else(|| RenderingError::StaleElement(format!("listing {index}")))?;
            if listing.lookup_failures > 0 {
                listing.lookup_failures -= 1;
                return Err(RenderingError::StaleElement(format!("listing {index}")));
            }
        }
        Ok(FakeElement::Field { listing: index, field })
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> RenderingResult<FakeElement> {
        self.calls.wait_for += 1;
        let found = if selector == self.selectors.load_more {
            self.load_more_present().then_some(FakeElement::LoadMore)
        } else if selector == self.selectors.description {
            self.panel.map(FakeElement::DetailPanel)
        } else if selector == self.selectors.listing {
            (self.visible > 0).then_some(FakeElement::Listing(0))
        } else {
            None
        };
        found.ok_or_else(|| RenderingError::timeout(selector, timeout))
    }

    async fn click(&mut self, element: &FakeElement) -> RenderingResult<()> {
        self.calls.click += 1;
        match element {
            FakeElement::LoadMore => {
                if let Some(revealed) = self.hidden_pages.pop_front() {
                    self.visible += revealed;
                }
            }
            FakeElement::Listing(index) => {
                self.listing(*index)?;
                self.panel = Some(*index);
            }
            FakeElement::Field { .. } | FakeElement::DetailPanel(_) => {}
        }
        Ok(())
    }

    async fn read_text(&mut self, element: &FakeElement) -> RenderingResult<String> {
        self.calls.read_text += 1;
        let text = match element {
            FakeElement::Listing(index) => self.listing(*index)?.title.clone(),
            FakeElement::Field { listing, field } => {
                let listing = self.listing(*listing)?;
                match field {
                    FakeField::CompanyName => listing.company_name.clone(),
                    FakeField::Location => listing.location.clone(),
                    FakeField::TitleLink => listing.title.clone(),
                    FakeField::PostedDate => listing.posted_date.clone(),
                }
            }
            FakeElement::LoadMore => "Load more jobs".to_string(),
            FakeElement::DetailPanel(index) => self.listing(*index)?.description.clone(),
        };
        Ok(text)
    }

    async fn read_attribute(&mut self, element: &FakeElement, name: &str) -> RenderingResult<String> {
        self.calls.read_attribute += 1;
        match element {
            FakeElement::Field {
                listing,
                field: FakeField::TitleLink,
            } if name == "href" => Ok(self.listing(*listing)?.detail_url.clone()),
            _ => Err(RenderingError::MissingAttribute {
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = TestDatabase::new().await.unwrap();
        assert!(!db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_multiple_databases_are_isolated() {
        let db1 = TestDatabase::new().await.unwrap();
        let db2 = TestDatabase::new().await.unwrap();

        sqlx::query("INSERT INTO companies (name) VALUES ('Acme')")
            .execute(db1.pool())
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM companies")
            .fetch_one(db2.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn fake_session_reveals_pages_on_load_more() {
        let mut session = FakeSession::with_pages(vec![
            vec![FakeListing::new("Acme", "Engineer", "desc A")],
            vec![FakeListing::new("Acme", "Analyst", "desc B")],
        ]);
        let selectors = SelectorSettings::default();

        assert_eq!(session.find_all(&selectors.listing).await.unwrap().len(), 1);
        let control = session
            .wait_for(&selectors.load_more, Duration::from_secs(1))
            .await
            .unwrap();
        session.click(&control).await.unwrap();

        assert_eq!(session.find_all(&selectors.listing).await.unwrap().len(), 2);
        assert!(session.wait_for(&selectors.load_more, Duration::from_secs(1)).await.is_err());
    }
}
