//! # Pagination Controller
//!
//! Drives the "load more" control until it stops working. Every rendering
//! failure is folded into a consecutive-failure counter; a success resets it.
//!
//! ```text
//! Idle ──expand──▶ Loading ──ok──▶ Expanded ──expand──▶ Loading ...
//!                     │
//!                     └── failures == budget ──▶ Exhausted (terminal)
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::infrastructure::config::{CrawlingSettings, defaults};
use crate::infrastructure::rendering::{RenderingResult, RenderingSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationState {
    Idle,
    Loading,
    Expanded,
    Exhausted,
}

/// Result of one `expand` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionSignal {
    Continue,
    Exhausted,
}

pub struct PaginationController {
    load_more_selector: String,
    max_consecutive_failures: u32,
    wait_timeout: Duration,
    settle_delay: Duration,
    page: u32,
    consecutive_failures: u32,
    state: PaginationState,
}

impl PaginationController {
    pub fn new(load_more_selector: impl Into<String>, max_consecutive_failures: u32) -> Self {
        Self {
            load_more_selector: load_more_selector.into(),
            max_consecutive_failures: max_consecutive_failures.max(1),
            wait_timeout: Duration::from_secs(defaults::WAIT_TIMEOUT_SECS),
            settle_delay: Duration::from_millis(defaults::SETTLE_DELAY_MS),
            page: 1,
            consecutive_failures: 0,
            state: PaginationState::Idle,
        }
    }

    pub fn from_settings(load_more_selector: &str, settings: &CrawlingSettings) -> Self {
        Self::new(load_more_selector, settings.max_load_more_failures)
            .with_wait_timeout(settings.wait_timeout())
            .with_settle_delay(settings.settle_delay())
    }

    #[must_use]
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == PaginationState::Exhausted
    }

    /// Back to page 1 for a fresh pass over a newly loaded search page.
    pub fn reset(&mut self) {
        self.page = 1;
        self.consecutive_failures = 0;
        self.state = PaginationState::Idle;
    }

    /// Tries to load one more page of results. Never fails; rendering errors
    /// only count towards exhaustion.
    pub async fn expand<S: RenderingSession>(&mut self, session: &mut S) -> ExpansionSignal {
        if self.is_exhausted() {
            return ExpansionSignal::Exhausted;
        }
        self.state = PaginationState::Loading;

        match self.activate_load_more(session).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                self.page += 1;
                self.state = PaginationState::Expanded;
                debug!(page = self.page, "📄 Loaded more results");

                if !self.settle_delay.is_zero() {
                    sleep(self.settle_delay).await;
                }
                ExpansionSignal::Continue
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.max_consecutive_failures {
                    self.state = PaginationState::Exhausted;
                    info!(
                        pages = self.page,
                        failures = self.consecutive_failures,
                        "Pagination exhausted: {}",
                        e
                    );
                    ExpansionSignal::Exhausted
                } else {
                    warn!(
                        failures = self.consecutive_failures,
                        budget = self.max_consecutive_failures,
                        "Load more failed: {}",
                        e
                    );
                    ExpansionSignal::Continue
                }
            }
        }
    }

    /// Calls `expand` until pagination is exhausted; returns the page count.
    pub async fn expand_all<S: RenderingSession>(&mut self, session: &mut S) -> u32 {
        while self.expand(session).await == ExpansionSignal::Continue {}
        self.page
    }

    async fn activate_load_more<S: RenderingSession>(&self, session: &mut S) -> RenderingResult<()> {
        let control = session.wait_for(&self.load_more_selector, self.wait_timeout).await?;
        session.click(&control).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::SelectorSettings;
    use crate::test_utils::{FakeListing, FakeSession};

    fn controller(budget: u32) -> PaginationController {
        PaginationController::new(SelectorSettings::default().load_more, budget)
    }

    #[tokio::test]
    async fn absent_control_exhausts_within_budget() {
        let mut session = FakeSession::with_listings(vec![FakeListing::new("Acme", "Engineer", "desc A")]);
        let mut pagination = controller(3);

        assert_eq!(pagination.expand(&mut session).await, ExpansionSignal::Continue);
        assert_eq!(pagination.expand(&mut session).await, ExpansionSignal::Continue);
        assert_eq!(pagination.consecutive_failures(), 2);
        assert_eq!(pagination.expand(&mut session).await, ExpansionSignal::Exhausted);

        assert!(pagination.is_exhausted());
        assert_eq!(pagination.page(), 1);
        assert_eq!(session.calls.wait_for, 3);
    }

    #[tokio::test]
    async fn exhausted_controller_does_not_touch_the_session() {
        let mut session = FakeSession::with_listings(Vec::new());
        let mut pagination = controller(1);

        assert_eq!(pagination.expand(&mut session).await, ExpansionSignal::Exhausted);
        assert_eq!(pagination.expand(&mut session).await, ExpansionSignal::Exhausted);
        assert_eq!(session.calls.wait_for, 1);
    }

    #[tokio::test]
    async fn always_available_control_never_exhausts() {
        let mut session = FakeSession::with_listings(Vec::new()).with_endless_load_more();
        let mut pagination = controller(3);

        for _ in 0..50 {
            assert_eq!(pagination.expand(&mut session).await, ExpansionSignal::Continue);
        }
        assert_eq!(pagination.page(), 51);
        assert_eq!(pagination.state(), PaginationState::Expanded);
        assert_eq!(session.calls.click, 50);
    }

    #[tokio::test]
    async fn success_resets_failure_counter() {
        let mut session =
            FakeSession::with_listings(Vec::new()).with_load_more_script([false, false, true, false, false, false]);
        let mut pagination = controller(3);

        let pages = pagination.expand_all(&mut session).await;

        assert_eq!(pages, 2);
        assert_eq!(pagination.consecutive_failures(), 3);
        assert_eq!(session.calls.wait_for, 6);
    }

    #[tokio::test]
    async fn loads_every_page_then_exhausts() {
        let mut session = FakeSession::with_pages(vec![
            vec![FakeListing::new("Acme", "Engineer", "desc A")],
            vec![FakeListing::new("Acme", "Analyst", "desc B")],
            vec![FakeListing::new("Globex", "Designer", "desc C")],
        ]);
        let mut pagination = controller(2);

        assert_eq!(pagination.expand_all(&mut session).await, 3);
        assert_eq!(session.visible_listings(), 3);

        pagination.reset();
        assert_eq!(pagination.state(), PaginationState::Idle);
        assert_eq!(pagination.page(), 1);
    }
}
