//! Rendering session capability
//!
//! The crawler never drives a browser directly. It talks to one owned
//! `RenderingSession`. It is not `Clone`: the page holds order-sensitive
//! state (clicking a listing changes what later lookups see), so it is passed
//! around as `&mut`.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the rendering agent.
///
/// Every variant is transient from the crawler's point of view; the retry
/// budgets above this layer decide when to give up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderingError {
    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Timed out after {timeout:?} waiting for {selector}")]
    Timeout { selector: String, timeout: Duration },

    #[error("Attribute '{name}' missing on element")]
    MissingAttribute { name: String },

    #[error("Element is stale or detached: {0}")]
    StaleElement(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Rendering backend error: {0}")]
    Backend(String),
}

impl RenderingError {
    pub fn not_found(selector: &str) -> Self {
        Self::ElementNotFound {
            selector: selector.to_string(),
        }
    }

    pub fn timeout(selector: &str, timeout: Duration) -> Self {
        Self::Timeout {
            selector: selector.to_string(),
            timeout,
        }
    }
}

pub type RenderingResult<T> = Result<T, RenderingError>;

/// Page navigation and element queries over dynamically loaded content.
///
/// Element handles are opaque and only valid until the page content they
/// point into changes.
#[async_trait]
pub trait RenderingSession: Send {
    type Element: Send + Sync;

    /// Loads `url` in the session's page.
    async fn navigate(&mut self, url: &str) -> RenderingResult<()>;

    /// All elements currently matching `selector`, in document order.
    async fn find_all(&mut self, selector: &str) -> RenderingResult<Vec<Self::Element>>;

    /// First descendant of `parent` matching `selector`.
    async fn find_within(
        &mut self,
        parent: &Self::Element,
        selector: &str,
    ) -> RenderingResult<Self::Element>;

    /// Waits at most `timeout` for `selector` to be present.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> RenderingResult<Self::Element>;

    async fn click(&mut self, element: &Self::Element) -> RenderingResult<()>;

    async fn read_text(&mut self, element: &Self::Element) -> RenderingResult<String>;

    async fn read_attribute(&mut self, element: &Self::Element, name: &str) -> RenderingResult<String>;
}
