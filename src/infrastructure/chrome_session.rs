//! Chromium-backed rendering session
//!
//! Thin adapter from `RenderingSession` onto one chromiumoxide page. The
//! browser's CDP handler runs on its own tokio task for the lifetime of the
//! session.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use url::Url;

use super::config::BrowserSettings;
use super::rendering::{RenderingError, RenderingResult, RenderingSession};

const JS_CLICK: &str = "function() { this.click(); }";

pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    poll_interval: Duration,
}

fn backend<E: std::fmt::Display>(error: E) -> RenderingError {
    RenderingError::Backend(error.to_string())
}

impl ChromeSession {
    /// Launches a browser and opens the single page this session drives.
    pub async fn launch(settings: &BrowserSettings) -> RenderingResult<Self> {
        let mut builder =
            BrowserConfig::builder().window_size(settings.window_width, settings.window_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(RenderingError::Backend)?;

        info!(headless = settings.headless, "🌐 Launching browser");
        let (browser, mut handler) = Browser::launch(config).await.map_err(backend)?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler event error: {}", e);
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(backend)?;

        Ok(Self {
            browser,
            page,
            handler_task,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
        })
    }

    /// Closes the browser and waits for the handler task to drain.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        if let Err(e) = self.handler_task.await {
            warn!("Browser handler task ended abnormally: {}", e);
        }
    }

    /// `href` values are resolved against the current page so callers always
    /// receive absolute URLs.
    async fn resolve_against_page(&self, value: String) -> String {
        let Ok(Some(current)) = self.page.url().await else {
            return value;
        };
        match Url::parse(&current).and_then(|base| base.join(&value)) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => value,
        }
    }
}

#[async_trait]
impl RenderingSession for ChromeSession {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> RenderingResult<()> {
        debug!(url, "Navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| RenderingError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn find_all(&mut self, selector: &str) -> RenderingResult<Vec<Element>> {
        self.page.find_elements(selector).await.map_err(backend)
    }

    async fn find_within(&mut self, parent: &Element, selector: &str) -> RenderingResult<Element> {
        parent
            .find_element(selector)
            .await
            .map_err(|_| RenderingError::not_found(selector))
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> RenderingResult<Element> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(RenderingError::timeout(selector, timeout));
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn click(&mut self, element: &Element) -> RenderingResult<()> {
        // Dispatched through JS so overlays covering the element do not
        // swallow the click.
        element
            .call_js_fn(JS_CLICK, false)
            .await
            .map_err(|e| RenderingError::StaleElement(e.to_string()))?;
        Ok(())
    }

    async fn read_text(&mut self, element: &Element) -> RenderingResult<String> {
        let text = element.inner_text().await.map_err(backend)?;
        Ok(text.unwrap_or_default())
    }

    async fn read_attribute(&mut self, element: &Element, name: &str) -> RenderingResult<String> {
        let value = element
            .attribute(name)
            .await
            .map_err(backend)?
            .ok_or_else(|| RenderingError::MissingAttribute {
                name: name.to_string(),
            })?;

        if name == "href" {
            Ok(self.resolve_against_page(value).await)
        } else {
            Ok(value)
        }
    }
}
