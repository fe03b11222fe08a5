//! Anchor fetches for the two crawl phases.

use std::time::Duration;

use scraper::Html;
use tracing::debug;

use super::PageDriver;
use crate::error::{DriverError, FetchError};

/// Default time to wait for an anchor element.
pub const DEFAULT_ANCHOR_TIMEOUT: Duration = Duration::from_secs(10);

/// CSS selectors whose presence means the needed data has rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSelectors {
    /// Title page: the element holding the cast list.
    pub discovery: String,
    /// Profile page: the popularity block.
    pub enrichment: String,
}

/// Rendered outer markup of an anchor element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub url: String,
    pub markup: String,
}

impl Anchor {
    /// Parse the markup into a node tree.
    pub fn document(&self) -> Html {
        Html::parse_fragment(&self.markup)
    }
}

/// Fetches anchors through an exclusively owned [`PageDriver`].
///
/// There is no mode flag: discovery and enrichment are separate operations
/// and the caller picks one from its own state. Nothing is retried here.
pub struct PageFetcher<D> {
    driver: D,
    selectors: AnchorSelectors,
    timeout: Duration,
    fetches: u64,
}

impl<D: PageDriver> PageFetcher<D> {
    pub fn new(driver: D, selectors: AnchorSelectors) -> Self {
        Self {
            driver,
            selectors,
            timeout: DEFAULT_ANCHOR_TIMEOUT,
            fetches: 0,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load a title page and return its cast-list anchor.
    pub async fn fetch_discovery_anchor(&mut self, url: &str) -> Result<Anchor, FetchError> {
        let selector = self.selectors.discovery.clone();
        self.fetch_anchor(url, &selector).await
    }

    /// Load a profile page and return its popularity anchor.
    pub async fn fetch_enrichment_anchor(&mut self, url: &str) -> Result<Anchor, FetchError> {
        let selector = self.selectors.enrichment.clone();
        self.fetch_anchor(url, &selector).await
    }

    /// Number of navigations attempted so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub async fn close(&mut self) {
        self.driver.close().await;
    }

    async fn fetch_anchor(&mut self, url: &str, selector: &str) -> Result<Anchor, FetchError> {
        self.fetches += 1;

        self.driver
            .navigate(url)
            .await
            .map_err(|e| driver_failure(url, e))?;

        match self.driver.wait_for_element(selector, self.timeout).await {
            Ok(markup) => {
                debug!("Anchor {} found on {} ({} bytes)", selector, url, markup.len());
                Ok(Anchor {
                    url: url.to_string(),
                    markup,
                })
            }
            Err(DriverError::Timeout(_)) => Err(FetchError::NotFound {
                url: url.to_string(),
                selector: selector.to_string(),
            }),
            Err(e) => Err(driver_failure(url, e)),
        }
    }
}

fn driver_failure(url: &str, e: DriverError) -> FetchError {
    FetchError::DriverFailure {
        url: url.to_string(),
        reason: e.to_string(),
    }
}
