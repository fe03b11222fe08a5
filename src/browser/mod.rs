//! Browser session boundary and the anchor fetcher built on it.
//!
//! The crawler only depends on [`PageDriver`]: navigate the single tab to a
//! URL, then wait for an element and hand back its rendered outer markup.
//! [`ChromeDriver`] implements it over CDP with chromiumoxide.

mod chrome;
mod config;
mod fetcher;
mod stealth;

use std::time::Duration;

use async_trait::async_trait;

pub use chrome::ChromeDriver;
pub use config::{BrowserEngineConfig, BrowserEngineType};
pub use fetcher::{Anchor, AnchorSelectors, PageFetcher, DEFAULT_ANCHOR_TIMEOUT};

use crate::error::DriverError;

/// A single browser tab driven by the crawler.
///
/// Implementations own their session exclusively, so calls are strictly
/// sequential on one driver.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate the active tab to `url`.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Wait until `selector` matches an element and return its outer markup.
    ///
    /// Returns [`DriverError::Timeout`] if nothing matched before `timeout`.
    async fn wait_for_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<String, DriverError>;

    /// Release the session.
    async fn close(&mut self) {}
}
