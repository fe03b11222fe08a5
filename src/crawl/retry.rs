//! Bounded retry around anchor fetches.

use std::time::Duration;

use tracing::warn;

use crate::browser::{Anchor, PageDriver, PageFetcher};
use crate::error::FetchError;

/// Which anchor a fetch is after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovery,
    Enrichment,
}

/// Retries driver failures; missing anchors are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per fetch, first one included.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    pub async fn fetch<D: PageDriver>(
        &self,
        fetcher: &mut PageFetcher<D>,
        phase: Phase,
        url: &str,
    ) -> Result<Anchor, FetchError> {
        let mut attempt = 1;
        loop {
            let result = match phase {
                Phase::Discovery => fetcher.fetch_discovery_anchor(url).await,
                Phase::Enrichment => fetcher.fetch_enrichment_anchor(url).await,
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "Attempt {}/{} failed: {}, retrying",
                        attempt, self.max_attempts, e
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff * attempt).await;
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}
