//! In-memory cast lists for the windows currently in flight.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::retry::{Phase, RetryPolicy};
use crate::browser::{PageDriver, PageFetcher};
use crate::error::{CrawlError, Result};
use crate::extract::SiteProfile;
use crate::models::CastEntry;

/// Cast lists of one window, one list per discovered title.
#[derive(Debug, Clone, Default)]
pub struct Window {
    titles: Vec<Vec<CastEntry>>,
    seen: HashSet<String>,
}

impl Window {
    pub fn titles(&self) -> &[Vec<CastEntry>] {
        &self.titles
    }

    pub fn entry_count(&self) -> usize {
        self.titles.iter().map(Vec::len).sum()
    }

    pub fn contains(&self, actor_id: &str) -> bool {
        self.seen.contains(actor_id)
    }
}

/// Counts from one enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    /// Entries already ranked and left alone.
    pub skipped: usize,
    pub rated: usize,
    /// Profile loaded but no rank published.
    pub unavailable: usize,
    pub failed: usize,
}

/// Per-window cast lists, keyed by window index.
///
/// Each window sits behind its own lock so workers on different windows
/// never contend.
#[derive(Debug, Default)]
pub struct CastRegistry {
    windows: RwLock<HashMap<usize, Arc<Mutex<Window>>>>,
}

impl CastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a window. Reopening keeps what is already there.
    pub async fn open(&self, window: usize) -> Arc<Mutex<Window>> {
        let mut windows = self.windows.write().await;
        windows.entry(window).or_default().clone()
    }

    async fn get(&self, window: usize) -> Result<Arc<Mutex<Window>>> {
        self.windows
            .read()
            .await
            .get(&window)
            .cloned()
            .ok_or(CrawlError::UnknownWindow(window))
    }

    /// Record one title's cast, dropping actors already in the window.
    ///
    /// Returns how many entries were kept.
    pub async fn add_cast(&self, window: usize, entries: Vec<CastEntry>) -> Result<usize> {
        let slot = self.get(window).await?;
        let mut slot = slot.lock().await;

        let mut kept = Vec::with_capacity(entries.len());
        for entry in entries {
            if slot.seen.insert(entry.actor_id.clone()) {
                kept.push(entry);
            } else {
                debug!("Window {}: {} already listed", window, entry.actor_id);
            }
        }

        let count = kept.len();
        slot.titles.push(kept);
        Ok(count)
    }

    /// Fill in ratings for every unranked entry in the window.
    ///
    /// Already-ranked entries are skipped, so a second pass only retries
    /// what is still missing. A failed profile fetch leaves that entry
    /// unranked and moves on.
    pub async fn enrich<D: PageDriver>(
        &self,
        window: usize,
        fetcher: &mut PageFetcher<D>,
        profile: &dyn SiteProfile,
        retry: &RetryPolicy,
    ) -> Result<EnrichStats> {
        let slot = self.get(window).await?;
        let mut slot = slot.lock().await;
        let mut stats = EnrichStats::default();

        for entry in slot.titles.iter_mut().flatten() {
            if entry.is_ranked() {
                stats.skipped += 1;
                continue;
            }

            match retry
                .fetch(fetcher, Phase::Enrichment, &entry.profile_url)
                .await
            {
                Ok(anchor) => {
                    let rating = profile.extract_rating(&anchor.document());
                    if rating.is_available() {
                        stats.rated += 1;
                    } else {
                        debug!("No rank published for {}", entry.actor_id);
                        stats.unavailable += 1;
                    }
                    entry.apply_rating(rating);
                }
                Err(e) => {
                    warn!(
                        "Skipping rating for {} ({}): {}",
                        entry.actor_name, entry.actor_id, e
                    );
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    /// Copy of a window's cast lists.
    pub async fn snapshot(&self, window: usize) -> Option<Vec<Vec<CastEntry>>> {
        let slot = self.windows.read().await.get(&window).cloned()?;
        let titles = slot.lock().await.titles.clone();
        Some(titles)
    }

    /// Stop tracking a window and hand back its cast lists.
    pub async fn take(&self, window: usize) -> Result<Vec<Vec<CastEntry>>> {
        let slot = self
            .windows
            .write()
            .await
            .remove(&window)
            .ok_or(CrawlError::UnknownWindow(window))?;
        let mut slot = slot.lock().await;
        Ok(std::mem::take(&mut slot.titles))
    }

    pub async fn open_windows(&self) -> usize {
        self.windows.read().await.len()
    }
}
