//! Window-by-window crawl: discover cast, enrich ratings, checkpoint.

mod checkpoint;
mod cursor;
mod progress;
mod registry;
mod retry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub use checkpoint::{BatchCheckpointer, MergeSummary, MERGED_FILE_NAME, PROGRESS_FILE_NAME};
pub use cursor::{Cursor, WindowPlan, DEFAULT_TAIL_SLACK, DEFAULT_WINDOW_SIZE};
pub use progress::CrawlProgress;
pub use registry::{CastRegistry, EnrichStats, Window};
pub use retry::{Phase, RetryPolicy};

use crate::browser::{PageDriver, PageFetcher, DEFAULT_ANCHOR_TIMEOUT};
use crate::error::{CrawlError, Result};
use crate::extract::SiteProfile;
use crate::models::TitleRecord;

/// Where a worker is in the per-window cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlState {
    Discovering(WindowPlan),
    Enriching(WindowPlan),
    Checkpointing(WindowPlan),
    Done,
}

impl CrawlState {
    pub fn window(&self) -> Option<usize> {
        match self {
            CrawlState::Discovering(plan)
            | CrawlState::Enriching(plan)
            | CrawlState::Checkpointing(plan) => Some(plan.index),
            CrawlState::Done => None,
        }
    }
}

/// Progress notifications for a front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEvent {
    WindowStarted { window: usize, titles: usize },
    WindowCompleted {
        window: usize,
        entries: usize,
        rows_done: usize,
        total_rows: usize,
    },
}

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub window_size: usize,
    pub tail_slack: usize,
    /// Concurrent workers, each with its own browser.
    pub workers: usize,
    pub retry: RetryPolicy,
    pub anchor_timeout: Duration,
    /// Merge checkpoints into the output table once every window is done.
    pub merge: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            tail_slack: DEFAULT_TAIL_SLACK,
            workers: 1,
            retry: RetryPolicy::default(),
            anchor_timeout: DEFAULT_ANCHOR_TIMEOUT,
            merge: true,
        }
    }
}

/// Totals for one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub windows: usize,
    pub titles: usize,
    /// Rows dropped for a malformed cast column.
    pub titles_skipped: usize,
    /// Titles whose page could not be loaded.
    pub titles_failed: usize,
    pub entries: usize,
    pub ratings: usize,
    pub ratings_unavailable: usize,
    pub ratings_failed: usize,
    pub merge: Option<MergeSummary>,
}

impl CrawlSummary {
    fn absorb(&mut self, other: CrawlSummary) {
        self.windows += other.windows;
        self.titles += other.titles;
        self.titles_skipped += other.titles_skipped;
        self.titles_failed += other.titles_failed;
        self.entries += other.entries;
        self.ratings += other.ratings;
        self.ratings_unavailable += other.ratings_unavailable;
        self.ratings_failed += other.ratings_failed;
    }
}

/// State shared by all workers of one crawl.
struct Shared {
    titles: Vec<TitleRecord>,
    profile: Arc<dyn SiteProfile>,
    registry: CastRegistry,
    checkpointer: BatchCheckpointer,
    cursor: Mutex<Cursor>,
    progress: Mutex<CrawlProgress>,
    retry: RetryPolicy,
    events: Option<UnboundedSender<CrawlEvent>>,
    /// Set when a worker fails; the others finish their window and stop.
    stop: AtomicBool,
}

impl Shared {
    /// Next window no one has finished yet.
    async fn next_plan(&self) -> Option<WindowPlan> {
        if self.stop.load(Ordering::SeqCst) {
            return None;
        }
        let mut cursor = self.cursor.lock().await;
        loop {
            let plan = cursor.next_window(&self.titles, self.profile.as_ref())?;
            if self.progress.lock().await.is_completed(plan.index) {
                debug!("Window {} already checkpointed, skipping", plan.index);
                continue;
            }
            return Some(plan);
        }
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Drives the crawl over a title table.
pub struct Crawler {
    shared: Arc<Shared>,
    options: CrawlOptions,
}

impl Crawler {
    /// Set up a crawl, resuming from the checkpointer's progress file if
    /// one exists.
    pub fn new(
        titles: Vec<TitleRecord>,
        profile: Arc<dyn SiteProfile>,
        checkpointer: BatchCheckpointer,
        options: CrawlOptions,
    ) -> Result<Self> {
        let total_rows = titles.len();
        let window_size = options.window_size.max(1);

        let progress = match checkpointer.load_progress()? {
            Some(progress) => {
                progress.check_compatible(
                    &checkpointer.progress_path(),
                    total_rows,
                    window_size,
                    options.tail_slack,
                )?;
                info!(
                    "Resuming at row {} of {} (window {})",
                    progress.next_row, total_rows, progress.next_window
                );
                progress
            }
            None => CrawlProgress::new(total_rows, window_size, options.tail_slack),
        };

        let cursor = Cursor::resume(
            total_rows,
            window_size,
            options.tail_slack,
            progress.next_row,
            progress.next_window,
        );

        Ok(Self {
            shared: Arc::new(Shared {
                titles,
                profile,
                registry: CastRegistry::new(),
                checkpointer,
                cursor: Mutex::new(cursor),
                progress: Mutex::new(progress),
                retry: options.retry,
                events: None,
                stop: AtomicBool::new(false),
            }),
            options,
        })
    }

    /// Send [`CrawlEvent`]s to `events` while running.
    pub fn with_events(mut self, events: UnboundedSender<CrawlEvent>) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.events = Some(events);
        }
        self
    }

    pub async fn progress(&self) -> CrawlProgress {
        self.shared.progress.lock().await.clone()
    }

    pub fn total_rows(&self) -> usize {
        self.shared.titles.len()
    }

    /// Crawl every remaining window, then merge if requested.
    ///
    /// `make_driver` is called once per worker.
    pub async fn run<D, F>(&self, mut make_driver: F) -> Result<CrawlSummary>
    where
        D: PageDriver + 'static,
        F: FnMut(usize) -> D,
    {
        let workers = self.options.workers.max(1);
        let anchors = self.shared.profile.anchors();
        let mut summary = CrawlSummary::default();

        if self.shared.progress.lock().await.is_finished() {
            info!("All {} rows already crawled", self.total_rows());
        } else if workers == 1 {
            let fetcher = PageFetcher::new(make_driver(0), anchors)
                .with_timeout(self.options.anchor_timeout);
            summary.absorb(run_worker(self.shared.clone(), 0, fetcher).await?);
        } else {
            info!("Crawling with {} workers", workers);
            let mut set = JoinSet::new();
            for worker in 0..workers {
                let fetcher = PageFetcher::new(make_driver(worker), anchors.clone())
                    .with_timeout(self.options.anchor_timeout);
                set.spawn(run_worker(self.shared.clone(), worker, fetcher));
            }
            let mut failure = None;
            while let Some(joined) = set.join_next().await {
                let outcome = joined
                    .map_err(|e| CrawlError::Other(format!("worker task failed: {}", e)))
                    .and_then(|r| r);
                match outcome {
                    Ok(stats) => summary.absorb(stats),
                    Err(e) if failure.is_none() => {
                        warn!("Worker failed, stopping the others: {}", e);
                        self.shared.stop.store(true, Ordering::SeqCst);
                        failure = Some(e);
                    }
                    Err(e) => warn!("Worker failed: {}", e),
                }
            }
            if let Some(e) = failure {
                return Err(e);
            }
        }

        let finished = self.shared.progress.lock().await.is_finished();
        if self.options.merge && finished {
            let checkpointer = self.shared.checkpointer.clone();
            summary.merge = Some(blocking(move || checkpointer.merge()).await?);
        } else if self.options.merge {
            warn!("Crawl incomplete, leaving window checkpoints unmerged");
        }

        Ok(summary)
    }
}

async fn run_worker<D: PageDriver>(
    shared: Arc<Shared>,
    worker: usize,
    mut fetcher: PageFetcher<D>,
) -> Result<CrawlSummary> {
    let outcome = drive(&shared, worker, &mut fetcher).await;
    fetcher.close().await;
    outcome
}

async fn drive<D: PageDriver>(
    shared: &Shared,
    worker: usize,
    fetcher: &mut PageFetcher<D>,
) -> Result<CrawlSummary> {
    let mut stats = CrawlSummary::default();
    let mut state = match shared.next_plan().await {
        Some(plan) => CrawlState::Discovering(plan),
        None => CrawlState::Done,
    };

    loop {
        debug!("Worker {}: {:?}", worker, state.window());
        state = match state {
            CrawlState::Discovering(plan) => {
                discover(shared, fetcher, &plan, &mut stats).await?;
                CrawlState::Enriching(plan)
            }
            CrawlState::Enriching(plan) => {
                let enriched = shared
                    .registry
                    .enrich(plan.index, fetcher, shared.profile.as_ref(), &shared.retry)
                    .await?;
                stats.ratings += enriched.rated;
                stats.ratings_unavailable += enriched.unavailable;
                stats.ratings_failed += enriched.failed;
                CrawlState::Checkpointing(plan)
            }
            CrawlState::Checkpointing(plan) => {
                checkpoint(shared, &plan, &mut stats).await?;
                match shared.next_plan().await {
                    Some(next) => CrawlState::Discovering(next),
                    None => CrawlState::Done,
                }
            }
            CrawlState::Done => break,
        };
    }

    Ok(stats)
}

async fn discover<D: PageDriver>(
    shared: &Shared,
    fetcher: &mut PageFetcher<D>,
    plan: &WindowPlan,
    stats: &mut CrawlSummary,
) -> Result<()> {
    info!(
        "Window {}: rows {}..{} ({} titles)",
        plan.index,
        plan.start_row,
        plan.end_row,
        plan.targets.len()
    );
    shared.emit(CrawlEvent::WindowStarted {
        window: plan.index,
        titles: plan.targets.len(),
    });
    shared.registry.open(plan.index).await;
    stats.titles_skipped += plan.skipped;

    for target in &plan.targets {
        let entries = match shared
            .retry
            .fetch(fetcher, Phase::Discovery, &target.url)
            .await
        {
            Ok(anchor) => {
                let links = shared.profile.extract_cast(&anchor.document());
                if links.is_empty() {
                    warn!("No cast found for {}", target.title_id);
                }
                let matched = links
                    .iter()
                    .filter(|link| target.cast_hint.iter().any(|name| name == link.name.trim()))
                    .count();
                debug!(
                    "{}: {} cast links, {} of {} expected names",
                    target.title_id,
                    links.len(),
                    matched,
                    target.cast_hint.len()
                );
                links
                    .iter()
                    .filter_map(|link| shared.profile.resolve_cast_link(link))
                    .collect()
            }
            Err(e) => {
                warn!("Skipping title {} (row {}): {}", target.title_id, target.row, e);
                stats.titles_failed += 1;
                Vec::new()
            }
        };

        stats.entries += shared.registry.add_cast(plan.index, entries).await?;
        stats.titles += 1;
    }

    Ok(())
}

async fn checkpoint(shared: &Shared, plan: &WindowPlan, stats: &mut CrawlSummary) -> Result<()> {
    let titles = shared.registry.take(plan.index).await?;
    let entries: usize = titles.iter().map(Vec::len).sum();

    let checkpointer = shared.checkpointer.clone();
    let index = plan.index;
    match blocking(move || checkpointer.checkpoint(index, &titles)).await {
        Ok(_) => {}
        Err(CrawlError::NoDataToWrite(window)) => {
            warn!("Window {} produced no cast entries, nothing written", window);
        }
        Err(e) => return Err(e),
    }

    // Held across the write so saves land in completion order.
    let mut progress = shared.progress.lock().await;
    progress.complete(plan.index, plan.end_row);
    let record = progress.clone();
    let checkpointer = shared.checkpointer.clone();
    blocking(move || checkpointer.save_progress(&record)).await?;
    stats.windows += 1;

    shared.emit(CrawlEvent::WindowCompleted {
        window: plan.index,
        entries,
        rows_done: progress.next_row,
        total_rows: progress.total_rows,
    });
    Ok(())
}

/// Run checkpoint file I/O on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CrawlError::Other(format!("blocking task failed: {}", e)))?
}
