//! End-to-end crawls against a scripted in-memory browser.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::tempdir;

use starscrape::browser::PageDriver;
use starscrape::crawl::{
    BatchCheckpointer, CrawlOptions, CrawlProgress, Crawler, RetryPolicy, MERGED_FILE_NAME,
};
use starscrape::error::{CrawlError, DriverError};
use starscrape::extract::{actor_id_from_href, SelectorConfig, SelectorProfile};
use starscrape::models::{CastEntry, TitleRecord};

/// Pages the scripted browser can serve.
#[derive(Default)]
struct Site {
    /// Title id -> (actor id, name) of its starring cast.
    casts: HashMap<String, Vec<(String, String)>>,
    /// Actor id -> (rank, signed change).
    ranks: HashMap<String, (u64, i64)>,
    /// Ids whose pages always fail to load.
    broken: HashSet<String>,
}

impl Site {
    fn title(mut self, title_id: &str, cast: &[(&str, &str)]) -> Self {
        self.casts.insert(
            title_id.to_string(),
            cast.iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
        );
        for (id, _) in cast {
            self.ranks.entry(id.to_string()).or_insert((100, 5));
        }
        self
    }

    fn broken(mut self, id: &str) -> Self {
        self.broken.insert(id.to_string());
        self
    }

    fn title_page(&self, title_id: &str) -> Option<String> {
        let cast = self.casts.get(title_id)?;
        let links: String = cast
            .iter()
            .map(|(id, name)| format!(r#"<li><a href="/name/{}/?ref_=tt_ov_st">{}</a></li>"#, id, name))
            .collect();
        Some(format!(
            r#"<li class="ipc-metadata-list__item">
                 <a href="/title/{}/fullcredits/cast">Stars</a>
                 <div><ul>{}</ul></div>
               </li>"#,
            title_id, links
        ))
    }

    fn profile_page(&self, actor_id: &str) -> Option<String> {
        let (rank, delta) = self.ranks.get(actor_id)?;
        let icon = if *delta < 0 {
            "ipc-icon--popularity-down"
        } else {
            "ipc-icon--popularity-up"
        };
        Some(format!(
            r#"<div class="starmeter-content">
                 <span class="starmeter-current-rank">{}</span>
                 <svg class="ipc-icon {}"></svg><span>change</span><span>{}</span>
               </div>"#,
            rank,
            icon,
            delta.abs()
        ))
    }
}

/// One scripted tab; every navigation is recorded in `log`.
struct ScriptedDriver {
    site: Arc<Site>,
    log: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicUsize>,
    current: String,
}

impl ScriptedDriver {
    fn new(site: Arc<Site>, log: Arc<Mutex<Vec<String>>>, closed: Arc<AtomicUsize>) -> Self {
        Self {
            site,
            log,
            closed,
            current: String::new(),
        }
    }
}

#[async_trait]
impl PageDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.log.lock().unwrap().push(url.to_string());
        let id = page_id(url);
        if self.site.broken.contains(&id) {
            return Err(DriverError::Session("tab crashed".to_string()));
        }
        self.current = url.to_string();
        Ok(())
    }

    async fn wait_for_element(
        &mut self,
        _selector: &str,
        timeout: Duration,
    ) -> Result<String, DriverError> {
        let id = page_id(&self.current);
        let page = if self.current.contains("/title/") {
            self.site.title_page(&id)
        } else {
            self.site.profile_page(&id)
        };
        page.ok_or(DriverError::Timeout(timeout.as_secs()))
    }

    async fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn page_id(url: &str) -> String {
    actor_id_from_href(url).unwrap_or_default()
}

fn titles(ids: &[&str]) -> Vec<TitleRecord> {
    ids.iter()
        .map(|id| TitleRecord::new(id.to_string(), Some("Someone"), Some("Cast A, Cast B")))
        .collect()
}

fn options(workers: usize, merge: bool) -> CrawlOptions {
    CrawlOptions {
        workers,
        merge,
        retry: RetryPolicy {
            max_attempts: 2,
            backoff: Duration::ZERO,
        },
        anchor_timeout: Duration::from_millis(10),
        ..CrawlOptions::default()
    }
}

fn crawler(titles: Vec<TitleRecord>, dir: &Path, options: CrawlOptions) -> Crawler {
    let profile = SelectorProfile::new(SelectorConfig::default()).unwrap();
    Crawler::new(titles, Arc::new(profile), BatchCheckpointer::new(dir), options).unwrap()
}

async fn run(crawler: &Crawler, site: Arc<Site>) -> (starscrape::crawl::CrawlSummary, Vec<String>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicUsize::new(0));
    let summary = crawler
        .run(|_| ScriptedDriver::new(site.clone(), log.clone(), closed.clone()))
        .await
        .unwrap();
    let visited = log.lock().unwrap().clone();
    (summary, visited)
}

fn read_rows(path: &Path) -> Vec<CastEntry> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize()
        .map(|row| row.unwrap())
        .collect()
}

fn ten_title_site() -> (Vec<TitleRecord>, Site) {
    let ids: Vec<String> = (1..=10).map(|i| format!("tt{:07}", i)).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let mut site = Site::default();
    for (i, id) in ids.iter().enumerate() {
        let lead = format!("nm{:07}", i * 2);
        let support = format!("nm{:07}", i * 2 + 1);
        site = site.title(id, &[(lead.as_str(), "Lead"), (support.as_str(), "Support")]);
    }
    (titles(&id_refs), site)
}

#[tokio::test]
async fn test_full_crawl_checkpoints_and_merges() {
    let dir = tempdir().unwrap();
    let (titles, site) = ten_title_site();
    let crawler = crawler(titles, dir.path(), options(1, true));

    let (summary, visited) = run(&crawler, Arc::new(site)).await;

    assert_eq!(summary.windows, 3);
    assert_eq!(summary.titles, 10);
    assert_eq!(summary.entries, 20);
    assert_eq!(summary.ratings, 20);
    // 10 title pages and 20 profiles, each loaded once
    assert_eq!(visited.len(), 30);

    let merged = summary.merge.unwrap();
    assert_eq!(merged.windows, 3);
    assert_eq!(merged.rows, 20);

    let rows = read_rows(&dir.path().join(MERGED_FILE_NAME));
    assert_eq!(rows.len(), 20);
    assert_eq!(rows[0].actor_id, "nm0000000");
    assert_eq!(rows[19].actor_id, "nm0000019");
    assert!(rows.iter().all(|r| r.rank == Some(100) && r.rank_delta == Some(5)));

    let checkpointer = BatchCheckpointer::new(dir.path());
    assert!(checkpointer.list_windows().unwrap().is_empty());
    let progress = checkpointer.load_progress().unwrap().unwrap();
    assert!(progress.is_finished());
    assert_eq!(progress.next_window, 3);
}

#[tokio::test]
async fn test_resume_skips_checkpointed_windows() {
    let dir = tempdir().unwrap();
    let (titles, site) = ten_title_site();
    let checkpointer = BatchCheckpointer::new(dir.path());

    // A previous run finished window 0 before stopping.
    let mut earlier = CastEntry::new("Earlier", "nm9999999", "https://www.imdb.com/name/nm9999999/");
    earlier.rank = Some(1);
    earlier.rank_delta = Some(-3);
    checkpointer.checkpoint(0, &[vec![earlier]]).unwrap();
    let mut progress = CrawlProgress::new(10, 4, 4);
    progress.complete(0, 4);
    checkpointer.save_progress(&progress).unwrap();

    let crawler = crawler(titles, dir.path(), options(1, true));
    assert_eq!(crawler.progress().await.next_row, 4);

    let (summary, visited) = run(&crawler, Arc::new(site)).await;

    assert_eq!(summary.windows, 2);
    assert_eq!(summary.titles, 6);
    for done in ["tt0000001", "tt0000002", "tt0000003", "tt0000004"] {
        assert!(!visited.iter().any(|url| url.contains(done)), "{} reloaded", done);
    }

    let rows = read_rows(&dir.path().join(MERGED_FILE_NAME));
    assert_eq!(rows.len(), 13);
    assert_eq!(rows[0].actor_id, "nm9999999");
    assert_eq!(rows[0].rank_delta, Some(-3));
    assert_eq!(rows[1].actor_id, "nm0000008");
}

/// Window 0 done by an earlier run, progress saved at row 4 of 10.
fn interrupted_after_first_window(checkpointer: &BatchCheckpointer) {
    let mut earlier = CastEntry::new("Earlier", "nm9999999", "https://www.imdb.com/name/nm9999999/");
    earlier.rank = Some(1);
    checkpointer.checkpoint(0, &[vec![earlier]]).unwrap();
    let mut progress = CrawlProgress::new(10, 4, 4);
    progress.complete(0, 4);
    checkpointer.save_progress(&progress).unwrap();
}

#[tokio::test]
async fn test_merge_refused_until_crawl_finishes() {
    let dir = tempdir().unwrap();
    let (titles, site) = ten_title_site();
    let checkpointer = BatchCheckpointer::new(dir.path());
    interrupted_after_first_window(&checkpointer);

    let err = checkpointer.merge().unwrap_err();
    assert!(matches!(
        err,
        CrawlError::CrawlIncomplete {
            next_row: 4,
            total_rows: 10
        }
    ));
    assert!(checkpointer.window_path(0).exists());
    assert!(!dir.path().join(MERGED_FILE_NAME).exists());

    let crawler = crawler(titles, dir.path(), options(1, true));
    run(&crawler, Arc::new(site)).await;

    let rows = read_rows(&dir.path().join(MERGED_FILE_NAME));
    assert_eq!(rows.len(), 13);
    assert_eq!(rows[0].actor_id, "nm9999999");
}

#[tokio::test]
async fn test_forced_partial_merge_survives_final_merge() {
    let dir = tempdir().unwrap();
    let (titles, site) = ten_title_site();
    let checkpointer = BatchCheckpointer::new(dir.path());
    interrupted_after_first_window(&checkpointer);

    let partial = checkpointer.merge_with(true).unwrap();
    assert_eq!((partial.windows, partial.rows), (1, 1));
    assert!(checkpointer.list_windows().unwrap().is_empty());

    let crawler = crawler(titles, dir.path(), options(1, true));
    let (summary, _) = run(&crawler, Arc::new(site)).await;

    let merged = summary.merge.unwrap();
    assert_eq!((merged.windows, merged.rows), (2, 13));
    let rows = read_rows(&dir.path().join(MERGED_FILE_NAME));
    assert_eq!(rows.len(), 13);
    assert_eq!(rows[0].actor_id, "nm9999999");
    assert_eq!(rows[1].actor_id, "nm0000008");
    assert_eq!(rows[12].actor_id, "nm0000019");
}

#[tokio::test]
async fn test_finished_crawl_does_nothing_on_rerun() {
    let dir = tempdir().unwrap();
    let (titles, site) = ten_title_site();
    let site = Arc::new(site);

    let first = crawler(titles.clone(), dir.path(), options(1, true));
    run(&first, site.clone()).await;
    drop(first);

    let second = crawler(titles, dir.path(), options(1, true));
    let (summary, visited) = run(&second, site).await;

    assert!(visited.is_empty());
    assert_eq!(summary.windows, 0);
    // Nothing left to merge, so the earlier output stays.
    assert_eq!(summary.merge.unwrap().output, None);
    assert_eq!(read_rows(&dir.path().join(MERGED_FILE_NAME)).len(), 20);
}

#[tokio::test]
async fn test_failed_actor_does_not_stop_window() {
    let dir = tempdir().unwrap();
    let titles = titles(&["tt0000001", "tt0000002"]);
    let site = Site::default()
        .title("tt0000001", &[("nm0000001", "Steady"), ("nm0000002", "Crashes")])
        .title("tt0000002", &[("nm0000003", "Also Steady")])
        .broken("nm0000002");
    let crawler = crawler(titles, dir.path(), options(1, false));

    let (summary, visited) = run(&crawler, Arc::new(site)).await;

    assert_eq!(summary.ratings, 2);
    assert_eq!(summary.ratings_failed, 1);
    assert!(summary.merge.is_none());
    // The broken profile was tried twice, then given up on.
    let attempts = visited.iter().filter(|u| u.contains("nm0000002")).count();
    assert_eq!(attempts, 2);

    let rows = read_rows(&dir.path().join("batch0stars.csv"));
    let ids: Vec<&str> = rows.iter().map(|r| r.actor_id.as_str()).collect();
    assert_eq!(ids, vec!["nm0000001", "nm0000002", "nm0000003"]);
    assert_eq!(rows[1].rank, None);
    assert_eq!(rows[1].rank_delta, None);
    assert_eq!(rows[2].rank, Some(100));
}

#[tokio::test]
async fn test_missing_title_and_malformed_row_are_skipped() {
    let dir = tempdir().unwrap();
    let mut titles = titles(&["tt0000001", "tt0000002", "tt0000003"]);
    titles[2].cast = None;
    let site = Site::default().title("tt0000001", &[("nm0000001", "Only")]);
    let crawler = crawler(titles, dir.path(), options(1, true));

    let (summary, visited) = run(&crawler, Arc::new(site)).await;

    assert_eq!(summary.titles_skipped, 1);
    assert_eq!(summary.titles_failed, 1);
    assert!(!visited.iter().any(|u| u.contains("tt0000003")));
    // Missing anchors are not retried.
    assert_eq!(visited.iter().filter(|u| u.contains("tt0000002")).count(), 1);
    assert_eq!(read_rows(&dir.path().join(MERGED_FILE_NAME)).len(), 1);
}

#[tokio::test]
async fn test_shared_actor_listed_once_per_window() {
    let dir = tempdir().unwrap();
    let titles = titles(&["tt0000001", "tt0000002"]);
    let site = Site::default()
        .title("tt0000001", &[("nm0000001", "Lead"), ("nm0000002", "Both")])
        .title("tt0000002", &[("nm0000002", "Both"), ("nm0000003", "Other")]);
    let crawler = crawler(titles, dir.path(), options(1, true));

    let (summary, visited) = run(&crawler, Arc::new(site)).await;

    assert_eq!(summary.entries, 3);
    assert_eq!(visited.iter().filter(|u| u.contains("nm0000002")).count(), 1);
    let rows = read_rows(&dir.path().join(MERGED_FILE_NAME));
    let ids: Vec<&str> = rows.iter().map(|r| r.actor_id.as_str()).collect();
    assert_eq!(ids, vec!["nm0000001", "nm0000002", "nm0000003"]);
}

#[tokio::test]
async fn test_parallel_workers_cover_every_window_once() {
    let dir = tempdir().unwrap();
    let (titles, site) = ten_title_site();
    let crawler = crawler(titles, dir.path(), options(3, true));

    let (summary, visited) = run(&crawler, Arc::new(site)).await;

    assert_eq!(summary.windows, 3);
    assert_eq!(visited.len(), 30);
    let rows = read_rows(&dir.path().join(MERGED_FILE_NAME));
    let ids: Vec<String> = rows.iter().map(|r| r.actor_id.clone()).collect();
    let expected: Vec<String> = (0..20).map(|i| format!("nm{:07}", i)).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_progress_for_other_table_is_rejected() {
    let dir = tempdir().unwrap();
    let checkpointer = BatchCheckpointer::new(dir.path());
    checkpointer
        .save_progress(&CrawlProgress::new(99, 4, 4))
        .unwrap();

    let profile = SelectorProfile::new(SelectorConfig::default()).unwrap();
    let result = Crawler::new(
        titles(&["tt0000001"]),
        Arc::new(profile),
        checkpointer,
        options(1, true),
    );
    assert!(matches!(result, Err(CrawlError::ProgressMismatch { .. })));
}

#[tokio::test]
async fn test_failed_worker_lets_the_others_close_their_browsers() {
    let dir = tempdir().unwrap();
    let (titles, site) = ten_title_site();
    // Checkpoints can never be written under a regular file.
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();

    let profile = SelectorProfile::new(SelectorConfig::default()).unwrap();
    let crawler = Crawler::new(
        titles,
        Arc::new(profile),
        BatchCheckpointer::new(blocker.join("run")),
        options(3, true),
    )
    .unwrap();

    let site = Arc::new(site);
    let log = Arc::new(Mutex::new(Vec::new()));
    let closed = Arc::new(AtomicUsize::new(0));
    let result = crawler
        .run(|_| ScriptedDriver::new(site.clone(), log.clone(), closed.clone()))
        .await;

    assert!(matches!(result, Err(CrawlError::Io(_))));
    assert_eq!(closed.load(Ordering::SeqCst), 3);
    assert_eq!(crawler.progress().await.windows_done(), 0);
}
