//! Persisted crawl position.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CrawlError, Result};

/// Where a crawl stands, saved after every checkpoint.
///
/// `next_row`/`next_window` mark the frontier below which every window is
/// done. Windows finished ahead of the frontier (possible with several
/// workers) are kept in `completed_ahead` with their end row.
/// `merged_windows` lists windows already folded into the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlProgress {
    pub total_rows: usize,
    pub window_size: usize,
    pub tail_slack: usize,
    pub next_row: usize,
    pub next_window: usize,
    #[serde(default)]
    pub completed_ahead: BTreeMap<usize, usize>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub merged_windows: BTreeSet<usize>,
    pub updated_at: DateTime<Utc>,
}

impl CrawlProgress {
    pub fn new(total_rows: usize, window_size: usize, tail_slack: usize) -> Self {
        Self {
            total_rows,
            window_size,
            tail_slack,
            next_row: 0,
            next_window: 0,
            completed_ahead: BTreeMap::new(),
            merged_windows: BTreeSet::new(),
            updated_at: Utc::now(),
        }
    }

    /// Mark a window done and move the frontier as far as it can go.
    pub fn complete(&mut self, window: usize, end_row: usize) {
        if window >= self.next_window {
            self.completed_ahead.insert(window, end_row);
        }
        while let Some(end) = self.completed_ahead.remove(&self.next_window) {
            self.next_row = end;
            self.next_window += 1;
        }
        self.updated_at = Utc::now();
    }

    pub fn is_completed(&self, window: usize) -> bool {
        window < self.next_window || self.completed_ahead.contains_key(&window)
    }

    pub fn is_finished(&self) -> bool {
        self.next_row >= self.total_rows
    }

    pub fn is_merged(&self, window: usize) -> bool {
        self.merged_windows.contains(&window)
    }

    /// Record windows written to the output table.
    pub fn mark_merged(&mut self, windows: impl IntoIterator<Item = usize>) {
        self.merged_windows.extend(windows);
        self.updated_at = Utc::now();
    }

    /// Windows done so far, frontier and ahead-of-frontier together.
    pub fn windows_done(&self) -> usize {
        self.next_window + self.completed_ahead.len()
    }

    /// Refuse to resume against a different table or window layout.
    pub fn check_compatible(
        &self,
        path: &Path,
        total_rows: usize,
        window_size: usize,
        tail_slack: usize,
    ) -> Result<()> {
        let mismatch = |reason: String| CrawlError::ProgressMismatch {
            path: path.to_path_buf(),
            reason,
        };

        if self.total_rows != total_rows {
            return Err(mismatch(format!(
                "recorded {} rows, input has {}",
                self.total_rows, total_rows
            )));
        }
        if self.window_size != window_size || self.tail_slack != tail_slack {
            return Err(mismatch(format!(
                "recorded window size {} (slack {}), requested {} (slack {})",
                self.window_size, self.tail_slack, window_size, tail_slack
            )));
        }
        Ok(())
    }
}
