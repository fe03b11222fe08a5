//! Pagination over the title table in fixed-size windows.

use tracing::warn;

use crate::extract::SiteProfile;
use crate::models::{TitleRecord, TitleTarget};

/// Titles per window.
pub const DEFAULT_WINDOW_SIZE: usize = 4;

/// Below this many remaining rows, the rest goes into one final window.
pub const DEFAULT_TAIL_SLACK: usize = 4;

/// One window's worth of titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPlan {
    pub index: usize,
    /// First row of the window.
    pub start_row: usize,
    /// One past the last row consumed, malformed rows included.
    pub end_row: usize,
    pub targets: Vec<TitleTarget>,
    /// Rows skipped because their cast column was malformed.
    pub skipped: usize,
}

impl WindowPlan {
    pub fn rows(&self) -> usize {
        self.end_row - self.start_row
    }
}

/// Position in the title table.
///
/// Window boundaries depend only on the row count, the window size and the
/// tail slack, so a window index always covers the same rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    current_row: usize,
    window_index: usize,
    window_size: usize,
    tail_slack: usize,
    total_rows: usize,
}

impl Cursor {
    pub fn new(total_rows: usize, window_size: usize, tail_slack: usize) -> Self {
        Self::resume(total_rows, window_size, tail_slack, 0, 0)
    }

    /// Rebuild a cursor at a persisted position.
    pub fn resume(
        total_rows: usize,
        window_size: usize,
        tail_slack: usize,
        current_row: usize,
        window_index: usize,
    ) -> Self {
        Self {
            current_row: current_row.min(total_rows),
            window_index,
            window_size: window_size.max(1),
            tail_slack,
            total_rows,
        }
    }

    pub fn current_row(&self) -> usize {
        self.current_row
    }

    pub fn window_index(&self) -> usize {
        self.window_index
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.current_row >= self.total_rows
    }

    /// Rows the next window will consume.
    fn next_len(&self) -> usize {
        let remaining = self.total_rows - self.current_row;
        if remaining < self.tail_slack {
            remaining
        } else {
            self.window_size.min(remaining)
        }
    }

    /// Yield the next window and advance past it.
    ///
    /// Rows with a malformed cast column are logged and left out of the
    /// window but still count as consumed.
    pub fn next_window(
        &mut self,
        titles: &[TitleRecord],
        profile: &dyn SiteProfile,
    ) -> Option<WindowPlan> {
        if self.is_exhausted() {
            return None;
        }

        let start_row = self.current_row;
        let end_row = start_row + self.next_len();
        let mut targets = Vec::with_capacity(end_row - start_row);
        let mut skipped = 0;

        for (offset, record) in titles[start_row..end_row].iter().enumerate() {
            match record.cast_hint() {
                Ok(cast_hint) => targets.push(TitleTarget {
                    row: start_row + offset,
                    title_id: record.title_id.clone(),
                    url: profile.title_url(&record.title_id),
                    cast_hint,
                }),
                Err(e) => {
                    warn!("Skipping row {}: {}", start_row + offset, e);
                    skipped += 1;
                }
            }
        }

        let plan = WindowPlan {
            index: self.window_index,
            start_row,
            end_row,
            targets,
            skipped,
        };

        self.current_row = end_row;
        self.window_index += 1;

        Some(plan)
    }
}
