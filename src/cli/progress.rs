//! Terminal progress for a running crawl.

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::crawl::CrawlEvent;

/// Row-based progress bar fed by [`CrawlEvent`]s.
pub struct CrawlProgressBar {
    bar: ProgressBar,
}

impl CrawlProgressBar {
    pub fn new(total_rows: usize, rows_done: usize) -> Self {
        let bar = ProgressBar::new(total_rows as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} rows {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        bar.set_position(rows_done as u64);
        Self { bar }
    }

    /// Consume events until the sender side is dropped.
    pub fn spawn(self, mut events: UnboundedReceiver<CrawlEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.apply(event);
            }
            self.bar.finish_and_clear();
        })
    }

    fn apply(&self, event: CrawlEvent) {
        match event {
            CrawlEvent::WindowStarted { window, titles } => {
                self.bar
                    .set_message(format!("window {} ({} titles)", window, titles));
            }
            CrawlEvent::WindowCompleted {
                window,
                entries,
                rows_done,
                ..
            } => {
                self.bar.set_position(rows_done as u64);
                self.bar
                    .set_message(format!("window {} saved ({} entries)", window, entries));
            }
        }
    }
}
