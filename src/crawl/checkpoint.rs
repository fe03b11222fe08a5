//! Per-window CSV checkpoints, the progress file and the final merge.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::progress::CrawlProgress;
use crate::error::{CrawlError, Result};
use crate::models::CastEntry;

/// Name of the merged output table.
pub const MERGED_FILE_NAME: &str = "CAST_LIST.csv";

/// Name of the persisted cursor.
pub const PROGRESS_FILE_NAME: &str = "progress.json";

/// Window checkpoint file names: `batch<N>stars.csv`.
static WINDOW_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^batch(\d+)stars\.csv$").unwrap());

/// Outcome of [`BatchCheckpointer::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub windows: usize,
    /// Rows in the written table, earlier merges included.
    pub rows: usize,
    /// Written table, `None` when there was nothing to merge.
    pub output: Option<PathBuf>,
}

/// Writes window checkpoints and merges them into the final table.
///
/// Every file is written to a temporary sibling and renamed into place, so
/// a crash never leaves a half-written checkpoint behind.
#[derive(Debug, Clone)]
pub struct BatchCheckpointer {
    dir: PathBuf,
    output: PathBuf,
}

impl BatchCheckpointer {
    /// Checkpoints go in `dir`; the merged table defaults to
    /// `dir/CAST_LIST.csv`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let output = dir.join(MERGED_FILE_NAME);
        Self { dir, output }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn window_path(&self, window: usize) -> PathBuf {
        self.dir.join(format!("batch{}stars.csv", window))
    }

    pub fn progress_path(&self) -> PathBuf {
        self.dir.join(PROGRESS_FILE_NAME)
    }

    /// Write one window's entries, title by title, to its checkpoint file.
    ///
    /// An empty window writes nothing and returns
    /// [`CrawlError::NoDataToWrite`].
    pub fn checkpoint(&self, window: usize, titles: &[Vec<CastEntry>]) -> Result<PathBuf> {
        let rows: Vec<&CastEntry> = titles.iter().flatten().collect();
        if rows.is_empty() {
            return Err(CrawlError::NoDataToWrite(window));
        }

        let path = self.window_path(window);
        write_atomic(&path, |file| {
            let mut writer = csv::Writer::from_writer(file);
            for entry in &rows {
                writer.serialize(entry)?;
            }
            writer.flush()?;
            Ok(())
        })?;

        info!(
            "Checkpointed window {} ({} entries) to {}",
            window,
            rows.len(),
            path.display()
        );
        Ok(path)
    }

    /// Window checkpoints on disk, ascending by window number.
    pub fn list_windows(&self) -> Result<Vec<(usize, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut windows = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(index) = WINDOW_FILE
                .captures(name)
                .and_then(|c| c[1].parse::<usize>().ok())
            else {
                continue;
            };
            windows.push((index, entry.path()));
        }

        windows.sort_by_key(|(index, _)| *index);
        Ok(windows)
    }

    /// Concatenate every window checkpoint in numeric order into the
    /// output table, then delete the checkpoints.
    ///
    /// Refuses with [`CrawlError::CrawlIncomplete`] while the progress
    /// record says rows are still outstanding. With no checkpoints on disk
    /// nothing is written and an existing output table is left untouched.
    pub fn merge(&self) -> Result<MergeSummary> {
        self.merge_with(false)
    }

    /// [`merge`](Self::merge), optionally ignoring an unfinished crawl.
    ///
    /// Merged windows are recorded in the progress record. A later merge of
    /// the same crawl appends to the existing output instead of replacing it,
    /// and drops leftover checkpoints of windows that were already merged.
    pub fn merge_with(&self, force: bool) -> Result<MergeSummary> {
        let mut progress = self.load_progress()?;
        if let Some(ref record) = progress {
            if !record.is_finished() {
                if !force {
                    return Err(CrawlError::CrawlIncomplete {
                        next_row: record.next_row,
                        total_rows: record.total_rows,
                    });
                }
                warn!(
                    "Merging an incomplete crawl ({} of {} rows)",
                    record.next_row, record.total_rows
                );
            }
        }

        let mut windows = Vec::new();
        let mut stale = Vec::new();
        for (index, path) in self.list_windows()? {
            match progress {
                Some(ref record) if record.is_merged(index) => stale.push(path),
                _ => windows.push((index, path)),
            }
        }
        if !stale.is_empty() {
            warn!("Dropping {} checkpoints that were already merged", stale.len());
            remove_all(&stale)?;
        }

        if windows.is_empty() {
            info!("No window checkpoints to merge in {}", self.dir.display());
            return Ok(MergeSummary {
                windows: 0,
                rows: 0,
                output: None,
            });
        }

        let append = progress
            .as_ref()
            .is_some_and(|record| !record.merged_windows.is_empty())
            && self.output.exists();

        let mut rows = 0;
        write_atomic(&self.output, |file| {
            let mut writer = csv::Writer::from_writer(file);
            if append {
                let mut reader = csv::Reader::from_path(&self.output)?;
                for entry in reader.deserialize::<CastEntry>() {
                    writer.serialize(entry?)?;
                    rows += 1;
                }
                debug!("Kept {} previously merged rows", rows);
            }
            for (index, path) in &windows {
                let mut reader = csv::Reader::from_path(path)?;
                let mut count = 0;
                for entry in reader.deserialize::<CastEntry>() {
                    writer.serialize(entry?)?;
                    count += 1;
                }
                debug!("Merged window {} ({} rows)", index, count);
                rows += count;
            }
            writer.flush()?;
            Ok(())
        })?;

        if let Some(ref mut record) = progress {
            record.mark_merged(windows.iter().map(|(index, _)| *index));
            self.save_progress(record)?;
        }

        let paths: Vec<PathBuf> = windows.iter().map(|(_, path)| path.clone()).collect();
        remove_all(&paths)?;

        info!(
            "Merged {} windows into {} ({} rows)",
            windows.len(),
            self.output.display(),
            rows
        );
        Ok(MergeSummary {
            windows: windows.len(),
            rows,
            output: Some(self.output.clone()),
        })
    }

    pub fn load_progress(&self) -> Result<Option<CrawlProgress>> {
        let path = self.progress_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let progress = serde_json::from_str(&content)?;
        Ok(Some(progress))
    }

    pub fn save_progress(&self, progress: &CrawlProgress) -> Result<()> {
        write_atomic(&self.progress_path(), |file| {
            serde_json::to_writer_pretty(&mut *file, progress)?;
            file.write_all(b"\n")?;
            Ok(())
        })
    }

    /// Delete the progress file and all window checkpoints.
    ///
    /// The merged output table is kept. Returns the number of files removed.
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let progress = self.progress_path();
        if progress.exists() {
            fs::remove_file(&progress)?;
            removed += 1;
        }
        for (_, path) in self.list_windows()? {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}

/// Remove every path, reporting all that could not be removed.
fn remove_all(paths: &[PathBuf]) -> Result<()> {
    let mut failed = Vec::new();
    let mut first = None;
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            warn!("Failed to remove {}: {}", path.display(), e);
            failed.push(path.clone());
            first.get_or_insert(e);
        }
    }
    match first {
        Some(source) => Err(CrawlError::CheckpointCleanup {
            paths: failed,
            source,
        }),
        None => Ok(()),
    }
}

/// Write through a temporary file in the target's directory, then rename.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut fs::File) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}
