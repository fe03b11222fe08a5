//! The `status` command.

use std::path::PathBuf;

use console::style;
use serde::Serialize;

use crate::config::Settings;
use crate::crawl::{BatchCheckpointer, CrawlProgress};

#[derive(Debug, Serialize)]
struct StatusReport {
    data_dir: PathBuf,
    progress: Option<CrawlProgress>,
    pending_windows: Vec<usize>,
    output: PathBuf,
    output_exists: bool,
}

pub async fn cmd_status(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let checkpointer =
        BatchCheckpointer::new(&settings.data_dir).with_output(settings.output_path());

    let report = StatusReport {
        data_dir: settings.data_dir.clone(),
        progress: checkpointer.load_progress()?,
        pending_windows: checkpointer
            .list_windows()?
            .into_iter()
            .map(|(index, _)| index)
            .collect(),
        output: checkpointer.output().to_path_buf(),
        output_exists: checkpointer.output().exists(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", style("Crawl Status").bold());
    println!("{}", "-".repeat(40));
    println!("Data dir:        {}", report.data_dir.display());

    match &report.progress {
        Some(progress) => {
            let state = if progress.is_finished() {
                style("Complete").green().to_string()
            } else {
                style("In Progress").yellow().to_string()
            };
            println!("State:           {}", state);
            println!(
                "Rows:            {}/{}",
                progress.next_row, progress.total_rows
            );
            println!("Windows done:    {}", progress.windows_done());
            if !progress.completed_ahead.is_empty() {
                let ahead: Vec<String> = progress
                    .completed_ahead
                    .keys()
                    .map(|w| w.to_string())
                    .collect();
                println!("Done ahead:      {}", ahead.join(", "));
            }
            if !progress.merged_windows.is_empty() {
                println!("Windows merged:  {}", progress.merged_windows.len());
            }
            println!(
                "Window size:     {} (tail slack {})",
                progress.window_size, progress.tail_slack
            );
            println!(
                "Updated:         {}",
                progress.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
        }
        None => println!("State:           {}", style("Not Started").dim()),
    }

    println!("Pending windows: {}", report.pending_windows.len());
    println!(
        "Output:          {}{}",
        report.output.display(),
        if report.output_exists { "" } else { " (not written)" }
    );
    Ok(())
}
