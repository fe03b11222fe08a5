//! The `crawl` command.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use tokio::sync::mpsc;

use crate::browser::ChromeDriver;
use crate::cli::progress::CrawlProgressBar;
use crate::config::Settings;
use crate::crawl::{BatchCheckpointer, Crawler};
use crate::extract::SelectorProfile;
use crate::input::load_titles;

/// Crawl or resume crawling `input`.
pub async fn cmd_crawl(settings: &Settings, input: &Path, merge: bool) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let titles = load_titles(input)
        .with_context(|| format!("Failed to read title table {}", input.display()))?;
    let profile = SelectorProfile::new(settings.selectors.clone())
        .context("Invalid selector configuration")?;
    let checkpointer =
        BatchCheckpointer::new(&settings.data_dir).with_output(settings.output_path());

    let (tx, rx) = mpsc::unbounded_channel();
    let crawler = Crawler::new(
        titles,
        Arc::new(profile),
        checkpointer,
        settings.crawl_options(merge),
    )
    .context("Failed to prepare crawl (run `starscrape reset` to start over)")?
    .with_events(tx);

    let start = crawler.progress().await;
    println!(
        "{} Crawling {} rows from {} (starting at row {})",
        style("→").cyan(),
        crawler.total_rows(),
        input.display(),
        start.next_row
    );

    let bar = CrawlProgressBar::new(crawler.total_rows(), start.next_row).spawn(rx);

    let browser = settings.browser.clone();
    let outcome = crawler
        .run(|_| ChromeDriver::new(browser.clone()))
        .await;
    drop(crawler);
    let _ = bar.await;

    let summary = outcome.context("Crawl stopped")?;

    println!(
        "{} {} windows, {} titles ({} skipped, {} failed), {} cast entries",
        style("✓").green(),
        summary.windows,
        summary.titles,
        summary.titles_skipped,
        summary.titles_failed,
        summary.entries
    );
    println!(
        "  ratings: {} found, {} unavailable, {} failed",
        summary.ratings, summary.ratings_unavailable, summary.ratings_failed
    );

    match summary.merge {
        Some(merged) => match merged.output {
            Some(output) => println!(
                "{} Merged {} windows ({} rows) into {}",
                style("✓").green(),
                merged.windows,
                merged.rows,
                output.display()
            ),
            None => println!("{} No window checkpoints to merge", style("!").yellow()),
        },
        None if merge => println!(
            "{} Crawl incomplete, checkpoints left in {}",
            style("!").yellow(),
            settings.data_dir.display()
        ),
        None => println!(
            "  checkpoints left in {} (run `starscrape merge` to combine)",
            settings.data_dir.display()
        ),
    }

    Ok(())
}
