//! The `merge` command.

use console::style;

use crate::config::Settings;
use crate::crawl::BatchCheckpointer;
use crate::error::CrawlError;

pub async fn cmd_merge(settings: &Settings, force: bool) -> anyhow::Result<()> {
    let checkpointer =
        BatchCheckpointer::new(&settings.data_dir).with_output(settings.output_path());
    let summary = match tokio::task::spawn_blocking(move || checkpointer.merge_with(force)).await? {
        Ok(summary) => summary,
        Err(e @ CrawlError::CrawlIncomplete { .. }) => {
            println!(
                "{} Resume with `starscrape crawl`, or pass --force to merge what exists",
                style("!").yellow()
            );
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    match summary.output {
        Some(output) => println!(
            "{} Merged {} windows ({} rows) into {}",
            style("✓").green(),
            summary.windows,
            summary.rows,
            output.display()
        ),
        None => println!(
            "{} No window checkpoints in {}",
            style("!").yellow(),
            settings.data_dir.display()
        ),
    }
    Ok(())
}
