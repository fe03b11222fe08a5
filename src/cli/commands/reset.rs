//! The `reset` command.

use std::io::{self, Write};

use console::style;

use crate::config::Settings;
use crate::crawl::BatchCheckpointer;

pub async fn cmd_reset(settings: &Settings, yes: bool) -> anyhow::Result<()> {
    let checkpointer = BatchCheckpointer::new(&settings.data_dir);
    let windows = checkpointer.list_windows()?.len();
    let has_progress = checkpointer.progress_path().exists();

    if windows == 0 && !has_progress {
        println!("{} Nothing to reset in {}", style("!").yellow(), settings.data_dir.display());
        return Ok(());
    }

    if !yes {
        print!(
            "Delete the progress record and {} window checkpoints in {}? [y/N] ",
            windows,
            settings.data_dir.display()
        );
        io::stdout().flush()?;
        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        if !input.trim().eq_ignore_ascii_case("y") {
            println!("{} Cancelled", style("!").yellow());
            return Ok(());
        }
    }

    let removed = checkpointer.clear()?;
    println!("{} Removed {} files", style("✓").green(), removed);
    Ok(())
}
