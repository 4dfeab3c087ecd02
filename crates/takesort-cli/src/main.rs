use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use takesort_core::{CancelFlag, ImportOptions};

#[derive(Parser)]
#[command(
    name = "takesort",
    version,
    about = "Sort photo-export drops into a dated library with an idempotent import index"
)]
struct Cli {
    /// Source directory holding export archives and/or loose media
    source: Option<PathBuf>,

    /// Library root the YYYY/MM tree is built under
    #[arg(short, long)]
    output: PathBuf,

    /// Rebuild the import index from the library tree instead of importing
    #[arg(long)]
    reindex: bool,

    /// Skip -edited, -effects and similar derivative images
    #[arg(long)]
    skip_extras: bool,

    /// Disable date guessing from filenames
    #[arg(long)]
    no_guess: bool,

    /// Keep archives on disk after successful extraction
    #[arg(long)]
    keep_archives: bool,
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style);
    }
    bar
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let t_total = Instant::now();

    if cli.reindex {
        let bar = progress_bar();
        let report = {
            let bar = bar.clone();
            let render = move |stage: &str, current: u64, _total: u64, message: &str| {
                bar.set_message(format!("[{stage}] {} {message}", current + 1));
                bar.tick();
            };
            takesort_core::run_reindex(&cli.output, &render)?
        };
        bar.finish_and_clear();

        for warning in &report.warnings {
            eprintln!("warning: {warning}");
        }
        eprintln!(
            "Reindex done: {} files indexed ({:.2}s)",
            report.indexed,
            t_total.elapsed().as_secs_f64()
        );
        return Ok(());
    }

    let Some(source) = cli.source else {
        anyhow::bail!("SOURCE is required unless --reindex is given");
    };

    let cancel = CancelFlag::new();
    {
        let handler_flag = cancel.clone();
        ctrlc::set_handler(move || handler_flag.cancel())?;
    }

    let options = ImportOptions {
        source,
        library: cli.output,
        skip_extras: cli.skip_extras,
        no_guess: cli.no_guess,
        keep_archives: cli.keep_archives,
    };

    let bar = progress_bar();
    let report = {
        let bar = bar.clone();
        let render = move |stage: &str, current: u64, total: u64, message: &str| {
            if total > 0 {
                bar.set_message(format!("[{stage}] {}/{total} {message}", current + 1));
            } else {
                bar.set_message(format!("[{stage}] {} {message}", current + 1));
            }
            bar.tick();
        };
        takesort_core::run_import(&options, Some(&cancel), &render)?
    };
    bar.finish_and_clear();

    for warning in &report.warnings {
        eprintln!("warning: {warning}");
    }
    let headline = if report.cancelled { "Interrupted:" } else { "Done!" };
    eprintln!(
        "{headline} {} candidates, {} imported ({} undated), {} already present, {} failed, {} archives extracted ({:.2}s)",
        report.candidates,
        report.imported,
        report.undated,
        report.already_present,
        report.failed,
        report.archives_extracted,
        t_total.elapsed().as_secs_f64()
    );

    if report.cancelled {
        // 128 + SIGINT, what a shell reports for an uncaught ^C
        process::exit(130);
    }
    if report.failed > 0 {
        process::exit(1);
    }
    Ok(())
}
