mod capture;
mod models;
mod scrapers;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use capture::Capture;
use scrapers::{ListingScraper, MicrosoftCareersScraper, ScrapeConfig};

#[derive(Parser)]
#[command(name = "job-scout", about = "Job-listing scraper for the Microsoft careers portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every listing behind a search URL and persist the capture
    Scrape {
        /// Search-results URL; must carry the `&pg=1&` page subquery
        #[arg(long)]
        url: Option<String>,
        /// Max concurrent browser sessions (default: one per CPU)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Show browser windows instead of running headless
        #[arg(long)]
        no_headless: bool,
        /// Explicit Chrome/Chromium binary to launch
        #[arg(long)]
        browser: Option<PathBuf>,
        /// Upper bound for element readiness waits, in seconds
        #[arg(long, default_value_t = 5)]
        settle_secs: u64,
        /// Directory the capture file is written into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Capture filename root
        #[arg(long, default_value = capture::DEFAULT_ROOT)]
        root: String,
    },
    /// Reload a persisted capture and print a summary table
    Show {
        /// Capture file written by `scrape`
        file: PathBuf,
        /// Only show rows whose extraction failed
        #[arg(long)]
        errors_only: bool,
        /// Max rows to display
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scrape {
            url,
            workers,
            no_headless,
            browser,
            settle_secs,
            out_dir,
            root,
        } => {
            let mut config = ScrapeConfig::default();
            if let Some(url) = url {
                config.base_url = url;
            }
            config.headless = !no_headless;
            config.browser_path = browser;
            config.settle = Duration::from_secs(settle_secs);
            config.max_workers = workers;

            let scraper = MicrosoftCareersScraper::new(config);
            info!("Scraping {}", scraper.source_name());

            let records = scraper.scrape().await?;
            let capture = Capture::new(records);
            info!(
                "✅ Captured {} listing(s), {} with errors",
                capture.len(),
                capture.error_count()
            );

            let path = capture.to_disk(&out_dir, &root)?;
            println!("Capture written to {}", path.display());
            Ok(())
        }
        Commands::Show {
            file,
            errors_only,
            limit,
        } => show(&file, errors_only, limit),
    }
}

/// Print a persisted capture as a compact table, no re-scraping involved.
fn show(file: &Path, errors_only: bool, limit: usize) -> Result<()> {
    let capture = Capture::from_disk(file)?;

    let rows: Vec<_> = capture
        .records()
        .iter()
        .enumerate()
        .filter(|(_, r)| !errors_only || r.error)
        .take(limit)
        .collect();

    if rows.is_empty() {
        println!("No matching rows.");
        return Ok(());
    }

    println!(
        "{:>4} | {:<3} | {:<12} | {:<14} | {:<50} | {}",
        "#", "err", "Job number", "Date posted", "Overview", "URL"
    );
    println!("{}", "-".repeat(120));

    for (i, record) in &rows {
        let summary = if record.error {
            truncate(&record.error_message, 50)
        } else {
            truncate(record.overview.lines().next().unwrap_or(""), 50)
        };
        println!(
            "{:>4} | {:<3} | {:<12} | {:<14} | {:<50} | {}",
            i + 1,
            if record.error { "yes" } else { "" },
            record.metadata.get("Job number").map_or("-", String::as_str),
            record.metadata.get("Date posted").map_or("-", String::as_str),
            summary,
            record.url,
        );
    }

    println!(
        "\n{} row(s) shown | {} total | {} with errors",
        rows.len(),
        capture.len(),
        capture.error_count()
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly-ten", 11), "exactly-ten");
    }

    #[test]
    fn truncate_clips_long_strings_with_an_ellipsis() {
        assert_eq!(truncate("abcdefghij", 4), "abcd...");
    }
}
