use crate::models::{ListingRecord, PageDescriptor};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

/// Results of one page worker, tagged with its page number so completion
/// order can be undone afterwards.
pub struct PageBatch {
    pub page: u32,
    pub records: Vec<ListingRecord>,
}

/// Fan `process` out over all pages, with at most `max_workers` browser
/// sessions alive at once (default: one per available CPU).
///
/// Batches arrive over a channel in completion order and are sorted by
/// page number before being returned, so the flattened table is stable
/// across runs. Every submitted page yields a batch of exactly its
/// expected listing count, even when the worker dies.
pub async fn run_pages<F>(
    pages: Vec<PageDescriptor>,
    max_workers: Option<usize>,
    process: F,
) -> Result<Vec<PageBatch>>
where
    F: Fn(PageDescriptor) -> Vec<ListingRecord> + Clone + Send + 'static,
{
    let workers = max_workers.unwrap_or_else(default_workers);
    let semaphore = Arc::new(Semaphore::new(workers));
    let total_pages = pages.len();
    debug!("Driving {} page(s) with {} worker(s)", total_pages, workers);

    let pb = ProgressBar::new(total_pages as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    // Channel: workers send page batches, the driving loop collects them
    let (tx, mut rx) = mpsc::channel::<PageBatch>(total_pages.max(1));

    for page in pages {
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let process = process.clone();

        tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.unwrap();
            let result = tokio::task::spawn_blocking(move || process(page)).await;

            let records = match result {
                Ok(records) => records,
                Err(e) => {
                    warn!("Worker for page {} died: {}", page.page, e);
                    (0..page.expected_listings)
                        .map(|_| ListingRecord::errored("", format!("page worker died: {e}")))
                        .collect()
                }
            };

            let _ = tx
                .send(PageBatch {
                    page: page.page,
                    records,
                })
                .await;
        });
    }

    // Drop our copy of tx so rx closes once all workers finish
    drop(tx);

    let mut batches = Vec::with_capacity(total_pages);
    while let Some(batch) = rx.recv().await {
        debug!("Page {} complete ({} records)", batch.page, batch.records.len());
        pb.inc(1);
        batches.push(batch);
    }
    pb.finish_and_clear();

    batches.sort_by_key(|b| b.page);
    Ok(batches)
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
