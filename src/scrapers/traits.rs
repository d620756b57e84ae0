use crate::models::ListingRecord;
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for job-listing scrapers
/// This allows easy addition of new job portals in the future
#[async_trait]
pub trait ListingScraper: Send + Sync {
    /// Run the full paginated scrape, returning one record per listing
    async fn scrape(&self) -> Result<Vec<ListingRecord>>;

    /// Get the name of the portal this scraper targets
    fn source_name(&self) -> &'static str;
}
