use std::path::PathBuf;
use std::time::Duration;

/// Tunables for one scrape run
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Search-results URL; must carry the literal `&pg=1&` page subquery
    pub base_url: String,
    /// Explicit Chrome/Chromium binary; None lets the launcher autodetect
    pub browser_path: Option<PathBuf>,
    /// Run the browser headless
    pub headless: bool,
    /// Upper bound on element readiness waits after navigation and clicks
    pub settle: Duration,
    /// Concurrent browser session cap; None means one per available CPU
    pub max_workers: Option<usize>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jobs.careers.microsoft.com/global/en/search?q=Software%20Engineer&l=en_us&pg=1&pgSz=20&o=Relevance&flt=true".to_string(),
            browser_path: None,
            headless: true,
            settle: Duration::from_secs(5),
            max_workers: None,
        }
    }
}
