use crate::scrapers::types::ScrapeConfig;
use anyhow::{Context, Result};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// One exclusive browser session.
///
/// The session owns the underlying Chrome process and a single tab; it is
/// never shared between tasks, and dropping it on any exit path tears the
/// process down.
pub struct BrowserSession {
    _browser: Browser,
    tab: Arc<Tab>,
    settle: Duration,
}

impl BrowserSession {
    /// Launch a fresh browser and open one tab.
    pub fn launch(config: &ScrapeConfig) -> Result<Self> {
        debug!("Launching browser (headless: {})", config.headless);

        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .path(config.browser_path.clone())
            .window_size(Some((1600, 1000)))
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch browser")?;
        let tab = browser.new_tab().context("Failed to open tab")?;

        Ok(Self {
            _browser: browser,
            tab,
            settle: config.settle,
        })
    }

    /// Navigate the tab and block until the load completes.
    pub fn goto(&self, url: &str) -> Result<()> {
        debug!("Navigating to {}", url);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .with_context(|| format!("Failed to load {url}"))?;
        Ok(())
    }

    /// Wait for a CSS selector to match, bounded by the settle duration.
    pub fn wait_for(&self, selector: &str) -> Result<Element<'_>> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, self.settle)
            .with_context(|| format!("Element never appeared: {selector}"))
    }

    /// URL the tab currently points at.
    pub fn current_url(&self) -> String {
        self.tab.get_url()
    }

    /// Snapshot of the rendered document, for parsing off-browser.
    pub fn capture_html(&self) -> Result<String> {
        self.tab.get_content().context("Failed to capture page HTML")
    }
}
