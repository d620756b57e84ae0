use crate::models::{ListingRecord, PageDescriptor};
use crate::scrapers::browser::BrowserSession;
use crate::scrapers::pool;
use crate::scrapers::traits::ListingScraper;
use crate::scrapers::types::ScrapeConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Prefix of the `h1` that reports the result window, e.g.
/// "Showing 1-20 of 97 results".
const RESULTS_HEADING_PREFIX: &str = "Showing 1-";

/// Page subquery as it appears literally in the search URL.
const PAGE_SUBQUERY: &str = "&pg={}&";

/// The portal renders detail text below an `hr` with a generated
/// `horizontalLine-*` class.
const DETAIL_DIVIDER_SELECTOR: &str = r#"hr[class^="horizontalLine-"]"#;

/// Detail-panel labels whose sibling values are collected as metadata.
const DEFAULT_METADATA_FIELDS: [&str; 8] = [
    "Date posted",
    "Job number",
    "Work site",
    "Travel",
    "Role type",
    "Profession",
    "Discipline",
    "Employment type",
];

/// Scraper for the Microsoft careers portal.
///
/// Pages are enumerated from the results heading, then fanned out over a
/// bounded pool; each page worker owns its browser session for the whole
/// page and walks the listings on it in order.
#[derive(Clone)]
pub struct MicrosoftCareersScraper {
    config: ScrapeConfig,
    metadata_fields: Vec<String>,
}

impl MicrosoftCareersScraper {
    pub fn new(config: ScrapeConfig) -> Self {
        Self {
            config,
            metadata_fields: DEFAULT_METADATA_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }

    /// Override the detail-panel labels to collect. Labels are matched by
    /// exact text, so localized portals need their own list.
    pub fn with_metadata_fields(mut self, fields: Vec<String>) -> Self {
        self.metadata_fields = fields;
        self
    }

    /// Determine the number of pages and expected listings per page.
    ///
    /// Failure here is fatal for the run: without counts there is no
    /// partial result to salvage.
    pub fn enumerate_pages(&self) -> Result<Vec<PageDescriptor>> {
        let session = BrowserSession::launch(&self.config)?;
        session.goto(&self.config.base_url)?;
        session.wait_for("h1")?;

        let html = session.capture_html()?;
        let document = Html::parse_document(&html);
        let heading = find_results_heading(&document)
            .context("Results heading not found; the search page did not render as expected")?;
        let (page_size, total_results) = parse_results_heading(&heading)?;

        debug!("Results heading: {:?}", heading);
        Ok(page_counts(page_size, total_results))
    }

    /// URL of the 1-based results page `page`.
    pub fn page_url(&self, page: u32) -> String {
        self.config.base_url.replace(
            &PAGE_SUBQUERY.replace("{}", "1"),
            &PAGE_SUBQUERY.replace("{}", &page.to_string()),
        )
    }

    /// Scrape every listing on one page with a dedicated browser session.
    ///
    /// Always returns exactly `expected_listings` records: per-listing
    /// failures become errored records, and a failure that takes out the
    /// whole page (launch, navigation) errors every record on it.
    pub fn scrape_page(&self, page: &PageDescriptor) -> Vec<ListingRecord> {
        match self.try_scrape_page(page) {
            Ok(records) => records,
            Err(e) => {
                warn!("Page {} failed as a whole: {:#}", page.page, e);
                let url = self.page_url(page.page);
                (0..page.expected_listings)
                    .map(|_| ListingRecord::errored(&url, format!("{e:#}")))
                    .collect()
            }
        }
    }

    fn try_scrape_page(&self, page: &PageDescriptor) -> Result<Vec<ListingRecord>> {
        let session = BrowserSession::launch(&self.config)?;
        session.goto(&self.page_url(page.page))?;

        let mut records = Vec::with_capacity(page.expected_listings as usize);
        for listing in 1..=page.expected_listings {
            let record = match self.extract_listing(&session, listing) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Listing {} on page {} failed: {:#}", listing, page.page, e);
                    ListingRecord::errored(session.current_url(), format!("{e:#}"))
                }
            };
            records.push(record);
        }

        debug!("Page {} done ({} listings)", page.page, records.len());
        Ok(records)
    }

    /// Open the detail panel of the `listing`-th entry (1-based) on the
    /// session's current page and read its fields.
    fn extract_listing(&self, session: &BrowserSession, listing: u32) -> Result<ListingRecord> {
        let cell = listing_cell_selector(listing);
        session.wait_for(&cell)?;
        session
            .wait_for(&format!("{cell} button"))?
            .click()
            .context("Failed to activate listing detail panel")?;
        session.wait_for(DETAIL_DIVIDER_SELECTOR)?;

        let html = session.capture_html()?;
        let document = Html::parse_document(&html);
        let (overview, qualifications, responsibilities) = extract_detail_sections(&document)?;
        let metadata = extract_metadata(&document, &self.metadata_fields);

        Ok(ListingRecord::extracted(
            session.current_url(),
            overview,
            qualifications,
            responsibilities,
            metadata,
        ))
    }
}

#[async_trait]
impl ListingScraper for MicrosoftCareersScraper {
    async fn scrape(&self) -> Result<Vec<ListingRecord>> {
        let enumerator = self.clone();
        let pages = tokio::task::spawn_blocking(move || enumerator.enumerate_pages()).await??;

        let total: u32 = pages.iter().map(|p| p.expected_listings).sum();
        info!(
            "Located {} total listing(s) over {} page(s)",
            total,
            pages.len()
        );

        let scraper = self.clone();
        let batches = pool::run_pages(pages, self.config.max_workers, move |page| {
            scraper.scrape_page(&page)
        })
        .await?;

        Ok(batches.into_iter().flat_map(|b| b.records).collect())
    }

    fn source_name(&self) -> &'static str {
        "Microsoft careers"
    }
}

/// CSS selector of the `listing`-th result cell. Listing numbers are
/// 1-based; the portal's `data-list-index` attribute counts from 0.
fn listing_cell_selector(listing: u32) -> String {
    format!(
        "div[role='listitem'][data-automationid='ListCell'][data-list-index='{}']",
        listing - 1
    )
}

/// Text of the `h1` carrying the result window, if it rendered.
fn find_results_heading(document: &Html) -> Option<String> {
    let h1 = Selector::parse("h1").unwrap();
    document
        .select(&h1)
        .map(|el| collapse_text(&el))
        .find(|text| text.contains(RESULTS_HEADING_PREFIX))
}

/// Pull (page_size, total_results) out of a "Showing 1-20 of 97 results"
/// heading: the second and third integers, in order of appearance.
fn parse_results_heading(text: &str) -> Result<(u32, u32)> {
    let digits = Regex::new(r"\d+").unwrap();
    let numbers: Vec<u32> = digits
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    match numbers.as_slice() {
        [_, page_size, total_results, ..] if *page_size > 0 => Ok((*page_size, *total_results)),
        _ => bail!("Unrecognized results heading: {text:?}"),
    }
}

/// Expected listing count for every page, 1..=total_pages.
///
/// The counts always sum to `total_results`. When the total is an exact
/// multiple of the page size the final page is full, not empty.
fn page_counts(page_size: u32, total_results: u32) -> Vec<PageDescriptor> {
    let total_pages = total_results.div_ceil(page_size);

    (1..=total_pages)
        .map(|page| {
            let expected_listings = if page == total_pages {
                match total_results % page_size {
                    0 => page_size,
                    remainder => remainder,
                }
            } else {
                page_size
            };
            PageDescriptor {
                page,
                expected_listings,
            }
        })
        .collect()
}

/// Read overview, qualifications and responsibilities from the detail
/// panel: the first three child blocks of the `div` following the divider
/// rule, in that order.
fn extract_detail_sections(document: &Html) -> Result<(String, String, String)> {
    let divider_selector = Selector::parse(DETAIL_DIVIDER_SELECTOR).unwrap();
    let divider = document
        .select(&divider_selector)
        .next()
        .context("Detail divider not found")?;

    let panel = divider
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "div")
        .context("No content block after the detail divider")?;

    let mut sections = panel
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "div")
        .map(|el| collapse_text(&el));

    let overview = sections.next().context("Overview block missing")?;
    let qualifications = sections.next().context("Qualifications block missing")?;
    let responsibilities = sections.next().context("Responsibilities block missing")?;

    Ok((overview, qualifications, responsibilities))
}

/// Collect the configured label/value pairs from the detail panel.
///
/// A field is present when some element's text equals the label exactly
/// and a following sibling carries non-empty text; absent fields are
/// simply skipped.
fn extract_metadata(document: &Html, fields: &[String]) -> BTreeMap<String, String> {
    let any = Selector::parse("*").unwrap();
    let mut metadata = BTreeMap::new();

    for field in fields {
        let value = document
            .select(&any)
            .filter(|el| collapse_text(el) == *field)
            .filter_map(|el| {
                el.next_siblings()
                    .filter_map(ElementRef::wrap)
                    .map(|sibling| collapse_text(&sibling))
                    .find(|text| !text.is_empty())
            })
            .next();

        if let Some(value) = value {
            metadata.insert(field.clone(), value);
        }
    }

    metadata
}

/// Joined, whitespace-trimmed text of an element's text nodes.
fn collapse_text(el: &ElementRef) -> String {
    el.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(page_size: u32, total_results: u32) -> Vec<u32> {
        page_counts(page_size, total_results)
            .iter()
            .map(|p| p.expected_listings)
            .collect()
    }

    #[test]
    fn page_counts_cover_a_partial_last_page() {
        assert_eq!(counts(20, 97), vec![20, 20, 20, 20, 17]);
    }

    #[test]
    fn page_counts_keep_an_exact_multiple_last_page_full() {
        assert_eq!(counts(20, 100), vec![20, 20, 20, 20, 20]);
    }

    #[test]
    fn page_counts_sum_to_the_total() {
        for total_results in 0..250 {
            let sum: u32 = counts(20, total_results).iter().sum();
            assert_eq!(sum, total_results, "total_results={total_results}");
        }
    }

    #[test]
    fn page_numbers_are_sequential_from_one() {
        let pages = page_counts(20, 97);
        let numbers: Vec<u32> = pages.iter().map(|p| p.page).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn results_heading_parses_window_and_total() {
        let (page_size, total) =
            parse_results_heading("Showing 1-20 of 97 results").unwrap();
        assert_eq!(page_size, 20);
        assert_eq!(total, 97);
    }

    #[test]
    fn results_heading_rejects_garbage() {
        assert!(parse_results_heading("Search results").is_err());
        assert!(parse_results_heading("Showing 1-").is_err());
    }

    #[test]
    fn page_url_substitutes_only_the_page_subquery() {
        let config = ScrapeConfig {
            base_url: "https://example.test/search?q=engineer&pg=1&pgSz=20&o=Relevance".to_string(),
            ..ScrapeConfig::default()
        };
        let scraper = MicrosoftCareersScraper::new(config);

        assert_eq!(
            scraper.page_url(4),
            "https://example.test/search?q=engineer&pg=4&pgSz=20&o=Relevance"
        );
        // pgSz=20 stays untouched even though it also contains digits
        assert!(scraper.page_url(3).contains("pgSz=20"));
    }

    #[test]
    fn listing_cells_are_addressed_zero_based() {
        assert_eq!(
            listing_cell_selector(1),
            "div[role='listitem'][data-automationid='ListCell'][data-list-index='0']"
        );
        assert_eq!(
            listing_cell_selector(20),
            "div[role='listitem'][data-automationid='ListCell'][data-list-index='19']"
        );
    }

    const DETAIL_PANEL: &str = r#"
        <html><body>
          <h1>Showing 1-20 of 97 results</h1>
          <div>
            <hr class="horizontalLine-341" />
            <div>
              <div><h3>Overview</h3><p>Build distributed systems.</p></div>
              <div><h3>Qualifications</h3><p>5 years of Rust.</p></div>
              <div><h3>Responsibilities</h3><p>Ship features.</p></div>
              <div><p>Benefits boilerplate.</p></div>
            </div>
          </div>
          <div>
            <div><span>Date posted</span><span>Mar 21, 2024</span></div>
            <div><span>Job number</span><span>1790676</span></div>
            <div><span>Work site</span><span>Up to 50% work from home</span></div>
          </div>
        </body></html>
    "#;

    #[test]
    fn detail_sections_map_to_the_first_three_blocks() {
        let document = Html::parse_document(DETAIL_PANEL);
        let (overview, qualifications, responsibilities) =
            extract_detail_sections(&document).unwrap();

        assert!(overview.contains("Build distributed systems."));
        assert!(qualifications.contains("5 years of Rust."));
        assert!(responsibilities.contains("Ship features."));
        assert!(!overview.contains("Benefits boilerplate."));
    }

    #[test]
    fn detail_sections_error_without_a_divider() {
        let document = Html::parse_document("<html><body><div>no rule here</div></body></html>");
        assert!(extract_detail_sections(&document).is_err());
    }

    #[test]
    fn metadata_reads_the_sibling_of_an_exact_label_match() {
        let document = Html::parse_document(DETAIL_PANEL);
        let fields: Vec<String> = DEFAULT_METADATA_FIELDS
            .iter()
            .map(|f| f.to_string())
            .collect();

        let metadata = extract_metadata(&document, &fields);

        assert_eq!(metadata["Date posted"], "Mar 21, 2024");
        assert_eq!(metadata["Job number"], "1790676");
        assert_eq!(metadata["Work site"], "Up to 50% work from home");
        // Labels that never rendered are absent, not empty
        assert!(!metadata.contains_key("Travel"));
    }

    #[test]
    fn heading_lookup_ignores_unrelated_headings() {
        let document = Html::parse_document(
            "<html><body><h1>Careers</h1><h1>Showing 1-20 of 42 results</h1></body></html>",
        );
        let heading = find_results_heading(&document).unwrap();
        assert_eq!(heading, "Showing 1-20 of 42 results");
    }
}
