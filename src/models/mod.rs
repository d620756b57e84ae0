use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One results page and the number of listings it is expected to hold.
///
/// `page` is 1-based. Produced once by page enumeration and consumed
/// read-only by the page driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDescriptor {
    pub page: u32,
    pub expected_listings: u32,
}

/// One scraped job posting, or the error placeholder standing in for it.
///
/// Exactly one record exists per (page, listing) pair, even when the
/// extraction failed: downstream aggregation relies on a fixed-arity,
/// index-aligned result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub url: String,
    pub error: bool,
    pub error_message: String,
    pub overview: String,
    pub qualifications: String,
    pub responsibilities: String,
    /// Named detail-panel fields ("Job number", "Work site", ...), keyed
    /// by their on-page label.
    #[serde(flatten)]
    pub metadata: BTreeMap<String, String>,
}

impl ListingRecord {
    /// A successfully extracted posting.
    pub fn extracted(
        url: impl Into<String>,
        overview: impl Into<String>,
        qualifications: impl Into<String>,
        responsibilities: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            url: url.into(),
            error: false,
            error_message: String::new(),
            overview: overview.into(),
            qualifications: qualifications.into(),
            responsibilities: responsibilities.into(),
            metadata,
        }
    }

    /// The placeholder emitted when a listing cannot be read. The URL may
    /// be stale (whatever the session was last pointed at); text fields
    /// stay empty.
    pub fn errored(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            error: true,
            error_message: message.into(),
            overview: String::new(),
            qualifications: String::new(),
            responsibilities: String::new(),
            metadata: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errored_record_has_message_and_empty_text_fields() {
        let record = ListingRecord::errored("https://example.test/jobs?pg=3", "stale element");

        assert!(record.error);
        assert_eq!(record.error_message, "stale element");
        assert!(record.overview.is_empty());
        assert!(record.qualifications.is_empty());
        assert!(record.responsibilities.is_empty());
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn metadata_flattens_into_the_record_object() {
        let mut metadata = BTreeMap::new();
        metadata.insert("Job number".to_string(), "1790676".to_string());

        let record = ListingRecord::extracted("u", "o", "q", "r", metadata);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["Job number"], "1790676");
        assert_eq!(value["error"], false);

        let back: ListingRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
