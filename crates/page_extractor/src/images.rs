use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use engine_logging::{engine_debug, engine_info};
use image::{DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::dedup::{DedupSet, DedupSettings};
use crate::fetch::{FetchSettings, Transport};
use crate::hash::{Digest, HashAlgorithm};
use crate::indexer::VisualIndexer;
use crate::links::resolve_reference;
use crate::segment::StartTag;
use crate::ResponseHeaders;

/// Thresholds an image response must pass before it is decoded and indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageFilter {
    /// Responses of this many bytes or fewer are rejected.
    pub min_content_length: u64,
    /// Lowercase MIME types without parameters.
    pub accepted_types: Vec<String>,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self {
            min_content_length: 20_000,
            accepted_types: vec!["image/jpeg".to_string(), "image/png".to_string()],
            min_width: 300,
            min_height: 300,
        }
    }
}

impl ImageFilter {
    /// Checks the declared type and the content length of a response.
    pub fn accepts_headers(&self, content_type: Option<&str>, content_length: u64) -> bool {
        if content_length <= self.min_content_length {
            return false;
        }
        let Some(content_type) = content_type else {
            return false;
        };
        let mime = content_type.split(';').next().unwrap_or_default().trim();
        self.accepted_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(mime))
    }

    pub fn accepts_dimensions(&self, width: u32, height: u32) -> bool {
        width >= self.min_width && height >= self.min_height
    }
}

/// An image that passed every check and is about to be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCandidate {
    pub url: Url,
    /// Hash of the URL text.
    pub id: Digest,
    pub alt: Option<String>,
    pub width: u32,
    pub height: u32,
    pub last_modified: Option<DateTime<Utc>>,
    pub page_url: Url,
}

/// Why a fetched image was not indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    ContentHeaders,
    Undecodable,
    TooSmall,
}

/// Result of handling one `<img>` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Indexed,
    Duplicate,
    Unresolvable,
    FetchFailed,
    Rejected(Rejection),
    IndexFailed,
}

/// Parses an HTTP date in any of the three formats HTTP/1.1 allows.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Applies the header and dimension checks of `filter` to a fetched response.
pub(crate) fn screen(
    filter: &ImageFilter,
    headers: &ResponseHeaders,
    bytes: &[u8],
) -> Result<DynamicImage, Rejection> {
    let content_length = headers.content_length().unwrap_or(bytes.len() as u64);
    if !filter.accepts_headers(headers.content_type(), content_length) {
        return Err(Rejection::ContentHeaders);
    }
    let image = image::load_from_memory(bytes).map_err(|_| Rejection::Undecodable)?;
    let (width, height) = image.dimensions();
    if !filter.accepts_dimensions(width, height) {
        return Err(Rejection::TooSmall);
    }
    Ok(image)
}

/// Validates, deduplicates and forwards the images of the documents one parser sees.
pub struct ImageExtractor {
    algorithm: HashAlgorithm,
    filter: ImageFilter,
    fetch: FetchSettings,
    dedup: DedupSettings,
    transport: Arc<dyn Transport>,
    indexer: Arc<dyn VisualIndexer>,
    seen: DedupSet,
}

impl ImageExtractor {
    pub fn new(
        algorithm: HashAlgorithm,
        filter: ImageFilter,
        fetch: FetchSettings,
        dedup: DedupSettings,
        transport: Arc<dyn Transport>,
        indexer: Arc<dyn VisualIndexer>,
    ) -> Self {
        Self {
            algorithm,
            filter,
            fetch,
            dedup,
            transport,
            indexer,
            seen: DedupSet::new(dedup),
        }
    }

    /// Handles one `<img>` start tag found on `page` while `base` is in effect.
    ///
    /// The image id is recorded only when the indexer accepts the image, so every
    /// other outcome lets a later occurrence retry.
    pub fn process(&mut self, page: &Url, base: &Url, tag: &StartTag) -> ImageOutcome {
        let Some(url) = tag.attr("src").and_then(|src| resolve_reference(src, base)) else {
            return ImageOutcome::Unresolvable;
        };
        let id = self.algorithm.hash(url.as_str().as_bytes());
        if self.seen.contains(&id) {
            return ImageOutcome::Duplicate;
        }

        let output = match self.transport.fetch(&url, &self.fetch) {
            Ok(output) => output,
            Err(err) => {
                engine_debug!("Skipping image {}: {}", url, err);
                return ImageOutcome::FetchFailed;
            }
        };
        let headers = &output.metadata.headers;
        let image = match screen(&self.filter, headers, &output.bytes) {
            Ok(image) => image,
            Err(rejection) => {
                engine_debug!("Rejected image {}: {:?}", url, rejection);
                return ImageOutcome::Rejected(rejection);
            }
        };

        let (width, height) = image.dimensions();
        let candidate = ImageCandidate {
            url,
            id,
            alt: tag
                .attr("alt")
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map(str::to_string),
            width,
            height,
            last_modified: headers.last_modified().and_then(parse_http_date),
            page_url: page.clone(),
        };
        match self.indexer.index(&candidate, &image) {
            Ok(()) => {
                self.seen.insert(&candidate.id);
                engine_info!(
                    "Indexed image {} ({}x{}) from {}",
                    candidate.url,
                    width,
                    height,
                    page
                );
                ImageOutcome::Indexed
            }
            Err(err) => {
                engine_debug!("Indexer failed for {}: {}", candidate.url, err);
                ImageOutcome::IndexFailed
            }
        }
    }

    /// The set of image ids indexed through this extractor.
    pub fn recorded(&self) -> &DedupSet {
        &self.seen
    }

    /// Same configuration and collaborators, empty dedup set.
    pub fn duplicate(&self) -> Self {
        Self {
            algorithm: self.algorithm,
            filter: self.filter.clone(),
            fetch: self.fetch.clone(),
            dedup: self.dedup,
            transport: Arc::clone(&self.transport),
            indexer: Arc::clone(&self.indexer),
            seen: DedupSet::new(self.dedup),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn header_filter_thresholds() {
        let filter = ImageFilter::default();
        assert!(!filter.accepts_headers(Some("image/jpeg"), 15_000));
        assert!(!filter.accepts_headers(Some("image/jpeg"), 20_000));
        assert!(filter.accepts_headers(Some("image/jpeg"), 20_001));
        assert!(filter.accepts_headers(Some("IMAGE/PNG; charset=binary"), 50_000));
        assert!(!filter.accepts_headers(Some("image/gif"), 50_000));
        assert!(!filter.accepts_headers(None, 50_000));
    }

    #[test]
    fn dimension_filter_thresholds() {
        let filter = ImageFilter::default();
        assert!(filter.accepts_dimensions(400, 400));
        assert!(filter.accepts_dimensions(300, 300));
        assert!(!filter.accepts_dimensions(299, 400));
        assert!(!filter.accepts_dimensions(400, 10));
    }

    #[test]
    fn http_dates_in_all_formats() {
        let rfc1123 = parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
        assert_eq!((rfc1123.year(), rfc1123.month(), rfc1123.day()), (1994, 11, 6));
        assert_eq!(rfc1123.hour(), 8);

        let rfc850 = parse_http_date("Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
        assert_eq!(rfc850, rfc1123);

        assert!(parse_http_date("yesterday").is_none());
        assert!(parse_http_date("").is_none());
    }

    #[test]
    fn screen_uses_received_length_without_header() {
        let filter = ImageFilter::default();
        let headers = ResponseHeaders::new().with("Content-Type", "image/png");
        assert_eq!(
            screen(&filter, &headers, &[0u8; 100]).unwrap_err(),
            Rejection::ContentHeaders
        );
        assert_eq!(
            screen(&filter, &headers, &[0u8; 30_000]).unwrap_err(),
            Rejection::Undecodable
        );
    }
}
