use std::io::Read;
use std::sync::Arc;

use engine_logging::{engine_debug, engine_info};
use image::GenericImageView;

use crate::hash::HashAlgorithm;
use crate::images::{parse_http_date, screen, ImageCandidate, ImageFilter};
use crate::indexer::VisualIndexer;
use crate::parser::ParseOutcome;
use crate::{DocumentResponse, ParseError};

/// Parser for responses that are themselves images.
///
/// The digest is the hash of the response URL, not of the image bytes: identical
/// images served from different URLs are distinct documents. Indexing runs on every
/// acceptable response; there is no dedup set here.
pub struct ImageResponseParser {
    algorithm: Option<HashAlgorithm>,
    filter: ImageFilter,
    indexer: Arc<dyn VisualIndexer>,
}

impl ImageResponseParser {
    pub fn new(
        algorithm: Option<HashAlgorithm>,
        filter: ImageFilter,
        indexer: Arc<dyn VisualIndexer>,
    ) -> Self {
        Self {
            algorithm,
            filter,
            indexer,
        }
    }

    /// Digests the URL and indexes the image if it passes the filter.
    ///
    /// Without a hash algorithm nothing is read and no digest is produced.
    pub fn parse<R: Read>(
        &self,
        response: DocumentResponse<R>,
    ) -> Result<ParseOutcome, ParseError> {
        let DocumentResponse {
            url,
            headers,
            mut body,
        } = response;
        let Some(algorithm) = self.algorithm else {
            return Ok(ParseOutcome::default());
        };
        let id = algorithm.hash(url.as_str().as_bytes());

        let mut bytes = Vec::new();
        body.read_to_end(&mut bytes)?;

        match screen(&self.filter, &headers, &bytes) {
            Ok(image) => {
                let (width, height) = image.dimensions();
                let candidate = ImageCandidate {
                    url: url.clone(),
                    id: id.clone(),
                    alt: None,
                    width,
                    height,
                    last_modified: headers.last_modified().and_then(parse_http_date),
                    page_url: url.clone(),
                };
                match self.indexer.index(&candidate, &image) {
                    Ok(()) => engine_info!("Indexed image {} ({}x{})", url, width, height),
                    Err(err) => engine_debug!("Indexer failed for {}: {}", url, err),
                }
            }
            Err(rejection) => engine_debug!("Rejected image {}: {:?}", url, rejection),
        }

        Ok(ParseOutcome {
            digest: Some(id),
            ..ParseOutcome::default()
        })
    }

    pub fn duplicate(&self) -> Self {
        Self {
            algorithm: self.algorithm,
            filter: self.filter.clone(),
            indexer: Arc::clone(&self.indexer),
        }
    }
}
