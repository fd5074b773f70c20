use std::io::{Cursor, Read};
use std::sync::Arc;

use encoding_rs::Encoding;
use engine_logging::engine_debug;
use url::Url;

use crate::binary::ImageResponseParser;
use crate::charset::resolve_stream;
use crate::config::ExtractorConfig;
use crate::dedup::DedupSet;
use crate::digest::DigestAccumulator;
use crate::fetch::Transport;
use crate::hash::{Digest, HashAlgorithm};
use crate::images::ImageExtractor;
use crate::indexer::VisualIndexer;
use crate::links::LinkReceiver;
use crate::redirect;
use crate::scanner::Scanner;
use crate::segment::SegmentReader;
use crate::{ConfigError, DocumentResponse, ParseError, ResponseHeaders};

/// External services a parser calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub indexer: Arc<dyn VisualIndexer>,
}

/// Result of parsing one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// `None` when no hash algorithm is configured.
    pub digest: Option<Digest>,
    pub charset: Option<&'static Encoding>,
    /// Target of the `Location` response header.
    pub location: Option<Url>,
    /// Target of the last `<meta http-equiv="location">`.
    pub meta_location: Option<Url>,
}

/// Single-pass HTML parser producing a digest, outbound references and indexed images.
pub struct HtmlParser {
    algorithm: Option<HashAlgorithm>,
    cross_authority_duplicates: bool,
    default_charset: String,
    sniff_limit: usize,
    detect_unlabeled: bool,
    images: Option<ImageExtractor>,
    guessed: Option<&'static Encoding>,
}

impl HtmlParser {
    /// Builds a parser; an unknown hash name or invalid settings are refused here.
    pub fn new(config: &ExtractorConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let algorithm = config.hash_algorithm()?;
        let images = algorithm.map(|algorithm| {
            ImageExtractor::new(
                algorithm,
                config.image.clone(),
                config.image_fetch.clone(),
                config.dedup,
                collaborators.transport,
                collaborators.indexer,
            )
        });
        Ok(Self {
            algorithm,
            cross_authority_duplicates: config.cross_authority_duplicates,
            default_charset: config.default_charset.clone(),
            sniff_limit: config.sniff_limit,
            detect_unlabeled: config.detect_unlabeled,
            images,
            guessed: None,
        })
    }

    /// Parses one document, delivering its references to `receiver` in document order.
    ///
    /// Only a failure to read `response.body` is an error; problems with single
    /// references or images are logged and skipped.
    pub fn parse<R: Read>(
        &mut self,
        response: DocumentResponse<R>,
        receiver: &mut dyn LinkReceiver,
    ) -> Result<ParseOutcome, ParseError> {
        let DocumentResponse {
            url,
            headers,
            mut body,
        } = response;

        let mut prefix = Vec::with_capacity(self.sniff_limit);
        body.by_ref()
            .take(self.sniff_limit as u64)
            .read_to_end(&mut prefix)?;
        let resolved = resolve_stream(
            &prefix,
            headers.content_type(),
            &self.default_charset,
            self.detect_unlabeled,
        );
        engine_debug!(
            "Charset for {}: {} ({:?})",
            url,
            resolved.encoding.name(),
            resolved.source
        );
        self.guessed = Some(resolved.encoding);

        receiver.init(&url);
        let location = redirect::http_location(&url, &headers).map(|reference| {
            let target = reference.target.clone();
            receiver.receive(reference);
            target
        });

        let scope = (!self.cross_authority_duplicates).then(|| url.origin().ascii_serialization());
        let digest = self
            .algorithm
            .map(|algorithm| DigestAccumulator::init(algorithm, scope.as_deref()));

        let segments = SegmentReader::new(Cursor::new(prefix).chain(body), resolved.encoding);
        let scanned = Scanner::new(&url, digest, self.images.as_mut(), receiver).run(segments)?;

        Ok(ParseOutcome {
            digest: scanned.digest,
            charset: Some(resolved.encoding),
            location,
            meta_location: scanned.meta_location,
        })
    }

    /// Encoding chosen for the last parsed document.
    pub fn guessed_charset(&self) -> Option<&'static Encoding> {
        self.guessed
    }

    /// Image ids indexed by this parser; `None` when image processing is disabled.
    pub fn recorded_images(&self) -> Option<&DedupSet> {
        self.images.as_ref().map(ImageExtractor::recorded)
    }

    /// A parser with the same configuration and collaborators, ready for another worker.
    pub fn duplicate(&self) -> Self {
        Self {
            algorithm: self.algorithm,
            cross_authority_duplicates: self.cross_authority_duplicates,
            default_charset: self.default_charset.clone(),
            sniff_limit: self.sniff_limit,
            detect_unlabeled: self.detect_unlabeled,
            images: self.images.as_ref().map(ImageExtractor::duplicate),
            guessed: None,
        }
    }
}

/// The parser variants a crawler worker picks from per response.
pub enum Parser {
    Html(HtmlParser),
    Image(ImageResponseParser),
}

impl Parser {
    pub fn html(config: &ExtractorConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        HtmlParser::new(config, collaborators).map(Self::Html)
    }

    pub fn image(
        config: &ExtractorConfig,
        indexer: Arc<dyn VisualIndexer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::Image(ImageResponseParser::new(
            config.hash_algorithm()?,
            config.image.clone(),
            indexer,
        )))
    }

    /// Whether this variant handles a response with the given headers.
    ///
    /// A response without `Content-Type` is treated as HTML.
    pub fn applies_to(&self, headers: &ResponseHeaders) -> bool {
        let mime = headers
            .content_type()
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase());
        match self {
            Self::Html(_) => mime.map_or(true, |mime| {
                mime == "text/html" || mime == "application/xhtml+xml"
            }),
            Self::Image(_) => mime.is_some_and(|mime| mime.starts_with("image/")),
        }
    }

    pub fn parse<R: Read>(
        &mut self,
        response: DocumentResponse<R>,
        receiver: &mut dyn LinkReceiver,
    ) -> Result<ParseOutcome, ParseError> {
        match self {
            Self::Html(parser) => parser.parse(response, receiver),
            Self::Image(parser) => parser.parse(response),
        }
    }

    pub fn duplicate(&self) -> Self {
        match self {
            Self::Html(parser) => Self::Html(parser.duplicate()),
            Self::Image(parser) => Self::Image(parser.duplicate()),
        }
    }

    /// Encoding of the last parsed document; image responses have none.
    pub fn guessed_charset(&self) -> Option<&'static Encoding> {
        match self {
            Self::Html(parser) => parser.guessed_charset(),
            Self::Image(_) => None,
        }
    }
}
