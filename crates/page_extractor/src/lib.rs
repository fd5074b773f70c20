//! Page extractor: single-pass digesting, link extraction and image indexing of fetched pages.
mod binary;
mod charset;
mod config;
mod dedup;
mod digest;
mod fetch;
mod hash;
mod images;
mod indexer;
mod links;
mod parser;
mod redirect;
mod scanner;
mod segment;
mod tag;
mod types;

pub use binary::ImageResponseParser;
pub use charset::{
    charset_parameter, resolve, resolve_stream, sniff_meta_charset, CharsetSource,
    ResolvedCharset, DEFAULT_CHARSET,
};
pub use config::ExtractorConfig;
pub use dedup::{DedupSet, DedupSettings};
pub use digest::DigestAccumulator;
pub use fetch::{FetchSettings, ReqwestTransport, Transport};
pub use hash::{Digest, HashAlgorithm, StreamHasher};
pub use images::{
    parse_http_date, ImageCandidate, ImageExtractor, ImageFilter, ImageOutcome, Rejection,
};
pub use indexer::{ChannelIndexer, IndexError, IndexRequest, VisualIndexer};
pub use links::{dispatch, reference_attribute, resolve_reference, CollectedLinks, LinkReceiver};
pub use parser::{Collaborators, HtmlParser, ParseOutcome, Parser};
pub use redirect::{http_location, meta_redirect};
pub use segment::{Attribute, EndTag, Scanned, Segment, SegmentReader, StartTag, TagForm};
pub use tag::TagKind;
pub use types::{
    ConfigError, DocumentResponse, FailureKind, FetchError, FetchMetadata, FetchOutput,
    OutboundReference, ParseError, ReferenceKind, ResponseHeaders,
};
