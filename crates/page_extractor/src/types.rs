use std::fmt;
use std::io::Read;

use url::Url;

/// Kind of an outbound reference found while scanning a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Hyperlink,
    EmbeddedResource,
    RedirectHttp,
    RedirectMetaRefresh,
    RedirectMetaLocation,
}

/// An absolute reference emitted to the link receiver as soon as it is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReference {
    pub kind: ReferenceKind,
    pub target: Url,
    pub origin: Url,
}

/// Response headers as delivered by the transport, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, String)>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length")
            .and_then(|value| value.trim().parse().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.get("location")
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.get("last-modified")
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResponseHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// A fetched document handed to a parser: identity, transport metadata and the body stream.
pub struct DocumentResponse<R> {
    pub url: Url,
    pub headers: ResponseHeaders,
    pub body: R,
}

impl<R: Read> DocumentResponse<R> {
    pub fn new(url: Url, headers: ResponseHeaders, body: R) -> Self {
        Self { url, headers, body }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub headers: ResponseHeaders,
}

impl FetchMetadata {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Fatal failure of one document parse. Everything else is handled locally.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read document stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Construction-time configuration failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown hash function {0:?}")]
    UnknownHashAlgorithm(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
