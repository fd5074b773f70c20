use chardetng::EncodingDetector;
use encoding_rs::{Encoding, WINDOWS_1252};
use engine_logging::engine_debug;

use crate::segment::{Segment, SegmentReader, TagForm};

/// Label assumed when nothing better is known.
pub const DEFAULT_CHARSET: &str = "ISO-8859-1";

/// Where the resolved encoding came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharsetSource {
    Default,
    Header,
    Meta,
    ByteOrderMark,
    Detected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedCharset {
    pub encoding: &'static Encoding,
    pub source: CharsetSource,
}

/// Picks the document encoding: default < `Content-Type` charset < meta charset.
///
/// Labels that do not name a known encoding are dropped and the next lower
/// priority value is used instead.
pub fn resolve(
    content_type: Option<&str>,
    meta_charset: Option<&str>,
    default: &str,
) -> ResolvedCharset {
    let mut resolved = ResolvedCharset {
        encoding: lookup(default).unwrap_or(WINDOWS_1252),
        source: CharsetSource::Default,
    };
    if let Some(encoding) = content_type.and_then(charset_parameter).and_then(|l| lookup(&l)) {
        resolved = ResolvedCharset {
            encoding,
            source: CharsetSource::Header,
        };
    }
    if let Some(encoding) = meta_charset.and_then(lookup) {
        resolved = ResolvedCharset {
            encoding,
            source: CharsetSource::Meta,
        };
    }
    resolved
}

/// Resolves the encoding of a stream from its buffered prefix and transport header.
///
/// A byte-order mark in the prefix wins over every label. With `detect_unlabeled`,
/// a document with neither a usable header nor meta label is guessed by `chardetng`
/// instead of falling back to `default`.
pub fn resolve_stream(
    prefix: &[u8],
    content_type: Option<&str>,
    default: &str,
    detect_unlabeled: bool,
) -> ResolvedCharset {
    if let Some((encoding, _)) = Encoding::for_bom(prefix) {
        return ResolvedCharset {
            encoding,
            source: CharsetSource::ByteOrderMark,
        };
    }

    let meta = sniff_meta_charset(prefix);
    let resolved = resolve(content_type, meta.as_deref(), default);
    if resolved.source == CharsetSource::Default && detect_unlabeled {
        let mut detector = EncodingDetector::new();
        detector.feed(prefix, true);
        return ResolvedCharset {
            encoding: detector.guess(None, true),
            source: CharsetSource::Detected,
        };
    }
    resolved
}

/// Finds a `<meta charset>` or `<meta http-equiv="content-type">` declaration in `prefix`.
pub fn sniff_meta_charset(prefix: &[u8]) -> Option<String> {
    for item in SegmentReader::new(prefix, WINDOWS_1252) {
        let Ok(scanned) = item else {
            break;
        };
        let Segment::StartTag(tag) = scanned.segment else {
            continue;
        };
        if tag.form != TagForm::Normal || tag.name != "meta" {
            continue;
        }
        if let Some(charset) = tag.attr("charset").map(str::trim) {
            if !charset.is_empty() {
                return Some(charset.to_string());
            }
        }
        let is_content_type = tag
            .attr("http-equiv")
            .is_some_and(|equiv| equiv.trim().eq_ignore_ascii_case("content-type"));
        if is_content_type {
            if let Some(charset) = tag.attr("content").and_then(charset_parameter) {
                return Some(charset);
            }
        }
    }
    None
}

/// `charset` parameter of a `Content-Type` style value.
pub fn charset_parameter(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| part.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches(['"', '\''].as_ref()).to_string())
        .filter(|value| !value.is_empty())
}

fn lookup(label: &str) -> Option<&'static Encoding> {
    let encoding = Encoding::for_label(label.trim().as_bytes());
    if encoding.is_none() {
        engine_debug!("Ignoring unknown charset label \"{}\"", label);
    }
    encoding
}
