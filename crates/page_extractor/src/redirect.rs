use engine_logging::engine_debug;
use url::Url;

use crate::segment::StartTag;
use crate::{OutboundReference, ReferenceKind, ResponseHeaders};

/// Redirect announced by the `Location` response header, resolved against the document URL.
pub fn http_location(document: &Url, headers: &ResponseHeaders) -> Option<OutboundReference> {
    let raw = headers.location()?.trim();
    let target = resolve_logged(raw, document, "header location")?;
    Some(OutboundReference {
        kind: ReferenceKind::RedirectHttp,
        target,
        origin: document.clone(),
    })
}

/// Redirect declared by `<meta http-equiv="refresh">` or `<meta http-equiv="location">`,
/// resolved against the current base.
pub fn meta_redirect(base: &Url, origin: &Url, tag: &StartTag) -> Option<OutboundReference> {
    let equiv = tag.attr("http-equiv")?.trim();
    let content = tag.attr("content")?;

    let (kind, raw, what) = if equiv.eq_ignore_ascii_case("refresh") {
        (
            ReferenceKind::RedirectMetaRefresh,
            refresh_target(content)?,
            "META refresh",
        )
    } else if equiv.eq_ignore_ascii_case("location") {
        (
            ReferenceKind::RedirectMetaLocation,
            content.trim(),
            "META location",
        )
    } else {
        return None;
    };

    let target = resolve_logged(raw, base, what)?;
    Some(OutboundReference {
        kind,
        target,
        origin: origin.clone(),
    })
}

/// Target of a refresh value shaped like `<delay>;URL=<target>`. The delay is ignored.
fn refresh_target(content: &str) -> Option<&str> {
    // ASCII lowercasing keeps byte offsets intact.
    let pos = content.to_ascii_lowercase().find("url=")?;
    let target = content[pos + "url=".len()..]
        .trim()
        .trim_matches(['"', '\''].as_ref())
        .trim();
    (!target.is_empty()).then_some(target)
}

/// Resolves `raw` against `base`, noting relative values which should have been absolute.
fn resolve_logged(raw: &str, base: &Url, what: &str) -> Option<Url> {
    if raw.is_empty() {
        return None;
    }
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            engine_debug!("Found relative {} URL: \"{}\"", what, raw);
            base.join(raw).ok()
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn meta(equiv: &str, content: &str) -> StartTag {
        StartTag::new("meta", &[("http-equiv", equiv), ("content", content)])
    }

    #[test]
    fn relative_location_header_resolves_against_document() {
        let headers = ResponseHeaders::new().with("Location", "/login");
        let reference = http_location(&url("http://site.test/page"), &headers).unwrap();
        assert_eq!(reference.kind, ReferenceKind::RedirectHttp);
        assert_eq!(reference.target.as_str(), "http://site.test/login");
    }

    #[test]
    fn missing_location_header_yields_nothing() {
        assert!(http_location(&url("http://site.test/"), &ResponseHeaders::new()).is_none());
    }

    #[test]
    fn refresh_extracts_target_after_url_marker() {
        let base = url("http://foo.bar/");
        let reference = meta_redirect(&base, &base, &meta("refresh", "0;URL=http://foo.bar/x")).unwrap();
        assert_eq!(reference.kind, ReferenceKind::RedirectMetaRefresh);
        assert_eq!(reference.target.as_str(), "http://foo.bar/x");

        let relative = meta_redirect(&base, &base, &meta("REFRESH", "5; url='next.html'")).unwrap();
        assert_eq!(relative.target.as_str(), "http://foo.bar/next.html");
    }

    #[test]
    fn refresh_without_url_is_ignored() {
        let base = url("http://foo.bar/");
        assert!(meta_redirect(&base, &base, &meta("refresh", "30")).is_none());
        assert!(meta_redirect(&base, &base, &meta("refresh", "0;URL=")).is_none());
    }

    #[test]
    fn meta_location_resolves_against_base() {
        let base = url("http://foo.bar/a/");
        let origin = url("http://foo.bar/a/index.html");
        let reference = meta_redirect(&base, &origin, &meta("Location", "b.html")).unwrap();
        assert_eq!(reference.kind, ReferenceKind::RedirectMetaLocation);
        assert_eq!(reference.target.as_str(), "http://foo.bar/a/b.html");
        assert_eq!(reference.origin, origin);
    }

    #[test]
    fn other_or_incomplete_meta_tags_are_ignored() {
        let base = url("http://foo.bar/");
        assert!(meta_redirect(&base, &base, &meta("content-type", "text/html")).is_none());
        let no_content = StartTag::new("meta", &[("http-equiv", "refresh")]);
        assert!(meta_redirect(&base, &base, &no_content).is_none());
    }
}
