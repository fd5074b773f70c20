use engine_logging::engine_debug;
use url::Url;

use crate::segment::StartTag;
use crate::tag::TagKind;
use crate::{OutboundReference, ReferenceKind};

/// Sink for the references found in one document, delivered in document order.
pub trait LinkReceiver {
    /// Called once before any reference of `document` is delivered.
    fn init(&mut self, _document: &Url) {}

    fn receive(&mut self, reference: OutboundReference);
}

/// Receiver that keeps the references of the current document in memory.
///
/// Every reference is kept unless a cap was asked for with [`CollectedLinks::with_max_links`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedLinks {
    pub document: Option<Url>,
    pub references: Vec<OutboundReference>,
    max_links: Option<usize>,
}

impl CollectedLinks {
    pub fn new() -> Self {
        Self {
            document: None,
            references: Vec::new(),
            max_links: None,
        }
    }

    /// Keeps at most `max_links` references per document; each one past the cap is
    /// logged and dropped.
    pub fn with_max_links(max_links: usize) -> Self {
        Self {
            max_links: Some(max_links),
            ..Self::new()
        }
    }

    /// Targets of the given kind, in document order.
    pub fn targets(&self, kind: ReferenceKind) -> Vec<&str> {
        self.references
            .iter()
            .filter(|reference| reference.kind == kind)
            .map(|reference| reference.target.as_str())
            .collect()
    }
}

impl Default for CollectedLinks {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkReceiver for CollectedLinks {
    fn init(&mut self, document: &Url) {
        self.document = Some(document.clone());
        self.references.clear();
    }

    fn receive(&mut self, reference: OutboundReference) {
        if let Some(max_links) = self.max_links {
            if self.references.len() >= max_links {
                engine_debug!(
                    "Dropping reference {} from {}: cap of {max_links} reached",
                    reference.target,
                    reference.origin
                );
                return;
            }
        }
        self.references.push(reference);
    }
}

/// Attribute carrying the reference of a routed element, and the kind it produces.
///
/// `img` is absent: images go through the image extractor instead.
pub fn reference_attribute(kind: TagKind) -> Option<(&'static str, ReferenceKind)> {
    match kind {
        TagKind::Iframe | TagKind::Frame | TagKind::Embed | TagKind::Script => {
            Some(("src", ReferenceKind::EmbeddedResource))
        }
        TagKind::Object => Some(("data", ReferenceKind::EmbeddedResource)),
        TagKind::A | TagKind::Area | TagKind::Link => Some(("href", ReferenceKind::Hyperlink)),
        _ => None,
    }
}

/// Produces the outbound reference of a start tag, if its element routes one and the
/// attribute resolves against `base`.
pub fn dispatch(
    base: &Url,
    origin: &Url,
    kind: TagKind,
    tag: &StartTag,
) -> Option<OutboundReference> {
    let (attribute, reference_kind) = reference_attribute(kind)?;
    let target = resolve_reference(tag.attr(attribute)?, base)?;
    Some(OutboundReference {
        kind: reference_kind,
        target,
        origin: origin.clone(),
    })
}

/// Resolves a raw attribute value against `base`. Empty and unparseable values yield `None`.
pub fn resolve_reference(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    base.join(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://example.com/dir/page.html").unwrap()
    }

    #[test]
    fn routing_table_matches_elements() {
        let cases = [
            ("iframe", "src", ReferenceKind::EmbeddedResource),
            ("frame", "src", ReferenceKind::EmbeddedResource),
            ("embed", "src", ReferenceKind::EmbeddedResource),
            ("script", "src", ReferenceKind::EmbeddedResource),
            ("object", "data", ReferenceKind::EmbeddedResource),
            ("a", "href", ReferenceKind::Hyperlink),
            ("area", "href", ReferenceKind::Hyperlink),
            ("link", "href", ReferenceKind::Hyperlink),
        ];
        for (name, attribute, expected) in cases {
            let tag = StartTag::new(name, &[(attribute, "x.html")]);
            let reference = dispatch(&base(), &base(), TagKind::of(name), &tag)
                .unwrap_or_else(|| panic!("{name} produced nothing"));
            assert_eq!(reference.kind, expected);
            assert_eq!(reference.target.as_str(), "http://example.com/dir/x.html");
        }
    }

    #[test]
    fn img_and_unknown_elements_are_not_routed() {
        let img = StartTag::new("img", &[("src", "a.png")]);
        assert!(dispatch(&base(), &base(), TagKind::Img, &img).is_none());
        let div = StartTag::new("div", &[("href", "a.html")]);
        assert!(dispatch(&base(), &base(), TagKind::Other, &div).is_none());
    }

    #[test]
    fn wrong_attribute_or_bad_value_is_skipped() {
        let anchor = StartTag::new("a", &[("src", "x.html")]);
        assert!(dispatch(&base(), &base(), TagKind::A, &anchor).is_none());
        let broken = StartTag::new("a", &[("href", "http://[::1")]);
        assert!(dispatch(&base(), &base(), TagKind::A, &broken).is_none());
        let empty = StartTag::new("a", &[("href", "  ")]);
        assert!(dispatch(&base(), &base(), TagKind::A, &empty).is_none());
    }

    #[test]
    fn absolute_targets_are_kept_verbatim() {
        let tag = StartTag::new("a", &[("href", "javascript:void(0)")]);
        let reference = dispatch(&base(), &base(), TagKind::A, &tag).unwrap();
        assert_eq!(reference.target.as_str(), "javascript:void(0)");
    }

    #[test]
    fn collected_links_respects_explicit_cap() {
        let mut links = CollectedLinks::with_max_links(1);
        links.init(&base());
        for target in ["http://a.test/", "http://b.test/"] {
            links.receive(OutboundReference {
                kind: ReferenceKind::Hyperlink,
                target: Url::parse(target).unwrap(),
                origin: base(),
            });
        }
        assert_eq!(links.targets(ReferenceKind::Hyperlink), vec!["http://a.test/"]);
    }

    #[test]
    fn collected_links_are_uncapped_by_default() {
        let mut links = CollectedLinks::new();
        links.init(&base());
        for n in 0..6_000 {
            links.receive(OutboundReference {
                kind: ReferenceKind::Hyperlink,
                target: base().join(&format!("page{n}.html")).unwrap(),
                origin: base(),
            });
        }
        assert_eq!(links.references.len(), 6_000);
    }
}
