use std::io;

use engine_logging::engine_debug;
use url::Url;

use crate::digest::DigestAccumulator;
use crate::hash::Digest;
use crate::images::ImageExtractor;
use crate::links::{self, LinkReceiver};
use crate::redirect;
use crate::segment::{EndTag, Scanned, Segment, StartTag, TagForm};
use crate::tag::TagKind;
use crate::ReferenceKind;

/// What a completed scan leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub digest: Option<Digest>,
    pub meta_location: Option<Url>,
}

/// State of one pass over a document's segments.
pub(crate) struct Scanner<'a> {
    document: &'a Url,
    base: Url,
    last_end: usize,
    exclusion_depth: u32,
    digest: Option<DigestAccumulator>,
    images: Option<&'a mut ImageExtractor>,
    receiver: &'a mut dyn LinkReceiver,
    meta_location: Option<Url>,
}

impl<'a> Scanner<'a> {
    pub(crate) fn new(
        document: &'a Url,
        digest: Option<DigestAccumulator>,
        images: Option<&'a mut ImageExtractor>,
        receiver: &'a mut dyn LinkReceiver,
    ) -> Self {
        Self {
            document,
            base: document.clone(),
            last_end: 0,
            exclusion_depth: 0,
            digest,
            images,
            receiver,
            meta_location: None,
        }
    }

    /// Drives the scan to the end of `segments`. The first read error aborts it.
    pub(crate) fn run<I>(mut self, segments: I) -> io::Result<ScanOutcome>
    where
        I: IntoIterator<Item = io::Result<Scanned>>,
    {
        for scanned in segments {
            self.feed(scanned?);
        }
        Ok(self.finish())
    }

    pub(crate) fn feed(&mut self, scanned: Scanned) {
        if scanned.end <= self.last_end {
            return;
        }
        self.last_end = scanned.end;
        match scanned.segment {
            Segment::StartTag(tag) => self.start_tag(&tag),
            Segment::EndTag(tag) => self.end_tag(&tag),
            Segment::Text(text) => {
                if self.exclusion_depth == 0 {
                    if let Some(digest) = self.digest.as_mut() {
                        digest.text(&text);
                    }
                }
            }
            Segment::CharacterReference(ch) => {
                if self.exclusion_depth == 0 {
                    if let Some(digest) = self.digest.as_mut() {
                        digest.character(ch);
                    }
                }
            }
        }
    }

    pub(crate) fn finish(self) -> ScanOutcome {
        ScanOutcome {
            digest: self.digest.map(DigestAccumulator::finalize),
            meta_location: self.meta_location,
        }
    }

    fn start_tag(&mut self, tag: &StartTag) {
        if tag.form != TagForm::Normal {
            return;
        }
        let kind = TagKind::of(&tag.name);
        if kind.is_exclusion_region() && !tag.self_closing {
            self.exclusion_depth += 1;
        }
        if let Some(digest) = self.digest.as_mut() {
            digest.start_tag(tag);
        }

        match kind {
            TagKind::Img => {
                if let Some(images) = self.images.as_deref_mut() {
                    images.process(self.document, &self.base, tag);
                }
            }
            TagKind::Base => self.update_base(tag),
            TagKind::Meta => {
                if let Some(reference) = redirect::meta_redirect(&self.base, self.document, tag) {
                    if reference.kind == ReferenceKind::RedirectMetaLocation {
                        self.meta_location = Some(reference.target.clone());
                    }
                    self.receiver.receive(reference);
                }
            }
            _ => {
                if let Some(reference) = links::dispatch(&self.base, self.document, kind, tag) {
                    self.receiver.receive(reference);
                }
            }
        }
    }

    fn end_tag(&mut self, tag: &EndTag) {
        if TagKind::of(&tag.name).is_exclusion_region() {
            self.exclusion_depth = self.exclusion_depth.saturating_sub(1);
        }
        if tag.form != TagForm::Normal {
            return;
        }
        if let Some(digest) = self.digest.as_mut() {
            digest.end_tag(tag);
        }
    }

    fn update_base(&mut self, tag: &StartTag) {
        let Some(href) = tag.attr("href").map(str::trim) else {
            return;
        };
        match Url::parse(href) {
            Ok(base) => self.base = base,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                engine_debug!("Found relative BASE URL: \"{}\"", href);
            }
            Err(_) => {}
        }
    }
}
