use crate::hash::{Digest, HashAlgorithm, StreamHasher};
use crate::segment::{EndTag, StartTag};

/// Folds the structural and textual material of a document into a running digest.
///
/// Text is fed with every whitespace run collapsed to one space, tracked across calls,
/// so the result does not depend on how text was split into segments.
pub struct DigestAccumulator {
    hasher: StreamHasher,
    last_was_space: bool,
}

impl DigestAccumulator {
    /// Starts a digest scoped by `scope_key` (typically the document authority).
    pub fn init(algorithm: HashAlgorithm, scope_key: Option<&str>) -> Self {
        let mut hasher = algorithm.hasher();
        if let Some(key) = scope_key {
            hasher.update(key.as_bytes());
            hasher.update(b"\0");
        }
        Self {
            hasher,
            last_was_space: false,
        }
    }

    pub fn start_tag(&mut self, tag: &StartTag) {
        self.hasher.update(b"<");
        self.hasher.update(tag.name.as_bytes());
        // Frame sources carry the content of framesets.
        if matches!(tag.name.as_str(), "iframe" | "frame") {
            if let Some(src) = tag.attr("src") {
                self.hasher.update(b" src=\"");
                self.hasher.update(src.as_bytes());
                self.hasher.update(b"\"");
            }
        }
        self.hasher.update(b">");
        self.last_was_space = false;
    }

    pub fn end_tag(&mut self, tag: &EndTag) {
        self.hasher.update(b"</");
        self.hasher.update(tag.name.as_bytes());
        self.hasher.update(b">");
        self.last_was_space = false;
    }

    pub fn text(&mut self, text: &str) {
        let mut collapsed = String::with_capacity(text.len());
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !self.last_was_space {
                    collapsed.push(' ');
                    self.last_was_space = true;
                }
            } else {
                collapsed.push(ch);
                self.last_was_space = false;
            }
        }
        self.hasher.update(collapsed.as_bytes());
    }

    pub fn character(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        self.text(ch.encode_utf8(&mut buf));
    }

    pub fn finalize(self) -> Digest {
        self.hasher.finalize()
    }
}
