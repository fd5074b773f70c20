/// Elements the scanner routes on; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    A,
    Area,
    Base,
    Embed,
    Frame,
    Iframe,
    Img,
    Link,
    Meta,
    Object,
    Script,
    Style,
    Other,
}

// Sorted by name for binary search.
const TAG_TABLE: &[(&str, TagKind)] = &[
    ("a", TagKind::A),
    ("area", TagKind::Area),
    ("base", TagKind::Base),
    ("embed", TagKind::Embed),
    ("frame", TagKind::Frame),
    ("iframe", TagKind::Iframe),
    ("img", TagKind::Img),
    ("link", TagKind::Link),
    ("meta", TagKind::Meta),
    ("object", TagKind::Object),
    ("script", TagKind::Script),
    ("style", TagKind::Style),
];

impl TagKind {
    /// Looks up a lowercase element name.
    pub fn of(name: &str) -> Self {
        TAG_TABLE
            .binary_search_by(|(candidate, _)| (*candidate).cmp(name))
            .map(|idx| TAG_TABLE[idx].1)
            .unwrap_or(TagKind::Other)
    }

    /// Elements whose content is kept out of the content digest.
    pub fn is_exclusion_region(self) -> bool {
        matches!(self, TagKind::Script | TagKind::Style)
    }
}
