//! Streaming segment scanner: decodes a byte stream incrementally and splits it into
//! tags, text runs and character references, each tagged with its end offset.
//!
//! Known limitations (intentional):
//! - Not an HTML5 tokenizer; there is no tree construction and no parse-error recovery
//!   beyond treating unterminated markup as text.
//! - Only `script` and `style` switch to raw-text scanning.
//! - Unknown named character references stay literal text.
//!
//! Offsets count bytes of the decoded UTF-8 text from the start of the document.
use std::borrow::Cow;
use std::io::{self, Read};

use encoding_rs::{CoderResult, Decoder, Encoding};
use markup5ever::data::NAMED_ENTITIES;

const READ_CHUNK: usize = 8 * 1024;
/// Longest tag or declaration kept pending before its `<` is treated as text.
const MAX_MARKUP_LEN: usize = 64 * 1024;
const MAX_REFERENCE_NAME: usize = 32;
const MAX_REFERENCE_DIGITS: usize = 8;

/// Syntactic form of a tag-like segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagForm {
    Normal,
    Comment,
    Declaration,
    ProcessingInstruction,
    /// `</` not followed by a letter, e.g. `</ >` or `</3>`.
    Bogus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// ASCII-lowercased element name.
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub self_closing: bool,
    pub form: TagForm,
}

impl StartTag {
    /// Normal start tag with the given attributes.
    pub fn new(name: &str, attributes: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(name, value)| Attribute {
                    name: name.to_ascii_lowercase(),
                    value: (*value).to_string(),
                })
                .collect(),
            self_closing: false,
            form: TagForm::Normal,
        }
    }

    /// Value of the first attribute called `name`, compared case-insensitively.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
            .map(|attr| attr.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndTag {
    pub name: String,
    pub form: TagForm,
}

impl EndTag {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            form: TagForm::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    StartTag(StartTag),
    EndTag(EndTag),
    Text(String),
    CharacterReference(char),
}

/// A segment together with the offset just past its last byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scanned {
    pub end: usize,
    pub segment: Segment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Data,
    RawText(&'static str),
    Comment,
}

enum Lexed {
    Emit(Segment, usize),
    Skip(usize),
    NeedMore,
}

/// Lazily produces [`Scanned`] segments from a byte stream; read exactly once.
///
/// A read error is yielded once and ends the sequence.
pub struct SegmentReader<R> {
    input: R,
    decoder: Decoder,
    chunk: Vec<u8>,
    buf: String,
    pos: usize,
    base: usize,
    mode: Mode,
    eof: bool,
    failed: bool,
}

impl<R: Read> SegmentReader<R> {
    pub fn new(input: R, encoding: &'static Encoding) -> Self {
        Self {
            input,
            decoder: encoding.new_decoder(),
            chunk: vec![0; READ_CHUNK],
            buf: String::new(),
            pos: 0,
            base: 0,
            mode: Mode::Data,
            eof: false,
            failed: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.base += self.pos;
            self.pos = 0;
        }
        let read = loop {
            match self.input.read(&mut self.chunk) {
                Ok(read) => break read,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        };
        let last = read == 0;
        let mut consumed = 0;
        loop {
            let input = &self.chunk[consumed..read];
            let needed = self
                .decoder
                .max_utf8_buffer_length(input.len())
                .unwrap_or(input.len() * 3 + 16);
            self.buf.reserve(needed);
            let (result, used, _) = self.decoder.decode_to_string(input, &mut self.buf, last);
            consumed += used;
            if result == CoderResult::InputEmpty {
                break;
            }
        }
        self.eof = last;
        Ok(())
    }
}

impl<R: Read> Iterator for SegmentReader<R> {
    type Item = io::Result<Scanned>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if self.pos < self.buf.len() {
                match lex(&self.buf[self.pos..], self.eof, &mut self.mode) {
                    Lexed::Emit(segment, len) => {
                        self.pos += len;
                        return Some(Ok(Scanned {
                            end: self.base + self.pos,
                            segment,
                        }));
                    }
                    Lexed::Skip(len) => {
                        self.pos += len;
                        continue;
                    }
                    Lexed::NeedMore => {}
                }
            }
            // At end of input the lexer always makes progress, so nothing is left here.
            if self.eof {
                return None;
            }
            if let Err(err) = self.fill() {
                self.failed = true;
                return Some(Err(err));
            }
        }
    }
}

fn lex(rest: &str, eof: bool, mode: &mut Mode) -> Lexed {
    match *mode {
        Mode::Data => lex_data(rest, eof, mode),
        Mode::RawText(name) => lex_raw_text(rest, eof, name, mode),
        Mode::Comment => lex_comment_body(rest, eof, mode),
    }
}

fn lex_data(rest: &str, eof: bool, mode: &mut Mode) -> Lexed {
    let bytes = rest.as_bytes();
    match bytes[0] {
        b'<' => lex_markup(rest, eof, mode),
        b'&' => match parse_reference(rest, eof, false) {
            Reference::Char(ch, len) => Lexed::Emit(Segment::CharacterReference(ch), len),
            Reference::Pair(first, second, len) => {
                Lexed::Emit(Segment::Text([first, second].iter().collect()), len)
            }
            Reference::Incomplete => Lexed::NeedMore,
            Reference::Invalid => literal(rest, 1),
        },
        _ => {
            let end = bytes
                .iter()
                .position(|&b| b == b'<' || b == b'&')
                .unwrap_or(bytes.len());
            literal(rest, end)
        }
    }
}

fn literal(rest: &str, len: usize) -> Lexed {
    Lexed::Emit(Segment::Text(rest[..len].to_string()), len)
}

fn lex_markup(rest: &str, eof: bool, mode: &mut Mode) -> Lexed {
    let bytes = rest.as_bytes();
    if bytes.len() < 2 {
        return if eof { literal(rest, 1) } else { Lexed::NeedMore };
    }
    match bytes[1] {
        b'!' => {
            if rest.starts_with("<!--") {
                *mode = Mode::Comment;
                return Lexed::Skip(4);
            }
            if !eof && rest.len() < 4 && "<!--".starts_with(rest) {
                return Lexed::NeedMore;
            }
            lex_bracketed(rest, eof, TagForm::Declaration)
        }
        b'?' => lex_bracketed(rest, eof, TagForm::ProcessingInstruction),
        b'/' => lex_end_tag(rest, eof, mode),
        b if b.is_ascii_alphabetic() => lex_start_tag(rest, eof, mode),
        _ => literal(rest, 1),
    }
}

/// `<!…>` and `<?…>`: everything up to the first `>`.
fn lex_bracketed(rest: &str, eof: bool, form: TagForm) -> Lexed {
    let close = match rest.find('>') {
        Some(close) => close + 1,
        None if eof => rest.len(),
        None if rest.len() > MAX_MARKUP_LEN => return literal(rest, 1),
        None => return Lexed::NeedMore,
    };
    let body = rest[2..close].trim_start();
    let name_end = body
        .find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '[')
        .unwrap_or(body.len());
    let tag = StartTag {
        name: body[..name_end].to_ascii_lowercase(),
        attributes: Vec::new(),
        self_closing: false,
        form,
    };
    Lexed::Emit(Segment::StartTag(tag), close)
}

fn lex_end_tag(rest: &str, eof: bool, mode: &mut Mode) -> Lexed {
    if rest.len() < 3 {
        return if eof { literal(rest, 1) } else { Lexed::NeedMore };
    }
    let Some(close) = rest.find('>') else {
        if eof || rest.len() > MAX_MARKUP_LEN {
            return literal(rest, 1);
        }
        return Lexed::NeedMore;
    };
    let inner = &rest[2..close];
    let name_end = inner
        .find(|c: char| c.is_ascii_whitespace() || c == '/')
        .unwrap_or(inner.len());
    let form = if rest.as_bytes()[2].is_ascii_alphabetic() {
        TagForm::Normal
    } else {
        TagForm::Bogus
    };
    let name = inner[..name_end].to_ascii_lowercase();
    if let Mode::RawText(raw) = *mode {
        if raw == name {
            *mode = Mode::Data;
        }
    }
    Lexed::Emit(Segment::EndTag(EndTag { name, form }), close + 1)
}

fn lex_start_tag(rest: &str, eof: bool, mode: &mut Mode) -> Lexed {
    match parse_start_tag(rest) {
        Some((tag, len)) => {
            if !tag.self_closing {
                if let Some(raw) = raw_text_element(&tag.name) {
                    *mode = Mode::RawText(raw);
                }
            }
            Lexed::Emit(Segment::StartTag(tag), len)
        }
        None if eof || rest.len() > MAX_MARKUP_LEN => literal(rest, 1),
        None => Lexed::NeedMore,
    }
}

fn raw_text_element(name: &str) -> Option<&'static str> {
    match name {
        "script" => Some("script"),
        "style" => Some("style"),
        _ => None,
    }
}

fn is_tag_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'/' || b == b'>'
}

/// Parses a complete start tag at the beginning of `rest`; `None` when it is not terminated yet.
fn parse_start_tag(rest: &str) -> Option<(StartTag, usize)> {
    let bytes = rest.as_bytes();
    let len = bytes.len();
    let mut i = 1;
    while i < len && !is_tag_delimiter(bytes[i]) {
        i += 1;
    }
    let name = rest[1..i].to_ascii_lowercase();
    let mut attributes: Vec<Attribute> = Vec::new();

    let finish = |name: String, attributes: Vec<Attribute>, self_closing: bool, len: usize| {
        let tag = StartTag {
            name,
            attributes,
            self_closing,
            form: TagForm::Normal,
        };
        Some((tag, len))
    };

    loop {
        while i < len && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len {
            return None;
        }
        match bytes[i] {
            b'>' => return finish(name, attributes, false, i + 1),
            b'/' => {
                if i + 1 >= len {
                    return None;
                }
                if bytes[i + 1] == b'>' {
                    return finish(name, attributes, true, i + 2);
                }
                i += 1;
                continue;
            }
            _ => {}
        }

        let name_start = i;
        while i < len && !is_tag_delimiter(bytes[i]) && bytes[i] != b'=' {
            i += 1;
        }
        if i == name_start {
            // A leading `=` belongs to the attribute name.
            i += 1;
        }
        let attr_name = rest[name_start..i].to_ascii_lowercase();

        let mut j = i;
        while j < len && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= len {
            return None;
        }
        let mut value = String::new();
        if bytes[j] == b'=' {
            j += 1;
            while j < len && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j >= len {
                return None;
            }
            match bytes[j] {
                quote @ (b'"' | b'\'') => {
                    let close = bytes[j + 1..].iter().position(|&b| b == quote)?;
                    value = decode_references(&rest[j + 1..j + 1 + close]).into_owned();
                    j += close + 2;
                }
                b'>' => {}
                _ => {
                    let start = j;
                    while j < len && !bytes[j].is_ascii_whitespace() && bytes[j] != b'>' {
                        j += 1;
                    }
                    if j >= len {
                        return None;
                    }
                    value = decode_references(&rest[start..j]).into_owned();
                }
            }
            i = j;
        }

        if !attributes.iter().any(|attr| attr.name == attr_name) {
            attributes.push(Attribute {
                name: attr_name,
                value,
            });
        }
    }
}

enum RawClose {
    Found(usize),
    /// A possible close tag is cut off by the end of the buffer.
    Pending(usize),
    NotFound,
}

fn lex_raw_text(rest: &str, eof: bool, name: &'static str, mode: &mut Mode) -> Lexed {
    match find_raw_close(rest, name) {
        RawClose::Found(0) => lex_end_tag(rest, eof, mode),
        RawClose::Found(at) | RawClose::Pending(at) if at > 0 => literal(rest, at),
        RawClose::Pending(_) if eof => literal(rest, rest.len()),
        RawClose::Pending(_) => Lexed::NeedMore,
        RawClose::NotFound | RawClose::Found(_) => literal(rest, rest.len()),
    }
}

fn find_raw_close(rest: &str, name: &str) -> RawClose {
    let bytes = rest.as_bytes();
    let name = name.as_bytes();
    let needle_len = 2 + name.len();
    let matches_at = |k: usize, b: u8| match k {
        0 => b == b'<',
        1 => b == b'/',
        _ => b.eq_ignore_ascii_case(&name[k - 2]),
    };

    let mut i = 0;
    while let Some(rel) = bytes[i..].iter().position(|&b| b == b'<') {
        let at = i + rel;
        let tail = &bytes[at..];
        if tail.len() < needle_len {
            if tail.iter().enumerate().all(|(k, &b)| matches_at(k, b)) {
                return RawClose::Pending(at);
            }
        } else if tail[..needle_len]
            .iter()
            .enumerate()
            .all(|(k, &b)| matches_at(k, b))
        {
            match tail.get(needle_len) {
                None => return RawClose::Pending(at),
                Some(&b) if b.is_ascii_whitespace() || b == b'>' || b == b'/' => {
                    return RawClose::Found(at)
                }
                Some(_) => {}
            }
        }
        i = at + 1;
    }
    RawClose::NotFound
}

fn comment_segment() -> Segment {
    Segment::StartTag(StartTag {
        name: "!--".to_string(),
        attributes: Vec::new(),
        self_closing: false,
        form: TagForm::Comment,
    })
}

fn lex_comment_body(rest: &str, eof: bool, mode: &mut Mode) -> Lexed {
    if let Some(at) = rest.find("-->") {
        *mode = Mode::Data;
        return Lexed::Emit(comment_segment(), at + 3);
    }
    if eof {
        *mode = Mode::Data;
        return Lexed::Emit(comment_segment(), rest.len());
    }
    // Hold back a possible `--` so the terminator can straddle reads.
    let mut keep = rest.len().saturating_sub(2);
    while keep > 0 && !rest.is_char_boundary(keep) {
        keep -= 1;
    }
    if keep == 0 {
        Lexed::NeedMore
    } else {
        Lexed::Emit(comment_segment(), keep)
    }
}

enum Reference {
    Char(char, usize),
    /// Named references that expand to two code points.
    Pair(char, char, usize),
    Incomplete,
    Invalid,
}

/// Parses a character reference at the start of `rest`.
///
/// Numeric references need their `;`. Named references follow the HTML entity table:
/// the longest known name wins, and the legacy names without `;` (`&eacute`, `&amp`)
/// are accepted except inside attribute values when followed by `=` or an alphanumeric.
fn parse_reference(rest: &str, eof: bool, in_attribute: bool) -> Reference {
    let bytes = rest.as_bytes();
    let incomplete = if eof {
        Reference::Invalid
    } else {
        Reference::Incomplete
    };
    if bytes.len() < 2 {
        return incomplete;
    }

    if bytes[1] == b'#' {
        let (radix, start) = match bytes.get(2) {
            Some(b'x' | b'X') => (16, 3),
            Some(_) => (10, 2),
            None => return incomplete,
        };
        let mut j = start;
        while j < bytes.len()
            && j - start < MAX_REFERENCE_DIGITS
            && (bytes[j] as char).is_digit(radix)
        {
            j += 1;
        }
        if j == bytes.len() {
            return incomplete;
        }
        if j == start || bytes[j] != b';' {
            return Reference::Invalid;
        }
        let ch = u32::from_str_radix(&rest[start..j], radix)
            .ok()
            .and_then(char::from_u32)
            .filter(|&ch| ch != '\0')
            .unwrap_or('\u{FFFD}');
        return Reference::Char(ch, j + 1);
    }

    let mut j = 1;
    while j < bytes.len() && j <= MAX_REFERENCE_NAME && bytes[j].is_ascii_alphanumeric() {
        j += 1;
    }
    if j == bytes.len() && !eof {
        return Reference::Incomplete;
    }
    if j == 1 {
        return Reference::Invalid;
    }

    if bytes.get(j) == Some(&b';') {
        if let Some(expanded) = named_reference(&rest[1..=j]) {
            return expanded.into_reference(j + 1);
        }
    }
    // Legacy names are only ever keyed without the semicolon.
    for end in (2..=j).rev() {
        let Some(expanded) = named_reference(&rest[1..end]) else {
            continue;
        };
        let next = bytes.get(end).copied().unwrap_or(b' ');
        if in_attribute && (next == b'=' || next.is_ascii_alphanumeric()) {
            return Reference::Invalid;
        }
        return expanded.into_reference(end);
    }
    Reference::Invalid
}

struct Expansion(char, Option<char>);

impl Expansion {
    fn into_reference(self, len: usize) -> Reference {
        match self {
            Expansion(first, None) => Reference::Char(first, len),
            Expansion(first, Some(second)) => Reference::Pair(first, second, len),
        }
    }
}

/// Looks `key` (the name without `&`, with its `;` when present) up in the HTML entity table.
fn named_reference(key: &str) -> Option<Expansion> {
    // The table also holds every name prefix mapped to (0, 0).
    let &(first, second) = NAMED_ENTITIES.get(key)?;
    let first = char::from_u32(first).filter(|&ch| ch != '\0')?;
    let second = match second {
        0 => None,
        code => Some(char::from_u32(code)?),
    };
    Some(Expansion(first, second))
}

/// Expands character references inside an attribute value.
pub(crate) fn decode_references(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        rest = &rest[at..];
        match parse_reference(rest, true, true) {
            Reference::Char(ch, len) => {
                out.push(ch);
                rest = &rest[len..];
            }
            Reference::Pair(first, second, len) => {
                out.push(first);
                out.push(second);
                rest = &rest[len..];
            }
            Reference::Incomplete | Reference::Invalid => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};
    use pretty_assertions::assert_eq;

    fn scan(html: &str) -> Vec<Segment> {
        SegmentReader::new(html.as_bytes(), UTF_8)
            .map(|item| item.unwrap().segment)
            .collect()
    }

    /// Delivers its bytes a few at a time to exercise boundary handling.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(self.data.len()).min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn text_of(segments: &[Segment]) -> String {
        segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Text(text) => Some(text.clone()),
                Segment::CharacterReference(ch) => Some(ch.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn tags_text_and_references_are_segmented() {
        let segments = scan(r#"<p class="x">a &amp; b</p>"#);
        assert_eq!(
            segments,
            vec![
                Segment::StartTag(StartTag::new("p", &[("class", "x")])),
                Segment::Text("a ".into()),
                Segment::CharacterReference('&'),
                Segment::Text(" b".into()),
                Segment::EndTag(EndTag::new("p")),
            ]
        );
    }

    #[test]
    fn attributes_handle_quotes_case_and_self_closing() {
        let segments = scan(r#"<IMG SRC='a b.png' alt=Hi data-x="1&lt;2"/>"#);
        let Segment::StartTag(tag) = &segments[0] else {
            panic!("expected start tag, got {segments:?}");
        };
        assert_eq!(tag.name, "img");
        assert!(tag.self_closing);
        assert_eq!(tag.attr("src"), Some("a b.png"));
        assert_eq!(tag.attr("ALT"), Some("Hi"));
        assert_eq!(tag.attr("data-x"), Some("1<2"));
    }

    #[test]
    fn script_body_is_raw_text() {
        let segments = scan("<script>if (a < b && c) { x = '</p>'; }</script>after");
        assert_eq!(
            segments,
            vec![
                Segment::StartTag(StartTag::new("script", &[])),
                Segment::Text("if (a < b && c) { x = '</p>'; }".into()),
                Segment::EndTag(EndTag::new("script")),
                Segment::Text("after".into()),
            ]
        );
    }

    #[test]
    fn comments_declarations_and_bogus_end_tags_have_their_form() {
        let segments = scan("<!DOCTYPE html><!-- <a href=x> --><?xml v?></ >");
        let forms: Vec<TagForm> = segments
            .iter()
            .map(|segment| match segment {
                Segment::StartTag(tag) => tag.form,
                Segment::EndTag(tag) => tag.form,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            forms,
            vec![
                TagForm::Declaration,
                TagForm::Comment,
                TagForm::ProcessingInstruction,
                TagForm::Bogus,
            ]
        );
    }

    #[test]
    fn unterminated_markup_at_end_becomes_text() {
        let segments = scan("a <b c=\"d");
        assert_eq!(text_of(&segments), "a <b c=\"d");
    }

    #[test]
    fn numeric_references_decode() {
        assert_eq!(text_of(&scan("&#65;&#x42;&#0;&bogus;")), "AB\u{FFFD}&bogus;");
    }

    #[test]
    fn named_references_use_the_full_entity_table() {
        assert_eq!(
            scan("caf&eacute; na&iuml;ve"),
            vec![
                Segment::Text("caf".into()),
                Segment::CharacterReference('\u{e9}'),
                Segment::Text(" na".into()),
                Segment::CharacterReference('\u{ef}'),
                Segment::Text("ve".into()),
            ]
        );
        assert_eq!(text_of(&scan("&Omega;&rarr;&NotEqualTilde;")), "\u{3a9}\u{2192}\u{2242}\u{338}");
    }

    #[test]
    fn legacy_references_without_semicolon() {
        assert_eq!(text_of(&scan("caf&eacute au lait &notin &amp")), "caf\u{e9} au lait \u{ac}in &");
        assert_eq!(
            decode_references("/r&eacute;sum&eacute;.html?a=1&copy=2&amp=x&eacute"),
            "/r\u{e9}sum\u{e9}.html?a=1&copy=2&amp=x\u{e9}"
        );
    }

    #[test]
    fn trickled_input_matches_whole_input() {
        let html = "<html><head><script>var s = '<b>';</script><!-- note --></head>\
                    <body><a href=\"/x?a=1&amp;b=2\">link &copy; text</a></body></html>";
        let whole = scan(html);
        let trickled: Vec<Segment> = SegmentReader::new(
            Trickle {
                data: html.as_bytes(),
                step: 3,
            },
            UTF_8,
        )
        .map(|item| item.unwrap().segment)
        .collect();

        let tags = |segments: &[Segment]| -> Vec<Segment> {
            segments
                .iter()
                .filter(|segment| !matches!(segment, Segment::Text(_)))
                .filter(|segment| {
                    !matches!(segment, Segment::StartTag(tag) if tag.form == TagForm::Comment)
                })
                .cloned()
                .collect()
        };
        assert_eq!(tags(&trickled), tags(&whole));
        assert_eq!(text_of(&trickled), text_of(&whole));
    }

    #[test]
    fn offsets_strictly_increase() {
        let ends: Vec<usize> = SegmentReader::new("<a>b&amp;<!--c--></a>".as_bytes(), UTF_8)
            .map(|item| item.unwrap().end)
            .collect();
        assert!(ends.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(ends.last(), Some(&"<a>b&amp;<!--c--></a>".len()));
    }

    #[test]
    fn single_byte_encodings_decode_text() {
        let segments: Vec<Segment> = SegmentReader::new(&b"<p>caf\xe9</p>"[..], WINDOWS_1252)
            .map(|item| item.unwrap().segment)
            .collect();
        assert_eq!(text_of(&segments), "caf\u{e9}");
    }

    #[test]
    fn read_errors_are_yielded_once() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            }
        }
        let mut reader = SegmentReader::new(Broken, UTF_8);
        assert!(matches!(reader.next(), Some(Err(_))));
        assert!(reader.next().is_none());
    }
}
