//! HTML parser – converts HTML text into a simple DOM tree.
//!
//! The converter only understands a small, fixed tag vocabulary, so a
//! hand-written tolerant parser is enough:
//! - elements with attributes (quoted or bare values), void elements
//! - text with named and numeric character references
//! - comments, doctype and processing instructions (skipped)
//! - `script` / `style` raw text
//! - stray closing tags are ignored, and a `<p>` is closed implicitly by the
//!   next block-level start tag
//!
//! Input that ends inside a tag, quoted attribute or comment is rejected with
//! a [`ParseError`].

use std::collections::HashMap;

use crate::error::ParseError;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of an element, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Br,
    P,
    /// `h1`..`h6`, carrying the heading level.
    Heading(u8),
    Span,
    I,
    Em,
    B,
    Strong,
    U,
    S,
    Strike,
    Sub,
    Sup,
    Q,
    Blockquote,
    A,
    Body,
    Html,
    Head,
    /// Any other element; its text content passes through.
    Other(String),
}

impl Tag {
    pub fn from_name(s: &str) -> Self {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "br" => Tag::Br,
            "p" => Tag::P,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "span" => Tag::Span,
            "i" => Tag::I,
            "em" => Tag::Em,
            "b" => Tag::B,
            "strong" => Tag::Strong,
            "u" => Tag::U,
            "s" => Tag::S,
            "strike" => Tag::Strike,
            "sub" => Tag::Sub,
            "sup" => Tag::Sup,
            "q" => Tag::Q,
            "blockquote" => Tag::Blockquote,
            "a" => Tag::A,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            _ => Tag::Other(lower),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tag::Br => "br",
            Tag::P => "p",
            Tag::Heading(1) => "h1",
            Tag::Heading(2) => "h2",
            Tag::Heading(3) => "h3",
            Tag::Heading(4) => "h4",
            Tag::Heading(5) => "h5",
            Tag::Heading(_) => "h6",
            Tag::Span => "span",
            Tag::I => "i",
            Tag::Em => "em",
            Tag::B => "b",
            Tag::Strong => "strong",
            Tag::U => "u",
            Tag::S => "s",
            Tag::Strike => "strike",
            Tag::Sub => "sub",
            Tag::Sup => "sup",
            Tag::Q => "q",
            Tag::Blockquote => "blockquote",
            Tag::A => "a",
            Tag::Body => "body",
            Tag::Html => "html",
            Tag::Head => "head",
            Tag::Other(name) => name,
        }
    }

    /// Elements that never have children or a closing tag.
    pub fn is_void(&self) -> bool {
        match self {
            Tag::Br => true,
            Tag::Other(name) => matches!(
                name.as_str(),
                "img" | "hr" | "meta" | "link" | "input" | "col" | "wbr" | "source"
            ),
            _ => false,
        }
    }

    /// Elements whose content is raw text rather than markup.
    fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Other(name) if name == "script" || name == "style")
    }

    /// Start tags that implicitly close an open `<p>`.
    fn closes_paragraph(&self) -> bool {
        match self {
            Tag::P | Tag::Heading(_) | Tag::Blockquote => true,
            Tag::Other(name) => matches!(
                name.as_str(),
                "div" | "ul" | "ol" | "table" | "pre" | "hr" | "section" | "article"
            ),
            _ => false,
        }
    }
}

/// A node in our DOM tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// Attribute lookup; attribute names are stored lower-cased.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|s| s.as_str())
    }
}

impl DomNode {
    /// All descendant text, concatenated in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        match self {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => e.children.iter().for_each(|c| c.push_text(out)),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser – recursive descent over HTML
// ---------------------------------------------------------------------------

/// Parse raw bytes as UTF-8 HTML.
pub fn parse_html_bytes(bytes: &[u8]) -> Result<Vec<DomNode>, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    parse_html(text.strip_prefix('\u{feff}').unwrap_or(text))
}

/// Parse an HTML string into a list of DOM nodes.
pub fn parse_html(html: &str) -> Result<Vec<DomNode>, ParseError> {
    let mut parser = Parser::new(html);
    let mut open = Vec::new();
    parser.parse_nodes(&mut open)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

/// What ended a child list.
enum Stop {
    Eof,
    /// A closing tag for this element or one of its ancestors (not consumed).
    Close,
    /// A start tag that implicitly closes the open paragraph (not consumed).
    Implicit,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_nodes(&mut self, open: &mut Vec<Tag>) -> Result<Vec<DomNode>, ParseError> {
        let (nodes, _) = self.parse_children(open)?;
        Ok(nodes)
    }

    fn parse_children(&mut self, open: &mut Vec<Tag>) -> Result<(Vec<DomNode>, Stop), ParseError> {
        let mut nodes = Vec::new();
        loop {
            if self.at_end() {
                return Ok((nodes, Stop::Eof));
            }
            if self.at("</") {
                let saved = self.pos;
                let name = self.peek_closing_name();
                let tag = Tag::from_name(&name);
                if !name.is_empty() && open.contains(&tag) {
                    self.pos = saved;
                    return Ok((nodes, Stop::Close));
                }
                // Stray closing tag: consume and ignore.
                self.skip_closing_tag()?;
                continue;
            }
            if open.last() == Some(&Tag::P) && self.at("<") {
                let saved = self.pos;
                self.skip(1);
                let name = self.parse_tag_name();
                self.pos = saved;
                if !name.is_empty() && Tag::from_name(&name).closes_paragraph() {
                    return Ok((nodes, Stop::Implicit));
                }
            }
            if let Some(node) = self.parse_node(open)? {
                nodes.push(node);
            }
        }
    }

    fn parse_node(&mut self, open: &mut Vec<Tag>) -> Result<Option<DomNode>, ParseError> {
        if self.at("<!--") {
            self.skip_until("-->", "unterminated comment")?;
            return Ok(None);
        }
        if self.at("<!") || self.at("<?") {
            // Skip doctype / processing instructions
            self.skip_until(">", "unterminated declaration")?;
            return Ok(None);
        }
        if self.at("<") && self.next_is_tag_start() {
            return self.parse_element(open).map(Some);
        }
        Ok(Some(self.parse_text()))
    }

    fn next_is_tag_start(&self) -> bool {
        self.rest()[1..].starts_with(|c: char| c.is_ascii_alphabetic())
    }

    fn parse_text(&mut self) -> DomNode {
        let rest = self.rest();
        // The first character is text even when it is a '<' that starts no markup.
        let first = rest.chars().next().map_or(0, char::len_utf8);
        let len = rest[first..].find('<').map_or(rest.len(), |i| first + i);
        self.skip(len);
        DomNode::Text(decode_entities(&rest[..len]))
    }

    fn parse_element(&mut self, open: &mut Vec<Tag>) -> Result<DomNode, ParseError> {
        let tag_start = self.pos;
        // Consume '<'
        self.skip(1);
        let tag_name = self.parse_tag_name();
        let tag = Tag::from_name(&tag_name);
        let mut elem = ElementNode::new(tag.clone());

        // Parse attributes
        loop {
            self.skip_whitespace();
            if self.at_end() {
                return Err(self.error_at(tag_start, "unterminated start tag"));
            }
            if self.at(">") || self.at("/>") {
                break;
            }
            if self.at("/") {
                self.skip(1);
                continue;
            }
            let (key, value) = self.parse_attribute()?;
            if !key.is_empty() {
                elem.attributes.entry(key).or_insert(value);
            } else {
                // Garbage inside the tag: skip one character.
                self.skip_char();
            }
        }

        if self.at("/>") {
            self.skip(2);
            return Ok(DomNode::Element(elem));
        }
        self.skip(1); // skip '>'
        if tag.is_void() {
            return Ok(DomNode::Element(elem));
        }

        if tag.is_raw_text() {
            let close = format!("</{}", tag.name());
            let start = self.pos;
            let rest = &self.input[self.pos..];
            let end = rest
                .to_ascii_lowercase()
                .find(&close)
                .map(|i| start + i)
                .unwrap_or(self.input.len());
            elem.children.push(DomNode::Text(self.input[start..end].to_string()));
            self.pos = end;
            if !self.at_end() {
                self.skip_closing_tag()?;
            }
            return Ok(DomNode::Element(elem));
        }

        // Parse children
        open.push(tag.clone());
        let (children, stop) = self.parse_children(open)?;
        open.pop();
        elem.children = children;

        // Consume our own closing tag; leave an ancestor's for the caller.
        if let Stop::Close = stop {
            let saved = self.pos;
            if Tag::from_name(&self.peek_closing_name()) == tag {
                self.skip_closing_tag()?;
            } else {
                self.pos = saved;
            }
        }

        Ok(DomNode::Element(elem))
    }

    /// Name of the closing tag at the cursor; the cursor is left after the name.
    fn peek_closing_name(&mut self) -> String {
        self.skip(2);
        self.parse_tag_name()
    }

    fn skip_closing_tag(&mut self) -> Result<(), ParseError> {
        self.skip_until(">", "unterminated end tag")
    }

    fn parse_tag_name(&mut self) -> String {
        self.take_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':'))
            .to_string()
    }

    fn parse_attribute(&mut self) -> Result<(String, String), ParseError> {
        let key = self.parse_tag_name().to_ascii_lowercase();
        self.skip_whitespace();
        if !self.at("=") {
            return Ok((key, String::new()));
        }
        self.skip(1);
        self.skip_whitespace();
        let value = self.parse_attr_value()?;
        Ok((key, value))
    }

    fn parse_attr_value(&mut self) -> Result<String, ParseError> {
        let quote = self.rest().chars().next().filter(|&c| c == '"' || c == '\'');
        let Some(quote) = quote else {
            return Ok(decode_entities(self.take_while(|c| !c.is_whitespace() && c != '>')));
        };
        let open_at = self.pos;
        self.skip(1);
        let Some(len) = self.rest().find(quote) else {
            return Err(self.error_at(open_at, "unterminated attribute value"));
        };
        let value = decode_entities(&self.rest()[..len]);
        self.skip(len + 1);
        Ok(value)
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn skip_until(&mut self, terminator: &str, message: &str) -> Result<(), ParseError> {
        match self.rest().find(terminator) {
            Some(i) => {
                self.skip(i + terminator.len());
                Ok(())
            }
            None => Err(self.error_at(self.pos, message)),
        }
    }

    fn error_at(&self, position: usize, message: &str) -> ParseError {
        ParseError::Html {
            position,
            message: message.to_string(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Move the cursor `bytes` forward; callers only skip whole characters.
    fn skip(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.input.len());
    }

    fn skip_char(&mut self) {
        self.skip(self.rest().chars().next().map_or(0, char::len_utf8));
    }

    fn take_while(&mut self, mut keep: impl FnMut(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !keep(c)).unwrap_or(rest.len());
        self.skip(len);
        &rest[..len]
    }
}

/// Decode the character references the report templates use in practice.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest[1..].find(';').filter(|&end| end <= 10).and_then(|end| {
            let name = &rest[1..1 + end];
            decode_reference(name).map(|c| (c, end + 2))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(|c| c == 'x' || c == 'X') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "euro" => '\u{20AC}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "hellip" => '\u{2026}',
        "laquo" => '\u{00AB}',
        "raquo" => '\u{00BB}',
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Convenience helpers
// ---------------------------------------------------------------------------

/// Find the `<body>` element and return its children, or return all nodes
/// (minus any `<head>`) if no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            // Recurse into <html>
            if e.tag == Tag::Html {
                return body_children(&e.children);
            }
        }
    }
    nodes
        .iter()
        .filter(|n| !matches!(n, DomNode::Element(e) if e.tag == Tag::Head))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            other => panic!("Expected element, got {:?}", other),
        }
    }

    #[test]
    fn parse_nested_spans() {
        let nodes = parse_html(r#"<p>Hello <span class="x">world</span>!</p>"#).unwrap();
        assert_eq!(nodes.len(), 1);
        let p = element(&nodes[0]);
        assert_eq!(p.tag, Tag::P);
        assert_eq!(p.children.len(), 3); // "Hello ", <span>, "!"
    }

    #[test]
    fn whitespace_between_inline_elements_is_kept() {
        let nodes = parse_html("<b>a</b> <i>b</i>").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1], DomNode::Text(" ".to_string()));
    }

    #[test]
    fn void_and_self_closing_elements() {
        let nodes = parse_html("a<br>b<br/>c").unwrap();
        assert_eq!(nodes.len(), 5);
        assert_eq!(element(&nodes[1]).tag, Tag::Br);
        assert_eq!(element(&nodes[3]).tag, Tag::Br);
    }

    #[test]
    fn tag_names_are_case_insensitive() {
        let nodes = parse_html("<STRONG>x</Strong>").unwrap();
        assert_eq!(element(&nodes[0]).tag, Tag::Strong);
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn paragraph_closed_by_next_block() {
        let nodes = parse_html("<p>one<p>two").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].text_content(), "two");
    }

    #[test]
    fn stray_closing_tag_is_ignored() {
        let nodes = parse_html("<p>a</span>b</p>").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text_content(), "ab");
    }

    #[test]
    fn unclosed_element_ends_at_parent() {
        let nodes = parse_html("<p><b>bold</p>after").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text_content(), "bold");
    }

    #[test]
    fn entities_are_decoded() {
        let nodes = parse_html(r#"<a href="?a=1&amp;b=2">&lt;x&gt; &#65;&#x42; &bogus;</a>"#).unwrap();
        let a = element(&nodes[0]);
        assert_eq!(a.attribute("href"), Some("?a=1&b=2"));
        assert_eq!(nodes[0].text_content(), "<x> AB &bogus;");
    }

    #[test]
    fn comments_and_doctype_are_skipped() {
        let nodes = parse_html("<!DOCTYPE html><!-- c --><p>x</p>").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let err = parse_html("<p>x</p><!-- never closed").unwrap_err();
        assert!(matches!(err, ParseError::Html { .. }));
    }

    #[test]
    fn unterminated_tag_is_an_error() {
        assert!(parse_html("<p class=\"a").is_err());
        assert!(parse_html("text <span").is_err());
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let err = parse_html_bytes(&[b'<', b'p', b'>', 0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, ParseError::Encoding(_)));
    }

    #[test]
    fn literal_less_than_is_text() {
        let nodes = parse_html("1 < 2").unwrap();
        assert_eq!(nodes.len(), 2);
        let text: String = nodes.iter().map(|n| n.text_content()).collect();
        assert_eq!(text, "1 < 2");
    }

    #[test]
    fn body_children_skips_head() {
        let nodes =
            parse_html("<html><head><title>t</title></head><body><p>x</p></body></html>").unwrap();
        let body = body_children(&nodes);
        assert_eq!(body.len(), 1);
        assert_eq!(element(&body[0]).tag, Tag::P);
    }

    #[test]
    fn script_content_is_raw() {
        let nodes = parse_html("<script>if (a < b) {}</script><p>x</p>").unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text_content(), "if (a < b) {}");
    }
}
