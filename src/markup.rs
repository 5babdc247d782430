//! Component markup parser.
//!
//! Produces a small tree of elements, attributes and `{...}` expression tags.
//! Every node keeps `[start, end)` byte offsets into the original document so
//! the rewrite pass can splice around them without re-reading the text.

use std::fmt;

const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub nodes: Vec<Node>,
    pub style: Option<StyleBlock>,
}

/// The first top-level `<style>` element of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleBlock {
    pub start: usize,
    pub end: usize,
    pub content: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Span),
    Expression(ExpressionTag),
    Comment(Span),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    /// Raw content of `<script>` / `<style>` elements.
    pub raw_content: Option<Span>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribute {
    Value(ValueAttribute),
    ClassDirective(ClassDirective),
    /// Spreads, shorthands and non-class directives.
    Other(Span),
}

impl Attribute {
    pub fn span(&self) -> Span {
        match self {
            Attribute::Value(attr) => Span::new(attr.start, attr.end),
            Attribute::ClassDirective(directive) => Span::new(directive.start, directive.end),
            Attribute::Other(span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueAttribute {
    pub name: String,
    pub start: usize,
    pub end: usize,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Boolean,
    Parts(Vec<ValuePart>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValuePart {
    Text(Span),
    Expression(ExpressionTag),
}

/// `class:name={expression}` or the bare `class:name` shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDirective {
    pub name: String,
    pub name_span: Span,
    pub start: usize,
    pub end: usize,
    pub expression: Option<Span>,
}

/// A `{...}` tag. `start`/`end` include the braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionTag {
    pub start: usize,
    pub end: usize,
    pub expression: Expression,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    TemplateLiteral(TemplateLiteral),
    Other(Span),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::TemplateLiteral(literal) => Span::new(literal.start, literal.end),
            Expression::Other(span) => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLiteral {
    pub start: usize,
    pub end: usize,
    pub parts: Vec<TemplatePart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplatePart {
    Quasi(Span),
    /// Span of the expression between `${` and `}`.
    Interpolation(Span),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub start: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at byte {})", self.message, self.start)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Continue,
    SkipChildren,
}

pub fn parse(source: &str) -> Result<Document, ParseError> {
    let mut parser = Parser { source, pos: 0 };
    let nodes = parser.parse_fragment(None)?;
    let style = nodes.iter().find_map(|node| match node {
        Node::Element(element) if element.name.eq_ignore_ascii_case("style") => {
            element.raw_content.map(|content| StyleBlock {
                start: element.start,
                end: element.end,
                content,
            })
        }
        _ => None,
    });
    Ok(Document { nodes, style })
}

/// Visits elements in document pre-order.
pub fn walk<F>(document: &Document, visit: &mut F)
where
    F: FnMut(&Element) -> Walk,
{
    walk_nodes(&document.nodes, visit);
}

fn walk_nodes<F>(nodes: &[Node], visit: &mut F)
where
    F: FnMut(&Element) -> Walk,
{
    for node in nodes {
        if let Node::Element(element) = node {
            if visit(element) == Walk::Continue {
                walk_nodes(&element.children, visit);
            }
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn bytes(&self) -> &'a [u8] {
        self.source.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn error(&self, message: impl Into<String>, start: usize) -> ParseError {
        ParseError {
            message: message.into(),
            start,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(byte) = self.peek() {
            if !byte.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn parse_fragment(&mut self, closing: Option<&str>) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            let Some(byte) = self.peek() else {
                if let Some(name) = closing {
                    return Err(self.error(format!("<{}> was left open", name), self.pos));
                }
                return Ok(nodes);
            };

            if self.rest().starts_with("<!--") {
                let start = self.pos;
                let Some(rel_end) = self.rest().find("-->") else {
                    return Err(self.error("comment was left open", start));
                };
                self.pos += rel_end + 3;
                nodes.push(Node::Comment(Span::new(start, self.pos)));
                continue;
            }

            if self.rest().starts_with("</") {
                let start = self.pos;
                self.pos += 2;
                let name = self.read_tag_name();
                self.skip_whitespace();
                if self.peek() != Some(b'>') {
                    return Err(self.error("closing tag was left open", start));
                }
                self.pos += 1;
                return match closing {
                    Some(expected) if expected == name => Ok(nodes),
                    Some(expected) => Err(self.error(
                        format!("</{}> attempted to close <{}>", name, expected),
                        start,
                    )),
                    None => Err(self.error(
                        format!("</{}> attempted to close an element that was not open", name),
                        start,
                    )),
                };
            }

            if byte == b'<'
                && self
                    .bytes()
                    .get(self.pos + 1)
                    .is_some_and(|next| next.is_ascii_alphabetic())
            {
                nodes.push(Node::Element(self.parse_element()?));
                continue;
            }

            if byte == b'{' {
                nodes.push(Node::Expression(self.parse_expression_tag()?));
                continue;
            }

            let start = self.pos;
            self.pos += 1;
            while let Some(byte) = self.peek() {
                if byte == b'<' || byte == b'{' {
                    break;
                }
                self.pos += 1;
            }
            nodes.push(Node::Text(Span::new(start, self.pos)));
        }
    }

    fn read_tag_name(&mut self) -> String {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_whitespace() || byte == b'/' || byte == b'>' {
                break;
            }
            self.pos += 1;
        }
        self.source[start..self.pos].to_string()
    }

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let name = self.read_tag_name();
        let mut attributes = Vec::new();
        let self_closing = loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                break true;
            }
            match self.peek() {
                None => return Err(self.error(format!("<{}> tag was left open", name), start)),
                Some(b'>') => {
                    self.pos += 1;
                    break false;
                }
                Some(_) => {
                    if let Some(attribute) = self.parse_attribute()? {
                        attributes.push(attribute);
                    }
                }
            }
        };

        let lower = name.to_ascii_lowercase();
        let mut children = Vec::new();
        let mut raw_content = None;
        if !self_closing && !VOID_ELEMENTS.contains(&lower.as_str()) {
            if lower == "script" || lower == "style" {
                let content_start = self.pos;
                let closing = format!("</{}", name);
                let Some(rel_end) = self.rest().find(&closing) else {
                    return Err(self.error(format!("<{}> was left open", name), start));
                };
                let content_end = content_start + rel_end;
                raw_content = Some(Span::new(content_start, content_end));
                self.pos = content_end + closing.len();
                let Some(rel_close) = self.rest().find('>') else {
                    return Err(self.error("closing tag was left open", content_end));
                };
                self.pos += rel_close + 1;
            } else {
                children = self.parse_fragment(Some(&name))?;
            }
        }

        Ok(Element {
            name,
            start,
            end: self.pos,
            attributes,
            children,
            raw_content,
        })
    }

    fn parse_attribute(&mut self) -> Result<Option<Attribute>, ParseError> {
        let start = self.pos;
        if self.peek() == Some(b'{') {
            let end = find_expression_end(self.source, start)
                .ok_or_else(|| self.error("expected '}'", start))?;
            self.pos = end;
            return Ok(Some(Attribute::Other(Span::new(start, end))));
        }

        while let Some(byte) = self.peek() {
            if byte.is_ascii_whitespace() || matches!(byte, b'=' | b'>' | b'"' | b'\'') {
                break;
            }
            if byte == b'/' && self.rest().starts_with("/>") {
                break;
            }
            self.pos += 1;
        }
        let name_end = self.pos;
        if name_end == start {
            // stray character inside a tag
            self.pos += 1;
            return Ok(None);
        }
        let name = self.source[start..name_end].to_string();

        let before_value = self.pos;
        self.skip_whitespace();
        let value = if self.peek() == Some(b'=') {
            self.pos += 1;
            self.skip_whitespace();
            AttributeValue::Parts(self.parse_attribute_value()?)
        } else {
            self.pos = before_value;
            AttributeValue::Boolean
        };
        let end = self.pos;

        if let Some(directive_name) = name.strip_prefix("class:") {
            let expression = match &value {
                AttributeValue::Boolean => None,
                AttributeValue::Parts(parts) => match parts.as_slice() {
                    [ValuePart::Expression(tag)] => Some(tag.expression.span()),
                    _ => {
                        return Err(self.error(
                            format!("{} directive value must be a single expression", name),
                            start,
                        ));
                    }
                },
            };
            let name_start = start + "class:".len();
            return Ok(Some(Attribute::ClassDirective(ClassDirective {
                name: directive_name.to_string(),
                name_span: Span::new(name_start, name_end),
                start,
                end,
                expression,
            })));
        }

        if name.contains(':') {
            return Ok(Some(Attribute::Other(Span::new(start, end))));
        }

        Ok(Some(Attribute::Value(ValueAttribute {
            name,
            start,
            end,
            value,
        })))
    }

    fn parse_attribute_value(&mut self) -> Result<Vec<ValuePart>, ParseError> {
        let quote = match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                Some(quote)
            }
            _ => None,
        };
        let value_start = self.pos;
        let mut parts = Vec::new();
        let mut text_start = self.pos;

        loop {
            let Some(byte) = self.peek() else {
                if quote.is_some() {
                    return Err(self.error("attribute value was left open", value_start));
                }
                break;
            };
            match quote {
                Some(quote) if byte == quote => {
                    push_text(&mut parts, text_start, self.pos);
                    self.pos += 1;
                    return Ok(parts);
                }
                None if byte.is_ascii_whitespace()
                    || byte == b'>'
                    || self.rest().starts_with("/>") =>
                {
                    break;
                }
                _ => {}
            }
            if byte == b'{' {
                push_text(&mut parts, text_start, self.pos);
                parts.push(ValuePart::Expression(self.parse_expression_tag()?));
                text_start = self.pos;
                continue;
            }
            self.pos += 1;
        }

        push_text(&mut parts, text_start, self.pos);
        Ok(parts)
    }

    fn parse_expression_tag(&mut self) -> Result<ExpressionTag, ParseError> {
        let start = self.pos;
        let end = find_expression_end(self.source, start)
            .ok_or_else(|| self.error("expected '}'", start))?;
        self.pos = end;
        let inner = trim_span(self.source, Span::new(start + 1, end - 1));
        let expression = parse_template_literal(self.source, inner)
            .map(Expression::TemplateLiteral)
            .unwrap_or(Expression::Other(inner));
        Ok(ExpressionTag {
            start,
            end,
            expression,
        })
    }
}

fn push_text(parts: &mut Vec<ValuePart>, start: usize, end: usize) {
    if end > start {
        parts.push(ValuePart::Text(Span::new(start, end)));
    }
}

fn trim_span(source: &str, span: Span) -> Span {
    let text = span.text(source);
    let leading = text.len() - text.trim_start().len();
    let trailing = text.len() - text.trim_end().len();
    if leading == text.len() {
        return Span::new(span.start, span.start);
    }
    Span::new(span.start + leading, span.end - trailing)
}

fn parse_template_literal(source: &str, span: Span) -> Option<TemplateLiteral> {
    let bytes = source.as_bytes();
    if span.is_empty() || bytes[span.start] != b'`' {
        return None;
    }
    if skip_template(source, span.start)? != span.end {
        return None;
    }

    let mut parts = Vec::new();
    let mut idx = span.start + 1;
    let mut quasi_start = idx;
    let close = span.end - 1;
    while idx < close {
        match bytes[idx] {
            b'\\' => idx += 2,
            b'$' if bytes.get(idx + 1) == Some(&b'{') => {
                if idx > quasi_start {
                    parts.push(TemplatePart::Quasi(Span::new(quasi_start, idx)));
                }
                let end = find_expression_end(source, idx + 1)?;
                parts.push(TemplatePart::Interpolation(trim_span(
                    source,
                    Span::new(idx + 2, end - 1),
                )));
                idx = end;
                quasi_start = idx;
            }
            _ => idx += 1,
        }
    }
    if close > quasi_start {
        parts.push(TemplatePart::Quasi(Span::new(quasi_start, close)));
    }

    Some(TemplateLiteral {
        start: span.start,
        end: span.end,
        parts,
    })
}

/// Returns the offset just past the `}` matching the `{` at `open_idx`.
/// String, template and comment contents are skipped.
pub fn find_expression_end(source: &str, open_idx: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut idx = open_idx;
    while idx < bytes.len() {
        match bytes[idx] {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx + 1);
                }
            }
            quote @ (b'"' | b'\'') => {
                idx = skip_string(bytes, idx, quote)?;
                continue;
            }
            b'`' => {
                idx = skip_template(source, idx)?;
                continue;
            }
            b'/' if bytes.get(idx + 1) == Some(&b'/') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    idx += 1;
                }
                continue;
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                let rel_end = source[idx + 2..].find("*/")?;
                idx += 2 + rel_end + 2;
                continue;
            }
            _ => {}
        }
        idx += 1;
    }
    None
}

fn skip_string(bytes: &[u8], open_idx: usize, quote: u8) -> Option<usize> {
    let mut idx = open_idx + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            byte if byte == quote => return Some(idx + 1),
            _ => idx += 1,
        }
    }
    None
}

fn skip_template(source: &str, open_idx: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut idx = open_idx + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b'`' => return Some(idx + 1),
            b'$' if bytes.get(idx + 1) == Some(&b'{') => {
                idx = find_expression_end(source, idx + 1)?;
            }
            _ => idx += 1,
        }
    }
    None
}

/// Maps byte offsets to zero-based line / UTF-16 column pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, byte)| *byte == b'\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { line_starts }
    }

    pub fn position(&self, source: &str, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let column = source[self.line_starts[line]..offset].encode_utf16().count();
        (line as u32, column as u32)
    }

    pub fn line_start(&self, line: u32) -> Option<usize> {
        self.line_starts.get(line as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Attribute, AttributeValue, Expression, LineIndex, Node, TemplatePart, ValuePart, Walk,
        parse, walk,
    };

    fn first_element(source: &str) -> super::Element {
        let document = parse(source).expect("markup should parse");
        document
            .nodes
            .into_iter()
            .find_map(|node| match node {
                Node::Element(element) => Some(element),
                _ => None,
            })
            .expect("document should contain an element")
    }

    #[test]
    fn parses_quoted_class_attribute() {
        let source = r#"<div class="p-4 bg-white" />"#;
        let element = first_element(source);
        assert_eq!(element.name, "div");
        assert_eq!(element.end, source.len());
        let Attribute::Value(attr) = &element.attributes[0] else {
            panic!("expected value attribute");
        };
        assert_eq!(attr.name, "class");
        assert_eq!(&source[attr.start..attr.end], r#"class="p-4 bg-white""#);
        let AttributeValue::Parts(parts) = &attr.value else {
            panic!("expected parts");
        };
        let [ValuePart::Text(span)] = parts.as_slice() else {
            panic!("expected one text part");
        };
        assert_eq!(span.text(source), "p-4 bg-white");
    }

    #[test]
    fn parses_mustache_inside_quoted_value() {
        let source = r#"<p class="px-{size} m-2">x</p>"#;
        let element = first_element(source);
        let Attribute::Value(attr) = &element.attributes[0] else {
            panic!("expected value attribute");
        };
        let AttributeValue::Parts(parts) = &attr.value else {
            panic!("expected parts");
        };
        assert_eq!(parts.len(), 3);
        let ValuePart::Expression(tag) = &parts[1] else {
            panic!("expected expression");
        };
        assert_eq!(&source[tag.start..tag.end], "{size}");
        assert_eq!(tag.expression.span().text(source), "size");
    }

    #[test]
    fn parses_template_literal_expression() {
        let source = "<p class={`p-2 bg-${color}-500`}>x</p>";
        let element = first_element(source);
        let Attribute::Value(attr) = &element.attributes[0] else {
            panic!("expected value attribute");
        };
        let AttributeValue::Parts(parts) = &attr.value else {
            panic!("expected parts");
        };
        let [ValuePart::Expression(tag)] = parts.as_slice() else {
            panic!("expected single expression");
        };
        let Expression::TemplateLiteral(literal) = &tag.expression else {
            panic!("expected template literal");
        };
        let texts = literal
            .parts
            .iter()
            .map(|part| match part {
                TemplatePart::Quasi(span) => format!("q:{}", span.text(source)),
                TemplatePart::Interpolation(span) => format!("e:{}", span.text(source)),
            })
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["q:p-2 bg-", "e:color", "q:-500"]);
    }

    #[test]
    fn parses_class_directives() {
        let source = "<h1 class:font-bold={isBold} class:active>x</h1>";
        let element = first_element(source);
        let Attribute::ClassDirective(bold) = &element.attributes[0] else {
            panic!("expected directive");
        };
        assert_eq!(bold.name, "font-bold");
        assert_eq!(bold.name_span.text(source), "font-bold");
        assert_eq!(bold.expression.map(|span| span.text(source)), Some("isBold"));
        let Attribute::ClassDirective(active) = &element.attributes[1] else {
            panic!("expected directive");
        };
        assert_eq!(active.expression, None);
        assert_eq!(&source[active.start..active.end], "class:active");
    }

    #[test]
    fn keeps_script_and_style_raw() {
        let source = "<script>let a = '<div>';</script><div>{a}</div><style>.a { color: red; }</style>";
        let document = parse(source).expect("markup should parse");
        let style = document.style.expect("style block should be found");
        assert_eq!(style.content.text(source), ".a { color: red; }");
        assert_eq!(&source[style.start..style.end], "<style>.a { color: red; }</style>");
        assert_eq!(document.nodes.len(), 3);
    }

    #[test]
    fn expression_matching_skips_strings() {
        let source = "<div title={a ? '}' : `${b}}`}>x</div>";
        let element = first_element(source);
        assert_eq!(element.attributes.len(), 1);
        assert_eq!(element.children.len(), 1);
    }

    #[test]
    fn walk_visits_in_pre_order_and_can_skip() {
        let source = "<a><b><c /></b><d /></a><e />";
        let document = parse(source).expect("markup should parse");
        let mut seen = Vec::new();
        walk(&document, &mut |element| {
            seen.push(element.name.clone());
            if element.name == "b" {
                Walk::SkipChildren
            } else {
                Walk::Continue
            }
        });
        assert_eq!(seen, vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn reports_mismatched_closing_tag() {
        let err = parse("<div><span></div>").expect_err("should fail");
        assert!(err.message.contains("</div>"));
    }

    #[test]
    fn reports_unclosed_expression() {
        assert!(parse("<div class={a>").is_err());
    }

    #[test]
    fn void_elements_do_not_need_closing() {
        let document = parse("<div><input class=\"p-1\"><br></div>").expect("should parse");
        let Node::Element(div) = &document.nodes[0] else {
            panic!("expected element");
        };
        assert_eq!(div.children.len(), 2);
    }

    #[test]
    fn line_index_reports_zero_based_positions() {
        let source = "ab\ncd\nef";
        let index = LineIndex::new(source);
        assert_eq!(index.position(source, 0), (0, 0));
        assert_eq!(index.position(source, 4), (1, 1));
        assert_eq!(index.position(source, 6), (2, 0));
    }
}
