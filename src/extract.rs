//! Token extraction for one class-bearing attribute.
//!
//! Literal text is copied into a flattened class string as-is. Every embedded
//! expression is replaced with a placeholder key so the utility compiler only
//! ever sees literal text; the key is restored after compilation.

use crate::error::PreprocessError;
use crate::markup::{ClassDirective, Expression, Span, TemplatePart, ValuePart};
use crate::position::{Piece, SourceFile};
use std::collections::BTreeSet;

const KEY_OPEN: &str = "$cw";
const KEY_CLOSE: char = '$';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconstruction {
    /// `${expression}` inside the rebuilt template literal.
    Interpolation,
    /// The whole attribute value was one bare expression. Kept as `${expression}`
    /// and never compiled.
    Opaque,
    /// `${expression ? 'class' : ''}` for a class directive.
    Conditional { class_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub key: String,
    pub expression: Span,
    pub template: Reconstruction,
}

impl Placeholder {
    /// Wrapper text is synthetic; the expression itself keeps its source span.
    pub fn pieces(&self) -> Vec<Piece> {
        let suffix = match &self.template {
            Reconstruction::Interpolation | Reconstruction::Opaque => "}".to_string(),
            Reconstruction::Conditional { class_name } => format!(" ? '{}' : ''}}", class_name),
        };
        vec![
            Piece::synthetic("${"),
            Piece::Source(self.expression),
            Piece::Synthetic(suffix),
        ]
    }

    pub fn render(&self, source: &str) -> String {
        match &self.template {
            Reconstruction::Interpolation | Reconstruction::Opaque => {
                format!("${{{}}}", self.expression.text(source))
            }
            Reconstruction::Conditional { class_name } => format!(
                "${{{} ? '{}' : ''}}",
                self.expression.text(source),
                class_name
            ),
        }
    }
}

/// Hands out placeholder keys; one counter per document.
#[derive(Debug, Default)]
pub struct PlaceholderCounter {
    next: usize,
    taken: BTreeSet<usize>,
}

impl PlaceholderCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A counter that skips every key already written literally in `source`,
    /// so user text can never be mistaken for a placeholder.
    pub fn for_source(source: &str) -> Self {
        let taken = split_keys(source)
            .into_iter()
            .filter_map(|part| match part {
                TokenPart::Key(key) => key[KEY_OPEN.len()..key.len() - 1].parse().ok(),
                TokenPart::Text(_) => None,
            })
            .collect();
        Self { next: 0, taken }
    }

    pub fn next_key(&mut self) -> String {
        while self.taken.contains(&self.next) {
            self.next += 1;
        }
        let key = format!("{}{}{}", KEY_OPEN, self.next, KEY_CLOSE);
        self.next += 1;
        key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub flattened: String,
    pub placeholders: Vec<Placeholder>,
    /// Source spans of the literal text copied into `flattened`, in order.
    pub literals: Vec<Span>,
}

impl Extraction {
    fn push_literal(&mut self, source: &str, span: Span) {
        if span.is_empty() {
            return;
        }
        self.flattened.push_str(span.text(source));
        self.literals.push(span);
    }

    fn push_placeholder(
        &mut self,
        counter: &mut PlaceholderCounter,
        expression: Span,
        template: Reconstruction,
    ) {
        let key = counter.next_key();
        self.flattened.push_str(&key);
        self.placeholders.push(Placeholder {
            key,
            expression,
            template,
        });
    }
}

/// Flattens the value parts of a `class` or variant attribute.
pub fn extract_value(source: &str, parts: &[ValuePart], counter: &mut PlaceholderCounter) -> Extraction {
    let mut extraction = Extraction::default();

    if let [ValuePart::Expression(tag)] = parts {
        match &tag.expression {
            Expression::TemplateLiteral(literal) => {
                for part in &literal.parts {
                    match part {
                        TemplatePart::Quasi(span) => extraction.push_literal(source, *span),
                        TemplatePart::Interpolation(span) => extraction.push_placeholder(
                            counter,
                            *span,
                            Reconstruction::Interpolation,
                        ),
                    }
                }
            }
            Expression::Other(span) => {
                extraction.push_placeholder(counter, *span, Reconstruction::Opaque);
            }
        }
        return extraction;
    }

    for part in parts {
        match part {
            ValuePart::Text(span) => extraction.push_literal(source, *span),
            ValuePart::Expression(tag) => extraction.push_placeholder(
                counter,
                tag.expression.span(),
                Reconstruction::Interpolation,
            ),
        }
    }
    extraction
}

/// Turns `class:name={expr}` into a conditional placeholder. The bare
/// `class:name` form uses the name itself as the condition, so it must be a
/// valid identifier.
pub fn extract_directive(
    file: &SourceFile<'_>,
    directive: &ClassDirective,
    counter: &mut PlaceholderCounter,
) -> Result<Extraction, PreprocessError> {
    let expression = match directive.expression {
        Some(span) => span,
        None if is_identifier(&directive.name) => directive.name_span,
        None => {
            let (line, column) = file.location(directive.start);
            return Err(PreprocessError::InvalidDirectiveName {
                filename: file.name.to_string(),
                attribute: Span::new(directive.start, directive.end)
                    .text(file.text)
                    .to_string(),
                name: directive.name.clone(),
                line,
                column,
            });
        }
    };

    let mut extraction = Extraction::default();
    extraction.push_placeholder(
        counter,
        expression,
        Reconstruction::Conditional {
            class_name: directive.name.clone(),
        },
    );
    Ok(extraction)
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPart<'a> {
    Text(&'a str),
    Key(&'a str),
}

/// Splits a compiled token into literal runs and whole placeholder keys.
/// Only `$cw<digits>$` counts as a key, so keys never match partially.
pub fn split_keys(token: &str) -> Vec<TokenPart<'_>> {
    let mut parts = Vec::new();
    let mut text_start = 0usize;
    let mut search = 0usize;
    while let Some(found) = token[search..].find(KEY_OPEN) {
        let key_start = search + found;
        let digits_start = key_start + KEY_OPEN.len();
        let digits = token[digits_start..]
            .bytes()
            .take_while(|byte| byte.is_ascii_digit())
            .count();
        let close = digits_start + digits;
        if digits == 0 || !token[close..].starts_with(KEY_CLOSE) {
            search = digits_start;
            continue;
        }
        if key_start > text_start {
            parts.push(TokenPart::Text(&token[text_start..key_start]));
        }
        parts.push(TokenPart::Key(&token[key_start..close + 1]));
        text_start = close + 1;
        search = text_start;
    }
    if text_start < token.len() {
        parts.push(TokenPart::Text(&token[text_start..]));
    }
    parts
}

/// Replaces every known key in `token` with its reconstruction.
pub fn restore(token: &str, placeholders: &[Placeholder], source: &str) -> String {
    split_keys(token)
        .into_iter()
        .map(|part| match part {
            TokenPart::Text(text) => text.to_string(),
            TokenPart::Key(key) => placeholders
                .iter()
                .find(|placeholder| placeholder.key == key)
                .map(|placeholder| placeholder.render(source))
                .unwrap_or_else(|| key.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        PlaceholderCounter, Reconstruction, TokenPart, extract_directive, extract_value,
        is_identifier, restore, split_keys,
    };
    use crate::error::PreprocessError;
    use crate::markup::{Attribute, AttributeValue, Node, parse};
    use crate::position::SourceFile;

    fn first_attribute(source: &str) -> Attribute {
        let document = parse(source).expect("markup should parse");
        match document.nodes.into_iter().next() {
            Some(Node::Element(element)) => element
                .attributes
                .into_iter()
                .next()
                .expect("element has an attribute"),
            other => panic!("expected an element, got {:?}", other),
        }
    }

    fn extract(source: &str, counter: &mut PlaceholderCounter) -> super::Extraction {
        match first_attribute(source) {
            Attribute::Value(attribute) => match attribute.value {
                AttributeValue::Parts(parts) => extract_value(source, &parts, counter),
                AttributeValue::Boolean => panic!("expected a value"),
            },
            other => panic!("expected a value attribute, got {:?}", other),
        }
    }

    #[test]
    fn copies_literal_text() {
        let source = r#"<div class="bg-white font-light" />"#;
        let extraction = extract(source, &mut PlaceholderCounter::new());
        assert_eq!(extraction.flattened, "bg-white font-light");
        assert!(extraction.placeholders.is_empty());
        assert_eq!(extraction.literals.len(), 1);
    }

    #[test]
    fn replaces_mustaches_inside_quoted_values() {
        let source = r#"<div class="p-{size} m-2 {extra}" />"#;
        let extraction = extract(source, &mut PlaceholderCounter::new());
        assert_eq!(extraction.flattened, "p-$cw0$ m-2 $cw1$");
        assert_eq!(extraction.placeholders[0].expression.text(source), "size");
        assert_eq!(extraction.placeholders[1].template, Reconstruction::Interpolation);
    }

    #[test]
    fn unwraps_single_template_literal() {
        let source = "<div class={`bg-white ${active ? 'font-bold' : ''}`} />";
        let extraction = extract(source, &mut PlaceholderCounter::new());
        assert_eq!(extraction.flattened, "bg-white $cw0$");
        assert_eq!(
            extraction.placeholders[0].expression.text(source),
            "active ? 'font-bold' : ''"
        );
    }

    #[test]
    fn keeps_single_bare_expression_opaque() {
        let source = "<div class={classes} />";
        let extraction = extract(source, &mut PlaceholderCounter::new());
        assert_eq!(extraction.flattened, "$cw0$");
        assert_eq!(extraction.placeholders[0].template, Reconstruction::Opaque);
        assert_eq!(extraction.placeholders[0].render(source), "${classes}");
    }

    #[test]
    fn counter_keeps_keys_unique_across_attributes() {
        let mut counter = PlaceholderCounter::new();
        let first = extract("<a class={x} />", &mut counter);
        let second = extract("<a class={y} />", &mut counter);
        assert_ne!(first.placeholders[0].key, second.placeholders[0].key);
        for key in [&first.placeholders[0].key, &second.placeholders[0].key] {
            assert!(!key.contains(|ch: char| ch.is_whitespace() || matches!(ch, '(' | ')' | ':')));
        }
    }

    #[test]
    fn counter_skips_keys_written_in_the_document() {
        let mut counter = PlaceholderCounter::for_source(r#"<a class="$cw0$ $cw2$ {x}" />"#);
        assert_eq!(counter.next_key(), "$cw1$");
        assert_eq!(counter.next_key(), "$cw3$");
        assert_eq!(counter.next_key(), "$cw4$");
    }

    #[test]
    fn directive_becomes_conditional() {
        let source = "<div class:font-bold={flag} />";
        let Attribute::ClassDirective(directive) = first_attribute(source) else {
            panic!("expected a class directive");
        };
        let file = SourceFile::new("App.svelte", source);
        let extraction = extract_directive(&file, &directive, &mut PlaceholderCounter::new())
            .expect("directive should extract");
        assert_eq!(extraction.flattened, "$cw0$");
        assert_eq!(
            extraction.placeholders[0].render(source),
            "${flag ? 'font-bold' : ''}"
        );
    }

    #[test]
    fn shorthand_directive_uses_its_name() {
        let source = "<div class:active />";
        let Attribute::ClassDirective(directive) = first_attribute(source) else {
            panic!("expected a class directive");
        };
        let file = SourceFile::new("App.svelte", source);
        let extraction = extract_directive(&file, &directive, &mut PlaceholderCounter::new())
            .expect("identifier shorthand is valid");
        assert_eq!(
            extraction.placeholders[0].render(source),
            "${active ? 'active' : ''}"
        );
    }

    #[test]
    fn rejects_shorthand_directive_that_is_not_an_identifier() {
        let source = "<div\n  class:font-bold />";
        let Attribute::ClassDirective(directive) = first_attribute(source) else {
            panic!("expected a class directive");
        };
        let file = SourceFile::new("App.svelte", source);
        let err = extract_directive(&file, &directive, &mut PlaceholderCounter::new())
            .expect_err("font-bold is not an identifier");
        assert_eq!(
            err,
            PreprocessError::InvalidDirectiveName {
                filename: "App.svelte".to_string(),
                attribute: "class:font-bold".to_string(),
                name: "font-bold".to_string(),
                line: 2,
                column: 3,
            }
        );
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("active"));
        assert!(is_identifier("$store"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("font-bold"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn splits_keys_exactly() {
        assert_eq!(
            split_keys("p-$cw12$-x"),
            vec![TokenPart::Text("p-"), TokenPart::Key("$cw12$"), TokenPart::Text("-x")]
        );
        assert_eq!(split_keys("$cw$"), vec![TokenPart::Text("$cw$")]);
        assert_eq!(split_keys("windi-abc"), vec![TokenPart::Text("windi-abc")]);
    }

    #[test]
    fn restores_known_keys_only() {
        let source = r#"<div class="p-{size} $cw9$" />"#;
        let extraction = extract(source, &mut PlaceholderCounter::new());
        assert_eq!(restore("p-$cw0$", &extraction.placeholders, source), "p-${size}");
        assert_eq!(restore("$cw9$", &extraction.placeholders, source), "$cw9$");
    }
}
