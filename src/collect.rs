//! Groups the class-bearing attributes of one element into a single
//! composite class string.

use crate::error::PreprocessError;
use crate::extract::{Extraction, Placeholder, PlaceholderCounter, extract_directive, extract_value};
use crate::markup::{
    Attribute, AttributeValue, ClassDirective, Element, Expression, Span, ValuePart,
};
use crate::position::SourceFile;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeGroup {
    pub element_start: usize,
    /// Spans of every matched attribute in source order. The rebuilt attribute
    /// replaces the first one; the rest are removed.
    pub spans: Vec<Span>,
    /// Directive names, then `class` tokens, then `variant:(...)` groups.
    pub composite: String,
    pub directive_names: Vec<String>,
    pub placeholders: Vec<Placeholder>,
    pub literals: Vec<Span>,
}

impl AttributeGroup {
    pub fn first_span(&self) -> Span {
        self.spans[0]
    }
}

/// Variant names that are also standard HTML attributes. On an element they
/// keep their HTML meaning and are never read as class lists.
const HTML_ATTRIBUTES: [&str; 3] = ["checked", "disabled", "placeholder"];

enum Matched<'a> {
    Directive(&'a ClassDirective),
    Class(&'a AttributeValue),
    Variant(&'a str, &'a [ValuePart]),
}

/// Returns `None` when the element has no class-bearing attribute.
pub fn collect_group(
    file: &SourceFile<'_>,
    element: &Element,
    variants: &BTreeSet<String>,
    counter: &mut PlaceholderCounter,
) -> Result<Option<AttributeGroup>, PreprocessError> {
    let mut matched = Vec::new();
    for attribute in &element.attributes {
        let kind = match attribute {
            Attribute::ClassDirective(directive) => Matched::Directive(directive),
            Attribute::Value(value) if value.name.eq_ignore_ascii_case("class") => {
                Matched::Class(&value.value)
            }
            Attribute::Value(value)
                if variants.contains(value.name.as_str())
                    && !HTML_ATTRIBUTES.contains(&value.name.as_str()) =>
            {
                match &value.value {
                    AttributeValue::Parts(parts) if is_class_list(parts) => {
                        Matched::Variant(&value.name, parts)
                    }
                    _ => continue,
                }
            }
            _ => continue,
        };
        matched.push((attribute.span(), kind));
    }

    if matched.is_empty() {
        return Ok(None);
    }

    let mut directives = Vec::new();
    let mut classes = Vec::new();
    let mut variant_groups = Vec::new();
    let mut directive_names = Vec::new();
    let mut spans = Vec::with_capacity(matched.len());
    for (span, kind) in matched {
        spans.push(span);
        match kind {
            Matched::Directive(directive) => {
                directive_names.push(directive.name.clone());
                directives.push(extract_directive(file, directive, counter)?);
            }
            Matched::Class(AttributeValue::Parts(parts)) => {
                classes.push(extract_value(file.text, parts, counter));
            }
            Matched::Class(AttributeValue::Boolean) => {}
            Matched::Variant(name, parts) => {
                let mut extraction = extract_value(file.text, parts, counter);
                extraction.flattened = format!("{}:({})", name, extraction.flattened.trim());
                variant_groups.push(extraction);
            }
        }
    }

    let mut composite = Vec::new();
    let mut placeholders = Vec::new();
    let mut literals = Vec::new();
    for extraction in directives.into_iter().chain(classes).chain(variant_groups) {
        let Extraction {
            flattened,
            placeholders: extracted,
            literals: spans,
        } = extraction;
        let flattened = flattened.split_whitespace().collect::<Vec<_>>().join(" ");
        if !flattened.is_empty() {
            composite.push(flattened);
        }
        placeholders.extend(extracted);
        literals.extend(spans);
    }

    Ok(Some(AttributeGroup {
        element_start: element.start,
        spans,
        composite: composite.join(" "),
        directive_names,
        placeholders,
        literals,
    }))
}

/// Variant attributes only count when they carry a literal class list; a lone
/// `{expression}` is an ordinary prop.
fn is_class_list(parts: &[ValuePart]) -> bool {
    match parts {
        [] => false,
        [ValuePart::Expression(tag)] => matches!(tag.expression, Expression::TemplateLiteral(_)),
        _ => parts.iter().any(|part| match part {
            ValuePart::Text(_) => true,
            ValuePart::Expression(_) => false,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{AttributeGroup, collect_group};
    use crate::error::PreprocessError;
    use crate::extract::PlaceholderCounter;
    use crate::markup::{Node, parse};
    use crate::position::SourceFile;
    use std::collections::BTreeSet;

    fn variants() -> BTreeSet<String> {
        ["sm", "md", "hover", "placeholder", "disabled"].iter().map(|name| name.to_string()).collect()
    }

    fn group(source: &str) -> Result<Option<AttributeGroup>, PreprocessError> {
        let document = parse(source).expect("markup should parse");
        let Some(Node::Element(element)) = document.nodes.first() else {
            panic!("expected an element");
        };
        let file = SourceFile::new("App.svelte", source);
        collect_group(&file, element, &variants(), &mut PlaceholderCounter::new())
    }

    #[test]
    fn skips_elements_without_class_attributes() {
        assert_eq!(group(r#"<div id="a" title="b" />"#), Ok(None));
    }

    #[test]
    fn merges_directives_then_class_then_variants() {
        let source = r#"<div sm="p-2 m-1" id="x" class="bg-white" class:font-bold={flag} />"#;
        let group = group(source).expect("collects").expect("has a group");
        assert_eq!(group.composite, "$cw0$ bg-white sm:(p-2 m-1)");
        assert_eq!(group.directive_names, vec!["font-bold"]);
        assert_eq!(group.spans.len(), 3);
        assert_eq!(group.first_span().text(source), r#"sm="p-2 m-1""#);
    }

    #[test]
    fn variant_named_props_with_expressions_are_not_class_lists() {
        let source = r#"<Grid md={columns} class="p-4" />"#;
        let group = group(source).expect("collects").expect("has a group");
        assert_eq!(group.composite, "p-4");
        assert_eq!(group.spans.len(), 1);
    }

    #[test]
    fn html_attributes_named_like_variants_are_kept() {
        let source = r#"<input placeholder="Search" disabled="true" class="p-2" hover="m-1" />"#;
        let group = group(source).expect("collects").expect("has a group");
        assert_eq!(group.composite, "p-2 hover:(m-1)");
        assert_eq!(group.spans.len(), 2);
        assert_eq!(group.first_span().text(source), r#"class="p-2""#);
    }

    #[test]
    fn normalises_whitespace_inside_values() {
        let source = "<div class=\"  p-4\n   m-2 \" />";
        let group = group(source).expect("collects").expect("has a group");
        assert_eq!(group.composite, "p-4 m-2");
    }

    #[test]
    fn propagates_invalid_directive_names() {
        let source = "<div class:font-bold />";
        assert!(matches!(
            group(source),
            Err(PreprocessError::InvalidDirectiveName { .. })
        ));
    }
}
