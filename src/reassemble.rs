//! Rebuilds the class attribute of one element from its compile result.

use crate::collect::AttributeGroup;
use crate::compiler::CompileResult;
use crate::extract::{Placeholder, TokenPart, split_keys};
use crate::markup::Span;
use crate::position::{Edit, Piece, SourceFile};

/// Finds unused occurrences of ignored-token text inside the group's literal
/// spans so it can be copied with its original coordinates.
struct LiteralIndex<'a> {
    literals: &'a [Span],
    used: Vec<Span>,
}

impl<'a> LiteralIndex<'a> {
    fn new(literals: &'a [Span]) -> Self {
        Self {
            literals,
            used: Vec::new(),
        }
    }

    /// Only whole tokens count: the match must start and end at whitespace or
    /// at the edge of a literal span.
    fn locate(&mut self, source: &str, text: &str) -> Option<Span> {
        for literal in self.literals {
            let literal_text = literal.text(source);
            for (idx, _) in literal_text.match_indices(text) {
                let before = literal_text[..idx].chars().next_back();
                let after = literal_text[idx + text.len()..].chars().next();
                let whole = before.is_none_or(char::is_whitespace)
                    && after.is_none_or(char::is_whitespace);
                if !whole {
                    continue;
                }
                let candidate = Span::new(literal.start + idx, literal.start + idx + text.len());
                let overlaps = self
                    .used
                    .iter()
                    .any(|used| used.start < candidate.end && candidate.start < used.end);
                if !overlaps {
                    self.used.push(candidate);
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// Produces one edit replacing the first matched attribute with
/// ``class={`...`}`` and one removal per remaining matched attribute.
pub fn reassemble(file: &SourceFile<'_>, group: &AttributeGroup, result: &CompileResult) -> Vec<Edit> {
    let mut literals = LiteralIndex::new(&group.literals);
    let mut pieces = vec![Piece::synthetic("class={`")];
    if let Some(class_name) = &result.class_name {
        pieces.push(Piece::synthetic(class_name.as_str()));
    }
    for (idx, token) in result.ignored.iter().enumerate() {
        if idx > 0 || result.class_name.is_some() {
            pieces.push(Piece::synthetic(" "));
        }
        token_pieces(file.text, token, &group.placeholders, &mut literals, &mut pieces);
    }
    pieces.push(Piece::synthetic("`}"));

    let mut edits = Vec::with_capacity(group.spans.len());
    edits.push(Edit::replace(group.first_span(), pieces));
    edits.extend(group.spans[1..].iter().copied().map(Edit::remove));
    edits
}

fn token_pieces(
    source: &str,
    token: &str,
    placeholders: &[Placeholder],
    literals: &mut LiteralIndex<'_>,
    pieces: &mut Vec<Piece>,
) {
    // Literal runs between live placeholders, including key-like text the
    // user wrote, are located as a whole.
    let mut run_start = 0usize;
    let mut offset = 0usize;
    for part in split_keys(token) {
        let (text, placeholder) = match part {
            TokenPart::Key(key) => (
                key,
                placeholders.iter().find(|placeholder| placeholder.key == key),
            ),
            TokenPart::Text(text) => (text, None),
        };
        if let Some(placeholder) = placeholder {
            literal_pieces(source, &token[run_start..offset], literals, pieces);
            pieces.extend(placeholder.pieces());
            run_start = offset + text.len();
        }
        offset += text.len();
    }
    literal_pieces(source, &token[run_start..], literals, pieces);
}

fn literal_pieces(
    source: &str,
    text: &str,
    literals: &mut LiteralIndex<'_>,
    pieces: &mut Vec<Piece>,
) {
    if text.is_empty() {
        return;
    }
    match literals.locate(source, text) {
        Some(span) => pieces.push(Piece::Source(span)),
        None => pieces.push(Piece::synthetic(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::reassemble;
    use crate::bridge::compile_group;
    use crate::collect::collect_group;
    use crate::compiler::{Processor, UtilityCompiler, VariantKind};
    use crate::css::StyleSheet;
    use crate::extract::PlaceholderCounter;
    use crate::markup::{Node, parse};
    use crate::position::{Edit, Piece, SourceFile, apply_edits};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn rewrite(source: &str) -> (String, Vec<Edit>) {
        let document = parse(source).expect("markup should parse");
        let Some(Node::Element(element)) = document.nodes.first() else {
            panic!("expected an element");
        };
        let processor = Processor::default();
        let variants = processor
            .variants(VariantKind::Screen)
            .into_iter()
            .chain(processor.variants(VariantKind::State))
            .collect::<BTreeSet<_>>();
        let file = SourceFile::new("App.svelte", source);
        let group = collect_group(&file, element, &variants, &mut PlaceholderCounter::new())
            .expect("collects")
            .expect("has a group");
        let mut sheet = StyleSheet::new();
        let output = compile_group(&processor, &file, &group, "windi-", None, &mut sheet);
        let edits = reassemble(&file, &group, &output.result);
        let code = apply_edits(&file, edits.clone()).code();
        match output.result.class_name {
            Some(class_name) => (code.replace(&class_name, "GEN"), edits),
            None => (code, edits),
        }
    }

    #[test]
    fn keeps_ignored_tokens_after_generated_name() {
        let (code, _) = rewrite(r#"<div class="bg-white custom-class" />"#);
        assert_eq!(code, "<div class={`GEN custom-class`} />");
    }

    #[test]
    fn restores_expressions_in_place() {
        let (code, _) = rewrite(r#"<div class="p-4 text-{tone} {extra}" />"#);
        assert_eq!(code, "<div class={`GEN text-${tone} ${extra}`} />");
    }

    #[test]
    fn restores_template_literal_interpolations() {
        let (code, _) = rewrite("<div class={`font-light ${active ? 'ring' : ''}`} />");
        assert_eq!(code, "<div class={`GEN ${active ? 'ring' : ''}`} />");
    }

    #[test]
    fn opaque_values_survive_untouched() {
        let (code, _) = rewrite("<div class={classes} />");
        assert_eq!(code, "<div class={`${classes}`} />");
    }

    #[test]
    fn directives_become_ternaries() {
        let (code, _) = rewrite(r#"<div class:font-bold={flag} class="bg-white" />"#);
        assert_eq!(code, "<div class={`GEN ${flag ? 'font-bold' : ''}`}  />");
    }

    #[test]
    fn merges_variant_attributes_into_one() {
        let (code, edits) = rewrite(r#"<div class="p-4" sm="custom p-2" id="x" />"#);
        assert_eq!(code, r#"<div class={`GEN sm:custom`}  id="x" />"#);
        assert_eq!(edits.len(), 2);
    }

    #[test]
    fn ignored_tokens_map_to_their_own_occurrence() {
        let source = r#"<div class="bg-red-500 red" />"#;
        let (code, edits) = rewrite(source);
        assert_eq!(code, "<div class={`GEN red`} />");
        let copied = edits[0]
            .insert
            .iter()
            .find_map(|piece| match piece {
                Piece::Source(span) => Some(*span),
                Piece::Synthetic(_) => None,
            })
            .expect("red is copied from the source");
        assert_eq!((copied.start, copied.end), (23, 26));
    }

    #[test]
    fn key_like_literal_text_is_kept() {
        let source = r#"<div class="$cw0$ {x}" />"#;
        let document = parse(source).expect("markup should parse");
        let Some(Node::Element(element)) = document.nodes.first() else {
            panic!("expected an element");
        };
        let file = SourceFile::new("App.svelte", source);
        let group = collect_group(
            &file,
            element,
            &BTreeSet::new(),
            &mut PlaceholderCounter::for_source(source),
        )
        .expect("collects")
        .expect("has a group");
        let result = Processor::default().compile(&group.composite, "windi-");
        let code = apply_edits(&file, reassemble(&file, &group, &result)).code();
        assert_eq!(code, "<div class={`$cw0$ ${x}`} />");
    }

    #[test]
    fn ignored_literals_keep_source_spans() {
        let source = r#"<div class="bg-white custom-class" />"#;
        let (_, edits) = rewrite(source);
        let copied = edits[0]
            .insert
            .iter()
            .filter_map(|piece| match piece {
                Piece::Source(span) => Some(span.text(source)),
                Piece::Synthetic(_) => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(copied, vec!["custom-class"]);
    }
}
