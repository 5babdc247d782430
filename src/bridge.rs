//! Sends one attribute group through the utility compiler and folds the
//! generated CSS into the document stylesheet.

use crate::collect::AttributeGroup;
use crate::compiler::{CompileResult, UtilityCompiler, VariantKind};
use crate::compiler::variants::split_variants;
use crate::css::StyleSheet;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::extract::{Reconstruction, TokenPart, restore, split_keys};
use crate::position::SourceFile;
use std::collections::BTreeSet;

/// Name registries used to flag ignored tokens that look like utilities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtilityPatterns {
    static_names: BTreeSet<String>,
    /// `bg-`, `p-`, ...
    dynamic_prefixes: Vec<String>,
    /// `sm:`, `hover:`, ...
    variant_prefixes: Vec<String>,
}

impl UtilityPatterns {
    pub fn new<C: UtilityCompiler>(compiler: &C) -> Self {
        let mut dynamic_prefixes = compiler
            .dynamic_utilities()
            .into_iter()
            .map(|prefix| format!("{}-", prefix))
            .collect::<Vec<_>>();
        dynamic_prefixes.sort();
        dynamic_prefixes.dedup();
        let mut variant_prefixes = compiler
            .variants(VariantKind::Screen)
            .into_iter()
            .chain(compiler.variants(VariantKind::State))
            .map(|variant| format!("{}:", variant))
            .collect::<Vec<_>>();
        variant_prefixes.sort();
        variant_prefixes.dedup();
        Self {
            static_names: compiler.static_utilities().into_iter().collect(),
            dynamic_prefixes,
            variant_prefixes,
        }
    }

    pub fn is_utility_like(&self, token: &str) -> bool {
        let (_, utility) = split_variants(token);
        if self.static_names.contains(utility) {
            return true;
        }
        boundaries(token).any(|rest| {
            self.dynamic_prefixes
                .iter()
                .chain(&self.variant_prefixes)
                .any(|prefix| rest.starts_with(prefix.as_str()))
        })
    }
}

/// Every suffix of `token` that starts the token or follows ` `, `:` or `(`.
fn boundaries(token: &str) -> impl Iterator<Item = &str> {
    std::iter::once(token).chain(
        token
            .char_indices()
            .filter(|(_, ch)| matches!(ch, ' ' | ':' | '('))
            .map(move |(idx, _)| &token[idx + 1..]),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOutput {
    pub result: CompileResult,
    /// Directive names the compiler recognised.
    pub interpreted: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Compiles a group's directive names and composite class string.
///
/// Directive names are interpreted under their own name so the conditional
/// class keeps working at runtime; the composite is compiled into one
/// generated class. Both land in `sheet`. With `patterns` set, ignored tokens
/// are checked after restoring their placeholders.
pub fn compile_group<C: UtilityCompiler>(
    compiler: &C,
    file: &SourceFile<'_>,
    group: &AttributeGroup,
    prefix: &str,
    patterns: Option<&UtilityPatterns>,
    sheet: &mut StyleSheet,
) -> BridgeOutput {
    let mut interpreted = Vec::new();
    if !group.directive_names.is_empty() {
        let result = compiler.interpret(&group.directive_names.join(" "));
        sheet.extend(&result.style_sheet);
        interpreted = result.success;
    }

    let result = compiler.compile(&group.composite, prefix);
    sheet.extend(&result.style_sheet);

    let mut diagnostics = Vec::new();
    if let Some(patterns) = patterns {
        let (line, column) = file.location(group.element_start);
        for token in &result.ignored {
            if is_directive_placeholder(token, group) {
                continue;
            }
            let restored = restore(token, &group.placeholders, file.text);
            if patterns.is_utility_like(&restored) {
                diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::LikelyMistypedUtility { token: restored },
                    filename: file.name.to_string(),
                    line,
                    column,
                });
            }
        }
    }

    BridgeOutput {
        result,
        interpreted,
        diagnostics,
    }
}

fn is_directive_placeholder(token: &str, group: &AttributeGroup) -> bool {
    match split_keys(token).as_slice() {
        [TokenPart::Key(key)] => group.placeholders.iter().any(|placeholder| {
            placeholder.key == *key
                && matches!(placeholder.template, Reconstruction::Conditional { .. })
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{UtilityPatterns, compile_group};
    use crate::collect::collect_group;
    use crate::compiler::{Processor, UtilityCompiler, hash_classes};
    use crate::css::StyleSheet;
    use crate::diagnostics::DiagnosticKind;
    use crate::extract::PlaceholderCounter;
    use crate::markup::{Node, parse};
    use crate::position::SourceFile;
    use std::collections::BTreeSet;

    fn run(source: &str, warn: bool) -> (super::BridgeOutput, StyleSheet) {
        let document = parse(source).expect("markup should parse");
        let Some(Node::Element(element)) = document.nodes.first() else {
            panic!("expected an element");
        };
        let file = SourceFile::new("App.svelte", source);
        let group = collect_group(&file, element, &BTreeSet::new(), &mut PlaceholderCounter::new())
            .expect("collects")
            .expect("has a group");
        let processor = Processor::default();
        let patterns = UtilityPatterns::new(&processor);
        let mut sheet = StyleSheet::new();
        let output = compile_group(
            &processor,
            &file,
            &group,
            "windi-",
            warn.then_some(&patterns),
            &mut sheet,
        );
        (output, sheet)
    }

    #[test]
    fn patterns_match_utilities_and_variants() {
        let patterns = UtilityPatterns::new(&Processor::default());
        assert!(patterns.is_utility_like("font-bold"));
        assert!(patterns.is_utility_like("hover:custom"));
        assert!(patterns.is_utility_like("bg-${color}"));
        assert!(patterns.is_utility_like("sm:(bg-${color})"));
        assert!(!patterns.is_utility_like("custom-class"));
        assert!(!patterns.is_utility_like("${classes}"));
        assert!(!patterns.is_utility_like("stop-gap"));
    }

    #[test]
    fn conserves_tokens() {
        let (output, sheet) = run(r#"<div class="bg-white custom-class font-light" />"#, true);
        assert_eq!(output.result.resolved, vec!["bg-white", "font-light"]);
        assert_eq!(output.result.ignored, vec!["custom-class"]);
        assert!(output.diagnostics.is_empty());
        let class_name = format!("windi-{}", hash_classes("bg-white font-light"));
        assert_eq!(output.result.class_name, Some(class_name.clone()));
        assert!(sheet.class_names().contains(&class_name));
    }

    #[test]
    fn flags_dynamic_utilities_with_element_position() {
        let source = "<p>x</p>\n  <div class=\"bg-{color} p-4\" />";
        let document = parse(source).expect("markup should parse");
        let element = document
            .nodes
            .iter()
            .filter_map(|node| match node {
                Node::Element(element) => Some(element),
                _ => None,
            })
            .nth(1)
            .expect("second element");
        let file = SourceFile::new("App.svelte", source);
        let group = collect_group(&file, element, &BTreeSet::new(), &mut PlaceholderCounter::new())
            .expect("collects")
            .expect("has a group");
        let processor = Processor::default();
        let patterns = UtilityPatterns::new(&processor);
        let mut sheet = StyleSheet::new();
        let output = compile_group(&processor, &file, &group, "windi-", Some(&patterns), &mut sheet);
        assert_eq!(output.diagnostics.len(), 1);
        let diagnostic = &output.diagnostics[0];
        assert_eq!(
            diagnostic.kind,
            DiagnosticKind::LikelyMistypedUtility {
                token: "bg-${color}".to_string()
            }
        );
        assert_eq!((diagnostic.line, diagnostic.column), (2, 3));
    }

    #[test]
    fn warnings_can_be_disabled() {
        let (output, _) = run(r#"<div class="bg-{color}" />"#, false);
        assert!(output.diagnostics.is_empty());
        assert_eq!(output.result.ignored, vec!["bg-$cw0$"]);
    }

    #[test]
    fn directive_names_compile_under_their_own_name() {
        let (output, sheet) = run(r#"<div class:font-bold={flag} class="bg-white" />"#, true);
        assert!(output.diagnostics.is_empty());
        assert_eq!(output.result.ignored, vec!["$cw0$"]);
        let names = sheet.class_names();
        assert!(names.contains("font-bold"));
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn excluded_names_pass_through() {
        let excluded = ["container".to_string()].into_iter().collect::<BTreeSet<_>>();
        let processor = Processor::default().with_excluded(&excluded);
        let source = r#"<div class="container p-4" />"#;
        let document = parse(source).expect("markup should parse");
        let Some(Node::Element(element)) = document.nodes.first() else {
            panic!("expected an element");
        };
        let file = SourceFile::new("App.svelte", source);
        let group = collect_group(&file, element, &BTreeSet::new(), &mut PlaceholderCounter::new())
            .expect("collects")
            .expect("has a group");
        let mut sheet = StyleSheet::new();
        let output = compile_group(&processor, &file, &group, "windi-", None, &mut sheet);
        assert_eq!(output.result.ignored, vec!["container"]);
        assert_eq!(output.result.resolved, vec!["p-4"]);
    }
}
