//! One rewrite pass over a component document.
//!
//! Parses the markup once, collects every element's class-bearing attributes,
//! compiles them, and records the resulting edits. The edits and the rebuilt
//! style block are applied in a single forward pass at the end, so earlier
//! edits never shift the offsets of later ones.

use crate::bridge::{UtilityPatterns, compile_group};
use crate::collect::collect_group;
use crate::compiler::{DEFAULT_PREFIX, PreflightOptions, UtilityCompiler, VariantKind};
use crate::css::{self, StyleSheet};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::PreprocessError;
use crate::extract::PlaceholderCounter;
use crate::markup::{self, Document, Span, StyleBlock, Walk};
use crate::position::{Edit, Piece, SourceFile, apply_edits};
use crate::reassemble::reassemble;
use serde::Deserialize;
use sourcemap::SourceMap;
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    /// Rewrite class attributes and compile style block directives.
    #[default]
    Full,
    /// Rewrite class attributes; keep the style block's own rules as written.
    AttributesOnly,
    /// Leave markup alone; only compile the style block.
    DirectivesOnly,
}

impl Mode {
    fn rewrites_attributes(self) -> bool {
        self != Mode::DirectivesOnly
    }

    fn compiles_directives(self) -> bool {
        self != Mode::AttributesOnly
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub filename: String,
    pub mode: Mode,
    pub include_base_styles: bool,
    pub include_global_styles: bool,
    pub include_plugin_styles: bool,
    pub ignore_dynamic_classes_warning: bool,
    pub source_map: bool,
    pub minify: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            filename: "Unknown.svelte".to_string(),
            mode: Mode::Full,
            include_base_styles: false,
            include_global_styles: true,
            include_plugin_styles: true,
            ignore_dynamic_classes_warning: false,
            source_map: false,
            minify: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Output {
    pub code: String,
    pub map: Option<SourceMap>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Rewrites `source`. `compiler` is only read; exclusions for the document's
/// own selectors go to a pass-local copy.
pub fn preprocess<C: UtilityCompiler>(
    compiler: &C,
    source: &str,
    options: &Options,
) -> Result<Output, PreprocessError> {
    let document = markup::parse(source)?;
    let file = SourceFile::new(&options.filename, source);
    let mut diagnostics = Vec::new();

    let style_content = document
        .style
        .map(|style| style.content.text(source))
        .unwrap_or_default();
    let parsed = css::parse(style_content, compiler, options.mode.compiles_directives());
    if let Some(style) = document.style {
        let (line, column) = file.location(style.start);
        for utility in &parsed.unresolved_apply {
            diagnostics.push(Diagnostic {
                kind: DiagnosticKind::UnknownApplyUtility {
                    utility: utility.clone(),
                },
                filename: options.filename.clone(),
                line,
                column,
            });
        }
    }

    let local_names = parsed.sheet.class_names();
    let mut resolved = parsed.applied.iter().cloned().collect::<BTreeSet<_>>();
    let mut sheet = match options.mode {
        Mode::AttributesOnly => StyleSheet::new(),
        Mode::Full | Mode::DirectivesOnly => parsed.sheet,
    };

    let mut edits = Vec::new();
    if options.mode.rewrites_attributes() {
        let scoped = compiler.with_excluded(&local_names);
        let rewritten = rewrite_markup(&scoped, &file, &document, options, &mut sheet)?;
        debug!(
            "{}: rewrote {} class attribute group(s)",
            options.filename, rewritten.groups
        );
        diagnostics.extend(rewritten.diagnostics);
        edits.extend(rewritten.edits);
        resolved.extend(rewritten.resolved);
    }

    sheet.extend(&compiler.preflight(
        source,
        &resolved,
        &PreflightOptions {
            include_base: options.include_base_styles,
            include_global: options.include_global_styles,
            include_plugins: options.include_plugin_styles,
        },
    ));

    edits.push(style_edit(source, document.style, options.mode, &sheet, options.minify));

    let map = apply_edits(&file, edits);
    let code = map.code();
    let source_map = options
        .source_map
        .then(|| map.to_source_map(&file, Some(&options.filename)));

    Ok(Output {
        code,
        map: source_map,
        diagnostics,
    })
}

struct MarkupEdits {
    edits: Vec<Edit>,
    groups: usize,
    resolved: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
}

fn rewrite_markup<C: UtilityCompiler>(
    compiler: &C,
    file: &SourceFile<'_>,
    document: &Document,
    options: &Options,
    sheet: &mut StyleSheet,
) -> Result<MarkupEdits, PreprocessError> {
    let prefix = compiler.config("prefix", DEFAULT_PREFIX);
    let variants = compiler
        .variants(VariantKind::Screen)
        .into_iter()
        .chain(compiler.variants(VariantKind::State))
        .collect::<BTreeSet<_>>();
    let patterns = (!options.ignore_dynamic_classes_warning).then(|| UtilityPatterns::new(compiler));
    let style_start = document.style.map(|style| style.start);

    let mut counter = PlaceholderCounter::for_source(file.text);
    let mut out = MarkupEdits {
        edits: Vec::new(),
        groups: 0,
        resolved: BTreeSet::new(),
        diagnostics: Vec::new(),
    };
    let mut failure: Option<PreprocessError> = None;

    markup::walk(document, &mut |element| {
        if failure.is_some() || Some(element.start) == style_start {
            return Walk::SkipChildren;
        }
        let group = match collect_group(file, element, &variants, &mut counter) {
            Ok(Some(group)) => group,
            Ok(None) => return Walk::Continue,
            Err(err) => {
                failure = Some(err);
                return Walk::SkipChildren;
            }
        };
        let compiled = compile_group(compiler, file, &group, &prefix, patterns.as_ref(), sheet);
        debug!(
            "<{}> at {}: {} resolved, {} ignored",
            element.name,
            element.start,
            compiled.result.resolved.len(),
            compiled.result.ignored.len()
        );
        out.edits.extend(reassemble(file, &group, &compiled.result));
        out.resolved.extend(compiled.result.resolved);
        out.resolved.extend(compiled.interpreted);
        out.diagnostics.extend(compiled.diagnostics);
        out.groups += 1;
        Walk::Continue
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

/// Replaces the existing style block's content, or appends a new block.
fn style_edit(
    source: &str,
    style: Option<StyleBlock>,
    mode: Mode,
    sheet: &StyleSheet,
    minify: bool,
) -> Edit {
    let generated = sheet.build(minify);
    let Some(style) = style else {
        return Edit::insert_at(
            source.len(),
            vec![Piece::Synthetic(format!("<style>{}</style>", generated))],
        );
    };

    let mut pieces = vec![Piece::Source(Span::new(style.start, style.content.start))];
    if mode == Mode::AttributesOnly {
        pieces.push(Piece::Source(style.content));
        if !generated.is_empty() {
            pieces.push(Piece::synthetic("\n"));
            pieces.push(Piece::Synthetic(generated));
        }
    } else {
        pieces.push(Piece::Synthetic(generated));
    }
    pieces.push(Piece::Source(Span::new(style.content.end, style.end)));
    Edit::replace(Span::new(style.start, style.end), pieces)
}

#[cfg(test)]
mod tests {
    use super::{Mode, Options, preprocess};
    use crate::compiler::Processor;
    use pretty_assertions::assert_eq;

    fn options() -> Options {
        Options {
            filename: "App.svelte".to_string(),
            ..Options::default()
        }
    }

    #[test]
    fn appends_style_block_when_missing() {
        let output = preprocess(&Processor::default(), "<p>hi</p>", &options())
            .expect("preprocess should succeed");
        assert_eq!(output.code, "<p>hi</p><style></style>");
        assert!(output.map.is_none());
    }

    #[test]
    fn keeps_style_tag_attributes() {
        let source = r#"<style lang="postcss">.a { color: red; }</style><p class="p-4">x</p>"#;
        let output = preprocess(&Processor::default(), source, &options())
            .expect("preprocess should succeed");
        assert!(output.code.starts_with("<style lang=\"postcss\">.a {\n  color: red;\n}\n"));
        assert_eq!(output.code.matches("<style").count(), 1);
    }

    #[test]
    fn attributes_only_keeps_style_rules_verbatim() {
        let source = "<style>.a { @apply p-4; }</style><p class=\"m-2\">x</p>";
        let output = preprocess(
            &Processor::default(),
            source,
            &Options {
                mode: Mode::AttributesOnly,
                ..options()
            },
        )
        .expect("preprocess should succeed");
        assert!(output.code.starts_with("<style>.a { @apply p-4; }\n."));
        assert!(output.code.contains("margin: 0.5rem;"));
        assert!(!output.code.contains("padding: 1rem;"));
    }

    #[test]
    fn unknown_apply_utilities_are_reported() {
        let source = "<p>x</p>\n<style>.a { @apply nope p-4; }</style>";
        let output = preprocess(&Processor::default(), source, &options())
            .expect("preprocess should succeed");
        assert_eq!(output.diagnostics.len(), 1);
        assert_eq!(
            output.diagnostics[0].to_string(),
            "App.svelte:2:1: unknown utility in @apply: nope"
        );
    }

    #[test]
    fn parse_errors_abort_the_pass() {
        assert!(preprocess(&Processor::default(), "<div><p></div>", &options()).is_err());
    }

    #[test]
    fn mode_names_deserialize_in_kebab_case() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            mode: Mode,
        }
        let parsed: Wrapper = toml::from_str("mode = \"directives-only\"").expect("valid toml");
        assert_eq!(parsed.mode, Mode::DirectivesOnly);
    }
}
