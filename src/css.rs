//! Stylesheet accumulator.
//!
//! Rules are kept in insertion order and keyed by `(media, selector)`; adding a
//! rule that is already present merges its declarations instead of emitting a
//! second block, so extending with the same sheet twice is a no-op.

use crate::compiler::UtilityCompiler;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
}

impl Declaration {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRule {
    /// Full at-rule header, e.g. `@media (min-width: 640px)`.
    pub media: Option<String>,
    pub selector: String,
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Style(StyleRule),
    /// At-rules kept verbatim (`@keyframes`, `@font-face`, `@import`, ...).
    Raw(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleSheet {
    rules: Vec<Rule>,
}

/// A stylesheet parsed from a document's style block together with the
/// `@apply` utilities it used, split by whether the compiler resolved them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedStyleSheet {
    pub sheet: StyleSheet,
    pub applied: Vec<String>,
    pub unresolved_apply: Vec<String>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn add_declarations(
        &mut self,
        media: Option<&str>,
        selector: &str,
        declarations: &[Declaration],
    ) {
        self.add_rule(Rule::Style(StyleRule {
            media: media.map(str::to_string),
            selector: selector.to_string(),
            declarations: declarations.to_vec(),
        }));
    }

    pub fn add_rule(&mut self, rule: Rule) {
        match rule {
            Rule::Raw(text) => {
                let text = text.trim().to_string();
                if !self.rules.iter().any(|existing| *existing == Rule::Raw(text.clone())) {
                    self.rules.push(Rule::Raw(text));
                }
            }
            Rule::Style(rule) => {
                let existing = self.rules.iter_mut().find_map(|existing| match existing {
                    Rule::Style(existing)
                        if existing.media == rule.media && existing.selector == rule.selector =>
                    {
                        Some(existing)
                    }
                    _ => None,
                });
                match existing {
                    Some(existing) => merge_declarations(&mut existing.declarations, rule.declarations),
                    None => self.rules.push(Rule::Style(rule)),
                }
            }
        }
    }

    pub fn extend(&mut self, other: &StyleSheet) {
        for rule in &other.rules {
            self.add_rule(rule.clone());
        }
    }

    /// Every class name used as a selector in this sheet.
    pub fn class_names(&self) -> BTreeSet<String> {
        self.rules
            .iter()
            .filter_map(|rule| match rule {
                Rule::Style(rule) => Some(rule),
                Rule::Raw(_) => None,
            })
            .flat_map(|rule| extract_class_names(&rule.selector))
            .collect()
    }

    pub fn build(&self, minify: bool) -> String {
        let mut blocks = Vec::new();
        let mut media_order: Vec<&str> = Vec::new();

        for rule in &self.rules {
            match rule {
                Rule::Raw(text) => blocks.push(text.clone()),
                Rule::Style(rule) => match rule.media.as_deref() {
                    None => {
                        if let Some(block) = build_style_rule(rule, 0, minify) {
                            blocks.push(block);
                        }
                    }
                    Some(media) => {
                        if !media_order.contains(&media) {
                            media_order.push(media);
                        }
                    }
                },
            }
        }

        for media in media_order {
            let inner = self
                .rules
                .iter()
                .filter_map(|rule| match rule {
                    Rule::Style(rule) if rule.media.as_deref() == Some(media) => {
                        build_style_rule(rule, 1, minify)
                    }
                    _ => None,
                })
                .collect::<Vec<_>>();
            if inner.is_empty() {
                continue;
            }
            if minify {
                blocks.push(format!("{}{{{}}}", media, inner.join("")));
            } else {
                blocks.push(format!("{} {{\n{}\n}}", media, inner.join("\n")));
            }
        }

        if minify {
            blocks.join("")
        } else {
            blocks.join("\n")
        }
    }
}

fn merge_declarations(target: &mut Vec<Declaration>, incoming: Vec<Declaration>) {
    for declaration in incoming {
        match target
            .iter_mut()
            .find(|existing| existing.property == declaration.property)
        {
            Some(existing) => existing.value = declaration.value,
            None => target.push(declaration),
        }
    }
}

fn build_style_rule(rule: &StyleRule, depth: usize, minify: bool) -> Option<String> {
    if rule.declarations.is_empty() {
        return None;
    }
    if minify {
        let body = rule
            .declarations
            .iter()
            .map(|decl| format!("{}:{}", decl.property, decl.value))
            .collect::<Vec<_>>()
            .join(";");
        return Some(format!("{}{{{}}}", rule.selector, body));
    }
    let indent = "  ".repeat(depth);
    let body = rule
        .declarations
        .iter()
        .map(|decl| format!("{}  {}: {};", indent, decl.property, decl.value))
        .collect::<Vec<_>>()
        .join("\n");
    Some(format!("{}{} {{\n{}\n{}}}", indent, rule.selector, body, indent))
}

/// Escapes a class name for use in a `.class` selector.
pub fn escape_class_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (idx, ch) in name.char_indices() {
        if idx == 0 && ch.is_ascii_digit() {
            out.push_str(&format!("\\3{} ", ch));
            continue;
        }
        if !(ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || !ch.is_ascii()) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn extract_class_names(selector: &str) -> Vec<String> {
    let bytes = selector.as_bytes();
    let mut names = Vec::new();
    let mut idx = 0usize;

    while idx < bytes.len() {
        if bytes[idx] == b'.' && (idx == 0 || bytes[idx - 1] != b'\\') {
            let mut name = String::new();
            idx += 1;
            while idx < bytes.len() {
                let ch = bytes[idx];
                if ch == b'\\' && idx + 1 < bytes.len() {
                    let next = selector[idx + 1..].chars().next().unwrap_or_default();
                    name.push(next);
                    idx += 1 + next.len_utf8();
                    continue;
                }
                if ch.is_ascii_alphanumeric() || ch == b'-' || ch == b'_' || ch >= 0x80 {
                    let next = selector[idx..].chars().next().unwrap_or_default();
                    name.push(next);
                    idx += next.len_utf8();
                    continue;
                }
                break;
            }
            if !name.is_empty() {
                names.push(name);
            }
            continue;
        }
        idx += 1;
    }

    names
}

/// Parses a style block. With `compile_directives`, `@apply`, `@screen` and
/// `@variants` are expanded through `compiler`; otherwise they are left out
/// of the model (`@apply`) or kept verbatim (`@screen`, `@variants`).
pub fn parse<C: UtilityCompiler>(
    css: &str,
    compiler: &C,
    compile_directives: bool,
) -> ParsedStyleSheet {
    let stripped = strip_comments(css);
    let mut parser = CssParser {
        compiler,
        compile_directives,
        parsed: ParsedStyleSheet::default(),
    };
    parser.parse_rules(&stripped, None, &[]);
    parser.parsed
}

struct CssParser<'c, C> {
    compiler: &'c C,
    compile_directives: bool,
    parsed: ParsedStyleSheet,
}

impl<C: UtilityCompiler> CssParser<'_, C> {
    fn parse_rules(&mut self, css: &str, media: Option<&str>, variants: &[String]) {
        let mut cursor = 0usize;
        while cursor < css.len() {
            let rest = &css[cursor..];
            let trimmed = rest.trim_start();
            if trimmed.is_empty() {
                break;
            }
            cursor += rest.len() - trimmed.len();

            let Some(rel_stop) = css[cursor..].find(['{', ';']) else {
                break;
            };
            let stop = cursor + rel_stop;
            let prelude = css[cursor..stop].trim();

            if css.as_bytes()[stop] == b';' {
                if prelude.starts_with('@') {
                    self.parsed
                        .sheet
                        .add_rule(Rule::Raw(format!("{};", prelude)));
                }
                cursor = stop + 1;
                continue;
            }

            let Some(close) = find_matching_brace(css, stop) else {
                break;
            };
            let body = &css[stop + 1..close];
            let full = &css[cursor..=close];
            cursor = close + 1;

            if let Some(at_rule) = prelude.strip_prefix('@') {
                self.parse_at_rule(at_rule, body, full, media, variants);
                continue;
            }

            let declarations = self.parse_declarations(body);
            for selector in self.expand_selector(prelude, variants) {
                self.parsed
                    .sheet
                    .add_declarations(media, &selector, &declarations);
            }
        }
    }

    fn parse_at_rule(
        &mut self,
        at_rule: &str,
        body: &str,
        full: &str,
        media: Option<&str>,
        variants: &[String],
    ) {
        let (name, params) = at_rule
            .split_once(char::is_whitespace)
            .map(|(name, params)| (name, params.trim()))
            .unwrap_or((at_rule, ""));
        match name {
            "media" => {
                let header = format!("@media {}", params);
                self.parse_rules(body, Some(&header), variants);
            }
            "screen" if self.compile_directives => match self.compiler.screen_query(params) {
                Some(query) => {
                    let header = format!("@media {}", query);
                    self.parse_rules(body, Some(&header), variants);
                }
                None => self.parsed.sheet.add_rule(Rule::Raw(full.to_string())),
            },
            "variants" if self.compile_directives => {
                let requested = params
                    .split(',')
                    .map(str::trim)
                    .filter(|variant| !variant.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>();
                self.parse_rules(body, media, &requested);
            }
            _ => self.parsed.sheet.add_rule(Rule::Raw(full.to_string())),
        }
    }

    fn expand_selector(&self, selector: &str, variants: &[String]) -> Vec<String> {
        if variants.is_empty() {
            return vec![selector.to_string()];
        }
        variants
            .iter()
            .filter_map(|variant| {
                let parts = selector
                    .split(',')
                    .map(|part| self.compiler.state_selector(variant, part.trim()))
                    .collect::<Option<Vec<_>>>()?;
                Some(parts.join(", "))
            })
            .collect()
    }

    fn parse_declarations(&mut self, body: &str) -> Vec<Declaration> {
        let mut declarations = Vec::new();
        for item in split_declarations(body) {
            if let Some(utilities) = item.strip_prefix("@apply") {
                if !self.compile_directives {
                    continue;
                }
                for utility in utilities.split_whitespace() {
                    match self.compiler.declarations(utility) {
                        Some(resolved) => {
                            merge_declarations(&mut declarations, resolved);
                            self.parsed.applied.push(utility.to_string());
                        }
                        None => self.parsed.unresolved_apply.push(utility.to_string()),
                    }
                }
                continue;
            }
            if let Some((property, value)) = item.split_once(':') {
                merge_declarations(
                    &mut declarations,
                    vec![Declaration::new(property.trim(), value.trim())],
                );
            }
        }
        declarations
    }
}

fn split_declarations(body: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0usize;
    for (idx, ch) in body.char_indices() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                items.push(body[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push(body[start..].trim());
    items.into_iter().filter(|item| !item.is_empty()).collect()
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut cursor = 0usize;
    while let Some(rel_start) = css[cursor..].find("/*") {
        let start = cursor + rel_start;
        out.push_str(&css[cursor..start]);
        match css[start + 2..].find("*/") {
            Some(rel_end) => cursor = start + 2 + rel_end + 2,
            None => return out,
        }
    }
    out.push_str(&css[cursor..]);
    out
}

fn find_matching_brace(css: &str, open_idx: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (rel_idx, ch) in css[open_idx..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open_idx + rel_idx);
                }
            }
            _ => {}
        }
    }
    None
}
