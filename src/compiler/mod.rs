//! Utility-class compiler.
//!
//! `UtilityCompiler` is the boundary the rewrite pass talks to; `Processor` is
//! the bundled implementation backed by the tables in `utilities` and
//! `variants`.

pub mod utilities;
pub mod variants;

use crate::css::{Declaration, Rule, StyleSheet, escape_class_name};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_PREFIX: &str = "windi-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileResult {
    /// Generated class backing every resolved token, `None` when nothing resolved.
    pub class_name: Option<String>,
    pub resolved: Vec<String>,
    pub ignored: Vec<String>,
    pub style_sheet: StyleSheet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretResult {
    pub success: Vec<String>,
    pub ignored: Vec<String>,
    pub style_sheet: StyleSheet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Screen,
    State,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreflightOptions {
    pub include_base: bool,
    pub include_global: bool,
    pub include_plugins: bool,
}

pub trait UtilityCompiler {
    /// Folds every recognised token of `classes` into one generated class.
    fn compile(&self, classes: &str, prefix: &str) -> CompileResult;
    /// Emits one rule per recognised token, keyed by the token itself.
    fn interpret(&self, classes: &str) -> InterpretResult;
    /// Declarations of a single variant-free utility, used by `@apply`.
    fn declarations(&self, utility: &str) -> Option<Vec<Declaration>>;
    fn screen_query(&self, screen: &str) -> Option<String>;
    fn state_selector(&self, variant: &str, selector: &str) -> Option<String>;
    fn static_utilities(&self) -> Vec<String>;
    fn dynamic_utilities(&self) -> Vec<String>;
    fn variants(&self, kind: VariantKind) -> Vec<String>;
    /// Base and global resets for the tags used in `document`, plus the
    /// keyframes needed by the `resolved` utility tokens.
    fn preflight(
        &self,
        document: &str,
        resolved: &BTreeSet<String>,
        options: &PreflightOptions,
    ) -> StyleSheet;
    fn config(&self, key: &str, default: &str) -> String;
    /// Returns a new compiler that never resolves any of `names`.
    fn with_excluded(&self, names: &BTreeSet<String>) -> Self
    where
        Self: Sized;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub prefix: Option<String>,
    /// Replaces the default screens when non-empty.
    pub screens: Vec<(String, String)>,
    /// Extra colors as `family -> shade -> value`; shade `DEFAULT` maps to `family`.
    pub colors: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    prefix: String,
    screens: Vec<(String, String)>,
    palette: BTreeMap<String, String>,
    excluded: BTreeSet<String>,
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(&ProcessorConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedToken {
    media: Option<String>,
    screen_rank: usize,
    states: Vec<String>,
    declarations: Vec<Declaration>,
}

impl Processor {
    pub fn new(config: &ProcessorConfig) -> Self {
        let screens = if config.screens.is_empty() {
            variants::default_screens()
        } else {
            config.screens.clone()
        };
        let mut palette = utilities::default_palette();
        for (family, shades) in &config.colors {
            for (shade, value) in shades {
                let key = if shade == "DEFAULT" {
                    family.clone()
                } else {
                    format!("{}-{}", family, shade)
                };
                palette.insert(key, value.clone());
            }
        }
        Self {
            prefix: config
                .prefix
                .clone()
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            screens,
            palette,
            excluded: BTreeSet::new(),
        }
    }

    pub fn excluded(&self) -> &BTreeSet<String> {
        &self.excluded
    }

    fn resolve_token(&self, token: &str) -> Option<ResolvedToken> {
        if self.excluded.contains(token) {
            return None;
        }
        let (variants, utility) = variants::split_variants(token);
        if self.excluded.contains(utility) {
            return None;
        }
        let mut media = None;
        let mut screen_rank = 0usize;
        let mut states = Vec::new();
        for variant in variants {
            if let Some(idx) = self.screens.iter().position(|(name, _)| name == variant) {
                if media.is_some() {
                    return None;
                }
                media = Some(format!("@media (min-width: {})", self.screens[idx].1));
                screen_rank = idx + 1;
                continue;
            }
            if variants::state_selector(variant, "&").is_some() {
                states.push(variant.to_string());
                continue;
            }
            return None;
        }
        let declarations = utilities::resolve(utility, &self.palette)?;
        Some(ResolvedToken {
            media,
            screen_rank,
            states,
            declarations,
        })
    }

    fn selector_for(&self, class_name: &str, states: &[String]) -> String {
        states
            .iter()
            .fold(format!(".{}", escape_class_name(class_name)), |selector, state| {
                variants::state_selector(state, &selector).unwrap_or(selector)
            })
    }
}

impl UtilityCompiler for Processor {
    fn compile(&self, classes: &str, prefix: &str) -> CompileResult {
        let mut resolved = Vec::new();
        let mut ignored = Vec::new();
        let mut groups: Vec<ResolvedToken> = Vec::new();

        for token in variants::expand_groups(classes) {
            let Some(token_rule) = self.resolve_token(&token) else {
                ignored.push(token);
                continue;
            };
            resolved.push(token);
            match groups
                .iter_mut()
                .find(|group| group.media == token_rule.media && group.states == token_rule.states)
            {
                Some(group) => group.declarations.extend(token_rule.declarations),
                None => groups.push(token_rule),
            }
        }

        let mut style_sheet = StyleSheet::new();
        if resolved.is_empty() {
            return CompileResult {
                class_name: None,
                resolved,
                ignored,
                style_sheet,
            };
        }

        let class_name = format!("{}{}", prefix, hash_classes(&resolved.join(" ")));
        groups.sort_by_key(|group| (group.screen_rank, group.states.len()));
        for group in &groups {
            let selector = self.selector_for(&class_name, &group.states);
            style_sheet.add_declarations(group.media.as_deref(), &selector, &group.declarations);
        }

        CompileResult {
            class_name: Some(class_name),
            resolved,
            ignored,
            style_sheet,
        }
    }

    fn interpret(&self, classes: &str) -> InterpretResult {
        let mut success = Vec::new();
        let mut ignored = Vec::new();
        let mut style_sheet = StyleSheet::new();

        for token in variants::expand_groups(classes) {
            match self.resolve_token(&token) {
                Some(token_rule) => {
                    let selector = self.selector_for(&token, &token_rule.states);
                    style_sheet.add_declarations(
                        token_rule.media.as_deref(),
                        &selector,
                        &token_rule.declarations,
                    );
                    success.push(token);
                }
                None => ignored.push(token),
            }
        }

        InterpretResult {
            success,
            ignored,
            style_sheet,
        }
    }

    fn declarations(&self, utility: &str) -> Option<Vec<Declaration>> {
        let token_rule = self.resolve_token(utility)?;
        if token_rule.media.is_some() || !token_rule.states.is_empty() {
            return None;
        }
        Some(token_rule.declarations)
    }

    fn screen_query(&self, screen: &str) -> Option<String> {
        self.screens
            .iter()
            .find(|(name, _)| name == screen)
            .map(|(_, width)| format!("(min-width: {})", width))
    }

    fn state_selector(&self, variant: &str, selector: &str) -> Option<String> {
        variants::state_selector(variant, selector)
    }

    fn static_utilities(&self) -> Vec<String> {
        utilities::static_names()
    }

    fn dynamic_utilities(&self) -> Vec<String> {
        utilities::dynamic_prefixes()
    }

    fn variants(&self, kind: VariantKind) -> Vec<String> {
        match kind {
            VariantKind::Screen => self.screens.iter().map(|(name, _)| name.clone()).collect(),
            VariantKind::State => variants::STATE_VARIANTS
                .iter()
                .map(|(name, _)| name.to_string())
                .collect(),
        }
    }

    fn preflight(
        &self,
        document: &str,
        resolved: &BTreeSet<String>,
        options: &PreflightOptions,
    ) -> StyleSheet {
        let mut sheet = StyleSheet::new();
        if options.include_base {
            if options.include_global {
                sheet.add_declarations(
                    None,
                    "*, ::before, ::after",
                    &[
                        Declaration::new("box-sizing", "border-box"),
                        Declaration::new("border-width", "0"),
                        Declaration::new("border-style", "solid"),
                        Declaration::new("border-color", "#e5e7eb"),
                    ],
                );
            }
            let tags = used_tag_names(document);
            for (tag, declarations) in BASE_RULES {
                if tags.contains(*tag) {
                    let declarations = declarations
                        .iter()
                        .map(|(property, value)| Declaration::new(*property, *value))
                        .collect::<Vec<_>>();
                    sheet.add_declarations(None, tag, &declarations);
                }
            }
        }
        if options.include_plugins {
            let used = resolved
                .iter()
                .map(|token| variants::split_variants(token).1)
                .collect::<BTreeSet<_>>();
            for utility in utilities::keyframe_utilities() {
                if !used.contains(utility) {
                    continue;
                }
                if let Some(keyframes) = utilities::keyframes_for(utility) {
                    sheet.add_rule(Rule::Raw(keyframes.to_string()));
                }
            }
        }
        sheet
    }

    fn config(&self, key: &str, default: &str) -> String {
        match key {
            "prefix" => self.prefix.clone(),
            "separator" => ":".to_string(),
            _ => default.to_string(),
        }
    }

    fn with_excluded(&self, names: &BTreeSet<String>) -> Self {
        let mut excluded = self.excluded.clone();
        excluded.extend(names.iter().cloned());
        Self {
            excluded,
            ..self.clone()
        }
    }
}

const BASE_RULES: &[(&str, &[(&str, &str)])] = &[
    (
        "html",
        &[
            ("line-height", "1.5"),
            ("-webkit-text-size-adjust", "100%"),
            ("font-family", "ui-sans-serif, system-ui, -apple-system, sans-serif"),
        ],
    ),
    ("body", &[("margin", "0"), ("font-family", "inherit"), ("line-height", "inherit")]),
    ("h1", &[("font-size", "inherit"), ("font-weight", "inherit"), ("margin", "0")]),
    ("h2", &[("font-size", "inherit"), ("font-weight", "inherit"), ("margin", "0")]),
    ("h3", &[("font-size", "inherit"), ("font-weight", "inherit"), ("margin", "0")]),
    ("h4", &[("font-size", "inherit"), ("font-weight", "inherit"), ("margin", "0")]),
    ("h5", &[("font-size", "inherit"), ("font-weight", "inherit"), ("margin", "0")]),
    ("h6", &[("font-size", "inherit"), ("font-weight", "inherit"), ("margin", "0")]),
    ("p", &[("margin", "0")]),
    ("blockquote", &[("margin", "0")]),
    ("a", &[("color", "inherit"), ("text-decoration", "inherit")]),
    (
        "button",
        &[
            ("font-family", "inherit"),
            ("font-size", "100%"),
            ("line-height", "inherit"),
            ("color", "inherit"),
            ("margin", "0"),
            ("padding", "0"),
            ("background-color", "transparent"),
            ("cursor", "pointer"),
        ],
    ),
    (
        "input",
        &[
            ("font-family", "inherit"),
            ("font-size", "100%"),
            ("line-height", "inherit"),
            ("color", "inherit"),
            ("margin", "0"),
        ],
    ),
    (
        "textarea",
        &[
            ("font-family", "inherit"),
            ("font-size", "100%"),
            ("line-height", "inherit"),
            ("color", "inherit"),
            ("margin", "0"),
            ("resize", "vertical"),
        ],
    ),
    ("img", &[("display", "block"), ("vertical-align", "middle"), ("max-width", "100%"), ("height", "auto")]),
    ("svg", &[("display", "block"), ("vertical-align", "middle")]),
    ("video", &[("display", "block"), ("vertical-align", "middle"), ("max-width", "100%"), ("height", "auto")]),
    ("ul", &[("list-style", "none"), ("margin", "0"), ("padding", "0")]),
    ("ol", &[("list-style", "none"), ("margin", "0"), ("padding", "0")]),
    ("hr", &[("height", "0"), ("color", "inherit"), ("border-top-width", "1px")]),
    ("table", &[("text-indent", "0"), ("border-color", "inherit"), ("border-collapse", "collapse")]),
];

fn used_tag_names(document: &str) -> BTreeSet<String> {
    let bytes = document.as_bytes();
    let mut tags = BTreeSet::new();
    for (idx, _) in document.match_indices('<') {
        let start = idx + 1;
        let mut end = start;
        while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'-') {
            end += 1;
        }
        if end > start && bytes[start].is_ascii_alphabetic() {
            tags.insert(document[start..end].to_ascii_lowercase());
        }
    }
    tags
}

/// FNV-1a over the class list, rendered in base 36.
pub fn hash_classes(classes: &str) -> String {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in classes.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    let mut digits = Vec::new();
    loop {
        let digit = (hash % 36) as u8;
        digits.push(if digit < 10 {
            b'0' + digit
        } else {
            b'a' + digit - 10
        });
        hash /= 36;
        if hash == 0 {
            break;
        }
    }
    digits.iter().rev().map(|digit| *digit as char).collect()
}
