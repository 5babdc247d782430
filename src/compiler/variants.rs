/// Selector templates for state variants; `&` is replaced with the selector.
pub const STATE_VARIANTS: [(&str, &str); 14] = [
    ("hover", "&:hover"),
    ("focus", "&:focus"),
    ("active", "&:active"),
    ("visited", "&:visited"),
    ("disabled", "&:disabled"),
    ("checked", "&:checked"),
    ("first", "&:first-child"),
    ("last", "&:last-child"),
    ("odd", "&:nth-child(odd)"),
    ("even", "&:nth-child(even)"),
    ("focus-within", "&:focus-within"),
    ("focus-visible", "&:focus-visible"),
    ("group-hover", ".group:hover &"),
    ("placeholder", "&::placeholder"),
];

pub fn default_screens() -> Vec<(String, String)> {
    vec![
        ("sm".to_string(), "640px".to_string()),
        ("md".to_string(), "768px".to_string()),
        ("lg".to_string(), "1024px".to_string()),
        ("xl".to_string(), "1280px".to_string()),
        ("2xl".to_string(), "1536px".to_string()),
    ]
}

pub fn state_selector(variant: &str, selector: &str) -> Option<String> {
    STATE_VARIANTS
        .iter()
        .find(|(name, _)| *name == variant)
        .map(|(_, template)| template.replace('&', selector))
}

/// Splits `sm:hover:bg-white` into `(["sm", "hover"], "bg-white")`.
/// Colons inside brackets or parentheses do not split.
pub fn split_variants(class: &str) -> (Vec<&str>, &str) {
    let mut paren_depth = 0usize;
    let mut bracket_depth = 0usize;
    let mut split_indices = Vec::new();

    for (idx, ch) in class.char_indices() {
        match ch {
            '(' => paren_depth += 1,
            ')' => paren_depth = paren_depth.saturating_sub(1),
            '[' => bracket_depth += 1,
            ']' => bracket_depth = bracket_depth.saturating_sub(1),
            ':' if paren_depth == 0 && bracket_depth == 0 => split_indices.push(idx),
            _ => {}
        }
    }

    if split_indices.is_empty() {
        return (Vec::new(), class);
    }
    let mut variants = Vec::new();
    let mut start = 0usize;
    for idx in split_indices {
        variants.push(&class[start..idx]);
        start = idx + 1;
    }
    (variants, &class[start..])
}

/// Unfolds variant groups: `sm:hover:(a b) c` becomes
/// `["sm:hover:a", "sm:hover:b", "c"]`. Groups may nest.
pub fn expand_groups(classes: &str) -> Vec<String> {
    let mut out = Vec::new();
    expand_into(classes, "", &mut out);
    out
}

fn expand_into(classes: &str, prefix: &str, out: &mut Vec<String>) {
    let mut depth = 0usize;
    let mut token_start = None;
    for (idx, ch) in classes.char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        if ch.is_whitespace() && depth == 0 {
            if let Some(start) = token_start.take() {
                push_token(&classes[start..idx], prefix, out);
            }
            continue;
        }
        if token_start.is_none() {
            token_start = Some(idx);
        }
    }
    if let Some(start) = token_start {
        push_token(&classes[start..], prefix, out);
    }
}

fn push_token(token: &str, prefix: &str, out: &mut Vec<String>) {
    if let Some(open) = group_open_index(token) {
        let head = &token[..open];
        let inner = &token[open + 1..token.len() - 1];
        expand_into(inner, &format!("{}{}", prefix, head), out);
        return;
    }
    out.push(format!("{}{}", prefix, token));
}

fn group_open_index(token: &str) -> Option<usize> {
    if !token.ends_with(')') {
        return None;
    }
    let open = token.find('(')?;
    if open != 0 && !token[..open].ends_with(':') {
        return None;
    }
    if token[..open].contains('[') {
        return None;
    }
    Some(open)
}
