use crate::css::Declaration;
use std::collections::BTreeMap;
use std::sync::OnceLock;

type StaticTable = BTreeMap<&'static str, &'static [(&'static str, &'static str)]>;

const STATIC_UTILITIES: &[(&str, &[(&str, &str)])] = &[
    ("block", &[("display", "block")]),
    ("inline-block", &[("display", "inline-block")]),
    ("inline", &[("display", "inline")]),
    ("flex", &[("display", "flex")]),
    ("inline-flex", &[("display", "inline-flex")]),
    ("grid", &[("display", "grid")]),
    ("inline-grid", &[("display", "inline-grid")]),
    ("table", &[("display", "table")]),
    ("contents", &[("display", "contents")]),
    ("hidden", &[("display", "none")]),
    ("static", &[("position", "static")]),
    ("fixed", &[("position", "fixed")]),
    ("absolute", &[("position", "absolute")]),
    ("relative", &[("position", "relative")]),
    ("sticky", &[("position", "sticky")]),
    ("container", &[("width", "100%")]),
    ("flex-row", &[("flex-direction", "row")]),
    ("flex-row-reverse", &[("flex-direction", "row-reverse")]),
    ("flex-col", &[("flex-direction", "column")]),
    ("flex-col-reverse", &[("flex-direction", "column-reverse")]),
    ("flex-wrap", &[("flex-wrap", "wrap")]),
    ("flex-nowrap", &[("flex-wrap", "nowrap")]),
    ("flex-1", &[("flex", "1 1 0%")]),
    ("flex-auto", &[("flex", "1 1 auto")]),
    ("flex-none", &[("flex", "none")]),
    ("flex-grow", &[("flex-grow", "1")]),
    ("flex-shrink", &[("flex-shrink", "1")]),
    ("items-start", &[("align-items", "flex-start")]),
    ("items-center", &[("align-items", "center")]),
    ("items-end", &[("align-items", "flex-end")]),
    ("items-baseline", &[("align-items", "baseline")]),
    ("items-stretch", &[("align-items", "stretch")]),
    ("justify-start", &[("justify-content", "flex-start")]),
    ("justify-center", &[("justify-content", "center")]),
    ("justify-end", &[("justify-content", "flex-end")]),
    ("justify-between", &[("justify-content", "space-between")]),
    ("justify-around", &[("justify-content", "space-around")]),
    ("justify-evenly", &[("justify-content", "space-evenly")]),
    ("font-thin", &[("font-weight", "100")]),
    ("font-extralight", &[("font-weight", "200")]),
    ("font-light", &[("font-weight", "300")]),
    ("font-normal", &[("font-weight", "400")]),
    ("font-medium", &[("font-weight", "500")]),
    ("font-semibold", &[("font-weight", "600")]),
    ("font-bold", &[("font-weight", "700")]),
    ("font-extrabold", &[("font-weight", "800")]),
    ("font-black", &[("font-weight", "900")]),
    (
        "font-sans",
        &[(
            "font-family",
            "ui-sans-serif, system-ui, -apple-system, \"Segoe UI\", Roboto, \"Helvetica Neue\", Arial, sans-serif",
        )],
    ),
    (
        "font-mono",
        &[(
            "font-family",
            "ui-monospace, SFMono-Regular, Menlo, Monaco, Consolas, \"Liberation Mono\", monospace",
        )],
    ),
    ("text-xs", &[("font-size", "0.75rem"), ("line-height", "1rem")]),
    ("text-sm", &[("font-size", "0.875rem"), ("line-height", "1.25rem")]),
    ("text-base", &[("font-size", "1rem"), ("line-height", "1.5rem")]),
    ("text-lg", &[("font-size", "1.125rem"), ("line-height", "1.75rem")]),
    ("text-xl", &[("font-size", "1.25rem"), ("line-height", "1.75rem")]),
    ("text-2xl", &[("font-size", "1.5rem"), ("line-height", "2rem")]),
    ("text-3xl", &[("font-size", "1.875rem"), ("line-height", "2.25rem")]),
    ("text-4xl", &[("font-size", "2.25rem"), ("line-height", "2.5rem")]),
    ("text-5xl", &[("font-size", "3rem"), ("line-height", "1")]),
    ("text-6xl", &[("font-size", "3.75rem"), ("line-height", "1")]),
    ("text-left", &[("text-align", "left")]),
    ("text-center", &[("text-align", "center")]),
    ("text-right", &[("text-align", "right")]),
    ("text-justify", &[("text-align", "justify")]),
    ("italic", &[("font-style", "italic")]),
    ("not-italic", &[("font-style", "normal")]),
    ("underline", &[("text-decoration", "underline")]),
    ("line-through", &[("text-decoration", "line-through")]),
    ("no-underline", &[("text-decoration", "none")]),
    ("uppercase", &[("text-transform", "uppercase")]),
    ("lowercase", &[("text-transform", "lowercase")]),
    ("capitalize", &[("text-transform", "capitalize")]),
    ("normal-case", &[("text-transform", "none")]),
    (
        "truncate",
        &[
            ("overflow", "hidden"),
            ("text-overflow", "ellipsis"),
            ("white-space", "nowrap"),
        ],
    ),
    ("whitespace-normal", &[("white-space", "normal")]),
    ("whitespace-nowrap", &[("white-space", "nowrap")]),
    ("whitespace-pre", &[("white-space", "pre")]),
    (
        "antialiased",
        &[
            ("-webkit-font-smoothing", "antialiased"),
            ("-moz-osx-font-smoothing", "grayscale"),
        ],
    ),
    ("overflow-auto", &[("overflow", "auto")]),
    ("overflow-hidden", &[("overflow", "hidden")]),
    ("overflow-visible", &[("overflow", "visible")]),
    ("overflow-scroll", &[("overflow", "scroll")]),
    ("cursor-pointer", &[("cursor", "pointer")]),
    ("cursor-default", &[("cursor", "default")]),
    ("cursor-not-allowed", &[("cursor", "not-allowed")]),
    ("select-none", &[("user-select", "none")]),
    ("pointer-events-none", &[("pointer-events", "none")]),
    ("rounded", &[("border-radius", "0.25rem")]),
    ("rounded-none", &[("border-radius", "0px")]),
    ("rounded-sm", &[("border-radius", "0.125rem")]),
    ("rounded-md", &[("border-radius", "0.375rem")]),
    ("rounded-lg", &[("border-radius", "0.5rem")]),
    ("rounded-xl", &[("border-radius", "0.75rem")]),
    ("rounded-2xl", &[("border-radius", "1rem")]),
    ("rounded-full", &[("border-radius", "9999px")]),
    ("border", &[("border-width", "1px")]),
    (
        "shadow",
        &[(
            "box-shadow",
            "0 1px 3px 0 rgba(0, 0, 0, 0.1), 0 1px 2px 0 rgba(0, 0, 0, 0.06)",
        )],
    ),
    ("shadow-none", &[("box-shadow", "none")]),
    ("w-full", &[("width", "100%")]),
    ("w-screen", &[("width", "100vw")]),
    ("h-full", &[("height", "100%")]),
    ("h-screen", &[("height", "100vh")]),
    ("min-h-screen", &[("min-height", "100vh")]),
    ("min-h-full", &[("min-height", "100%")]),
    ("min-w-full", &[("min-width", "100%")]),
    ("animate-none", &[("animation", "none")]),
    ("animate-spin", &[("animation", "spin 1s linear infinite")]),
    (
        "animate-ping",
        &[("animation", "ping 1s cubic-bezier(0, 0, 0.2, 1) infinite")],
    ),
    (
        "animate-pulse",
        &[("animation", "pulse 2s cubic-bezier(0.4, 0, 0.6, 1) infinite")],
    ),
    ("animate-bounce", &[("animation", "bounce 1s infinite")]),
];

const KEYFRAMES: [(&str, &str); 4] = [
    (
        "animate-spin",
        "@keyframes spin {\n  from {\n    transform: rotate(0deg);\n  }\n  to {\n    transform: rotate(360deg);\n  }\n}",
    ),
    (
        "animate-ping",
        "@keyframes ping {\n  75%, 100% {\n    transform: scale(2);\n    opacity: 0;\n  }\n}",
    ),
    (
        "animate-pulse",
        "@keyframes pulse {\n  0%, 100% {\n    opacity: 1;\n  }\n  50% {\n    opacity: .5;\n  }\n}",
    ),
    (
        "animate-bounce",
        "@keyframes bounce {\n  0%, 100% {\n    transform: translateY(-25%);\n    animation-timing-function: cubic-bezier(0.8, 0, 1, 1);\n  }\n  50% {\n    transform: none;\n    animation-timing-function: cubic-bezier(0, 0, 0.2, 1);\n  }\n}",
    ),
];

/// Prefixes of utilities whose value part is computed, e.g. `p-4`, `bg-red-500`.
pub const DYNAMIC_PREFIXES: [&str; 30] = [
    "p", "px", "py", "pt", "pr", "pb", "pl", "m", "mx", "my", "mt", "mr", "mb", "ml", "w", "h",
    "min-w", "min-h", "max-w", "max-h", "gap", "top", "right", "bottom", "left", "inset", "z",
    "opacity", "bg", "text",
];

const EXTRA_DYNAMIC_PREFIXES: [&str; 1] = ["border"];

const MAX_WIDTHS: [(&str, &str); 13] = [
    ("sm", "24rem"),
    ("md", "28rem"),
    ("lg", "32rem"),
    ("xl", "36rem"),
    ("2xl", "42rem"),
    ("3xl", "48rem"),
    ("4xl", "56rem"),
    ("5xl", "64rem"),
    ("6xl", "72rem"),
    ("7xl", "80rem"),
    ("full", "100%"),
    ("none", "none"),
    ("prose", "65ch"),
];

const PALETTE: [(&str, [&str; 10]); 8] = [
    (
        "gray",
        [
            "#f9fafb", "#f3f4f6", "#e5e7eb", "#d1d5db", "#9ca3af", "#6b7280", "#4b5563",
            "#374151", "#1f2937", "#111827",
        ],
    ),
    (
        "red",
        [
            "#fef2f2", "#fee2e2", "#fecaca", "#fca5a5", "#f87171", "#ef4444", "#dc2626",
            "#b91c1c", "#991b1b", "#7f1d1d",
        ],
    ),
    (
        "yellow",
        [
            "#fffbeb", "#fef3c7", "#fde68a", "#fcd34d", "#fbbf24", "#f59e0b", "#d97706",
            "#b45309", "#92400e", "#78350f",
        ],
    ),
    (
        "green",
        [
            "#ecfdf5", "#d1fae5", "#a7f3d0", "#6ee7b7", "#34d399", "#10b981", "#059669",
            "#047857", "#065f46", "#064e3b",
        ],
    ),
    (
        "blue",
        [
            "#eff6ff", "#dbeafe", "#bfdbfe", "#93c5fd", "#60a5fa", "#3b82f6", "#2563eb",
            "#1d4ed8", "#1e40af", "#1e3a8a",
        ],
    ),
    (
        "indigo",
        [
            "#eef2ff", "#e0e7ff", "#c7d2fe", "#a5b4fc", "#818cf8", "#6366f1", "#4f46e5",
            "#4338ca", "#3730a3", "#312e81",
        ],
    ),
    (
        "purple",
        [
            "#f5f3ff", "#ede9fe", "#ddd6fe", "#c4b5fd", "#a78bfa", "#8b5cf6", "#7c3aed",
            "#6d28d9", "#5b21b6", "#4c1d95",
        ],
    ),
    (
        "pink",
        [
            "#fdf2f8", "#fce7f3", "#fbcfe8", "#f9a8d4", "#f472b6", "#ec4899", "#db2777",
            "#be185d", "#9d174d", "#831843",
        ],
    ),
];

const SHADES: [&str; 10] = [
    "50", "100", "200", "300", "400", "500", "600", "700", "800", "900",
];

fn static_table() -> &'static StaticTable {
    static TABLE: OnceLock<StaticTable> = OnceLock::new();
    TABLE.get_or_init(|| STATIC_UTILITIES.iter().copied().collect())
}

pub fn static_names() -> Vec<String> {
    static_table().keys().map(|name| name.to_string()).collect()
}

pub fn dynamic_prefixes() -> Vec<String> {
    DYNAMIC_PREFIXES
        .iter()
        .chain(EXTRA_DYNAMIC_PREFIXES.iter())
        .map(|prefix| prefix.to_string())
        .collect()
}

pub fn keyframes_for(utility: &str) -> Option<&'static str> {
    KEYFRAMES
        .iter()
        .find(|(name, _)| *name == utility)
        .map(|(_, css)| *css)
}

pub fn keyframe_utilities() -> impl Iterator<Item = &'static str> {
    KEYFRAMES.iter().map(|(name, _)| *name)
}

/// Default palette flattened to `family-shade -> hex`, plus `white` / `black`.
pub fn default_palette() -> BTreeMap<String, String> {
    let mut palette = BTreeMap::new();
    palette.insert("white".to_string(), "#ffffff".to_string());
    palette.insert("black".to_string(), "#000000".to_string());
    for (family, values) in PALETTE {
        for (shade, value) in SHADES.iter().zip(values) {
            palette.insert(format!("{}-{}", family, shade), value.to_string());
        }
    }
    for shade in SHADES {
        if let Some(value) = palette.get(&format!("yellow-{}", shade)).cloned() {
            palette.insert(format!("amber-{}", shade), value);
        }
    }
    palette
}

/// Resolves a utility without variants into declarations.
pub fn resolve(utility: &str, palette: &BTreeMap<String, String>) -> Option<Vec<Declaration>> {
    if let Some(declarations) = static_table().get(utility) {
        return Some(
            declarations
                .iter()
                .map(|(property, value)| Declaration::new(*property, *value))
                .collect(),
        );
    }

    let (negative, utility) = match utility.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, utility),
    };

    let (prefix, value) = split_prefix(utility)?;
    if negative && !allows_negative(prefix) {
        return None;
    }

    match prefix {
        "p" => spacing(value, negative, &["padding"]),
        "px" => spacing(value, negative, &["padding-left", "padding-right"]),
        "py" => spacing(value, negative, &["padding-top", "padding-bottom"]),
        "pt" => spacing(value, negative, &["padding-top"]),
        "pr" => spacing(value, negative, &["padding-right"]),
        "pb" => spacing(value, negative, &["padding-bottom"]),
        "pl" => spacing(value, negative, &["padding-left"]),
        "m" => spacing_or_auto(value, negative, &["margin"]),
        "mx" => spacing_or_auto(value, negative, &["margin-left", "margin-right"]),
        "my" => spacing_or_auto(value, negative, &["margin-top", "margin-bottom"]),
        "mt" => spacing_or_auto(value, negative, &["margin-top"]),
        "mr" => spacing_or_auto(value, negative, &["margin-right"]),
        "mb" => spacing_or_auto(value, negative, &["margin-bottom"]),
        "ml" => spacing_or_auto(value, negative, &["margin-left"]),
        "gap" => spacing(value, false, &["gap"]),
        "top" => spacing_or_auto(value, negative, &["top"]),
        "right" => spacing_or_auto(value, negative, &["right"]),
        "bottom" => spacing_or_auto(value, negative, &["bottom"]),
        "left" => spacing_or_auto(value, negative, &["left"]),
        "inset" => spacing_or_auto(value, negative, &["top", "right", "bottom", "left"]),
        "w" => sizing(value, "width"),
        "h" => sizing(value, "height"),
        "min-w" => match value {
            "0" => declare(&["min-width"], "0px"),
            _ => arbitrary(value).and_then(|value| declare(&["min-width"], &value)),
        },
        "min-h" => match value {
            "0" => declare(&["min-height"], "0px"),
            _ => arbitrary(value).and_then(|value| declare(&["min-height"], &value)),
        },
        "max-w" => MAX_WIDTHS
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, width)| width.to_string())
            .or_else(|| arbitrary(value))
            .and_then(|width| declare(&["max-width"], &width)),
        "max-h" => match value {
            "full" => declare(&["max-height"], "100%"),
            "screen" => declare(&["max-height"], "100vh"),
            _ => spacing_value(value).and_then(|height| declare(&["max-height"], &height)),
        },
        "z" => match value {
            "auto" => declare(&["z-index"], "auto"),
            _ => value
                .parse::<u32>()
                .ok()
                .and_then(|z| declare(&["z-index"], &z.to_string())),
        },
        "opacity" => value
            .parse::<u32>()
            .ok()
            .filter(|opacity| *opacity <= 100)
            .and_then(|opacity| declare(&["opacity"], &format_number(opacity as f64 / 100.0))),
        "bg" => color(value, palette, "bg", "background-color"),
        "text" => color(value, palette, "text", "color"),
        "border" => match value {
            "0" | "2" | "4" | "8" => declare(&["border-width"], &format!("{}px", value)),
            _ => color(value, palette, "border", "border-color"),
        },
        _ => None,
    }
}

fn split_prefix(utility: &str) -> Option<(&str, &str)> {
    let mut best: Option<(&str, &str)> = None;
    for prefix in DYNAMIC_PREFIXES.iter().chain(EXTRA_DYNAMIC_PREFIXES.iter()) {
        if let Some(value) = utility
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('-'))
        {
            if value.is_empty() {
                continue;
            }
            if best.is_none_or(|(current, _)| prefix.len() > current.len()) {
                best = Some((prefix, value));
            }
        }
    }
    best
}

fn allows_negative(prefix: &str) -> bool {
    matches!(
        prefix,
        "m" | "mx" | "my" | "mt" | "mr" | "mb" | "ml" | "top" | "right" | "bottom" | "left"
            | "inset"
    )
}

fn declare(properties: &[&str], value: &str) -> Option<Vec<Declaration>> {
    Some(
        properties
            .iter()
            .map(|property| Declaration::new(*property, value))
            .collect(),
    )
}

fn spacing(value: &str, negative: bool, properties: &[&str]) -> Option<Vec<Declaration>> {
    let value = spacing_value(value)?;
    let value = if negative { negate(&value) } else { value };
    declare(properties, &value)
}

fn spacing_or_auto(value: &str, negative: bool, properties: &[&str]) -> Option<Vec<Declaration>> {
    if value == "auto" {
        return if negative {
            None
        } else {
            declare(properties, "auto")
        };
    }
    spacing(value, negative, properties)
}

fn sizing(value: &str, property: &str) -> Option<Vec<Declaration>> {
    let resolved = match value {
        "auto" => "auto".to_string(),
        "min" => "min-content".to_string(),
        "max" => "max-content".to_string(),
        _ => match value.split_once('/') {
            Some((numerator, denominator)) => {
                let numerator = numerator.parse::<f64>().ok()?;
                let denominator = denominator.parse::<f64>().ok()?;
                if denominator == 0.0 || numerator > denominator {
                    return None;
                }
                format!("{}%", format_number(numerator / denominator * 100.0))
            }
            None => spacing_value(value)?,
        },
    };
    declare(&[property], &resolved)
}

fn spacing_value(value: &str) -> Option<String> {
    if let Some(arbitrary) = arbitrary(value) {
        return Some(arbitrary);
    }
    match value {
        "0" => Some("0px".to_string()),
        "px" => Some("1px".to_string()),
        _ => {
            let steps = value.parse::<f64>().ok()?;
            if steps < 0.0 || (steps * 2.0).fract() != 0.0 {
                return None;
            }
            Some(format!("{}rem", format_number(steps * 0.25)))
        }
    }
}

fn arbitrary(value: &str) -> Option<String> {
    let inner = value.strip_prefix('[')?.strip_suffix(']')?;
    // `$` only shows up in rewrite placeholders, never in a real value
    if inner.is_empty() || inner.contains('$') {
        return None;
    }
    Some(inner.replace('_', " "))
}

fn negate(value: &str) -> String {
    if value.starts_with('0') {
        return value.to_string();
    }
    format!("-{}", value)
}

fn color(
    value: &str,
    palette: &BTreeMap<String, String>,
    opacity_name: &str,
    property: &str,
) -> Option<Vec<Declaration>> {
    match value {
        "transparent" => return declare(&[property], "transparent"),
        "current" => return declare(&[property], "currentColor"),
        "inherit" => return declare(&[property], "inherit"),
        _ => {}
    }
    if let Some(arbitrary) = arbitrary(value) {
        return declare(&[property], &arbitrary);
    }
    let raw = palette.get(value)?;
    let Some((r, g, b)) = parse_hex_color(raw) else {
        return declare(&[property], raw);
    };
    let variable = format!("--tw-{}-opacity", opacity_name);
    Some(vec![
        Declaration::new(variable.clone(), "1"),
        Declaration::new(property, format!("rgba({}, {}, {}, var({}))", r, g, b, variable)),
    ])
}

fn parse_hex_color(value: &str) -> Option<(u8, u8, u8)> {
    let hex = value.strip_prefix('#')?;
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|ch| [ch, ch]).collect::<String>(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |idx: usize| u8::from_str_radix(&expanded[idx..idx + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn format_number(value: f64) -> String {
    let rounded = (value * 10000.0).round() / 10000.0;
    format!("{}", rounded)
}

#[cfg(test)]
mod tests {
    use super::{default_palette, parse_hex_color, resolve};
    use crate::css::Declaration;

    fn decls(utility: &str) -> Option<Vec<(String, String)>> {
        resolve(utility, &default_palette()).map(|declarations| {
            declarations
                .into_iter()
                .map(|Declaration { property, value }| (property, value))
                .collect()
        })
    }

    fn pair(property: &str, value: &str) -> (String, String) {
        (property.to_string(), value.to_string())
    }

    #[test]
    fn resolves_static_utilities() {
        assert_eq!(decls("font-light"), Some(vec![pair("font-weight", "300")]));
        assert_eq!(
            decls("text-4xl"),
            Some(vec![pair("font-size", "2.25rem"), pair("line-height", "2.5rem")])
        );
    }

    #[test]
    fn resolves_palette_colors_with_opacity_variable() {
        assert_eq!(
            decls("bg-white"),
            Some(vec![
                pair("--tw-bg-opacity", "1"),
                pair("background-color", "rgba(255, 255, 255, var(--tw-bg-opacity))"),
            ])
        );
        assert_eq!(
            decls("text-indigo-600"),
            Some(vec![
                pair("--tw-text-opacity", "1"),
                pair("color", "rgba(79, 70, 229, var(--tw-text-opacity))"),
            ])
        );
    }

    #[test]
    fn resolves_spacing_scale() {
        assert_eq!(decls("p-4"), Some(vec![pair("padding", "1rem")]));
        assert_eq!(
            decls("px-2.5"),
            Some(vec![
                pair("padding-left", "0.625rem"),
                pair("padding-right", "0.625rem")
            ])
        );
        assert_eq!(decls("-mt-2"), Some(vec![pair("margin-top", "-0.5rem")]));
        assert_eq!(decls("mx-auto").map(|d| d.len()), Some(2));
        assert_eq!(decls("-p-2"), None);
    }

    #[test]
    fn resolves_sizing_and_arbitrary_values() {
        assert_eq!(decls("w-1/2"), Some(vec![pair("width", "50%")]));
        assert_eq!(decls("w-[200px]"), Some(vec![pair("width", "200px")]));
        assert_eq!(decls("max-w-md"), Some(vec![pair("max-width", "28rem")]));
        assert_eq!(decls("opacity-50"), Some(vec![pair("opacity", "0.5")]));
        assert_eq!(decls("border-2"), Some(vec![pair("border-width", "2px")]));
    }

    #[test]
    fn rejects_unknown_utilities() {
        assert_eq!(decls("custom-class"), None);
        assert_eq!(decls("bg-nope-500"), None);
        assert_eq!(decls("p-"), None);
        assert_eq!(decls("p-1.3"), None);
        assert_eq!(decls("w-[$cw0$]"), None);
    }

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!(parse_hex_color("#fff"), Some((255, 255, 255)));
        assert_eq!(parse_hex_color("#4f46e5"), Some((79, 70, 229)));
        assert_eq!(parse_hex_color("red"), None);
    }
}
