use crate::compiler::ProcessorConfig;
use crate::preprocess::{Mode, Options};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "classweave.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub theme: Theme,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PreprocessConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub include_base_styles: bool,
    #[serde(default = "enabled")]
    pub include_global_styles: bool,
    #[serde(default = "enabled")]
    pub include_plugin_styles: bool,
    #[serde(default)]
    pub ignore_dynamic_classes_warning: bool,
    #[serde(default)]
    pub source_map: bool,
    #[serde(default)]
    pub minify: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct Theme {
    /// Replaces the default breakpoints, e.g. `sm = "640px"`.
    #[serde(default)]
    pub screens: BTreeMap<String, String>,
    #[serde(default)]
    pub colors: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub message: String,
}

pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|err| ConfigError {
        message: format!("failed to read config {}: {}", path.display(), err),
    })?;
    toml::from_str(&text).map_err(|err| ConfigError {
        message: format!("failed to parse config {}: {}", path.display(), err),
    })
}

/// Loads `path` when given, else `classweave.toml` in the working directory
/// when present, else the defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(path) => load(path),
        None => {
            let fallback = Path::new(DEFAULT_CONFIG_FILE);
            if fallback.is_file() {
                load(fallback)
            } else {
                Ok(Config::default())
            }
        }
    }
}

impl Config {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            prefix: self.prefix.clone(),
            screens: resolve_screens(&self.theme),
            colors: self.theme.colors.clone(),
        }
    }

    pub fn options(&self, filename: &str) -> Options {
        let preprocess = &self.preprocess;
        Options {
            filename: filename.to_string(),
            mode: preprocess.mode,
            include_base_styles: preprocess.include_base_styles,
            include_global_styles: preprocess.include_global_styles,
            include_plugin_styles: preprocess.include_plugin_styles,
            ignore_dynamic_classes_warning: preprocess.ignore_dynamic_classes_warning,
            source_map: preprocess.source_map,
            minify: preprocess.minify,
        }
    }
}

/// Screens ordered by their numeric width so media queries cascade mobile first.
pub fn resolve_screens(theme: &Theme) -> Vec<(String, String)> {
    let mut screens = theme
        .screens
        .iter()
        .map(|(name, width)| (name.clone(), width.clone()))
        .collect::<Vec<_>>();
    screens.sort_by(|(_, left), (_, right)| leading_number(left).total_cmp(&leading_number(right)));
    screens
}

fn leading_number(value: &str) -> f64 {
    let end = value
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(value.len());
    value[..end].parse().unwrap_or(0.0)
}

fn enabled() -> bool {
    true
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Full,
            include_base_styles: false,
            include_global_styles: enabled(),
            include_plugin_styles: enabled(),
            ignore_dynamic_classes_warning: false,
            source_map: false,
            minify: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, load, resolve_screens};
    use crate::preprocess::{Mode, Options};
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn loads_toml_config() {
        let path = temp_path("classweave_config");
        let _ = fs::write(
            &path,
            r#"
prefix = "cw-"

[preprocess]
mode = "attributes-only"
ignore_dynamic_classes_warning = true
"#,
        );
        let config = load(&path).expect("config should parse");
        assert_eq!(config.prefix.as_deref(), Some("cw-"));
        assert_eq!(config.preprocess.mode, Mode::AttributesOnly);
        assert!(config.preprocess.ignore_dynamic_classes_warning);
        assert!(config.preprocess.include_global_styles);
    }

    #[test]
    fn defaults_match_preprocess_options() {
        let path = temp_path("classweave_config_default");
        let _ = fs::write(&path, "");
        let config = load(&path).expect("config should parse");
        assert_eq!(config, Config::default());
        assert_eq!(
            config.options("App.svelte"),
            Options {
                filename: "App.svelte".to_string(),
                ..Options::default()
            }
        );
    }

    #[test]
    fn loads_theme_screens_and_colors() {
        let path = temp_path("classweave_config_theme");
        let _ = fs::write(
            &path,
            r##"
[theme.screens]
tablet = "800px"
phone = "400px"
desktop = "1200px"

[theme.colors.brand]
500 = "#3b82f6"
"##,
        );
        let config = load(&path).expect("config should parse");
        assert_eq!(config.theme.colors["brand"]["500"], "#3b82f6");
        let names = resolve_screens(&config.theme)
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["phone", "tablet", "desktop"]);
        let processor = config.processor_config();
        assert_eq!(processor.screens.len(), 3);
        assert_eq!(processor.prefix, None);
    }

    #[test]
    fn rejects_unknown_mode() {
        let path = temp_path("classweave_config_bad_mode");
        let _ = fs::write(&path, "[preprocess]\nmode = \"everything\"\n");
        let err = load(&path).expect_err("mode should be rejected");
        assert!(err.message.contains("failed to parse config"));
    }

    fn temp_path(prefix: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("{}_{}.toml", prefix, nanos))
    }
}
