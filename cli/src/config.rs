use std::path::{Path, PathBuf};

use resolver::{Inliner, InlinerConfig, InlinerOptions, Shortcut};
use serde::Deserialize;
use tracing::debug;

/// Name of the configuration file picked up next to the input.
pub const CONFIG_FILE: &str = "inline.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Deepest include level allowed.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Resource kind for bare `path` targets.
    #[serde(default)]
    pub default_resource: Option<String>,

    #[serde(default)]
    pub shortcuts: Vec<ShortcutEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShortcutEntry {
    pub name: String,
    pub expand: String,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("TOML parse error: {}", e))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// Load `explicit` if given, otherwise `inline.toml` beside `input` when
    /// it exists, otherwise the defaults.
    pub fn discover(explicit: Option<&Path>, input: &Path) -> Result<Self, String> {
        if let Some(path) = explicit {
            debug!(config = %path.display(), "loading configuration");
            return Self::load(path);
        }
        let beside = input
            .parent()
            .map(|dir| dir.join(CONFIG_FILE))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
        if beside.is_file() {
            debug!(config = %beside.display(), "loading configuration");
            Self::load(&beside)
        } else {
            debug!(looked_for = %beside.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn options(&self, max_depth_override: Option<usize>) -> InlinerOptions {
        let defaults = InlinerOptions::default();
        InlinerOptions {
            max_depth: max_depth_override
                .or(self.max_depth)
                .unwrap_or(defaults.max_depth),
            default_resource: self
                .default_resource
                .clone()
                .unwrap_or(defaults.default_resource),
        }
    }

    /// An engine with the built-in resources and transforms plus the
    /// configured shortcuts.
    pub fn build(&self, max_depth_override: Option<usize>) -> Inliner {
        let mut inliner = Inliner::with_options(self.options(max_depth_override));
        let mut config = InlinerConfig::builtin();
        config.shortcuts = self
            .shortcuts
            .iter()
            .map(|s| Shortcut::template(s.name.clone(), s.expand.clone()))
            .collect();
        inliner.use_config(config);
        inliner
    }
}
