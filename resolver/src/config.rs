use std::sync::Arc;

use crate::resource::{ResourceHandler, builtin_resources};
use crate::shortcut::Shortcut;
use crate::transform::{TransformHandler, builtin_transforms};

pub const DEFAULT_MAX_DEPTH: usize = 10;
pub const DEFAULT_RESOURCE: &str = "file";

#[derive(Debug, Clone)]
pub struct InlinerOptions {
    /// Deepest include level allowed; the entry resource is depth 0.
    pub max_depth: usize,
    /// Resource kind used when a directive names a bare `path` rather than
    /// `kind:args`.
    pub default_resource: String,
}

impl Default for InlinerOptions {
    fn default() -> Self {
        InlinerOptions {
            max_depth: DEFAULT_MAX_DEPTH,
            default_resource: DEFAULT_RESOURCE.to_string(),
        }
    }
}

/// Handlers and shortcuts to register in bulk with [`crate::Inliner::use_config`].
#[derive(Default)]
pub struct InlinerConfig {
    pub resources: Vec<Arc<dyn ResourceHandler>>,
    pub transforms: Vec<Arc<dyn TransformHandler>>,
    pub shortcuts: Vec<Shortcut>,
}

impl InlinerConfig {
    /// The built-in `file`/`text` resources and `trim`/`indent`/`string` transforms.
    pub fn builtin() -> Self {
        InlinerConfig {
            resources: builtin_resources(),
            transforms: builtin_transforms(),
            shortcuts: Vec::new(),
        }
    }
}
