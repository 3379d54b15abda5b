use std::fmt;
use std::sync::Arc;

use inliner::{ParseError, Target};

/// Every way a resolution can fail. All of them abort the whole resolution.
///
/// `Clone` so a cached read outcome can be handed to every caller that
/// shares it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("parse error in {target}: {error}")]
    Parse {
        target: Target,
        /// The text that failed to parse, for diagnostics.
        source_text: Arc<str>,
        #[source]
        error: ParseError,
    },

    #[error("unknown resource: {name}")]
    UnknownResource { name: String },

    #[error("unknown transform: {name}")]
    UnknownTransform { name: String },

    #[error("Max recursion depth {limit} exceeded")]
    MaxDepthExceeded { limit: usize },

    #[error("invalid shortcut: {0}")]
    InvalidShortcut(String),

    #[error("resource {name} failed: {message}")]
    Resource { name: String, message: String },

    #[error("transform {name} failed: {message}")]
    Transform { name: String, message: String },
}

impl ResolveError {
    pub fn resource(name: impl Into<String>, message: impl fmt::Display) -> Self {
        ResolveError::Resource {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn transform(name: impl Into<String>, message: impl fmt::Display) -> Self {
        ResolveError::Transform {
            name: name.into(),
            message: message.to_string(),
        }
    }
}
