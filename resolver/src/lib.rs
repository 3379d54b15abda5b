pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod node;
pub mod resource;
pub mod shortcut;
pub mod transform;

pub use config::{InlinerConfig, InlinerOptions};
pub use content::Content;
pub use engine::{Inliner, ResolveRequest};
pub use error::ResolveError;
pub use node::ResolutionNode;
pub use resource::{ResourceFn, ResourceHandler, ResourceLoader};
pub use shortcut::{Expansion, Shortcut, ShortcutScope};
pub use transform::{TransformContext, TransformFn, TransformHandler, TransformPipeline};
