pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use inliner::{Directive, PipeSegment, Target};
use tracing::debug;

use crate::content::Content;
use crate::error::ResolveError;

pub use builtin::builtin_transforms;

/// What a transform knows about the directive it is post-processing.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// The directive being resolved.
    pub directive: &'a Directive,
    /// Full text of the resource containing the directive.
    pub source_content: &'a str,
    /// The included target, after path resolution.
    pub target: &'a Target,
    /// Target of the resource containing the directive.
    pub source: &'a Target,
}

#[async_trait]
pub trait TransformHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn transform(
        &self,
        ctx: &TransformContext<'_>,
        content: Content,
        args: &[String],
    ) -> Result<Content, ResolveError>;
}

type ApplyFn =
    dyn Fn(&TransformContext<'_>, Content, &[String]) -> Result<Content, ResolveError> + Send + Sync;

/// A synchronous transform backed by a closure.
pub struct TransformFn {
    name: String,
    apply: Box<ApplyFn>,
}

impl TransformFn {
    pub fn new(
        name: impl Into<String>,
        apply: impl Fn(&TransformContext<'_>, Content, &[String]) -> Result<Content, ResolveError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        TransformFn {
            name: name.into(),
            apply: Box::new(apply),
        }
    }
}

#[async_trait]
impl TransformHandler for TransformFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn transform(
        &self,
        ctx: &TransformContext<'_>,
        content: Content,
        args: &[String],
    ) -> Result<Content, ResolveError> {
        (self.apply)(ctx, content, args)
    }
}

/// Registry of named transforms, applied as a left-to-right chain.
#[derive(Default)]
pub struct TransformPipeline {
    handlers: HashMap<String, Arc<dyn TransformHandler>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handler: Arc<dyn TransformHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn TransformHandler>> {
        self.handlers.remove(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Thread `content` through each transform in order. An unknown name
    /// fails the chain at that point.
    pub async fn transform(
        &self,
        ctx: &TransformContext<'_>,
        mut content: Content,
        transforms: &[PipeSegment],
    ) -> Result<Content, ResolveError> {
        for segment in transforms {
            let handler =
                self.handlers
                    .get(&segment.name)
                    .ok_or_else(|| ResolveError::UnknownTransform {
                        name: segment.name.clone(),
                    })?;
            debug!(transform = %segment, resource = %ctx.target, "applying transform");
            content = handler.transform(ctx, content, &segment.args).await?;
        }
        Ok(content)
    }
}
