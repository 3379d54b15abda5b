pub mod builtin;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use inliner::Target;
use tokio::sync::OnceCell;
use tracing::trace;

use crate::content::Content;
use crate::error::ResolveError;

pub use builtin::{FileResource, MemoryResource, TextResource, builtin_resources};

/// Provides content for one kind of target (`file`, `text`, ...).
///
/// `source` is the target of the including resource, or None for the entry
/// target of a resolution.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn read(&self, source: Option<&Target>, target: &Target) -> Result<Content, ResolveError>;

    /// Cache key for a read. Handlers returning None are read afresh every time.
    fn hash(&self, _source: Option<&Target>, _target: &Target) -> Option<String> {
        None
    }

    /// Rewrite `target` relative to `source` before it is read, e.g. to turn
    /// a relative path into one relative to the including file. Only called
    /// when there is a source.
    fn resolve(&self, _source: &Target, _target: &mut Target) {}
}

type ReadFn = dyn Fn(Option<&Target>, &Target) -> Result<Content, ResolveError> + Send + Sync;
type HashFn = dyn Fn(Option<&Target>, &Target) -> String + Send + Sync;

/// A synchronous resource backed by closures.
pub struct ResourceFn {
    name: String,
    read: Box<ReadFn>,
    hash: Option<Box<HashFn>>,
}

impl ResourceFn {
    pub fn new(
        name: impl Into<String>,
        read: impl Fn(Option<&Target>, &Target) -> Result<Content, ResolveError> + Send + Sync + 'static,
    ) -> Self {
        ResourceFn {
            name: name.into(),
            read: Box::new(read),
            hash: None,
        }
    }

    /// Cache reads under the key computed by `hash`.
    pub fn with_hash(
        mut self,
        hash: impl Fn(Option<&Target>, &Target) -> String + Send + Sync + 'static,
    ) -> Self {
        self.hash = Some(Box::new(hash));
        self
    }
}

#[async_trait]
impl ResourceHandler for ResourceFn {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, source: Option<&Target>, target: &Target) -> Result<Content, ResolveError> {
        (self.read)(source, target)
    }

    fn hash(&self, source: Option<&Target>, target: &Target) -> Option<String> {
        self.hash.as_ref().map(|hash| hash(source, target))
    }
}

type ReadCell = Arc<OnceCell<Result<Content, ResolveError>>>;

/// Registry of resource handlers plus the read cache.
///
/// The cache lives as long as the loader: every hashed key is read at most
/// once, and concurrent reads of the same key wait for the first one.
#[derive(Default)]
pub struct ResourceLoader {
    handlers: HashMap<String, Arc<dyn ResourceHandler>>,
    cache: Mutex<HashMap<String, ReadCell>>,
}

impl ResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its name, replacing any previous one.
    pub fn add(&mut self, handler: Arc<dyn ResourceHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn ResourceHandler>> {
        self.handlers.remove(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    fn handler(&self, name: &str) -> Result<&Arc<dyn ResourceHandler>, ResolveError> {
        self.handlers
            .get(name)
            .ok_or_else(|| ResolveError::UnknownResource {
                name: name.to_string(),
            })
    }

    /// Let the target's handler rewrite it relative to `source`.
    pub fn resolve(&self, source: Option<&Target>, target: &mut Target) -> Result<(), ResolveError> {
        let handler = self.handler(&target.name)?;
        if let Some(source) = source {
            handler.resolve(source, target);
        }
        Ok(())
    }

    pub async fn read(&self, source: Option<&Target>, target: &Target) -> Result<Content, ResolveError> {
        let handler = self.handler(&target.name)?;
        let Some(hash) = handler.hash(source, target) else {
            return handler.read(source, target).await;
        };

        // Keyed by handler too, so two kinds never share an entry.
        let key = format!("{}\0{}", target.name, hash);
        let cell = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cache.entry(key).or_default())
        };

        if cell.initialized() {
            trace!(resource = %target, "read cache hit");
        }
        cell.get_or_init(|| async {
            trace!(resource = %target, "read cache miss");
            handler.read(source, target).await
        })
        .await
        .clone()
    }

    /// Number of distinct keys read (or being read) so far.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
