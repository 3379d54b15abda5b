use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use inliner::Target;

use crate::content::Content;
use crate::error::ResolveError;
use crate::resource::ResourceHandler;

/// The resources every command-line resolution starts with.
pub fn builtin_resources() -> Vec<Arc<dyn ResourceHandler>> {
    vec![Arc::new(FileResource), Arc::new(TextResource)]
}

/// `file:path`: a file on disk. Relative paths are taken relative to the
/// directory of the including file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileResource;

#[async_trait]
impl ResourceHandler for FileResource {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(&self, _source: Option<&Target>, target: &Target) -> Result<Content, ResolveError> {
        let path = target
            .first_arg()
            .ok_or_else(|| ResolveError::resource("file", "missing path argument"))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ResolveError::resource("file", format!("cannot read '{}': {}", path, e)))?;
        Ok(Content::from_bytes(bytes))
    }

    fn hash(&self, _source: Option<&Target>, target: &Target) -> Option<String> {
        target.first_arg().map(str::to_string)
    }

    fn resolve(&self, source: &Target, target: &mut Target) {
        if source.name != "file" {
            return;
        }
        let (Some(base), Some(path)) = (source.first_arg(), target.args.first_mut()) else {
            return;
        };
        if Path::new(path.as_str()).is_absolute() {
            return;
        }
        let dir = Path::new(base).parent().unwrap_or(Path::new(""));
        *path = normalize(&dir.join(path.as_str()))
            .to_string_lossy()
            .into_owned();
    }
}

/// Lexically drop `.` components and fold `..` into its parent where possible.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(out.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    out.pop();
                } else {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `text:value`: the arguments themselves, comma-joined.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextResource;

#[async_trait]
impl ResourceHandler for TextResource {
    fn name(&self) -> &str {
        "text"
    }

    async fn read(&self, _source: Option<&Target>, target: &Target) -> Result<Content, ResolveError> {
        Ok(Content::Text(target.args.join(",")))
    }
}

/// An in-memory table of named entries, served under a configurable
/// resource name. Reads are cached by entry name.
#[derive(Debug, Clone, Default)]
pub struct MemoryResource {
    name: String,
    entries: HashMap<String, Content>,
}

impl MemoryResource {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryResource {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, content: impl Into<Content>) -> Self {
        self.insert(key, content);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, content: impl Into<Content>) {
        self.entries.insert(key.into(), content.into());
    }
}

#[async_trait]
impl ResourceHandler for MemoryResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, _source: Option<&Target>, target: &Target) -> Result<Content, ResolveError> {
        let key = target.first_arg().unwrap_or_default();
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| ResolveError::resource(&self.name, format!("no entry named '{}'", key)))
    }

    fn hash(&self, _source: Option<&Target>, target: &Target) -> Option<String> {
        target.first_arg().map(str::to_string)
    }
}
