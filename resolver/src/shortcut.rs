use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use inliner::pipe::escape_pipe_value;
use inliner::{Param, PipeSegment, Target, pipes_to_string};

use crate::error::ResolveError;

pub type ExpandFn = dyn Fn(Option<&Target>, &[String]) -> String + Send + Sync;

/// How a shortcut rewrites its invocation.
#[derive(Clone)]
pub enum Expansion {
    /// Pipe text with `$1..$N` replaced by positional arguments and `$&` by
    /// all arguments, re-escaped and comma-joined.
    Template(String),
    /// Called with the including resource's target and the arguments.
    Function(Arc<ExpandFn>),
}

impl fmt::Debug for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expansion::Template(t) => f.debug_tuple("Template").field(t).finish(),
            Expansion::Function(_) => f.write_str("Function(..)"),
        }
    }
}

/// A named rewrite of a pipe-chain head.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub name: String,
    pub expand: Expansion,
}

impl Shortcut {
    pub fn template(name: impl Into<String>, template: impl Into<String>) -> Self {
        Shortcut {
            name: name.into(),
            expand: Expansion::Template(template.into()),
        }
    }

    pub fn function(
        name: impl Into<String>,
        expand: impl Fn(Option<&Target>, &[String]) -> String + Send + Sync + 'static,
    ) -> Self {
        Shortcut {
            name: name.into(),
            expand: Expansion::Function(Arc::new(expand)),
        }
    }

    /// Build a shortcut from the parameters of a `$inline.shortcut(name, expand)`
    /// declaration. Both must be string literals.
    pub fn from_params(params: &[Param]) -> Result<Self, ResolveError> {
        match params {
            [Param::String(name), Param::String(expand), ..] => {
                Ok(Shortcut::template(name.clone(), expand.clone()))
            }
            [_, Param::Number(n), ..] => Err(ResolveError::InvalidShortcut(format!(
                "expansion must be a string, got {}",
                n
            ))),
            [Param::Number(n), ..] => Err(ResolveError::InvalidShortcut(format!(
                "name must be a string, got {}",
                n
            ))),
            _ => Err(ResolveError::InvalidShortcut(
                "expected a name and an expansion".to_string(),
            )),
        }
    }

    fn expand_args(&self, source: Option<&Target>, args: &[String]) -> String {
        match &self.expand {
            Expansion::Template(template) => expand_template(template, args),
            Expansion::Function(f) => f(source, args),
        }
    }
}

/// A layer of shortcuts. Lookups fall back to the parent scope; changes to a
/// child never reach the parent.
#[derive(Debug, Clone, Default)]
pub struct ShortcutScope {
    shortcuts: HashMap<String, Shortcut>,
    parent: Option<Arc<ShortcutScope>>,
}

impl ShortcutScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shortcut in this scope, replacing any of the same name.
    pub fn add(&mut self, shortcut: Shortcut) {
        self.shortcuts.insert(shortcut.name.clone(), shortcut);
    }

    /// Remove a shortcut from this scope. Parent scopes are untouched.
    pub fn remove(&mut self, name: &str) -> Option<Shortcut> {
        self.shortcuts.remove(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<&Shortcut> {
        self.shortcuts
            .get(name)
            .or_else(|| self.parent.as_deref().and_then(|p| p.lookup(name)))
    }

    /// A new, empty scope whose lookups fall back to this one.
    pub fn child(self: &Arc<Self>) -> ShortcutScope {
        ShortcutScope {
            shortcuts: HashMap::new(),
            parent: Some(Arc::clone(self)),
        }
    }

    /// Expand a chain whose head names a shortcut. Transforms after the head
    /// are re-appended to the expansion so the caller can re-parse the whole
    /// thing. Returns None if the head is not a shortcut.
    pub fn expand(&self, source: Option<&Target>, chain: &[PipeSegment]) -> Option<String> {
        let (head, transforms) = chain.split_first()?;
        let shortcut = self.lookup(&head.name)?;
        let expanded = shortcut.expand_args(source, &head.args);
        if transforms.is_empty() {
            Some(expanded)
        } else {
            Some(format!("{}|{}", expanded, pipes_to_string(transforms)))
        }
    }
}

/// Substitute `$N` (1-based) and `$&` in a template. Positions past the end
/// of `args` expand to nothing.
fn expand_template(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        if let Some(tail) = after.strip_prefix('&') {
            let all: Vec<String> = args.iter().map(|a| escape_pipe_value(a)).collect();
            out.push_str(&all.join(","));
            rest = tail;
            continue;
        }

        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            out.push('$');
            rest = after;
            continue;
        }
        let index: usize = after[..digits].parse().unwrap_or(0);
        if let Some(arg) = index.checked_sub(1).and_then(|i| args.get(i)) {
            out.push_str(arg);
        }
        rest = &after[digits..];
    }

    out.push_str(rest);
    out
}
