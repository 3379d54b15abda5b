use std::fmt;

use crate::pipe::{PipeSegment, pipes_to_string};

/// Identifies a resource: the handler `name` plus positional arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub name: String,
    pub args: Vec<String>,
}

impl Target {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Target {
            name: name.into(),
            args,
        }
    }

    /// Derive the target named by the head of a pipe chain.
    ///
    /// A head with arguments names its handler explicitly (`text:hello`). A bare
    /// head (`path/to/file`) is shorthand for `default_resource:path/to/file`.
    pub fn from_segment(segment: &PipeSegment, default_resource: &str) -> Self {
        if segment.args.is_empty() {
            Target::new(default_resource, vec![segment.name.clone()])
        } else {
            Target::new(segment.name.clone(), segment.args.clone())
        }
    }

    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let segment = PipeSegment::new(self.name.clone(), self.args.clone());
        f.write_str(&pipes_to_string(&[segment]))
    }
}
