pub mod parser;
pub mod pipe;
pub mod target;
pub mod token;

pub use parser::{ParseError, Parser, parse_text};
pub use pipe::{PipeChain, PipeSegment, parse_pipes, pipes_to_string};
pub use target::Target;
pub use token::{Directive, DirectiveKind, Param, Token};

/// The marker that introduces every directive. Matched ASCII-case-insensitively,
/// and only when followed by `.` or `(`.
pub const MARKER: &str = "$inline";
