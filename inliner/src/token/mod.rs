use std::fmt;
use std::ops::Range;

/// A literal from a directive's parameter list.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    String(String),
    Number(f64),
}

impl Param {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::String(s) => Some(s),
            Param::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Param::Number(n) => Some(*n),
            Param::String(_) => None,
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::String(s) => write!(f, "{}", s),
            Param::Number(n) => {
                if n.is_finite() && *n == n.floor() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

/// The syntactic form a directive was written in. Every form except
/// `Shortcut` means "replace `span` with the resolved content of `params[0]`";
/// they differ only in how the span is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `$inline(...)`: the call itself.
    Plain,
    /// `$inline.line(...)`: the whole line containing the call.
    Line,
    /// `$inline.start(...)` ... `$inline.end`: the lines between the markers.
    Block,
    /// `$inline.open(...)` ... `$inline.close(...)`: the text between the
    /// markers, shrunk by the skip counts.
    Region,
    /// `$inline.shortcut(name, expand)`: a shortcut declaration.
    Shortcut,
}

impl DirectiveKind {
    pub fn method(&self) -> Option<&'static str> {
        match self {
            DirectiveKind::Plain => None,
            DirectiveKind::Line => Some("line"),
            DirectiveKind::Block => Some("start"),
            DirectiveKind::Region => Some("open"),
            DirectiveKind::Shortcut => Some("shortcut"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub params: Vec<Param>,
    /// Byte span of the source replaced by the resolved content. Shortcut
    /// declarations record their own extent here, but that text is left in
    /// the surrounding text token.
    pub span: Range<usize>,
}

impl Directive {
    pub fn is_shortcut(&self) -> bool {
        self.kind == DirectiveKind::Shortcut
    }
}

/// A lexed unit of source text.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Directive(Directive),
}

impl Token {
    pub fn as_directive(&self) -> Option<&Directive> {
        match self {
            Token::Directive(d) => Some(d),
            Token::Text(_) => None,
        }
    }
}
