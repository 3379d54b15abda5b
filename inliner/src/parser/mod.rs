pub mod directive;
pub mod error;
mod text;

pub use directive::{RawDirective, parse_directive};
pub use error::ParseError;

use crate::token::Token;

/// Lexer entry point.
pub struct Parser<'a> {
    source: &'a str,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        Parser { source }
    }

    /// Split the source into text and directive tokens, in source order.
    pub fn parse(&self) -> Result<Vec<Token>, ParseError> {
        text::tokenize(self.source)
    }
}

pub fn parse_text(source: &str) -> Result<Vec<Token>, ParseError> {
    Parser::new(source).parse()
}
