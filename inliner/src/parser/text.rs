use std::ops::Range;

use crate::MARKER;
use crate::parser::directive::{RawDirective, parse_directive};
use crate::parser::error::ParseError;
use crate::token::{Directive, DirectiveKind, Param, Token};

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut state = LexState::new(source);
    let mut from = 0;

    while let Some(at) = find_marker(source, from) {
        let raw = match parse_directive(source, at) {
            Ok(raw) => raw,
            // Inside an open block/region/skip only the closing marker
            // matters; anything malformed before it is body text.
            Err(_) if state.is_open() => {
                from = at + MARKER.len();
                continue;
            }
            Err(e) => return Err(e),
        };
        from = raw.end;
        state.accept(at, raw)?;
    }

    state.finish()
}

/// Find the next `$inline.` or `$inline(` at or after `from`.
fn find_marker(source: &str, from: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let marker = MARKER.as_bytes();
    (from..bytes.len()).find(|&i| {
        bytes.len() > i + marker.len()
            && bytes[i..i + marker.len()].eq_ignore_ascii_case(marker)
            && matches!(bytes[i + marker.len()], b'.' | b'(')
    })
}

/// The line containing `pos`, excluding both newlines.
fn line_range(source: &str, pos: usize) -> Range<usize> {
    let start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let end = source[pos..].find('\n').map_or(source.len(), |i| pos + i);
    start..end
}

// ---------------------------------------------------------------------------
// Lexer state
// ---------------------------------------------------------------------------

/// A directive whose closing marker has not been seen yet.
enum Open {
    Skip {
        tag: Option<Param>,
        at: Range<usize>,
    },
    Block {
        params: Vec<Param>,
        body_start: usize,
        at: Range<usize>,
    },
    Region {
        params: Vec<Param>,
        body_start: usize,
        at: Range<usize>,
    },
}

struct LexState<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    /// End of the last directive span; text before it has been emitted.
    last_index: usize,
    open: Option<Open>,
}

impl<'a> LexState<'a> {
    fn new(source: &'a str) -> Self {
        LexState {
            source,
            tokens: Vec::new(),
            last_index: 0,
            open: None,
        }
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn accept(&mut self, at: usize, raw: RawDirective) -> Result<(), ParseError> {
        let call = at..raw.end;
        let method = raw.method.as_deref();

        if let Some(open) = self.open.take() {
            return self.accept_closing(open, at, method, raw.params);
        }

        match method {
            None => self.push_directive(DirectiveKind::Plain, raw.params, call.clone(), &call),
            Some("line") => {
                let span = line_range(self.source, at);
                self.push_directive(DirectiveKind::Line, raw.params, span, &call)
            }
            Some("start") => {
                self.open = Some(Open::Block {
                    params: raw.params,
                    body_start: line_range(self.source, at).end + 1,
                    at: call,
                });
                Ok(())
            }
            Some("open") => {
                let skip = skip_count(raw.params.get(1), &call)?;
                let Some(body_start) = raw
                    .end
                    .checked_add(skip)
                    .filter(|&start| start <= self.source.len())
                else {
                    return Err(ParseError::new(
                        format!("skip count {} runs past the end of the text", skip),
                        call,
                    ));
                };
                self.open = Some(Open::Region {
                    params: raw.params,
                    body_start,
                    at: call,
                });
                Ok(())
            }
            Some("skipStart") => {
                self.open = Some(Open::Skip {
                    tag: raw.params.into_iter().next(),
                    at: call,
                });
                Ok(())
            }
            Some("shortcut") => {
                // Registered at resolution time. The declaration text stays
                // in the surrounding text token.
                self.tokens.push(Token::Directive(Directive {
                    kind: DirectiveKind::Shortcut,
                    params: raw.params,
                    span: call,
                }));
                Ok(())
            }
            Some(other) => Err(ParseError::new(
                format!("$inline.{} is not a valid $inline statement", other),
                call,
            )
            .with_note(
                "expected one of: line, start, end, open, close, skipStart, skipEnd, shortcut",
            )),
        }
    }

    /// Handle a directive seen while `open` is pending. Only the matching
    /// closing marker has any effect.
    fn accept_closing(
        &mut self,
        open: Open,
        at: usize,
        method: Option<&str>,
        params: Vec<Param>,
    ) -> Result<(), ParseError> {
        match (open, method) {
            (Open::Skip { tag, at: opener }, Some("skipEnd")) => {
                let closes = match (&tag, params.first()) {
                    (None, _) | (_, None) => true,
                    (Some(open_tag), Some(end_tag)) => open_tag == end_tag,
                };
                if !closes {
                    self.open = Some(Open::Skip { tag, at: opener });
                }
                Ok(())
            }
            (
                Open::Block {
                    params,
                    body_start,
                    at: opener,
                },
                Some("end"),
            ) => {
                let body_end = line_range(self.source, at).start.checked_sub(1);
                match body_end {
                    Some(body_end) if body_end >= body_start => {
                        self.push_directive(DirectiveKind::Block, params, body_start..body_end, &opener)
                    }
                    _ => Err(ParseError::new(
                        "There must be at least one line between $inline.start and $inline.end",
                        opener,
                    )),
                }
            }
            (
                Open::Region {
                    params: open_params,
                    body_start,
                    at: opener,
                },
                Some("close"),
            ) => {
                let skip = skip_count(params.first(), &(at..at))?;
                match at.checked_sub(skip) {
                    Some(body_end) if body_end >= body_start => self.push_directive(
                        DirectiveKind::Region,
                        open_params,
                        body_start..body_end,
                        &opener,
                    ),
                    _ => Err(ParseError::new(
                        "$inline.close overlaps the skipped text of $inline.open",
                        opener.start..at,
                    )),
                }
            }
            (open, _) => {
                self.open = Some(open);
                Ok(())
            }
        }
    }

    fn push_directive(
        &mut self,
        kind: DirectiveKind,
        params: Vec<Param>,
        span: Range<usize>,
        call: &Range<usize>,
    ) -> Result<(), ParseError> {
        if span.start < self.last_index {
            return Err(ParseError::new(
                "$inline directive overlaps the previous directive",
                call.clone(),
            ));
        }
        if span.end > self.source.len()
            || !self.source.is_char_boundary(span.start)
            || !self.source.is_char_boundary(span.end)
        {
            return Err(ParseError::new(
                "$inline directive span does not fall on character boundaries",
                call.clone(),
            ));
        }

        if self.last_index != span.start {
            self.tokens
                .push(Token::Text(self.source[self.last_index..span.start].to_string()));
        }
        self.last_index = span.end;
        self.tokens.push(Token::Directive(Directive { kind, params, span }));
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Token>, ParseError> {
        match self.open {
            Some(Open::Block { at, .. }) => {
                return Err(ParseError::new("Missing $inline.end", at));
            }
            Some(Open::Region { at, .. }) => {
                return Err(ParseError::new("Missing $inline.close", at));
            }
            Some(Open::Skip { at, .. }) => {
                return Err(ParseError::new("Missing $inline.skipEnd", at));
            }
            None => {}
        }

        if self.last_index != self.source.len() {
            self.tokens
                .push(Token::Text(self.source[self.last_index..].to_string()));
        }
        Ok(self.tokens)
    }
}

/// Interpret an optional skip-count parameter of `open`/`close`.
fn skip_count(param: Option<&Param>, call: &Range<usize>) -> Result<usize, ParseError> {
    match param {
        None => Ok(0),
        Some(Param::Number(n)) if *n >= 0.0 && n.fract() == 0.0 => Ok(*n as usize),
        Some(other) => Err(ParseError::new(
            format!("skip count must be a non-negative integer, got {}", other),
            call.clone(),
        )),
    }
}
