use std::fmt;

/// One `name:arg,arg` element of a pipe chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeSegment {
    pub name: String,
    pub args: Vec<String>,
}

impl PipeSegment {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        PipeSegment {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for PipeSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pipes_to_string(std::slice::from_ref(self)))
    }
}

/// A parsed `head|transform|transform` chain. The head names a target (or a
/// shortcut to expand); the remaining segments are transforms applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipeChain {
    pub segments: Vec<PipeSegment>,
}

impl PipeChain {
    pub fn head(&self) -> Option<&PipeSegment> {
        self.segments.first()
    }

    pub fn transforms(&self) -> &[PipeSegment] {
        self.segments.get(1..).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for PipeChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pipes_to_string(&self.segments))
    }
}

/// Parse `name:arg,arg|name|...`. Names escape `:` and `|` with a backslash,
/// arguments escape `,` and `|`. Whitespace around names and arguments is
/// dropped. Empty text is the empty chain.
pub fn parse_pipes(text: &str) -> PipeChain {
    let mut segments = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let (name, delimiter, after) = scan_until(rest, &[':', '|']);
        rest = after;
        let mut segment = PipeSegment::new(unescape(name.trim(), &[':', '|']), Vec::new());

        if delimiter == Some(':') {
            while !rest.is_empty() {
                let (value, delimiter, after) = scan_until(rest, &[',', '|']);
                rest = after;
                segment.args.push(unescape(value.trim(), &[',', '|']));
                if delimiter == Some('|') {
                    break;
                }
            }
        }

        segments.push(segment);
    }

    PipeChain { segments }
}

/// Serialize segments back into pipe text. Left inverse of [`parse_pipes`]
/// on canonical input.
pub fn pipes_to_string(segments: &[PipeSegment]) -> String {
    segments
        .iter()
        .map(|segment| {
            let name = escape_pipe_name(&segment.name);
            if segment.args.is_empty() {
                return name;
            }
            let args: Vec<String> = segment.args.iter().map(|a| escape_pipe_value(a)).collect();
            format!("{}:{}", name, args.join(","))
        })
        .collect::<Vec<_>>()
        .join("|")
}

pub fn escape_pipe_name(text: &str) -> String {
    escape(text, &[':', '|'])
}

pub fn escape_pipe_value(text: &str) -> String {
    escape(text, &[',', '|'])
}

/// Split `text` at the first unescaped delimiter. Returns the part before it,
/// the delimiter (None at end of input) and the remainder after it.
fn scan_until<'a>(text: &'a str, delimiters: &[char]) -> (&'a str, Option<char>, &'a str) {
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some(&(_, next)) = chars.peek() {
                if delimiters.contains(&next) {
                    chars.next();
                }
            }
            continue;
        }
        if delimiters.contains(&c) {
            return (&text[..i], Some(c), &text[i + c.len_utf8()..]);
        }
    }
    (text, None, "")
}

fn escape(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn unescape(text: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if special.contains(&next) {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
