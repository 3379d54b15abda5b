use std::sync::Arc;

use async_trait::async_trait;

use crate::content::Content;
use crate::error::ResolveError;
use crate::transform::{TransformContext, TransformFn, TransformHandler};

pub fn builtin_transforms() -> Vec<Arc<dyn TransformHandler>> {
    vec![
        Arc::new(Trim),
        Arc::new(Indent),
        Arc::new(StringLiteral),
        Arc::new(TransformFn::new("prefix", |_, content, args| {
            let body = text("prefix", content)?;
            Ok(Content::Text(args.join(",") + &body))
        })),
        Arc::new(TransformFn::new("suffix", |_, content, args| {
            let mut body = text("suffix", content)?;
            body.push_str(&args.join(","));
            Ok(Content::Text(body))
        })),
    ]
}

fn text(name: &str, content: Content) -> Result<String, ResolveError> {
    match content {
        Content::Text(s) => Ok(s),
        Content::Binary(_) => Err(ResolveError::transform(name, "cannot transform binary content")),
    }
}

/// `trim`: strip leading and trailing whitespace.
pub struct Trim;

#[async_trait]
impl TransformHandler for Trim {
    fn name(&self) -> &str {
        "trim"
    }

    async fn transform(
        &self,
        _ctx: &TransformContext<'_>,
        content: Content,
        _args: &[String],
    ) -> Result<Content, ResolveError> {
        Ok(Content::Text(text("trim", content)?.trim().to_string()))
    }
}

/// `indent` / `indent:prefix`: prefix every line after the first, so a
/// multi-line include lines up with the directive. Without an argument the
/// prefix is the leading whitespace of the directive's line.
pub struct Indent;

#[async_trait]
impl TransformHandler for Indent {
    fn name(&self) -> &str {
        "indent"
    }

    async fn transform(
        &self,
        ctx: &TransformContext<'_>,
        content: Content,
        args: &[String],
    ) -> Result<Content, ResolveError> {
        let body = text("indent", content)?;
        let prefix = match args.first() {
            Some(prefix) => prefix.clone(),
            None => line_indent(ctx.source_content, ctx.directive.span.start).to_string(),
        };

        let mut lines = body.split('\n');
        let mut out = lines.next().unwrap_or_default().to_string();
        for line in lines {
            out.push('\n');
            if !line.is_empty() {
                out.push_str(&prefix);
            }
            out.push_str(line);
        }
        Ok(Content::Text(out))
    }
}

/// Leading whitespace of the line containing `pos`.
fn line_indent(source: &str, pos: usize) -> &str {
    let pos = pos.min(source.len());
    let start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    let line = &source[start..];
    let width = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..width]
}

/// `string`: quote as a JSON string literal.
pub struct StringLiteral;

#[async_trait]
impl TransformHandler for StringLiteral {
    fn name(&self) -> &str {
        "string"
    }

    async fn transform(
        &self,
        _ctx: &TransformContext<'_>,
        content: Content,
        _args: &[String],
    ) -> Result<Content, ResolveError> {
        let body = text("string", content)?;
        serde_json::to_string(&body)
            .map(Content::Text)
            .map_err(|e| ResolveError::transform("string", e))
    }
}
