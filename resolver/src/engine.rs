use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};
use inliner::{Directive, ParseError, Parser, PipeSegment, Target, Token, parse_pipes};
use tracing::debug;

use crate::config::{InlinerConfig, InlinerOptions};
use crate::content::Content;
use crate::error::ResolveError;
use crate::node::ResolutionNode;
use crate::resource::ResourceLoader;
use crate::shortcut::{Shortcut, ShortcutScope};
use crate::transform::{TransformContext, TransformPipeline};

/// One step of a resolution.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    /// Target of the including resource; None for the entry target.
    pub source: Option<Target>,
    pub target: Target,
    pub depth: usize,
    /// Content to use instead of reading the target.
    pub content: Option<Content>,
}

impl ResolveRequest {
    pub fn new(target: Target) -> Self {
        ResolveRequest {
            source: None,
            target,
            depth: 0,
            content: None,
        }
    }

    pub fn with_source(mut self, source: Option<Target>) -> Self {
        self.source = source;
        self
    }

    pub fn with_content(mut self, content: impl Into<Content>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// A directive after shortcut expansion: what to read and how to transform it.
struct Inclusion {
    directive: Directive,
    target: Target,
    transforms: Vec<PipeSegment>,
}

enum Segment {
    Text(Content),
    Include(Inclusion),
}

/// A segment after resolution. Only includes carry a tree node.
enum Resolved {
    Text(Content),
    Node(ResolutionNode),
}

impl Resolved {
    fn content(&self) -> &Content {
        match self {
            Resolved::Text(c) => c,
            Resolved::Node(node) => &node.content,
        }
    }
}

/// The resolution engine. Owns the resource, transform and shortcut
/// registries plus the read cache shared by all resolutions it runs.
#[derive(Default)]
pub struct Inliner {
    options: InlinerOptions,
    resources: ResourceLoader,
    transforms: TransformPipeline,
    shortcuts: Arc<ShortcutScope>,
}

impl Inliner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: InlinerOptions) -> Self {
        Inliner {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &InlinerOptions {
        &self.options
    }

    pub fn resources(&self) -> &ResourceLoader {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceLoader {
        &mut self.resources
    }

    pub fn transforms(&self) -> &TransformPipeline {
        &self.transforms
    }

    pub fn transforms_mut(&mut self) -> &mut TransformPipeline {
        &mut self.transforms
    }

    /// The global shortcut scope every resource's local scope starts from.
    pub fn shortcuts(&self) -> &ShortcutScope {
        &self.shortcuts
    }

    pub fn shortcuts_mut(&mut self) -> &mut ShortcutScope {
        Arc::make_mut(&mut self.shortcuts)
    }

    pub fn add_shortcut(&mut self, shortcut: Shortcut) {
        self.shortcuts_mut().add(shortcut);
    }

    /// Register everything in `config`.
    pub fn use_config(&mut self, config: InlinerConfig) {
        for resource in config.resources {
            self.resources.add(resource);
        }
        for transform in config.transforms {
            self.transforms.add(transform);
        }
        for shortcut in config.shortcuts {
            self.add_shortcut(shortcut);
        }
    }

    /// Resolve `target` and everything it includes.
    pub async fn resolve(
        &self,
        target: Target,
        source: Option<Target>,
    ) -> Result<ResolutionNode, ResolveError> {
        self.resolve_request(ResolveRequest::new(target).with_source(source))
            .await
    }

    pub fn resolve_request(
        &self,
        request: ResolveRequest,
    ) -> BoxFuture<'_, Result<ResolutionNode, ResolveError>> {
        Box::pin(async move {
            let ResolveRequest {
                source,
                mut target,
                depth,
                content,
            } = request;

            if depth > self.options.max_depth {
                return Err(ResolveError::MaxDepthExceeded {
                    limit: self.options.max_depth,
                });
            }

            self.resources.resolve(source.as_ref(), &mut target)?;
            debug!(resource = %target, depth, "resolving");

            let mut shortcuts = self.shortcuts.child();
            let content = match content {
                Some(content) => content,
                None => self.resources.read(source.as_ref(), &target).await?,
            };
            let text = match content {
                Content::Text(text) => text,
                binary @ Content::Binary(_) => return Ok(ResolutionNode::leaf(target, binary)),
            };

            let tokens = Parser::new(&text)
                .parse()
                .map_err(|error| parse_error(&target, &text, error))?;

            // Expansion is sequential so a shortcut declaration affects only
            // the directives after it.
            let mut segments = Vec::with_capacity(tokens.len());
            for token in tokens {
                match token {
                    Token::Text(value) => segments.push(Segment::Text(Content::Text(value))),
                    Token::Directive(directive) if directive.is_shortcut() => {
                        shortcuts.add(Shortcut::from_params(&directive.params)?);
                    }
                    Token::Directive(directive) => {
                        let inclusion = self.plan(&target, &text, &shortcuts, directive)?;
                        segments.push(Segment::Include(inclusion));
                    }
                }
            }

            let resolved = try_join_all(
                segments
                    .into_iter()
                    .map(|segment| self.resolve_segment(segment, &target, &text, depth)),
            )
            .await?;

            let parts: Vec<&Content> = resolved.iter().map(Resolved::content).collect();
            let content = Content::join(&parts);
            let children = resolved
                .into_iter()
                .filter_map(|r| match r {
                    Resolved::Node(node) => Some(node),
                    Resolved::Text(_) => None,
                })
                .collect();

            Ok(ResolutionNode {
                target,
                content,
                children,
            })
        })
    }

    /// Turn a directive into the target it includes plus its transform chain,
    /// expanding shortcuts in the head of the chain.
    fn plan(
        &self,
        source: &Target,
        source_text: &str,
        shortcuts: &ShortcutScope,
        directive: Directive,
    ) -> Result<Inclusion, ResolveError> {
        let Some(expression) = directive.params.first() else {
            return Err(parse_error(
                source,
                source_text,
                ParseError::new("$inline directive needs a target", directive.span.clone()),
            ));
        };

        let mut chain = parse_pipes(&expression.to_string());
        // A shortcut is expanded at most once per directive, so one whose
        // expansion starts with its own name reads the resource of that name.
        let mut expanded: Vec<String> = Vec::new();
        while let Some(head) = chain.head() {
            if expanded.contains(&head.name) {
                break;
            }
            let name = head.name.clone();
            let Some(text) = shortcuts.expand(Some(source), &chain.segments) else {
                break;
            };
            debug!(shortcut = %name, expansion = %text, "expanded shortcut");
            expanded.push(name);
            chain = parse_pipes(&text);
        }

        let Some(head) = chain.head() else {
            return Err(parse_error(
                source,
                source_text,
                ParseError::new("$inline directive has an empty target", directive.span.clone()),
            ));
        };

        Ok(Inclusion {
            target: Target::from_segment(head, &self.options.default_resource),
            transforms: chain.transforms().to_vec(),
            directive,
        })
    }

    async fn resolve_segment(
        &self,
        segment: Segment,
        source: &Target,
        source_text: &str,
        depth: usize,
    ) -> Result<Resolved, ResolveError> {
        let inclusion = match segment {
            Segment::Text(content) => return Ok(Resolved::Text(content)),
            Segment::Include(inclusion) => inclusion,
        };

        let request = ResolveRequest {
            source: Some(source.clone()),
            target: inclusion.target,
            depth: depth + 1,
            content: None,
        };
        let mut node = self.resolve_request(request).await?;

        let content = std::mem::take(&mut node.content);
        let ctx = TransformContext {
            directive: &inclusion.directive,
            source_content: source_text,
            target: &node.target,
            source,
        };
        let transformed = self
            .transforms
            .transform(&ctx, content, &inclusion.transforms)
            .await?;
        node.content = transformed;

        Ok(Resolved::Node(node))
    }
}

fn parse_error(target: &Target, text: &str, error: ParseError) -> ResolveError {
    ResolveError::Parse {
        target: target.clone(),
        source_text: Arc::from(text),
        error,
    }
}
