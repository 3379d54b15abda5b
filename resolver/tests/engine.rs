use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use inliner::Target;
use resolver::{
    Content, Inliner, InlinerConfig, InlinerOptions, ResolveError, ResolveRequest, ResourceFn,
    ResourceHandler, Shortcut, TransformFn,
    resource::{MemoryResource, TextResource},
};

fn file(name: &str) -> Target {
    Target::new("file", vec![name.to_string()])
}

fn inliner_with(files: MemoryResource) -> Inliner {
    let mut inliner = Inliner::new();
    inliner.use_config(InlinerConfig::builtin());
    inliner.resources_mut().add(Arc::new(files));
    inliner
}

async fn resolve_text(inliner: &Inliner, entry: &str) -> Result<String, ResolveError> {
    let node = inliner.resolve(file(entry), None).await?;
    Ok(node.content.as_text().unwrap().to_string())
}

// ---------------------------------------------------------------------------
// End-to-end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn self_inclusion_hits_depth_limit() {
    let inliner = inliner_with(MemoryResource::new("file").with("foo", "$inline('foo')"));

    let err = inliner.resolve(file("foo"), None).await.unwrap_err();
    assert!(matches!(err, ResolveError::MaxDepthExceeded { limit: 10 }));
    assert!(err.to_string().contains("10"), "{}", err);
}

#[tokio::test]
async fn shortcut_declaration_is_kept_as_text() {
    let mut inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline.shortcut('foo','b|t:$1')\n$inline('foo:baz')")
            .with("b", "OK"),
    );
    inliner
        .transforms_mut()
        .add(Arc::new(TransformFn::new("t", |_, content, args| {
            Ok(Content::Text(format!("{}{}", content, args[0])))
        })));

    let text = resolve_text(&inliner, "a").await.unwrap();
    assert_eq!(text, "$inline.shortcut('foo','b|t:$1')\nOKbaz");
}

#[tokio::test]
async fn binary_segment_makes_output_binary() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with("b", "a")
            .with("c", Content::Binary(b"b".to_vec())),
    );

    let request = ResolveRequest::new(file("entry")).with_content("$inline('b')$inline('c')");
    let node = inliner.resolve_request(request).await.unwrap();

    assert!(node.content.is_binary());
    assert_eq!(node.content.as_bytes(), b"ab");
}

#[tokio::test]
async fn nested_includes_build_a_tree() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline('b')")
            .with("b", "$inline('c')")
            .with("c", "foo"),
    );

    let root = inliner.resolve(file("a"), None).await.unwrap();
    assert_eq!(root.content.as_text(), Some("foo"));
    assert_eq!(root.children.len(), 1);

    let b = &root.children[0];
    assert_eq!(b.target, file("b"));
    assert_eq!(b.content.as_text(), Some("foo"));
    assert_eq!(b.children.len(), 1);

    let c = &b.children[0];
    assert_eq!(c.target, file("c"));
    assert_eq!(c.content.as_text(), Some("foo"));
    assert!(c.children.is_empty());
}

// ---------------------------------------------------------------------------
// Depth bound
// ---------------------------------------------------------------------------

/// `chain:N` includes `chain:N-1` until it reaches zero.
fn chain_inliner() -> Inliner {
    let mut inliner = Inliner::new();
    inliner
        .resources_mut()
        .add(Arc::new(ResourceFn::new("chain", |_, target| {
            let n: usize = target.first_arg().unwrap_or("0").parse().unwrap_or(0);
            if n == 0 {
                Ok(Content::from("end"))
            } else {
                Ok(Content::Text(format!("$inline('chain:{}')", n - 1)))
            }
        })));
    inliner
}

#[tokio::test]
async fn depth_at_limit_succeeds() {
    let inliner = chain_inliner();
    let node = inliner
        .resolve(Target::new("chain", vec!["10".into()]), None)
        .await
        .unwrap();
    assert_eq!(node.content.as_text(), Some("end"));
}

#[tokio::test]
async fn depth_past_limit_fails() {
    let inliner = chain_inliner();
    let err = inliner
        .resolve(Target::new("chain", vec!["11".into()]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::MaxDepthExceeded { limit: 10 }));
}

#[tokio::test]
async fn max_depth_is_configurable() {
    let mut inliner = Inliner::with_options(InlinerOptions {
        max_depth: 2,
        ..InlinerOptions::default()
    });
    inliner.use_config(InlinerConfig {
        resources: vec![Arc::new(
            MemoryResource::new("file")
                .with("a", "$inline('b')")
                .with("b", "$inline('c')")
                .with("c", "$inline('d')")
                .with("d", "deep"),
        )],
        ..InlinerConfig::default()
    });

    let err = inliner.resolve(file("a"), None).await.unwrap_err();
    assert_eq!(err.to_string(), "Max recursion depth 2 exceeded");
    assert!(inliner.resolve(file("b"), None).await.is_ok());
}

// ---------------------------------------------------------------------------
// Shortcuts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shortcut_is_visible_later_in_same_resource() {
    let inliner = inliner_with(
        MemoryResource::new("file").with("a", "$inline.shortcut('m','text:hi')<$inline('m')>"),
    );

    let text = resolve_text(&inliner, "a").await.unwrap();
    assert_eq!(text, "$inline.shortcut('m','text:hi')<hi>");
}

#[tokio::test]
async fn shortcut_is_not_visible_in_included_resource() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline.shortcut('m','text:hi')$inline('b')")
            .with("b", "$inline('m')"),
    );

    let err = inliner.resolve(file("a"), None).await.unwrap_err();
    assert!(
        matches!(&err, ResolveError::Resource { message, .. } if message.contains("'m'")),
        "{:?}",
        err
    );
}

#[tokio::test]
async fn shortcut_is_not_visible_in_including_resource() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline('b')$inline('m')")
            .with("b", "$inline.shortcut('m','text:hi')"),
    );

    assert!(inliner.resolve(file("a"), None).await.is_err());
}

#[tokio::test]
async fn global_shortcuts_reach_every_resource() {
    let mut inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline('b')")
            .with("b", "[$inline('greet:world')]"),
    );
    inliner.add_shortcut(Shortcut::template("greet", "text:hello $1"));

    let text = resolve_text(&inliner, "a").await.unwrap();
    assert_eq!(text, "[hello world]");
}

#[tokio::test]
async fn function_shortcut_sees_including_target() {
    let mut inliner = inliner_with(MemoryResource::new("file").with("a", "$inline('where')"));
    inliner.add_shortcut(Shortcut::function("where", |source, _args| {
        let from = source.and_then(Target::first_arg).unwrap_or("nowhere");
        format!("text:from {}", from)
    }));

    let text = resolve_text(&inliner, "a").await.unwrap();
    assert_eq!(text, "from a");
}

#[tokio::test]
async fn shortcuts_may_reference_other_shortcuts() {
    let mut inliner = inliner_with(MemoryResource::new("file").with("a", "$inline('outer:x')"));
    inliner.add_shortcut(Shortcut::template("outer", "inner:$1|suffix:!"));
    inliner.add_shortcut(Shortcut::template("inner", "text:<$1>"));

    let text = resolve_text(&inliner, "a").await.unwrap();
    assert_eq!(text, "<x>!");
}

#[tokio::test]
async fn shortcut_naming_itself_reads_the_resource() {
    let mut inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline('b.txt')")
            .with("b.txt", "  padded  "),
    );
    inliner.add_shortcut(Shortcut::template("b.txt", "b.txt|trim"));

    let text = resolve_text(&inliner, "a").await.unwrap();
    assert_eq!(text, "padded");
}

#[tokio::test]
async fn numeric_shortcut_declaration_is_rejected() {
    let inliner = inliner_with(MemoryResource::new("file").with("a", "$inline.shortcut('m', 3)"));

    let err = inliner.resolve(file("a"), None).await.unwrap_err();
    assert!(matches!(err, ResolveError::InvalidShortcut(_)));
}

// ---------------------------------------------------------------------------
// Transforms and directive forms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transforms_run_left_to_right() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline('b|trim|prefix:[|suffix:]')")
            .with("b", "  body \n"),
    );

    assert_eq!(resolve_text(&inliner, "a").await.unwrap(), "[body]");
}

#[tokio::test]
async fn transformed_content_is_stored_on_child_node() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline('b|string')")
            .with("b", "say \"hi\""),
    );

    let root = inliner.resolve(file("a"), None).await.unwrap();
    assert_eq!(root.content.as_text(), Some(r#""say \"hi\"""#));
    assert_eq!(root.children[0].content, root.content);
}

#[tokio::test]
async fn indent_uses_directive_line() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "fn main() {\n    $inline('b|indent')\n}")
            .with("b", "one();\ntwo();"),
    );

    assert_eq!(
        resolve_text(&inliner, "a").await.unwrap(),
        "fn main() {\n    one();\n    two();\n}"
    );
}

#[tokio::test]
async fn line_and_block_directives_replace_their_spans() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with(
                "a",
                "top\n// $inline.line('text:LINE')\n/* $inline.start('text:BLOCK') */\nold\n/* $inline.end */\n",
            ),
    );

    assert_eq!(
        resolve_text(&inliner, "a").await.unwrap(),
        "top\nLINE\n/* $inline.start('text:BLOCK') */\nBLOCK\n/* $inline.end */\n"
    );
}

#[tokio::test]
async fn skipped_text_is_not_resolved() {
    let inliner = inliner_with(
        MemoryResource::new("file").with("a", "$inline.skipStart\n$inline('missing')\n$inline.skipEnd"),
    );

    assert_eq!(
        resolve_text(&inliner, "a").await.unwrap(),
        "$inline.skipStart\n$inline('missing')\n$inline.skipEnd"
    );
}

#[tokio::test]
async fn unknown_transform_fails() {
    let inliner = inliner_with(MemoryResource::new("file").with("a", "$inline('text:x|nope')"));

    let err = inliner.resolve(file("a"), None).await.unwrap_err();
    assert!(matches!(err, ResolveError::UnknownTransform { name } if name == "nope"));
}

#[tokio::test]
async fn unknown_resource_fails() {
    let inliner = inliner_with(MemoryResource::new("file").with("a", "$inline('ftp:host')"));

    let err = inliner.resolve(file("a"), None).await.unwrap_err();
    assert!(matches!(err, ResolveError::UnknownResource { name } if name == "ftp"));
}

#[tokio::test]
async fn unknown_entry_resource_fails_before_reading() {
    let inliner = Inliner::new();
    let err = inliner
        .resolve_request(ResolveRequest::new(file("a")).with_content("plain"))
        .await
        .unwrap_err();
    assert!(matches!(err, ResolveError::UnknownResource { name } if name == "file"));
}

#[tokio::test]
async fn parse_error_carries_failing_text() {
    let inliner = inliner_with(
        MemoryResource::new("file")
            .with("a", "$inline('b')")
            .with("b", "ok\n$inline.bogus('x')"),
    );

    let err = inliner.resolve(file("a"), None).await.unwrap_err();
    match err {
        ResolveError::Parse {
            target,
            source_text,
            error,
        } => {
            assert_eq!(target, file("b"));
            assert_eq!(&*source_text, "ok\n$inline.bogus('x')");
            assert_eq!(error.position(), 3);
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[tokio::test]
async fn directive_without_target_is_a_parse_error() {
    let inliner = inliner_with(MemoryResource::new("file").with("a", "x $inline() y"));

    let err = inliner.resolve(file("a"), None).await.unwrap_err();
    assert!(matches!(err, ResolveError::Parse { .. }));
}

#[tokio::test]
async fn default_resource_is_configurable() {
    let mut inliner = Inliner::with_options(InlinerOptions {
        default_resource: "mem".to_string(),
        ..InlinerOptions::default()
    });
    inliner.resources_mut().add(Arc::new(TextResource));
    inliner
        .resources_mut()
        .add(Arc::new(MemoryResource::new("mem").with("a", "<$inline('b')>").with("b", "B")));

    let node = inliner
        .resolve(Target::new("mem", vec!["a".into()]), None)
        .await
        .unwrap();
    assert_eq!(node.content.as_text(), Some("<B>"));
    assert_eq!(node.children[0].target, Target::new("mem", vec!["b".into()]));
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

/// `slow:value,millis` returns `value` after sleeping.
struct Slow;

#[async_trait]
impl ResourceHandler for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    async fn read(&self, _source: Option<&Target>, target: &Target) -> Result<Content, ResolveError> {
        let millis: u64 = target.args[1].parse().unwrap();
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(Content::from(target.args[0].as_str()))
    }
}

#[tokio::test]
async fn output_order_follows_source_order() {
    let mut inliner = Inliner::new();
    inliner.resources_mut().add(Arc::new(Slow));
    inliner.resources_mut().add(Arc::new(TextResource));

    let request = ResolveRequest::new(Target::new("text", vec![]))
        .with_content("$inline('slow:first,40')-$inline('slow:second,1')-$inline('slow:third,20')");
    let node = inliner.resolve_request(request).await.unwrap();

    assert_eq!(node.content.as_text(), Some("first-second-third"));
    let order: Vec<&str> = node
        .children
        .iter()
        .map(|c| c.target.args[0].as_str())
        .collect();
    assert_eq!(order, ["first", "second", "third"]);
}

#[tokio::test]
async fn siblings_resolve_concurrently() {
    let mut inliner = Inliner::new();
    inliner.resources_mut().add(Arc::new(Slow));
    inliner.resources_mut().add(Arc::new(TextResource));

    let request = ResolveRequest::new(Target::new("text", vec![]))
        .with_content("$inline('slow:a,200')$inline('slow:b,200')$inline('slow:c,200')");

    let started = std::time::Instant::now();
    inliner.resolve_request(request).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(550));
}
