use std::sync::Arc;

use inliner::{Param, parse_pipes};
use resolver::{Expansion, ResolveError, Shortcut, ShortcutScope};

fn expand_with(shortcut: Shortcut, text: &str) -> Option<String> {
    let mut scope = ShortcutScope::new();
    scope.add(shortcut);
    scope.expand(None, &parse_pipes(text).segments)
}

#[test]
fn template_positional_argument() {
    let out = expand_with(Shortcut::template("test", "a.txt|tr:$1"), "test:abc");
    assert_eq!(out.as_deref(), Some("a.txt|tr:abc"));
}

#[test]
fn template_multiple_arguments() {
    let out = expand_with(Shortcut::template("test", "a.txt|tr:$1|tr2:$2"), "test:abc,123");
    assert_eq!(out.as_deref(), Some("a.txt|tr:abc|tr2:123"));
}

#[test]
fn template_all_arguments() {
    let out = expand_with(Shortcut::template("test", "a.txt|tr:$&"), "test:abc,123");
    assert_eq!(out.as_deref(), Some("a.txt|tr:abc,123"));
}

#[test]
fn template_all_arguments_are_re_escaped() {
    let out = expand_with(Shortcut::template("test", "a.txt|tr:$&"), r"test:a\,b,c");
    assert_eq!(out.as_deref(), Some(r"a.txt|tr:a\,b,c"));
}

#[test]
fn template_missing_position_is_empty() {
    let out = expand_with(Shortcut::template("test", "a.txt|tr:$1$3"), "test:x");
    assert_eq!(out.as_deref(), Some("a.txt|tr:x"));
}

#[test]
fn template_keeps_lone_dollar() {
    let out = expand_with(Shortcut::template("test", "text:$$1 costs $"), "test:5");
    assert_eq!(out.as_deref(), Some("text:$5 costs $"));
}

#[test]
fn additional_pipes_are_appended() {
    let out = expand_with(Shortcut::template("test", "a.txt|tr"), "test|tr2|tr3");
    assert_eq!(out.as_deref(), Some("a.txt|tr|tr2|tr3"));
}

#[test]
fn function_expansion() {
    let shortcut = Shortcut::function("test", |_source, args| format!("a.txt|{}|{}", args[0], args[1]));
    let out = expand_with(shortcut, "test:123,456");
    assert_eq!(out.as_deref(), Some("a.txt|123|456"));
}

#[test]
fn non_shortcut_head_is_left_alone() {
    let out = expand_with(Shortcut::template("test", "a.txt"), "other:1|test");
    assert_eq!(out, None);
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

#[test]
fn child_scope_falls_back_to_parent() {
    let mut parent = ShortcutScope::new();
    parent.add(Shortcut::template("g", "global"));
    let parent = Arc::new(parent);

    let mut child = parent.child();
    child.add(Shortcut::template("l", "local"));

    assert!(child.has("g"));
    assert!(child.has("l"));
    assert!(!parent.has("l"));
}

#[test]
fn child_scope_shadows_parent() {
    let mut parent = ShortcutScope::new();
    parent.add(Shortcut::template("x", "parent"));
    let parent = Arc::new(parent);

    let mut child = parent.child();
    child.add(Shortcut::template("x", "child"));

    let expand = |scope: &ShortcutScope| scope.expand(None, &parse_pipes("x").segments);
    assert_eq!(expand(&child).as_deref(), Some("child"));
    assert_eq!(expand(&parent).as_deref(), Some("parent"));
}

#[test]
fn siblings_do_not_share_declarations() {
    let parent = Arc::new(ShortcutScope::new());
    let mut first = parent.child();
    let second = parent.child();

    first.add(Shortcut::template("only_first", "x"));
    assert!(!second.has("only_first"));
}

#[test]
fn remove_only_touches_own_layer() {
    let mut parent = ShortcutScope::new();
    parent.add(Shortcut::template("g", "global"));
    let parent = Arc::new(parent);

    let mut child = parent.child();
    assert!(child.remove("g").is_none());
    assert!(child.has("g"));
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[test]
fn declaration_from_string_params() {
    let params = vec![Param::String("a".into()), Param::String("b|trim".into())];
    let shortcut = Shortcut::from_params(&params).unwrap();
    assert_eq!(shortcut.name, "a");
    assert!(matches!(shortcut.expand, Expansion::Template(ref t) if t == "b|trim"));
}

#[test]
fn declaration_rejects_numbers() {
    let params = vec![Param::Number(1.0), Param::String("b".into())];
    assert!(matches!(
        Shortcut::from_params(&params),
        Err(ResolveError::InvalidShortcut(_))
    ));

    let params = vec![Param::String("a".into()), Param::Number(2.0)];
    assert!(matches!(
        Shortcut::from_params(&params),
        Err(ResolveError::InvalidShortcut(_))
    ));
}

#[test]
fn declaration_needs_two_params() {
    let params = vec![Param::String("a".into())];
    assert!(Shortcut::from_params(&params).is_err());
}
