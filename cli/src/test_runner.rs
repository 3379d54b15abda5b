use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;

use inliner::Target;
use resolver::resource::MemoryResource;
use resolver::{ResolutionNode, ResolveError, ResolveRequest};

use crate::config::{FileConfig, ShortcutEntry};

/// Name the fixture's own document is resolved under.
const ENTRY: &str = "main";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Expected resolved text (trimmed comparison).
    #[serde(default)]
    pub expect_output: Option<String>,

    /// The resolution error's Display string must contain this substring.
    #[serde(default)]
    pub expect_error: Option<String>,

    /// If true, resolution must fail with a parse error.
    #[serde(default)]
    pub expect_parse_error: bool,

    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Global shortcuts, as in `inline.toml`.
    #[serde(default)]
    pub shortcuts: Vec<ShortcutEntry>,

    /// Virtual files served by the `file` resource.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// Split a `.test.md` file into its TOML config and entry document.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');

    let after_open = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest = &after_open[close_pos + 4..];
    let document = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, document))
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn label(&self) -> &str {
        self.description.as_deref().unwrap_or_else(|| {
            self.path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.trim_end_matches(".test.md"))
                .unwrap_or("?")
        })
    }
}

async fn run_single_test(path: &Path) -> TestResult {
    let fail = |reason: String| TestResult {
        path: path.to_path_buf(),
        description: None,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => return fail(format!("cannot read file: {}", e)),
    };

    let (config, document) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(format!("frontmatter error: {}", e)),
    };

    let result = resolve_fixture(&config, document).await;
    let outcome = match check(&config, result) {
        None => TestOutcome::Pass,
        Some(reason) => TestOutcome::Fail(reason),
    };

    TestResult {
        path: path.to_path_buf(),
        description: config.description,
        outcome,
    }
}

/// Resolve the fixture document with the built-in engine, its `file`
/// resource replaced by the fixture's virtual files.
async fn resolve_fixture(config: &TestConfig, document: &str) -> Result<ResolutionNode, ResolveError> {
    let engine_config = FileConfig {
        max_depth: config.max_depth,
        default_resource: None,
        shortcuts: config.shortcuts.clone(),
    };
    let mut inliner = engine_config.build(None);

    let mut files = MemoryResource::new("file");
    for (name, text) in &config.files {
        files.insert(name.clone(), text.clone());
    }
    inliner.resources_mut().add(Arc::new(files));

    let entry = Target::new("file", vec![ENTRY.to_string()]);
    inliner
        .resolve_request(ResolveRequest::new(entry).with_content(document))
        .await
}

/// Compare a resolution against the fixture's expectations. Returns
/// `Some(reason)` on mismatch.
fn check(config: &TestConfig, result: Result<ResolutionNode, ResolveError>) -> Option<String> {
    if config.expect_parse_error {
        return match result {
            Err(ResolveError::Parse { error, .. }) => match &config.expect_error {
                Some(expected) if !error.message.contains(expected.as_str()) => Some(format!(
                    "expected parse error containing \"{}\", got: {}",
                    expected, error
                )),
                _ => None,
            },
            Err(other) => Some(format!("expected parse error, got: {}", other)),
            Ok(_) => Some("expected parse error, but resolution succeeded".into()),
        };
    }

    match (&config.expect_error, &config.expect_output, result) {
        (Some(expected), _, Err(err)) => {
            let err_str = err.to_string();
            if err_str.contains(expected.as_str()) {
                None
            } else {
                Some(format!(
                    "expected error containing \"{}\", got: {}",
                    expected, err_str
                ))
            }
        }
        (Some(expected), _, Ok(_)) => Some(format!(
            "expected error containing \"{}\", but resolution succeeded",
            expected
        )),
        (None, _, Err(err)) => Some(format!("unexpected error: {}", err)),
        (None, Some(expected), Ok(node)) => {
            let actual = String::from_utf8_lossy(node.content.as_bytes());
            let actual = actual.trim();
            let expected = expected.trim();
            if actual == expected {
                None
            } else {
                Some(format!(
                    "output mismatch\n  expected: {}\n  actual:   {}",
                    expected, actual
                ))
            }
        }
        (None, None, Ok(_)) => None,
    }
}

/// Discover `.test.md` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.md"))
        {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(cat), files.len());
    }
}

/// Keep the categories named in `requested` (and their subfolders).
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }

    let mut selected = BTreeMap::new();
    for requested in requested {
        let req = requested.trim_matches('/');
        let prefix = format!("{}/", req);
        let mut found = false;
        for (cat, files) in all {
            if cat == req || cat.starts_with(&prefix) {
                selected.insert(cat.as_str(), files.as_slice());
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all.keys()
                    .map(|k| category_label(k))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }
    selected
}

struct Palette {
    no_color: bool,
}

impl Palette {
    fn paint(&self, code: &str, s: &str) -> String {
        if self.no_color {
            s.to_string()
        } else {
            format!("\x1b[{}m{}\x1b[0m", code, s)
        }
    }

    fn pass(&self) -> String {
        self.paint("32", "PASS")
    }

    fn fail(&self) -> String {
        self.paint("31", "FAIL")
    }
}

/// Run all `.test.md` files under `path` (or a single file). If `categories`
/// is non-empty, only tests in those categories run. Returns the exit code.
pub async fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let palette = Palette { no_color };

    let all = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover_categorized(path)
    };
    if all.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return 1;
    }

    let selected = if path.is_file() {
        select_categories(&all, &[])
    } else {
        select_categories(&all, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", palette.paint("1", category_label(cat)));
        }

        for file in *files {
            let result = run_single_test(file).await;
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", palette.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", palette.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!("test result: {}. {} passed, 0 failed", palette.paint("32", "ok"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            palette.paint("31", "FAILED"),
            passed,
            failed,
            passed + failed
        );
        1
    }
}
