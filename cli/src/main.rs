mod config;
mod test_runner;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use inliner::Target;
use resolver::{ResolutionNode, ResolveError};

use crate::config::FileConfig;

const SUBCOMMANDS: &[&str] = &["run", "tree", "test", "help"];

/// Global options that take a value, so their value is not mistaken for the
/// input file when no subcommand is given.
const VALUE_OPTIONS: &[&str] = &["--config", "--max-depth"];

#[derive(Parser)]
#[command(name = "inline", version, about = "Expand $inline directives")]
struct Cli {
    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log resolution steps to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to inline.toml next to the input)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum include depth, overriding the configuration file
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a file and print the expanded content
    Run(RunArgs),

    /// Print the dependency tree of a file
    Tree(TreeArgs),

    /// Run .test.md fixture files
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// File to expand
    file: PathBuf,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
struct TreeArgs {
    /// File to inspect
    file: PathBuf,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: PathBuf,

    /// Run only tests in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse_from(with_default_subcommand(std::env::args().collect()));
    init_tracing(cli.verbose);

    let code = match &cli.command {
        Command::Run(args) => do_run(&cli, args).await,
        Command::Tree(args) => do_tree(&cli, args).await,
        Command::Test(args) => {
            if args.list_categories {
                test_runner::list_categories(&args.path);
                0
            } else {
                test_runner::run_tests(&args.path, cli.no_color, &args.category).await
            }
        }
    };
    process::exit(code);
}

/// `inline file.txt` behaves like `inline run file.txt`.
fn with_default_subcommand(mut args: Vec<String>) -> Vec<String> {
    let mut expects_value = false;
    let mut first = None;
    for (i, arg) in args.iter().enumerate().skip(1) {
        if expects_value {
            expects_value = false;
        } else if VALUE_OPTIONS.contains(&arg.as_str()) {
            expects_value = true;
        } else if !arg.starts_with('-') {
            first = Some((i, arg.as_str()));
            break;
        }
    }

    if let Some((pos, name)) = first {
        if !SUBCOMMANDS.contains(&name) {
            args.insert(pos, "run".to_string());
        }
    }
    args
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn resolve_file(cli: &Cli, file: &Path) -> Result<ResolutionNode, i32> {
    let config = FileConfig::discover(cli.config.as_deref(), file).map_err(|e| {
        eprintln!("error: {}", e);
        1
    })?;
    let inliner = config.build(cli.max_depth);

    let entry = Target::new("file", vec![file.to_string_lossy().into_owned()]);
    inliner.resolve(entry, None).await.map_err(|error| {
        report_error(&error, cli.no_color);
        1
    })
}

async fn do_run(cli: &Cli, args: &RunArgs) -> i32 {
    let node = match resolve_file(cli, &args.file).await {
        Ok(node) => node,
        Err(code) => return code,
    };

    let bytes = node.content.as_bytes();
    let written = match &args.output {
        Some(path) => tokio::fs::write(path, bytes)
            .await
            .map_err(|e| format!("cannot write '{}': {}", path.display(), e)),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(bytes)
                .and_then(|()| stdout.flush())
                .map_err(|e| format!("cannot write output: {}", e))
        }
    };

    match written {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    }
}

async fn do_tree(cli: &Cli, args: &TreeArgs) -> i32 {
    let node = match resolve_file(cli, &args.file).await {
        Ok(node) => node,
        Err(code) => return code,
    };

    node.walk(&mut |node, depth| {
        let kind = if node.content.is_binary() { ", binary" } else { "" };
        println!(
            "{}{} ({} bytes{})",
            "  ".repeat(depth),
            node.target,
            node.content.len(),
            kind
        );
    });
    0
}

fn color_choice(no_color: bool) -> ColorChoice {
    if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// Parse errors are rendered against the text that failed; everything else
/// is a one-line message.
fn report_error(error: &ResolveError, no_color: bool) {
    let ResolveError::Parse {
        target,
        source_text,
        error: parse,
    } = error
    else {
        eprintln!("error: {}", error);
        return;
    };

    let name = target
        .first_arg()
        .map(str::to_string)
        .unwrap_or_else(|| target.to_string());
    let mut files = SimpleFiles::new();
    let file_id = files.add(name, source_text.to_string());

    let writer = StandardStream::stderr(color_choice(no_color));
    let config = term::Config::default();
    let diagnostic = parse.to_diagnostic(file_id);
    let _ = term::emit_to_write_style(&mut writer.lock(), &config, &files, &diagnostic);
}

#[cfg(test)]
mod tests {
    use super::with_default_subcommand;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_file_gets_run() {
        assert_eq!(
            with_default_subcommand(args(&["inline", "doc.md"])),
            args(&["inline", "run", "doc.md"])
        );
    }

    #[test]
    fn option_values_are_skipped() {
        assert_eq!(
            with_default_subcommand(args(&["inline", "--max-depth", "3", "doc.md"])),
            args(&["inline", "--max-depth", "3", "run", "doc.md"])
        );
    }

    #[test]
    fn explicit_subcommand_is_kept() {
        assert_eq!(
            with_default_subcommand(args(&["inline", "tree", "doc.md"])),
            args(&["inline", "tree", "doc.md"])
        );
    }
}
