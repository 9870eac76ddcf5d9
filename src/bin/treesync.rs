//! # treesync CLI - Converge a directory toward a manifest
//!
//! ## Usage
//! ```bash
//! # Apply a manifest to the current directory
//! treesync apply state.json
//!
//! # Show what would change without touching anything
//! treesync apply state.json --root /var/lib/app --dry-run
//!
//! # Exit with status 1 if the tree has drifted
//! treesync check state.json --root /var/lib/app
//! ```
//!
//! Exit status: 0 on success, 1 when `check` finds drift, 2 on error.

use clap::{Parser, Subcommand};
use colored::*;
use humantime::format_duration;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use treesync::{Manifest, Result, SyncPlan, SyncReport};

/// treesync CLI - converge directory trees toward a declared state
#[derive(Parser)]
#[command(name = "treesync")]
#[command(version)]
#[command(about = "Create, rewrite and prune files so a directory matches a manifest")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Converge the tree toward the manifest
    Apply {
        /// Manifest file (JSON)
        manifest: PathBuf,

        /// Directory to sync (defaults to current)
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Only show what would change
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report drift without changing anything
    Check {
        /// Manifest file (JSON)
        manifest: PathBuf,

        /// Directory to check (defaults to current)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
            std::process::exit(2);
        }
    }
}

/// Main command runner, returning the exit status
fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Apply { manifest, root, dry_run, json } => {
            cmd_apply(&manifest, root.unwrap_or_else(|| PathBuf::from(".")), dry_run, json)
        }
        Commands::Check { manifest, root } => {
            cmd_check(&manifest, root.unwrap_or_else(|| PathBuf::from(".")))
        }
    }
}

/// Load a manifest, resolving `source` paths next to it
fn load(manifest_path: &Path) -> Result<(Manifest, treesync::ExpectedTree)> {
    let manifest = Manifest::load(manifest_path)?;
    let base_dir = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let expected = manifest.expected_tree(base_dir)?;
    Ok((manifest, expected))
}

/// Apply a manifest
///
/// Declared files are written when missing or different; governed files
/// that are not declared are deleted. With `--dry-run` only the plan is
/// printed.
fn cmd_apply(manifest_path: &Path, root: PathBuf, dry_run: bool, json: bool) -> Result<i32> {
    let (manifest, expected) = load(manifest_path)?;
    let engine = manifest.builder()?.build()?;

    let start = Instant::now();
    let plan = engine.plan(&root, &expected)?;

    if dry_run {
        if json {
            println!("{}", serde_json::to_string_pretty(&plan.to_report())?);
        } else {
            print_plan(&root, &plan);
        }
        return Ok(0);
    }

    let report = engine.apply(&root, &plan)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(0);
    }

    print_report(&report);
    println!(
        "{} Synced {} in {}",
        "✓".green().bold(),
        root.display().to_string().cyan(),
        format_duration(start.elapsed()).to_string().cyan()
    );
    Ok(0)
}

/// Check a tree against a manifest
fn cmd_check(manifest_path: &Path, root: PathBuf) -> Result<i32> {
    let (manifest, expected) = load(manifest_path)?;
    let engine = manifest.builder()?.build()?;
    let plan = engine.plan(&root, &expected)?;

    if plan.is_empty() {
        println!("{} {} is up to date", "✓".green().bold(), root.display().to_string().cyan());
        return Ok(0);
    }

    print_plan(&root, &plan);
    Ok(1)
}

fn print_plan(root: &Path, plan: &SyncPlan<'_>) {
    if plan.is_empty() {
        println!("{} {} is up to date", "✓".green().bold(), root.display().to_string().cyan());
        return;
    }

    println!("{}", "Pending changes:".blue().bold());
    for write in &plan.writes {
        println!("  {} {} ({})", "~".yellow(), write.path, write.reason.to_string().dimmed());
    }
    for removal in &plan.removals {
        println!("  {} {}", "-".red(), removal.path);
    }
    println!(
        "\n{} to write, {} to remove",
        plan.writes.len().to_string().yellow(),
        plan.removals.len().to_string().red()
    );
}

fn print_report(report: &SyncReport) {
    if report.is_empty() {
        println!("{}", "Nothing to do".green());
        return;
    }
    for path in &report.changed {
        println!("  {} {}", "~".yellow(), path);
    }
    for path in &report.removed {
        println!("  {} {}", "-".red(), path);
    }
    println!(
        "\n{} changed, {} removed",
        report.changed.len().to_string().yellow(),
        report.removed.len().to_string().red()
    );
}
