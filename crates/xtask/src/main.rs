//! Project automation tasks for tickerwatch

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Project automation tasks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check for outdated dependencies (needs cargo-outdated)
    CheckDeps,
    /// Run all tests
    Test,
    /// Run clippy lints
    Lint,
    /// Check formatting
    Fmt,
    /// Format, lint and test
    Ci,
    /// Generate test coverage report (needs cargo-llvm-cov)
    Coverage,
}

fn cargo(args: &[&str]) -> anyhow::Result<()> {
    println!("$ cargo {}", args.join(" "));
    let status = Command::new(std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()))
        .args(args)
        .status()
        .with_context(|| format!("failed to run cargo {}", args[0]))?;

    if !status.success() {
        bail!("cargo {} failed with {}", args[0], status);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckDeps => cargo(&["outdated", "--workspace", "--root-deps-only"]),
        Commands::Test => cargo(&["test", "--workspace"]),
        Commands::Lint => cargo(&[
            "clippy",
            "--workspace",
            "--all-targets",
            "--",
            "-D",
            "warnings",
        ]),
        Commands::Fmt => cargo(&["fmt", "--all", "--", "--check"]),
        Commands::Ci => {
            cargo(&["fmt", "--all", "--", "--check"])?;
            cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
            cargo(&["test", "--workspace"])
        }
        Commands::Coverage => cargo(&["llvm-cov", "--workspace", "--html"]),
    }
}
