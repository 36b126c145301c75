use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser};
use strum::IntoEnumIterator;
use xtask::Package;

// ----------------------------------------------------------------------------
// Command-line Interface

#[derive(Debug, Parser)]
enum Cli {
    /// Build the specified package with the given options.
    BuildPackage(BuildPackageArgs),
    /// Check or apply the formatting of the specified package(s).
    FmtPackages(FmtPackagesArgs),
    /// Lint the specified package(s) with every supported feature set.
    LintPackages(LintPackagesArgs),
    /// Run the host tests of the specified package(s).
    RunTests(RunTestsArgs),
}

#[derive(Debug, Args)]
struct BuildPackageArgs {
    /// Package to build.
    #[arg(value_enum)]
    package: Package,
    /// Target to build for.
    #[arg(long)]
    target: Option<String>,
    /// Features to build with.
    #[arg(long, value_delimiter = ',')]
    features: Vec<String>,
    /// Toolchain to build with.
    #[arg(long)]
    toolchain: Option<String>,
    /// Don't enable the default features.
    #[arg(long)]
    no_default_features: bool,
}

#[derive(Debug, Args)]
struct FmtPackagesArgs {
    /// Only check the formatting, fail if changes are needed.
    #[arg(long)]
    check: bool,
    /// Package(s) to target.
    #[arg(value_enum, default_values_t = Package::iter())]
    packages: Vec<Package>,
}

#[derive(Debug, Args)]
struct LintPackagesArgs {
    /// Toolchain to lint with.
    #[arg(long)]
    toolchain: Option<String>,
    /// Package(s) to target.
    #[arg(value_enum, default_values_t = Package::iter())]
    packages: Vec<Package>,
}

#[derive(Debug, Args)]
struct RunTestsArgs {
    /// Package(s) to target.
    #[arg(value_enum, default_values_t = Package::iter())]
    packages: Vec<Package>,
}

// ----------------------------------------------------------------------------
// Application

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_module("xtask", log::LevelFilter::Info)
        .init();

    let workspace = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace = workspace
        .parent()
        .context("xtask is not inside a workspace")?
        .canonicalize()?;

    match Cli::parse() {
        Cli::BuildPackage(args) => build_package(&workspace, args),
        Cli::FmtPackages(args) => fmt_packages(&workspace, args),
        Cli::LintPackages(args) => lint_packages(&workspace, args),
        Cli::RunTests(args) => run_tests(&workspace, args),
    }
}

// ----------------------------------------------------------------------------
// Subcommands

fn build_package(workspace: &Path, args: BuildPackageArgs) -> Result<()> {
    let package_path = xtask::package_path(workspace, args.package);

    xtask::build_package(
        &package_path,
        args.features,
        args.no_default_features,
        args.toolchain,
        args.target,
    )
}

fn fmt_packages(workspace: &Path, mut args: FmtPackagesArgs) -> Result<()> {
    args.packages.sort();
    args.packages.dedup();

    for package in args.packages {
        xtask::format_package(workspace, package, args.check)?;
    }

    Ok(())
}

fn lint_packages(workspace: &Path, mut args: LintPackagesArgs) -> Result<()> {
    args.packages.sort();
    args.packages.dedup();

    for package in args.packages {
        xtask::lint_package(workspace, package, args.toolchain.as_deref())?;
    }

    Ok(())
}

fn run_tests(workspace: &Path, mut args: RunTestsArgs) -> Result<()> {
    args.packages.sort();
    args.packages.dedup();

    let mut failed = Vec::new();
    for package in args.packages {
        if let Err(e) = xtask::run_tests(workspace, package) {
            log::error!("{e:#}");
            failed.push(package);
        }
    }

    anyhow::ensure!(failed.is_empty(), "Tests failed for: {:?}", failed);

    Ok(())
}
