use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Result;
use clap::ValueEnum;
use strum::{Display, EnumIter};

use crate::cargo::CargoArgsBuilder;

pub mod cargo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter, ValueEnum)]
#[strum(serialize_all = "kebab-case")]
pub enum Package {
    HostTest,
    SocConfig,
    SocCpufreq,
    SocHal,
    SocSync,
    SocUsbPhy,
}

impl Package {
    /// Features the package's tests need.
    pub fn test_features(&self) -> Vec<String> {
        match self {
            Package::SocConfig => vec!["build".into()],
            _ => vec![],
        }
    }

    /// Feature combinations that must each pass the linter.
    pub fn lint_feature_sets(&self) -> Vec<Vec<String>> {
        use Package::*;

        match self {
            SocConfig => vec![vec![], vec!["build".into()]],
            SocSync => vec![vec![], vec!["defmt".into()]],
            SocHal | SocUsbPhy | SocCpufreq => {
                vec![vec![], vec!["log".into()], vec!["defmt".into()]]
            }
            HostTest => vec![vec![]],
        }
    }
}

/// Build the package at `package_path`.
pub fn build_package(
    package_path: &Path,
    features: Vec<String>,
    no_default_features: bool,
    toolchain: Option<String>,
    target: Option<String>,
) -> Result<()> {
    log::info!("Building package '{}'", package_path.display());
    if !features.is_empty() {
        log::info!("  Features: {}", features.join(","));
    }
    if let Some(ref target) = target {
        log::info!("  Target:   {}", target);
    }

    let mut builder = CargoArgsBuilder::default()
        .subcommand("build")
        .arg("--release")
        .features(&features)
        .no_default_features(no_default_features);

    if let Some(toolchain) = toolchain {
        builder = builder.toolchain(toolchain);
    }

    if let Some(target) = target {
        builder = builder.target(target);
    }

    cargo::run(&builder.build(), package_path)
}

/// Run the unit, integration and doc tests of `package` on the host.
pub fn run_tests(workspace: &Path, package: Package) -> Result<()> {
    log::info!("Testing package '{}'", package);

    let args = CargoArgsBuilder::default()
        .subcommand("test")
        .features(&package.test_features())
        .build();

    cargo::run(&args, &package_path(workspace, package))
}

/// Run clippy on `package` for each of its feature sets.
pub fn lint_package(workspace: &Path, package: Package, toolchain: Option<&str>) -> Result<()> {
    let path = package_path(workspace, package);

    for features in package.lint_feature_sets() {
        log::info!("Linting package '{}' with features {:?}", package, features);

        let mut builder = CargoArgsBuilder::default()
            .subcommand("clippy")
            .arg("--all-targets")
            .features(&features)
            .trailing_arg("-D")
            .trailing_arg("warnings");

        if let Some(toolchain) = toolchain {
            builder = builder.toolchain(toolchain);
        }

        cargo::run(&builder.build(), &path)?;
    }

    Ok(())
}

/// Run rustfmt on `package`, optionally only checking the formatting.
pub fn format_package(workspace: &Path, package: Package, check: bool) -> Result<()> {
    log::info!("Formatting package '{}'", package);

    let mut builder = CargoArgsBuilder::default().subcommand("fmt");
    if check {
        builder = builder.trailing_arg("--check");
    }

    cargo::run(&builder.build(), &package_path(workspace, package))
}

/// Absolute path of a package's root.
pub fn package_path(workspace: &Path, package: Package) -> PathBuf {
    windows_safe_path(&workspace.join(package.to_string()))
}

/// Every directory of the workspace that holds a Cargo manifest.
pub fn package_paths(workspace: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(workspace)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() && entry.path().join("Cargo.toml").exists() {
            paths.push(entry.path());
        }
    }

    paths.sort();

    Ok(paths)
}

/// Make the path "Windows"-safe
pub fn windows_safe_path(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace("\\\\?\\", ""))
}
