//! Tools for working with Cargo.

use std::{
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{bail, Result};

/// Execute cargo with the given arguments and from the specified directory.
pub fn run(args: &[String], cwd: &Path) -> Result<()> {
    if !cwd.is_dir() {
        bail!("The `cwd` argument MUST be a directory");
    }

    log::debug!("cargo {}", args.join(" "));

    let status = Command::new(get_cargo())
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()?;

    // CI relies on the exit code.
    if status.success() {
        Ok(())
    } else {
        bail!("Failed to execute `cargo {}`", args.join(" "))
    }
}

fn get_cargo() -> String {
    match std::env::var("CARGO") {
        Ok(cargo) if !cargo.is_empty() => cargo,
        _ => String::from("cargo"),
    }
}

#[derive(Debug, Default)]
pub struct CargoArgsBuilder {
    toolchain: Option<String>,
    subcommand: String,
    target: Option<String>,
    features: Vec<String>,
    no_default_features: bool,
    args: Vec<String>,
    trailing: Vec<String>,
}

impl CargoArgsBuilder {
    #[must_use]
    pub fn toolchain<S>(mut self, toolchain: S) -> Self
    where
        S: Into<String>,
    {
        self.toolchain = Some(toolchain.into());
        self
    }

    #[must_use]
    pub fn subcommand<S>(mut self, subcommand: S) -> Self
    where
        S: Into<String>,
    {
        self.subcommand = subcommand.into();
        self
    }

    #[must_use]
    pub fn target<S>(mut self, target: S) -> Self
    where
        S: Into<String>,
    {
        self.target = Some(target.into());
        self
    }

    #[must_use]
    pub fn features(mut self, features: &[String]) -> Self {
        self.features.extend_from_slice(features);
        self
    }

    #[must_use]
    pub fn no_default_features(mut self, no_default_features: bool) -> Self {
        self.no_default_features = no_default_features;
        self
    }

    #[must_use]
    pub fn arg<S>(mut self, arg: S) -> Self
    where
        S: Into<String>,
    {
        self.args.push(arg.into());
        self
    }

    /// Arguments passed through to the tool after `--`.
    #[must_use]
    pub fn trailing_arg<S>(mut self, arg: S) -> Self
    where
        S: Into<String>,
    {
        self.trailing.push(arg.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<String> {
        let mut args = vec![];

        if let Some(toolchain) = self.toolchain {
            args.push(format!("+{toolchain}"));
        }

        args.push(self.subcommand);

        if let Some(target) = self.target {
            args.push(format!("--target={target}"));
        }

        if !self.features.is_empty() {
            args.push(format!("--features={}", self.features.join(",")));
        }

        if self.no_default_features {
            args.push("--no-default-features".into());
        }

        args.extend(self.args);

        if !self.trailing.is_empty() {
            args.push("--".into());
            args.extend(self.trailing);
        }

        args
    }
}
