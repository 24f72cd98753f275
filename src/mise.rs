//! Version oracle backed by the `mise` binary.
//!
//! Resolution shells out to `mise latest --verbose <pkg>@<version>` and
//! treats trimmed stdout as the canonical version. Invocations are
//! serialized across processes with an exclusive advisory lock on a file in
//! the cache directory, since multiple plan generations may share one host.

use crate::resolver::VersionOracle;
use anyhow::{anyhow, Context, Result};
use fs2::FileExt;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

/// Default cache directory for oracle state.
pub const INSTALL_DIR: &str = "/tmp/railpack/mise";

const DEFAULT_BINARY: &str = "mise";

pub struct Mise {
    binary_path: String,
    cache_dir: PathBuf,
}

impl Mise {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let binary_path = std::env::var("RAILPACK_MISE_BINARY")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BINARY.to_string());

        Self {
            binary_path,
            cache_dir: cache_dir.into(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        std::fs::create_dir_all(&self.cache_dir).with_context(|| {
            format!("failed to create cache dir {}", self.cache_dir.display())
        })?;

        let lock_path = self.cache_dir.join("lock");
        let lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("failed to open lock file {}", lock_path.display()))?;

        lock_file
            .lock_exclusive()
            .with_context(|| format!("failed to lock {}", lock_path.display()))?;

        let result = self.run_locked(args);

        if let Err(err) = fs2::FileExt::unlock(&lock_file) {
            tracing::warn!("failed to release lock {}: {err}", lock_path.display());
        }

        result
    }

    fn run_locked(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.binary_path)
            .args(args)
            .env_clear()
            .env("MISE_CACHE_DIR", self.cache_dir.join("cache"))
            .env("MISE_DATA_DIR", self.cache_dir.join("data"))
            .env("PATH", std::env::var("PATH").unwrap_or_default())
            .output()
            .with_context(|| format!("failed to run {} {}", self.binary_path, args.join(" ")))?;

        if !output.status.success() {
            return Err(anyhow!(
                "mise command `{} {}` failed: {}\nstderr: {}",
                self.binary_path,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VersionOracle for Mise {
    fn latest(&self, name: &str, query: &str) -> Result<String> {
        let spec = format!("{name}@{}", query.trim());
        let output = self.run(&["latest", "--verbose", &spec])?;

        let version = output.trim().to_string();
        if version.is_empty() {
            return Err(anyhow!("failed to get latest version for {spec}"));
        }

        Ok(version)
    }
}

#[derive(Serialize)]
struct MisePackage {
    version: String,
}

#[derive(Serialize)]
struct MiseConfig {
    tools: BTreeMap<String, MisePackage>,
}

/// Render a `mise.toml` installing the given packages. Output is sorted by
/// package name so identical inputs produce identical bytes.
pub fn generate_mise_toml(packages: &BTreeMap<String, String>) -> Result<String> {
    let config = MiseConfig {
        tools: packages
            .iter()
            .map(|(name, version)| {
                (
                    name.clone(),
                    MisePackage {
                        version: version.clone(),
                    },
                )
            })
            .collect(),
    };

    toml::to_string(&config).context("failed to generate mise.toml")
}
