//! Deferred package version resolution.
//!
//! Providers register version *intents* (a default plus overrides carrying
//! provenance) while planning; versions are materialized once, at plan
//! finalization, against an external version oracle. This keeps planning
//! pure and fast, and lets tests swap the oracle for a fixed table.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

/// Stable handle for a requested package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
}

/// The version a package was last requested at, with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedVersion {
    pub version: String,
    pub source: String,
}

/// A finalized package entry. `resolved_version` is `None` when the oracle
/// failed or was unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPackage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_version: Option<String>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no available version for package `{name}` (tried {tried})")]
    NoAvailableVersion { name: String, tried: String },
}

/// Canonicalizes a version request (e.g. `"8"`) into a concrete version
/// (e.g. `"8.4.3"`). The production implementation shells out to mise.
pub trait VersionOracle {
    fn latest(&self, name: &str, query: &str) -> Result<String>;
}

/// Fixed-table oracle for tests and offline planning.
#[derive(Debug, Clone, Default)]
pub struct StaticVersionOracle {
    versions: BTreeMap<String, String>,
}

impl StaticVersionOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.versions.insert(name.into(), version.into());
        self
    }
}

impl VersionOracle for StaticVersionOracle {
    fn latest(&self, name: &str, query: &str) -> Result<String> {
        self.versions
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no version known for {name}@{query}"))
    }
}

struct VersionOverride {
    version: String,
    source: String,
}

type AvailabilityCheck = Box<dyn Fn(&str) -> bool>;

struct PackageRequest {
    name: String,
    default_version: String,
    overrides: Vec<VersionOverride>,
    version_available: Option<AvailabilityCheck>,
}

/// Tracks package requests and finalizes them against the oracle.
pub struct Resolver {
    requests: Vec<PackageRequest>,
    previous_versions: BTreeMap<String, String>,
    oracle: Box<dyn VersionOracle>,
}

impl Resolver {
    pub fn new(oracle: Box<dyn VersionOracle>) -> Self {
        Self {
            requests: Vec::new(),
            previous_versions: BTreeMap::new(),
            oracle,
        }
    }

    /// Register the baseline version request for a package. Idempotent per
    /// name: subsequent calls return the existing ref without changing the
    /// recorded default.
    pub fn default(&mut self, name: &str, default_version: &str) -> PackageRef {
        if !self.requests.iter().any(|r| r.name == name) {
            self.requests.push(PackageRequest {
                name: name.to_string(),
                default_version: default_version.to_string(),
                overrides: Vec::new(),
                version_available: None,
            });
        }

        PackageRef {
            name: name.to_string(),
        }
    }

    /// Append a version override. The last override wins at resolution time.
    pub fn version(&mut self, pkg: &PackageRef, version: &str, source: &str) {
        let version = version.trim();
        if version.is_empty() {
            return;
        }

        if let Some(request) = self.request_mut(&pkg.name) {
            request.overrides.push(VersionOverride {
                version: version.to_string(),
                source: source.to_string(),
            });
        }
    }

    /// Record the version used by a previous build. Applied only when no
    /// override narrows the request beyond a `latest` default.
    pub fn set_previous_version(&mut self, name: &str, version: &str) {
        self.previous_versions
            .insert(name.to_string(), version.to_string());
    }

    /// Register a predicate verifying that a proposed version is actually
    /// obtainable (e.g. an image tag exists).
    pub fn set_version_available(
        &mut self,
        pkg: &PackageRef,
        check: impl Fn(&str) -> bool + 'static,
    ) {
        if let Some(request) = self.request_mut(&pkg.name) {
            request.version_available = Some(Box::new(check));
        }
    }

    /// The current best-known requested version and its provenance. Reflects
    /// the last override, not the resolved version.
    pub fn get(&self, name: &str) -> Option<RequestedVersion> {
        let request = self.requests.iter().find(|r| r.name == name)?;

        Some(match request.overrides.last() {
            Some(last) => RequestedVersion {
                version: last.version.clone(),
                source: last.source.clone(),
            },
            None => RequestedVersion {
                version: request.default_version.clone(),
                source: "default".to_string(),
            },
        })
    }

    /// Finalize every request. Idempotent: repeated calls yield equal maps.
    pub fn resolve_all(&self) -> Result<BTreeMap<String, ResolvedPackage>> {
        let mut resolved = BTreeMap::new();

        for request in &self.requests {
            let requested = self.select_version(request)?;

            let resolved_version = match self.oracle.latest(&request.name, &requested) {
                Ok(version) => Some(version),
                Err(err) => {
                    warn!(
                        package = %request.name,
                        requested = %requested,
                        "failed to resolve package version: {err:#}"
                    );
                    None
                }
            };

            resolved.insert(
                request.name.clone(),
                ResolvedPackage {
                    name: request.name.clone(),
                    requested_version: Some(requested),
                    resolved_version,
                },
            );
        }

        Ok(resolved)
    }

    /// Pick the version to hand to the oracle: the newest override passing
    /// the availability predicate, then the previous-build hint, then the
    /// default. With a predicate registered, exhausting every candidate is a
    /// hard failure.
    fn select_version(&self, request: &PackageRequest) -> Result<String> {
        let mut candidates: Vec<&str> = request
            .overrides
            .iter()
            .rev()
            .map(|o| o.version.as_str())
            .collect();

        if candidates.is_empty() && request.default_version == "latest" {
            if let Some(previous) = self.previous_versions.get(&request.name) {
                candidates.push(previous);
            }
        }

        candidates.push(&request.default_version);

        match &request.version_available {
            None => Ok(candidates[0].to_string()),
            Some(check) => candidates
                .iter()
                .find(|v| check(v))
                .map(|v| v.to_string())
                .ok_or_else(|| {
                    ResolveError::NoAvailableVersion {
                        name: request.name.clone(),
                        tried: candidates.join(", "),
                    }
                    .into()
                }),
        }
    }

    fn request_mut(&mut self, name: &str) -> Option<&mut PackageRequest> {
        self.requests.iter_mut().find(|r| r.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        Resolver::new(Box::new(
            StaticVersionOracle::new()
                .with("node", "22.9.0")
                .with("php", "8.4.3"),
        ))
    }

    #[test]
    fn test_default_is_idempotent() {
        let mut resolver = resolver();
        resolver.default("node", "22");
        resolver.default("node", "18");

        let requested = resolver.get("node").unwrap();
        assert_eq!(requested.version, "22");
        assert_eq!(requested.source, "default");
    }

    #[test]
    fn test_last_override_wins() {
        let mut resolver = resolver();
        let node = resolver.default("node", "22");
        resolver.version(&node, "18", ".nvmrc");
        resolver.version(&node, "20", "package.json > engines > node");

        let requested = resolver.get("node").unwrap();
        assert_eq!(requested.version, "20");
        assert_eq!(requested.source, "package.json > engines > node");
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let mut resolver = resolver();
        let node = resolver.default("node", "22");
        resolver.version(&node, "  ", "bogus");
        assert_eq!(resolver.get("node").unwrap().source, "default");
    }

    #[test]
    fn test_resolve_all_canonicalizes() {
        let mut resolver = resolver();
        resolver.default("node", "22");

        let resolved = resolver.resolve_all().unwrap();
        let node = &resolved["node"];
        assert_eq!(node.requested_version.as_deref(), Some("22"));
        assert_eq!(node.resolved_version.as_deref(), Some("22.9.0"));
    }

    #[test]
    fn test_oracle_failure_is_soft() {
        let mut resolver = resolver();
        resolver.default("bun", "latest");

        let resolved = resolver.resolve_all().unwrap();
        let bun = &resolved["bun"];
        assert_eq!(bun.requested_version.as_deref(), Some("latest"));
        assert_eq!(bun.resolved_version, None);
    }

    #[test]
    fn test_resolve_all_is_idempotent() {
        let mut resolver = resolver();
        let php = resolver.default("php", "8.4.3");
        resolver.version(&php, "8.2", "composer.json > require > php");

        let first = resolver.resolve_all().unwrap();
        let second = resolver.resolve_all().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_availability_predicate_falls_back_to_older_override() {
        let mut resolver = resolver();
        let php = resolver.default("php", "8.4.3");
        resolver.version(&php, "8.2", "composer.json > require > php");
        resolver.version(&php, "9.9", "RAILPACK_PHP_VERSION");
        resolver.set_version_available(&php, |v| v != "9.9");

        let resolved = resolver.resolve_all().unwrap();
        assert_eq!(resolved["php"].requested_version.as_deref(), Some("8.2"));
    }

    #[test]
    fn test_availability_predicate_exhaustion_is_fatal() {
        let mut resolver = resolver();
        let php = resolver.default("php", "8.4.3");
        resolver.version(&php, "8.2", "composer.json > require > php");
        resolver.set_version_available(&php, |_| false);

        let err = resolver.resolve_all().unwrap_err();
        assert!(err.to_string().contains("no available version"));
        assert!(err.to_string().contains("php"));
    }

    #[test]
    fn test_previous_version_applies_to_latest_default() {
        let mut resolver = resolver();
        resolver.default("node", "latest");
        resolver.set_previous_version("node", "20.11.1");

        let resolved = resolver.resolve_all().unwrap();
        assert_eq!(
            resolved["node"].requested_version.as_deref(),
            Some("20.11.1")
        );
    }

    #[test]
    fn test_previous_version_ignored_when_overridden() {
        let mut resolver = resolver();
        let node = resolver.default("node", "latest");
        resolver.set_previous_version("node", "20.11.1");
        resolver.version(&node, "22", "package.json > engines > node");

        let resolved = resolver.resolve_all().unwrap();
        assert_eq!(resolved["node"].requested_version.as_deref(), Some("22"));
    }
}
