//! User-facing build configuration and its merge semantics.
//!
//! A `Config` can come from CLI options, the environment, or a
//! `railpack.json` file; the three are merged in that precedence order
//! (file highest) before being applied over provider output.

mod merge;

pub use merge::merge;

use crate::plan::{Command, Input};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Explicit provider list. When present, auto-detection is ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<String>>,

    /// User pins for mise packages, name to version.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub packages: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apt_packages: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_apt_packages: Vec<String>,

    /// Overrides and additions for named steps.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub steps: BTreeMap<String, StepConfig>,

    pub deploy: DeployConfig,

    /// Names of secret environment variables exposed to steps.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Input>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands: Option<Vec<Command>>,

    /// Cache keys to attach; they must already exist in the registry.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub caches: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Input>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cmd: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apt_packages: Vec<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_step(&mut self, name: &str) -> &mut StepConfig {
        self.steps.entry(name.to_string()).or_default()
    }
}
