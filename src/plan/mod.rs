//! The serializable build plan emitted by plan generation.
//!
//! A `BuildPlan` is a DAG of steps plus a deploy descriptor. It is immutable
//! once produced; executors consume the serialized form.

mod command;
mod step;

pub use command::Command;
pub use step::{Input, Step};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cache mount shared between steps, content-addressed by `(key, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSpec {
    pub key: String,
    pub path: String,
}

/// The runtime descriptor of the produced image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Deploy {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Input>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub start_cmd: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub apt_packages: Vec<String>,
}

/// The complete build plan.
///
/// Steps preserve builder registration order and are keyed by unique name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildPlan {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,

    pub deploy: Deploy,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub caches: BTreeMap<String, CacheSpec>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        use anyhow::Context;
        serde_json::to_string_pretty(self).context("failed to serialize build plan")
    }
}
