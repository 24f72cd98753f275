use super::Command;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The starting filesystem of a step: a base image, the output of a prior
/// step (optionally projected with include/exclude), or the local source
/// tree. Within one step, later inputs overlay earlier ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Input {
    Image {
        // `ref` is a keyword, so the field carries a serde rename.
        #[serde(rename = "ref")]
        reference: String,
    },
    Step {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        include: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exclude: Option<Vec<String>>,
    },
    Local {
        path: String,
    },
}

impl Input {
    pub fn image(reference: impl Into<String>) -> Self {
        Input::Image {
            reference: reference.into(),
        }
    }

    pub fn step(name: impl Into<String>) -> Self {
        Input::Step {
            name: name.into(),
            include: None,
            exclude: None,
        }
    }

    pub fn step_filtered(
        name: impl Into<String>,
        include: Option<Vec<String>>,
        exclude: Option<Vec<String>>,
    ) -> Self {
        Input::Step {
            name: name.into(),
            include,
            exclude,
        }
    }

    pub fn local() -> Self {
        Input::Local {
            path: ".".to_string(),
        }
    }

    /// The referenced step name, if this input is a step output.
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Input::Step { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// A unit of the build DAG producing a filesystem layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Step {
    pub name: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Input>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<Command>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub caches: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_secrets: Option<bool>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
}

impl Step {
    pub fn new(name: impl Into<String>) -> Self {
        Step {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn add_command(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn add_commands(&mut self, commands: impl IntoIterator<Item = Command>) {
        self.commands.extend(commands);
    }
}
