use crate::plan::{Deploy, Input};
use std::collections::BTreeMap;

/// Accumulates the runtime descriptor of the produced image. One per
/// context.
#[derive(Debug, Clone, Default)]
pub struct DeployBuilder {
    pub inputs: Vec<Input>,
    pub start_cmd: String,
    pub variables: BTreeMap<String, String>,
    pub paths: Vec<String>,
    pub apt_packages: Vec<String>,
}

impl DeployBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_path(&mut self, path: String) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn build(&self) -> Deploy {
        Deploy {
            inputs: self.inputs.clone(),
            start_cmd: self.start_cmd.clone(),
            variables: self.variables.clone(),
            paths: self.paths.clone(),
            apt_packages: self.apt_packages.clone(),
        }
    }
}
