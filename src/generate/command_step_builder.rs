use super::step_builder::BuildStepOptions;
use crate::plan::{Command, Input, Step};
use anyhow::Result;
use std::collections::BTreeMap;

/// The general-purpose step: ordered commands, inputs, variables, caches,
/// assets and a secret policy.
pub struct CommandStepBuilder {
    display_name: String,
    pub inputs: Vec<Input>,
    pub commands: Vec<Command>,
    pub assets: BTreeMap<String, String>,
    pub caches: Vec<String>,
    pub variables: BTreeMap<String, String>,
    /// `None` means "receives the full secret list" when config is applied.
    pub secrets: Option<Vec<String>>,
    pub use_secrets: Option<bool>,
    pub secret_prefixes: Vec<String>,
    pub depends_on: Vec<String>,
    pub outputs: Option<Vec<String>>,
}

impl CommandStepBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            display_name: name.into(),
            inputs: Vec::new(),
            commands: Vec::new(),
            assets: BTreeMap::new(),
            caches: Vec::new(),
            variables: BTreeMap::new(),
            secrets: None,
            use_secrets: None,
            secret_prefixes: Vec::new(),
            depends_on: Vec::new(),
            outputs: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.display_name
    }

    pub fn add_input(&mut self, input: Input) -> &mut Self {
        self.inputs.push(input);
        self
    }

    pub fn add_command(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn add_commands(&mut self, commands: impl IntoIterator<Item = Command>) -> &mut Self {
        self.commands.extend(commands);
        self
    }

    pub fn add_variables(
        &mut self,
        variables: impl IntoIterator<Item = (String, String)>,
    ) -> &mut Self {
        self.variables.extend(variables);
        self
    }

    pub fn add_cache(&mut self, handle: String) -> &mut Self {
        if !self.caches.contains(&handle) {
            self.caches.push(handle);
        }
        self
    }

    pub fn add_caches(&mut self, handles: impl IntoIterator<Item = String>) -> &mut Self {
        for handle in handles {
            self.add_cache(handle);
        }
        self
    }

    pub fn add_asset(&mut self, name: impl Into<String>, contents: impl Into<String>) -> &mut Self {
        self.assets.insert(name.into(), contents.into());
        self
    }

    /// Opt out of secret exposure entirely.
    pub fn without_secrets(&mut self) -> &mut Self {
        self.secrets = Some(Vec::new());
        self
    }

    /// Restrict secret exposure to names matching the given prefixes.
    pub fn use_secrets_with_prefixes(
        &mut self,
        prefixes: impl IntoIterator<Item = String>,
    ) -> &mut Self {
        self.secret_prefixes.extend(prefixes);
        self
    }

    pub fn build(&self, _options: &mut BuildStepOptions) -> Result<Step> {
        let mut step = Step::new(self.display_name.clone());
        step.inputs = self.inputs.clone();
        step.commands = self.commands.clone();
        step.assets = self.assets.clone();
        step.caches = self.caches.clone();
        step.variables = self.variables.clone();
        step.secrets = self.secrets.clone().unwrap_or_default();
        step.use_secrets = self.use_secrets;
        step.depends_on = self.depends_on.clone();
        step.outputs = self.outputs.clone();
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::cache::CacheRegistry;

    #[test]
    fn test_build_copies_everything() {
        let mut builder = CommandStepBuilder::new("install");
        builder
            .add_input(Input::step("packages:mise"))
            .add_command(Command::copy("package.json"))
            .add_command(Command::exec("npm ci"))
            .add_cache("npm".to_string())
            .add_cache("npm".to_string())
            .add_variables([("CI".to_string(), "true".to_string())])
            .add_asset("notice", "generated");

        let resolved = BTreeMap::new();
        let mut caches = CacheRegistry::new();
        let step = builder
            .build(&mut BuildStepOptions {
                resolved_packages: &resolved,
                caches: &mut caches,
            })
            .unwrap();

        assert_eq!(step.name, "install");
        assert_eq!(step.inputs, vec![Input::step("packages:mise")]);
        assert_eq!(step.commands.len(), 2);
        assert_eq!(step.caches, vec!["npm".to_string()]);
        assert_eq!(step.variables.get("CI").map(String::as_str), Some("true"));
        assert_eq!(step.assets.get("notice").map(String::as_str), Some("generated"));
        assert!(step.secrets.is_empty());
    }
}
