use super::cache::CacheRegistry;
use super::command_step_builder::CommandStepBuilder;
use super::deploy_builder::DeployBuilder;
use super::image_step_builder::ImageStepBuilder;
use super::logger::Logger;
use super::metadata::Metadata;
use super::mise_step_builder::{MiseStepBuilder, MISE_STEP_NAME};
use super::step_builder::{BuildStepOptions, StepBuilder};
use super::template::{self, TemplateData};
use crate::app::{App, Environment};
use crate::config::Config;
use crate::plan::{BuildPlan, Input};
use crate::resolver::{PackageRef, ResolvedPackage, Resolver, VersionOracle};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::warn;

/// Base image expected by deployment when no step supplies one.
pub const RUNTIME_IMAGE: &str = "ghcr.io/railwayapp/railpack-runtime:latest";

/// The result of `template_files`: the candidate file that supplied the
/// template (if any) and the rendered contents.
#[derive(Debug, Clone)]
pub struct TemplateFile {
    pub filename: Option<String>,
    pub contents: String,
}

/// Shared state for one plan generation. Providers mutate it sequentially;
/// `generate` freezes it into a `BuildPlan`.
pub struct GenerateContext {
    pub app: App,
    pub env: Environment,
    pub config: Config,
    pub resolver: Resolver,
    pub caches: CacheRegistry,
    pub metadata: Metadata,
    pub steps: Vec<StepBuilder>,
    pub deploy: DeployBuilder,
    pub logger: Logger,
    sub_context: Vec<String>,
}

impl GenerateContext {
    pub fn new(app: App, env: Environment, config: Config, oracle: Box<dyn VersionOracle>) -> Self {
        Self {
            app,
            env,
            config,
            resolver: Resolver::new(oracle),
            caches: CacheRegistry::new(),
            metadata: Metadata::new(),
            steps: Vec::new(),
            deploy: DeployBuilder::new(),
            logger: Logger::new(),
            sub_context: Vec::new(),
        }
    }

    /// Namespace step names while a secondary provider plans, so that names
    /// stay unique across providers.
    pub fn enter_sub_context(&mut self, name: impl Into<String>) {
        self.sub_context.push(name.into());
    }

    pub fn exit_sub_context(&mut self) {
        self.sub_context.pop();
    }

    pub fn get_step_name(&self, base: &str) -> String {
        if self.sub_context.is_empty() {
            base.to_string()
        } else {
            format!("{}:{base}", self.sub_context.join(":"))
        }
    }

    /// A new command step builder named within the current sub-context. The
    /// caller configures it and registers it with `add_step`.
    pub fn new_command_step(&self, name: &str) -> CommandStepBuilder {
        CommandStepBuilder::new(self.get_step_name(name))
    }

    /// A new image step builder whose base image is resolved at
    /// finalization.
    pub fn new_image_step(
        &self,
        name: &str,
        resolve_image: Box<dyn Fn(&BuildStepOptions) -> String>,
    ) -> ImageStepBuilder {
        ImageStepBuilder::new(self.get_step_name(name), resolve_image)
    }

    /// Register a configured builder. Registration order is the order steps
    /// appear in the emitted plan.
    pub fn add_step(&mut self, builder: impl Into<StepBuilder>) {
        self.steps.push(builder.into());
    }

    /// The mise package-installation step, created lazily. One per context;
    /// it keeps its position in the step order from first use.
    pub fn get_mise_step_builder(&mut self) -> &mut MiseStepBuilder {
        if !self.steps.iter().any(|s| matches!(s, StepBuilder::Mise(_))) {
            let builder = MiseStepBuilder::new(&self.app);
            self.steps.push(StepBuilder::Mise(builder));
        }

        match self
            .steps
            .iter_mut()
            .find_map(|s| match s {
                StepBuilder::Mise(m) => Some(m),
                _ => None,
            }) {
            Some(builder) => builder,
            None => unreachable!("mise step builder was just inserted"),
        }
    }

    /// Request a mise package with a default version, registering it with
    /// both the resolver and the mise step.
    pub fn default_mise_package(&mut self, name: &str, default_version: &str) -> PackageRef {
        let package = self.resolver.default(name, default_version);
        self.get_mise_step_builder().add_package(package.clone());
        package
    }

    pub fn default_runtime_input(&self) -> Input {
        Input::image(RUNTIME_IMAGE)
    }

    /// Resolve a config-file template: the first candidate present in the
    /// app supplies the template body, else `default_template`; the body is
    /// rendered with `data`.
    pub fn template_files(
        &self,
        candidates: &[&str],
        default_template: &str,
        data: &TemplateData,
    ) -> Result<TemplateFile> {
        let mut filename = None;
        let mut body = default_template.to_string();

        for candidate in candidates {
            if self.app.has_match(candidate) {
                body = self.app.read_file(candidate)?;
                filename = Some(candidate.to_string());
                break;
            }
        }

        let contents = template::render(&body, data).with_context(|| match &filename {
            Some(name) => format!("failed to render template from {name}"),
            None => "failed to render default template".to_string(),
        })?;

        Ok(TemplateFile { filename, contents })
    }

    /// Overlay user configuration on top of provider output.
    pub fn apply_config(&mut self, config: &Config) -> Result<()> {
        for (name, version) in &config.packages {
            let package = self.default_mise_package(name, version);
            self.resolver.version(&package, version, "user config");
        }

        if !config.apt_packages.is_empty() || !config.build_apt_packages.is_empty() {
            let mise = self.get_mise_step_builder();
            for package in config.apt_packages.iter().chain(&config.build_apt_packages) {
                mise.add_supporting_apt_package(package.clone());
            }
        }

        for (name, step_config) in &config.steps {
            self.apply_step_config(name, step_config);
        }

        self.distribute_secrets(&config.secrets);
        self.apply_deploy_config(config);

        Ok(())
    }

    fn apply_step_config(&mut self, name: &str, step_config: &crate::config::StepConfig) {
        if !self.steps.iter().any(|s| s.name() == name) {
            let mut builder = CommandStepBuilder::new(name);
            let input = if self.steps.iter().any(|s| matches!(s, StepBuilder::Mise(_))) {
                Input::step(MISE_STEP_NAME)
            } else {
                self.default_runtime_input()
            };
            builder.add_input(input);
            self.steps.push(StepBuilder::Command(builder));
        }

        let cache_handles: Vec<String> = step_config
            .caches
            .iter()
            .filter_map(|key| match self.caches.get_by_key(key) {
                Some(handle) => Some(handle),
                None => {
                    warn!(step = name, cache = key, "unknown cache in step config");
                    None
                }
            })
            .collect();

        let Some(builder) = self.steps.iter_mut().find(|s| s.name() == name) else {
            return;
        };

        match builder {
            StepBuilder::Command(builder) => {
                if let Some(inputs) = &step_config.inputs {
                    if !inputs.is_empty() {
                        builder.inputs = inputs.clone();
                    }
                }
                if let Some(commands) = &step_config.commands {
                    builder.add_commands(commands.iter().cloned());
                }
                builder.add_variables(
                    step_config
                        .variables
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
                builder.add_caches(cache_handles);
                if let Some(secrets) = &step_config.secrets {
                    builder.secrets = Some(secrets.clone());
                }
            }
            _ => {
                warn!(step = name, "step config overrides apply only to command steps");
            }
        }
    }

    fn distribute_secrets(&mut self, secrets: &[String]) {
        for step in &mut self.steps {
            let StepBuilder::Command(builder) = step else {
                continue;
            };
            if builder.use_secrets == Some(false) {
                continue;
            }

            if !builder.secret_prefixes.is_empty() {
                let filtered: Vec<String> = secrets
                    .iter()
                    .filter(|s| builder.secret_prefixes.iter().any(|p| s.starts_with(p)))
                    .cloned()
                    .collect();
                builder.secrets = Some(filtered);
            } else if builder.secrets.is_none() {
                builder.secrets = Some(secrets.to_vec());
            }
        }
    }

    fn apply_deploy_config(&mut self, config: &Config) {
        let deploy_config = &config.deploy;

        if let Some(inputs) = &deploy_config.inputs {
            if !inputs.is_empty() {
                self.deploy.inputs = inputs.clone();
            }
        }

        if let Some(start_cmd) = &deploy_config.start_cmd {
            if !start_cmd.is_empty() {
                self.deploy.start_cmd = start_cmd.clone();
            }
        }

        self.deploy.variables.extend(
            deploy_config
                .variables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        for path in &deploy_config.paths {
            self.deploy.add_path(path.clone());
        }

        for package in config.apt_packages.iter().chain(&deploy_config.apt_packages) {
            if !self.deploy.apt_packages.contains(package) {
                self.deploy.apt_packages.push(package.clone());
            }
        }
    }

    /// Finalize: resolve package versions, freeze every step builder, and
    /// assemble the plan.
    pub fn generate(&mut self) -> Result<(BuildPlan, BTreeMap<String, ResolvedPackage>)> {
        let resolved_packages = self.resolver.resolve_all()?;

        let mut steps = Vec::with_capacity(self.steps.len());
        let mut options = BuildStepOptions {
            resolved_packages: &resolved_packages,
            caches: &mut self.caches,
        };

        for builder in &self.steps {
            let step = builder
                .build(&mut options)
                .with_context(|| format!("failed to build step `{}`", builder.name()))?;
            steps.push(step);
        }

        let plan = BuildPlan {
            steps,
            deploy: self.deploy.build(),
            caches: self.caches.to_map(),
        };

        Ok((plan, resolved_packages))
    }
}
