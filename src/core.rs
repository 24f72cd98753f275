//! Top-level plan generation: config merge, provider dispatch, and
//! finalization into a `BuildResult`.

use crate::app::{App, Environment};
use crate::config::{self, Config};
use crate::generate::GenerateContext;
use crate::mise::{Mise, INSTALL_DIR};
use crate::plan::{BuildPlan, Command};
use crate::providers::{self, ProcfileProvider, Provider};
use crate::resolver::{ResolvedPackage, VersionOracle};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const DEFAULT_CONFIG_FILE_NAME: &str = "railpack.json";

/// Caller-supplied knobs for one plan generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateBuildPlanOptions {
    pub build_command: Option<String>,
    pub start_command: Option<String>,
    pub previous_versions: BTreeMap<String, String>,
    pub config_file_path: Option<String>,
}

/// Everything a caller gets back from plan generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub plan: BuildPlan,
    pub resolved_packages: BTreeMap<String, ResolvedPackage>,
    pub metadata: BTreeMap<String, String>,
    pub detected_providers: Vec<String>,
}

/// Generate a build plan using the mise binary as the version oracle.
pub fn generate_build_plan(
    app: App,
    env: &Environment,
    options: &GenerateBuildPlanOptions,
) -> Result<BuildResult> {
    generate_build_plan_with_oracle(app, env, options, Box::new(Mise::new(INSTALL_DIR)))
}

/// Generate a build plan against an explicit version oracle.
pub fn generate_build_plan_with_oracle(
    app: App,
    env: &Environment,
    options: &GenerateBuildPlanOptions,
    oracle: Box<dyn VersionOracle>,
) -> Result<BuildResult> {
    let config = get_config(&app, env, options)?;

    let mut ctx = GenerateContext::new(app, env.clone(), config.clone(), oracle);

    for (name, version) in &options.previous_versions {
        ctx.resolver.set_previous_version(name, version);
    }

    let (providers_to_use, detected_providers) = get_providers(&mut ctx, &config);

    let provider_names: Vec<&str> = providers_to_use.iter().map(|p| p.name()).collect();
    ctx.metadata.set("providers", provider_names.join(","));

    for (index, provider) in providers_to_use.iter().enumerate() {
        // Steps of secondary providers are namespaced to keep names unique.
        if index > 0 {
            ctx.enter_sub_context(provider.name());
        }
        let planned = provider.plan(&mut ctx);
        if index > 0 {
            ctx.exit_sub_context();
        }
        planned.with_context(|| format!("failed to run provider: {}", provider.name()))?;
    }

    ProcfileProvider
        .plan(&mut ctx)
        .context("failed to run provider: procfile")?;

    ctx.apply_config(&config).context("failed to apply config")?;

    let (plan, resolved_packages) = ctx
        .generate()
        .context("failed to generate build plan")?;

    Ok(BuildResult {
        plan,
        resolved_packages,
        metadata: ctx.metadata.into_properties(),
        detected_providers,
    })
}

/// Merge the options, environment, and file config into a single config.
pub fn get_config(
    app: &App,
    env: &Environment,
    options: &GenerateBuildPlanOptions,
) -> Result<Config> {
    let options_config = generate_config_from_options(options);
    let env_config = generate_config_from_environment(env);
    let file_config = generate_config_from_file(app, env, options)?;

    Ok(config::merge([options_config, env_config, file_config]))
}

fn generate_config_from_file(
    app: &App,
    env: &Environment,
    options: &GenerateBuildPlanOptions,
) -> Result<Config> {
    let mut config_file_name = DEFAULT_CONFIG_FILE_NAME.to_string();

    if let Some(path) = &options.config_file_path {
        if !path.is_empty() {
            config_file_name = path.clone();
        }
    }

    if let Some(env_file_name) = env.get_config_variable("CONFIG_FILE") {
        config_file_name = env_file_name.to_string();
    }

    if !app.has_match(&config_file_name) {
        if config_file_name != DEFAULT_CONFIG_FILE_NAME {
            debug!("config file `{config_file_name}` not found");
        }
        return Ok(Config::new());
    }

    app.read_json(&config_file_name)
        .context("failed to read config file")
}

fn generate_config_from_environment(env: &Environment) -> Config {
    let mut config = Config::new();

    if let Some(build_cmd) = env.get_config_variable("BUILD_CMD") {
        let build_step = config.get_or_create_step("build");
        build_step.commands = Some(vec![
            Command::copy("."),
            Command::exec_shell_named(build_cmd, build_cmd),
        ]);
    }

    if let Some(start_cmd) = env.get_config_variable("START_CMD") {
        config.deploy.start_cmd = Some(start_cmd.to_string());
    }

    if let Some(packages) = env.get_config_variable("PACKAGES") {
        for package in packages.split_whitespace() {
            config
                .packages
                .insert(package.to_string(), "latest".to_string());
        }
    }

    if let Some(apt_packages) = env.get_config_variable("APT_PACKAGES") {
        config.apt_packages = apt_packages.split_whitespace().map(str::to_string).collect();
    }

    for name in env.variables().keys() {
        config.secrets.push(name.clone());
    }

    config
}

fn generate_config_from_options(options: &GenerateBuildPlanOptions) -> Config {
    let mut config = Config::new();

    if let Some(build_cmd) = &options.build_command {
        if !build_cmd.is_empty() {
            let build_step = config.get_or_create_step("build");
            build_step.commands = Some(vec![
                Command::copy("."),
                Command::exec_shell_named(build_cmd.clone(), build_cmd.clone()),
            ]);
        }
    }

    if let Some(start_cmd) = &options.start_command {
        if !start_cmd.is_empty() {
            config.deploy.start_cmd = Some(start_cmd.clone());
        }
    }

    config
}

/// Run detection in provider precedence order and decide which providers to
/// plan with. Detection stops at the first match; an explicit
/// `config.providers` list overrides the auto-selection.
fn get_providers(
    ctx: &mut GenerateContext,
    config: &Config,
) -> (Vec<Box<dyn Provider>>, Vec<String>) {
    let mut providers_to_use: Vec<Box<dyn Provider>> = Vec::new();
    let mut detected_providers = Vec::new();

    for mut provider in providers::language_providers() {
        let matched = match provider.detect(ctx) {
            Ok(matched) => matched,
            Err(err) => {
                warn!("failed to detect provider `{}`: {err:#}", provider.name());
                continue;
            }
        };

        if !matched {
            continue;
        }

        detected_providers.push(provider.name().to_string());

        if config.providers.is_none() {
            if let Err(err) = provider.initialize(ctx) {
                warn!(
                    "failed to initialize provider `{}`: {err:#}",
                    provider.name()
                );
                continue;
            }
            providers_to_use.push(provider);
        }

        break;
    }

    if let Some(names) = &config.providers {
        for name in names {
            let Some(mut provider) = providers::get_provider(name) else {
                warn!("provider `{name}` not found");
                continue;
            };

            if let Err(err) = provider.initialize(ctx) {
                warn!("failed to initialize provider `{name}`: {err:#}");
                continue;
            }

            providers_to_use.push(provider);
        }
    }

    (providers_to_use, detected_providers)
}
