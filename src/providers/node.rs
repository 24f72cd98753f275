use super::Provider;
use crate::generate::{CommandStepBuilder, GenerateContext, MISE_STEP_NAME};
use crate::plan::{Command, Input};
use anyhow::Result;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

const DEFAULT_NODE_VERSION: &str = "22";
const PACKAGE_JSON: &str = "package.json";
const NPM_CACHE_DIR: &str = "/root/.npm";

#[derive(Debug, Default, Deserialize)]
struct PackageJson {
    #[serde(default)]
    main: Option<String>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    engines: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct NodeProvider;

impl NodeProvider {
    /// Register node with the mise step, applying version hints from
    /// `package.json` engines and `.nvmrc`.
    pub fn install_mise_packages(&self, ctx: &mut GenerateContext) -> Result<()> {
        let node = ctx.default_mise_package("node", DEFAULT_NODE_VERSION);

        if let Some(engines_node) = self
            .read_package_json(ctx)
            .ok()
            .and_then(|pkg| pkg.engines.get("node").cloned())
        {
            if let Some(version) = extract_version(&engines_node) {
                ctx.resolver
                    .version(&node, &version, "package.json > engines > node");
            }
        }

        if ctx.app.has_match(".nvmrc") {
            let raw = ctx.app.read_file(".nvmrc")?;
            let version = raw.trim().trim_start_matches('v');
            ctx.resolver.version(&node, version, ".nvmrc");
        }

        Ok(())
    }

    /// Populate an install step: copy sources and run npm with a shared
    /// cache. `npm ci` requires a lockfile.
    pub fn install_node_deps(&self, ctx: &mut GenerateContext, install: &mut CommandStepBuilder) {
        install.add_cache(ctx.caches.add_cache("npm", NPM_CACHE_DIR));
        install.add_variables([("NPM_CONFIG_CACHE".to_string(), NPM_CACHE_DIR.to_string())]);
        install.add_command(Command::copy("."));

        let install_cmd = if ctx.app.has_match("package-lock.json") {
            "npm ci"
        } else {
            "npm install"
        };
        install.add_command(Command::exec(install_cmd));
    }

    /// Populate a prune step dropping dev dependencies.
    pub fn prune_node_deps(&self, ctx: &mut GenerateContext, prune: &mut CommandStepBuilder) {
        prune.add_cache(ctx.caches.add_cache("npm", NPM_CACHE_DIR));
        prune.add_variables([("NPM_CONFIG_CACHE".to_string(), NPM_CACHE_DIR.to_string())]);
        prune.add_command(Command::exec("npm prune --omit=dev"));
    }

    /// Append the package.json build script, when present.
    pub fn add_build_commands(&self, ctx: &GenerateContext, build: &mut CommandStepBuilder) {
        if self.has_script(ctx, "build") {
            build.add_command(Command::exec("npm run build"));
        }
    }

    fn start_command(&self, ctx: &GenerateContext) -> Option<String> {
        if self.has_script(ctx, "start") {
            return Some("npm start".to_string());
        }

        if let Some(main) = self.read_package_json(ctx).ok().and_then(|pkg| pkg.main) {
            if !main.is_empty() {
                return Some(format!("node {main}"));
            }
        }

        if ctx.app.has_match("index.js") {
            return Some("node index.js".to_string());
        }

        None
    }

    fn has_script(&self, ctx: &GenerateContext, name: &str) -> bool {
        self.read_package_json(ctx)
            .map(|pkg| pkg.scripts.contains_key(name))
            .unwrap_or(false)
    }

    fn read_package_json(&self, ctx: &GenerateContext) -> Result<PackageJson> {
        ctx.app.read_json(PACKAGE_JSON)
    }
}

/// Pull the first version-looking token out of an engines constraint such
/// as `">=18 <=22"` or `"^20.11"`.
fn extract_version(constraint: &str) -> Option<String> {
    let re = Regex::new(r"\d+(?:\.\d+)*").ok()?;
    re.find(constraint).map(|m| m.as_str().to_string())
}

impl Provider for NodeProvider {
    fn name(&self) -> &'static str {
        "node"
    }

    fn detect(&self, ctx: &GenerateContext) -> Result<bool> {
        Ok(ctx.app.has_match(PACKAGE_JSON))
    }

    fn plan(&self, ctx: &mut GenerateContext) -> Result<()> {
        self.install_mise_packages(ctx)?;
        let mise_outputs = ctx.get_mise_step_builder().get_output_paths();

        let mut install = ctx.new_command_step("install");
        install.add_input(Input::step(MISE_STEP_NAME));
        self.install_node_deps(ctx, &mut install);
        let install_name = install.name().to_string();
        ctx.add_step(install);

        let mut build = ctx.new_command_step("build");
        build.add_input(Input::step(install_name));
        self.add_build_commands(ctx, &mut build);
        let build_name = build.name().to_string();
        ctx.add_step(build);

        ctx.deploy.inputs = vec![
            ctx.default_runtime_input(),
            Input::step_filtered(MISE_STEP_NAME, Some(mise_outputs), None),
            Input::step_filtered(build_name, Some(vec![".".to_string()]), None),
        ];

        if let Some(start_cmd) = self.start_command(ctx) {
            ctx.deploy.start_cmd = start_cmd;
        }

        Ok(())
    }

    fn start_command_help(&self) -> &'static str {
        "Add a `start` script to package.json, or set a `main` entrypoint"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, Environment, MockFileSystem};
    use crate::config::Config;
    use crate::resolver::StaticVersionOracle;
    use std::sync::Arc;

    fn context(files: &[(&str, &str)]) -> GenerateContext {
        let mut fs = MockFileSystem::new();
        for (path, contents) in files {
            fs.add_file(*path, *contents);
        }
        let app = App::from_fs(Arc::new(fs)).unwrap();
        GenerateContext::new(
            app,
            Environment::default(),
            Config::new(),
            Box::new(StaticVersionOracle::new().with("node", "22.9.0")),
        )
    }

    #[test]
    fn test_detects_package_json() {
        let ctx = context(&[("package.json", "{}")]);
        assert!(NodeProvider.detect(&ctx).unwrap());
        assert!(!NodeProvider.detect(&context(&[])).unwrap());
    }

    #[test]
    fn test_engines_version_recorded() {
        let mut ctx = context(&[("package.json", r#"{"engines":{"node":">=20.11 <23"}}"#)]);
        NodeProvider.install_mise_packages(&mut ctx).unwrap();

        let requested = ctx.resolver.get("node").unwrap();
        assert_eq!(requested.version, "20.11");
        assert_eq!(requested.source, "package.json > engines > node");
    }

    #[test]
    fn test_nvmrc_wins_over_engines() {
        let mut ctx = context(&[
            ("package.json", r#"{"engines":{"node":"20"}}"#),
            (".nvmrc", "v22.4.0\n"),
        ]);
        NodeProvider.install_mise_packages(&mut ctx).unwrap();

        let requested = ctx.resolver.get("node").unwrap();
        assert_eq!(requested.version, "22.4.0");
        assert_eq!(requested.source, ".nvmrc");
    }

    #[test]
    fn test_plan_uses_npm_ci_with_lockfile() {
        let mut ctx = context(&[
            ("package.json", r#"{"scripts":{"build":"tsc","start":"node dist"}}"#),
            ("package-lock.json", "{}"),
        ]);
        NodeProvider.plan(&mut ctx).unwrap();

        let (plan, _) = ctx.generate().unwrap();
        let install = plan.get_step("install").unwrap();
        assert!(install
            .commands
            .iter()
            .any(|c| matches!(c, Command::Exec { cmd, .. } if cmd == "npm ci")));

        let build = plan.get_step("build").unwrap();
        assert!(build
            .commands
            .iter()
            .any(|c| matches!(c, Command::Exec { cmd, .. } if cmd == "npm run build")));

        assert_eq!(plan.deploy.start_cmd, "npm start");
    }

    #[test]
    fn test_plan_without_lockfile_or_scripts() {
        let mut ctx = context(&[("package.json", r#"{"main":"server.js"}"#)]);
        NodeProvider.plan(&mut ctx).unwrap();

        let (plan, _) = ctx.generate().unwrap();
        let install = plan.get_step("install").unwrap();
        assert!(install
            .commands
            .iter()
            .any(|c| matches!(c, Command::Exec { cmd, .. } if cmd == "npm install")));
        assert_eq!(plan.deploy.start_cmd, "node server.js");
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(extract_version("^20.11"), Some("20.11".to_string()));
        assert_eq!(extract_version(">=18 <=22"), Some("18".to_string()));
        assert_eq!(extract_version("lts/*"), None);
    }
}
