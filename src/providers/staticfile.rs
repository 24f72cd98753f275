use super::Provider;
use crate::generate::{render, GenerateContext, TemplateData, MISE_STEP_NAME};
use crate::plan::{Command, Input};
use anyhow::{anyhow, Result};
use serde::Deserialize;

const STATICFILE_CONFIG_NAME: &str = "Staticfile";
const CADDYFILE_PATH: &str = "Caddyfile";
const CADDYFILE_TEMPLATE: &str = include_str!("templates/staticfile.Caddyfile.template");

#[derive(Debug, Deserialize)]
struct StaticfileConfig {
    #[serde(default)]
    root: String,
}

/// Serves a static site through Caddy. Detects on an explicit root
/// (`RAILPACK_STATIC_FILE_ROOT` or a `Staticfile`), a `public/` directory,
/// or a root `index.html`.
#[derive(Debug, Default)]
pub struct StaticfileProvider {
    root_dir: String,
}

impl Provider for StaticfileProvider {
    fn name(&self) -> &'static str {
        "staticfile"
    }

    fn detect(&self, ctx: &GenerateContext) -> Result<bool> {
        Ok(matches!(root_dir(ctx), Ok(Some(_))))
    }

    fn initialize(&mut self, ctx: &mut GenerateContext) -> Result<()> {
        self.root_dir = root_dir(ctx)?.ok_or_else(|| anyhow!("no static file root dir found"))?;
        Ok(())
    }

    fn plan(&self, ctx: &mut GenerateContext) -> Result<()> {
        ctx.default_mise_package("caddy", "latest");
        let mise_outputs = ctx.get_mise_step_builder().get_output_paths();

        let mut setup = ctx.new_command_step("setup");
        setup.add_input(Input::step(MISE_STEP_NAME));

        let data: TemplateData = [("STATIC_FILE_ROOT".to_string(), self.root_dir.as_str().into())]
            .into_iter()
            .collect();
        let caddyfile = render(CADDYFILE_TEMPLATE, &data)?;

        setup.add_asset("Caddyfile", caddyfile);
        setup.add_commands([
            Command::file(CADDYFILE_PATH, "Caddyfile"),
            Command::exec("caddy fmt --overwrite Caddyfile"),
        ]);

        let setup_name = setup.name().to_string();
        ctx.add_step(setup);

        ctx.deploy.inputs.extend([
            ctx.default_runtime_input(),
            Input::step_filtered(MISE_STEP_NAME, Some(mise_outputs), None),
            Input::step_filtered(setup_name, Some(vec![".".to_string()]), None),
            Input::local(),
        ]);

        ctx.deploy.start_cmd = start_command().to_string();

        Ok(())
    }

    fn start_command_help(&self) -> &'static str {
        "Static sites are served with Caddy; set RAILPACK_STATIC_FILE_ROOT to override the served directory"
    }
}

fn start_command() -> String {
    format!("caddy run --config {CADDYFILE_PATH} --adapter caddyfile 2>&1")
}

fn root_dir(ctx: &GenerateContext) -> Result<Option<String>> {
    if let Some(root) = ctx.env.get_config_variable("STATIC_FILE_ROOT") {
        return Ok(Some(root.to_string()));
    }

    if ctx.app.has_match(STATICFILE_CONFIG_NAME) {
        let config: StaticfileConfig = ctx.app.read_yaml(STATICFILE_CONFIG_NAME)?;
        if !config.root.is_empty() {
            return Ok(Some(config.root));
        }
    }

    if ctx.app.has_match("public") {
        return Ok(Some("public".to_string()));
    }

    if ctx.app.has_match("index.html") {
        return Ok(Some(".".to_string()));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, Environment, MockFileSystem};
    use crate::config::Config;
    use crate::resolver::StaticVersionOracle;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn context(files: &[(&str, &str)], env: &[(&str, &str)]) -> GenerateContext {
        let mut fs = MockFileSystem::new();
        for (path, contents) in files {
            fs.add_file(*path, *contents);
        }
        let app = App::from_fs(Arc::new(fs)).unwrap();
        let env = Environment::new(
            env.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        );
        GenerateContext::new(
            app,
            env,
            Config::new(),
            Box::new(StaticVersionOracle::new().with("caddy", "2.8.4")),
        )
    }

    #[test]
    fn test_detects_index_html() {
        let ctx = context(&[("index.html", "<html></html>")], &[]);
        assert!(StaticfileProvider::default().detect(&ctx).unwrap());
    }

    #[test]
    fn test_does_not_detect_empty_app() {
        let ctx = context(&[], &[]);
        assert!(!StaticfileProvider::default().detect(&ctx).unwrap());
    }

    #[test]
    fn test_root_dir_precedence() {
        let ctx = context(
            &[("Staticfile", "root: dist"), ("index.html", "")],
            &[("RAILPACK_STATIC_FILE_ROOT", "www")],
        );
        assert_eq!(root_dir(&ctx).unwrap().as_deref(), Some("www"));

        let ctx = context(&[("Staticfile", "root: dist"), ("index.html", "")], &[]);
        assert_eq!(root_dir(&ctx).unwrap().as_deref(), Some("dist"));

        let ctx = context(&[("index.html", "")], &[]);
        assert_eq!(root_dir(&ctx).unwrap().as_deref(), Some("."));
    }

    #[test]
    fn test_plan_emits_caddy_setup() {
        let mut ctx = context(&[("index.html", "<html></html>")], &[]);
        let mut provider = StaticfileProvider::default();
        provider.initialize(&mut ctx).unwrap();
        provider.plan(&mut ctx).unwrap();

        let (plan, resolved) = ctx.generate().unwrap();

        let setup = plan.get_step("setup").unwrap();
        assert!(setup.assets["Caddyfile"].contains("root * \".\""));
        assert!(setup
            .commands
            .iter()
            .any(|c| matches!(c, Command::File { path, .. } if path == "Caddyfile")));

        assert_eq!(
            plan.deploy.start_cmd,
            "caddy run --config Caddyfile --adapter caddyfile 2>&1"
        );
        assert_eq!(resolved["caddy"].resolved_version.as_deref(), Some("2.8.4"));
    }
}
