use super::node::NodeProvider;
use super::Provider;
use crate::generate::{GenerateContext, TemplateData, MISE_STEP_NAME};
use crate::plan::{Command, Input};
use crate::resolver::ResolvedPackage;
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;

const DEFAULT_PHP_VERSION: &str = "8.4.3";
const DEFAULT_CADDYFILE_PATH: &str = "/Caddyfile";
const COMPOSER_CACHE_DIR: &str = "/opt/cache/composer";
const CADDYFILE_TEMPLATE: &str = include_str!("templates/php.Caddyfile.template");

#[derive(Debug, Default)]
pub struct PhpProvider;

impl Provider for PhpProvider {
    fn name(&self) -> &'static str {
        "php"
    }

    fn detect(&self, ctx: &GenerateContext) -> Result<bool> {
        Ok(ctx.app.has_match("index.php") || ctx.app.has_match("composer.json"))
    }

    fn plan(&self, ctx: &mut GenerateContext) -> Result<()> {
        let image_step_name = self.php_image_step(ctx)?;
        let caddyfile = self.get_caddyfile(ctx)?;
        let is_laravel = self.uses_laravel(ctx);

        if is_laravel {
            ctx.logger.log_info("Found Laravel app");
        }

        let mut prepare = ctx.new_command_step("prepare");
        prepare.add_input(Input::step(image_step_name));
        prepare.add_variables(
            [
                ("APP_ENV", "production"),
                ("APP_DEBUG", "false"),
                ("APP_LOCALE", "en"),
                ("LOG_CHANNEL", "stderr"),
                ("LOG_LEVEL", "debug"),
                ("SERVER_NAME", ":80"),
                ("PHP_INI_DIR", "/usr/local/etc/php"),
            ]
            .map(|(k, v)| (k.to_string(), v.to_string())),
        );
        prepare.add_asset("Caddyfile", caddyfile);
        prepare.add_commands([
            Command::exec("mkdir -p /usr/local/etc/php/conf.d"),
            Command::exec("mkdir -p /conf.d/"),
            Command::exec_shell("cp $PHP_INI_DIR/php.ini-production $PHP_INI_DIR/php.ini"),
            Command::file(DEFAULT_CADDYFILE_PATH, "Caddyfile"),
        ]);
        prepare.without_secrets();
        let prepare_name = prepare.name().to_string();
        ctx.add_step(prepare);

        let mut extensions = ctx.new_command_step("extensions");
        extensions.add_input(Input::step(prepare_name));
        extensions.add_command(Command::exec(format!(
            "install-php-extensions {}",
            self.php_extensions(ctx).join(" ")
        )));
        let apt_caches = ctx.caches.get_apt_caches();
        extensions.add_caches(apt_caches);
        extensions.without_secrets();
        let extensions_name = extensions.name().to_string();
        ctx.add_step(extensions);

        let mut composer = ctx.new_command_step("install:composer");
        composer.add_input(Input::step(extensions_name));
        composer.without_secrets();
        composer.use_secrets_with_prefixes(["COMPOSER".to_string(), "PHP".to_string()]);
        composer.add_variables([
            ("COMPOSER_FUND".to_string(), "0".to_string()),
            (
                "COMPOSER_CACHE_DIR".to_string(),
                COMPOSER_CACHE_DIR.to_string(),
            ),
        ]);
        if self.read_composer_json(ctx).is_ok() {
            composer.add_cache(ctx.caches.add_cache("composer", COMPOSER_CACHE_DIR));
            composer.add_command(Command::copy_from_image(
                "composer:latest",
                "/usr/bin/composer",
                "/usr/bin/composer",
            ));
            for file in self.composer_supporting_files(ctx) {
                composer.add_command(Command::copy(file));
            }
            composer.add_command(Command::exec(
                "composer install --optimize-autoloader --no-scripts --no-interaction",
            ));
        }
        let composer_name = composer.name().to_string();
        ctx.add_step(composer);

        let node_provider = NodeProvider;
        let is_node = node_provider.detect(ctx)?;

        let mut build = ctx.new_command_step("build");

        if is_node {
            ctx.logger.log_info("Installing Node");

            node_provider.install_mise_packages(ctx)?;
            let mise_outputs = ctx.get_mise_step_builder().get_output_paths();

            let mut install = ctx.new_command_step("install:node");
            install.add_input(Input::step(MISE_STEP_NAME));
            node_provider.install_node_deps(ctx, &mut install);
            let install_name = install.name().to_string();
            ctx.add_step(install);

            let mut prune = ctx.new_command_step("prune:node");
            prune.add_input(Input::step(install_name.clone()));
            node_provider.prune_node_deps(ctx, &mut prune);
            let prune_name = prune.name().to_string();
            ctx.add_step(prune);

            // The build sees composer output overlaid with the app and the
            // mise-installed toolchain.
            let mut build_include = vec![".".to_string()];
            build_include.extend(mise_outputs);
            build.inputs = vec![
                Input::step(composer_name.clone()),
                Input::step_filtered(install_name, Some(build_include), None),
            ];
            node_provider.add_build_commands(ctx, &mut build);

            if is_laravel {
                build.add_commands([
                    Command::exec_shell(
                        "mkdir -p storage/framework/{sessions,views,cache,testing} storage/logs bootstrap/cache && chmod -R a+rw storage",
                    ),
                    Command::exec("php artisan optimize:clear"),
                    Command::exec("php artisan config:cache"),
                    Command::exec("php artisan event:cache"),
                    Command::exec("php artisan route:cache"),
                    Command::exec("php artisan view:cache"),
                ]);
            }

            let build_name = build.name().to_string();
            ctx.add_step(build);

            ctx.deploy.inputs = vec![
                Input::step(composer_name),
                Input::step_filtered(
                    build_name,
                    Some(vec![".".to_string()]),
                    Some(vec!["node_modules".to_string(), "vendor".to_string()]),
                ),
                Input::step_filtered(prune_name, Some(vec!["/app/node_modules".to_string()]), None),
            ];
        } else {
            build.add_input(Input::step(composer_name));
            build.add_command(Command::copy("."));
            let build_name = build.name().to_string();
            ctx.add_step(build);

            ctx.deploy.inputs = vec![Input::step(build_name)];
        }

        ctx.deploy.start_cmd = format!(
            "docker-php-entrypoint --config {DEFAULT_CADDYFILE_PATH} --adapter caddyfile 2>&1"
        );

        Ok(())
    }

    fn start_command_help(&self) -> &'static str {
        "PHP apps are served with FrankenPHP; the document root comes from RAILPACK_PHP_ROOT_DIR"
    }
}

impl PhpProvider {
    fn php_image_step(&self, ctx: &mut GenerateContext) -> Result<String> {
        let mut image_step = ctx.new_image_step(
            "packages:image",
            Box::new(|options| match options.resolved_packages.get("php") {
                Some(ResolvedPackage {
                    resolved_version: Some(version),
                    ..
                }) => php_image(version),
                _ => php_image(DEFAULT_PHP_VERSION),
            }),
        );

        image_step
            .apt_packages
            .extend(["git", "zip", "unzip", "ca-certificates"].map(String::from));

        // No separate runtime image, so build and deploy apt packages both
        // land here.
        image_step
            .apt_packages
            .extend(ctx.config.build_apt_packages.iter().cloned());
        image_step
            .apt_packages
            .extend(ctx.config.deploy.apt_packages.iter().cloned());

        let php = ctx.resolver.default("php", DEFAULT_PHP_VERSION);

        if let Ok(composer_json) = self.read_composer_json(ctx) {
            if let Some(version) = composer_json
                .get("require")
                .and_then(|require| require.get("php"))
                .and_then(Value::as_str)
            {
                let version = version.trim_start_matches('^');
                ctx.resolver
                    .version(&php, version, "composer.json > require > php");
            }
        }

        // The version must form a well-formed image tag.
        let tag_version = Regex::new(r"^\d+(\.\d+){0,2}$").context("invalid version pattern")?;
        ctx.resolver
            .set_version_available(&php, move |version| tag_version.is_match(version));

        let name = image_step.name().to_string();
        ctx.add_step(image_step);
        Ok(name)
    }

    fn get_caddyfile(&self, ctx: &mut GenerateContext) -> Result<String> {
        let php_root_dir = match ctx.env.get_variable("RAILPACK_PHP_ROOT_DIR") {
            Some(dir) if !dir.is_empty() => dir.to_string(),
            _ if self.uses_laravel(ctx) => "/app/public".to_string(),
            _ => "/app".to_string(),
        };

        let data: TemplateData = [
            (
                "RAILPACK_PHP_ROOT_DIR".to_string(),
                php_root_dir.into(),
            ),
            ("IS_LARAVEL".to_string(), self.uses_laravel(ctx).into()),
        ]
        .into_iter()
        .collect();

        let caddyfile = ctx.template_files(&["Caddyfile"], CADDYFILE_TEMPLATE, &data)?;
        if let Some(filename) = &caddyfile.filename {
            ctx.logger
                .log_info(format!("Using custom Caddy config: {filename}"));
        }

        Ok(caddyfile.contents)
    }

    fn composer_supporting_files(&self, ctx: &GenerateContext) -> Vec<String> {
        let patterns = ["**/composer.json", "**/composer.lock", "artisan"];

        let mut files = Vec::new();
        for pattern in patterns {
            files.extend(ctx.app.find_files(pattern).unwrap_or_default());
            files.extend(ctx.app.find_directories(pattern).unwrap_or_default());
        }
        files
    }

    fn php_extensions(&self, ctx: &GenerateContext) -> Vec<String> {
        let mut extensions = Vec::new();

        if let Ok(composer_json) = self.read_composer_json(ctx) {
            if let Some(require) = composer_json.get("require").and_then(Value::as_object) {
                for key in require.keys() {
                    if let Some(extension) = key.strip_prefix("ext-") {
                        extensions.push(extension.to_string());
                    }
                }
            }
        }

        if let Some(configured) = ctx.env.get_config_variable("PHP_EXTENSIONS") {
            extensions.extend(
                configured
                    .split([',', ' '])
                    .filter(|e| !e.is_empty())
                    .map(str::to_string),
            );
        }

        extensions
    }

    fn uses_laravel(&self, ctx: &GenerateContext) -> bool {
        ctx.app.has_match("artisan")
    }

    fn read_composer_json(&self, ctx: &GenerateContext) -> Result<Value> {
        ctx.app.read_json("composer.json")
    }
}

fn php_image(version: &str) -> String {
    format!("dunglas/frankenphp:php{version}-bookworm")
}
