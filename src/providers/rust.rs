use super::Provider;
use crate::generate::{GenerateContext, MISE_STEP_NAME};
use crate::plan::{Command, Input};
use anyhow::Result;
use serde::Deserialize;

const CARGO_MANIFEST: &str = "Cargo.toml";

#[derive(Debug, Default, Deserialize)]
struct CargoManifest {
    #[serde(default)]
    package: CargoPackage,
}

#[derive(Debug, Default, Deserialize)]
struct CargoPackage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "rust-version")]
    rust_version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RustToolchainFile {
    #[serde(default)]
    toolchain: RustToolchain,
}

#[derive(Debug, Default, Deserialize)]
struct RustToolchain {
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Default)]
pub struct RustProvider;

impl Provider for RustProvider {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn detect(&self, ctx: &GenerateContext) -> Result<bool> {
        Ok(ctx.app.has_match(CARGO_MANIFEST))
    }

    fn plan(&self, ctx: &mut GenerateContext) -> Result<()> {
        self.install_mise_packages(ctx);
        ctx.get_mise_step_builder()
            .add_supporting_apt_package("build-essential");

        let registry_cache = ctx.caches.add_cache("cargo-registry", "/root/.cargo/registry");
        let git_cache = ctx.caches.add_cache("cargo-git", "/root/.cargo/git");
        let target_cache = ctx.caches.add_cache("cargo-target", "/app/target");

        let mut build = ctx.new_command_step("build");
        build.add_input(Input::step(MISE_STEP_NAME));
        build.add_command(Command::copy("."));
        build.add_command(Command::exec_with_caches(
            "cargo build --release",
            None,
            vec![registry_cache, git_cache, target_cache],
        ));
        let build_name = build.name().to_string();
        ctx.add_step(build);

        ctx.deploy.inputs = vec![
            ctx.default_runtime_input(),
            Input::step_filtered(build_name, Some(vec![".".to_string()]), None),
        ];

        if let Some(binary) = self.binary_name(ctx) {
            ctx.deploy.start_cmd = format!("./target/release/{binary}");
        }

        Ok(())
    }

    fn start_command_help(&self) -> &'static str {
        "The release binary named by [package] name in Cargo.toml is used as the start command"
    }
}

impl RustProvider {
    fn install_mise_packages(&self, ctx: &mut GenerateContext) {
        let rust = ctx.default_mise_package("rust", "latest");

        // rust-toolchain files pin the toolchain for the whole workspace;
        // a Cargo.toml rust-version is the more specific request.
        if ctx.app.has_match("rust-toolchain") {
            if let Ok(raw) = ctx.app.read_file("rust-toolchain") {
                ctx.resolver
                    .version(&rust, raw.trim(), "rust-toolchain");
            }
        }

        if let Ok(toolchain) = ctx.app.read_toml::<RustToolchainFile>("rust-toolchain.toml") {
            if let Some(channel) = toolchain.toolchain.channel {
                ctx.resolver
                    .version(&rust, &channel, "rust-toolchain.toml > toolchain > channel");
            }
        }

        if let Some(rust_version) = self
            .read_manifest(ctx)
            .and_then(|manifest| manifest.package.rust_version)
        {
            ctx.resolver.version(
                &rust,
                &rust_version,
                "Cargo.toml > package > rust-version",
            );
        }
    }

    fn binary_name(&self, ctx: &GenerateContext) -> Option<String> {
        self.read_manifest(ctx)?.package.name
    }

    fn read_manifest(&self, ctx: &GenerateContext) -> Option<CargoManifest> {
        ctx.app.read_toml(CARGO_MANIFEST).ok()
    }
}
