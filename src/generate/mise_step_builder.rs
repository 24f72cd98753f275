use super::step_builder::BuildStepOptions;
use crate::app::App;
use crate::mise;
use crate::plan::{Command, Step};
use crate::resolver::{PackageRef, ResolvedPackage};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use tracing::warn;

pub const MISE_STEP_NAME: &str = "packages:mise";

/// User config files that mise should see at install time.
const MISE_CONFIG_FILES: &[&str] = &["mise.toml", ".python-version", ".nvmrc"];

/// Specialized step installing language runtimes through mise. One per
/// context, created lazily on first use.
pub struct MiseStepBuilder {
    display_name: String,
    pub packages: Vec<PackageRef>,
    pub supporting_apt_packages: Vec<String>,
    supporting_config_files: Vec<String>,
    pub depends_on: Vec<String>,
    outputs: Vec<String>,
}

impl MiseStepBuilder {
    pub fn new(app: &App) -> Self {
        let supporting_config_files = MISE_CONFIG_FILES
            .iter()
            .filter(|file| app.has_match(file))
            .map(|file| file.to_string())
            .collect();

        Self {
            display_name: MISE_STEP_NAME.to_string(),
            packages: Vec::new(),
            supporting_apt_packages: Vec::new(),
            supporting_config_files,
            depends_on: Vec::new(),
            outputs: vec!["/mise/shims".to_string(), "/mise/installs".to_string()],
        }
    }

    pub fn name(&self) -> &str {
        &self.display_name
    }

    pub fn add_package(&mut self, package: PackageRef) {
        if !self.packages.iter().any(|p| p.name == package.name) {
            self.packages.push(package);
        }
    }

    pub fn add_supporting_apt_package(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.supporting_apt_packages.contains(&name) {
            self.supporting_apt_packages.push(name);
        }
    }

    pub fn get_output_paths(&self) -> Vec<String> {
        self.outputs.clone()
    }

    pub fn build(&self, options: &mut BuildStepOptions) -> Result<Step> {
        let mut step = Step::new(self.display_name.clone());

        if self.packages.is_empty() {
            return Ok(step);
        }

        step.depends_on = self.depends_on.clone();

        let mise_cache = options.caches.add_cache("mise", "/mise/cache");

        let install_curl = options.new_apt_install_command(&[
            "curl".to_string(),
            "ca-certificates".to_string(),
            "git".to_string(),
        ]);
        step.add_commands([
            Command::variable("MISE_DATA_DIR", "/mise"),
            Command::variable("MISE_CONFIG_DIR", "/mise"),
            Command::variable("MISE_INSTALL_PATH", "/usr/local/bin/mise"),
            Command::variable("MISE_CACHE_DIR", "/mise/cache"),
            install_curl,
            Command::exec_with_caches(
                "sh -c 'curl -fsSL https://mise.run | sh'",
                Some("install mise".to_string()),
                vec![mise_cache.clone()],
            ),
        ]);

        for file in &self.supporting_config_files {
            step.add_command(Command::copy_to(file.clone(), format!("/app/{file}")));
        }

        if !self.supporting_apt_packages.is_empty() {
            let install = options.new_apt_install_command(&self.supporting_apt_packages);
            step.add_command(install);
        }

        // Only packages with a resolved version make it into the config.
        let mut packages_to_install = BTreeMap::new();
        for package in &self.packages {
            match options.resolved_packages.get(&package.name) {
                Some(ResolvedPackage {
                    resolved_version: Some(version),
                    ..
                }) => {
                    packages_to_install.insert(package.name.clone(), version.clone());
                }
                _ => {
                    warn!(
                        package = %package.name,
                        "package version did not resolve; omitting from mise config"
                    );
                }
            }
        }

        let mise_toml = mise::generate_mise_toml(&packages_to_install)
            .context("failed to generate mise.toml")?;
        step.assets.insert("mise.toml".to_string(), mise_toml);

        let package_names: Vec<&str> = packages_to_install.keys().map(String::as_str).collect();

        step.add_commands([
            Command::file_named("/etc/mise/config.toml", "mise.toml", "create mise config"),
            Command::exec_with_caches(
                "sh -c 'mise trust -a && mise install'",
                Some(format!(
                    "install mise packages: {}",
                    package_names.join(", ")
                )),
                vec![mise_cache],
            ),
        ]);

        // Installed binaries land at /mise/installs/{package}/{version}/bin.
        for (name, version) in &packages_to_install {
            step.add_command(Command::path(format!("/mise/installs/{name}/{version}/bin")));
        }

        step.outputs = Some(self.outputs.clone());
        step.use_secrets = Some(false);

        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::MockFileSystem;
    use crate::generate::cache::CacheRegistry;
    use crate::resolver::ResolvedPackage;
    use std::sync::Arc;

    fn app_with(files: &[(&str, &str)]) -> App {
        let mut fs = MockFileSystem::new();
        for (path, contents) in files {
            fs.add_file(*path, *contents);
        }
        App::from_fs(Arc::new(fs)).unwrap()
    }

    fn resolved(name: &str, version: Option<&str>) -> (String, ResolvedPackage) {
        (
            name.to_string(),
            ResolvedPackage {
                name: name.to_string(),
                requested_version: Some("latest".to_string()),
                resolved_version: version.map(str::to_string),
            },
        )
    }

    #[test]
    fn test_empty_builder_emits_bare_step() {
        let app = app_with(&[]);
        let builder = MiseStepBuilder::new(&app);

        let packages = BTreeMap::new();
        let mut caches = CacheRegistry::new();
        let step = builder
            .build(&mut BuildStepOptions {
                resolved_packages: &packages,
                caches: &mut caches,
            })
            .unwrap();

        assert_eq!(step.name, MISE_STEP_NAME);
        assert!(step.commands.is_empty());
        assert!(caches.to_map().is_empty());
    }

    #[test]
    fn test_build_sequence() {
        let app = app_with(&[(".nvmrc", "22")]);
        let mut builder = MiseStepBuilder::new(&app);
        builder.add_package(PackageRef {
            name: "node".to_string(),
        });
        builder.add_supporting_apt_package("python3");

        let packages: BTreeMap<_, _> = [resolved("node", Some("22.9.0"))].into_iter().collect();
        let mut caches = CacheRegistry::new();
        let step = builder
            .build(&mut BuildStepOptions {
                resolved_packages: &packages,
                caches: &mut caches,
            })
            .unwrap();

        let toml_asset = step.assets.get("mise.toml").unwrap();
        assert!(toml_asset.contains("node"));
        assert!(toml_asset.contains("22.9.0"));

        assert!(matches!(&step.commands[0], Command::Variable { key, .. } if key == "MISE_DATA_DIR"));
        assert!(step.commands.iter().any(
            |c| matches!(c, Command::Copy { src, dest, .. } if src == ".nvmrc" && dest.as_deref() == Some("/app/.nvmrc"))
        ));
        assert!(step.commands.iter().any(
            |c| matches!(c, Command::Exec { cmd, .. } if cmd.contains("install -y python3"))
        ));
        assert!(step.commands.iter().any(
            |c| matches!(c, Command::Path { value } if value == "/mise/installs/node/22.9.0/bin")
        ));

        assert_eq!(step.use_secrets, Some(false));
        assert_eq!(
            step.outputs.as_deref(),
            Some(&["/mise/shims".to_string(), "/mise/installs".to_string()][..])
        );
        assert!(caches.to_map().contains_key("mise"));
    }

    #[test]
    fn test_unresolved_package_omitted_from_toml() {
        let app = app_with(&[]);
        let mut builder = MiseStepBuilder::new(&app);
        builder.add_package(PackageRef {
            name: "node".to_string(),
        });
        builder.add_package(PackageRef {
            name: "bun".to_string(),
        });

        let packages: BTreeMap<_, _> = [
            resolved("node", Some("22.9.0")),
            resolved("bun", None),
        ]
        .into_iter()
        .collect();
        let mut caches = CacheRegistry::new();
        let step = builder
            .build(&mut BuildStepOptions {
                resolved_packages: &packages,
                caches: &mut caches,
            })
            .unwrap();

        let toml_asset = step.assets.get("mise.toml").unwrap();
        assert!(toml_asset.contains("node"));
        assert!(!toml_asset.contains("bun"));
        assert!(!step
            .commands
            .iter()
            .any(|c| matches!(c, Command::Path { value } if value.contains("bun"))));
    }

    #[test]
    fn test_add_package_dedupes_by_name() {
        let app = app_with(&[]);
        let mut builder = MiseStepBuilder::new(&app);
        builder.add_package(PackageRef {
            name: "node".to_string(),
        });
        builder.add_package(PackageRef {
            name: "node".to_string(),
        });
        assert_eq!(builder.packages.len(), 1);
    }
}
