use super::step_builder::BuildStepOptions;
use crate::plan::{Input, Step};
use anyhow::Result;

type ResolveImage = Box<dyn Fn(&BuildStepOptions) -> String>;

/// A step whose filesystem is a base image chosen at finalization time,
/// once package versions are known.
pub struct ImageStepBuilder {
    display_name: String,
    resolve_image: ResolveImage,
    pub apt_packages: Vec<String>,
}

impl ImageStepBuilder {
    pub fn new(name: impl Into<String>, resolve_image: ResolveImage) -> Self {
        Self {
            display_name: name.into(),
            resolve_image,
            apt_packages: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.display_name
    }

    pub fn build(&self, options: &mut BuildStepOptions) -> Result<Step> {
        let image = (self.resolve_image)(options);

        let mut step = Step::new(self.display_name.clone());
        step.inputs = vec![Input::image(image)];

        if !self.apt_packages.is_empty() {
            step.add_command(options.new_apt_install_command(&self.apt_packages));
        }

        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::cache::CacheRegistry;
    use crate::resolver::ResolvedPackage;
    use std::collections::BTreeMap;

    #[test]
    fn test_image_resolved_from_packages() {
        let builder = ImageStepBuilder::new(
            "packages:image",
            Box::new(|options| {
                match options.resolved_packages.get("php") {
                    Some(ResolvedPackage {
                        resolved_version: Some(version),
                        ..
                    }) => format!("dunglas/frankenphp:php{version}-bookworm"),
                    _ => "dunglas/frankenphp:php8.4.3-bookworm".to_string(),
                }
            }),
        );

        let mut resolved = BTreeMap::new();
        resolved.insert(
            "php".to_string(),
            ResolvedPackage {
                name: "php".to_string(),
                requested_version: Some("8.2".to_string()),
                resolved_version: Some("8.2.27".to_string()),
            },
        );

        let mut caches = CacheRegistry::new();
        let step = builder
            .build(&mut BuildStepOptions {
                resolved_packages: &resolved,
                caches: &mut caches,
            })
            .unwrap();

        assert_eq!(
            step.inputs,
            vec![Input::image("dunglas/frankenphp:php8.2.27-bookworm")]
        );
        assert!(step.commands.is_empty());
    }

    #[test]
    fn test_apt_packages_install_first() {
        let mut builder =
            ImageStepBuilder::new("packages:image", Box::new(|_| "debian:bookworm".to_string()));
        builder.apt_packages.push("git".to_string());

        let resolved = BTreeMap::new();
        let mut caches = CacheRegistry::new();
        let step = builder
            .build(&mut BuildStepOptions {
                resolved_packages: &resolved,
                caches: &mut caches,
            })
            .unwrap();

        assert_eq!(step.commands.len(), 1);
        assert!(matches!(&step.commands[0], crate::plan::Command::Exec { cmd, .. } if cmd.contains("install -y git")));
    }
}
