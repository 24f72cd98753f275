use super::cache::CacheRegistry;
use super::command_step_builder::CommandStepBuilder;
use super::image_step_builder::ImageStepBuilder;
use super::mise_step_builder::MiseStepBuilder;
use crate::plan::{Command, Step};
use crate::resolver::ResolvedPackage;
use anyhow::Result;
use std::collections::BTreeMap;

/// State handed to every step builder at finalization.
pub struct BuildStepOptions<'a> {
    pub resolved_packages: &'a BTreeMap<String, ResolvedPackage>,
    pub caches: &'a mut CacheRegistry,
}

impl BuildStepOptions<'_> {
    /// An exec command installing apt packages, attached to the shared apt
    /// caches.
    pub fn new_apt_install_command(&mut self, packages: &[String]) -> Command {
        let joined = packages.join(" ");
        Command::exec_with_caches(
            format!("sh -c 'apt-get update && apt-get install -y {joined}'"),
            Some(format!("install apt packages: {joined}")),
            self.caches.get_apt_caches(),
        )
    }
}

/// The heterogeneous set of step builders a context can hold. Each variant
/// freezes into a `Step` exactly once, at plan finalization.
pub enum StepBuilder {
    Command(CommandStepBuilder),
    Image(ImageStepBuilder),
    Mise(MiseStepBuilder),
}

impl StepBuilder {
    pub fn name(&self) -> &str {
        match self {
            StepBuilder::Command(b) => b.name(),
            StepBuilder::Image(b) => b.name(),
            StepBuilder::Mise(b) => b.name(),
        }
    }

    pub fn build(&self, options: &mut BuildStepOptions) -> Result<Step> {
        match self {
            StepBuilder::Command(b) => b.build(options),
            StepBuilder::Image(b) => b.build(options),
            StepBuilder::Mise(b) => b.build(options),
        }
    }
}

impl From<CommandStepBuilder> for StepBuilder {
    fn from(builder: CommandStepBuilder) -> Self {
        StepBuilder::Command(builder)
    }
}

impl From<ImageStepBuilder> for StepBuilder {
    fn from(builder: ImageStepBuilder) -> Self {
        StepBuilder::Image(builder)
    }
}

impl From<MiseStepBuilder> for StepBuilder {
    fn from(builder: MiseStepBuilder) -> Self {
        StepBuilder::Mise(builder)
    }
}
