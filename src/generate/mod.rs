//! Plan generation: the shared context, step builders, and finalization.

mod cache;
mod command_step_builder;
mod context;
mod deploy_builder;
mod image_step_builder;
mod logger;
mod metadata;
mod mise_step_builder;
mod step_builder;
mod template;

pub use cache::CacheRegistry;
pub use command_step_builder::CommandStepBuilder;
pub use context::{GenerateContext, TemplateFile, RUNTIME_IMAGE};
pub use deploy_builder::DeployBuilder;
pub use image_step_builder::ImageStepBuilder;
pub use logger::Logger;
pub use metadata::Metadata;
pub use mise_step_builder::{MiseStepBuilder, MISE_STEP_NAME};
pub use step_builder::{BuildStepOptions, StepBuilder};
pub use template::{render, TemplateData, TemplateValue};
