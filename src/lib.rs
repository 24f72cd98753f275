//! Railpack: compiles an application source tree plus environment-derived
//! configuration into a declarative, serializable build plan that an image
//! executor can materialize into a container image.

pub mod app;
pub mod config;
pub mod core;
pub mod generate;
pub mod mise;
pub mod plan;
pub mod providers;
pub mod resolver;

pub use crate::app::{App, Environment};
pub use crate::core::{
    generate_build_plan, generate_build_plan_with_oracle, BuildResult, GenerateBuildPlanOptions,
};
pub use crate::plan::BuildPlan;
