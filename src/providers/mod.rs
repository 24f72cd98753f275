//! Language providers and the detection contract.
//!
//! A provider inspects the app during `detect`, registers package intents in
//! `initialize`, and assembles the step graph in `plan`. Providers are tried
//! in the order returned by `language_providers`; the first match wins
//! auto-detection.

mod java;
mod node;
mod php;
mod procfile;
mod rust;
mod staticfile;

pub use java::JavaProvider;
pub use node::NodeProvider;
pub use php::PhpProvider;
pub use procfile::ProcfileProvider;
pub use rust::RustProvider;
pub use staticfile::StaticfileProvider;

use crate::generate::GenerateContext;
use anyhow::Result;

pub trait Provider {
    fn name(&self) -> &'static str;

    /// Pure inspection of app and env; must not mutate the context.
    fn detect(&self, ctx: &GenerateContext) -> Result<bool>;

    /// Called only when the provider will be used.
    fn initialize(&mut self, _ctx: &mut GenerateContext) -> Result<()> {
        Ok(())
    }

    fn plan(&self, ctx: &mut GenerateContext) -> Result<()>;

    fn start_command_help(&self) -> &'static str {
        ""
    }
}

/// All language providers in precedence order. The first whose `detect`
/// succeeds is auto-selected.
pub fn language_providers() -> Vec<Box<dyn Provider>> {
    vec![
        Box::new(PhpProvider::default()),
        Box::new(JavaProvider::default()),
        Box::new(RustProvider::default()),
        Box::new(NodeProvider::default()),
        Box::new(StaticfileProvider::default()),
    ]
}

pub fn get_provider(name: &str) -> Option<Box<dyn Provider>> {
    language_providers().into_iter().find(|p| p.name() == name)
}
