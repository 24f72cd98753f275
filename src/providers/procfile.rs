use crate::generate::GenerateContext;
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::debug;

const PROCFILE_NAME: &str = "Procfile";

/// Framework-level provider that runs after every language provider. Reads
/// a `Procfile` and adopts its `web` entry as the start command when no
/// provider has set one.
#[derive(Debug, Default)]
pub struct ProcfileProvider;

impl ProcfileProvider {
    /// Returns whether a start command was applied.
    pub fn plan(&self, ctx: &mut GenerateContext) -> Result<bool> {
        if !ctx.app.has_match(PROCFILE_NAME) {
            return Ok(false);
        }

        let procfile: BTreeMap<String, String> = ctx.app.read_yaml(PROCFILE_NAME)?;

        let Some(web) = procfile.get("web") else {
            return Ok(false);
        };

        if !ctx.deploy.start_cmd.is_empty() {
            debug!("start command already set; ignoring Procfile web entry");
            return Ok(false);
        }

        ctx.deploy.start_cmd = web.trim().to_string();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{App, Environment, MockFileSystem};
    use crate::config::Config;
    use crate::resolver::StaticVersionOracle;
    use std::sync::Arc;

    fn context_with_procfile(contents: &str) -> GenerateContext {
        let mut fs = MockFileSystem::new();
        fs.add_file("Procfile", contents);
        let app = App::from_fs(Arc::new(fs)).unwrap();
        GenerateContext::new(
            app,
            Environment::default(),
            Config::new(),
            Box::new(StaticVersionOracle::new()),
        )
    }

    #[test]
    fn test_web_entry_sets_start_command() {
        let mut ctx = context_with_procfile("web: gunicorn --bind 0.0.0.0:3333 main:app");
        let applied = ProcfileProvider.plan(&mut ctx).unwrap();
        assert!(applied);
        assert_eq!(ctx.deploy.start_cmd, "gunicorn --bind 0.0.0.0:3333 main:app");
    }

    #[test]
    fn test_existing_start_command_wins() {
        let mut ctx = context_with_procfile("web: npm start");
        ctx.deploy.start_cmd = "node server.js".to_string();

        let applied = ProcfileProvider.plan(&mut ctx).unwrap();
        assert!(!applied);
        assert_eq!(ctx.deploy.start_cmd, "node server.js");
    }

    #[test]
    fn test_procfile_without_web_entry() {
        let mut ctx = context_with_procfile("worker: celery -A tasks worker");
        let applied = ProcfileProvider.plan(&mut ctx).unwrap();
        assert!(!applied);
        assert!(ctx.deploy.start_cmd.is_empty());
    }

    #[test]
    fn test_missing_procfile() {
        let app = App::from_fs(Arc::new(MockFileSystem::new())).unwrap();
        let mut ctx = GenerateContext::new(
            app,
            Environment::default(),
            Config::new(),
            Box::new(StaticVersionOracle::new()),
        );
        assert!(!ProcfileProvider.plan(&mut ctx).unwrap());
    }
}
