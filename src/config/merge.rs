use super::{Config, DeployConfig, StepConfig};

/// Merge configs in precedence order, lowest first. Lists concatenate with
/// stable dedup, maps merge key-wise with later values winning, and scalar
/// fields are replaced by later non-empty values.
pub fn merge(configs: impl IntoIterator<Item = Config>) -> Config {
    configs.into_iter().fold(Config::new(), merge_into)
}

fn merge_into(mut base: Config, overlay: Config) -> Config {
    if overlay.providers.is_some() {
        base.providers = overlay.providers;
    }

    base.packages.extend(overlay.packages);
    append_dedup(&mut base.apt_packages, overlay.apt_packages);
    append_dedup(&mut base.build_apt_packages, overlay.build_apt_packages);
    append_dedup(&mut base.secrets, overlay.secrets);

    for (name, step) in overlay.steps {
        let merged = match base.steps.remove(&name) {
            Some(existing) => merge_step(existing, step),
            None => step,
        };
        base.steps.insert(name, merged);
    }

    base.deploy = merge_deploy(base.deploy, overlay.deploy);
    base
}

fn merge_step(mut base: StepConfig, overlay: StepConfig) -> StepConfig {
    if let Some(inputs) = overlay.inputs {
        if !inputs.is_empty() || base.inputs.is_none() {
            base.inputs = Some(inputs);
        }
    }

    if let Some(commands) = overlay.commands {
        base.commands.get_or_insert_with(Vec::new).extend(commands);
    }

    append_dedup(&mut base.caches, overlay.caches);
    base.variables.extend(overlay.variables);

    if overlay.secrets.is_some() {
        base.secrets = overlay.secrets;
    }

    base
}

fn merge_deploy(mut base: DeployConfig, overlay: DeployConfig) -> DeployConfig {
    match overlay.inputs {
        Some(inputs) if !inputs.is_empty() => base.inputs = Some(inputs),
        _ => {}
    }

    match overlay.start_cmd {
        Some(cmd) if !cmd.is_empty() => base.start_cmd = Some(cmd),
        _ => {}
    }

    base.variables.extend(overlay.variables);
    append_dedup(&mut base.paths, overlay.paths);
    append_dedup(&mut base.apt_packages, overlay.apt_packages);
    base
}

fn append_dedup(base: &mut Vec<String>, overlay: Vec<String>) {
    for item in overlay {
        if !base.contains(&item) {
            base.push(item);
        }
    }
}
