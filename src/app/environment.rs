use std::collections::BTreeMap;

/// Prefix that marks an environment variable as build configuration.
pub const CONFIG_VARIABLE_PREFIX: &str = "RAILPACK_";

/// The environment visible to plan generation: a name to value mapping.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    variables: BTreeMap<String, String>,
}

impl Environment {
    pub fn new(variables: BTreeMap<String, String>) -> Self {
        Self { variables }
    }

    /// Snapshot the process environment.
    pub fn from_process_env() -> Self {
        Self {
            variables: std::env::vars().collect(),
        }
    }

    pub fn get_variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Look up `RAILPACK_{name}`. Returns `None` when unset or empty.
    pub fn get_config_variable(&self, name: &str) -> Option<&str> {
        self.variables
            .get(&format!("{CONFIG_VARIABLE_PREFIX}{name}"))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// All variable names and values. Used to collect secret names.
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }
}
