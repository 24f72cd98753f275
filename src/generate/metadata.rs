use std::collections::BTreeMap;

/// Free-form string properties attached to the build result.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    properties: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.properties.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn into_properties(self) -> BTreeMap<String, String> {
        self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut metadata = Metadata::new();
        metadata.set("providers", "php");
        assert_eq!(metadata.get("providers"), Some("php"));
        assert_eq!(metadata.get("missing"), None);
    }
}
