use crate::plan::CacheSpec;
use std::collections::BTreeMap;

/// Deduplicates cache-mount declarations across steps and assigns stable
/// handles. Identical `(key, path)` pairs share a handle; handles are
/// assigned in registration order.
#[derive(Default)]
pub struct CacheRegistry {
    caches: Vec<(String, CacheSpec)>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cache mount, returning its handle. Re-registering an
    /// identical `(key, path)` pair returns the existing handle.
    pub fn add_cache(&mut self, key: &str, path: &str) -> String {
        if let Some((handle, _)) = self
            .caches
            .iter()
            .find(|(_, spec)| spec.key == key && spec.path == path)
        {
            return handle.clone();
        }

        let mut handle = key.to_string();
        let mut suffix = 2;
        while self.caches.iter().any(|(h, _)| *h == handle) {
            handle = format!("{key}-{suffix}");
            suffix += 1;
        }

        self.caches.push((
            handle.clone(),
            CacheSpec {
                key: key.to_string(),
                path: path.to_string(),
            },
        ));
        handle
    }

    /// The standard apt caches, registered on first call.
    pub fn get_apt_caches(&mut self) -> Vec<String> {
        vec![
            self.add_cache("apt", "/var/cache/apt"),
            self.add_cache("apt-lists", "/var/lib/apt"),
        ]
    }

    /// Handle for an already-registered key, if any.
    pub fn get_by_key(&self, key: &str) -> Option<String> {
        self.caches
            .iter()
            .find(|(_, spec)| spec.key == key)
            .map(|(handle, _)| handle.clone())
    }

    /// The complete registry content keyed by handle.
    pub fn to_map(&self) -> BTreeMap<String, CacheSpec> {
        self.caches.iter().cloned().collect()
    }
}
