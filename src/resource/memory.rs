use std::collections::HashMap;

use anyhow::Result;

use super::{Resource, ResourceLoader, ResourcePath};

/// In-memory resources, typically used as an override layer at the head of a
/// chain.
#[derive(Default, Clone)]
pub struct MemoryResourceLoader {
    entries: HashMap<ResourcePath, Resource>,
}

impl MemoryResourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: Resource) {
        self.entries.insert(resource.path().clone(), resource);
    }

    /// Builder-style insert of a text resource. Fails on a path that does
    /// not normalize, such as one escaping the root with `..`.
    pub fn with(mut self, path: &str, text: &str) -> Result<Self> {
        self.insert(Resource::from_text(ResourcePath::new(path)?, text));
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceLoader for MemoryResourceLoader {
    fn load_or_none(&self, path: &ResourcePath) -> Result<Option<Resource>> {
        Ok(self.entries.get(path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_paths_escaping_the_root() {
        assert!(MemoryResourceLoader::new().with("/../etc/passwd", "x").is_err());
        let loader = MemoryResourceLoader::new().with("/a.js", "a").unwrap();
        assert_eq!(loader.len(), 1);
    }
}
