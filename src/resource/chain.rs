use anyhow::Result;

use super::{Resource, ResourceLoader, ResourcePath};

/// Tries `loader` first and falls through to `next` only on a miss. Errors from
/// `loader` short-circuit the chain.
pub struct ChainedResourceLoader {
    loader: Box<dyn ResourceLoader>,
    next: Box<dyn ResourceLoader>,
}

impl ChainedResourceLoader {
    pub fn new(loader: Box<dyn ResourceLoader>, next: Box<dyn ResourceLoader>) -> Self {
        Self { loader, next }
    }
}

impl ResourceLoader for ChainedResourceLoader {
    fn load_or_none(&self, path: &ResourcePath) -> Result<Option<Resource>> {
        match self.loader.load_or_none(path)? {
            Some(resource) => Ok(Some(resource)),
            None => self.next.load_or_none(path),
        }
    }
}

struct EmptyResourceLoader;

impl ResourceLoader for EmptyResourceLoader {
    fn load_or_none(&self, _path: &ResourcePath) -> Result<Option<Resource>> {
        Ok(None)
    }
}

/// Folds an ordered list of loaders into nested chains, first loader wins.
pub fn chain_loaders(loaders: Vec<Box<dyn ResourceLoader>>) -> Box<dyn ResourceLoader> {
    let mut iter = loaders.into_iter().rev();
    let Some(last) = iter.next() else {
        return Box::new(EmptyResourceLoader);
    };
    iter.fold(last, |next, loader| {
        Box::new(ChainedResourceLoader::new(loader, next))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::MemoryResourceLoader;

    fn path(raw: &str) -> ResourcePath {
        ResourcePath::new(raw).unwrap()
    }

    #[test]
    fn empty_chain_always_misses() {
        let chain = chain_loaders(Vec::new());
        assert!(chain.load_or_none(&path("/a.js")).unwrap().is_none());
    }

    #[test]
    fn single_loader_is_returned_unwrapped() {
        let only: Box<dyn ResourceLoader> = Box::new(MemoryResourceLoader::new().with("/a.js", "a").unwrap());
        let chain = chain_loaders(vec![only]);
        let found = chain.load_or_none(&path("/a.js")).unwrap().unwrap();
        assert_eq!(found.read_string().unwrap(), "a");
    }

    #[test]
    fn earlier_loader_shadows_later_one() {
        let chain = ChainedResourceLoader::new(
            Box::new(MemoryResourceLoader::new().with("/a.js", "override").unwrap()),
            Box::new(MemoryResourceLoader::new().with("/a.js", "base").unwrap().with("/b.js", "b").unwrap()),
        );
        let a = chain.load_or_none(&path("/a.js")).unwrap().unwrap();
        assert_eq!(a.read_string().unwrap(), "override");
        let b = chain.load_or_none(&path("/b.js")).unwrap().unwrap();
        assert_eq!(b.read_string().unwrap(), "b");
    }
}
