pub mod archive;
pub mod chain;
pub mod file;
pub mod memory;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use archive::ArchiveResourceLoader;
pub use chain::{chain_loaders, ChainedResourceLoader};
pub use file::FileResourceLoader;
pub use memory::MemoryResourceLoader;

/// Absolute, slash-separated logical path of a script resource.
///
/// Paths are normalized on construction so equality is plain string equality:
/// `"resolve//a.js/"` and `"/resolve/a.js"` name the same resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath {
    path: String,
}

impl ResourcePath {
    pub fn new(path: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for segment in path.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(anyhow!("relative segment not allowed in resource path: {path}")),
                other => segments.push(other),
            }
        }
        Ok(Self {
            path: format!("/{}", segments.join("/")),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|segment| !segment.is_empty())
    }

    pub fn is_root(&self) -> bool {
        self.path == "/"
    }

    /// Last segment, empty for the root path.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&name[idx + 1..]),
        }
    }

    pub fn parent(&self) -> Option<ResourcePath> {
        if self.is_root() {
            return None;
        }
        let idx = self.path.rfind('/').unwrap_or(0);
        let parent = if idx == 0 { "/" } else { &self.path[..idx] };
        Some(Self {
            path: parent.to_string(),
        })
    }

    /// Appends `child` (treated as relative) below this path.
    pub fn resolve(&self, child: &str) -> Result<ResourcePath> {
        Self::new(&format!("{}/{}", self.path, child))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl FromStr for ResourcePath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl Serialize for ResourcePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.path)
    }
}

impl<'de> Deserialize<'de> for ResourcePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ResourcePath::new(&raw).map_err(serde::de::Error::custom)
    }
}

/// Resolved content for a [`ResourcePath`]. Cloning shares the bytes.
#[derive(Clone, Debug)]
pub struct Resource {
    path: ResourcePath,
    bytes: Arc<[u8]>,
}

impl Resource {
    pub fn new(path: ResourcePath, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path,
            bytes: bytes.into(),
        }
    }

    pub fn from_text(path: ResourcePath, text: &str) -> Self {
        Self::new(path, text.as_bytes())
    }

    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn read_string(&self) -> Result<String> {
        std::str::from_utf8(&self.bytes)
            .map(str::to_string)
            .map_err(|err| anyhow!("resource {} is not valid UTF-8: {err}", self.path))
    }

    pub fn read_lines(&self) -> Result<Vec<String>> {
        let text = self.read_string()?;
        Ok(text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect())
    }
}

#[derive(Debug)]
pub struct ResourceNotFound {
    pub path: ResourcePath,
}

impl fmt::Display for ResourceNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource not found: {}", self.path)
    }
}

impl std::error::Error for ResourceNotFound {}

pub trait ResourceLoader: Send + Sync {
    /// Returns `Ok(None)` for an ordinary miss. Errors are reserved for genuine
    /// failures (I/O, permissions, corrupt archives).
    fn load_or_none(&self, path: &ResourcePath) -> Result<Option<Resource>>;

    fn load(&self, path: &ResourcePath) -> Result<Resource> {
        self.load_or_none(path)?.ok_or_else(|| {
            ResourceNotFound {
                path: path.clone(),
            }
            .into()
        })
    }
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for Box<L> {
    fn load_or_none(&self, path: &ResourcePath) -> Result<Option<Resource>> {
        (**self).load_or_none(path)
    }
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for Arc<L> {
    fn load_or_none(&self, path: &ResourcePath) -> Result<Option<Resource>> {
        (**self).load_or_none(path)
    }
}
