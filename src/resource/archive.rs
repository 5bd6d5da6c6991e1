use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use flate2::read::GzDecoder;
use tar::Archive;

use super::{Resource, ResourceLoader, ResourcePath};

/// Resources packed in a `.tar.gz` bundle. The archive is indexed once at
/// construction; lookups never touch the disk.
#[derive(Clone, Debug, Default)]
pub struct ArchiveResourceLoader {
    entries: HashMap<ResourcePath, Arc<[u8]>>,
}

impl ArchiveResourceLoader {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let decoder = GzDecoder::new(Cursor::new(bytes));
        let mut archive = Archive::new(decoder);
        let mut entries = HashMap::new();
        for entry in archive
            .entries()
            .map_err(|err| anyhow!("unable to read archive: {err}"))?
        {
            let mut entry = entry.map_err(|err| anyhow!("corrupt archive entry: {err}"))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let raw_path = entry
                .path()
                .map_err(|err| anyhow!("invalid archive entry path: {err}"))?
                .to_string_lossy()
                .replace('\\', "/");
            let path = ResourcePath::new(&raw_path)
                .with_context(|| format!("invalid archive entry path: {raw_path}"))?;
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .with_context(|| format!("unable to read archive entry {path}"))?;
            entries.insert(path, Arc::from(data));
        }
        Ok(Self { entries })
    }

    pub fn open(file: &Path) -> Result<Self> {
        let bytes = fs::read(file)
            .with_context(|| format!("unable to read archive: {}", file.display()))?;
        Self::from_bytes(&bytes).with_context(|| format!("invalid archive: {}", file.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResourceLoader for ArchiveResourceLoader {
    fn load_or_none(&self, path: &ResourcePath) -> Result<Option<Resource>> {
        Ok(self
            .entries
            .get(path)
            .map(|bytes| Resource::new(path.clone(), Arc::clone(bytes))))
    }
}
