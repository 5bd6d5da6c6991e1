use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context as AnyhowContext, Result};

use super::{Resource, ResourceLoader, ResourcePath};

/// Serves resources from a directory on disk. `/lib/a.js` maps to
/// `<root>/lib/a.js`.
#[derive(Clone, Debug)]
pub struct FileResourceLoader {
    root: PathBuf,
}

impl FileResourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, path: &ResourcePath) -> PathBuf {
        let mut file = self.root.clone();
        for segment in path.segments() {
            file.push(segment);
        }
        file
    }
}

impl ResourceLoader for FileResourceLoader {
    fn load_or_none(&self, path: &ResourcePath) -> Result<Option<Resource>> {
        let file = self.file_path(path);
        match fs::metadata(&file) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("unable to stat {}", file.display()))
            }
        }
        let bytes =
            fs::read(&file).with_context(|| format!("unable to read file: {}", file.display()))?;
        Ok(Some(Resource::new(path.clone(), bytes)))
    }
}
