//! "Last produced" artifacts tracked by a runner.
//!
//! Each artifact is either a live value or a path that is loaded on first
//! access through an [`ArtifactLoader`].

use crate::error::{OswError, Result};
use crate::workflow::paths::{canonical_or_absolute, current_dir};
use once_cell::unsync::OnceCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Loads artifacts recorded by path
pub trait ArtifactLoader {
    type Model;
    type Workspace;
    type SqlFile;
    type EpwFile;

    fn load_model(&self, path: &Path) -> Result<Self::Model>;
    fn load_workspace(&self, path: &Path) -> Result<Self::Workspace>;
    fn load_sql_file(&self, path: &Path) -> Result<Self::SqlFile>;
    fn load_epw_file(&self, path: &Path) -> Result<Self::EpwFile>;
}

/// Raw contents of an artifact file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub path: PathBuf,
    pub contents: Vec<u8>,
}

impl ArtifactFile {
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read(path).map_err(|e| OswError::from(e).with_path(path))?;
        debug!("Loaded {} bytes from {}", contents.len(), path.display());
        Ok(Self {
            path: path.to_path_buf(),
            contents,
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}

/// Default loader: every artifact is its file's bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct FileArtifactLoader;

impl ArtifactLoader for FileArtifactLoader {
    type Model = ArtifactFile;
    type Workspace = ArtifactFile;
    type SqlFile = ArtifactFile;
    type EpwFile = ArtifactFile;

    fn load_model(&self, path: &Path) -> Result<ArtifactFile> {
        ArtifactFile::read(path)
    }

    fn load_workspace(&self, path: &Path) -> Result<ArtifactFile> {
        ArtifactFile::read(path)
    }

    fn load_sql_file(&self, path: &Path) -> Result<ArtifactFile> {
        ArtifactFile::read(path)
    }

    fn load_epw_file(&self, path: &Path) -> Result<ArtifactFile> {
        ArtifactFile::read(path)
    }
}

pub struct LazyArtifact<T> {
    path: Option<PathBuf>,
    value: OnceCell<T>,
}

impl<T> Default for LazyArtifact<T> {
    fn default() -> Self {
        Self {
            path: None,
            value: OnceCell::new(),
        }
    }
}

impl<T> LazyArtifact<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold a live value, forgetting any recorded path
    pub fn set_value(&mut self, value: T) {
        self.path = None;
        self.value = OnceCell::from(value);
    }

    /// Record a path to load on first access, dropping any live value
    pub fn set_path(&mut self, path: impl AsRef<Path>) {
        self.path = Some(canonical_or_absolute(path.as_ref(), &current_dir()));
        self.value = OnceCell::new();
    }

    pub fn reset(&mut self) {
        self.path = None;
        self.value = OnceCell::new();
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.value.get().is_some() || self.path.is_some()
    }

    pub fn is_loaded(&self) -> bool {
        self.value.get().is_some()
    }

    /// The live value, loading it from the recorded path if needed.
    ///
    /// A failed load is logged and leaves the artifact unloaded.
    pub fn get_or_load(&self, load: impl FnOnce(&Path) -> Result<T>) -> Option<&T> {
        if let Some(value) = self.value.get() {
            return Some(value);
        }
        let path = self.path.as_deref()?;
        match self.value.get_or_try_init(|| load(path)) {
            Ok(value) => Some(value),
            Err(e) => {
                error!("Failed to load artifact '{}': {}", path.display(), e);
                None
            }
        }
    }
}

impl<T> fmt::Debug for LazyArtifact<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyArtifact")
            .field("path", &self.path)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    #[test]
    fn test_loads_once_from_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("in.osm");
        fs::write(&path, "OS:Version").unwrap();

        let mut artifact = LazyArtifact::new();
        artifact.set_path(&path);
        assert!(artifact.is_set());
        assert!(!artifact.is_loaded());

        let calls = Cell::new(0);
        let load = |p: &Path| {
            calls.set(calls.get() + 1);
            ArtifactFile::read(p)
        };
        assert_eq!(artifact.get_or_load(load).unwrap().text(), "OS:Version");
        assert!(artifact.get_or_load(|_| unreachable!()).is_some());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failed_load_retries() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("late.epw");

        let mut artifact: LazyArtifact<ArtifactFile> = LazyArtifact::new();
        artifact.set_path(&path);
        assert!(artifact.get_or_load(|p| ArtifactFile::read(p)).is_none());

        fs::write(&path, "LOCATION").unwrap();
        assert!(artifact.get_or_load(|p| ArtifactFile::read(p)).is_some());
    }

    #[test]
    fn test_value_and_path_replace_each_other() {
        let mut artifact = LazyArtifact::new();
        artifact.set_value(7);
        assert_eq!(artifact.get_or_load(|_| Ok(0)), Some(&7));
        assert!(artifact.path().is_none());

        artifact.set_path("model.osm");
        assert!(!artifact.is_loaded());
        assert!(artifact.path().unwrap().is_absolute());

        artifact.reset();
        assert!(!artifact.is_set());
        assert!(artifact.get_or_load(|_| Ok(1)).is_none());
    }
}
